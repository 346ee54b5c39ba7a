//! Postgres Wire Protocol
//!
//! The protocol half of `postro-term`: message codecs, a buffered stream, the startup and
//! authentication flow, connection configuration and out-of-band cancellation.
//!
//! # Examples
//!
//! ```no_run
//! use postro_wire::{Config, Connection, PgTransport, PgTransportExt, postgres::{frontend, BackendMessage}};
//!
//! # async fn app() -> postro_wire::Result<()> {
//! let config = Config::from_env();
//! let mut conn = Connection::connect(&config).await?;
//!
//! conn.send(frontend::Query { sql: "SELECT 420" });
//! conn.flush().await?;
//!
//! loop {
//!     match conn.recv::<BackendMessage>().await? {
//!         BackendMessage::DataRow(row) => println!("{:?}", row.values().next()),
//!         BackendMessage::ReadyForQuery(_) => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod common;
mod ext;
mod io;
mod net;

// Protocol
pub mod postgres;
pub mod auth;

// Operation
pub mod transport;
mod stream;

// Connection
pub mod config;
pub mod connection;
pub mod cancel;

mod error;

pub use config::Config;
pub use connection::{Connection, TransactionStatus};
pub use cancel::CancelToken;
pub use net::Target;
pub use postgres::{Notification, ServerNotice};
pub use transport::{PgTransport, PgTransportExt};
pub use error::{Error, ErrorKind, Result};
