//! Postgres Frontend and Backend Protocol
//!
//! All communication is through a stream of messages. The first byte of a message identifies the
//! message type, and the next four bytes specify the length of the rest of the message (this
//! length count includes itself, but not the message-type byte).
//!
//! ```text
//! ┏━━━━┳━━━━━━━━━━━━━━━━━━━┳━━━━━━┓
//! ┃ Ty ┃       Length      ┃ Body ┃
//! ┣━━━━╋━━━━━━━━━━━━━━━━━━━╋━━━━━━┫
//! ┃ u8 ┃        u32        ┃ [u8] ┃
//! ┗━━━━┻━━━━━━━━━━━━━━━━━━━┻━━━━━━┛
//! ```
//!
//! The startup, SSL and cancel requests are the exception, they carry no message-type byte.
//!
//! Every result column and parameter in this crate travels in [`Text`][PgFormat::Text] format,
//! the terminal only ever displays values.
//!
//! <https://www.postgresql.org/docs/current/protocol-overview.html>

mod pg_type;
mod pg_format;
mod notice;

pub mod frontend;
pub mod backend;

mod error;

pub use pg_type::{Oid, oid};
pub use pg_format::PgFormat;
pub use notice::{Notification, ServerNotice, Severity};

pub use frontend::FrontendProtocol;
pub use backend::{BackendMessage, BackendProtocol, ErrorResponse, NoticeResponse};
pub use error::ProtocolError;
