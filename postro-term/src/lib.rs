//! Interactive terminal for Postgres
//!
//! Lines are read from the terminal or a script, split into statements by the [`scan`]
//! lexer, and either sent to the server through [`postro_wire`] or handled as backslash
//! meta-commands by [`command`]. Results are rendered by [`print`].
//!
//! # Examples
//!
//! ```no_run
//! use postro_term::{input::Input, mainloop, session::Session, variables::Variables};
//!
//! let script = Input::script("\\set greeting hello\n\\echo :greeting\n", Some("script.sql"));
//! let mut session = Session::new(Variables::with_defaults(), script, false).unwrap();
//! assert_eq!(mainloop::main_loop(&mut session), mainloop::EXIT_SUCCESS);
//! ```

// Input
pub mod buffer;
pub mod input;
pub mod scan;

// Session
pub mod conditional;
pub mod runtime;
pub mod session;
pub mod variables;

// Commands
pub mod command;
pub mod copy;
pub mod describe;
pub mod help;
pub mod pattern;
pub mod watch;

// Server
pub mod connect;
pub mod report;
pub mod result;
pub mod send;

// Output
pub mod crosstab;
pub mod output;
pub mod print;
pub mod prompt;

// Program
pub mod cli;
pub mod mainloop;
pub mod shell;
pub mod startup;

mod error;

pub use error::{Error, ErrorKind, Result};
