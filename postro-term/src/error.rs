//! `postro-term` error types.
use postro_wire::ServerNotice;
use std::{backtrace::Backtrace, fmt, io};

/// A specialized [`Result`] type for terminal operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from the terminal.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    /// Malformed command line or meta-command invocation.
    pub fn usage(message: impl Into<String>) -> Error {
        ErrorKind::Usage(message.into()).into()
    }

    pub fn lex(message: impl Into<String>) -> Error {
        ErrorKind::Lex(message.into()).into()
    }

    /// Misplaced `\elif`, `\else` or `\endif`.
    pub fn conditional(message: impl Into<String>) -> Error {
        ErrorKind::Conditional(message.into()).into()
    }

    pub fn eval(message: impl Into<String>) -> Error {
        ErrorKind::Eval(message.into()).into()
    }

    pub fn connection(message: impl Into<String>) -> Error {
        ErrorKind::Connection(message.into()).into()
    }

    pub fn protocol(message: impl Into<String>) -> Error {
        ErrorKind::Protocol(message.into()).into()
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Prefix the error message with `context`.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn as_server(&self) -> Option<&ServerNotice> {
        match &self.kind {
            ErrorKind::Server(notice) => Some(notice),
            _ => None,
        }
    }

    /// The connection can no longer be used.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self.kind, ErrorKind::Connection(_))
    }
}

/// All possible error kind from the terminal.
pub enum ErrorKind {
    Usage(String),
    Lex(String),
    Conditional(String),
    Eval(String),
    /// Unable to connect, or the connection is gone.
    Connection(String),
    Server(ServerNotice),
    Protocol(String),
    Io(io::Error),
    NoConnection,
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<io::Error>e => ErrorKind::Io(e));
from!(<ServerNotice>e => ErrorKind::Server(e));
from!(<postro_wire::postgres::ProtocolError>e => ErrorKind::Protocol(e.to_string()));
from!(<postro_wire::Error>e => {
    use postro_wire::ErrorKind as Wire;
    let is_lost = e.is_connection_lost();
    let message = e.to_string();
    match e.into_kind() {
        Wire::Database(notice) if !is_lost => ErrorKind::Server(notice),
        Wire::Protocol(_) if !is_lost => ErrorKind::Protocol(message),
        _ => ErrorKind::Connection(message),
    }
});

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(e) => f.write_str(e),
            Self::Lex(e) => f.write_str(e),
            Self::Conditional(e) => f.write_str(e),
            Self::Eval(e) => f.write_str(e),
            Self::Connection(e) => f.write_str(e),
            Self::Server(e) => write!(f, "{}:  {}", e.severity, e.message),
            Self::Protocol(e) => f.write_str(e),
            Self::Io(e) => e.fmt(f),
            Self::NoConnection => f.write_str("You are currently not connected to a database."),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_with_context() {
        let err = Error::usage("missing required argument").context("\\set");
        assert_eq!(err.to_string(), "\\set: missing required argument");
        assert_eq!(Error::from(ErrorKind::NoConnection).to_string(), "You are currently not connected to a database.");
    }

    #[test]
    fn wire_errors_are_classified() {
        let notice = ServerNotice {
            severity: "ERROR".into(),
            code: "22012".into(),
            message: "division by zero".into(),
            ..Default::default()
        };
        let err = Error::from(postro_wire::Error::from(notice));
        assert_eq!(err.as_server().map(|n| n.code.as_str()), Some("22012"));
        assert!(!err.is_connection_lost());

        let io = io::Error::new(io::ErrorKind::UnexpectedEof, "server closed the connection unexpectedly");
        let err = Error::from(postro_wire::Error::from(io));
        assert!(err.is_connection_lost());
    }
}
