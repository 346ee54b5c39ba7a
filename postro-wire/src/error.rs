//! `postro-wire` error types.
use std::{backtrace::Backtrace, fmt, io};

use crate::{
    auth::{AuthError, UnsupportedAuth},
    config::ParseError,
    connection::ConnectError,
    postgres::{ProtocolError, ServerNotice, Severity},
};

/// A specialized [`Result`] type for `postro-wire` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `postro-wire` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
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

    /// The server reported error, if this is one.
    pub fn as_server(&self) -> Option<&ServerNotice> {
        match &self.kind {
            ErrorKind::Database(notice) => Some(notice),
            _ => None,
        }
    }

    /// Is the socket no longer usable.
    pub fn is_connection_lost(&self) -> bool {
        match &self.kind {
            ErrorKind::Io(_) => true,
            ErrorKind::Database(notice) => {
                matches!(notice.severity_kind, Some(Severity::Fatal | Severity::Panic))
            }
            _ => false,
        }
    }
}

/// All possible error kind from `postro-wire` library.
pub enum ErrorKind {
    Config(ParseError),
    Protocol(ProtocolError),
    Io(io::Error),
    Database(ServerNotice),
    UnsupportedAuth(UnsupportedAuth),
    Auth(AuthError),
    Connect(ConnectError),
    /// Server asked for a password and none was available.
    PasswordRequired,
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
from!(<ParseError>e => ErrorKind::Config(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<std::io::Error>e => ErrorKind::Io(e));
from!(<ServerNotice>e => ErrorKind::Database(e));
from!(<UnsupportedAuth>e => ErrorKind::UnsupportedAuth(e));
from!(<AuthError>e => ErrorKind::Auth(e));
from!(<ConnectError>e => ErrorKind::Connect(e));

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
            Self::Config(e) => e.fmt(f),
            Self::Protocol(e) => e.fmt(f),
            Self::Io(e) => e.fmt(f),
            Self::Database(e) => e.fmt(f),
            Self::UnsupportedAuth(e) => e.fmt(f),
            Self::Auth(e) => e.fmt(f),
            Self::Connect(e) => e.fmt(f),
            Self::PasswordRequired => f.write_str("fe_sendauth: no password supplied"),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
