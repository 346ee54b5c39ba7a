//! Server reported errors and notices.
use bytes::{Buf, Bytes};
use std::fmt;

use super::ProtocolError;
use crate::ext::BytesExt;

/// Severity of a server message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Fatal,
    Panic,
    Warning,
    Notice,
    Debug,
    Info,
    Log,
}

impl Severity {
    fn parse(s: &str) -> Option<Severity> {
        let sev = match s {
            "ERROR" => Self::Error,
            "FATAL" => Self::Fatal,
            "PANIC" => Self::Panic,
            "WARNING" => Self::Warning,
            "NOTICE" => Self::Notice,
            "DEBUG" => Self::Debug,
            "INFO" => Self::Info,
            "LOG" => Self::Log,
            _ => return None,
        };
        Some(sev)
    }

    /// Is this an error that aborted the command.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::Fatal | Self::Panic)
    }
}

/// Fields of an `ErrorResponse` or `NoticeResponse`.
///
/// <https://www.postgresql.org/docs/current/protocol-error-fields.html>
#[derive(Debug, Clone, Default)]
pub struct ServerNotice {
    /// Localized severity, `S` field.
    pub severity: String,
    /// Non localized severity, `V` field, absent before 9.6.
    pub severity_kind: Option<Severity>,
    /// SQLSTATE code.
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    /// 1-based character position into the original query string.
    pub position: Option<u32>,
    pub internal_position: Option<u32>,
    pub internal_query: Option<String>,
    /// Call stack traceback, one entry per line.
    pub context: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub column: Option<String>,
    pub datatype: Option<String>,
    pub constraint: Option<String>,
    pub file: Option<String>,
    pub line: Option<String>,
    pub routine: Option<String>,
}

impl ServerNotice {
    /// Decode the message body of `ErrorResponse` or `NoticeResponse`.
    pub fn parse(mut body: Bytes) -> Result<ServerNotice, ProtocolError> {
        let mut me = ServerNotice::default();

        loop {
            if !body.has_remaining() {
                return Err(ProtocolError::malformed("notice fields missing terminator"));
            }
            let field = body.get_u8();
            if field == 0 {
                break;
            }
            let value = body.get_nul_string()?;
            match field {
                b'S' => me.severity = value,
                b'V' => me.severity_kind = Severity::parse(&value),
                b'C' => me.code = value,
                b'M' => me.message = value,
                b'D' => me.detail = Some(value),
                b'H' => me.hint = Some(value),
                b'P' => me.position = value.parse().ok(),
                b'p' => me.internal_position = value.parse().ok(),
                b'q' => me.internal_query = Some(value),
                b'W' => me.context = Some(value),
                b's' => me.schema = Some(value),
                b't' => me.table = Some(value),
                b'c' => me.column = Some(value),
                b'd' => me.datatype = Some(value),
                b'n' => me.constraint = Some(value),
                b'F' => me.file = Some(value),
                b'L' => me.line = Some(value),
                b'R' => me.routine = Some(value),
                // frontends should silently ignore fields of unrecognized type
                _ => {}
            }
        }

        if me.severity_kind.is_none() {
            me.severity_kind = Severity::parse(&me.severity);
        }

        Ok(me)
    }

    /// Is this an error, as opposed to a notice or warning.
    pub fn is_error(&self) -> bool {
        self.severity_kind.map(|s| s.is_error()).unwrap_or(false)
    }
}

impl fmt::Display for ServerNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:  {}", self.severity, self.message)
    }
}

impl std::error::Error for ServerNotice { }

/// Asynchronous `NOTIFY` delivered by the server.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Name of the channel that the notify has been raised on.
    pub channel: String,
    /// The process ID of the notifying backend process.
    pub sender_pid: u32,
    /// The "payload" string passed from the notifying process.
    pub payload: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_fields() {
        let body = Bytes::from_static(
            b"SERROR\0VERROR\0C42P01\0Mrelation \"nope\" does not exist\0P15\0Fparse_relation.c\0Zunknown\0\0",
        );
        let notice = ServerNotice::parse(body).unwrap();
        assert_eq!(notice.code, "42P01");
        assert_eq!(notice.message, "relation \"nope\" does not exist");
        assert_eq!(notice.position, Some(15));
        assert_eq!(notice.file.as_deref(), Some("parse_relation.c"));
        assert!(notice.is_error());
        assert_eq!(notice.to_string(), "ERROR:  relation \"nope\" does not exist");
    }

    #[test]
    fn localized_severity_fallback() {
        let notice = ServerNotice::parse(Bytes::from_static(b"SNOTICE\0Mhi\0\0")).unwrap();
        assert_eq!(notice.severity_kind, Some(Severity::Notice));
        assert!(!notice.is_error());
    }

    #[test]
    fn missing_terminator() {
        assert!(ServerNotice::parse(Bytes::from_static(b"SERROR\0")).is_err());
    }
}
