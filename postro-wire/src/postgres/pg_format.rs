/// Postgres data transmission format.
///
/// <https://www.postgresql.org/docs/current/protocol-overview.html#PROTOCOL-FORMAT-CODES>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PgFormat {
    /// Text has format code zero.
    ///
    /// There is no trailing null character, and the text format does not allow embedded nulls.
    #[default]
    Text,
    /// Binary has format code one.
    ///
    /// Integers use network byte order, other types are server version dependent.
    Binary,
}

impl PgFormat {
    /// Return format code for current format.
    pub fn format_code(&self) -> u16 {
        match self {
            PgFormat::Text => 0,
            PgFormat::Binary => 1,
        }
    }

    /// Format from its wire code, anything non zero is binary.
    pub fn from_code(code: u16) -> PgFormat {
        match code {
            0 => PgFormat::Text,
            _ => PgFormat::Binary,
        }
    }
}
