/// Postgres object identifier.
///
/// The oid type is implemented as an unsigned four-byte integer.
///
/// <https://www.postgresql.org/docs/current/datatype-oid.html>
pub type Oid = u32;

/// Builtin type oids the terminal cares about.
pub mod oid {
    use super::Oid;

    macro_rules! oid {
        ($($name:ident = $oid:literal, $doc:literal;)*) => {
            $(
                #[doc = $doc]
                pub const $name: Oid = $oid;
            )*
        };
    }

    oid! {
        BOOL = 16, "`bool` boolean, true/false";
        BYTEA = 17, "`bytea` variable-length string, binary values escaped";
        INT8 = 20, "`int8` ~18 digit integer, 8-byte storage";
        INT2 = 21, "`int2` -32 thousand to 32 thousand, 2-byte storage";
        INT4 = 23, "`int4` -2 billion to 2 billion integer, 4-byte storage";
        TEXT = 25, "`text` variable-length string, no limit specified";
        OID = 26, "`oid` object identifier, internally used";
        XID = 28, "`xid` transaction id";
        CID = 29, "`cid` command identifier type";
        FLOAT4 = 700, "`float4` single-precision floating point number";
        FLOAT8 = 701, "`float8` double-precision floating point number";
        MONEY = 790, "`money` monetary amounts";
        NUMERIC = 1700, "`numeric` exact numeric of selectable precision";
        XID8 = 5069, "`xid8` full transaction id";
    }

    /// Returns `true` for types whose values are right aligned when printed.
    pub fn is_numeric(oid: Oid) -> bool {
        matches!(
            oid,
            INT8 | INT2 | INT4 | OID | XID | XID8 | CID | FLOAT4 | FLOAT8 | MONEY | NUMERIC
        )
    }

    /// Textual name of builtin types, used when the catalog is not consulted.
    pub fn name(oid: Oid) -> Option<&'static str> {
        let name = match oid {
            BOOL => "boolean",
            BYTEA => "bytea",
            INT8 => "bigint",
            INT2 => "smallint",
            INT4 => "integer",
            TEXT => "text",
            OID => "oid",
            XID => "xid",
            CID => "cid",
            FLOAT4 => "real",
            FLOAT8 => "double precision",
            MONEY => "money",
            NUMERIC => "numeric",
            XID8 => "xid8",
            _ => return None,
        };
        Some(name)
    }
}

#[cfg(test)]
mod test {
    use super::oid;

    #[test]
    fn numeric_alignment() {
        assert!(oid::is_numeric(oid::INT4));
        assert!(oid::is_numeric(oid::NUMERIC));
        assert!(!oid::is_numeric(oid::TEXT));
        assert!(!oid::is_numeric(oid::BOOL));
    }
}
