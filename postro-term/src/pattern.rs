//! Object name patterns of the describe commands.
//!
//! A pattern is a possibly qualified name, `db.schema.name`, where unquoted letters are folded
//! to lower case, `*` and `?` are shell-style wildcards, and double quotes keep text verbatim.
//! Each part becomes an anchored regular expression, matched in a `WHERE` clause.
use crate::{Error, Result};

/// Catalog columns a pattern is matched against.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameColumns<'a> {
    pub schema: Option<&'a str>,
    pub name: Option<&'a str>,
    /// Second column the name part may match instead.
    pub alt_name: Option<&'a str>,
    /// Condition used when no schema is given.
    pub visibility: Option<&'a str>,
}

/// A pattern split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPattern {
    /// Database part as typed, case folded and unquoted.
    pub dbname: Option<String>,
    pub schema: Option<String>,
    pub name: String,
    /// Number of unquoted dots.
    pub dots: usize,
}

/// Regexp special characters escaped inside quotes.
const REGEX_SPECIAL: &str = "|*+?()[]{}.^\\";

/// Split `pattern` into at most `parts` regular expressions, the last part is the name.
pub fn to_regex(pattern: &str, force_escape: bool, parts: usize) -> ParsedPattern {
    let parts = parts.clamp(1, 3);
    let mut bufs = vec![String::from("^(")];
    // first part as typed, compared against the current database name
    let mut first = String::new();
    let mut dots = 0;
    let mut in_quotes = false;
    let mut chars = pattern.chars().peekable();

    while let Some(ch) = chars.next() {
        let nbufs = bufs.len();
        let Some(cur) = bufs.last_mut() else { break };
        let literal = match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                cur.push('"');
                Some('"')
            }
            '"' => {
                in_quotes = !in_quotes;
                None
            }
            c if !in_quotes && c.is_ascii_uppercase() => {
                cur.push(c.to_ascii_lowercase());
                Some(c.to_ascii_lowercase())
            }
            '*' if !in_quotes => {
                cur.push_str(".*");
                Some('*')
            }
            '?' if !in_quotes => {
                cur.push('.');
                Some('?')
            }
            '.' if !in_quotes => {
                dots += 1;
                if nbufs < parts {
                    cur.push_str(")$");
                    bufs.push(String::from("^("));
                } else {
                    cur.push('.');
                }
                None
            }
            // `$` is a legal identifier character, never an anchor here
            '$' => {
                cur.push_str("\\$");
                Some('$')
            }
            c => {
                if (in_quotes || force_escape) && REGEX_SPECIAL.contains(c) {
                    cur.push('\\');
                } else if c == '[' && chars.peek() == Some(&']') {
                    cur.push('\\');
                }
                cur.push(c);
                Some(c)
            }
        };
        if let Some(c) = literal.filter(|_| dots == 0) {
            first.push(c);
        }
    }
    if let Some(cur) = bufs.last_mut() {
        cur.push_str(")$");
    }

    let name = bufs.pop().unwrap_or_default();
    let schema = bufs.pop();
    let dbname = (!bufs.is_empty()).then_some(first);
    ParsedPattern { dbname, schema, name, dots }
}

/// Regular expressions are passed as standard conforming string literals.
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn where_and(sql: &mut String, have_where: &mut bool) {
    sql.push_str(if *have_where { "  AND " } else { "WHERE " });
    *have_where = true;
}

/// Append the `WHERE`/`AND` conditions matching `pattern`, returns whether any was added.
///
/// `sql` should end with a newline, the appended text ends with one too.
pub fn process_name_pattern(
    sql: &mut String,
    pattern: Option<&str>,
    mut have_where: bool,
    force_escape: bool,
    cols: NameColumns<'_>,
) -> (bool, ParsedPattern) {
    let Some(pattern) = pattern else {
        if let Some(rule) = cols.visibility {
            where_and(sql, &mut have_where);
            sql.push_str(rule);
            sql.push('\n');
        }
        return (cols.visibility.is_some(), ParsedPattern::default());
    };

    let parts = if cols.schema.is_some() { 3 } else { 1 };
    let parsed = to_regex(pattern, force_escape, parts);
    let mut added = false;

    if let Some(namevar) = cols.name {
        if parsed.name != "^(.*)$" {
            where_and(sql, &mut have_where);
            let literal = sql_literal(&parsed.name);
            match cols.alt_name {
                Some(alt) => {
                    sql.push_str(&format!("({namevar} ~ {literal}\n        OR {alt} ~ {literal})\n"));
                }
                None => sql.push_str(&format!("{namevar} ~ {literal}\n")),
            }
            added = true;
        }
    }

    match (cols.schema, parsed.schema.as_deref()) {
        (Some(schemavar), Some(schema)) => {
            if schema != "^(.*)$" {
                where_and(sql, &mut have_where);
                sql.push_str(&format!("{schemavar} ~ {}\n", sql_literal(schema)));
                added = true;
            }
        }
        _ => {
            if let Some(rule) = cols.visibility {
                where_and(sql, &mut have_where);
                sql.push_str(rule);
                sql.push('\n');
                added = true;
            }
        }
    }

    (added, parsed)
}

/// [`process_name_pattern`] that also rejects patterns with more than `max_parts` parts and
/// references to a database other than `current_db`.
#[allow(clippy::too_many_arguments)]
pub fn validate_name_pattern(
    sql: &mut String,
    pattern: Option<&str>,
    have_where: bool,
    force_escape: bool,
    cols: NameColumns<'_>,
    max_parts: usize,
    current_db: Option<&str>,
) -> Result<bool> {
    let (added, parsed) = process_name_pattern(sql, pattern, have_where, force_escape, cols);
    let pattern = pattern.unwrap_or_default();

    if parsed.dots >= max_parts {
        return Err(Error::usage(format!("improper qualified name (too many dotted names): {pattern}")));
    }

    if max_parts > 1 && parsed.dots == max_parts - 1 {
        let Some(current_db) = current_db else {
            return Err(Error::usage("You are currently not connected to a database."));
        };
        if parsed.dbname.as_deref() != Some(current_db) {
            return Err(Error::usage(format!("cross-database references are not implemented: {pattern}")));
        }
    }

    Ok(added)
}

#[cfg(test)]
mod test {
    use super::*;

    const TABLE: NameColumns<'static> = NameColumns {
        schema: Some("n.nspname"),
        name: Some("c.relname"),
        alt_name: None,
        visibility: Some("pg_catalog.pg_table_is_visible(c.oid)"),
    };

    fn build(pattern: Option<&str>) -> String {
        let mut sql = String::new();
        process_name_pattern(&mut sql, pattern, false, false, TABLE);
        sql
    }

    #[test]
    fn plain_name() {
        assert_eq!(
            build(Some("Foo")),
            "WHERE c.relname ~ '^(foo)$'\n  AND pg_catalog.pg_table_is_visible(c.oid)\n"
        );
        assert_eq!(build(None), "WHERE pg_catalog.pg_table_is_visible(c.oid)\n");
        assert_eq!(build(Some("*")), "WHERE pg_catalog.pg_table_is_visible(c.oid)\n");
    }

    #[test]
    fn qualified_and_wildcards() {
        assert_eq!(
            build(Some("public.t?b*")),
            "WHERE c.relname ~ '^(t.b.*)$'\n  AND n.nspname ~ '^(public)$'\n"
        );
        assert_eq!(build(Some("*.*")), "");
    }

    #[test]
    fn quoting() {
        let parsed = to_regex("\"My.Tab\"\"x\"", false, 3);
        assert_eq!(parsed.name, "^(My\\.Tab\"x)$");
        assert_eq!(parsed.schema, None);

        let parsed = to_regex("a$b", false, 1);
        assert_eq!(parsed.name, "^(a\\$b)$");

        let mut sql = String::new();
        process_name_pattern(&mut sql, Some("\"it's\""), false, false, TABLE);
        assert!(sql.starts_with("WHERE c.relname ~ '^(it''s)$'\n"));
    }

    #[test]
    fn alternative_name() {
        let cols = NameColumns { name: Some("p.proname"), alt_name: Some("p.oid::text"), ..Default::default() };
        let mut sql = String::from("WHERE true\n");
        process_name_pattern(&mut sql, Some("f"), true, false, cols);
        assert_eq!(sql, "WHERE true\n  AND (p.proname ~ '^(f)$'\n        OR p.oid::text ~ '^(f)$')\n");
    }

    #[test]
    fn database_part() {
        let parsed = to_regex("MyDb.s.t", false, 3);
        assert_eq!(parsed.dbname.as_deref(), Some("mydb"));
        assert_eq!(parsed.schema.as_deref(), Some("^(s)$"));
        assert_eq!(parsed.name, "^(t)$");
        assert_eq!(parsed.dots, 2);
    }

    #[test]
    fn extra_dots_stay_in_name() {
        let parsed = to_regex("a.b.c", false, 2);
        assert_eq!(parsed.schema.as_deref(), Some("^(a)$"));
        assert_eq!(parsed.name, "^(b.c)$");
        assert_eq!(parsed.dbname, None);
        assert_eq!(parsed.dots, 2);
    }

    #[test]
    fn validation() {
        let mut sql = String::new();
        let err = validate_name_pattern(&mut sql, Some("a.b.c.d"), false, false, TABLE, 3, Some("a")).unwrap_err();
        assert_eq!(err.to_string(), "improper qualified name (too many dotted names): a.b.c.d");

        let err = validate_name_pattern(&mut sql, Some("other.s.t"), false, false, TABLE, 3, Some("db")).unwrap_err();
        assert_eq!(err.to_string(), "cross-database references are not implemented: other.s.t");

        let err = validate_name_pattern(&mut sql, Some("db.s.t"), false, false, TABLE, 3, None).unwrap_err();
        assert_eq!(err.to_string(), "You are currently not connected to a database.");

        assert!(validate_name_pattern(&mut sql, Some("db.s.t"), false, false, TABLE, 3, Some("db")).unwrap());
        assert!(validate_name_pattern(&mut sql, Some("s.t"), false, false, TABLE, 3, Some("db")).unwrap());
    }
}
