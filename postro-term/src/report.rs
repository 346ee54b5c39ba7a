//! Server error and notice rendering.
use postro_wire::ServerNotice;

use crate::{
    print::width::char_width,
    variables::{ShowContext, Verbosity},
};

/// Lines of the query shown around an error position.
const DISPLAY_SIZE: usize = 60;
/// Keep the cursor at least this far from a right cut.
const MIN_RIGHT_CUT: usize = 10;

/// Render a server message the way it is shown to the user.
///
/// `query` is the statement that failed, used to point at the error position.
pub fn format_notice(
    notice: &ServerNotice,
    query: Option<&str>,
    verbosity: Verbosity,
    show_context: ShowContext,
) -> String {
    let mut msg = String::new();
    let is_error = notice.is_error();

    if !notice.severity.is_empty() {
        msg.push_str(&notice.severity);
        msg.push_str(":  ");
    }

    if verbosity == Verbosity::Sqlstate && !notice.code.is_empty() {
        msg.push_str(&notice.code);
        msg.push('\n');
        return msg;
    }
    let verbosity = match verbosity {
        Verbosity::Sqlstate => Verbosity::Terse,
        v => v,
    };

    if verbosity == Verbosity::Verbose && !notice.code.is_empty() {
        msg.push_str(&notice.code);
        msg.push_str(": ");
    }
    msg.push_str(&notice.message);

    let mut cursor = None;
    match (notice.position, notice.internal_position) {
        (Some(pos), _) => match query {
            Some(query) if verbosity != Verbosity::Terse => cursor = Some((query, pos)),
            _ => msg.push_str(&format!(" at character {pos}")),
        },
        (None, Some(pos)) => match notice.internal_query.as_deref() {
            Some(query) if verbosity != Verbosity::Terse => cursor = Some((query, pos)),
            _ => msg.push_str(&format!(" at character {pos}")),
        },
        (None, None) => {}
    }
    msg.push('\n');

    if verbosity != Verbosity::Terse {
        if let Some((query, pos)) = cursor {
            error_position(&mut msg, query, pos as usize);
        }
        if let Some(detail) = &notice.detail {
            msg.push_str(&format!("DETAIL:  {detail}\n"));
        }
        if let Some(hint) = &notice.hint {
            msg.push_str(&format!("HINT:  {hint}\n"));
        }
        if let Some(query) = &notice.internal_query {
            msg.push_str(&format!("QUERY:  {query}\n"));
        }
        let context = match show_context {
            ShowContext::Always => true,
            ShowContext::Errors => is_error,
            ShowContext::Never => false,
        };
        if let Some(ctx) = notice.context.as_ref().filter(|_| context) {
            msg.push_str(&format!("CONTEXT:  {ctx}\n"));
        }
    }

    if verbosity == Verbosity::Verbose {
        let fields = [
            ("SCHEMA NAME", &notice.schema),
            ("TABLE NAME", &notice.table),
            ("COLUMN NAME", &notice.column),
            ("DATATYPE NAME", &notice.datatype),
            ("CONSTRAINT NAME", &notice.constraint),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                msg.push_str(&format!("{label}:  {value}\n"));
            }
        }
        if notice.routine.is_some() || notice.file.is_some() || notice.line.is_some() {
            msg.push_str("LOCATION:  ");
            if let Some(routine) = &notice.routine {
                msg.push_str(&format!("{routine}, "));
            }
            if let (Some(file), Some(line)) = (&notice.file, &notice.line) {
                msg.push_str(&format!("{file}:{line}"));
            }
            msg.push('\n');
        }
    }

    msg
}

/// Append the `LINE n: ...` excerpt and a caret under character `loc`, 1-based.
fn error_position(msg: &mut String, query: &str, loc: usize) {
    let Some(loc) = loc.checked_sub(1) else {
        return;
    };

    // tabs show as one space
    let chars: Vec<char> = query.chars().map(|c| if c == '\t' { ' ' } else { c }).collect();
    // screen column where each character starts, one extra entry for the end
    let mut columns = Vec::with_capacity(chars.len() + 1);
    let mut col = 0;
    let mut line = 1;
    let mut begin = 0;
    let mut end = None;

    for (i, &ch) in chars.iter().enumerate() {
        columns.push(col);
        if ch == '\r' || ch == '\n' {
            if i < loc {
                if ch == '\r' || i == 0 || chars[i - 1] != '\r' {
                    line += 1;
                }
                begin = i + 1;
            } else {
                end = Some(i);
                break;
            }
        }
        col += char_width(ch).unwrap_or(1).max(1);
    }
    let mut end = match end {
        Some(end) => end,
        None => {
            columns.push(col);
            chars.len()
        }
    };

    if loc > end {
        return;
    }

    let mut begin_cut = false;
    let mut end_cut = false;
    if columns[end] - columns[begin] > DISPLAY_SIZE {
        if columns[begin] + DISPLAY_SIZE >= columns[loc] + MIN_RIGHT_CUT {
            while columns[end] - columns[begin] > DISPLAY_SIZE {
                end -= 1;
            }
            end_cut = true;
        } else {
            while columns[loc] + MIN_RIGHT_CUT < columns[end] {
                end -= 1;
                end_cut = true;
            }
            while columns[end] - columns[begin] > DISPLAY_SIZE {
                begin += 1;
                begin_cut = true;
            }
        }
    }

    let mut prefix = format!("LINE {line}: ");
    if begin_cut {
        prefix.push_str("...");
    }
    let indent = prefix.chars().count() + columns[loc] - columns[begin];

    msg.push_str(&prefix);
    msg.extend(&chars[begin..end]);
    if end_cut {
        msg.push_str("...");
    }
    msg.push('\n');
    msg.push_str(&" ".repeat(indent));
    msg.push_str("^\n");
}

#[cfg(test)]
mod test {
    use super::*;
    use postro_wire::postgres::Severity;

    fn error(message: &str) -> ServerNotice {
        ServerNotice {
            severity: "ERROR".into(),
            severity_kind: Some(Severity::Error),
            code: "42703".into(),
            message: message.into(),
            ..Default::default()
        }
    }

    #[test]
    fn plain_error() {
        let notice = ServerNotice { code: "22012".into(), ..error("division by zero") };
        assert_eq!(
            format_notice(&notice, None, Verbosity::Default, ShowContext::Errors),
            "ERROR:  division by zero\n"
        );
        assert_eq!(
            format_notice(&notice, None, Verbosity::Sqlstate, ShowContext::Errors),
            "ERROR:  22012\n"
        );
        assert_eq!(
            format_notice(&notice, None, Verbosity::Verbose, ShowContext::Errors),
            "ERROR:  22012: division by zero\n"
        );
    }

    #[test]
    fn position_cursor() {
        let notice = ServerNotice { position: Some(8), ..error("column \"x\" does not exist") };
        assert_eq!(
            format_notice(&notice, Some("select x from t"), Verbosity::Default, ShowContext::Errors),
            format!("ERROR:  column \"x\" does not exist\nLINE 1: select x from t\n{}^\n", " ".repeat(15))
        );
        assert_eq!(
            format_notice(&notice, Some("select x from t"), Verbosity::Terse, ShowContext::Errors),
            "ERROR:  column \"x\" does not exist at character 8\n"
        );
    }

    #[test]
    fn position_on_second_line() {
        let notice = ServerNotice { position: Some(10), ..error("syntax error") };
        let msg = format_notice(&notice, Some("select\n  1 +;"), Verbosity::Default, ShowContext::Errors);
        assert_eq!(msg, format!("ERROR:  syntax error\nLINE 2:   1 +;\n{}^\n", " ".repeat(10)));
    }

    #[test]
    fn detail_hint_context() {
        let notice = ServerNotice {
            detail: Some("d".into()),
            hint: Some("h".into()),
            context: Some("c".into()),
            ..error("boom")
        };
        assert_eq!(
            format_notice(&notice, None, Verbosity::Default, ShowContext::Errors),
            "ERROR:  boom\nDETAIL:  d\nHINT:  h\nCONTEXT:  c\n"
        );
        assert_eq!(
            format_notice(&notice, None, Verbosity::Default, ShowContext::Never),
            "ERROR:  boom\nDETAIL:  d\nHINT:  h\n"
        );

        let warning = ServerNotice { severity: "WARNING".into(), severity_kind: Some(Severity::Warning), ..notice };
        assert_eq!(
            format_notice(&warning, None, Verbosity::Terse, ShowContext::Always),
            "WARNING:  boom\n"
        );
    }

    #[test]
    fn verbose_location() {
        let notice = ServerNotice {
            table: Some("t".into()),
            file: Some("parse.c".into()),
            line: Some("12".into()),
            routine: Some("transform".into()),
            ..error("bad")
        };
        assert_eq!(
            format_notice(&notice, None, Verbosity::Verbose, ShowContext::Errors),
            "ERROR:  42703: bad\nTABLE NAME:  t\nLOCATION:  transform, parse.c:12\n"
        );
    }
}
