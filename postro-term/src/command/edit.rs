//! Query buffer commands: `\e`, `\ef`, `\ev`, `\sf`, `\sv`, `\p`, `\r`, `\w`, `\s`, `\i` and
//! `\o`.
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};

use super::{CmdStatus, Context};
use crate::{
    mainloop,
    output::Output,
    print::pager,
    scan::{quote_ident, quote_literal, OptionKind},
    session::Session,
    shell,
    Error, Result,
};

/// Template offered by `\ef` without a function name.
const FUNCTION_TEMPLATE: &str = "CREATE FUNCTION ( )\n RETURNS \n LANGUAGE \n -- common options:  IMMUTABLE  STABLE  STRICT  SECURITY DEFINER\nAS $function$\n\n$function$\n";

/// Template offered by `\ev` without a view name.
const VIEW_TEMPLATE: &str = "CREATE VIEW  AS\n SELECT \n  -- something...\n";

fn parse_line_number(text: &str) -> Result<u32> {
    match text.parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(Error::usage(format!("invalid line number: {text}"))),
    }
}

fn mtime_and_len(path: &Path) -> Option<(SystemTime, u64)> {
    let meta = fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

/// Edit `text` in a temporary file, or `fname` when given.
///
/// Returns the new content, or `None` when the file was left unchanged.
fn do_edit(fname: Option<&str>, text: &str, line: Option<u32>) -> Result<Option<String>> {
    let (path, temporary) = match fname {
        Some(fname) => (PathBuf::from(fname), false),
        None => {
            let dir = std::env::var("TMPDIR").map(PathBuf::from).unwrap_or_else(|_| std::env::temp_dir());
            let path = dir.join(format!("psql.edit.{}.sql", std::process::id()));
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|err| Error::usage(format!("could not open temporary file \"{}\": {err}", path.display())))?;
            file.write_all(text.as_bytes())?;
            if !text.is_empty() && !text.ends_with('\n') {
                file.write_all(b"\n")?;
            }
            (path, true)
        }
    };

    let before = mtime_and_len(&path);
    let edited = shell::edit_file(&path, line).and_then(|_| {
        if mtime_and_len(&path) == before && before.is_some() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|err| Error::from(err).context(path.display().to_string()))
    });

    if temporary {
        if let Err(err) = fs::remove_file(&path) {
            tracing::warn!(%err, path = %path.display(), "could not remove temporary file");
        }
    }
    edited
}

pub(super) fn exec_edit(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    if cx.query.is_none() {
        return Err(Error::usage(format!("\\{name}: no query buffer")));
    }
    let mut fname = cx.arg(OptionKind::Normal, true);
    let mut line = cx.arg(OptionKind::Normal, true);
    if line.is_none() && fname.as_deref().is_some_and(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit())) {
        line = fname.take();
    }
    let line = line.as_deref().map(parse_line_number).transpose()?;
    let fname = fname.map(|f| shell::expand_tilde(&f));

    let discard_on_quit = match fname {
        Some(_) => true,
        None => cx.query.as_deref().is_some_and(|q| q.is_empty()) && cx.previous.is_some_and(|p| !p.is_empty()),
    };
    cx.copy_previous_query();

    let current = cx.query.as_deref().map(|q| q.as_str().to_owned()).unwrap_or_default();
    let edited = do_edit(fname.as_deref(), &current, line)?;
    if let Some(query) = cx.query.as_deref_mut() {
        match edited {
            Some(text) => query.set(text),
            None if discard_on_quit => query.reset(),
            None => {}
        }
    }
    Ok(CmdStatus::NewEdit)
}

/// Split a trailing line number off an object name.
fn strip_line_number(desc: &str) -> Result<(String, Option<u32>)> {
    let desc = desc.trim_end();
    if let Some((obj, last)) = desc.rsplit_once(char::is_whitespace) {
        if !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()) {
            return Ok((obj.trim_end().to_owned(), Some(parse_line_number(last)?)));
        }
    }
    Ok((desc.to_owned(), None))
}

/// Body line numbers count from the first line starting with `AS `, `BEGIN ` or `RETURN `.
fn is_body_start(line: &str) -> bool {
    line.starts_with("AS ") || line.starts_with("BEGIN ") || line.starts_with("RETURN ")
}

fn header_lines(source: &str) -> u32 {
    source.lines().take_while(|line| !is_body_start(line)).count() as u32
}

/// Look up the object and return its `CREATE` command.
fn fetch_source(session: &mut Session, desc: &str, view: bool) -> Result<Option<String>> {
    let cast = match (view, desc.contains('(')) {
        (true, _) => "regclass",
        (false, true) => "regprocedure",
        (false, false) => "regproc",
    };
    let sql = format!("SELECT {}::pg_catalog.{cast}::pg_catalog.oid", quote_literal(desc));
    let Some(result) = session.exec_internal(&sql)? else {
        return Ok(None);
    };
    let oid = result.get(0, 0).to_owned();

    if !view {
        let sql = format!("SELECT pg_catalog.pg_get_functiondef({oid})");
        let Some(result) = session.exec_internal(&sql)? else {
            return Ok(None);
        };
        return Ok(Some(result.get(0, 0).to_owned()));
    }

    let sql = format!(
        "SELECT nspname, relname, relkind, pg_catalog.pg_get_viewdef(c.oid, true), \
         pg_catalog.array_remove(pg_catalog.array_remove(c.reloptions,'check_option=local'),'check_option=cascaded') AS reloptions, \
         CASE WHEN 'check_option=local' = ANY (c.reloptions) THEN 'LOCAL'::text \
         WHEN 'check_option=cascaded' = ANY (c.reloptions) THEN 'CASCADED'::text ELSE NULL END AS checkoption \
         FROM pg_catalog.pg_class c LEFT JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid \
         WHERE c.oid = {oid}"
    );
    let Some(result) = session.exec_internal(&sql)? else {
        return Ok(None);
    };
    if result.ntuples() != 1 {
        return Err(Error::usage(format!("\"{desc}\" is not a view")));
    }
    match result.get(0, 2) {
        "v" => {}
        "m" => return Err(Error::usage("\\ev and \\sv do not support materialized views")),
        _ => return Err(Error::usage(format!("\"{desc}\" is not a view"))),
    }

    let mut source = format!(
        "CREATE OR REPLACE VIEW {}.{}",
        quote_ident(result.get(0, 0)),
        quote_ident(result.get(0, 1)),
    );
    let options = result.get(0, 4).trim_start_matches('{').trim_end_matches('}');
    if !options.is_empty() {
        source.push_str(&format!(" WITH ({options})"));
    }
    source.push_str(" AS\n");
    source.push_str(result.get(0, 3).trim_end().trim_end_matches(';'));
    if let Some(check) = result.value(0, 5) {
        source.push_str(&format!("\n WITH {check} CHECK OPTION"));
    }
    source.push_str(";\n");
    Ok(Some(source))
}

pub(super) fn exec_edit_source(cx: &mut Context<'_>, name: &str, view: bool) -> Result<CmdStatus> {
    let desc = cx.arg(OptionKind::WholeLine, true);
    if cx.query.is_none() {
        return Err(Error::usage(format!("\\{name}: no query buffer")));
    }
    let (desc, mut line) = match desc {
        Some(desc) => strip_line_number(&desc)?,
        None => (String::new(), None),
    };

    let source = if desc.is_empty() {
        if view { VIEW_TEMPLATE.to_owned() } else { FUNCTION_TEMPLATE.to_owned() }
    } else {
        match fetch_source(cx.session, &desc, view)? {
            Some(source) => source,
            None => return Ok(CmdStatus::SkipLine),
        }
    };
    if !view {
        line = line.map(|n| n + header_lines(&source));
    }

    let edited = do_edit(None, &source, line)?;
    if let Some(query) = cx.query.as_deref_mut() {
        query.set(edited.unwrap_or(source));
    }
    Ok(CmdStatus::NewEdit)
}

/// Source with body lines numbered, as `\sf+` and `\sv+` show it.
fn number_lines(source: &str, function: bool) -> String {
    let mut out = String::new();
    let mut in_header = function;
    let mut lineno = 0;
    for line in source.lines() {
        if in_header && is_body_start(line) {
            in_header = false;
        }
        if in_header {
            out.push_str(&format!("        {line}\n"));
        } else {
            lineno += 1;
            out.push_str(&format!("{lineno:<7} {line}\n"));
        }
    }
    out
}

pub(super) fn exec_show_source(cx: &mut Context<'_>, name: &str, view: bool, numbered: bool) -> Result<CmdStatus> {
    let desc = cx
        .arg(OptionKind::WholeLine, true)
        .ok_or_else(|| Error::usage(format!("\\{name}: {} name is required", if view { "view" } else { "function" })))?;
    let Some(source) = fetch_source(cx.session, &desc, view)? else {
        return Ok(CmdStatus::SkipLine);
    };
    let mut text = match numbered {
        true => number_lines(&source, !view),
        false => source,
    };
    if !text.ends_with('\n') {
        text.push('\n');
    }
    cx.session.write_paged(&text, None)?;
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_print(cx: &mut Context<'_>) -> Result<CmdStatus> {
    match cx.query_or_previous() {
        Some(text) => println!("{text}"),
        None if !cx.session.quiet() => println!("Query buffer is empty."),
        None => {}
    }
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_reset(cx: &mut Context<'_>) -> Result<CmdStatus> {
    if let Some(query) = cx.query.as_deref_mut() {
        query.reset();
    }
    cx.scan.reset();
    if !cx.session.quiet() {
        println!("Query buffer reset (cleared).");
    }
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_write(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    let fname = cx
        .arg(OptionKind::FilePipe, true)
        .ok_or_else(|| Error::usage(format!("\\{name}: missing required argument")))?;
    let text = cx.query_or_previous().map(str::to_owned);
    let fname = shell::expand_tilde(&fname);

    let mut out = Output::open(&fname).map_err(|err| Error::from(err).context(fname.clone()))?;
    if let Some(text) = text {
        writeln!(out, "{text}").map_err(|err| Error::from(err).context(fname.clone()))?;
    }
    let is_pipe = out.is_pipe();
    let status = out.close().map_err(|err| Error::from(err).context(fname.clone()))?;
    if is_pipe {
        shell::set_exit_status(&mut cx.session.vars, status.as_ref());
        if status.is_some_and(|s| !s.success()) {
            return Err(Error::usage(format!("{fname}: program failed")));
        }
    }
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_history(cx: &mut Context<'_>) -> Result<CmdStatus> {
    let fname = cx.arg(OptionKind::Normal, true).map(|f| shell::expand_tilde(&f));
    let histsize = cx.session.vars.settings().histsize;
    let quiet = cx.session.quiet();
    let Some(term) = cx.session.input.terminal_mut() else {
        return Err(Error::usage("history is not supported by this installation"));
    };

    match fname {
        Some(fname) => {
            term.save_history(Path::new(&fname), histsize)
                .map_err(|err| Error::usage(format!("could not save history to file \"{fname}\": {err}")))?;
            if !quiet {
                println!("Wrote history to file \"{fname}\".");
            }
        }
        None => {
            let text: String = term.history().map(|entry| format!("{entry}\n")).collect();
            if std::io::IsTerminal::is_terminal(&std::io::stdout()) {
                pager::page(&text, &cx.session.popt)?;
            } else {
                print!("{text}");
            }
        }
    }
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_include(cx: &mut Context<'_>, name: &str, relative: bool) -> Result<CmdStatus> {
    let fname = cx
        .arg(OptionKind::Normal, true)
        .ok_or_else(|| Error::usage(format!("\\{name}: missing required argument")))?;
    let fname = shell::expand_tilde(&fname);
    let code = mainloop::process_file(cx.session, &fname, relative)?;
    Ok(match code {
        mainloop::EXIT_SUCCESS => CmdStatus::SkipLine,
        _ => CmdStatus::Error,
    })
}

pub(super) fn exec_out(cx: &mut Context<'_>) -> Result<CmdStatus> {
    let fname = cx.arg(OptionKind::FilePipe, true).map(|f| shell::expand_tilde(&f));
    set_query_output(cx.session, fname.as_deref())?;
    Ok(CmdStatus::SkipLine)
}

/// Point the query output at `fname`, standard output when `None`.
pub fn set_query_output(session: &mut Session, fname: Option<&str>) -> Result<()> {
    let out = match fname {
        Some(fname) => Output::open(fname).map_err(|err| Error::from(err).context(fname.to_owned()))?,
        None => Output::stdout(),
    };
    let old = std::mem::replace(&mut session.out, out);
    let was_pipe = old.is_pipe();
    match old.close() {
        Ok(status) if was_pipe => shell::set_exit_status(&mut session.vars, status.as_ref()),
        Ok(_) => {}
        Err(err) => session.error(format!("could not close output: {err}")),
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn line_numbers_in_object_names() {
        assert_eq!(strip_line_number("foo(int) 12").unwrap(), ("foo(int)".into(), Some(12)));
        assert_eq!(strip_line_number("public.foo").unwrap(), ("public.foo".into(), None));
        assert_eq!(strip_line_number("v1").unwrap(), ("v1".into(), None));
        assert!(strip_line_number("foo 0").is_err());
    }

    #[test]
    fn numbered_function_source() {
        let source = "CREATE OR REPLACE FUNCTION f()\n RETURNS integer\nAS $function$\nselect 1\n$function$\n";
        assert_eq!(header_lines(source), 2);
        let numbered = number_lines(source, true);
        let lines: Vec<_> = numbered.lines().collect();
        assert_eq!(lines[0], "        CREATE OR REPLACE FUNCTION f()");
        assert_eq!(lines[2], "1       AS $function$");
        assert_eq!(lines[4], "3       $function$");
        assert!(number_lines("SELECT 1", false).starts_with("1       SELECT 1"));
    }

    #[test]
    fn query_output_redirection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut session = Session::new(
            crate::variables::Variables::with_defaults(),
            crate::input::Input::script("", None),
            false,
        )
        .unwrap();
        set_query_output(&mut session, path.to_str()).unwrap();
        session.write_out("to the file\n").unwrap();
        set_query_output(&mut session, None).unwrap();
        assert!(session.out.is_stdout());
        assert_eq!(fs::read_to_string(&path).unwrap(), "to the file\n");
    }
}
