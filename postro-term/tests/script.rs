//! Scripts run through the main loop without a server.
use std::{fs, path::Path};

use postro_term::{
    input::Input,
    mainloop::{self, EXIT_SUCCESS, EXIT_USER},
    print::Format,
    session::Session,
    variables::Variables,
};

fn session(script: &str) -> Session {
    Session::new(Variables::with_defaults(), Input::script(script, Some("script.sql")), false).unwrap()
}

fn run(script: &str) -> (i32, Session) {
    let mut session = session(script);
    let code = mainloop::main_loop(&mut session);
    (code, session)
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn query_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");
    let script = format!(
        "\\set name world\n\\o {}\n\\qecho hello :name\n\\qecho -n :'name'\n\\o\n",
        out.display()
    );
    let (code, _) = run(&script);
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(read(&out), "hello world\n'world'");
}

#[test]
fn write_query_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("query.sql");
    let script = format!("select 1,\n  2 \\w {}\n", out.display());
    let (code, _) = run(&script);
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(read(&out), "select 1,\n  2 \n");
}

#[test]
fn backslash_inside_string_is_not_a_command() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("query.sql");
    // `\g` would try to send and stop the script, there is no connection
    let script = format!("\\set ON_ERROR_STOP on\nselect '\\g not a command' \\w {}\n\\r\n", out.display());
    let (code, _) = run(&script);
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(read(&out).trim_end(), "select '\\g not a command'");
}

#[test]
fn skipped_branch_discards_text() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("query.sql");
    let script = format!(
        "\\set ON_ERROR_STOP on\n\\if false\nselect 1;\n\\endif\nselect 2 \\w {}\n\\r\n",
        out.display()
    );
    let (code, _) = run(&script);
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(read(&out), "select 2 \n");
}

#[test]
fn unterminated_statement_sent_at_end() {
    // the leftover buffer is sent at end of input, which fails without a connection
    let (code, _) = run("\\set ON_ERROR_STOP on\nselect 1\n");
    assert_eq!(code, EXIT_USER);

    let (code, _) = run("select 1\n");
    assert_eq!(code, EXIT_SUCCESS);

    let (code, _) = run("\\set ON_ERROR_STOP on\nselect 1\n\\r\n");
    assert_eq!(code, EXIT_SUCCESS);
}

#[test]
fn branch_on_variable() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");
    let script = format!(
        "\\set x 2\n\\o {}\n\\if :x = 2\n\\qecho yes\n\\else\n\\qecho no\n\\endif\n\\if :x = 3\n\\qecho three\n\\elif :{{?x}}\n\\qecho defined\n\\endif\n\\o\n",
        out.display()
    );
    let (code, _) = run(&script);
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(read(&out), "yes\ndefined\n");
}

#[test]
fn skipped_branch_runs_no_backticks() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    let script = format!("\\if false\n\\set x `touch {}`\n\\endif\n", marker.display());
    let (code, session) = run(&script);
    assert_eq!(code, EXIT_SUCCESS);
    assert!(!marker.exists());
    assert_eq!(session.vars.get("x"), None);
}

#[test]
fn qualified_name_too_deep() {
    let (code, session) = run("\\set ON_ERROR_STOP on\n\\d a.b.c.d\n\\set after 1\n");
    assert_eq!(code, EXIT_USER);
    assert_eq!(session.vars.get("after"), None);

    let (code, session) = run("\\d a.b.c.d\n\\set after 1\n");
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(session.vars.get("after"), Some("1"));
}

#[test]
fn include_files() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("inner.sql"), "\\set inner yes\n").unwrap();
    fs::write(sub.join("outer.sql"), "\\set outer yes\n\\ir inner.sql\n").unwrap();

    let script = format!("\\i {}\n", sub.join("outer.sql").display());
    let (code, session) = run(&script);
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(session.vars.get("outer"), Some("yes"));
    assert_eq!(session.vars.get("inner"), Some("yes"));
}

#[test]
fn include_error_stops_script() {
    let dir = tempfile::tempdir().unwrap();
    let inner = dir.path().join("inner.sql");
    fs::write(&inner, "\\unknowncommand\n\\set inner_after 1\n").unwrap();

    let script = format!("\\set ON_ERROR_STOP on\n\\i {}\n\\set outer_after 1\n", inner.display());
    let (code, session) = run(&script);
    assert_eq!(code, EXIT_USER);
    assert_eq!(session.vars.get("inner_after"), None);
    assert_eq!(session.vars.get("outer_after"), None);
}

#[test]
fn print_settings() {
    let (code, session) = run("\\pset format unaligned\n\\pset null '(null)'\n\\t\n\\x\n\\a\n");
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(session.popt.format, Format::Aligned);
    assert_eq!(session.popt.null_print, "(null)");
    assert!(session.popt.tuples_only);
}

#[test]
fn unset_is_idempotent() {
    let (code, session) = run("\\set x 1\n\\unset x\n\\unset x\n");
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(session.vars.get("x"), None);
}

#[test]
fn gset_without_connection_fails() {
    let (code, _) = run("\\set ON_ERROR_STOP on\nselect 1 as x \\gset\n");
    assert_eq!(code, EXIT_USER);
}

#[test]
fn invalid_utf8_line_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("query.sql");
    let mut script = b"select 'a\xffb' ".to_vec();
    script.extend_from_slice(format!("\\w {}\n\\r\n", out.display()).as_bytes());
    let input = Input::Reader {
        reader: Box::new(std::io::Cursor::new(script)),
        name: Some("script.sql".into()),
        prompt: false,
    };
    let mut session = Session::new(Variables::with_defaults(), input, false).unwrap();
    let code = mainloop::main_loop(&mut session);
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(read(&out), "select 'a\u{fffd}b' \n");
}
