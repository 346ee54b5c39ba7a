//! Query sending against a scripted backend.
mod mock;

use std::fs;

use mock::{Backend, Server};
use postro_term::{
    input::Input,
    mainloop::{self, EXIT_SUCCESS, EXIT_USER},
    print::Format,
    session::Session,
};

/// Run `script` with output captured to a file, unaligned.
fn run(server: &Server, script: &str) -> (i32, String, Session) {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");
    let mut session = server.session(&format!("\\o {}\n{script}\\o\n", out.display()));
    session.popt.format = Format::Unaligned;
    let code = mainloop::main_loop(&mut session);
    (code, fs::read_to_string(&out).unwrap_or_default(), session)
}

fn numbers(n: usize) -> Backend {
    let rows: Vec<Vec<Option<String>>> = (1..=n).map(|i| vec![Some(i.to_string())]).collect();
    let rows: Vec<Vec<Option<&str>>> = rows.iter().map(|r| r.iter().map(|v| v.as_deref()).collect()).collect();
    let rows: Vec<&[Option<&str>]> = rows.iter().map(Vec::as_slice).collect();
    Backend::new().rows("select n from numbers", &["n"], &rows)
}

#[test]
fn simple_query() {
    let server = numbers(2).start();
    let (code, out, _) = run(&server, "select n from numbers;\n");
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(out, "n\n1\n2\n(2 rows)\n");
    assert_eq!(server.messages(), ["Q:select n from numbers"]);
}

#[test]
fn empty_send_skips_transaction_start() {
    let server = numbers(1).start();
    let (code, _, _) = run(&server, "\\set AUTOCOMMIT off\n\\g\n");
    assert_eq!(code, EXIT_SUCCESS);
    assert!(server.messages().is_empty(), "{:?}", server.messages());

    let server = numbers(1).start();
    let (code, _, session) = run(&server, "\\set AUTOCOMMIT off\nselect n from numbers;\n");
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(server.messages(), ["Q:BEGIN", "Q:select n from numbers"]);
    assert_eq!(session.vars.get("ROW_COUNT"), Some("1"));
}

#[test]
fn fetch_count_prints_one_table() {
    let server = numbers(5).start();
    let (code, out, _) = run(&server, "\\set FETCH_COUNT 2\nselect n from numbers;\n");
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(out, "n\n1\n2\n3\n4\n5\n(5 rows)\n");
    assert_eq!(server.messages(), ["Q:select n from numbers"]);
}

#[test]
fn gset_with_prefix() {
    let server = Backend::new()
        .rows("select 1 as a, null as b", &["a", "b"], &[&[Some("1"), None]])
        .start();
    let (code, out, session) = run(&server, "\\set p_b old\nselect 1 as a, null as b \\gset p_\n");
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(out, "");
    assert_eq!(session.vars.get("p_a"), Some("1"));
    assert_eq!(session.vars.get("p_b"), None);
}

#[test]
fn gset_needs_one_row() {
    let server = numbers(2).start();
    let script = "\\set ON_ERROR_STOP on\nselect n from numbers \\gset\nselect n from numbers;\n";
    let (code, _, session) = run(&server, script);
    assert_eq!(code, EXIT_USER);
    assert_eq!(server.messages(), ["Q:select n from numbers"]);
    assert_eq!(session.vars.get("n"), None);
}

#[test]
fn gexec_runs_every_cell() {
    let server = Backend::new()
        .rows("select ddl from plan", &["ddl"], &[&[Some("create table a ()")], &[None], &[Some(
            "create table b ()",
        )]])
        .command("create table a ()", "CREATE TABLE")
        .command("create table b ()", "CREATE TABLE")
        .start();
    let (code, out, _) = run(&server, "select ddl from plan \\gexec\n");
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(out, "CREATE TABLE\nCREATE TABLE\n");
    assert_eq!(server.messages(), ["Q:select ddl from plan", "Q:create table a ()", "Q:create table b ()"]);
}

#[test]
fn server_error_stops_script() {
    let server = numbers(1)
        .error("select nope", "42703", "column \"nope\" does not exist")
        .start();
    let script = "\\set ON_ERROR_STOP on\nselect nope;\nselect n from numbers;\n";
    let (code, _, session) = run(&server, script);
    assert_eq!(code, EXIT_USER);
    assert_eq!(server.messages(), ["Q:select nope"]);
    assert_eq!(session.vars.get("ERROR"), Some("true"));
    assert_eq!(session.vars.get("LAST_ERROR_SQLSTATE"), Some("42703"));
}

#[test]
fn bind_uses_extended_protocol() {
    let server = Backend::new()
        .rows("select $1, $2", &["a", "b"], &[&[Some("7"), Some("x")]])
        .start();
    let (code, out, _) = run(&server, "select $1, $2 \\bind 7 x \\g\n");
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(out, "a|b\n7|x\n(1 row)\n");
    assert_eq!(server.messages(), ["P::select $1, $2", "B::[7,x]", "D:P", "E", "S"]);
}

#[test]
fn prepared_statement_lifecycle() {
    let server = Backend::new()
        .rows("select $1::int", &["int4"], &[&[Some("5")]])
        .start();
    let script = "select $1::int \\parse stmt\n\\bind_named stmt 5 \\g\n\\close_prepared stmt\n";
    let (code, out, _) = run(&server, script);
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(out, "int4\n5\n(1 row)\n");
    assert_eq!(server.messages(), [
        "P:stmt:select $1::int",
        "S",
        "B:stmt:[5]",
        "D:P",
        "E",
        "S",
        "C:Sstmt",
        "S",
    ]);
}

#[test]
fn pipeline_aborts_after_error() {
    let server = Backend::new()
        .rows("select 1", &["n"], &[&[Some("1")]])
        .rows("select 2", &["n"], &[&[Some("2")]])
        .rows("select 3", &["n"], &[&[Some("3")]])
        .error("select bad", "42601", "syntax error")
        .start();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");
    let script = format!(
        "\\o {}\n\\startpipeline\nselect 1 \\bind \\sendpipeline\nselect bad \\bind \\sendpipeline\n\
         select 2 \\bind \\sendpipeline\n\\syncpipeline\nselect 3 \\bind \\sendpipeline\n",
        out.display()
    );
    let mut session = server.session(&script);
    session.popt.format = Format::Unaligned;
    assert_eq!(mainloop::main_loop(&mut session), EXIT_SUCCESS);
    assert!(session.pipeline.on);
    assert_eq!(session.pipeline.piped_commands, 1);
    assert_eq!(session.pipeline.piped_syncs, 1);
    assert_eq!(session.pipeline.available_results, 3);
    // queued but not sent yet
    assert!(!server.messages().iter().any(|m| m == "P::select 3"));

    session.input = Input::script("\\getresults\n", Some("more.sql"));
    assert_eq!(mainloop::main_loop(&mut session), EXIT_SUCCESS);
    assert_eq!(session.pipeline.piped_syncs, 0);
    assert_eq!(session.pipeline.available_results, 0);
    assert_eq!(session.vars.get("ERROR"), Some("true"));

    session.input = Input::script("\\endpipeline\n\\o\n", Some("end.sql"));
    assert_eq!(mainloop::main_loop(&mut session), EXIT_SUCCESS);
    assert!(!session.pipeline.on);

    assert_eq!(fs::read_to_string(&out).unwrap(), "n\n1\n(1 row)\nn\n3\n(1 row)\n");
    assert_eq!(server.messages(), [
        "P::select 1",
        "B::[]",
        "D:P",
        "E",
        "P::select bad",
        "B::[]",
        "D:P",
        "E",
        // the rest of the failed batch is skipped up to its sync
        "P",
        "B",
        "D",
        "E",
        "S",
        "P::select 3",
        "B::[]",
        "D:P",
        "E",
        "S",
    ]);
}

#[test]
fn crosstab_view() {
    let sales: &[&[Option<&str>]] = &[
        &[Some("north"), Some("jan"), Some("10")],
        &[Some("north"), Some("feb"), Some("20")],
        &[Some("south"), Some("feb"), Some("30")],
    ];
    let server = Backend::new()
        .rows("select region, month, total from sales", &["region", "month", "total"], sales)
        .rows("select region, month from sales", &["region", "month"], &[&[Some("north"), Some("jan")]])
        .start();
    let (code, out, _) = run(&server, "select region, month, total from sales \\crosstabview\n");
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(out, "region|jan|feb\nnorth|10|20\nsouth||30\n(2 rows)\n");

    let script = "\\set ON_ERROR_STOP on\nselect region, month from sales \\crosstabview\n";
    let (code, out, _) = run(&server, script);
    assert_eq!(code, EXIT_USER);
    assert_eq!(out, "");
}

#[test]
fn watch_repeats_until_count_or_min_rows() {
    let server = numbers(1).start();
    let (code, out, _) = run(&server, "select n from numbers \\watch i=0 c=2\n");
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(server.messages(), ["Q:select n from numbers", "Q:select n from numbers"]);
    assert_eq!(out.matches("(1 row)").count(), 2);

    // fewer rows than asked for ends the loop after the first run
    let server = numbers(1).start();
    let (code, _, _) = run(&server, "select n from numbers \\watch i=0 c=5 m=2\n");
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(server.messages(), ["Q:select n from numbers"]);
}
