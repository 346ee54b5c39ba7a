//! The `postro-term` binary, for behavior that needs no server.
use std::process::{Command, Output};

fn postro_term(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_postro-term"))
        .args(args)
        .env_remove("PGHOST")
        .env_remove("PGPORT")
        .env_remove("PGSERVICE")
        .env("PGCONNECT_TIMEOUT", "5")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn version() {
    let output = postro_term(&["--version"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), format!("postro-term {}\n", env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_sections() {
    let output = postro_term(&["--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("-c, --command=COMMAND"));

    let output = postro_term(&["--help=commands"]);
    assert!(stdout(&output).contains("\\watch [[i=]SEC] [c=N] [m=MIN]"));

    let output = postro_term(&["--help=variables"]);
    assert!(stdout(&output).contains("WATCH_INTERVAL"));
}

#[test]
fn unknown_option() {
    let output = postro_term(&["--no-such-option"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Try \"postro-term --help\""));
}

#[test]
fn connection_refused() {
    let output = postro_term(&["-X", "-w", "-h", "127.0.0.1", "-p", "1", "-c", "select 1"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("postro-term: error: "));
}
