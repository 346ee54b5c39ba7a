//! `\c` against a scripted backend: which settings carry over, the password in particular.
mod mock;

use mock::Backend;
use postro_term::{
    connect::{self, build_config, ConnectArgs, PasswordPrompt},
    input::Input,
    mainloop::{self, EXIT_SUCCESS},
    session::Session,
    variables::Variables,
};

fn args(dbname: Option<&str>, user: Option<&str>, host: Option<&str>, port: Option<&str>) -> ConnectArgs {
    ConnectArgs {
        dbname: dbname.map(str::to_owned),
        user: user.map(str::to_owned),
        host: host.map(str::to_owned),
        port: port.map(str::to_owned),
    }
}

#[test]
fn password_kept_for_same_endpoint() {
    let server = Backend::new().password("hunter2").start();
    let session = server.session("");
    let conn = session.conn.as_ref();

    let config = build_config(conn, &args(Some("other"), None, None, None), None).unwrap();
    assert_eq!(config.dbname.as_deref(), Some("other"));
    assert_eq!(config.password.as_deref(), Some("hunter2"));

    // `-` keeps the previous value
    let config = build_config(conn, &args(Some("-"), Some("-"), Some("-"), Some("-")), None).unwrap();
    assert_eq!(config.dbname.as_deref(), Some("app"));
    assert_eq!(config.password.as_deref(), Some("hunter2"));

    for changed in [
        args(None, Some("bob"), None, None),
        args(None, None, Some("localhost"), None),
        args(None, None, None, Some("1")),
    ] {
        let config = build_config(conn, &changed, None).unwrap();
        assert_eq!(config.password, None, "{changed:?}");
    }

    // without reuse nothing carries over
    let config = build_config(conn, &args(Some("other"), None, None, None), Some(false)).unwrap();
    assert_ne!(config.password.as_deref(), Some("hunter2"));
}

#[test]
fn host_change_clears_hostaddr() {
    let server = Backend::new().password("hunter2").start();
    let mut config = server.config();
    config.hostaddr = Some("127.0.0.1".into());

    let mut session =
        Session::new(Variables::with_defaults(), Input::script("", Some("script.sql")), false).unwrap();
    session.password_prompt = PasswordPrompt::Never;
    connect::connect_initial(&mut session, config).unwrap();
    let conn = session.conn.as_ref();

    let config = build_config(conn, &args(Some("other"), None, None, None), None).unwrap();
    assert_eq!(config.hostaddr.as_deref(), Some("127.0.0.1"));
    assert_eq!(config.password.as_deref(), Some("hunter2"));

    let config = build_config(conn, &args(None, None, Some("127.0.0.1"), None), None).unwrap();
    assert_eq!(config.hostaddr, None);
    assert_eq!(config.password, None);
}

#[test]
fn no_password_to_reuse() {
    let server = Backend::new().start();
    let session = server.session("");
    let config = build_config(session.conn.as_ref(), &args(Some("other"), None, None, None), None).unwrap();
    assert_eq!(config.password, None);
}

#[test]
fn reconnect_reuses_password() {
    let server = Backend::new().password("hunter2").start();
    let mut session = server.session("\\c other\n");
    assert_eq!(mainloop::main_loop(&mut session), EXIT_SUCCESS);
    assert_eq!(session.vars.get("DBNAME"), Some("other"));
    assert_eq!(session.vars.get("USER"), Some("alice"));

    let log = server.log();
    let other = log.iter().position(|m| m == "startup:alice:other").expect("second startup");
    assert_eq!(log.get(other + 1).map(String::as_str), Some("password:ok"));
}

#[test]
fn failed_reconnect_drops_connection() {
    let server = Backend::new().password("hunter2").start();
    let mut session = server.session("\\c - bob\n");
    mainloop::main_loop(&mut session);
    assert!(session.conn.is_none());
    assert_eq!(session.vars.get("DBNAME"), None);
    assert!(server.log().iter().any(|m| m == "startup:bob:app"));
    assert!(!server.log().iter().any(|m| m == "password:bad"));
}
