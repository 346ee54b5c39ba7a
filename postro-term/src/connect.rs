//! Connection manager: the initial connection, `\c` and `\conninfo`.
//!
//! `\c` builds the new configuration from the previous connection, live or dead, unless told
//! not to. The old password is reused only while user, host, hostaddr and port stay the same.
use std::io::IsTerminal;

use postro_wire::{Config, Connection, ErrorKind as WireKind};

use crate::{session::Session, Error, Result};

/// When to ask for a password, `-W` and `-w`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PasswordPrompt {
    /// Ask when the server requires one.
    #[default]
    Auto,
    /// Ask before connecting.
    Always,
    Never,
}

/// Positional arguments of `\c`, `-` or `None` keeps the previous value.
#[derive(Debug, Default, Clone)]
pub struct ConnectArgs {
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
}

impl ConnectArgs {
    fn given(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|v| *v != "-")
    }

    fn is_complete(&self) -> bool {
        [&self.dbname, &self.user, &self.host, &self.port].iter().all(|v| Self::given(v).is_some())
    }
}

fn prompt_password(user: &str) -> Result<String> {
    rpassword::prompt_password(format!("Password for user {user}: "))
        .map_err(|err| Error::from(err).context("could not read password"))
}

/// Connect with `config`, asking for a password when the server wants one and `ask` allows.
pub fn establish(session: &mut Session, mut config: Config, ask: bool) -> Result<Connection> {
    if session.password_prompt == PasswordPrompt::Always && config.password.is_none() {
        config.password = Some(prompt_password(&config.user_or_default())?);
    }
    loop {
        tracing::debug!(conninfo = %redacted(&config), "connecting");
        match session.rt.block_on(Connection::connect(&config)) {
            Ok(conn) => return Ok(conn),
            Err(err)
                if matches!(err.kind(), WireKind::PasswordRequired)
                    && config.password.is_none()
                    && session.password_prompt != PasswordPrompt::Never
                    && ask =>
            {
                config.password = Some(prompt_password(&config.user_or_default())?);
            }
            Err(err) => return Err(Error::connection(format!("connection to server failed: {err}"))),
        }
    }
}

fn redacted(config: &Config) -> String {
    let mut config = config.clone();
    if config.password.is_some() {
        config.password = Some("********".into());
    }
    config.to_conninfo()
}

/// First connection at startup.
pub fn connect_initial(session: &mut Session, config: Config) -> Result<()> {
    let ask = std::io::stdin().is_terminal();
    let conn = establish(session, config, ask)?;
    install(session, conn);
    Ok(())
}

/// Make `conn` the current connection.
fn install(session: &mut Session, conn: Connection) {
    session.conn = Some(conn);
    session.dead = None;
    session.sync_variables();
}

/// Merge `args` over the previous connection's configuration.
pub fn build_config(previous: Option<&Connection>, args: &ConnectArgs, reuse: Option<bool>) -> Result<Config> {
    let dbname = ConnectArgs::given(&args.dbname);
    let connstr = dbname.filter(|d| Config::is_conninfo(d));
    let reuse = reuse.unwrap_or(connstr.is_none());

    let previous = previous.filter(|_| reuse);
    if reuse && previous.is_none() && !args.is_complete() && connstr.is_none() {
        return Err(Error::usage(
            "All connection parameters must be supplied because no database connection exists",
        ));
    }

    let mut config = match previous {
        Some(conn) => {
            let mut config = conn.config().clone();
            config.password = conn.password().map(str::to_owned);
            config
        }
        None => Config::from_env(),
    };
    let before = config.clone();

    match connstr {
        Some(connstr) => {
            let parsed = Config::parse(connstr).map_err(|err| Error::usage(err.to_string()))?;
            config.merge(&parsed);
        }
        None => {
            if let Some(dbname) = dbname {
                config.dbname = Some(dbname.to_owned());
            }
            if let Some(user) = ConnectArgs::given(&args.user) {
                config.user = Some(user.to_owned());
            }
            if let Some(host) = ConnectArgs::given(&args.host) {
                config.host = Some(host.to_owned());
                config.hostaddr = None;
            }
            if let Some(port) = ConnectArgs::given(&args.port) {
                config.port = Some(port.to_owned());
            }
        }
    }

    let same_endpoint = config.user_or_default() == before.user_or_default()
        && config.host == before.host
        && config.hostaddr == before.hostaddr
        && config.port == before.port;
    if !same_endpoint && config.password == before.password {
        config.password = None;
    }
    Ok(config)
}

/// `\c`, returns `false` after reporting a failed connection attempt.
pub fn do_connect(session: &mut Session, args: &ConnectArgs, reuse: Option<bool>) -> Result<bool> {
    let previous = session.param_conn();
    let old_target = previous.map(|c| (c.target().clone(), c.user().to_owned()));
    let config = match build_config(previous, args, reuse) {
        Ok(config) => config,
        Err(err) => {
            give_up(session);
            return Err(err);
        }
    };

    let ask = session.cur_interactive;
    let conn = match establish(session, config, ask) {
        Ok(conn) => conn,
        Err(err) => {
            session.error(&err);
            if session.cur_interactive && session.conn.is_some() {
                eprintln!("Previous connection kept");
            } else {
                give_up(session);
            }
            return Ok(false);
        }
    };

    if let Some(old) = session.conn.take() {
        if let Err(err) = session.rt.block_on(old.close()) {
            tracing::debug!(?err, "closing previous connection");
        }
    }
    let same_endpoint = old_target.is_some_and(|(target, user)| target == *conn.target() && user == conn.user());
    install(session, conn);

    if !session.quiet() {
        let message = match same_endpoint {
            true => {
                let conn = session.conn()?;
                format!("You are now connected to database \"{}\" as user \"{}\".", conn.dbname(), conn.user())
            }
            false => connection_line(session, "now connected"),
        };
        println!("{message}");
    }
    Ok(true)
}

/// In a script a failed `\c` must not leave the old connection in use.
fn give_up(session: &mut Session) {
    if session.cur_interactive {
        return;
    }
    if let Some(old) = session.conn.take() {
        let _ = session.rt.block_on(old.close());
        session.unsync_variables();
    }
}

/// `You are {verb} to database ... at port ...`.
fn connection_line(session: &Session, verb: &str) -> String {
    let Some(conn) = session.conn.as_ref() else {
        return "You are currently not connected to a database.".into();
    };
    let target = conn.target();
    let (db, user, port) = (conn.dbname(), conn.user(), target.port());
    let hostaddr = conn.config().hostaddr.as_deref().filter(|a| !a.is_empty());
    match (target.is_unix(), hostaddr) {
        (true, Some(addr)) => {
            format!("You are {verb} to database \"{db}\" as user \"{user}\" on address \"{addr}\" at port \"{port}\".")
        }
        (true, None) => format!(
            "You are {verb} to database \"{db}\" as user \"{user}\" via socket in \"{}\" at port \"{port}\".",
            target.host()
        ),
        (false, Some(addr)) if addr != target.host() => {
            let host = conn.config().host.as_deref().unwrap_or(addr);
            format!(
                "You are {verb} to database \"{db}\" as user \"{user}\" on host \"{host}\" (address \"{addr}\") at port \"{port}\"."
            )
        }
        (false, _) => format!(
            "You are {verb} to database \"{db}\" as user \"{user}\" on host \"{}\" at port \"{port}\".",
            target.host()
        ),
    }
}

/// `\conninfo`.
pub fn conninfo(session: &Session) -> String {
    connection_line(session, "connected")
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(values: [&str; 4]) -> ConnectArgs {
        let [dbname, user, host, port] = values.map(|v| (!v.is_empty()).then(|| v.to_owned()));
        ConnectArgs { dbname, user, host, port }
    }

    #[test]
    fn no_previous_connection() {
        let err = build_config(None, &args(["db", "", "", ""]), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "All connection parameters must be supplied because no database connection exists"
        );

        let config = build_config(None, &args(["db", "me", "/tmp", "5433"]), None).unwrap();
        assert_eq!(config.dbname.as_deref(), Some("db"));
        assert_eq!(config.user.as_deref(), Some("me"));
        assert_eq!(config.host.as_deref(), Some("/tmp"));
        assert_eq!(config.port.as_deref(), Some("5433"));
    }

    #[test]
    fn connection_strings_do_not_need_a_previous_connection() {
        let config = build_config(None, &args(["postgresql://me@localhost:5433/db", "", "", ""]), None).unwrap();
        assert_eq!(config.dbname.as_deref(), Some("db"));
        assert_eq!(config.port.as_deref(), Some("5433"));

        let config = build_config(None, &args(["dbname=db user=me", "", "", ""]), Some(false)).unwrap();
        assert_eq!(config.user.as_deref(), Some("me"));
    }

    #[test]
    fn dash_means_keep() {
        let given = args(["-", "-", "-", "-"]);
        assert!(!given.is_complete());
        assert_eq!(ConnectArgs::given(&given.dbname), None);
    }

    #[test]
    fn disconnected_conninfo() {
        let session = Session::new(
            crate::variables::Variables::with_defaults(),
            crate::input::Input::script("", None),
            false,
        )
        .unwrap();
        assert_eq!(conninfo(&session), "You are currently not connected to a database.");
    }
}
