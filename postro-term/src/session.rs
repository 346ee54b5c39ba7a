//! Terminal session state.
//!
//! One [`Session`] is threaded by mutable reference through the main loop, the meta-commands
//! and the send engine. It owns the connection, the variables, the printing options and the
//! current input source.
use std::{
    fmt,
    fs::File,
    io::{self, Write},
};

use postro_wire::{Connection, ServerNotice};

use crate::{
    buffer::QueryBuffer,
    conditional::ConditionalStack,
    connect::PasswordPrompt,
    copy::CopyRequest,
    input::Input,
    output::Output,
    print::{pager, PrintOptions},
    report::format_notice,
    result::PgResult,
    runtime::Runtime,
    scan::ScanContext,
    send::{Pipeline, SendMode},
    shell,
    variables::{EchoHidden, Variables},
    Error, ErrorKind, Result,
};

/// Name shown in front of diagnostics.
pub const PROGNAME: &str = "postro-term";

/// Modifiers collected by `\g` and friends for the next send only.
#[derive(Debug, Default)]
pub struct SendOptions {
    /// `\g file` or `\g |command`.
    pub fname: Option<String>,
    /// `\gset prefix`.
    pub gset_prefix: Option<String>,
    pub gexec: bool,
    pub gdesc: bool,
    /// `\crosstabview` column arguments.
    pub crosstab: Option<Vec<String>>,
    /// Printing options to restore after `\g (...)` or `\gx`.
    pub saved_popt: Option<PrintOptions>,
}

/// The last server error, for `\errverbose`.
#[derive(Debug, Clone)]
pub struct LastError {
    pub notice: ServerNotice,
    pub query: Option<String>,
}

/// Everything the terminal knows.
pub struct Session {
    pub vars: Variables,
    pub popt: PrintOptions,
    pub conn: Option<Connection>,
    /// Connection that was lost or replaced, kept only for its parameters.
    pub dead: Option<Connection>,
    pub rt: Runtime,
    pub input: Input,
    /// Line number in the current input.
    pub lineno: u64,
    /// Line number within the statement being typed, `%l`.
    pub stmt_lineno: u64,
    /// The main input is a terminal.
    pub interactive: bool,
    /// The current input source is the terminal, false while running `\i` or `-c`.
    pub cur_interactive: bool,
    pub out: Output,
    /// `-L`, queries and results are copied here.
    pub log: Option<File>,
    pub timing: bool,
    pub last_error: Option<LastError>,
    pub send_opts: SendOptions,
    pub send_mode: SendMode,
    pub pipeline: Pipeline,
    /// Source or sink chosen by `\copy`, used by the next COPY.
    pub copy: Option<CopyRequest>,
    /// Width of the last primary prompt, for `%w`.
    pub prompt1_width: usize,
    /// `standard_conforming_strings` of the server.
    pub std_strings: bool,
    /// `-W` or `-w`.
    pub password_prompt: PasswordPrompt,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.conn.is_some())
            .field("input", &self.input)
            .field("lineno", &self.lineno)
            .field("interactive", &self.interactive)
            .field("send_mode", &self.send_mode)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(vars: Variables, input: Input, interactive: bool) -> io::Result<Session> {
        Ok(Session {
            vars,
            popt: PrintOptions::default(),
            conn: None,
            dead: None,
            rt: Runtime::new()?,
            input,
            lineno: 0,
            stmt_lineno: 1,
            interactive,
            cur_interactive: interactive,
            out: Output::stdout(),
            log: None,
            timing: false,
            last_error: None,
            send_opts: SendOptions::default(),
            send_mode: SendMode::Query,
            pipeline: Pipeline::default(),
            copy: None,
            prompt1_width: 0,
            std_strings: true,
            password_prompt: PasswordPrompt::Auto,
        })
    }

    pub fn quiet(&self) -> bool {
        self.vars.settings().quiet
    }

    pub fn conn(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or_else(|| ErrorKind::NoConnection.into())
    }

    /// Connection to take parameters from, the live one or the dead one.
    pub fn param_conn(&self) -> Option<&Connection> {
        self.conn.as_ref().or(self.dead.as_ref())
    }

    /// `postro-term:file:line: ` while reading a file.
    fn locus(&self) -> Option<String> {
        let name = self.input.name()?;
        Some(match self.lineno {
            0 => format!("{PROGNAME}:{name}: "),
            n => format!("{PROGNAME}:{name}:{n}: "),
        })
    }

    /// Print a client side error.
    pub fn error(&self, message: impl fmt::Display) {
        match self.locus() {
            Some(locus) => eprintln!("{locus}error: {message}"),
            None if self.cur_interactive => eprintln!("{message}"),
            None => eprintln!("{PROGNAME}: error: {message}"),
        }
    }

    pub fn warning(&self, message: impl fmt::Display) {
        match self.locus() {
            Some(locus) => eprintln!("{locus}warning: {message}"),
            None if self.cur_interactive => eprintln!("{message}"),
            None => eprintln!("{PROGNAME}: warning: {message}"),
        }
    }

    /// Warn that the line just read had invalid UTF-8 replaced.
    pub fn warn_lossy_line(&self) {
        const MESSAGE: &str = "invalid byte sequence for encoding \"UTF8\" replaced";
        match self.input.name() {
            Some(_) => self.warning(MESSAGE),
            None => self.warning(format_args!("{MESSAGE}, line {}", self.lineno)),
        }
    }

    /// Print an informational message, like a server error, without a level.
    pub fn info(&self, message: impl fmt::Display) {
        let message = message.to_string();
        let message = message.trim_end_matches('\n');
        match self.locus() {
            Some(locus) => eprintln!("{locus}{message}"),
            None => eprintln!("{message}"),
        }
    }

    /// Report any error, server errors are rendered with their detail fields.
    pub fn report(&mut self, err: &Error) {
        tracing::debug!(?err, "command failed");
        match err.as_server() {
            Some(notice) => self.report_server(notice, None),
            None => {
                if let ErrorKind::Eval(_) = err.kind() {
                    self.warning(err);
                } else {
                    self.error(err);
                }
            }
        }
    }

    /// Print a server error, and remember it for `\errverbose`.
    pub fn report_server(&mut self, notice: &ServerNotice, query: Option<&str>) {
        let settings = self.vars.settings();
        self.info(format_notice(notice, query, settings.verbosity, settings.show_context));
        self.last_error = Some(LastError { notice: notice.clone(), query: query.map(str::to_owned) });
    }

    /// Print queued notices to stderr.
    pub fn emit_notices(&mut self) {
        let Some(conn) = self.conn.as_mut() else { return };
        let notices = conn.take_notices();
        let settings = self.vars.settings();
        for notice in notices {
            self.info(format_notice(&notice, None, settings.verbosity, settings.show_context));
        }
    }

    /// Print asynchronous notifications to the query output.
    pub fn emit_notifications(&mut self) -> Result<()> {
        let Some(conn) = self.conn.as_mut() else { return Ok(()) };
        for notify in conn.take_notifications() {
            let text = match notify.payload.as_str() {
                "" => format!(
                    "Asynchronous notification \"{}\" received from server process with PID {}.\n",
                    notify.channel, notify.sender_pid,
                ),
                payload => format!(
                    "Asynchronous notification \"{}\" with payload \"{payload}\" received from server process with PID {}.\n",
                    notify.channel, notify.sender_pid,
                ),
            };
            self.out.write_all(text.as_bytes())?;
        }
        self.out.flush()?;
        Ok(())
    }

    /// Write to the query output, and to the log file.
    pub fn write_out(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        self.write_log(text);
        Ok(())
    }

    /// Write rendered results, through the pager when they go to the terminal.
    pub fn write_paged(&mut self, text: &str, target: Option<&mut Output>) -> Result<()> {
        if target.is_none() && self.out.is_terminal() {
            pager::page(text, &self.popt)?;
            self.write_log(text);
            return Ok(());
        }
        self.write_unpaged(text, target)
    }

    /// Write rendered results to `target`, or the query output, never paging.
    pub fn write_unpaged(&mut self, text: &str, target: Option<&mut Output>) -> Result<()> {
        let out = match target {
            Some(target) => target,
            None => &mut self.out,
        };
        out.write_all(text.as_bytes())?;
        out.flush()?;
        self.write_log(text);
        Ok(())
    }

    pub fn write_log(&mut self, text: &str) {
        if let Some(log) = self.log.as_mut() {
            if let Err(err) = log.write_all(text.as_bytes()).and_then(|_| log.flush()) {
                tracing::warn!(%err, "could not write log file");
            }
        }
    }

    /// Record a query in the log file.
    pub fn log_query(&mut self, query: &str) {
        if self.log.is_some() {
            self.write_log(&format!(
                "********* QUERY **********\n{query}\n**************************\n\n"
            ));
        }
    }

    /// Run a query on behalf of a meta-command, echoed per `ECHO_HIDDEN`.
    ///
    /// Returns `None` when `ECHO_HIDDEN` is `noexec`.
    pub fn exec_internal(&mut self, sql: &str) -> Result<Option<PgResult>> {
        if self.conn.is_none() {
            return Err(ErrorKind::NoConnection.into());
        }
        let echo = self.vars.settings().echo_hidden;
        if echo != EchoHidden::Off {
            println!("/******** QUERY *********/\n{sql}\n/************************/\n");
            if let Some(log) = self.log.as_mut() {
                let _ = writeln!(log, "/******** QUERY *********/\n{sql}\n/************************/\n");
            }
            if echo == EchoHidden::NoExec {
                return Ok(None);
            }
        }

        let result = self.run_simple(sql)?;
        self.emit_notices();
        match result.error {
            Some(notice) => Err(Error::from(notice)),
            None => Ok(Some(result)),
        }
    }

    /// Update the variables that mirror the connection.
    pub fn sync_variables(&mut self) {
        let Some(conn) = self.conn.as_ref() else {
            return self.unsync_variables();
        };
        let host = conn.target().host().to_owned();
        let encoding = conn.parameter("client_encoding").unwrap_or("UTF8").to_owned();
        let version_name = conn.parameter("server_version").unwrap_or_default().to_owned();
        let version_num = conn.server_version_num().map(|n| n.to_string());
        let std_strings = conn.parameter("standard_conforming_strings") != Some("off");
        let pairs = [
            ("DBNAME", Some(conn.dbname().to_owned())),
            ("USER", Some(conn.user().to_owned())),
            ("HOST", Some(host)),
            ("PORT", Some(conn.target().port().to_string())),
            ("ENCODING", Some(encoding)),
            ("SERVER_VERSION_NAME", Some(version_name)),
            ("SERVER_VERSION_NUM", version_num),
            ("SERVICE", conn.config().service.clone()),
            ("SERVICEFILE", conn.config().servicefile.clone()),
        ];
        for (name, value) in pairs {
            let _ = self.vars.set(name, value.as_deref());
        }
        self.std_strings = std_strings;
    }

    /// Forget connection derived variables after losing the connection.
    pub fn unsync_variables(&mut self) {
        for name in ["DBNAME", "SERVICE", "SERVICEFILE", "USER", "HOST", "PORT", "ENCODING"] {
            let _ = self.vars.unset(name);
        }
    }

    /// Move a broken connection to the dead slot.
    pub fn connection_lost(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::debug!("connection lost");
            self.dead = Some(conn);
        }
        self.pipeline = Pipeline::default();
        self.send_mode = SendMode::Query;
        self.unsync_variables();
    }

    /// Settle the session after a failed command, returns whether the connection is still
    /// usable.
    pub fn check_connection(&mut self) -> bool {
        match self.conn.as_ref() {
            Some(conn) if conn.is_closed() => {
                eprintln!("The connection to the server was lost.");
                self.connection_lost();
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}

/// Variable and backtick lookups for the scanner, suppressed in skipped `\if` branches.
pub struct ScanEnv<'a> {
    pub session: &'a mut Session,
    pub active: bool,
}

impl<'a> ScanEnv<'a> {
    pub fn new(session: &'a mut Session, cond: &ConditionalStack) -> ScanEnv<'a> {
        ScanEnv { session, active: cond.is_active() }
    }
}

impl ScanContext for ScanEnv<'_> {
    fn variable(&mut self, name: &str) -> Option<String> {
        if !self.active {
            return None;
        }
        self.session.vars.get(name).map(str::to_owned)
    }

    fn backtick(&mut self, command: &str) -> Option<String> {
        if !self.active {
            return None;
        }
        match shell::backtick(&mut self.session.vars, command) {
            Ok(output) => Some(output),
            Err(err) => {
                self.session.error(err);
                None
            }
        }
    }
}

/// Print the query buffer, or the previous one when it is empty, for `\p` and `\w`.
pub fn buffer_or_previous<'a>(query: Option<&'a QueryBuffer>, previous: Option<&'a QueryBuffer>) -> Option<&'a str> {
    match (query, previous) {
        (Some(query), _) if !query.is_empty() => Some(query.as_str()),
        (_, Some(previous)) if !previous.is_empty() => Some(previous.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn session() -> Session {
        Session::new(Variables::with_defaults(), Input::script("", None), false).unwrap()
    }

    #[test]
    fn scan_env_suppression() {
        let mut session = session();
        session.vars.set("x", Some("1")).unwrap();
        let mut cond = ConditionalStack::new();

        let mut env = ScanEnv::new(&mut session, &cond);
        assert_eq!(env.variable("x").as_deref(), Some("1"));
        assert_eq!(env.backtick("echo hi").as_deref(), Some("hi"));

        cond.push(crate::conditional::IfState::False);
        let mut env = ScanEnv::new(&mut session, &cond);
        assert_eq!(env.variable("x"), None);
        assert_eq!(env.backtick("echo hi"), None);
    }

    #[test]
    fn no_connection() {
        let mut session = session();
        let err = session.exec_internal("select 1").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NoConnection));
        assert!(session.param_conn().is_none());
    }

    #[test]
    fn previous_buffer_fallback() {
        let mut query = QueryBuffer::new();
        let mut previous = QueryBuffer::new();
        assert_eq!(buffer_or_previous(Some(&query), Some(&previous)), None);
        previous.append("select 1;");
        assert_eq!(buffer_or_previous(Some(&query), Some(&previous)), Some("select 1;"));
        query.append("select 2");
        assert_eq!(buffer_or_previous(Some(&query), Some(&previous)), Some("select 2"));
    }
}
