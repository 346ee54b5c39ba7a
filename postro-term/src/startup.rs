//! Program startup: options, the initial connection, psqlrc files and the chosen actions.
use std::{
    fs::OpenOptions,
    io::IsTerminal,
    path::{Path, PathBuf},
};

use postro_wire::Config;

use crate::{
    cli::{Action, Cli},
    command::{handle_slash_command, set_query_output, CmdStatus, Context},
    conditional::ConditionalStack,
    connect::{connect_initial, PasswordPrompt},
    describe, help,
    input::{default_history_file, Input},
    mainloop::{self, EXIT_BADCONN, EXIT_FAILURE, EXIT_SUCCESS, EXIT_USER},
    print::pset,
    scan::Scanner,
    session::{Session, PROGNAME},
    shell,
    variables::{Echo, Variables},
    Error, Result,
};

/// Name of the startup file in the home directory.
const PSQLRC: &str = ".psqlrc";
/// Name of the system wide startup file.
const SYSPSQLRC: &str = "psqlrc";
const DEFAULT_SYSCONFDIR: &str = "/etc/postgresql-common";

/// What `--help` and `--version` print, `None` when the program should go on.
pub fn early_exit_text(cli: &Cli) -> Option<String> {
    if cli.version {
        return Some(format!("{PROGNAME} {}\n", help::VERSION));
    }
    Some(match cli.help.as_deref()? {
        "commands" => help::commands_text(&Default::default(), None, false),
        "variables" => help::variables_text(),
        _ => help::usage_text(),
    })
}

/// Variables given by flags, then `-v`.
pub fn initial_variables(cli: &Cli) -> Result<Variables> {
    let mut vars = Variables::with_defaults();
    let echo = if cli.echo_all {
        Some(Echo::All)
    } else if cli.echo_queries {
        Some(Echo::Queries)
    } else if cli.echo_errors {
        Some(Echo::Errors)
    } else {
        None
    };
    if let Some(echo) = echo {
        vars.set("ECHO", Some(echo.as_str()))?;
    }
    let flags = [
        ("ECHO_HIDDEN", cli.echo_hidden),
        ("QUIET", cli.quiet),
        ("SINGLESTEP", cli.single_step),
        ("SINGLELINE", cli.single_line),
    ];
    for (name, on) in flags {
        if on {
            vars.set(name, Some("on"))?;
        }
    }

    for assignment in &cli.set {
        match assignment.split_once('=') {
            Some((name, value)) => vars.set(name, Some(value))?,
            None => vars.unset(assignment)?,
        }
    }
    Ok(vars)
}

/// Printing options from the format flags, then `-P`.
fn apply_print_flags(session: &mut Session, cli: &Cli) -> Result<()> {
    let popt = &mut session.popt;
    if cli.no_align {
        pset::apply(popt, "format", Some("unaligned"))?;
    }
    if cli.csv {
        pset::apply(popt, "format", Some("csv"))?;
    }
    if cli.html {
        pset::apply(popt, "format", Some("html"))?;
    }
    if cli.expanded {
        pset::apply(popt, "expanded", Some("on"))?;
    }
    if cli.tuples_only {
        pset::apply(popt, "tuples_only", Some("on"))?;
    }
    if let Some(sep) = &cli.field_separator {
        pset::apply(popt, "fieldsep", Some(sep))?;
    }
    if cli.field_separator_zero {
        pset::apply(popt, "fieldsep_zero", None)?;
    }
    if let Some(sep) = &cli.record_separator {
        pset::apply(popt, "recordsep", Some(sep))?;
    }
    if cli.record_separator_zero {
        pset::apply(popt, "recordsep_zero", None)?;
    }
    if let Some(attr) = &cli.table_attr {
        pset::apply(popt, "tableattr", Some(attr))?;
    }
    for setting in &cli.pset {
        match setting.split_once('=') {
            Some((name, value)) => pset::apply(popt, name, Some(value))?,
            None => pset::apply(popt, setting, None)?,
        }
    }
    Ok(())
}

/// Connection parameters from the environment and the command line.
pub fn connect_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env();
    if let Some(host) = &cli.host {
        config.host = Some(host.clone());
    }
    if let Some(port) = &cli.port {
        config.port = Some(port.clone());
    }
    if let Some(user) = cli.user() {
        config.user = Some(user.to_owned());
    }
    match cli.dbname() {
        // values inside a connection string win over the separate flags
        Some(dbname) if Config::is_conninfo(dbname) => {
            let parsed = Config::parse(dbname).map_err(|err| Error::usage(err.to_string()))?;
            config.merge(&parsed);
        }
        Some(dbname) => config.dbname = Some(dbname.to_owned()),
        None if cli.list && config.dbname.is_none() => config.dbname = Some("postgres".into()),
        None => {}
    }
    config.fallback_application_name = Some(PROGNAME.into());
    Ok(config)
}

/// Startup files to try, the first readable of each group is run.
fn psqlrc_candidates(sysconfdir: &Path, user_rc: &Path, version: &str) -> Vec<Vec<PathBuf>> {
    let versioned = |base: &Path| {
        let mut parts = version.split('.');
        let major = parts.next().unwrap_or_default();
        let minor = parts.next().unwrap_or_default();
        let with_suffix = |suffix: &str| {
            let mut name = base.as_os_str().to_owned();
            name.push(format!("-{suffix}"));
            PathBuf::from(name)
        };
        vec![with_suffix(&format!("{major}.{minor}")), with_suffix(major), base.to_path_buf()]
    };
    vec![versioned(&sysconfdir.join(SYSPSQLRC)), versioned(user_rc)]
}

fn process_psqlrc(session: &mut Session) -> Result<()> {
    let sysconfdir = std::env::var("PGSYSCONFDIR").unwrap_or_else(|_| DEFAULT_SYSCONFDIR.into());
    let user_rc = match std::env::var("PSQLRC").ok().filter(|rc| !rc.is_empty()) {
        Some(rc) => Some(PathBuf::from(shell::expand_tilde(&rc))),
        None => dirs::home_dir().map(|home| home.join(PSQLRC)),
    };
    let Some(user_rc) = user_rc else {
        return Ok(());
    };

    for group in psqlrc_candidates(Path::new(&sysconfdir), &user_rc, help::VERSION) {
        if let Some(path) = group.iter().find(|path| path.is_file()) {
            tracing::debug!(path = %path.display(), "reading startup file");
            mainloop::process_file(session, &path.to_string_lossy(), false)?;
        }
    }
    Ok(())
}

/// Run one `-c` string, a backslash command or SQL.
fn run_command(session: &mut Session, text: &str) -> i32 {
    if session.vars.settings().echo == Echo::All {
        println!("{text}");
    }
    let ok = match text.strip_prefix('\\') {
        Some(slash) => {
            let mut scanner = Scanner::new();
            scanner.set_std_strings(session.std_strings);
            scanner.setup(slash);
            let mut cond = ConditionalStack::new();
            let mut cx = Context { session, scan: &mut scanner, cond: &mut cond, query: None, previous: None };
            handle_slash_command(&mut cx) != CmdStatus::Error
        }
        None => session.send_query(text),
    };
    if ok { EXIT_SUCCESS } else { EXIT_FAILURE }
}

/// `BEGIN`, `COMMIT` or `ROLLBACK` around `-1` actions.
fn transaction_command(session: &mut Session, sql: &str) -> bool {
    match session.exec_internal(sql) {
        Ok(_) => true,
        Err(err) => {
            session.report(&err);
            false
        }
    }
}

fn run_actions(session: &mut Session, cli: &Cli) -> i32 {
    if cli.single_transaction && !transaction_command(session, "BEGIN") && session.vars.settings().on_error_stop {
        return EXIT_USER;
    }

    let mut code = EXIT_SUCCESS;
    for action in &cli.actions {
        code = match action {
            Action::Command(text) => run_command(session, text),
            Action::File(fname) => match mainloop::process_file(session, fname, false) {
                Ok(code) => code,
                Err(err) => {
                    session.report(&err);
                    EXIT_FAILURE
                }
            },
        };
        if code != EXIT_SUCCESS && session.vars.settings().on_error_stop {
            break;
        }
    }

    if cli.single_transaction {
        let stop = session.vars.settings().on_error_stop;
        let end = if code != EXIT_SUCCESS && stop { "ROLLBACK" } else { "COMMIT" };
        if !transaction_command(session, end) && stop {
            return EXIT_USER;
        }
    }
    code
}

fn print_banner(session: &Session) {
    let server = session
        .conn
        .as_ref()
        .and_then(|conn| conn.parameter("server_version"))
        .map(|version| format!(", server {version}"))
        .unwrap_or_default();
    println!("{PROGNAME} ({}{server})", help::VERSION);
    println!("Type \"help\" for help.\n");
}

fn run_interactive(session: &mut Session) -> i32 {
    let histfile = session.vars.settings().histfile.clone();
    if let Some(term) = session.input.terminal_mut() {
        if let Some(path) = histfile.map(PathBuf::from).or_else(default_history_file) {
            term.load_history(path);
        }
    }
    if !session.quiet() {
        print_banner(session);
    }

    let code = mainloop::main_loop(session);

    let settings = session.vars.settings();
    let (histfile, histsize) = (settings.histfile.clone(), settings.histsize);
    if let Some(term) = session.input.terminal_mut() {
        term.finish(histfile.as_deref(), histsize);
    }
    code
}

/// Run the program, returns the exit code.
pub fn run(cli: Cli) -> i32 {
    if let Some(text) = early_exit_text(&cli) {
        print!("{text}");
        return EXIT_SUCCESS;
    }
    for extra in cli.extra_args() {
        eprintln!("{PROGNAME}: warning: extra command-line argument \"{extra}\" ignored");
    }

    let vars = match initial_variables(&cli) {
        Ok(vars) => vars,
        Err(err) => {
            eprintln!("{PROGNAME}: error: {err}");
            return EXIT_FAILURE;
        }
    };

    let notty = !std::io::stdin().is_terminal() || !std::io::stdout().is_terminal();
    let interactive = !notty && cli.actions.is_empty() && !cli.list;
    let input = match interactive && !cli.no_readline {
        true => match Input::terminal() {
            Ok(input) => input,
            Err(err) => {
                tracing::warn!(%err, "line editing unavailable");
                Input::stdin(true)
            }
        },
        false => Input::stdin(interactive),
    };

    let mut session = match Session::new(vars, input, interactive) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{PROGNAME}: error: {err}");
            return EXIT_FAILURE;
        }
    };
    session.password_prompt = match (cli.password, cli.no_password) {
        (true, _) => PasswordPrompt::Always,
        (false, true) => PasswordPrompt::Never,
        (false, false) => PasswordPrompt::Auto,
    };
    if let Err(err) = apply_print_flags(&mut session, &cli) {
        eprintln!("{PROGNAME}: error: {err}");
        return EXIT_FAILURE;
    }

    let config = match connect_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{PROGNAME}: error: {err}");
            return EXIT_BADCONN;
        }
    };
    if let Err(err) = connect_initial(&mut session, config) {
        eprintln!("{PROGNAME}: error: {err}");
        return EXIT_BADCONN;
    }

    if let Some(fname) = &cli.log_file {
        match OpenOptions::new().create(true).append(true).open(fname) {
            Ok(file) => session.log = Some(file),
            Err(err) => {
                eprintln!("{PROGNAME}: error: could not open log file \"{fname}\": {err}");
                return EXIT_FAILURE;
            }
        }
    }
    if let Some(fname) = &cli.output {
        if let Err(err) = set_query_output(&mut session, Some(fname)) {
            session.report(&err);
            return EXIT_FAILURE;
        }
    }

    if cli.list {
        return match describe::list_databases(&mut session, false) {
            Ok(true) => EXIT_SUCCESS,
            Ok(false) => EXIT_FAILURE,
            Err(err) => {
                session.report(&err);
                EXIT_FAILURE
            }
        };
    }

    if !cli.no_psqlrc {
        if let Err(err) = process_psqlrc(&mut session) {
            session.report(&err);
        }
    }

    let code = match cli.actions.is_empty() {
        false => run_actions(&mut session, &cli),
        true => run_interactive(&mut session),
    };

    if let Some(conn) = session.conn.take() {
        if let Err(err) = session.rt.block_on(conn.close()) {
            tracing::debug!(?err, "closing connection");
        }
    }
    let out = std::mem::replace(&mut session.out, crate::output::Output::stdout());
    if let Err(err) = out.close() {
        tracing::debug!(%err, "closing query output");
    }
    code
}

#[cfg(test)]
mod test {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_args_from(std::iter::once("postro-term").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn help_and_version() {
        assert_eq!(early_exit_text(&cli(&["-V"])), Some(format!("postro-term {}\n", help::VERSION)));
        assert!(early_exit_text(&cli(&["--help"])).unwrap().starts_with("postro-term is an interactive terminal"));
        assert!(early_exit_text(&cli(&["--help=variables"])).unwrap().contains("ON_ERROR_STOP"));
        assert!(early_exit_text(&cli(&["--help=commands"])).unwrap().starts_with("General\n"));
        assert_eq!(early_exit_text(&cli(&["-q"])), None);
    }

    #[test]
    fn flag_variables() {
        let vars = initial_variables(&cli(&["-a", "-q", "-v", "ON_ERROR_STOP=1", "--set=x=a=b"])).unwrap();
        assert_eq!(vars.get("ECHO"), Some("all"));
        assert_eq!(vars.get("QUIET"), Some("on"));
        assert_eq!(vars.get("ON_ERROR_STOP"), Some("1"));
        assert_eq!(vars.get("x"), Some("a=b"));
        assert!(vars.settings().on_error_stop);

        let vars = initial_variables(&cli(&["-v", "x=1", "-v", "x"])).unwrap();
        assert_eq!(vars.get("x"), None);

        assert!(initial_variables(&cli(&["-v", "ON_ERROR_STOP=maybe"])).is_err());
    }

    #[test]
    fn print_flags() {
        let mut session = Session::new(Variables::with_defaults(), Input::script("", None), false).unwrap();
        apply_print_flags(&mut session, &cli(&["-A", "-t", "-F", ";", "-P", "null=(null)", "-P", "footer=off"]))
            .unwrap();
        assert_eq!(session.popt.format, crate::print::Format::Unaligned);
        assert!(session.popt.tuples_only);
        assert_eq!(session.popt.field_sep.text, ";");
        assert_eq!(session.popt.null_print, "(null)");
        assert!(!session.popt.default_footer);
    }

    #[test]
    fn connection_flags() {
        let config = connect_config(&cli(&["-h", "db.local", "-p", "5433", "-U", "me", "app"])).unwrap();
        assert_eq!(config.host.as_deref(), Some("db.local"));
        assert_eq!(config.port.as_deref(), Some("5433"));
        assert_eq!(config.user.as_deref(), Some("me"));
        assert_eq!(config.dbname.as_deref(), Some("app"));
        assert_eq!(config.fallback_application_name.as_deref(), Some("postro-term"));

        let config = connect_config(&cli(&["-p", "1", "postgresql://u@h:6000/d"])).unwrap();
        assert_eq!(config.port.as_deref(), Some("6000"));
        assert_eq!(config.dbname.as_deref(), Some("d"));
    }

    #[test]
    fn startup_files() {
        let groups = psqlrc_candidates(Path::new("/etc/pg"), Path::new("/home/me/.psqlrc"), "1.2.3");
        assert_eq!(
            groups,
            [
                vec![
                    PathBuf::from("/etc/pg/psqlrc-1.2"),
                    PathBuf::from("/etc/pg/psqlrc-1"),
                    PathBuf::from("/etc/pg/psqlrc"),
                ],
                vec![
                    PathBuf::from("/home/me/.psqlrc-1.2"),
                    PathBuf::from("/home/me/.psqlrc-1"),
                    PathBuf::from("/home/me/.psqlrc"),
                ],
            ]
        );
    }
}
