//! Command line options.
use std::ffi::OsString;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};

/// `-c` and `-f`, run in the order given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Command(String),
    File(String),
}

#[derive(Parser, Debug, Default)]
#[command(
    name = "postro-term",
    about = "postro-term is an interactive terminal for Postgres.",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// run only single command (SQL or internal) and exit
    #[arg(short = 'c', long = "command", value_name = "COMMAND")]
    pub command: Vec<String>,
    /// database name to connect to
    #[arg(short = 'd', long = "dbname", value_name = "DBNAME")]
    pub dbname_opt: Option<String>,
    /// execute commands from file, then exit
    #[arg(short = 'f', long = "file", value_name = "FILENAME")]
    pub file: Vec<String>,
    /// list available databases, then exit
    #[arg(short = 'l', long)]
    pub list: bool,
    /// set variable NAME to VALUE
    #[arg(short = 'v', long = "set", visible_alias = "variable", value_name = "NAME=VALUE")]
    pub set: Vec<String>,
    /// output version information, then exit
    #[arg(short = 'V', long)]
    pub version: bool,
    /// do not read startup file (~/.psqlrc)
    #[arg(short = 'X', long)]
    pub no_psqlrc: bool,
    /// execute as a single transaction (if non-interactive)
    #[arg(short = '1', long)]
    pub single_transaction: bool,
    /// show help, then exit
    #[arg(
        short = '?',
        long = "help",
        value_name = "SECTION",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "options"
    )]
    pub help: Option<String>,

    /// echo all input from script
    #[arg(short = 'a', long)]
    pub echo_all: bool,
    /// echo failed commands
    #[arg(short = 'b', long)]
    pub echo_errors: bool,
    /// echo commands sent to server
    #[arg(short = 'e', long)]
    pub echo_queries: bool,
    /// display queries that internal commands generate
    #[arg(short = 'E', long)]
    pub echo_hidden: bool,
    /// send session log to file
    #[arg(short = 'L', long, value_name = "FILENAME")]
    pub log_file: Option<String>,
    /// disable enhanced command line editing
    #[arg(short = 'n', long)]
    pub no_readline: bool,
    /// send query results to file (or |pipe)
    #[arg(short = 'o', long, value_name = "FILENAME")]
    pub output: Option<String>,
    /// run quietly (no messages, only query output)
    #[arg(short = 'q', long)]
    pub quiet: bool,
    /// single-step mode (confirm each query)
    #[arg(short = 's', long)]
    pub single_step: bool,
    /// single-line mode (end of line terminates SQL command)
    #[arg(short = 'S', long)]
    pub single_line: bool,

    /// unaligned table output mode
    #[arg(short = 'A', long)]
    pub no_align: bool,
    /// CSV (Comma-Separated Values) table output mode
    #[arg(long)]
    pub csv: bool,
    /// field separator for unaligned output
    #[arg(short = 'F', long, value_name = "STRING")]
    pub field_separator: Option<String>,
    /// HTML table output mode
    #[arg(short = 'H', long)]
    pub html: bool,
    /// set printing option VAR to ARG (see \pset command)
    #[arg(short = 'P', long, value_name = "VAR[=ARG]")]
    pub pset: Vec<String>,
    /// record separator for unaligned output
    #[arg(short = 'R', long, value_name = "STRING")]
    pub record_separator: Option<String>,
    /// print rows only
    #[arg(short = 't', long)]
    pub tuples_only: bool,
    /// set HTML table tag attributes
    #[arg(short = 'T', long, value_name = "TEXT")]
    pub table_attr: Option<String>,
    /// turn on expanded table output
    #[arg(short = 'x', long)]
    pub expanded: bool,
    /// set field separator for unaligned output to zero byte
    #[arg(short = 'z', long)]
    pub field_separator_zero: bool,
    /// set record separator for unaligned output to zero byte
    #[arg(short = '0', long)]
    pub record_separator_zero: bool,

    /// database server host or socket directory
    #[arg(short = 'h', long, value_name = "HOSTNAME")]
    pub host: Option<String>,
    /// database server port
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<String>,
    /// database user name
    #[arg(short = 'U', long, value_name = "USERNAME")]
    pub username: Option<String>,
    /// never prompt for password
    #[arg(short = 'w', long)]
    pub no_password: bool,
    /// force password prompt
    #[arg(short = 'W', long)]
    pub password: bool,

    /// `[DBNAME [USERNAME]]`, anything after is ignored with a warning.
    #[arg(value_name = "DBNAME [USERNAME]")]
    pub positional: Vec<String>,

    #[arg(skip)]
    pub actions: Vec<Action>,
}

impl Cli {
    pub fn parse_args() -> Result<Cli, clap::Error> {
        Cli::try_parse_args_from(std::env::args_os())
    }

    pub fn try_parse_args_from<I, T>(args: I) -> Result<Cli, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Cli::command().try_get_matches_from(args)?;
        let mut cli = Cli::from_arg_matches(&matches)?;
        cli.actions = ordered_actions(&matches, &cli);
        Ok(cli)
    }

    /// `-d` wins over the first positional.
    pub fn dbname(&self) -> Option<&str> {
        self.dbname_opt.as_deref().or(self.positional.first().map(String::as_str))
    }

    /// `-U` wins over the second positional.
    pub fn user(&self) -> Option<&str> {
        self.username.as_deref().or(self.positional.get(1).map(String::as_str))
    }

    /// Positional arguments beyond the database and user names.
    pub fn extra_args(&self) -> &[String] {
        self.positional.get(2..).unwrap_or_default()
    }
}

/// Interleave `-c` and `-f` the way they appeared.
fn ordered_actions(matches: &ArgMatches, cli: &Cli) -> Vec<Action> {
    let commands = matches.indices_of("command").into_iter().flatten().zip(&cli.command);
    let files = matches.indices_of("file").into_iter().flatten().zip(&cli.file);
    let mut actions: Vec<(usize, Action)> = commands
        .map(|(at, cmd)| (at, Action::Command(cmd.clone())))
        .chain(files.map(|(at, file)| (at, Action::File(file.clone()))))
        .collect();
    actions.sort_by_key(|(at, _)| *at);
    actions.into_iter().map(|(_, action)| action).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_args_from(std::iter::once("postro-term").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn verify_command() {
        Cli::command().debug_assert();
    }

    #[test]
    fn actions_keep_their_order() {
        let cli = parse(&["-f", "a.sql", "-c", "select 1", "--file=b.sql", "--command", "\\dt"]);
        assert_eq!(
            cli.actions,
            [
                Action::File("a.sql".into()),
                Action::Command("select 1".into()),
                Action::File("b.sql".into()),
                Action::Command("\\dt".into()),
            ]
        );
    }

    #[test]
    fn positional_names() {
        let cli = parse(&["app", "me", "extra"]);
        assert_eq!(cli.dbname(), Some("app"));
        assert_eq!(cli.user(), Some("me"));
        assert_eq!(cli.extra_args(), ["extra"]);

        let cli = parse(&["-d", "other", "-U", "you", "app"]);
        assert_eq!(cli.dbname(), Some("other"));
        assert_eq!(cli.user(), Some("you"));
        assert!(cli.extra_args().is_empty());
    }

    #[test]
    fn short_flags() {
        let cli = parse(&["-h", "db.local", "-p", "5433", "-1", "-0", "-AtqX", "-v", "x=1", "--set", "y=2"]);
        assert_eq!(cli.host.as_deref(), Some("db.local"));
        assert_eq!(cli.port.as_deref(), Some("5433"));
        assert!(cli.single_transaction && cli.record_separator_zero);
        assert!(cli.no_align && cli.tuples_only && cli.quiet && cli.no_psqlrc);
        assert_eq!(cli.set, ["x=1", "y=2"]);
    }

    #[test]
    fn help_sections() {
        assert_eq!(parse(&["-?"]).help.as_deref(), Some("options"));
        assert_eq!(parse(&["--help=variables"]).help.as_deref(), Some("variables"));
        assert_eq!(parse(&[]).help, None);
    }
}
