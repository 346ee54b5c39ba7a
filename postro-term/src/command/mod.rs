//! Backslash meta-commands.
//!
//! The main loop calls [`handle_slash_command`] when the scanner stops at a backslash. The
//! command name is looked up as a [`MetaCommand`], its arguments are pulled from the scanner
//! by the handler itself, and the returned [`CmdStatus`] tells the main loop what to do next.
//!
//! In a skipped `\if` branch every command except the conditionals only consumes its
//! arguments, so the same amount of input is read whatever the branch state.
mod cond;
mod conn;
mod edit;
mod format;
mod largeobj;
mod query;
mod vars;

use crate::{
    buffer::QueryBuffer,
    conditional::ConditionalStack,
    describe,
    help,
    scan::{OptionKind, Scanner},
    session::{ScanEnv, Session},
    Result,
};

pub use cond::eval_boolean;
pub use edit::set_query_output;

/// What the main loop does after a meta-command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdStatus {
    /// Done, keep scanning the line.
    SkipLine,
    /// Send the query buffer.
    Send,
    /// The query buffer was replaced, scan it again.
    NewEdit,
    /// Leave the main loop.
    Terminate,
    Error,
    Unknown,
}

/// Command names offered by completion.
pub const COMMAND_NAMES: &[&str] = &[
    "a", "bind", "bind_named", "c", "C", "cd", "close_prepared", "connect", "conninfo", "copy",
    "copyright", "crosstabview", "d", "da", "dA", "dAc", "dAf", "dAo", "dAp", "db", "dc", "dconfig", "dC", "dd",
    "dD", "ddp", "dE", "des", "det", "deu", "dew", "df", "dF", "dFd", "dFp", "dFt", "dg", "di",
    "dl", "dL", "dm", "dn", "do", "dO", "dp", "dP", "drds", "drg", "dRp", "dRs", "ds", "dt", "dT",
    "du", "dv", "dx", "dX", "dy", "e", "echo", "ef", "elif", "else", "encoding", "endif",
    "endpipeline", "errverbose", "ev", "f", "flush", "flushrequest", "g", "gdesc", "getenv",
    "getresults", "gexec", "gset", "gx", "h", "help", "H", "i", "if", "include",
    "include_relative", "ir", "l", "list", "lo_export", "lo_import", "lo_list", "lo_unlink", "o",
    "out", "p", "parse", "password", "print", "prompt", "pset", "q", "qecho", "quit", "r",
    "reset", "s", "sendpipeline", "set", "setenv", "sf", "startpipeline", "sv", "syncpipeline",
    "t", "T", "timing", "unset", "w", "warn", "watch", "write", "x", "z", "!", "?",
];

/// A recognized meta-command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaCommand {
    Align,
    Bind,
    BindNamed,
    Cd,
    ClosePrepared,
    Connect,
    ConnInfo,
    Copy,
    Copyright,
    CrosstabView,
    /// `\d`, `\l`, `\z` and `\lo_list` families, with their full name.
    Describe(String),
    Echo,
    Edit,
    EditFunction,
    EditView,
    Elif,
    Else,
    Encoding,
    EndIf,
    EndPipeline,
    ErrVerbose,
    Expanded,
    FieldSep,
    Flush,
    FlushRequest,
    GDesc,
    GExec,
    GSet,
    GetEnv,
    GetResults,
    /// `\g` and `\gx`.
    Go { expanded: bool },
    Help,
    History,
    Html,
    If,
    Include { relative: bool },
    LoExport,
    LoImport,
    LoUnlink,
    Out,
    Parse,
    Password,
    Print,
    Prompt,
    PSet,
    QEcho,
    Quit,
    Reset,
    SendPipeline,
    Set,
    SetEnv,
    Shell,
    /// `\sf` and `\sv`, with or without `+`.
    ShowSource { view: bool, numbered: bool },
    StartPipeline,
    SyncPipeline,
    TableAttr,
    Timing,
    Title,
    TuplesOnly,
    Unset,
    Usage,
    Warn,
    Watch,
    Write,
}

impl MetaCommand {
    pub fn parse(name: &str) -> Option<MetaCommand> {
        use MetaCommand::*;
        let cmd = match name {
            "a" => Align,
            "bind" => Bind,
            "bind_named" => BindNamed,
            "C" => Title,
            "c" | "connect" => Connect,
            "cd" => Cd,
            "close_prepared" => ClosePrepared,
            "conninfo" => ConnInfo,
            "copy" => Copy,
            "copyright" => Copyright,
            "crosstabview" => CrosstabView,
            "e" | "edit" => Edit,
            "echo" => Echo,
            "ef" => EditFunction,
            "ev" => EditView,
            "elif" => Elif,
            "else" => Else,
            "encoding" => Encoding,
            "endif" => EndIf,
            "endpipeline" => EndPipeline,
            "errverbose" => ErrVerbose,
            "f" => FieldSep,
            "flush" => Flush,
            "flushrequest" => FlushRequest,
            "g" => Go { expanded: false },
            "gx" => Go { expanded: true },
            "gdesc" => GDesc,
            "getenv" => GetEnv,
            "getresults" => GetResults,
            "gexec" => GExec,
            "gset" => GSet,
            "h" | "help" => Help,
            "H" | "html" => Html,
            "i" | "include" => Include { relative: false },
            "ir" | "include_relative" => Include { relative: true },
            "if" => If,
            "lo_export" => LoExport,
            "lo_import" => LoImport,
            "lo_unlink" => LoUnlink,
            "o" | "out" => Out,
            "p" | "print" => Print,
            "parse" => Parse,
            "password" => Password,
            "prompt" => Prompt,
            "pset" => PSet,
            "q" | "quit" => Quit,
            "qecho" => QEcho,
            "r" | "reset" => Reset,
            "s" => History,
            "sendpipeline" => SendPipeline,
            "set" => Set,
            "setenv" => SetEnv,
            "sf" | "sf+" | "sv" | "sv+" => ShowSource { view: name.starts_with("sv"), numbered: name.ends_with('+') },
            "startpipeline" => StartPipeline,
            "syncpipeline" => SyncPipeline,
            "t" => TuplesOnly,
            "T" => TableAttr,
            "timing" => Timing,
            "unset" => Unset,
            "w" | "write" => Write,
            "warn" => Warn,
            "watch" => Watch,
            "x" => Expanded,
            "!" => Shell,
            "?" => Usage,
            _ if name.starts_with("lo_list") => Describe(name.to_owned()),
            _ if name == "list" || name == "list+" => Describe(name.replacen("list", "l", 1)),
            _ if name.starts_with('d') || name.starts_with('l') || name.starts_with('z') => {
                Describe(name.to_owned())
            }
            _ => return None,
        };
        Some(cmd)
    }

    fn is_conditional(&self) -> bool {
        matches!(self, Self::If | Self::Elif | Self::Else | Self::EndIf)
    }

    /// Consume the arguments without acting, in a skipped branch.
    fn skip_arguments(&self, cx: &mut Context<'_>) {
        use MetaCommand::*;
        match self {
            Shell | Copy | Help | EditFunction | EditView | ShowSource { .. } => cx.scan.skip_slash_line(),
            Go { .. } | Out | Write => {
                if cx.scan.remaining().trim_start().starts_with('|') {
                    cx.scan.skip_slash_line();
                } else {
                    cx.skip_args();
                }
            }
            _ => cx.skip_args(),
        }
    }

    fn run(&self, name: &str, cx: &mut Context<'_>) -> Result<CmdStatus> {
        use MetaCommand::*;
        match self {
            If => cond::exec_if(cx),
            Elif => cond::exec_elif(cx),
            Else => cond::exec_else(cx),
            EndIf => cond::exec_endif(cx),

            Align => format::exec_align(cx),
            Title => format::exec_pset_one(cx, "title", OptionKind::Normal),
            FieldSep => format::exec_pset_one(cx, "fieldsep", OptionKind::FilePipe),
            Html => format::exec_html(cx),
            PSet => format::exec_pset(cx),
            TuplesOnly => format::exec_pset_one(cx, "tuples_only", OptionKind::Normal),
            TableAttr => format::exec_pset_one(cx, "tableattr", OptionKind::Normal),
            Expanded => format::exec_pset_one(cx, "expanded", OptionKind::Normal),

            Go { expanded } => query::exec_go(cx, name, *expanded),
            GDesc => query::exec_gdesc(cx, name),
            GExec => query::exec_gexec(cx, name),
            CrosstabView => query::exec_crosstabview(cx, name),
            GSet => query::exec_gset(cx, name),
            Watch => query::exec_watch(cx, name),
            Parse => query::exec_parse(cx, name),
            Bind => query::exec_bind(cx),
            BindNamed => query::exec_bind_named(cx, name),
            ClosePrepared => query::exec_close_prepared(cx, name),
            SendPipeline => query::exec_sendpipeline(cx, name),
            StartPipeline => query::exec_pipeline(cx, crate::send::SendMode::StartPipeline),
            EndPipeline => query::exec_pipeline(cx, crate::send::SendMode::EndPipeline),
            SyncPipeline => query::exec_pipeline(cx, crate::send::SendMode::PipelineSync),
            Flush => query::exec_pipeline(cx, crate::send::SendMode::Flush),
            FlushRequest => query::exec_pipeline(cx, crate::send::SendMode::FlushRequest),
            GetResults => query::exec_getresults(cx, name),

            Edit => edit::exec_edit(cx, name),
            EditFunction => edit::exec_edit_source(cx, name, false),
            EditView => edit::exec_edit_source(cx, name, true),
            ShowSource { view, numbered } => edit::exec_show_source(cx, name, *view, *numbered),
            Print => edit::exec_print(cx),
            Reset => edit::exec_reset(cx),
            Write => edit::exec_write(cx, name),
            History => edit::exec_history(cx),
            Include { relative } => edit::exec_include(cx, name, *relative),
            Out => edit::exec_out(cx),

            Connect => conn::exec_connect(cx),
            ConnInfo => conn::exec_conninfo(cx),
            Password => conn::exec_password(cx),
            Encoding => conn::exec_encoding(cx),
            Cd => conn::exec_cd(cx, name),
            SetEnv => conn::exec_setenv(cx, name),
            GetEnv => conn::exec_getenv(cx, name),
            Shell => conn::exec_shell(cx),
            Copy => conn::exec_copy(cx),

            Set => vars::exec_set(cx),
            Unset => vars::exec_unset(cx, name),
            Echo | QEcho | Warn => vars::exec_echo(cx, name),
            Prompt => vars::exec_prompt(cx, name),
            Timing => vars::exec_timing(cx),
            ErrVerbose => vars::exec_errverbose(cx),
            Quit => Ok(CmdStatus::Terminate),
            Usage => {
                let topic = cx.arg(OptionKind::Normal, false);
                help::slash_usage(cx.session, topic.as_deref())?;
                Ok(CmdStatus::SkipLine)
            }
            Help => {
                let topic = cx.arg(OptionKind::WholeLine, false);
                help::sql_help(cx.session, topic.as_deref())?;
                Ok(CmdStatus::SkipLine)
            }
            Copyright => {
                help::print_copyright();
                Ok(CmdStatus::SkipLine)
            }

            LoImport => largeobj::exec_lo_import(cx, name),
            LoExport => largeobj::exec_lo_export(cx, name),
            LoUnlink => largeobj::exec_lo_unlink(cx, name),
            Describe(cmd) => describe::exec_describe(cx, cmd),
        }
    }
}

/// Everything a meta-command may touch.
pub struct Context<'a> {
    pub session: &'a mut Session,
    pub scan: &'a mut Scanner,
    pub cond: &'a mut ConditionalStack,
    /// `None` while running a `-c` command.
    pub query: Option<&'a mut QueryBuffer>,
    pub previous: Option<&'a QueryBuffer>,
}

impl Context<'_> {
    pub fn active(&self) -> bool {
        self.cond.is_active()
    }

    /// Next argument of the command.
    pub fn arg(&mut self, kind: OptionKind, semicolon: bool) -> Option<String> {
        let active = self.cond.is_active();
        let mut env = ScanEnv { session: &mut *self.session, active };
        self.scan.slash_option(kind, semicolon, &mut env)
    }

    /// Next argument, and whether any part of it was quoted.
    pub fn arg_quoted(&mut self, kind: OptionKind) -> Option<(String, bool)> {
        let active = self.cond.is_active();
        let mut env = ScanEnv { session: &mut *self.session, active };
        self.scan
            .slash_option_quoted(kind, false, &mut env)
            .map(|opt| (opt.text, opt.quote.is_some()))
    }

    /// All remaining arguments.
    pub fn args(&mut self, kind: OptionKind) -> Vec<String> {
        std::iter::from_fn(|| self.arg(kind, false)).collect()
    }

    fn skip_args(&mut self) {
        let mut env = ScanEnv { session: &mut *self.session, active: false };
        self.scan.skip_slash_options(&mut env);
    }

    /// Copy the previous buffer into an empty query buffer, for `\g` and `\watch`.
    pub fn copy_previous_query(&mut self) {
        if let (Some(query), Some(previous)) = (self.query.as_deref_mut(), self.previous) {
            if query.is_empty() {
                query.set(previous.as_str());
            }
        }
    }

    /// The query buffer, or the previous one when empty.
    pub fn query_or_previous(&self) -> Option<&str> {
        crate::session::buffer_or_previous(self.query.as_deref(), self.previous)
    }
}

/// Run the meta-command whose backslash the scanner just stopped at.
pub fn handle_slash_command(cx: &mut Context<'_>) -> CmdStatus {
    let name = cx.scan.slash_command();
    tracing::trace!(name, "meta-command");

    let status = match MetaCommand::parse(&name) {
        None => CmdStatus::Unknown,
        Some(cmd) if !cx.active() && !cmd.is_conditional() => {
            cmd.skip_arguments(cx);
            CmdStatus::SkipLine
        }
        Some(cmd) => match cmd.run(&name, cx) {
            Ok(status) => status,
            Err(err) => {
                cx.session.report(&err);
                CmdStatus::Error
            }
        },
    };

    let status = match status {
        CmdStatus::Unknown => {
            cx.session.error(format!("invalid command \\{name}"));
            if cx.session.cur_interactive {
                eprintln!("Try \\? for help.");
            }
            CmdStatus::Error
        }
        status => status,
    };

    if status == CmdStatus::Error {
        cx.scan.skip_slash_line();
    } else {
        // leftovers are read without evaluating backticks
        let warn = cx.active() && cx.session.cur_interactive;
        let mut env = ScanEnv { session: &mut *cx.session, active: false };
        while let Some(arg) = cx.scan.slash_option(OptionKind::Normal, false, &mut env) {
            if warn {
                env.session.warning(format!("\\{name}: extra argument \"{arg}\" ignored"));
            }
        }
    }
    cx.scan.slash_command_end();
    status
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookup() {
        assert_eq!(MetaCommand::parse("gx"), Some(MetaCommand::Go { expanded: true }));
        assert_eq!(MetaCommand::parse("dt+"), Some(MetaCommand::Describe("dt+".into())));
        assert_eq!(MetaCommand::parse("list"), Some(MetaCommand::Describe("l".into())));
        assert_eq!(MetaCommand::parse("lo_list+"), Some(MetaCommand::Describe("lo_list+".into())));
        assert_eq!(MetaCommand::parse("lo_import"), Some(MetaCommand::LoImport));
        assert_eq!(
            MetaCommand::parse("sf+"),
            Some(MetaCommand::ShowSource { view: false, numbered: true })
        );
        assert_eq!(MetaCommand::parse("nope"), None);
        for name in COMMAND_NAMES {
            assert!(MetaCommand::parse(name).is_some(), "{name}");
        }
    }
}
