//! Variable store.
//!
//! Variables are plain strings. Some of them drive behavior, those carry hooks: a substitute
//! hook canonicalizes the proposed value, including turning an unset into a default, and an
//! assign hook validates the canonical value and updates [`Settings`]. The rest of the terminal
//! reads behavior from [`Variables::settings`], never by parsing variable values itself.
use std::collections::BTreeMap;

use crate::{Error, Result};

/// Canonicalize a proposed value, `None` is an unset.
pub type SubstituteHook = fn(Option<String>) -> Option<String>;

/// Validate a canonical value and apply it to [`Settings`].
pub type AssignHook = fn(&mut Settings, &str, Option<&str>) -> Result<()>;

#[derive(Debug, Clone)]
struct Variable {
    value: Option<String>,
    substitute: Option<SubstituteHook>,
    assign: Option<AssignHook>,
}

/// Collection of named variables.
#[derive(Debug, Default)]
pub struct Variables {
    vars: BTreeMap<String, Variable>,
    settings: Settings,
}

impl Variables {
    /// An empty store without any hooks.
    pub fn new() -> Variables {
        Variables::default()
    }

    /// A store with every behavior variable registered and set to its default.
    pub fn with_defaults() -> Variables {
        let mut me = Variables::new();

        me.register_hooks("AUTOCOMMIT", Some(bool_substitute), Some(autocommit_assign));
        me.register_hooks("ON_ERROR_STOP", Some(bool_substitute), Some(on_error_stop_assign));
        me.register_hooks("QUIET", Some(bool_substitute), Some(quiet_assign));
        me.register_hooks("SINGLELINE", Some(bool_substitute), Some(singleline_assign));
        me.register_hooks("SINGLESTEP", Some(bool_substitute), Some(singlestep_assign));
        me.register_hooks("SHOW_ALL_RESULTS", Some(bool_substitute), Some(show_all_results_assign));
        me.register_hooks("HIDE_TOAST_COMPRESSION", Some(bool_substitute), Some(hide_compression_assign));
        me.register_hooks("HIDE_TABLEAM", Some(bool_substitute), Some(hide_tableam_assign));
        me.register_hooks("FETCH_COUNT", Some(fetch_count_substitute), Some(fetch_count_assign));
        me.register_hooks("HISTFILE", None, Some(histfile_assign));
        me.register_hooks("HISTSIZE", Some(histsize_substitute), Some(histsize_assign));
        me.register_hooks("IGNOREEOF", Some(ignoreeof_substitute), Some(ignoreeof_assign));
        me.register_hooks("ECHO", Some(echo_substitute), Some(echo_assign));
        me.register_hooks("ECHO_HIDDEN", Some(echo_hidden_substitute), Some(echo_hidden_assign));
        me.register_hooks("ON_ERROR_ROLLBACK", Some(on_error_rollback_substitute), Some(on_error_rollback_assign));
        me.register_hooks("COMP_KEYWORD_CASE", Some(comp_keyword_case_substitute), Some(comp_keyword_case_assign));
        me.register_hooks("HISTCONTROL", Some(histcontrol_substitute), Some(histcontrol_assign));
        me.register_hooks("PROMPT1", None, Some(prompt1_assign));
        me.register_hooks("PROMPT2", None, Some(prompt2_assign));
        me.register_hooks("PROMPT3", None, Some(prompt3_assign));
        me.register_hooks("VERBOSITY", Some(verbosity_substitute), Some(verbosity_assign));
        me.register_hooks("SHOW_CONTEXT", Some(show_context_substitute), Some(show_context_assign));

        let version = env!("CARGO_PKG_VERSION");
        let defaults = [
            ("VERSION", format!("postro-term {version}")),
            ("VERSION_NAME", version.to_owned()),
            ("VERSION_NUM", version_num(version).to_string()),
            ("AUTOCOMMIT", "on".into()),
            ("SHOW_ALL_RESULTS", "on".into()),
            ("PROMPT1", DEFAULT_PROMPT1.into()),
            ("PROMPT2", DEFAULT_PROMPT2.into()),
            ("PROMPT3", DEFAULT_PROMPT3.into()),
        ];
        for (name, value) in defaults {
            // hooks above accept all of these
            let _ = me.set(name, Some(value.as_str()));
        }

        me
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name)?.value.as_deref()
    }

    /// Settings derived from behavior variables.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Set or unset a variable.
    ///
    /// The value is canonicalized by the substitute hook, and if an assign hook rejects it the
    /// variable keeps its previous value.
    pub fn set(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        if !valid_name(name) {
            // unsetting an invalid name is a no-op rather than an error
            if value.is_none() {
                return Ok(());
            }
            return Err(Error::usage(format!("invalid variable name: \"{name}\"")));
        }

        let Some(var) = self.vars.get_mut(name) else {
            if let Some(value) = value {
                self.vars.insert(name.to_owned(), Variable {
                    value: Some(value.to_owned()),
                    substitute: None,
                    assign: None,
                });
            }
            return Ok(());
        };

        let mut value = value.map(str::to_owned);
        if let Some(substitute) = var.substitute {
            value = substitute(value);
        }
        if let Some(assign) = var.assign {
            assign(&mut self.settings, name, value.as_deref())?;
        }

        if value.is_none() && var.substitute.is_none() && var.assign.is_none() {
            self.vars.remove(name);
        } else {
            var.value = value;
        }

        Ok(())
    }

    pub fn unset(&mut self, name: &str) -> Result<()> {
        self.set(name, None)
    }

    /// Set a variable to `on` or `off`.
    pub fn set_bool(&mut self, name: &str, value: bool) -> Result<()> {
        self.set(name, Some(if value { "on" } else { "off" }))
    }

    /// Install hooks on a variable, then run them over its current value.
    pub fn register_hooks(
        &mut self,
        name: &str,
        substitute: Option<SubstituteHook>,
        assign: Option<AssignHook>,
    ) {
        let var = self.vars.entry(name.to_owned()).or_insert(Variable {
            value: None,
            substitute: None,
            assign: None,
        });
        var.substitute = substitute;
        var.assign = assign;

        if let Some(substitute) = substitute {
            var.value = substitute(var.value.take());
        }
        if let Some(assign) = assign {
            // a value set before the hook existed is not validated retroactively
            let _ = assign(&mut self.settings, name, var.value.as_deref());
        }
    }

    /// Whether `name` drives behavior, such variables are not set by `\gset`.
    pub fn has_hooks(&self, name: &str) -> bool {
        self.vars.get(name).is_some_and(|var| var.substitute.is_some() || var.assign.is_some())
    }

    /// Variables that currently have a value, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .filter_map(|(name, var)| Some((name.as_str(), var.value.as_deref()?)))
    }

    /// Every known name, including hooked variables that are unset.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Names starting with `prefix`, for completion.
    pub fn names_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.names().filter(move |n| n.starts_with(prefix))
    }
}

/// Letters, digits, underscore, and any non-ASCII character.
pub fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii())
}

fn version_num(version: &str) -> u32 {
    let mut parts = version.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    let patch = parts.next().unwrap_or(0);
    major * 10000 + minor * 100 + patch
}

pub const DEFAULT_PROMPT1: &str = "%/%R%x%# ";
pub const DEFAULT_PROMPT2: &str = "%/%R%x%# ";
pub const DEFAULT_PROMPT3: &str = ">> ";

/// Parse a boolean option value.
///
/// Accepts any unambiguous case-insensitive prefix of `true`, `false`, `yes`, `no`, `on`,
/// `off`, as well as `1` and `0`.
pub fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    let lower = value.to_ascii_lowercase();
    let len = lower.len();
    if len == 0 {
        return None;
    }
    let prefix = |word: &str, min: usize| len >= min && word.starts_with(&lower);

    if prefix("true", 1) || prefix("yes", 1) || prefix("on", 2) || lower == "1" {
        Some(true)
    } else if prefix("false", 1) || prefix("no", 1) || prefix("off", 2) || lower == "0" {
        Some(false)
    } else {
        None
    }
}

/// [`parse_bool`] with the standard error message.
pub fn parse_bool_var(value: &str, name: &str) -> Result<bool> {
    parse_bool(value).ok_or_else(|| {
        Error::usage(format!("unrecognized value \"{value}\" for \"{name}\": Boolean expected"))
    })
}

/// Parse an integer option value.
pub fn parse_num_var(value: &str, name: &str) -> Result<i32> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::usage(format!("invalid value \"{value}\" for \"{name}\": integer expected")))
}

fn enum_error(value: &str, name: &str, available: &str) -> Error {
    Error::usage(format!(
        "unrecognized value \"{value}\" for \"{name}\"\nAvailable values are: {available}."
    ))
}

macro_rules! choices {
    (
        $(#[$doc:meta])*
        enum $name:ident, $default:literal, $available:literal {
            $($variant:ident = $text:literal,)*
        }
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub enum $name {
            #[default]
            $($variant,)*
        }

        impl $name {
            const DEFAULT: &'static str = $default;
            const AVAILABLE: &'static str = $available;

            fn parse(value: &str) -> Option<$name> {
                $(
                    if value.eq_ignore_ascii_case($text) {
                        return Some($name::$variant);
                    }
                )*
                None
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)*
                }
            }
        }
    };
}

choices! {
    /// What to echo to stdout, `ECHO`.
    enum Echo, "none", "none, errors, queries, all" {
        None = "none",
        Errors = "errors",
        Queries = "queries",
        All = "all",
    }
}

choices! {
    /// Echo of queries issued by meta-commands, `ECHO_HIDDEN`.
    enum EchoHidden, "off", "on, off, noexec" {
        Off = "off",
        On = "on",
        NoExec = "noexec",
    }
}

choices! {
    /// Implicit savepoint around each statement, `ON_ERROR_ROLLBACK`.
    enum OnErrorRollback, "off", "on, off, interactive" {
        Off = "off",
        On = "on",
        Interactive = "interactive",
    }
}

choices! {
    /// Case of completed keywords, `COMP_KEYWORD_CASE`.
    enum CompKeywordCase, "preserve-upper", "lower, upper, preserve-lower, preserve-upper" {
        PreserveUpper = "preserve-upper",
        PreserveLower = "preserve-lower",
        Upper = "upper",
        Lower = "lower",
    }
}

choices! {
    /// Which lines to keep out of history, `HISTCONTROL`.
    enum HistControl, "none", "none, ignorespace, ignoredups, ignoreboth" {
        None = "none",
        IgnoreSpace = "ignorespace",
        IgnoreDups = "ignoredups",
        IgnoreBoth = "ignoreboth",
    }
}

choices! {
    /// Server error report detail, `VERBOSITY`.
    enum Verbosity, "default", "default, verbose, terse, sqlstate" {
        Default = "default",
        Verbose = "verbose",
        Terse = "terse",
        Sqlstate = "sqlstate",
    }
}

choices! {
    /// When to show the `CONTEXT` field of server messages, `SHOW_CONTEXT`.
    enum ShowContext, "errors", "never, errors, always" {
        Errors = "errors",
        Never = "never",
        Always = "always",
    }
}

impl HistControl {
    pub fn ignore_space(&self) -> bool {
        matches!(self, Self::IgnoreSpace | Self::IgnoreBoth)
    }

    pub fn ignore_dups(&self) -> bool {
        matches!(self, Self::IgnoreDups | Self::IgnoreBoth)
    }
}

/// Behavior derived from hooked variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub autocommit: bool,
    pub on_error_stop: bool,
    pub quiet: bool,
    pub singleline: bool,
    pub singlestep: bool,
    pub show_all_results: bool,
    pub hide_compression: bool,
    pub hide_tableam: bool,
    pub fetch_count: i32,
    pub histfile: Option<String>,
    pub histsize: i32,
    pub ignoreeof: i32,
    pub echo: Echo,
    pub echo_hidden: EchoHidden,
    pub on_error_rollback: OnErrorRollback,
    pub comp_case: CompKeywordCase,
    pub histcontrol: HistControl,
    pub prompt1: String,
    pub prompt2: String,
    pub prompt3: String,
    pub verbosity: Verbosity,
    pub show_context: ShowContext,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            autocommit: true,
            on_error_stop: false,
            quiet: false,
            singleline: false,
            singlestep: false,
            show_all_results: true,
            hide_compression: false,
            hide_tableam: false,
            fetch_count: 0,
            histfile: None,
            histsize: 500,
            ignoreeof: 0,
            echo: Echo::None,
            echo_hidden: EchoHidden::Off,
            on_error_rollback: OnErrorRollback::Off,
            comp_case: CompKeywordCase::PreserveUpper,
            histcontrol: HistControl::None,
            prompt1: DEFAULT_PROMPT1.into(),
            prompt2: DEFAULT_PROMPT2.into(),
            prompt3: DEFAULT_PROMPT3.into(),
            verbosity: Verbosity::Default,
            show_context: ShowContext::Errors,
        }
    }
}

// hooks

/// Unset becomes `off`, empty becomes `on`.
fn bool_substitute(value: Option<String>) -> Option<String> {
    match value {
        None => Some("off".into()),
        Some(v) if v.is_empty() => Some("on".into()),
        v => v,
    }
}

macro_rules! bool_assign {
    ($($fn_name:ident => $field:ident,)*) => {$(
        fn $fn_name(settings: &mut Settings, name: &str, value: Option<&str>) -> Result<()> {
            settings.$field = parse_bool_var(value.unwrap_or("off"), name)?;
            Ok(())
        }
    )*};
}

bool_assign! {
    autocommit_assign => autocommit,
    on_error_stop_assign => on_error_stop,
    quiet_assign => quiet,
    singleline_assign => singleline,
    singlestep_assign => singlestep,
    show_all_results_assign => show_all_results,
    hide_compression_assign => hide_compression,
    hide_tableam_assign => hide_tableam,
}

fn fetch_count_substitute(value: Option<String>) -> Option<String> {
    value.or(Some("0".into()))
}

fn fetch_count_assign(settings: &mut Settings, name: &str, value: Option<&str>) -> Result<()> {
    let count = parse_num_var(value.unwrap_or("0"), name)?;
    if count < 0 {
        return Err(Error::usage(format!(
            "invalid value \"{count}\" for \"{name}\": must be greater than or equal to 0"
        )));
    }
    settings.fetch_count = count;
    Ok(())
}

fn histfile_assign(settings: &mut Settings, _: &str, value: Option<&str>) -> Result<()> {
    settings.histfile = value.map(str::to_owned);
    Ok(())
}

fn histsize_substitute(value: Option<String>) -> Option<String> {
    value.or(Some("500".into()))
}

fn histsize_assign(settings: &mut Settings, name: &str, value: Option<&str>) -> Result<()> {
    settings.histsize = parse_num_var(value.unwrap_or("500"), name)?;
    Ok(())
}

/// Unset becomes `0`, non-numeric values count as 10, like bash.
fn ignoreeof_substitute(value: Option<String>) -> Option<String> {
    match value {
        None => Some("0".into()),
        Some(v) if v.trim().parse::<i32>().is_err() => Some("10".into()),
        v => v,
    }
}

fn ignoreeof_assign(settings: &mut Settings, name: &str, value: Option<&str>) -> Result<()> {
    settings.ignoreeof = parse_num_var(value.unwrap_or("0"), name)?;
    Ok(())
}

macro_rules! enum_hooks {
    ($($sub:ident, $assign:ident => $field:ident: $ty:ident,)*) => {$(
        fn $sub(value: Option<String>) -> Option<String> {
            value.or(Some($ty::DEFAULT.into()))
        }

        fn $assign(settings: &mut Settings, name: &str, value: Option<&str>) -> Result<()> {
            let value = value.unwrap_or($ty::DEFAULT);
            settings.$field = $ty::parse(value).ok_or_else(|| enum_error(value, name, $ty::AVAILABLE))?;
            Ok(())
        }
    )*};
}

enum_hooks! {
    echo_substitute, echo_assign => echo: Echo,
    comp_keyword_case_substitute, comp_keyword_case_assign => comp_case: CompKeywordCase,
    histcontrol_substitute, histcontrol_assign => histcontrol: HistControl,
    verbosity_substitute, verbosity_assign => verbosity: Verbosity,
    show_context_substitute, show_context_assign => show_context: ShowContext,
}

fn echo_hidden_substitute(value: Option<String>) -> Option<String> {
    value.or(Some(EchoHidden::DEFAULT.into()))
}

/// `noexec`, or any boolean.
fn echo_hidden_assign(settings: &mut Settings, name: &str, value: Option<&str>) -> Result<()> {
    let value = value.unwrap_or(EchoHidden::DEFAULT);
    settings.echo_hidden = match EchoHidden::parse(value) {
        Some(EchoHidden::NoExec) => EchoHidden::NoExec,
        _ => match parse_bool(value) {
            Some(true) => EchoHidden::On,
            Some(false) => EchoHidden::Off,
            None => return Err(enum_error(value, name, EchoHidden::AVAILABLE)),
        },
    };
    Ok(())
}

fn on_error_rollback_substitute(value: Option<String>) -> Option<String> {
    value.or(Some(OnErrorRollback::DEFAULT.into()))
}

/// `interactive`, or any boolean.
fn on_error_rollback_assign(settings: &mut Settings, name: &str, value: Option<&str>) -> Result<()> {
    let value = value.unwrap_or(OnErrorRollback::DEFAULT);
    settings.on_error_rollback = match OnErrorRollback::parse(value) {
        Some(OnErrorRollback::Interactive) => OnErrorRollback::Interactive,
        _ => match parse_bool(value) {
            Some(true) => OnErrorRollback::On,
            Some(false) => OnErrorRollback::Off,
            None => return Err(enum_error(value, name, OnErrorRollback::AVAILABLE)),
        },
    };
    Ok(())
}

fn prompt1_assign(settings: &mut Settings, _: &str, value: Option<&str>) -> Result<()> {
    settings.prompt1 = value.unwrap_or_default().to_owned();
    Ok(())
}

fn prompt2_assign(settings: &mut Settings, _: &str, value: Option<&str>) -> Result<()> {
    settings.prompt2 = value.unwrap_or_default().to_owned();
    Ok(())
}

fn prompt3_assign(settings: &mut Settings, _: &str, value: Option<&str>) -> Result<()> {
    settings.prompt3 = value.unwrap_or_default().to_owned();
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_variables() {
        let mut vars = Variables::new();
        vars.set("foo", Some("bar")).unwrap();
        assert_eq!(vars.get("foo"), Some("bar"));
        vars.unset("foo").unwrap();
        vars.unset("foo").unwrap();
        assert_eq!(vars.get("foo"), None);
        assert_eq!(vars.names().count(), 0);

        let err = vars.set("a-b", Some("x")).unwrap_err();
        assert_eq!(err.to_string(), "invalid variable name: \"a-b\"");
    }

    #[test]
    fn bool_hooks() {
        let mut vars = Variables::with_defaults();
        assert!(vars.settings().autocommit);
        assert_eq!(vars.get("ON_ERROR_STOP"), Some("off"));

        vars.set("ON_ERROR_STOP", Some("")).unwrap();
        assert_eq!(vars.get("ON_ERROR_STOP"), Some("on"));
        assert!(vars.settings().on_error_stop);

        vars.unset("ON_ERROR_STOP").unwrap();
        assert_eq!(vars.get("ON_ERROR_STOP"), Some("off"));
        assert!(!vars.settings().on_error_stop);
        assert!(vars.names().any(|n| n == "ON_ERROR_STOP"));

        let err = vars.set("AUTOCOMMIT", Some("maybe")).unwrap_err();
        assert_eq!(err.to_string(), "unrecognized value \"maybe\" for \"AUTOCOMMIT\": Boolean expected");
        assert_eq!(vars.get("AUTOCOMMIT"), Some("on"));
        assert!(vars.settings().autocommit);
    }

    #[test]
    fn enum_hooks() {
        let mut vars = Variables::with_defaults();
        assert_eq!(vars.get("ECHO"), Some("none"));
        vars.set("ECHO", Some("queries")).unwrap();
        assert_eq!(vars.settings().echo, Echo::Queries);

        let err = vars.set("VERBOSITY", Some("loud")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unrecognized value \"loud\" for \"VERBOSITY\"\nAvailable values are: default, verbose, terse, sqlstate."
        );

        vars.set("ON_ERROR_ROLLBACK", Some("interactive")).unwrap();
        assert_eq!(vars.settings().on_error_rollback, OnErrorRollback::Interactive);
        vars.set("ON_ERROR_ROLLBACK", Some("yes")).unwrap();
        assert_eq!(vars.settings().on_error_rollback, OnErrorRollback::On);

        // unset falls back to the default value
        vars.unset("ON_ERROR_ROLLBACK").unwrap();
        assert_eq!(vars.get("ON_ERROR_ROLLBACK"), Some("off"));
        assert_eq!(vars.settings().on_error_rollback, OnErrorRollback::Off);
        vars.set("ECHO_HIDDEN", Some("noexec")).unwrap();
        vars.unset("ECHO_HIDDEN").unwrap();
        assert_eq!(vars.get("ECHO_HIDDEN"), Some("off"));
        assert_eq!(vars.settings().echo_hidden, EchoHidden::Off);
    }

    #[test]
    fn numeric_hooks() {
        let mut vars = Variables::with_defaults();
        assert_eq!(vars.get("FETCH_COUNT"), Some("0"));
        vars.set("FETCH_COUNT", Some("100")).unwrap();
        assert_eq!(vars.settings().fetch_count, 100);

        let err = vars.set("FETCH_COUNT", Some("many")).unwrap_err();
        assert_eq!(err.to_string(), "invalid value \"many\" for \"FETCH_COUNT\": integer expected");
        assert_eq!(vars.get("FETCH_COUNT"), Some("100"));

        vars.set("IGNOREEOF", Some("")).unwrap();
        assert_eq!(vars.get("IGNOREEOF"), Some("10"));
        assert_eq!(vars.settings().ignoreeof, 10);
    }

    #[test]
    fn bool_prefixes() {
        assert_eq!(parse_bool("t"), Some(true));
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("o"), None);
        assert_eq!(parse_bool("of"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("2"), None);
    }
}
