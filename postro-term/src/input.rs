//! Line sources: the terminal through rustyline, or a file, a pipe or an in-memory script.
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use rustyline::{
    completion::Completer,
    config::Configurer,
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    history::{FileHistory, History},
    validate::Validator,
    Context, Editor, Helper,
};

use crate::{
    command::COMMAND_NAMES,
    variables::{CompKeywordCase, HistControl},
};

/// Outcome of reading one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLine {
    /// A line, without its newline.
    Line(String),
    /// A line that was not valid UTF-8, with the invalid sequences replaced.
    Lossy(String),
    /// Ctrl-C at the prompt.
    Interrupted,
    Eof,
}

/// Where input lines come from.
pub enum Input {
    Terminal(Box<Terminal>),
    Reader {
        reader: Box<dyn BufRead>,
        /// File name shown in error messages.
        name: Option<String>,
        /// Print the prompt before reading, for a terminal without line editing.
        prompt: bool,
    },
}

impl std::fmt::Debug for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Input::Terminal(_) => f.write_str("Input::Terminal"),
            Input::Reader { name, .. } => f.debug_struct("Input::Reader").field("name", name).finish(),
        }
    }
}

impl Input {
    /// Line edited terminal input.
    pub fn terminal() -> io::Result<Input> {
        Ok(Input::Terminal(Box::new(Terminal::new()?)))
    }

    /// Plain standard input, `prompt` when it is a terminal without line editing.
    pub fn stdin(prompt: bool) -> Input {
        Input::Reader { reader: Box::new(io::stdin().lock()), name: None, prompt }
    }

    pub fn file(path: &Path) -> io::Result<Input> {
        let file = File::open(path)?;
        Ok(Input::Reader {
            reader: Box::new(BufReader::new(file)),
            name: Some(path.display().to_string()),
            prompt: false,
        })
    }

    /// Script held in memory, `name` is used in error messages.
    pub fn script(text: impl Into<String>, name: Option<&str>) -> Input {
        Input::Reader {
            reader: Box::new(io::Cursor::new(text.into().into_bytes())),
            name: name.map(str::to_owned),
            prompt: false,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Input::Terminal(_) => None,
            Input::Reader { name, .. } => name.as_deref(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Input::Terminal(_) | Input::Reader { prompt: true, .. })
    }

    pub fn read_line(&mut self, prompt: &str) -> io::Result<ReadLine> {
        match self {
            Input::Terminal(term) => term.read_line(prompt),
            Input::Reader { reader, prompt: show, .. } => {
                if *show {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(prompt.as_bytes())?;
                    stdout.flush()?;
                }
                read_plain_line(reader.as_mut())
            }
        }
    }

    pub fn terminal_mut(&mut self) -> Option<&mut Terminal> {
        match self {
            Input::Terminal(term) => Some(term),
            Input::Reader { .. } => None,
        }
    }
}

/// Read one line, invalid UTF-8 is replaced and reported as [`ReadLine::Lossy`].
pub fn read_plain_line(reader: &mut dyn BufRead) -> io::Result<ReadLine> {
    let mut bytes = vec![];
    if reader.read_until(b'\n', &mut bytes)? == 0 {
        return Ok(ReadLine::Eof);
    }
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    match String::from_utf8(bytes) {
        Ok(line) => Ok(ReadLine::Line(line)),
        Err(err) => Ok(ReadLine::Lossy(String::from_utf8_lossy(err.as_bytes()).into_owned())),
    }
}

/// History file, `PSQL_HISTORY` or `~/.psql_history`.
pub fn default_history_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PSQL_HISTORY") {
        return Some(PathBuf::from(path));
    }
    Some(dirs::home_dir()?.join(".psql_history"))
}

/// Terminal input with line editing and history.
pub struct Terminal {
    editor: Editor<Completion, FileHistory>,
    /// Lines of the statement being typed, added to history as one entry.
    pending: String,
    history_file: Option<PathBuf>,
}

impl Terminal {
    fn new() -> io::Result<Terminal> {
        let mut editor = Editor::<Completion, FileHistory>::new().map_err(readline_error)?;
        editor.set_auto_add_history(false);
        editor.set_helper(Some(Completion::default()));
        Ok(Terminal { editor, pending: String::new(), history_file: None })
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<ReadLine> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadLine::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadLine::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadLine::Eof),
            Err(err) => Err(readline_error(err)),
        }
    }

    /// Refresh what completion offers.
    pub fn set_completion(&mut self, variables: Vec<String>, case: CompKeywordCase) {
        if let Some(helper) = self.editor.helper_mut() {
            helper.variables = variables;
            helper.case = case;
        }
    }

    /// Load history from `path`, a missing file is not an error.
    pub fn load_history(&mut self, path: PathBuf) {
        if path.exists() {
            if let Err(err) = self.editor.load_history(&path) {
                tracing::warn!(%err, path = %path.display(), "could not read history");
            }
        }
        self.history_file = Some(path);
    }

    /// Remember a line of the current statement.
    pub fn append_history(&mut self, line: &str) {
        self.pending.push_str(line);
        self.pending.push('\n');
    }

    /// Commit the remembered lines as one history entry.
    pub fn send_history(&mut self, control: HistControl) {
        let entry = std::mem::take(&mut self.pending);
        let entry = entry.trim_end_matches('\n');
        if entry.is_empty() {
            return;
        }
        if control.ignore_space() && entry.starts_with(' ') {
            return;
        }
        if control.ignore_dups() && self.editor.history().iter().next_back().is_some_and(|last| last == entry) {
            return;
        }
        if let Err(err) = self.editor.add_history_entry(entry) {
            tracing::warn!(%err, "could not add history entry");
        }
    }

    /// Forget lines of a statement that was abandoned.
    pub fn discard_history(&mut self) {
        self.pending.clear();
    }

    pub fn history(&self) -> impl Iterator<Item = &String> {
        self.editor.history().iter()
    }

    /// Write the history to `path`, keeping at most `size` entries, negative keeps all.
    pub fn save_history(&mut self, path: &Path, size: i32) -> io::Result<()> {
        if size >= 0 {
            self.editor.history_mut().set_max_len(size as usize).map_err(readline_error)?;
        }
        self.editor.save_history(path).map_err(readline_error)
    }

    /// Save to the file history was loaded from.
    pub fn finish(&mut self, histfile: Option<&str>, size: i32) {
        let path = histfile.map(PathBuf::from).or_else(|| self.history_file.clone());
        let Some(path) = path else { return };
        if let Err(err) = self.save_history(&path, size) {
            tracing::warn!(%err, path = %path.display(), "could not save history");
            eprintln!("could not save history to file \"{}\": {err}", path.display());
        }
    }
}

fn readline_error(err: ReadlineError) -> io::Error {
    match err {
        ReadlineError::Io(err) => err,
        err => io::Error::other(err),
    }
}

const SQL_KEYWORDS: &[&str] = &[
    "ABORT", "ALTER", "ANALYZE", "BEGIN", "CALL", "CHECKPOINT", "CLOSE", "CLUSTER", "COMMENT",
    "COMMIT", "COPY", "CREATE", "DEALLOCATE", "DECLARE", "DELETE FROM", "DISCARD", "DO", "DROP",
    "END", "EXECUTE", "EXPLAIN", "FETCH", "FROM", "GRANT", "IMPORT", "INSERT INTO", "LISTEN",
    "LOAD", "LOCK", "MERGE INTO", "MOVE", "NOTIFY", "PREPARE", "REASSIGN", "REFRESH MATERIALIZED VIEW",
    "REINDEX", "RELEASE", "RESET", "REVOKE", "ROLLBACK", "SAVEPOINT", "SECURITY LABEL", "SELECT",
    "SET", "SHOW", "START", "TABLE", "TRUNCATE", "UNLISTEN", "UPDATE", "VACUUM", "VALUES", "WHERE",
    "WITH",
];

/// Tab completion of backslash commands, variables and SQL keywords.
#[derive(Debug, Default)]
pub struct Completion {
    variables: Vec<String>,
    case: CompKeywordCase,
}

impl Completion {
    fn keyword(&self, keyword: &str, typed: &str) -> String {
        let lower = match self.case {
            CompKeywordCase::Lower => true,
            CompKeywordCase::Upper => false,
            CompKeywordCase::PreserveLower => !typed.chars().any(|c| c.is_ascii_uppercase()),
            CompKeywordCase::PreserveUpper => typed.chars().next().is_some_and(|c| c.is_ascii_lowercase()),
        };
        if lower { keyword.to_ascii_lowercase() } else { keyword.to_owned() }
    }

    fn candidates(&self, line: &str, word: &str) -> Vec<String> {
        if let Some(name) = word.strip_prefix('\\') {
            return COMMAND_NAMES
                .iter()
                .filter(|cmd| cmd.starts_with(name))
                .map(|cmd| format!("\\{cmd}"))
                .collect();
        }
        if let Some(name) = word.strip_prefix(':') {
            let (open, close, name) = match name.strip_prefix('\'') {
                Some(name) => ("'", "'", name),
                None => match name.strip_prefix('"') {
                    Some(name) => ("\"", "\"", name),
                    None => ("", "", name),
                },
            };
            return self
                .variables
                .iter()
                .filter(|var| var.starts_with(name))
                .map(|var| format!(":{open}{var}{close}"))
                .collect();
        }
        // only the first word of a statement is completed as a keyword
        if !line[..line.len() - word.len()].trim().is_empty() || word.is_empty() {
            return vec![];
        }
        let upper = word.to_ascii_uppercase();
        SQL_KEYWORDS
            .iter()
            .filter(|kw| kw.starts_with(&upper))
            .map(|kw| self.keyword(kw, word))
            .collect()
    }
}

impl Completer for Completion {
    type Candidate = String;

    fn complete(&self, line: &str, pos: usize, _: &Context<'_>) -> rustyline::Result<(usize, Vec<String>)> {
        let line = &line[..pos];
        let start = line.rfind(char::is_whitespace).map_or(0, |i| i + 1);
        Ok((start, self.candidates(line, &line[start..])))
    }
}

impl Hinter for Completion {
    type Hint = String;
}

impl Highlighter for Completion {}

impl Validator for Completion {}

impl Helper for Completion {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn script_lines() {
        let mut input = Input::script("select 1;\nselect 2;", Some("t.sql"));
        assert_eq!(input.name(), Some("t.sql"));
        assert!(!input.is_terminal());
        assert_eq!(input.read_line("").unwrap(), ReadLine::Line("select 1;".into()));
        assert_eq!(input.read_line("").unwrap(), ReadLine::Line("select 2;".into()));
        assert_eq!(input.read_line("").unwrap(), ReadLine::Eof);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut reader = io::Cursor::new(b"a\xffb\nok\n".to_vec());
        assert_eq!(read_plain_line(&mut reader).unwrap(), ReadLine::Lossy("a\u{fffd}b".into()));
        assert_eq!(read_plain_line(&mut reader).unwrap(), ReadLine::Line("ok".into()));
    }

    #[test]
    fn completion_candidates() {
        let completion = Completion { variables: vec!["foo".into(), "FETCH_COUNT".into()], case: CompKeywordCase::PreserveUpper };
        assert!(completion.candidates("\\ech", "\\ech").contains(&"\\echo".to_owned()));
        assert_eq!(completion.candidates(":'fo", ":'fo"), [":'foo'"]);
        assert_eq!(completion.candidates("sel", "sel"), ["select"]);
        assert_eq!(completion.candidates("SEL", "SEL"), ["SELECT"]);
        assert!(completion.candidates("select sel", "sel").is_empty());
    }
}
