//! Input lexer.
//!
//! The SQL half splits input lines into statements: it copies text into the query buffer while
//! tracking quotes, comments and parentheses, stops at a top level `;`, and stops before a
//! backslash command so the command can collect its own arguments, see [`slash`].
//!
//! ```text
//! select 1 \g out.txt
//!          ^ Backslash, buffer holds "select 1 "
//! ```
use crate::buffer::QueryBuffer;

pub mod slash;

pub use slash::OptionKind;

/// Why [`Scanner::scan`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanResult {
    /// Top level `;`, appended to the buffer.
    Semicolon,
    /// A backslash outside quotes, the command name is next.
    Backslash,
    /// End of line inside a quote or comment.
    Incomplete,
    /// End of line.
    Eol,
}

/// Which prompt should be shown for the next line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStatus {
    Ready,
    Continue,
    Comment,
    SingleQuote,
    DoubleQuote,
    DollarQuote,
    Paren,
    Copy,
}

impl PromptStatus {
    /// The character shown by `%R`.
    pub fn indicator(&self) -> char {
        match self {
            Self::Ready => '=',
            Self::Continue => '-',
            Self::Comment => '*',
            Self::SingleQuote => '\'',
            Self::DoubleQuote => '"',
            Self::DollarQuote => '$',
            Self::Paren => '(',
            Self::Copy => ' ',
        }
    }
}

/// How an interpolated variable is quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarQuote {
    /// `:name`
    Plain,
    /// `:'name'`
    Literal,
    /// `:"name"`
    Ident,
}

/// Lookups the lexer needs from its caller.
pub trait ScanContext {
    /// Value of a variable, `None` when unset or when interpolation is suppressed.
    fn variable(&mut self, name: &str) -> Option<String>;

    /// Output of a shell command, `None` on failure.
    fn backtick(&mut self, command: &str) -> Option<String>;
}

/// Context that knows no variables, for tests and contexts without a session.
#[derive(Debug, Default)]
pub struct NoContext;

impl ScanContext for NoContext {
    fn variable(&mut self, _: &str) -> Option<String> {
        None
    }

    fn backtick(&mut self, _: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lex {
    Initial,
    /// `'...'`, with backslash escapes for `E'...'`.
    Quote { escapes: bool },
    /// `"..."`
    Ident,
    /// `$tag$...$tag$`
    Dollar(String),
    /// `/* ... */`, nesting depth.
    Comment(u32),
}

/// Lexer state, kept across lines.
#[derive(Debug)]
pub struct Scanner {
    line: String,
    pos: usize,
    lex: Lex,
    paren_depth: usize,
    std_strings: bool,
    /// Text up to here came from a variable value and is not interpolated again.
    no_expand_until: usize,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    pub fn new() -> Scanner {
        Scanner {
            line: String::new(),
            pos: 0,
            lex: Lex::Initial,
            paren_depth: 0,
            std_strings: true,
            no_expand_until: 0,
        }
    }

    /// Whether plain `'...'` strings treat backslash literally, `standard_conforming_strings`.
    pub fn set_std_strings(&mut self, on: bool) {
        self.std_strings = on;
    }

    /// Start lexing a new line.
    pub fn setup(&mut self, line: &str) {
        self.line.clear();
        self.line.push_str(line);
        self.pos = 0;
        self.no_expand_until = 0;
    }

    /// Forget the current line, the lexer state is kept.
    pub fn finish(&mut self) {
        self.line.clear();
        self.pos = 0;
    }

    /// Back to the initial state, outside any quote and parenthesis.
    pub fn reset(&mut self) {
        self.lex = Lex::Initial;
        self.paren_depth = 0;
    }

    /// Inside a quote or comment.
    pub fn in_quote(&self) -> bool {
        self.lex != Lex::Initial
    }

    pub fn paren_depth(&self) -> usize {
        self.paren_depth
    }

    pub fn set_paren_depth(&mut self, depth: usize) {
        self.paren_depth = depth;
    }

    /// Text not yet consumed on the current line.
    pub fn remaining(&self) -> &str {
        &self.line[self.pos..]
    }

    /// Diagnostic for input that ended inside a quote or comment.
    pub fn unterminated(&self) -> Option<&'static str> {
        match self.lex {
            Lex::Initial => None,
            Lex::Quote { .. } => Some("unterminated quoted string"),
            Lex::Ident => Some("unterminated quoted identifier"),
            Lex::Dollar(_) => Some("unterminated dollar-quoted string"),
            Lex::Comment(_) => Some("unterminated /* comment"),
        }
    }

    fn peek(&self) -> Option<char> {
        self.line[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.line[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn prev_char(&self) -> Option<char> {
        self.line[..self.pos].chars().next_back()
    }

    /// Scan until a statement end, a backslash command, or end of line.
    pub fn scan(&mut self, buf: &mut QueryBuffer, cx: &mut dyn ScanContext) -> (ScanResult, PromptStatus) {
        loop {
            let Some(ch) = self.peek() else {
                return self.end_of_line(buf);
            };

            match self.lex.clone() {
                Lex::Initial => {
                    if let Some(result) = self.scan_initial(ch, buf, cx) {
                        return (result, PromptStatus::Ready);
                    }
                }
                Lex::Quote { escapes } => {
                    self.bump();
                    buf.push(ch);
                    if escapes && ch == '\\' {
                        if let Some(next) = self.bump() {
                            buf.push(next);
                        }
                    } else if ch == '\'' {
                        if self.peek() == Some('\'') {
                            self.bump();
                            buf.push('\'');
                        } else {
                            self.lex = Lex::Initial;
                        }
                    }
                }
                Lex::Ident => {
                    self.bump();
                    buf.push(ch);
                    if ch == '"' {
                        if self.peek() == Some('"') {
                            self.bump();
                            buf.push('"');
                        } else {
                            self.lex = Lex::Initial;
                        }
                    }
                }
                Lex::Dollar(tag) => {
                    if self.remaining().starts_with(tag.as_str()) {
                        buf.append(&tag);
                        self.pos += tag.len();
                        self.lex = Lex::Initial;
                    } else {
                        self.bump();
                        buf.push(ch);
                    }
                }
                Lex::Comment(depth) => {
                    if self.remaining().starts_with("*/") {
                        self.pos += 2;
                        buf.append("*/");
                        self.lex = if depth == 1 { Lex::Initial } else { Lex::Comment(depth - 1) };
                    } else if self.remaining().starts_with("/*") {
                        self.pos += 2;
                        buf.append("/*");
                        self.lex = Lex::Comment(depth + 1);
                    } else {
                        self.bump();
                        buf.push(ch);
                    }
                }
            }
        }
    }

    fn end_of_line(&mut self, buf: &QueryBuffer) -> (ScanResult, PromptStatus) {
        let status = match &self.lex {
            Lex::Quote { .. } => PromptStatus::SingleQuote,
            Lex::Ident => PromptStatus::DoubleQuote,
            Lex::Dollar(_) => PromptStatus::DollarQuote,
            Lex::Comment(_) => PromptStatus::Comment,
            Lex::Initial if self.paren_depth > 0 => PromptStatus::Paren,
            Lex::Initial if !buf.is_empty() => PromptStatus::Continue,
            Lex::Initial => PromptStatus::Ready,
        };
        let result = match self.lex {
            Lex::Initial => ScanResult::Eol,
            _ => ScanResult::Incomplete,
        };
        (result, status)
    }

    fn scan_initial(
        &mut self,
        ch: char,
        buf: &mut QueryBuffer,
        cx: &mut dyn ScanContext,
    ) -> Option<ScanResult> {
        match ch {
            // whitespace and line comments are dropped until the statement starts
            c if c.is_whitespace() && buf.is_empty() => {
                self.bump();
            }
            '-' if self.peek_nth(1) == Some('-') => {
                if !buf.is_empty() {
                    buf.append(self.remaining());
                }
                self.pos = self.line.len();
            }
            '/' if self.peek_nth(1) == Some('*') => {
                self.pos += 2;
                buf.append("/*");
                self.lex = Lex::Comment(1);
            }
            '\'' => {
                let escapes = !self.std_strings || self.follows_escape_prefix();
                self.bump();
                buf.push('\'');
                self.lex = Lex::Quote { escapes };
            }
            '"' => {
                self.bump();
                buf.push('"');
                self.lex = Lex::Ident;
            }
            '$' => self.scan_dollar(buf),
            '(' => {
                self.bump();
                buf.push('(');
                self.paren_depth += 1;
            }
            ')' => {
                self.bump();
                buf.push(')');
                self.paren_depth = self.paren_depth.saturating_sub(1);
            }
            ';' => {
                self.bump();
                buf.push(';');
                if self.paren_depth == 0 {
                    return Some(ScanResult::Semicolon);
                }
            }
            '\\' => match self.peek_nth(1) {
                // `\;` and `\:` put the character in the buffer literally
                Some(c @ (';' | ':')) => {
                    self.pos += 2;
                    buf.push(c);
                }
                _ => {
                    self.bump();
                    return Some(ScanResult::Backslash);
                }
            },
            ':' => self.scan_colon(buf, cx),
            _ => {
                self.bump();
                buf.push(ch);
            }
        }
        None
    }

    /// `E'...'` or `e'...'` where the `E` is a token of its own.
    fn follows_escape_prefix(&self) -> bool {
        let mut before = self.line[..self.pos].chars().rev();
        match before.next() {
            Some('E' | 'e') => !before.next().is_some_and(is_ident_char),
            _ => false,
        }
    }

    fn scan_dollar(&mut self, buf: &mut QueryBuffer) {
        // `a$b` is one identifier
        if self.prev_char().is_some_and(is_ident_char) {
            self.bump();
            buf.push('$');
            return;
        }

        let rest = &self.remaining()[1..];
        let tag_len = rest
            .char_indices()
            .take_while(|&(i, c)| if i == 0 { is_ident_start(c) } else { is_ident_char(c) && c != '$' })
            .map(|(i, c)| i + c.len_utf8())
            .last()
            .unwrap_or(0);

        if rest[tag_len..].starts_with('$') {
            let tag = self.remaining()[..tag_len + 2].to_owned();
            buf.append(&tag);
            self.pos += tag.len();
            self.lex = Lex::Dollar(tag);
        } else {
            self.bump();
            buf.push('$');
        }
    }

    fn scan_colon(&mut self, buf: &mut QueryBuffer, cx: &mut dyn ScanContext) {
        // `::` cast
        if self.peek_nth(1) == Some(':') {
            self.pos += 2;
            buf.append("::");
            return;
        }

        if self.pos < self.no_expand_until {
            self.bump();
            buf.push(':');
            return;
        }

        let Some(var) = parse_variable_ref(&self.line[self.pos..]) else {
            self.bump();
            buf.push(':');
            return;
        };

        match var.form {
            VarForm::Exists => {
                let exists = cx.variable(var.name).is_some();
                buf.append(if exists { "TRUE" } else { "FALSE" });
                self.pos += var.len;
            }
            VarForm::Quoted(quote) => match cx.variable(var.name) {
                Some(value) => {
                    buf.append(&quote_value(&value, quote));
                    self.pos += var.len;
                }
                None => {
                    buf.append(&self.line[self.pos..self.pos + var.len]);
                    self.pos += var.len;
                }
            },
            VarForm::Plain => match cx.variable(var.name) {
                Some(value) => {
                    // the value is lexed in place of the reference
                    let end = self.pos + var.len;
                    self.line.replace_range(self.pos..end, &value);
                    self.no_expand_until = self.pos + value.len();
                }
                None => {
                    buf.append(&self.line[self.pos..self.pos + var.len]);
                    self.pos += var.len;
                }
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarForm {
    Plain,
    Quoted(VarQuote),
    /// `:{?name}`
    Exists,
}

#[derive(Debug)]
struct VarRef<'a> {
    name: &'a str,
    form: VarForm,
    /// Bytes of the whole reference, including the colon.
    len: usize,
}

/// Parse a variable reference at the start of `s`, which starts with `:`.
fn parse_variable_ref(s: &str) -> Option<VarRef<'_>> {
    let body = s.strip_prefix(':')?;
    let name_len = |s: &str| s.find(|c: char| !is_variable_char(c)).unwrap_or(s.len());

    let (form, open, close) = match body.chars().next()? {
        '\'' => (VarForm::Quoted(VarQuote::Literal), "'", "'"),
        '"' => (VarForm::Quoted(VarQuote::Ident), "\"", "\""),
        '{' if body.starts_with("{?") => (VarForm::Exists, "{?", "}"),
        c if is_variable_char(c) => {
            let len = name_len(body);
            return Some(VarRef { name: &body[..len], form: VarForm::Plain, len: 1 + len });
        }
        _ => return None,
    };

    let inner = &body[open.len()..];
    let len = name_len(inner);
    if len == 0 || !inner[len..].starts_with(close) {
        return None;
    }
    Some(VarRef {
        name: &inner[..len],
        form,
        len: 1 + open.len() + len + close.len(),
    })
}

fn quote_value(value: &str, quote: VarQuote) -> String {
    match quote {
        VarQuote::Plain => value.to_owned(),
        VarQuote::Literal => quote_literal(value),
        VarQuote::Ident => quote_ident(value),
    }
}

/// Quote as a SQL string literal, using `E'...'` when backslashes are present.
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 3);
    if value.contains('\\') {
        out.push_str(" E");
    }
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// Quote as a SQL identifier.
pub fn quote_ident(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || !c.is_ascii()
}

fn is_variable_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Vars(HashMap<&'static str, &'static str>);

    impl ScanContext for Vars {
        fn variable(&mut self, name: &str) -> Option<String> {
            self.0.get(name).map(|v| v.to_string())
        }

        fn backtick(&mut self, _: &str) -> Option<String> {
            None
        }
    }

    fn scan_all(scanner: &mut Scanner, line: &str, cx: &mut dyn ScanContext) -> (Vec<ScanResult>, QueryBuffer) {
        let mut buf = QueryBuffer::new();
        let mut results = vec![];
        scanner.setup(line);
        loop {
            let (result, _) = scanner.scan(&mut buf, cx);
            results.push(result);
            match result {
                ScanResult::Eol | ScanResult::Incomplete => break,
                ScanResult::Backslash => {
                    scanner.slash_command();
                    scanner.slash_command_end();
                }
                ScanResult::Semicolon => {}
            }
        }
        (results, buf)
    }

    #[test]
    fn statement_end() {
        let mut scanner = Scanner::new();
        let (results, buf) = scan_all(&mut scanner, "select 1; select (2;", &mut NoContext);
        assert_eq!(results, [ScanResult::Semicolon, ScanResult::Eol]);
        assert_eq!(buf.as_str(), "select 1; select (2;");
        assert_eq!(scanner.paren_depth(), 1);
    }

    #[test]
    fn backslash_inside_string_is_text() {
        let mut scanner = Scanner::new();
        let (results, buf) = scan_all(&mut scanner, "select '\\g not a command';", &mut NoContext);
        assert_eq!(results, [ScanResult::Semicolon, ScanResult::Eol]);
        assert_eq!(buf.as_str(), "select '\\g not a command';");
    }

    #[test]
    fn quote_spans_lines() {
        let mut scanner = Scanner::new();
        let mut buf = QueryBuffer::new();
        scanner.setup("select 'a;");
        let (result, status) = scanner.scan(&mut buf, &mut NoContext);
        assert_eq!(result, ScanResult::Incomplete);
        assert_eq!(status, PromptStatus::SingleQuote);
        assert!(scanner.in_quote());

        buf.push('\n');
        scanner.setup("b';");
        let (result, _) = scanner.scan(&mut buf, &mut NoContext);
        assert_eq!(result, ScanResult::Semicolon);
        assert_eq!(buf.as_str(), "select 'a;\nb';");
    }

    #[test]
    fn escape_strings() {
        let mut scanner = Scanner::new();
        let (results, _) = scan_all(&mut scanner, "select E'\\';'; ", &mut NoContext);
        assert_eq!(results, [ScanResult::Semicolon, ScanResult::Eol]);

        // backslash is literal in a plain string, unless standard strings are off
        let (results, _) = scan_all(&mut Scanner::new(), "select 'a\\';", &mut NoContext);
        assert_eq!(results, [ScanResult::Semicolon, ScanResult::Eol]);

        let mut scanner = Scanner::new();
        scanner.set_std_strings(false);
        let (results, _) = scan_all(&mut scanner, "select 'a\\';", &mut NoContext);
        assert_eq!(results, [ScanResult::Incomplete]);
    }

    #[test]
    fn dollar_quotes_and_comments() {
        let mut scanner = Scanner::new();
        let (results, _) = scan_all(&mut scanner, "select $fn$ ; $x$ ; $fn$ /* ; /* ; */ ; */ ; -- ;", &mut NoContext);
        assert_eq!(results, [ScanResult::Semicolon, ScanResult::Eol]);

        let (results, buf) = scan_all(&mut Scanner::new(), "select a$b, $1;", &mut NoContext);
        assert_eq!(results, [ScanResult::Semicolon, ScanResult::Eol]);
        assert_eq!(buf.as_str(), "select a$b, $1;");

        let mut scanner = Scanner::new();
        let (results, _) = scan_all(&mut scanner, "select /* open", &mut NoContext);
        assert_eq!(results, [ScanResult::Incomplete]);
        assert_eq!(scanner.unterminated(), Some("unterminated /* comment"));
    }

    #[test]
    fn leading_whitespace_and_comments() {
        let (results, buf) = scan_all(&mut Scanner::new(), "  -- note", &mut NoContext);
        assert_eq!(results, [ScanResult::Eol]);
        assert!(buf.is_empty());

        let (_, buf) = scan_all(&mut Scanner::new(), "\tselect 1 -- tail", &mut NoContext);
        assert_eq!(buf.as_str(), "select 1 -- tail");
    }

    #[test]
    fn backslash_stops_before_arguments() {
        let mut scanner = Scanner::new();
        let mut buf = QueryBuffer::new();
        scanner.setup("select 1 \\g out.txt");
        let (result, _) = scanner.scan(&mut buf, &mut NoContext);
        assert_eq!(result, ScanResult::Backslash);
        assert_eq!(buf.as_str(), "select 1 ");
        assert_eq!(scanner.remaining(), "g out.txt");

        let (_, buf) = scan_all(&mut Scanner::new(), "select 1\\;select 2", &mut NoContext);
        assert_eq!(buf.as_str(), "select 1;select 2");
    }

    #[test]
    fn variables() {
        let mut vars = Vars::default();
        vars.0.insert("x", "2");
        vars.0.insert("tbl", "my table");
        vars.0.insert("q", "it's");
        vars.0.insert("stmt", "select :x;");

        let (_, buf) = scan_all(&mut Scanner::new(), "select :x, :'q', :\"tbl\", :{?x}, :{?y}, :nope, 1::int", &mut vars);
        assert_eq!(buf.as_str(), "select 2, 'it''s', \"my table\", TRUE, FALSE, :nope, 1::int");

        // value is lexed, but not expanded again
        let (results, buf) = scan_all(&mut Scanner::new(), ":stmt", &mut vars);
        assert_eq!(results, [ScanResult::Semicolon, ScanResult::Eol]);
        assert_eq!(buf.as_str(), "select :x;");

        let (_, buf) = scan_all(&mut Scanner::new(), "select ':x'", &mut vars);
        assert_eq!(buf.as_str(), "select ':x'");
    }

    #[test]
    fn quoting() {
        assert_eq!(quote_literal("a'b"), "'a''b'");
        assert_eq!(quote_literal("a\\b"), " E'a\\\\b'");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
