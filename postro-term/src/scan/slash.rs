//! Backslash command arguments.
//!
//! After [`Scanner::scan`] returns [`ScanResult::Backslash`][super::ScanResult::Backslash], the
//! command name and its arguments are read from the rest of the line with the methods here.
//! Arguments end at whitespace or at the next backslash, which starts another command.
use super::{parse_variable_ref, quote_value, ScanContext, Scanner, VarForm};

/// How a meta-command argument is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Shell like word: `'...'` is unquoted with escapes processed, `"..."` is kept as is.
    Normal,
    /// SQL identifier: unquoted letters are folded to lower case, double quotes are removed.
    SqlId,
    /// File name, or `|command` which takes the rest of the line.
    FilePipe,
    /// Rest of the line, trailing whitespace removed.
    WholeLine,
    /// Like [`OptionKind::Normal`] without evaluating variables or backticks.
    NoEval,
}

/// One collected argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashOption {
    pub text: String,
    /// First quote character seen, if any part was quoted.
    pub quote: Option<char>,
}

impl Scanner {
    /// Command name following the backslash.
    pub fn slash_command(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '\\' {
                break;
            }
            self.bump();
        }
        self.line[start..self.pos].to_owned()
    }

    /// Next argument, `None` at end of line or before another command.
    ///
    /// With `semicolon`, unquoted trailing semicolons are dropped, so `\c db;` works.
    pub fn slash_option(&mut self, kind: OptionKind, semicolon: bool, cx: &mut dyn ScanContext) -> Option<String> {
        self.slash_option_quoted(kind, semicolon, cx).map(|opt| opt.text)
    }

    pub fn slash_option_quoted(
        &mut self,
        kind: OptionKind,
        semicolon: bool,
        cx: &mut dyn ScanContext,
    ) -> Option<SlashOption> {
        self.skip_whitespace();
        let first = self.peek()?;

        match kind {
            OptionKind::WholeLine => return self.whole_line(),
            OptionKind::FilePipe if first == '|' => return self.whole_line(),
            _ => {}
        }

        if first == '\\' {
            return None;
        }

        let eval = kind != OptionKind::NoEval;
        let mut text = String::new();
        let mut quote = None;
        // unquoted characters at the end of `text`
        let mut tail = 0usize;

        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || ch == '\\' {
                break;
            }
            match ch {
                '\'' => {
                    self.bump();
                    quote.get_or_insert('\'');
                    self.single_quoted(&mut text);
                    tail = 0;
                }
                '"' => {
                    self.bump();
                    quote.get_or_insert('"');
                    text.push('"');
                    while let Some(c) = self.bump() {
                        text.push(c);
                        if c == '"' {
                            if self.peek() == Some('"') {
                                self.bump();
                                text.push('"');
                            } else {
                                break;
                            }
                        }
                    }
                    tail = 0;
                }
                '`' => {
                    self.bump();
                    quote.get_or_insert('`');
                    let start = self.pos;
                    while self.peek().is_some_and(|c| c != '`') {
                        self.bump();
                    }
                    let command = self.line[start..self.pos].to_owned();
                    self.bump();
                    if eval {
                        if let Some(output) = cx.backtick(&command) {
                            text.push_str(&output);
                        }
                    } else {
                        text.push_str(&command);
                    }
                    tail = 0;
                }
                ':' if eval => match parse_variable_ref(self.remaining()) {
                    Some(var) => {
                        let raw = &self.line[self.pos..self.pos + var.len];
                        match (var.form, cx.variable(var.name)) {
                            (VarForm::Exists, value) => {
                                text.push_str(if value.is_some() { "TRUE" } else { "FALSE" })
                            }
                            (VarForm::Plain, Some(value)) => text.push_str(&value),
                            (VarForm::Quoted(q), Some(value)) => text.push_str(&quote_value(&value, q)),
                            (_, None) => text.push_str(raw),
                        }
                        self.pos += var.len;
                        tail = 0;
                    }
                    None => {
                        self.bump();
                        text.push(':');
                        tail += 1;
                    }
                },
                _ => {
                    self.bump();
                    text.push(ch);
                    tail += 1;
                }
            }
        }

        if semicolon {
            while tail > 0 && text.ends_with(';') {
                text.pop();
                tail -= 1;
            }
        }

        if kind == OptionKind::SqlId {
            text = dequote_identifier(&text);
        }

        if text.is_empty() && quote.is_none() {
            return None;
        }
        Some(SlashOption { text, quote })
    }

    /// Consume every remaining argument of the current command.
    pub fn skip_slash_options(&mut self, cx: &mut dyn ScanContext) -> Vec<String> {
        let mut skipped = vec![];
        while let Some(opt) = self.slash_option(OptionKind::NoEval, false, cx) {
            skipped.push(opt);
        }
        skipped
    }

    /// Discard the rest of the line.
    pub fn skip_slash_line(&mut self) {
        self.pos = self.line.len();
    }

    /// Finish the command, swallowing a `\\` separator.
    pub fn slash_command_end(&mut self) {
        self.skip_whitespace();
        if self.remaining().starts_with("\\\\") {
            self.pos += 2;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn whole_line(&mut self) -> Option<SlashOption> {
        let text = self.remaining().trim_end().to_owned();
        self.pos = self.line.len();
        if text.is_empty() {
            return None;
        }
        Some(SlashOption { text, quote: None })
    }

    /// Body of `'...'` after the opening quote.
    fn single_quoted(&mut self, out: &mut String) {
        while let Some(ch) = self.bump() {
            match ch {
                '\'' if self.peek() == Some('\'') => {
                    self.bump();
                    out.push('\'');
                }
                '\'' => return,
                '\\' => self.escape(out),
                _ => out.push(ch),
            }
        }
    }

    fn escape(&mut self, out: &mut String) {
        let Some(ch) = self.bump() else {
            out.push('\\');
            return;
        };
        match ch {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'r' => out.push('\r'),
            'f' => out.push('\u{c}'),
            '0'..='7' => {
                let mut value = ch.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            self.bump();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(value & 0xff));
            }
            'x' if self.peek().is_some_and(|c| c.is_ascii_hexdigit()) => {
                let mut value = 0;
                for _ in 0..2 {
                    match self.peek().and_then(|c| c.to_digit(16)) {
                        Some(d) => {
                            value = value * 16 + d;
                            self.bump();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(value));
            }
            _ => out.push(ch),
        }
    }
}

/// Fold unquoted letters to lower case and strip double quotes, `""` inside quotes is a quote.
pub fn dequote_identifier(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_quotes = false;
    while let Some(ch) = chars.next() {
        if ch == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                chars.next();
                out.push('"');
            } else {
                in_quotes = !in_quotes;
            }
        } else if in_quotes {
            out.push(ch);
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scan::NoContext;

    struct Cx;

    impl ScanContext for Cx {
        fn variable(&mut self, name: &str) -> Option<String> {
            (name == "f").then(|| "out file".to_owned())
        }

        fn backtick(&mut self, command: &str) -> Option<String> {
            (command == "echo hi").then(|| "hi".to_owned())
        }
    }

    fn command(line: &str) -> (Scanner, String) {
        let mut scanner = Scanner::new();
        scanner.setup(line);
        let name = scanner.slash_command();
        (scanner, name)
    }

    #[test]
    fn words_and_quotes() {
        let (mut s, name) = command("echo 'it''s\\tme' \"kept \"\" quotes\" plain\\q");
        assert_eq!(name, "echo");
        let opt = s.slash_option_quoted(OptionKind::Normal, false, &mut NoContext).unwrap();
        assert_eq!(opt.text, "it's\tme");
        assert_eq!(opt.quote, Some('\''));
        assert_eq!(s.slash_option(OptionKind::Normal, false, &mut NoContext).unwrap(), "\"kept \"\" quotes\"");
        assert_eq!(s.slash_option(OptionKind::Normal, false, &mut NoContext).unwrap(), "plain");
        assert_eq!(s.slash_option(OptionKind::Normal, false, &mut NoContext), None);
        s.slash_command_end();
        assert_eq!(s.remaining(), "\\q");
    }

    #[test]
    fn escapes() {
        let (mut s, _) = command("echo '\\101\\x42\\n'");
        assert_eq!(s.slash_option(OptionKind::Normal, false, &mut NoContext).unwrap(), "AB\n");
    }

    #[test]
    fn variables_and_backticks() {
        let (mut s, _) = command("o :f :'f' `echo hi` :nope");
        assert_eq!(s.slash_option(OptionKind::Normal, false, &mut Cx).unwrap(), "out file");
        assert_eq!(s.slash_option(OptionKind::Normal, false, &mut Cx).unwrap(), "'out file'");
        assert_eq!(s.slash_option(OptionKind::Normal, false, &mut Cx).unwrap(), "hi");
        assert_eq!(s.slash_option(OptionKind::Normal, false, &mut Cx).unwrap(), ":nope");

        let (mut s, _) = command("if :f");
        assert_eq!(s.slash_option(OptionKind::NoEval, false, &mut Cx).unwrap(), ":f");
    }

    #[test]
    fn identifiers_and_semicolons() {
        let (mut s, _) = command("c MyDb;");
        assert_eq!(s.slash_option(OptionKind::SqlId, true, &mut NoContext).unwrap(), "mydb");

        let (mut s, _) = command("d \"My\"\"Tbl\".Col ';'");
        assert_eq!(s.slash_option(OptionKind::SqlId, true, &mut NoContext).unwrap(), "My\"Tbl.col");
        assert_eq!(s.slash_option(OptionKind::Normal, true, &mut NoContext).unwrap(), ";");
    }

    #[test]
    fn whole_line_and_pipes() {
        let (mut s, name) = command("! ls -l \\x  ");
        assert_eq!(name, "!");
        assert_eq!(s.slash_option(OptionKind::WholeLine, false, &mut NoContext).unwrap(), "ls -l \\x");

        let (mut s, _) = command("o |cat -n > x");
        assert_eq!(s.slash_option(OptionKind::FilePipe, false, &mut NoContext).unwrap(), "|cat -n > x");

        let (mut s, _) = command("o out.txt");
        assert_eq!(s.slash_option(OptionKind::FilePipe, false, &mut NoContext).unwrap(), "out.txt");
    }

    #[test]
    fn separator() {
        let (mut s, _) = command("set x 1 \\\\ select :x;");
        assert_eq!(s.skip_slash_options(&mut NoContext), ["x", "1"]);
        s.slash_command_end();
        assert_eq!(s.remaining(), " select :x;");
    }
}
