//! COPY data streaming and `\copy`.
//!
//! `\copy` is rewritten into `COPY ... FROM STDIN` or `COPY ... TO STDOUT`, with the client
//! side file, program or standard stream kept in [`Session::copy`] until the server asks for
//! data.
use std::{
    fmt,
    fs::File,
    io::{self, Read, Write},
    path::PathBuf,
    process::Child,
};

use postro_wire::{
    PgTransport, ServerNotice,
    postgres::{BackendMessage, frontend},
};

use crate::{
    conditional::ConditionalStack,
    input::ReadLine,
    prompt::get_prompt,
    scan::PromptStatus,
    session::Session,
    shell, Error, ErrorKind, Result,
};

const COPY_BUF_SIZE: usize = 8192;

/// Client side end of a `\copy`.
pub enum CopyRequest {
    /// `from stdin`, lines of the current input.
    FromInput,
    FromReader { reader: Box<dyn Read>, child: Option<Child>, name: String },
    /// `to stdout`, the query output.
    ToOutput,
    ToWriter { writer: Box<dyn Write>, child: Option<Child>, name: String },
}

impl fmt::Debug for CopyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FromInput => f.write_str("FromInput"),
            Self::FromReader { name, .. } => f.debug_struct("FromReader").field("name", name).finish_non_exhaustive(),
            Self::ToOutput => f.write_str("ToOutput"),
            Self::ToWriter { name, .. } => f.debug_struct("ToWriter").field("name", name).finish_non_exhaustive(),
        }
    }
}

/// Where `\copy` reads from or writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyEnd {
    File(PathBuf),
    Program(String),
    /// `stdin` or `stdout`, the current input or the query output.
    Standard,
    /// `pstdin` or `pstdout`, the process streams.
    Process,
}

/// A parsed `\copy` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyCommand {
    /// The SQL sent to the server.
    pub sql: String,
    pub from: bool,
    pub end: CopyEnd,
}

/// Split a token off `s`, either a quoted string, a parenthesized group or a bare word.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let first = s.chars().next()?;
    let end = match first {
        '\'' | '"' => {
            let mut chars = s.char_indices().skip(1);
            loop {
                match chars.next() {
                    Some((i, c)) if c == first => {
                        // doubled quote stays inside
                        if s[i + 1..].starts_with(first) {
                            chars.next();
                            continue;
                        }
                        break i + 1;
                    }
                    Some(_) => {}
                    None => return None,
                }
            }
        }
        '(' => {
            let mut depth = 0;
            let mut quote = None;
            let mut end = None;
            for (i, c) in s.char_indices() {
                match (quote, c) {
                    (Some(q), c) if c == q => quote = None,
                    (Some(_), _) => {}
                    (None, '\'' | '"') => quote = Some(c),
                    (None, '(') => depth += 1,
                    (None, ')') => {
                        depth -= 1;
                        if depth == 0 {
                            end = Some(i + 1);
                            break;
                        }
                    }
                    _ => {}
                }
            }
            end?
        }
        _ => s
            .find(|c: char| c.is_whitespace() || c == '(')
            .unwrap_or(s.len()),
    };
    Some((&s[..end], &s[end..]))
}

fn dequote(token: &str) -> String {
    match token.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'"),
        None => token.to_owned(),
    }
}

/// Parse the arguments of `\copy`.
pub fn parse_copy(args: &str) -> Result<CopyCommand> {
    let err = || Error::usage(format!("\\copy: parse error at {}", if args.trim().is_empty() { "end of line" } else { args.trim() }));

    let (relation, mut rest) = next_token(args).ok_or_else(err)?;
    let mut before = relation.to_owned();
    if !relation.starts_with('(') {
        // optional column list
        if let Some((columns, after)) = next_token(rest).filter(|(t, _)| t.starts_with('(')) {
            before.push(' ');
            before.push_str(columns);
            rest = after;
        }
    }

    let (direction, rest) = next_token(rest).ok_or_else(err)?;
    let from = match direction.to_ascii_lowercase().as_str() {
        "from" => true,
        "to" => false,
        _ => return Err(Error::usage(format!("\\copy: parse error at \"{direction}\""))),
    };

    let (mut file, mut rest) = next_token(rest).ok_or_else(err)?;
    let end = match file.to_ascii_lowercase().as_str() {
        "program" => {
            let (command, after) = next_token(rest).ok_or_else(err)?;
            if !command.starts_with('\'') {
                return Err(Error::usage("\\copy: program command must be quoted"));
            }
            file = command;
            rest = after;
            CopyEnd::Program(dequote(command))
        }
        "stdin" | "stdout" => CopyEnd::Standard,
        "pstdin" | "pstdout" => CopyEnd::Process,
        _ => CopyEnd::File(PathBuf::from(shell::expand_tilde(&dequote(file)))),
    };
    tracing::trace!(file, "copy endpoint");

    let stream = if from { "FROM STDIN" } else { "TO STDOUT" };
    let rest = rest.trim();
    let sql = match rest.is_empty() {
        true => format!("COPY {before} {stream}"),
        false => format!("COPY {before} {stream} {rest}"),
    };
    Ok(CopyCommand { sql, from, end })
}

impl Session {
    /// `\copy`, returns whether it succeeded.
    pub fn do_copy(&mut self, args: &str) -> Result<bool> {
        let command = parse_copy(args)?;
        let request = match (&command.end, command.from) {
            (CopyEnd::Standard, true) => CopyRequest::FromInput,
            (CopyEnd::Standard, false) => CopyRequest::ToOutput,
            (CopyEnd::Process, true) => CopyRequest::FromReader {
                reader: Box::new(io::stdin()),
                child: None,
                name: "stdin".into(),
            },
            (CopyEnd::Process, false) => CopyRequest::ToWriter {
                writer: Box::new(io::stdout()),
                child: None,
                name: "stdout".into(),
            },
            (CopyEnd::File(path), from) => {
                let name = path.display().to_string();
                if path.is_dir() {
                    return Err(Error::usage(format!("{name}: cannot copy from/to a directory")));
                }
                let opened = if from { File::open(path) } else { File::create(path) };
                let file = opened.map_err(|err| Error::from(err).context(name.clone()))?;
                match from {
                    true => CopyRequest::FromReader { reader: Box::new(file), child: None, name },
                    false => CopyRequest::ToWriter { writer: Box::new(file), child: None, name },
                }
            }
            (CopyEnd::Program(program), true) => {
                let mut child = shell::spawn_reader(program)
                    .map_err(|err| Error::from(err).context(program.clone()))?;
                let reader = child.stdout.take().ok_or_else(|| Error::usage("could not read from program"))?;
                CopyRequest::FromReader { reader: Box::new(reader), child: Some(child), name: program.clone() }
            }
            (CopyEnd::Program(program), false) => {
                let mut child = shell::spawn_writer(program)
                    .map_err(|err| Error::from(err).context(program.clone()))?;
                let writer = child.stdin.take().ok_or_else(|| Error::usage("could not write to program"))?;
                CopyRequest::ToWriter { writer: Box::new(writer), child: Some(child), name: program.clone() }
            }
        };

        tracing::debug!(sql = command.sql, "\\copy");
        self.copy = Some(request);
        Ok(self.send_query(&command.sql))
    }

    /// The server is waiting for COPY data.
    pub(crate) fn handle_copy_in(&mut self) -> Result<()> {
        match self.copy.take() {
            Some(CopyRequest::FromReader { mut reader, child, name }) => {
                let sent = self.copy_from_reader(&mut reader);
                drop(reader);
                self.finish_program(child, &name);
                sent
            }
            _ => self.copy_from_input(),
        }
    }

    fn copy_from_reader(&mut self, reader: &mut dyn Read) -> Result<()> {
        let mut buf = vec![0; COPY_BUF_SIZE];
        loop {
            if self.rt.take_interrupt() {
                return self.copy_fail("canceled by user");
            }
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return self.copy_fail(&format!("could not read COPY data: {err}")),
            };
            self.conn()?.send(frontend::CopyData { data: &buf[..n] });
            self.flush_conn()?;
        }
        self.conn()?.send(frontend::CopyDone);
        self.flush_conn()
    }

    /// Read COPY data lines from the current input up to `\.`.
    fn copy_from_input(&mut self) -> Result<()> {
        let interactive = self.cur_interactive && self.input.is_terminal();
        if interactive && !self.quiet() {
            println!(
                "Enter data to be copied followed by a newline.\n\
                 End with a backslash and a period on a line by itself, or an EOF signal."
            );
        }
        let prompt = match interactive {
            true => get_prompt(self, PromptStatus::Copy, &ConditionalStack::new()),
            false => String::new(),
        };

        let mut buf = Vec::with_capacity(COPY_BUF_SIZE);
        loop {
            let (line, lossy) = match self.input.read_line(&prompt)? {
                ReadLine::Line(line) => (line, false),
                ReadLine::Lossy(line) => (line, true),
                ReadLine::Eof => break,
                ReadLine::Interrupted => return self.copy_fail("canceled by user"),
            };
            self.lineno += 1;
            if lossy {
                self.warn_lossy_line();
            }
            if line.trim_end_matches('\r') == "\\." {
                break;
            }
            buf.extend_from_slice(line.as_bytes());
            buf.push(b'\n');
            if buf.len() >= COPY_BUF_SIZE {
                self.conn()?.send(frontend::CopyData { data: &buf });
                self.flush_conn()?;
                buf.clear();
            }
            if self.rt.take_interrupt() {
                return self.copy_fail("canceled by user");
            }
        }
        if !buf.is_empty() {
            self.conn()?.send(frontend::CopyData { data: &buf });
        }
        self.conn()?.send(frontend::CopyDone);
        self.flush_conn()
    }

    fn copy_fail(&mut self, message: &str) -> Result<()> {
        self.conn()?.send(frontend::CopyFail { message });
        self.flush_conn()
    }

    /// The server is sending COPY data to the `\copy` target or the query output.
    ///
    /// A server error ending the copy is returned rather than raised.
    pub(crate) fn handle_copy_out(&mut self) -> Result<Option<ServerNotice>> {
        match self.copy.take() {
            Some(CopyRequest::ToWriter { mut writer, child, name }) => {
                let received = self.copy_out_to(&mut writer);
                drop(writer);
                self.finish_program(child, &name);
                received
            }
            _ => {
                let mut out = std::mem::take(&mut self.out);
                let received = self.copy_out_to(&mut out);
                self.out = out;
                received
            }
        }
    }

    /// Write COPY data to `sink` until `CopyDone`.
    pub(crate) fn copy_out_to(&mut self, sink: &mut dyn Write) -> Result<Option<ServerNotice>> {
        let mut write_error = None;
        let notice = loop {
            let msg = match self.recv_message() {
                Ok(msg) => msg,
                Err(err) => match err.into_kind() {
                    ErrorKind::Server(notice) => break Some(notice),
                    kind => return Err(kind.into()),
                },
            };
            match msg {
                BackendMessage::CopyData(copy) => {
                    if write_error.is_none() {
                        if let Err(err) = sink.write_all(&copy.data) {
                            write_error = Some(err);
                        }
                    }
                }
                BackendMessage::CopyDone(_) => break None,
                other => {
                    return Err(Error::protocol(format!(
                        "unexpected {} during COPY",
                        BackendMessage::message_name(other.msgtype())
                    )));
                }
            }
        };
        if let Err(err) = sink.flush() {
            write_error.get_or_insert(err);
        }
        if let Some(err) = write_error {
            self.error(format!("could not write COPY data: {err}"));
        }
        Ok(notice)
    }

    /// Wait for a `\copy` program and report its exit status.
    fn finish_program(&mut self, child: Option<Child>, name: &str) {
        let Some(mut child) = child else { return };
        match child.wait() {
            Ok(status) => {
                shell::set_exit_status(&mut self.vars, Some(&status));
                if !status.success() {
                    self.error(format!("program \"{name}\" failed"));
                }
            }
            Err(err) => self.error(format!("could not wait for \"{name}\": {err}")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_copy_forms() {
        let copy = parse_copy("t from stdin").unwrap();
        assert_eq!(copy.sql, "COPY t FROM STDIN");
        assert!(copy.from);
        assert_eq!(copy.end, CopyEnd::Standard);

        let copy = parse_copy("public.t (a, b) to '/tmp/out.csv' with (format csv)").unwrap();
        assert_eq!(copy.sql, "COPY public.t (a, b) TO STDOUT with (format csv)");
        assert_eq!(copy.end, CopyEnd::File("/tmp/out.csv".into()));

        let copy = parse_copy("(select 1, ')') TO program 'gzip > x.gz'").unwrap();
        assert_eq!(copy.sql, "COPY (select 1, ')') TO STDOUT");
        assert_eq!(copy.end, CopyEnd::Program("gzip > x.gz".into()));

        let copy = parse_copy("\"My Table\" from pstdin csv header").unwrap();
        assert_eq!(copy.sql, "COPY \"My Table\" FROM STDIN csv header");
        assert_eq!(copy.end, CopyEnd::Process);

        assert!(parse_copy("").is_err());
        assert!(parse_copy("t into stdout").is_err());
        assert!(parse_copy("t from program gzip").is_err());
    }

    #[test]
    fn copy_to_a_directory_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(
            crate::variables::Variables::with_defaults(),
            crate::input::Input::script("", None),
            false,
        )
        .unwrap();
        let err = session.do_copy(&format!("t to '{}'", dir.path().display())).unwrap_err();
        assert!(err.to_string().contains("cannot copy from/to a directory"));
    }
}
