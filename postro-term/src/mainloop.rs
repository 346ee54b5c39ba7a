//! The read, scan, dispatch loop.
//!
//! Each input source, the terminal, a `-f` file or a `\i` include, runs its own loop with its
//! own query buffer and conditional stack. Lines are scanned into the buffer, statements are
//! sent at a top level `;`, and backslash commands are handed to the dispatcher.
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::{
    buffer::QueryBuffer,
    command::{handle_slash_command, CmdStatus, Context},
    conditional::ConditionalStack,
    input::{Input, ReadLine},
    prompt::get_prompt,
    scan::{PromptStatus, ScanResult, Scanner},
    session::{ScanEnv, Session, PROGNAME},
    variables::Echo,
    Result,
};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_BADCONN: i32 = 2;
pub const EXIT_USER: i32 = 3;

const BOM: &str = "\u{feff}";

/// Words recognized alone on an interactive line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hint {
    Help,
    Quit,
    /// `\q` typed where it is only text, inside a quote.
    BackslashQ,
}

fn hint_word(line: &str) -> Option<Hint> {
    let line = line.trim_start();
    let (hint, rest) = if line.len() >= 4 && line.is_char_boundary(4) {
        match &line[..4] {
            w if w.eq_ignore_ascii_case("help") => (Hint::Help, &line[4..]),
            w if w.eq_ignore_ascii_case("quit") || w.eq_ignore_ascii_case("exit") => (Hint::Quit, &line[4..]),
            _ if line.starts_with("\\q") => (Hint::BackslashQ, &line[2..]),
            _ => return None,
        }
    } else if line.starts_with("\\q") {
        (Hint::BackslashQ, &line[2..])
    } else {
        return None;
    };
    rest.chars().all(|c| c.is_whitespace() || c == ';').then_some(hint)
}

fn ready_like(status: PromptStatus) -> bool {
    matches!(status, PromptStatus::Ready | PromptStatus::Continue | PromptStatus::Paren)
}

/// State of one loop over one input source.
struct MainLoop {
    query: QueryBuffer,
    previous: QueryBuffer,
    cond: ConditionalStack,
    scanner: Scanner,
    prompt: PromptStatus,
    /// Buffer length right after the newline joining two lines was added.
    added_nl: Option<usize>,
    /// Print the buffer before the next prompt, after `\e`.
    redisplay: bool,
    count_eof: i32,
}

impl MainLoop {
    fn new() -> MainLoop {
        MainLoop {
            query: QueryBuffer::new(),
            previous: QueryBuffer::new(),
            cond: ConditionalStack::new(),
            scanner: Scanner::new(),
            prompt: PromptStatus::Ready,
            added_nl: None,
            redisplay: false,
            count_eof: 0,
        }
    }

    /// Forget the statement being typed, after Ctrl-C at the prompt.
    fn cancel_input(&mut self, session: &mut Session) {
        self.scanner.finish();
        self.scanner.reset();
        self.query.reset();
        self.prompt = PromptStatus::Ready;
        self.count_eof = 0;
        session.stmt_lineno = 1;
        if let Some(term) = session.input.terminal_mut() {
            term.discard_history();
        }
    }

    fn read_line(&mut self, session: &mut Session) -> io::Result<ReadLine> {
        if !session.cur_interactive {
            return session.input.read_line("");
        }
        if self.query.is_empty() {
            self.prompt = PromptStatus::Ready;
        }
        if std::mem::take(&mut self.redisplay) && !self.query.is_empty() {
            let mut stdout = io::stdout().lock();
            stdout.write_all(self.query.as_str().as_bytes())?;
            stdout.flush()?;
        }
        let names = session.vars.names().map(str::to_owned).collect();
        let case = session.vars.settings().comp_case;
        if let Some(term) = session.input.terminal_mut() {
            term.set_completion(names, case);
        }
        let prompt = get_prompt(session, self.prompt, &self.cond);
        session.input.read_line(&prompt)
    }

    fn append_history(&self, session: &mut Session, line: &str) {
        if session.cur_interactive {
            if let Some(term) = session.input.terminal_mut() {
                term.append_history(line);
            }
        }
    }

    fn send_history(&self, session: &mut Session) {
        let control = session.vars.settings().histcontrol;
        if let Some(term) = session.input.terminal_mut() {
            term.send_history(control);
        }
    }

    /// Send the buffer and keep it as the previous one.
    fn send(&mut self, session: &mut Session) -> bool {
        let ok = session.send_query(self.query.as_str());
        std::mem::swap(&mut self.query, &mut self.previous);
        self.query.reset();
        ok
    }

    fn run(&mut self, session: &mut Session) -> i32 {
        let mut result = EXIT_SUCCESS;
        let mut status = CmdStatus::SkipLine;
        let mut die_on_error = false;

        while result == EXIT_SUCCESS {
            if !session.cur_interactive && session.rt.take_interrupt() {
                result = EXIT_USER;
                break;
            }
            if session.cur_interactive {
                session.rt.take_interrupt();
            }
            if let Err(err) = io::stdout().flush() {
                tracing::debug!(%err, "flushing standard output");
            }

            let (line, lossy) = match self.read_line(session) {
                Ok(ReadLine::Line(line)) => (line, false),
                Ok(ReadLine::Lossy(line)) => (line, true),
                Ok(ReadLine::Interrupted) => {
                    self.cancel_input(session);
                    if session.cur_interactive {
                        println!();
                        if !self.cond.is_empty() {
                            session.error("\\if: escaped");
                            self.cond.pop();
                        }
                        continue;
                    }
                    result = EXIT_USER;
                    break;
                }
                Ok(ReadLine::Eof) => {
                    if session.cur_interactive {
                        self.count_eof += 1;
                        if self.count_eof < session.vars.settings().ignoreeof {
                            if !session.quiet() {
                                println!("Use \"\\q\" to leave {PROGNAME}.");
                            }
                            continue;
                        }
                        println!("{}", if session.quiet() { "" } else { "\\q" });
                    }
                    break;
                }
                Err(err) => {
                    session.error(format!("could not read input: {err}"));
                    result = EXIT_FAILURE;
                    break;
                }
            };
            self.count_eof = 0;
            session.lineno += 1;
            if lossy {
                session.warn_lossy_line();
            }

            let mut line = line;
            if session.lineno == 1 {
                if let Some(rest) = line.strip_prefix(BOM) {
                    line = rest.to_owned();
                }
                if !session.cur_interactive && line.starts_with("PGDMP") {
                    println!(
                        "The input is a PostgreSQL custom-format dump.\n\
                         Use the pg_restore command-line client to restore this dump to a database.\n"
                    );
                    result = EXIT_FAILURE;
                    break;
                }
            }

            if line.is_empty() && !self.scanner.in_quote() {
                continue;
            }

            if session.cur_interactive {
                match hint_word(&line) {
                    Some(Hint::Help) if self.query.is_empty() => {
                        println!(
                            "You are using {PROGNAME}, the command-line interface to PostgreSQL.\n\
                             Type:  \\copyright for distribution terms\n\
                             \x20      \\h for help with SQL commands\n\
                             \x20      \\? for help with {PROGNAME} commands\n\
                             \x20      \\g or terminate with semicolon to execute query\n\
                             \x20      \\q to quit"
                        );
                        continue;
                    }
                    Some(Hint::Help) => println!("Use \\? for help or press control-C to clear the input buffer."),
                    Some(Hint::Quit) if self.query.is_empty() => break,
                    Some(Hint::Quit) if ready_like(self.prompt) => println!("Use \\q to quit."),
                    Some(Hint::Quit) => println!("Use control-D to quit."),
                    Some(Hint::BackslashQ) if !self.query.is_empty() && !ready_like(self.prompt) => {
                        println!("Use control-D to quit.")
                    }
                    _ => {}
                }
            }

            if session.vars.settings().echo == Echo::All && !session.cur_interactive {
                println!("{line}");
            }

            if self.query.is_empty() {
                self.added_nl = None;
            } else {
                self.query.push('\n');
                self.added_nl = Some(self.query.snapshot_len());
            }

            die_on_error = session.vars.settings().on_error_stop;
            status = self.process_line(session, line, die_on_error);

            if status == CmdStatus::Terminate {
                break;
            }
            if !self.query.is_empty() {
                session.stmt_lineno += 1;
            }
            if !session.cur_interactive {
                if status == CmdStatus::Error && die_on_error {
                    result = EXIT_USER;
                } else if session.conn.is_none() && session.dead.is_some() {
                    result = EXIT_BADCONN;
                }
            }
        }

        // a statement left without its semicolon at the end of a script still runs
        if !self.query.is_empty() && !session.cur_interactive && result == EXIT_SUCCESS {
            let ok = if self.cond.is_active() {
                self.send(session)
            } else {
                true
            };
            if !ok && die_on_error {
                result = EXIT_USER;
            } else if session.conn.is_none() && session.dead.is_some() {
                result = EXIT_BADCONN;
            }
        }

        if status != CmdStatus::Terminate && result != EXIT_USER && !self.cond.is_empty() {
            session.error("reached EOF without finding closing \\endif(s)");
            if die_on_error && !session.cur_interactive {
                result = EXIT_USER;
            }
        }
        result
    }

    /// Scan one line, sending statements and running backslash commands as they end.
    ///
    /// Returns [`CmdStatus::Error`] when something on the line failed.
    fn process_line(&mut self, session: &mut Session, mut line: String, die_on_error: bool) -> CmdStatus {
        self.scanner.set_std_strings(session.std_strings);
        self.scanner.setup(&line);
        let mut success = true;
        let mut status = CmdStatus::SkipLine;
        let mut saved_in_history = false;

        while success || !die_on_error {
            let (scanned, prompt) = {
                let mut env = ScanEnv::new(session, &self.cond);
                self.scanner.scan(&mut self.query, &mut env)
            };
            self.prompt = prompt;

            if scanned == ScanResult::Semicolon
                || (scanned == ScanResult::Eol && session.vars.settings().singleline)
            {
                if session.cur_interactive && !saved_in_history {
                    self.append_history(session, &line);
                    self.send_history(session);
                    saved_in_history = true;
                }
                if self.cond.is_active() {
                    success = self.send(session);
                } else {
                    if session.cur_interactive {
                        session.error("query ignored; use \\endif or Ctrl-C to exit current \\if block");
                    }
                    success = true;
                    self.query.reset();
                }
                status = if success { CmdStatus::Send } else { CmdStatus::Error };
                session.stmt_lineno = 1;
            } else if scanned == ScanResult::Backslash {
                if self.added_nl == Some(self.query.snapshot_len()) {
                    self.query.truncate_to(self.query.snapshot_len() - 1);
                    self.send_history(session);
                }
                self.added_nl = None;
                if session.cur_interactive && !saved_in_history {
                    self.append_history(session, &line);
                    self.send_history(session);
                    saved_in_history = true;
                }

                status = {
                    let mut cx = Context {
                        session: &mut *session,
                        scan: &mut self.scanner,
                        cond: &mut self.cond,
                        query: Some(&mut self.query),
                        previous: Some(&self.previous),
                    };
                    handle_slash_command(&mut cx)
                };
                success = status != CmdStatus::Error;
                session.stmt_lineno = 1;

                match status {
                    CmdStatus::Send => {
                        success = self.send(session);
                        self.scanner.reset();
                    }
                    CmdStatus::NewEdit => {
                        if !self.query.is_empty() && !self.query.ends_with_newline() {
                            self.query.push('\n');
                        }
                        // the edited buffer is scanned again as input
                        self.scanner.finish();
                        line = self.query.as_str().to_owned();
                        self.query.reset();
                        self.scanner.reset();
                        self.scanner.setup(&line);
                        saved_in_history = false;
                        self.prompt = PromptStatus::Ready;
                        self.redisplay = true;
                    }
                    CmdStatus::Terminate => break,
                    _ => {}
                }
            }

            if matches!(scanned, ScanResult::Incomplete | ScanResult::Eol) {
                break;
            }
        }

        if session.cur_interactive && !saved_in_history {
            self.append_history(session, &line);
        }
        self.scanner.finish();

        match status {
            CmdStatus::Terminate => CmdStatus::Terminate,
            _ if !success => CmdStatus::Error,
            status => status,
        }
    }
}

/// Run the loop over the session's current input until it ends.
pub fn main_loop(session: &mut Session) -> i32 {
    let saved_lineno = std::mem::replace(&mut session.lineno, 0);
    let saved_stmt = std::mem::replace(&mut session.stmt_lineno, 1);
    let saved_interactive = session.cur_interactive;
    session.cur_interactive = session.interactive && session.input.is_terminal();

    let code = MainLoop::new().run(session);
    tracing::debug!(code, input = session.input.name(), "input finished");

    session.lineno = saved_lineno;
    session.stmt_lineno = saved_stmt;
    session.cur_interactive = saved_interactive;
    code
}

/// Where `\ir` finds `fname`: next to the script being read.
fn resolve_relative(fname: &str, current: Option<&str>) -> PathBuf {
    let path = Path::new(fname);
    match current.and_then(|cur| Path::new(cur).parent()) {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

/// Run the commands in `fname`, `-` is standard input.
///
/// Failure to open the file is reported here and gives [`EXIT_FAILURE`].
pub fn process_file(session: &mut Session, fname: &str, relative: bool) -> Result<i32> {
    let input = if fname == "-" {
        Input::Reader { reader: Box::new(io::stdin().lock()), name: Some("<stdin>".into()), prompt: false }
    } else {
        let path = match relative {
            true => resolve_relative(fname, session.input.name()),
            false => PathBuf::from(fname),
        };
        match Input::file(&path) {
            Ok(input) => input,
            Err(err) => {
                session.error(format!("{}: {err}", path.display()));
                return Ok(EXIT_FAILURE);
            }
        }
    };

    tracing::debug!(fname, relative, "including file");
    let saved = std::mem::replace(&mut session.input, input);
    let code = main_loop(session);
    session.input = saved;
    Ok(code)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::variables::Variables;

    fn session(script: &str) -> Session {
        Session::new(Variables::with_defaults(), Input::script(script, Some("test.sql")), false).unwrap()
    }

    #[test]
    fn hint_words() {
        assert_eq!(hint_word("help"), Some(Hint::Help));
        assert_eq!(hint_word("HELP;"), Some(Hint::Help));
        assert_eq!(hint_word("  quit  "), Some(Hint::Quit));
        assert_eq!(hint_word("exit;"), Some(Hint::Quit));
        assert_eq!(hint_word("\\q"), Some(Hint::BackslashQ));
        assert_eq!(hint_word("helpful"), None);
        assert_eq!(hint_word("select 1"), None);
    }

    #[test]
    fn relative_paths() {
        assert_eq!(resolve_relative("b.sql", Some("dir/a.sql")), PathBuf::from("dir/b.sql"));
        assert_eq!(resolve_relative("/abs.sql", Some("dir/a.sql")), PathBuf::from("/abs.sql"));
        assert_eq!(resolve_relative("b.sql", None), PathBuf::from("b.sql"));
    }

    #[test]
    fn variables_and_conditionals() {
        let mut s = session("\\set x 1\n\\if :x\n\\set y yes\n\\else\n\\set y no\n\\endif\n");
        assert_eq!(main_loop(&mut s), EXIT_SUCCESS);
        assert_eq!(s.vars.get("y"), Some("yes"));
    }

    #[test]
    fn ignored_branch_sends_nothing() {
        // without a connection any send would fail and stop the script
        let mut s = session("\\set ON_ERROR_STOP on\n\\if false\nselect 1;\n\\endif\n\\set done 1\n");
        assert_eq!(main_loop(&mut s), EXIT_SUCCESS);
        assert_eq!(s.vars.get("done"), Some("1"));
    }

    #[test]
    fn on_error_stop() {
        let mut s = session("\\set ON_ERROR_STOP on\nselect 1;\n\\set after 1\n");
        assert_eq!(main_loop(&mut s), EXIT_USER);
        assert_eq!(s.vars.get("after"), None);

        let mut s = session("select 1;\n\\set after 1\n");
        assert_eq!(main_loop(&mut s), EXIT_SUCCESS);
        assert_eq!(s.vars.get("after"), Some("1"));
    }

    #[test]
    fn unterminated_if() {
        let mut s = session("\\set ON_ERROR_STOP on\n\\if true\n");
        assert_eq!(main_loop(&mut s), EXIT_USER);

        let mut s = session("\\if true\n");
        assert_eq!(main_loop(&mut s), EXIT_SUCCESS);
    }

    #[test]
    fn quit_stops_reading() {
        let mut s = session("\\set a 1\n\\q\n\\set b 1\n");
        assert_eq!(main_loop(&mut s), EXIT_SUCCESS);
        assert_eq!(s.vars.get("a"), Some("1"));
        assert_eq!(s.vars.get("b"), None);
    }

    #[test]
    fn byte_order_mark() {
        let mut s = session("\u{feff}\\set a 1\n");
        assert_eq!(main_loop(&mut s), EXIT_SUCCESS);
        assert_eq!(s.vars.get("a"), Some("1"));
    }

    #[test]
    fn custom_dump_rejected() {
        let mut s = session("PGDMP\u{1}\n");
        assert_eq!(main_loop(&mut s), EXIT_FAILURE);
    }

    #[test]
    fn missing_include() {
        let mut s = session("");
        assert_eq!(process_file(&mut s, "/nonexistent/file.sql", false).unwrap(), EXIT_FAILURE);
    }
}
