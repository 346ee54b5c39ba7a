//! External pager.
//!
//! The pager is `PSQL_PAGER`, then `PAGER`, then `less`. Setting either variable to an empty
//! string disables paging. The command is run through `sh -c` with its stdin piped.
use std::{
    io::{self, IsTerminal, Write},
    process::{Child, ChildStdin, Command, Stdio},
};

use super::{width::str_width, PagerUse, PrintOptions};

const DEFAULT_PAGER: &str = "less";

/// Pager command for query results, `None` when paging is disabled.
pub fn pager_command() -> Option<String> {
    let cmd = std::env::var("PSQL_PAGER")
        .or_else(|_| std::env::var("PAGER"))
        .unwrap_or_else(|_| DEFAULT_PAGER.to_owned());
    (!cmd.trim().is_empty()).then_some(cmd)
}

/// Pager command for `\watch`, there is no default.
pub fn watch_pager_command() -> Option<String> {
    std::env::var("PSQL_WATCH_PAGER").ok().filter(|cmd| !cmd.trim().is_empty())
}

/// A running pager process.
#[derive(Debug)]
pub struct Pager {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl Pager {
    pub fn spawn(cmd: &str) -> io::Result<Pager> {
        tracing::debug!(cmd, "starting pager");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::piped())
            .spawn()?;
        let stdin = child.stdin.take();
        Ok(Pager { child, stdin })
    }

    /// Write to the pager, returns `false` once the pager has quit.
    pub fn write(&mut self, bytes: &[u8]) -> io::Result<bool> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Ok(false);
        };
        match stdin.write_all(bytes).and_then(|_| stdin.flush()) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                self.stdin = None;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Close the pipe and wait for the user to leave the pager.
    pub fn finish(mut self) -> io::Result<()> {
        drop(self.stdin.take());
        self.child.wait()?;
        Ok(())
    }
}

/// Whether output `lines` long, `None` when the length is not known yet, goes through the
/// pager on a screen `rows` high.
fn needs_pager(lines: Option<usize>, wide: bool, rows: usize, opt: &PrintOptions) -> bool {
    match opt.pager {
        PagerUse::Never => false,
        PagerUse::Always => true,
        PagerUse::OnDemand => wide || lines.is_none_or(|n| n >= rows && n >= opt.pager_min_lines),
    }
}

fn on_terminal() -> bool {
    io::stdin().is_terminal() && io::stdout().is_terminal()
}

/// Whether `text` should go through the pager instead of straight to the terminal.
pub fn wanted(text: &str, opt: &PrintOptions) -> bool {
    if opt.pager == PagerUse::Never || !on_terminal() {
        return false;
    }
    let Some((cols, rows)) = terminal_size::terminal_size() else {
        return opt.pager == PagerUse::Always;
    };
    let wide = text.lines().any(|line| str_width(line) > cols.0 as usize);
    needs_pager(Some(text.lines().count()), wide, rows.0 as usize, opt)
}

/// Pager for a result printed in chunks, whose length is unknown until the last one.
///
/// The caller writes every chunk to the same pager and finishes it after the last.
pub fn open_for_chunks(opt: &PrintOptions) -> Option<Pager> {
    if !on_terminal() || !needs_pager(None, false, 0, opt) {
        return None;
    }
    let cmd = pager_command()?;
    match Pager::spawn(&cmd) {
        Ok(pager) => Some(pager),
        Err(err) => {
            tracing::warn!(%err, cmd, "could not start pager");
            None
        }
    }
}

/// Print rendered output on stdout, through the pager when it does not fit the screen.
pub fn page(text: &str, opt: &PrintOptions) -> io::Result<()> {
    if wanted(text, opt) {
        if let Some(cmd) = pager_command() {
            match Pager::spawn(&cmd) {
                Ok(mut pager) => {
                    pager.write(text.as_bytes())?;
                    return pager.finish();
                }
                Err(err) => tracing::warn!(%err, cmd, "could not start pager"),
            }
        }
    }
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pager_decision() {
        let mut opt = PrintOptions::default();
        opt.pager = PagerUse::OnDemand;
        opt.pager_min_lines = 0;
        assert!(!needs_pager(Some(10), false, 24, &opt));
        assert!(needs_pager(Some(30), false, 24, &opt));
        assert!(needs_pager(Some(3), true, 24, &opt));
        // chunked results are paged up front
        assert!(needs_pager(None, false, 24, &opt));

        opt.pager_min_lines = 100;
        assert!(!needs_pager(Some(30), false, 24, &opt));
        assert!(needs_pager(None, false, 24, &opt));

        opt.pager = PagerUse::Never;
        assert!(!needs_pager(None, false, 24, &opt));
        opt.pager = PagerUse::Always;
        assert!(needs_pager(Some(1), false, 24, &opt));
    }
}
