//! Query output target, set by `\o` and `\g file`.
use std::{
    fs::File,
    io::{self, IsTerminal, Write},
    process::{Child, ChildStdin, ExitStatus},
};

use crate::shell;

#[derive(Debug)]
enum Target {
    Stdout,
    File(File),
    Pipe { child: Child, stdin: Option<ChildStdin> },
}

/// Where query results go.
#[derive(Debug)]
pub struct Output {
    target: Target,
}

impl Default for Output {
    fn default() -> Self {
        Output::stdout()
    }
}

impl Output {
    pub fn stdout() -> Output {
        Output { target: Target::Stdout }
    }

    /// Open a file, or a pipe when `dest` starts with `|`.
    pub fn open(dest: &str) -> io::Result<Output> {
        let target = match dest.strip_prefix('|') {
            Some(command) => {
                let mut child = shell::spawn_writer(command.trim())?;
                let stdin = child.stdin.take();
                Target::Pipe { child, stdin }
            }
            None => Target::File(File::create(dest)?),
        };
        Ok(Output { target })
    }

    pub fn is_stdout(&self) -> bool {
        matches!(self.target, Target::Stdout)
    }

    pub fn is_pipe(&self) -> bool {
        matches!(self.target, Target::Pipe { .. })
    }

    /// Output reaches a terminal, so screen width and paging apply.
    pub fn is_terminal(&self) -> bool {
        self.is_stdout() && io::stdout().is_terminal()
    }

    /// Flush and close, returns the exit status of a pipe command.
    pub fn close(mut self) -> io::Result<Option<ExitStatus>> {
        self.flush()?;
        match self.target {
            Target::Pipe { mut child, stdin } => {
                drop(stdin);
                Ok(Some(child.wait()?))
            }
            _ => Ok(None),
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.target {
            Target::Stdout => io::stdout().write(buf),
            Target::File(file) => file.write(buf),
            Target::Pipe { stdin: Some(stdin), .. } => stdin.write(buf),
            Target::Pipe { stdin: None, .. } => Err(io::ErrorKind::BrokenPipe.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.target {
            Target::Stdout => io::stdout().flush(),
            Target::File(file) => file.flush(),
            Target::Pipe { stdin: Some(stdin), .. } => stdin.flush(),
            Target::Pipe { stdin: None, .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn file_and_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let mut out = Output::open(path.to_str().unwrap()).unwrap();
        assert!(!out.is_stdout());
        out.write_all(b"hello\n").unwrap();
        assert!(out.close().unwrap().is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");

        let piped = dir.path().join("piped.txt");
        let mut out = Output::open(&format!("|cat > '{}'", piped.display())).unwrap();
        assert!(out.is_pipe());
        out.write_all(b"through a pipe\n").unwrap();
        assert!(out.close().unwrap().unwrap().success());
        assert_eq!(std::fs::read_to_string(&piped).unwrap(), "through a pipe\n");
    }
}
