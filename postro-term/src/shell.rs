//! Subprocesses: shell commands, backticks and the editor.
//!
//! Every command runs through `sh -c`. Exit status is reported back as the `SHELL_ERROR` and
//! `SHELL_EXIT_CODE` variables.
use std::{
    io,
    path::Path,
    process::{Command, ExitStatus, Stdio},
};

use crate::{variables::Variables, Error, Result};

const DEFAULT_SHELL: &str = "/bin/sh";
const DEFAULT_EDITOR: &str = "vi";
const DEFAULT_LINENUMBER_ARG: &str = "+";

/// Exit code as a shell would report it, 128 plus the signal number for a killed child.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Record `status` in `SHELL_ERROR` and `SHELL_EXIT_CODE`.
pub fn set_exit_status(vars: &mut Variables, status: Option<&ExitStatus>) {
    let code = status.map_or(-1, exit_code);
    let _ = vars.set("SHELL_ERROR", Some(if code == 0 { "false" } else { "true" }));
    let _ = vars.set("SHELL_EXIT_CODE", Some(&code.to_string()));
}

fn shell(command: &str) -> Command {
    let mut cmd = Command::new(DEFAULT_SHELL);
    cmd.arg("-c").arg(command);
    cmd
}

/// `\!`, without a command an interactive shell is started.
pub fn run(vars: &mut Variables, command: Option<&str>) -> Result<()> {
    tracing::debug!(command, "running shell command");
    let status = match command {
        Some(command) => shell(command).status(),
        None => {
            let program = std::env::var("SHELL").unwrap_or_else(|_| DEFAULT_SHELL.to_owned());
            Command::new(program).status()
        }
    };
    match status {
        Ok(status) => {
            set_exit_status(vars, Some(&status));
            if status.success() {
                Ok(())
            } else {
                Err(Error::usage("\\!: failed"))
            }
        }
        Err(err) => {
            set_exit_status(vars, None);
            Err(Error::from(err).context("\\!"))
        }
    }
}

/// Output of `` `command` ``, with one trailing newline removed.
pub fn backtick(vars: &mut Variables, command: &str) -> Result<String> {
    tracing::debug!(command, "evaluating backtick");
    let output = shell(command).stdin(Stdio::inherit()).stderr(Stdio::inherit()).output();
    let output = match output {
        Ok(output) => output,
        Err(err) => {
            set_exit_status(vars, None);
            return Err(Error::usage(format!("could not execute command \"{command}\": {err}")));
        }
    };
    set_exit_status(vars, Some(&output.status));

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    if text.ends_with('\n') {
        text.pop();
    }
    if !output.status.success() {
        return Err(Error::usage(format!(
            "command \"{command}\" failed with exit code {}",
            exit_code(&output.status),
        )));
    }
    Ok(text)
}

/// Editor command, from `PSQL_EDITOR`, `EDITOR` or `VISUAL`.
pub fn editor() -> String {
    ["PSQL_EDITOR", "EDITOR", "VISUAL"]
        .into_iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| DEFAULT_EDITOR.to_owned())
}

/// Open `path` in the editor, positioned at `line` when given.
pub fn edit_file(path: &Path, line: Option<u32>) -> Result<()> {
    let editor = editor();
    let path = path.display();
    let command = match line {
        Some(line) => {
            let arg = std::env::var("PSQL_EDITOR_LINENUMBER_ARG")
                .unwrap_or_else(|_| DEFAULT_LINENUMBER_ARG.to_owned());
            format!("exec {editor} {arg}{line} '{path}'")
        }
        None => format!("exec {editor} '{path}'"),
    };
    tracing::debug!(command, "starting editor");

    let status = shell(&command).status().map_err(|err| {
        Error::from(err).context(format!("could not start editor \"{editor}\""))
    })?;
    if !status.success() {
        return Err(Error::usage(format!("could not start editor \"{editor}\"")));
    }
    Ok(())
}

/// Replace a leading `~` or `~/` with the home directory.
pub fn expand_tilde(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_owned(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{rest}", home.display()),
        None => path.to_owned(),
    }
}

/// Spawn `command` with its stdin piped, for `\o |cmd`, `\g |cmd` and `\copy ... program`.
pub fn spawn_writer(command: &str) -> io::Result<std::process::Child> {
    shell(command).stdin(Stdio::piped()).spawn()
}

/// Spawn `command` with its stdout piped.
pub fn spawn_reader(command: &str) -> io::Result<std::process::Child> {
    shell(command).stdout(Stdio::piped()).spawn()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn backtick_output_and_status() {
        let mut vars = Variables::new();
        assert_eq!(backtick(&mut vars, "echo hello").unwrap(), "hello");
        assert_eq!(vars.get("SHELL_ERROR"), Some("false"));
        assert_eq!(vars.get("SHELL_EXIT_CODE"), Some("0"));

        assert!(backtick(&mut vars, "exit 3").is_err());
        assert_eq!(vars.get("SHELL_ERROR"), Some("true"));
        assert_eq!(vars.get("SHELL_EXIT_CODE"), Some("3"));
    }

    #[test]
    fn tilde() {
        assert_eq!(expand_tilde("/tmp/x"), "/tmp/x");
        assert_eq!(expand_tilde("~user/x"), "~user/x");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/x"), format!("{}/x", home.display()));
        }
    }

    #[test]
    fn shell_command_status() {
        let mut vars = Variables::new();
        run(&mut vars, Some("true")).unwrap();
        assert_eq!(vars.get("SHELL_EXIT_CODE"), Some("0"));
        assert!(run(&mut vars, Some("exit 2")).is_err());
        assert_eq!(vars.get("SHELL_EXIT_CODE"), Some("2"));
    }
}
