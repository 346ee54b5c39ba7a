//! `\set`, `\unset`, `\echo`, `\qecho`, `\warn`, `\prompt`, `\timing` and `\errverbose`.
use std::io::{self, BufRead, Write};

use super::{CmdStatus, Context};
use crate::{
    report::format_notice,
    scan::OptionKind,
    variables::{parse_bool_var, ShowContext, Verbosity},
    Error, Result,
};

pub(super) fn exec_set(cx: &mut Context<'_>) -> Result<CmdStatus> {
    let Some(var) = cx.arg(OptionKind::Normal, false) else {
        let listing: String = cx
            .session
            .vars
            .iter()
            .map(|(name, value)| format!("{name} = '{value}'\n"))
            .collect();
        print!("{listing}");
        return Ok(CmdStatus::SkipLine);
    };
    // the value is the concatenation of the remaining words
    let value = cx.args(OptionKind::Normal).concat();
    cx.session.vars.set(&var, Some(&value))?;
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_unset(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    let var = cx
        .arg(OptionKind::Normal, false)
        .ok_or_else(|| Error::usage(format!("\\{name}: missing required argument")))?;
    cx.session.vars.unset(&var)?;
    Ok(CmdStatus::SkipLine)
}

/// Join the words of `\echo`, a leading unquoted `-n` drops the newline.
fn echo_text(words: Vec<(String, bool)>) -> String {
    let mut text = String::new();
    let mut newline = true;
    let mut first = true;
    for (word, quoted) in words {
        if first && newline && !quoted && word == "-n" {
            newline = false;
            continue;
        }
        if !first {
            text.push(' ');
        }
        first = false;
        text.push_str(&word);
    }
    if newline {
        text.push('\n');
    }
    text
}

pub(super) fn exec_echo(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    let words = std::iter::from_fn(|| cx.arg_quoted(OptionKind::Normal)).collect();
    let text = echo_text(words);
    match name {
        "qecho" => {
            cx.session.out.write_all(text.as_bytes())?;
            cx.session.out.flush()?;
        }
        "warn" => {
            let mut stderr = io::stderr().lock();
            stderr.write_all(text.as_bytes())?;
            stderr.flush()?;
        }
        _ => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_prompt(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    let first = cx.arg(OptionKind::Normal, false);
    let second = cx.arg(OptionKind::Normal, false);
    let (text, var) = match (first, second) {
        (None, _) => return Err(Error::usage(format!("\\{name}: missing required argument"))),
        (Some(var), None) => (None, var),
        (Some(text), Some(var)) => (Some(text), var),
    };

    if let Some(text) = text {
        print!("{text}");
        io::stdout().flush()?;
    }
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(Error::usage(format!("\\{name}: could not read value for variable")));
    }
    let value = line.strip_suffix('\n').unwrap_or(&line);
    let value = value.strip_suffix('\r').unwrap_or(value);
    cx.session.vars.set(&var, Some(value))?;
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_timing(cx: &mut Context<'_>) -> Result<CmdStatus> {
    cx.session.timing = match cx.arg(OptionKind::Normal, false) {
        Some(value) => parse_bool_var(&value, "\\timing")?,
        None => !cx.session.timing,
    };
    if !cx.session.quiet() {
        println!("Timing is {}.", if cx.session.timing { "on" } else { "off" });
    }
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_errverbose(cx: &mut Context<'_>) -> Result<CmdStatus> {
    match &cx.session.last_error {
        Some(last) => {
            let text = format_notice(&last.notice, last.query.as_deref(), Verbosity::Verbose, ShowContext::Always);
            cx.session.info(text);
        }
        None => println!("There is no previous error."),
    }
    Ok(CmdStatus::SkipLine)
}

#[cfg(test)]
mod test {
    use super::*;

    fn words(list: &[(&str, bool)]) -> Vec<(String, bool)> {
        list.iter().map(|(w, q)| (w.to_string(), *q)).collect()
    }

    #[test]
    fn echo_words() {
        assert_eq!(echo_text(words(&[("a", false), ("b c", true)])), "a b c\n");
        assert_eq!(echo_text(words(&[("-n", false), ("x", false), ("y", false)])), "x y");
        assert_eq!(echo_text(words(&[("-n", true)])), "-n\n");
        assert_eq!(echo_text(words(&[("x", false), ("-n", false)])), "x -n\n");
        assert_eq!(echo_text(vec![]), "\n");
    }
}
