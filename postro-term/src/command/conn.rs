//! `\c`, `\conninfo`, `\password`, `\encoding`, `\cd`, `\setenv`, `\getenv`, `\!` and
//! `\copy`.
use postro_wire::auth::encrypt_password;

use super::{CmdStatus, Context};
use crate::{
    connect::{self, ConnectArgs},
    scan::{quote_ident, quote_literal, OptionKind},
    shell,
    variables::parse_bool_var,
    Error, ErrorKind, Result,
};

const REUSE_PREFIX: &str = "-reuse-previous=";

fn status(ok: bool) -> CmdStatus {
    if ok { CmdStatus::SkipLine } else { CmdStatus::Error }
}

pub(super) fn exec_connect(cx: &mut Context<'_>) -> Result<CmdStatus> {
    let mut first = cx.arg(OptionKind::Normal, true);
    let mut reuse = None;
    if let Some(value) = first.as_deref().and_then(|f| f.strip_prefix(REUSE_PREFIX)) {
        reuse = Some(parse_bool_var(value, "-reuse-previous")?);
        first = cx.arg(OptionKind::Normal, true);
    }
    let args = ConnectArgs {
        dbname: first,
        user: cx.arg(OptionKind::Normal, true),
        host: cx.arg(OptionKind::Normal, true),
        port: cx.arg(OptionKind::Normal, true),
    };
    let ok = connect::do_connect(cx.session, &args, reuse)?;
    Ok(status(ok))
}

pub(super) fn exec_conninfo(cx: &mut Context<'_>) -> Result<CmdStatus> {
    println!("{}", connect::conninfo(cx.session));
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_password(cx: &mut Context<'_>) -> Result<CmdStatus> {
    let user = match cx.arg(OptionKind::SqlId, true) {
        Some(user) => user,
        None => match cx.session.exec_internal("SELECT CURRENT_USER")? {
            Some(result) => result.get(0, 0).to_owned(),
            None => return Ok(CmdStatus::SkipLine),
        },
    };

    let first = rpassword::prompt_password(format!("Enter new password for user \"{user}\": "))?;
    let second = rpassword::prompt_password("Enter it again: ")?;
    if first != second {
        return Err(Error::usage("Passwords didn't match."));
    }

    let algorithm = match cx.session.conn()?.parameter("password_encryption") {
        Some(algorithm) => algorithm.to_owned(),
        None => {
            let result = cx.session.run_simple("SHOW password_encryption")?;
            if let Some(notice) = result.error {
                return Err(notice.into());
            }
            result.get(0, 0).to_owned()
        }
    };
    // servers before 10 report "on" for md5
    let algorithm = match algorithm.as_str() {
        "on" | "off" => "md5",
        other => other,
    };
    let encrypted = encrypt_password(&user, &first, algorithm).map_err(|err| Error::usage(err.to_string()))?;

    let sql = format!("ALTER USER {} PASSWORD {}", quote_ident(&user), quote_literal(&encrypted));
    cx.session.exec_internal(&sql)?;
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_encoding(cx: &mut Context<'_>) -> Result<CmdStatus> {
    let Some(encoding) = cx.arg(OptionKind::Normal, false) else {
        let current = cx
            .session
            .conn
            .as_ref()
            .and_then(|conn| conn.parameter("client_encoding"))
            .or_else(|| cx.session.vars.get("ENCODING"))
            .unwrap_or("UTF8");
        println!("{current}");
        return Ok(CmdStatus::SkipLine);
    };

    let sql = format!("SET client_encoding TO {}", quote_literal(&encoding));
    let failed = match cx.session.run_simple(&sql) {
        Ok(result) => result.error.is_some(),
        Err(err) if matches!(err.kind(), ErrorKind::NoConnection) => true,
        Err(err) => return Err(err),
    };
    if failed {
        return Err(Error::usage(format!("{encoding}: invalid encoding name or conversion procedure not found")));
    }
    cx.session.sync_variables();
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_cd(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    let dir = match cx.arg(OptionKind::Normal, true) {
        Some(dir) => shell::expand_tilde(&dir),
        None => dirs::home_dir()
            .map(|home| home.display().to_string())
            .ok_or_else(|| Error::usage(format!("\\{name}: could not get home directory")))?,
    };
    std::env::set_current_dir(&dir)
        .map_err(|err| Error::usage(format!("\\{name}: could not change directory to \"{dir}\": {err}")))?;
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_setenv(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    let var = cx
        .arg(OptionKind::Normal, false)
        .ok_or_else(|| Error::usage(format!("\\{name}: missing required argument")))?;
    let value = cx.arg(OptionKind::Normal, false);
    if var.is_empty() || var.contains('=') {
        return Err(Error::usage(format!("\\{name}: environment variable name must not contain \"=\"")));
    }
    // SAFETY: the terminal runs every command on one thread
    unsafe {
        match value {
            Some(value) => std::env::set_var(&var, value),
            None => std::env::remove_var(&var),
        }
    }
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_getenv(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    let var = cx.arg(OptionKind::Normal, false);
    let env = cx.arg(OptionKind::Normal, false);
    let (Some(var), Some(env)) = (var, env) else {
        return Err(Error::usage(format!("\\{name}: missing required argument")));
    };
    if let Ok(value) = std::env::var(&env) {
        cx.session.vars.set(&var, Some(&value))?;
    }
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_shell(cx: &mut Context<'_>) -> Result<CmdStatus> {
    let command = cx.arg(OptionKind::WholeLine, false);
    shell::run(&mut cx.session.vars, command.as_deref())?;
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_copy(cx: &mut Context<'_>) -> Result<CmdStatus> {
    let args = cx
        .arg(OptionKind::WholeLine, false)
        .ok_or_else(|| Error::usage("\\copy: arguments required"))?;
    let ok = cx.session.do_copy(&args)?;
    Ok(status(ok))
}
