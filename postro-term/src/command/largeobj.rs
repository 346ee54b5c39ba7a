//! `\lo_import`, `\lo_export` and `\lo_unlink`, expressed as SQL on the current connection.
use std::fs;

use super::{CmdStatus, Context};
use crate::{
    print::Format,
    result::PgResult,
    scan::{quote_literal, OptionKind},
    session::Session,
    Error, Result,
};

fn run(session: &mut Session, sql: &str) -> Result<PgResult> {
    tracing::debug!(sql, "large object");
    let result = session.run_simple(sql)?;
    match result.error {
        Some(notice) => Err(notice.into()),
        None => Ok(result),
    }
}

fn print_result(session: &mut Session, text: &str) -> Result<()> {
    if session.quiet() {
        return Ok(());
    }
    match session.popt.format {
        Format::Html => session.write_out(&format!("<p>{text}</p>\n")),
        _ => session.write_out(&format!("{text}\n")),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(DIGITS[(b >> 4) as usize] as char);
        out.push(DIGITS[(b & 0xf) as usize] as char);
    }
    out
}

fn hex_decode(text: &str) -> Result<Vec<u8>> {
    let digit = |c: u8| match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(Error::protocol("invalid hexadecimal data")),
    };
    let bytes = text.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(Error::protocol("invalid hexadecimal data: odd number of digits"));
    }
    bytes.chunks(2).map(|pair| Ok(digit(pair[0])? << 4 | digit(pair[1])?)).collect()
}

/// Run `body` inside a transaction unless one is already open.
fn in_transaction<T>(session: &mut Session, body: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
    let own = session.conn()?.transaction_status() == postro_wire::TransactionStatus::Idle;
    if own {
        run(session, "BEGIN")?;
    }
    match body(session) {
        Ok(value) => {
            if own {
                run(session, "COMMIT")?;
            }
            Ok(value)
        }
        Err(err) => {
            if own {
                if let Err(rollback) = run(session, "ROLLBACK") {
                    tracing::debug!(?rollback, "rollback after failed large object command");
                }
            }
            Err(err)
        }
    }
}

pub(super) fn exec_lo_import(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    let file = cx
        .arg(OptionKind::Normal, true)
        .ok_or_else(|| Error::usage(format!("\\{name}: missing required argument")))?;
    let comment = cx.arg(OptionKind::Normal, true);
    let data = fs::read(&file).map_err(|err| Error::from(err).context(file.clone()))?;

    let oid = in_transaction(cx.session, |session| {
        let sql = format!("SELECT pg_catalog.lo_from_bytea(0, '\\x{}'::pg_catalog.bytea)", hex_encode(&data));
        let oid = run(session, &sql)?.get(0, 0).to_owned();
        if let Some(comment) = &comment {
            run(session, &format!("COMMENT ON LARGE OBJECT {oid} IS {}", quote_literal(comment)))?;
        }
        Ok(oid)
    })?;

    cx.session.vars.set("LASTOID", Some(&oid))?;
    print_result(cx.session, &format!("lo_import {oid}"))?;
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_lo_export(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    let oid = cx.arg(OptionKind::Normal, true);
    let file = cx.arg(OptionKind::Normal, true);
    let (Some(oid), Some(file)) = (oid, file) else {
        return Err(Error::usage(format!("\\{name}: missing required argument")));
    };

    let sql = format!(
        "SELECT pg_catalog.encode(pg_catalog.lo_get({}::pg_catalog.oid), 'hex')",
        quote_literal(&oid),
    );
    let data = in_transaction(cx.session, |session| Ok(run(session, &sql)?.get(0, 0).to_owned()))?;
    fs::write(&file, hex_decode(&data)?).map_err(|err| Error::from(err).context(file.clone()))?;

    print_result(cx.session, "lo_export")?;
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_lo_unlink(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    let oid = cx
        .arg(OptionKind::Normal, true)
        .ok_or_else(|| Error::usage(format!("\\{name}: missing required argument")))?;
    let sql = format!("SELECT pg_catalog.lo_unlink({}::pg_catalog.oid)", quote_literal(&oid));
    run(cx.session, &sql)?;
    print_result(cx.session, &format!("lo_unlink {oid}"))?;
    Ok(CmdStatus::SkipLine)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex() {
        assert_eq!(hex_encode(&[0x00, 0xab, 0x7f]), "00ab7f");
        assert_eq!(hex_decode("00AB7f").unwrap(), [0x00, 0xab, 0x7f]);
        assert!(hex_decode("abc").is_err());
        assert!(hex_decode("zz").is_err());
    }
}
