//! Commands that send the query buffer: `\g` and its variants, `\watch`, and the extended
//! protocol and pipeline commands.
use super::{format::apply_assignments, CmdStatus, Context};
use crate::{scan::OptionKind, send::SendMode, watch, Error, Result};

fn forbid_in_pipeline(cx: &Context<'_>, name: &str) -> Result<()> {
    match cx.session.pipeline.on {
        true => Err(Error::usage(format!("\\{name} not allowed in pipeline mode"))),
        false => Ok(()),
    }
}

/// Clear anything an earlier `\bind` or `\parse` left latched.
fn clean_extended_state(cx: &mut Context<'_>) {
    cx.session.send_mode = SendMode::Query;
}

pub(super) fn exec_go(cx: &mut Context<'_>, name: &str, expanded: bool) -> Result<CmdStatus> {
    forbid_in_pipeline(cx, name)?;

    let mut fname = cx.arg(OptionKind::FilePipe, false);
    let mut overrides = vec![];
    if let Some(first) = fname.take_if(|f| f.starts_with('(')) {
        let mut word = first[1..].to_owned();
        loop {
            let last = word.ends_with(')');
            if last {
                word.pop();
            }
            if !word.is_empty() {
                overrides.push(word);
            }
            if last {
                break;
            }
            match cx.arg(OptionKind::Normal, false) {
                Some(next) => word = next,
                None => return Err(Error::usage(format!("\\{name}: missing right parenthesis"))),
            }
        }
        fname = cx.arg(OptionKind::FilePipe, false);
    }

    if !overrides.is_empty() || expanded {
        let mut opt = cx.session.popt.clone();
        apply_assignments(&mut opt, overrides.iter().map(String::as_str))?;
        if expanded {
            opt.expanded = crate::print::Expanded::On;
        }
        let saved = std::mem::replace(&mut cx.session.popt, opt);
        cx.session.send_opts.saved_popt.get_or_insert(saved);
    }

    cx.session.send_opts.fname = fname;
    cx.copy_previous_query();
    Ok(CmdStatus::Send)
}

pub(super) fn exec_gdesc(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    forbid_in_pipeline(cx, name)?;
    cx.session.send_opts.gdesc = true;
    cx.copy_previous_query();
    Ok(CmdStatus::Send)
}

pub(super) fn exec_gexec(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    forbid_in_pipeline(cx, name)?;
    cx.session.send_opts.gexec = true;
    cx.copy_previous_query();
    Ok(CmdStatus::Send)
}

/// Up to four column arguments, checked once the result arrives.
pub(super) fn exec_crosstabview(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    forbid_in_pipeline(cx, name)?;
    let args = std::iter::from_fn(|| cx.arg(OptionKind::Normal, true)).take(4).collect();
    cx.session.send_opts.crosstab = Some(args);
    cx.copy_previous_query();
    Ok(CmdStatus::Send)
}

pub(super) fn exec_gset(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    forbid_in_pipeline(cx, name)?;
    let prefix = cx.arg(OptionKind::Normal, false).unwrap_or_default();
    cx.session.send_opts.gset_prefix = Some(prefix);
    cx.copy_previous_query();
    Ok(CmdStatus::Send)
}

pub(super) fn exec_watch(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    forbid_in_pipeline(cx, name)?;
    let args = cx.args(OptionKind::Normal);
    let params = watch::WatchParams::parse(&args, &cx.session.vars)?;

    cx.copy_previous_query();
    let query = cx.query.as_deref().map(|q| q.as_str().to_owned()).unwrap_or_default();
    let ok = watch::do_watch(cx.session, &query, &params);

    // the buffer is consumed as if by \r
    if let Some(query) = cx.query.as_deref_mut() {
        query.reset();
    }
    cx.scan.reset();
    Ok(if ok { CmdStatus::SkipLine } else { CmdStatus::Error })
}

pub(super) fn exec_parse(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    clean_extended_state(cx);
    let stmt = cx
        .arg(OptionKind::Normal, false)
        .ok_or_else(|| Error::usage(format!("\\{name}: missing required argument")))?;
    cx.session.send_mode = SendMode::ExtendedParse(stmt);
    Ok(CmdStatus::Send)
}

fn bind_params(cx: &mut Context<'_>) -> Vec<Option<String>> {
    cx.args(OptionKind::Normal).into_iter().map(Some).collect()
}

pub(super) fn exec_bind(cx: &mut Context<'_>) -> Result<CmdStatus> {
    clean_extended_state(cx);
    let params = bind_params(cx);
    cx.session.send_mode = SendMode::ExtendedQueryParams(params);
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_bind_named(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    clean_extended_state(cx);
    let stmt = cx
        .arg(OptionKind::Normal, false)
        .ok_or_else(|| Error::usage(format!("\\{name}: missing required argument")))?;
    let params = bind_params(cx);
    cx.session.send_mode = SendMode::ExtendedQueryPrepared(stmt, params);
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_close_prepared(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    clean_extended_state(cx);
    let stmt = cx
        .arg(OptionKind::Normal, false)
        .ok_or_else(|| Error::usage(format!("\\{name}: missing required argument")))?;
    cx.session.send_mode = SendMode::ExtendedClose(stmt);
    Ok(CmdStatus::Send)
}

pub(super) fn exec_sendpipeline(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    if !cx.session.pipeline.on {
        clean_extended_state(cx);
        return Err(Error::usage(format!("\\{name} not allowed outside of pipeline mode")));
    }
    match cx.session.send_mode {
        SendMode::ExtendedQueryParams(_) | SendMode::ExtendedQueryPrepared(..) => {
            cx.copy_previous_query();
            Ok(CmdStatus::Send)
        }
        _ => {
            clean_extended_state(cx);
            Err(Error::usage(format!("\\{name} must be used after \\bind or \\bind_named")))
        }
    }
}

/// `\startpipeline`, `\endpipeline`, `\syncpipeline`, `\flush` and `\flushrequest`.
pub(super) fn exec_pipeline(cx: &mut Context<'_>, mode: SendMode) -> Result<CmdStatus> {
    cx.session.send_mode = mode;
    Ok(CmdStatus::Send)
}

pub(super) fn exec_getresults(cx: &mut Context<'_>, name: &str) -> Result<CmdStatus> {
    let count = match cx.arg(OptionKind::Normal, false) {
        Some(arg) => match arg.parse::<u32>() {
            Ok(n) => Some(n),
            Err(_) => {
                return Err(Error::usage(format!("\\{name}: invalid number of requested results")));
            }
        },
        None => None,
    };
    cx.session.send_mode = SendMode::GetResults(count.filter(|&n| n > 0));
    Ok(CmdStatus::Send)
}
