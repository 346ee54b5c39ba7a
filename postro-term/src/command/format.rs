//! `\a`, `\C`, `\f`, `\H`, `\pset`, `\t`, `\T` and `\x`.
use super::{CmdStatus, Context};
use crate::{
    print::{pset, Format},
    scan::OptionKind,
    Result,
};

/// Apply one option and report its new value unless quiet.
fn do_pset(cx: &mut Context<'_>, name: &str, value: Option<&str>) -> Result<CmdStatus> {
    pset::apply(&mut cx.session.popt, name, value)?;
    if !cx.session.quiet() {
        println!("{}", pset::describe(&cx.session.popt, name)?);
    }
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_align(cx: &mut Context<'_>) -> Result<CmdStatus> {
    let format = match cx.session.popt.format {
        Format::Aligned => "unaligned",
        _ => "aligned",
    };
    do_pset(cx, "format", Some(format))
}

pub(super) fn exec_html(cx: &mut Context<'_>) -> Result<CmdStatus> {
    let format = match cx.session.popt.format {
        Format::Html => "aligned",
        _ => "html",
    };
    do_pset(cx, "format", Some(format))
}

/// Commands that set a single option from one optional argument.
pub(super) fn exec_pset_one(cx: &mut Context<'_>, name: &str, kind: OptionKind) -> Result<CmdStatus> {
    let value = cx.arg(kind, false);
    do_pset(cx, name, value.as_deref())
}

pub(super) fn exec_pset(cx: &mut Context<'_>) -> Result<CmdStatus> {
    let Some(name) = cx.arg(OptionKind::Normal, false) else {
        print!("{}", pset::listing(&cx.session.popt));
        return Ok(CmdStatus::SkipLine);
    };
    let value = cx.arg(OptionKind::Normal, false);
    do_pset(cx, &name, value.as_deref())
}

/// Apply `name=value` words of `\g (...)`, a bare name toggles.
pub(super) fn apply_assignments<'a>(
    opt: &mut crate::print::PrintOptions,
    words: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    for word in words {
        match word.split_once('=') {
            Some((name, value)) => pset::apply(opt, name, Some(value))?,
            None => pset::apply(opt, word, None)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::print::{Expanded, PrintOptions};

    #[test]
    fn assignments() {
        let mut opt = PrintOptions::default();
        apply_assignments(&mut opt, ["format=csv", "tuples_only", "null=(null)"]).unwrap();
        assert_eq!(opt.format, Format::Csv);
        assert!(opt.tuples_only);
        assert_eq!(opt.null_print, "(null)");

        apply_assignments(&mut opt, ["expanded"]).unwrap();
        assert_eq!(opt.expanded, Expanded::On);
        assert!(apply_assignments(&mut opt, ["nonsense=1"]).is_err());
    }
}
