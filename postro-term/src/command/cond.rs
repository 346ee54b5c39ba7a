//! `\if`, `\elif`, `\else` and `\endif`.
use super::{CmdStatus, Context};
use crate::{
    conditional::IfState,
    scan::OptionKind,
    session::ScanEnv,
    variables::parse_bool,
    Error, Result,
};

/// Evaluate an `\if` expression.
///
/// A boolean literal, or a single comparison `a = b`, `a <> b` or `a != b` between two
/// words, compared as numbers when both sides are numeric.
pub fn eval_boolean(expr: &str) -> Result<bool> {
    if let Some(value) = parse_bool(expr) {
        return Ok(value);
    }
    for (op, negate) in [("<>", true), ("!=", true), ("==", false), ("=", false)] {
        let Some((lhs, rhs)) = expr.split_once(op) else {
            continue;
        };
        let (lhs, rhs) = (lhs.trim(), rhs.trim());
        if lhs.is_empty() || rhs.is_empty() || rhs.contains(['=', '<', '>', '!']) {
            break;
        }
        let equal = match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
            (Ok(l), Ok(r)) => l == r,
            _ => lhs == rhs,
        };
        return Ok(equal != negate);
    }
    Err(Error::eval(format!(
        "unrecognized value \"{expr}\" for \"\\if expression\": Boolean expected"
    )))
}

/// Collect the expression words, evaluated only when `eval` is set.
fn read_expression(cx: &mut Context<'_>, eval: bool) -> String {
    let mut env = ScanEnv { session: &mut *cx.session, active: eval };
    let mut words = vec![];
    while let Some(word) = cx.scan.slash_option(OptionKind::Normal, false, &mut env) {
        words.push(word);
    }
    words.join(" ")
}

/// Evaluate the next expression, an invalid one is reported and counts as false.
fn is_true_expression(cx: &mut Context<'_>, what: &str) -> bool {
    let expr = read_expression(cx, true);
    match eval_boolean(&expr) {
        Ok(value) => value,
        Err(_) => {
            cx.session.error(format!(
                "unrecognized value \"{expr}\" for \"\\{what} expression\": Boolean expected"
            ));
            false
        }
    }
}

/// Remember where the branch that starts now begins.
fn save_state(cx: &mut Context<'_>) {
    let len = cx.query.as_deref().map_or(0, |q| q.snapshot_len());
    cx.cond.save(len, cx.scan.paren_depth());
}

/// Drop the text the finished branch added.
fn discard_text(cx: &mut Context<'_>) {
    if let (Some(query), Some(len)) = (cx.query.as_deref_mut(), cx.cond.query_len()) {
        query.truncate_to(len);
    }
    if let Some(depth) = cx.cond.paren_depth() {
        cx.scan.set_paren_depth(depth);
    }
}

pub(super) fn exec_if(cx: &mut Context<'_>) -> Result<CmdStatus> {
    if cx.active() {
        let value = is_true_expression(cx, "if");
        cx.cond.push(if value { IfState::True } else { IfState::False });
    } else {
        read_expression(cx, false);
        cx.cond.push(IfState::Ignored);
    }
    save_state(cx);
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_elif(cx: &mut Context<'_>) -> Result<CmdStatus> {
    match cx.cond.peek() {
        IfState::True => {
            save_state(cx);
            cx.cond.poke(IfState::Ignored);
            read_expression(cx, false);
        }
        IfState::False => {
            discard_text(cx);
            cx.cond.poke(IfState::True);
            if !is_true_expression(cx, "elif") {
                cx.cond.poke(IfState::False);
            }
        }
        IfState::Ignored => {
            discard_text(cx);
            read_expression(cx, false);
        }
        IfState::ElseTrue | IfState::ElseFalse => {
            return Err(Error::conditional("\\elif: cannot occur after \\else"));
        }
        IfState::None => return Err(Error::conditional("\\elif: no matching \\if")),
    }
    save_state(cx);
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_else(cx: &mut Context<'_>) -> Result<CmdStatus> {
    match cx.cond.peek() {
        IfState::True => {
            save_state(cx);
            cx.cond.poke(IfState::ElseFalse);
        }
        IfState::False => {
            discard_text(cx);
            cx.cond.poke(IfState::ElseTrue);
        }
        IfState::Ignored => {
            discard_text(cx);
            cx.cond.poke(IfState::ElseFalse);
        }
        IfState::ElseTrue | IfState::ElseFalse => {
            return Err(Error::conditional("\\else: cannot occur after \\else"));
        }
        IfState::None => return Err(Error::conditional("\\else: no matching \\if")),
    }
    save_state(cx);
    Ok(CmdStatus::SkipLine)
}

pub(super) fn exec_endif(cx: &mut Context<'_>) -> Result<CmdStatus> {
    match cx.cond.peek() {
        IfState::True | IfState::ElseTrue => {}
        IfState::False | IfState::Ignored | IfState::ElseFalse => discard_text(cx),
        IfState::None => return Err(Error::conditional("\\endif: no matching \\if")),
    }
    cx.cond.pop();
    Ok(CmdStatus::SkipLine)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn booleans_and_comparisons() {
        assert!(eval_boolean("on").unwrap());
        assert!(!eval_boolean("0").unwrap());
        assert!(eval_boolean("2 = 2").unwrap());
        assert!(eval_boolean("2.0 = 2").unwrap());
        assert!(!eval_boolean("2 = 3").unwrap());
        assert!(eval_boolean("a <> b").unwrap());
        assert!(!eval_boolean("a != a").unwrap());
        assert!(eval_boolean("abc=abc").unwrap());

        let err = eval_boolean("maybe").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unrecognized value \"maybe\" for \"\\if expression\": Boolean expected"
        );
        assert!(eval_boolean("= 2").is_err());
        assert!(eval_boolean("").is_err());
    }
}
