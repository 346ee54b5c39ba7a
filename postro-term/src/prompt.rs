//! Prompt expansion.
//!
//! `PROMPT1` is shown when ready for a new statement, `PROMPT2` while one continues and
//! `PROMPT3` while COPY data is read. `%` escapes are replaced by connection and session state.
use postro_wire::TransactionStatus;

use crate::{
    conditional::ConditionalStack,
    print::width::str_width,
    scan::PromptStatus,
    session::Session,
    shell,
};

/// Expand the prompt for `status`.
pub fn get_prompt(session: &mut Session, status: PromptStatus, cond: &ConditionalStack) -> String {
    let settings = session.vars.settings();
    let template = match status {
        PromptStatus::Ready => settings.prompt1.clone(),
        PromptStatus::Copy => settings.prompt3.clone(),
        _ => settings.prompt2.clone(),
    };

    let prompt = expand(session, &template, status, cond);
    if status == PromptStatus::Ready {
        session.prompt1_width = prompt.lines().last().map_or(0, str_width);
    }
    prompt
}

fn expand(session: &mut Session, template: &str, status: PromptStatus, cond: &ConditionalStack) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            break;
        };
        match esc {
            '%' => out.push('%'),
            'M' | 'm' => out.push_str(&host(session, esc == 'M')),
            '>' => {
                if let Some(conn) = session.conn.as_ref() {
                    out.push_str(&conn.target().port().to_string());
                }
            }
            'n' => {
                if let Some(conn) = session.conn.as_ref() {
                    out.push_str(conn.parameter("session_authorization").unwrap_or(conn.user()));
                }
            }
            '/' => {
                if let Some(conn) = session.conn.as_ref() {
                    out.push_str(conn.dbname());
                }
            }
            '~' => {
                if let Some(conn) = session.conn.as_ref() {
                    let default = std::env::var("PGDATABASE").unwrap_or_else(|_| conn.user().to_owned());
                    match conn.dbname() == default {
                        true => out.push('~'),
                        false => out.push_str(conn.dbname()),
                    }
                }
            }
            '#' => {
                let superuser = session
                    .conn
                    .as_ref()
                    .and_then(|conn| conn.parameter("is_superuser"))
                    .is_some_and(|v| v == "on");
                out.push(if superuser { '#' } else { '>' });
            }
            'p' => {
                if let Some(pid) = session.conn.as_ref().and_then(|conn| conn.backend_pid()) {
                    out.push_str(&pid.to_string());
                }
            }
            'P' => out.push_str(session.pipeline.status()),
            's' => {
                if let Some(service) = session.vars.get("SERVICE") {
                    out.push_str(service);
                }
            }
            'R' => match status {
                PromptStatus::Ready => out.push(if !cond.is_active() {
                    '@'
                } else if session.conn.is_none() {
                    '!'
                } else if session.vars.settings().singleline {
                    '^'
                } else {
                    '='
                }),
                PromptStatus::Copy => {}
                status => out.push(status.indicator()),
            },
            'x' => match session.conn.as_ref().map(|conn| conn.transaction_status()) {
                None | Some(TransactionStatus::Unknown) => out.push('?'),
                Some(TransactionStatus::Idle | TransactionStatus::Active) => {}
                Some(TransactionStatus::InTransaction) => out.push('*'),
                Some(TransactionStatus::Failed) => out.push('!'),
            },
            'l' => out.push_str(&session.stmt_lineno.to_string()),
            'w' => {
                if status != PromptStatus::Ready {
                    out.extend(std::iter::repeat_n(' ', session.prompt1_width));
                }
            }
            '0'..='7' => {
                let mut code = esc.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                if let Some(c) = char::from_u32(code) {
                    out.push(c);
                }
            }
            ':' => {
                let name: String = chars.by_ref().take_while(|&c| c != ':').collect();
                if let Some(value) = session.vars.get(&name) {
                    out.push_str(value);
                }
            }
            '`' => {
                let command: String = chars.by_ref().take_while(|&c| c != '`').collect();
                match shell::backtick(&mut session.vars, &command) {
                    Ok(output) => out.push_str(&output),
                    Err(err) => session.error(err),
                }
            }
            // terminal control sequence markers
            '[' | ']' => {}
            other => out.push(other),
        }
    }
    out
}

/// `%M` is the full host name, `%m` stops at the first dot.
fn host(session: &Session, full: bool) -> String {
    let Some(conn) = session.conn.as_ref() else {
        return String::new();
    };
    let target = conn.target();
    if target.is_unix() {
        return match (full, conn.config().get("host")) {
            (true, Some(dir)) if dir.starts_with('/') => format!("[local:{dir}]"),
            _ => "[local]".to_owned(),
        };
    }
    let host = target.host();
    match full {
        true => host.to_owned(),
        false if host.parse::<std::net::IpAddr>().is_ok() => host.to_owned(),
        false => host.split('.').next().unwrap_or(host).to_owned(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{conditional::IfState, input::Input, variables::Variables};

    fn session() -> Session {
        Session::new(Variables::with_defaults(), Input::script("", None), false).unwrap()
    }

    #[test]
    fn disconnected_prompts() {
        let mut session = session();
        let mut cond = ConditionalStack::new();
        assert_eq!(get_prompt(&mut session, PromptStatus::Ready, &cond), "!?> ");
        assert_eq!(session.prompt1_width, 4);

        cond.push(IfState::False);
        assert_eq!(get_prompt(&mut session, PromptStatus::Ready, &cond), "@?> ");
        assert_eq!(get_prompt(&mut session, PromptStatus::SingleQuote, &cond), "'?> ");
        assert_eq!(get_prompt(&mut session, PromptStatus::Copy, &cond), ">> ");
    }

    #[test]
    fn escapes() {
        let mut session = session();
        let cond = ConditionalStack::new();
        session.vars.set("who", Some("me")).unwrap();
        session.stmt_lineno = 3;
        session.prompt1_width = 2;
        session.vars.set("PROMPT2", Some("%w|%:who:|%l|%%|%101|%[x%]|%`echo hi`|%P")).unwrap();
        assert_eq!(get_prompt(&mut session, PromptStatus::Continue, &cond), "  |me|3|%|A|x|hi|off");
    }
}
