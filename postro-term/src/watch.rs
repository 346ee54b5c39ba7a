//! `\watch`: run the previous query again and again.
use std::time::Duration;

use time::{macros::format_description, OffsetDateTime};

use crate::{
    output::Output,
    print::{pager::watch_pager_command, PagerUse},
    send::WatchPrint,
    session::Session,
    variables::Variables,
    Error, Result,
};

const DEFAULT_INTERVAL: f64 = 2.0;

/// Parameters of `\watch`.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchParams {
    /// Seconds between runs.
    pub interval: f64,
    /// Stop after this many runs.
    pub count: Option<u64>,
    /// Stop once a result has fewer rows.
    pub min_rows: Option<usize>,
}

fn parse_interval(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|secs| secs.is_finite() && *secs >= 0.0)
}

impl WatchParams {
    /// Parse `i=SECS c=N m=ROWS`, a bare number is the interval.
    pub fn parse(args: &[String], vars: &Variables) -> Result<WatchParams> {
        let interval = vars.get("WATCH_INTERVAL").and_then(parse_interval).unwrap_or(DEFAULT_INTERVAL);
        let mut params = WatchParams { interval, count: None, min_rows: None };
        let (mut have_interval, mut have_count, mut have_min) = (false, false, false);

        let once = |seen: &mut bool, what: &str| {
            if std::mem::replace(seen, true) {
                return Err(Error::usage(format!("\\watch: {what} value is specified more than once")));
            }
            Ok(())
        };

        for arg in args {
            match arg.split_once('=') {
                Some(("i" | "interval", value)) => {
                    once(&mut have_interval, "interval")?;
                    params.interval = parse_interval(value)
                        .ok_or_else(|| Error::usage(format!("\\watch: incorrect interval value \"{value}\"")))?;
                }
                Some(("c" | "count", value)) => {
                    once(&mut have_count, "iteration count")?;
                    let count = value.parse::<u64>().ok().filter(|n| *n > 0);
                    params.count = Some(count.ok_or_else(|| {
                        Error::usage(format!("\\watch: incorrect iteration count \"{value}\""))
                    })?);
                }
                Some(("m" | "min_rows", value)) => {
                    once(&mut have_min, "minimum row count")?;
                    let rows = value.parse::<usize>().ok().filter(|n| *n > 0);
                    params.min_rows = Some(rows.ok_or_else(|| {
                        Error::usage(format!("\\watch: incorrect minimum row count \"{value}\""))
                    })?);
                }
                Some(_) => return Err(Error::usage(format!("\\watch: unrecognized parameter \"{arg}\""))),
                None => {
                    once(&mut have_interval, "interval")?;
                    params.interval = parse_interval(arg)
                        .ok_or_else(|| Error::usage(format!("\\watch: incorrect interval value \"{arg}\"")))?;
                }
            }
        }
        Ok(params)
    }
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let format = format_description!(
        "[weekday repr:short] [month repr:short] [day padding:space] [hour]:[minute]:[second] [year]"
    );
    now.format(&format).unwrap_or_default()
}

/// Heading printed above every run.
fn title(user_title: Option<&str>, when: &str, interval: f64) -> String {
    match user_title {
        Some(user) => format!("{user}\t{when} (every {interval}s)\n"),
        None => format!("{when} (every {interval}s)\n"),
    }
}

/// Run `query` until stopped, returns whether the last run succeeded.
pub fn do_watch(session: &mut Session, query: &str, params: &WatchParams) -> bool {
    if query.trim().is_empty() {
        session.error("\\watch cannot be used with an empty query");
        return false;
    }

    let mut pager = match watch_pager_command() {
        Some(cmd) => match Output::open(&format!("|{cmd}")) {
            Ok(out) => Some(out),
            Err(err) => {
                tracing::warn!(%err, cmd, "could not start watch pager");
                None
            }
        },
        None => None,
    };

    // results must not stop in the regular pager between runs
    let saved_pager = std::mem::replace(&mut session.popt.pager, PagerUse::Never);
    let user_title = session.popt.title.clone();
    let mut runs = 0u64;
    session.rt.take_interrupt();

    let ok = loop {
        let mut opt = session.popt.clone();
        opt.title = Some(title(user_title.as_deref(), &timestamp(), params.interval));
        let watch = WatchPrint { opt, min_rows: params.min_rows.unwrap_or(0) };

        let outcome = session.exec_query(query, Some(&watch), pager.as_mut());
        session.emit_notices();
        let (ok, stop) = match outcome {
            Ok(outcome) => (outcome.ok, !outcome.ok || outcome.stop),
            Err(err) => match err.kind() {
                // the watch pager quit
                crate::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::BrokenPipe => (true, true),
                _ => {
                    session.report(&err);
                    if err.is_connection_lost() {
                        session.check_connection();
                    }
                    (false, true)
                }
            },
        };
        runs += 1;

        if stop || params.count.is_some_and(|count| runs >= count) || session.rt.take_interrupt() {
            break ok;
        }
        if params.interval > 0.0 && !session.rt.sleep(Duration::from_secs_f64(params.interval)) {
            session.rt.take_interrupt();
            break ok;
        }
    };

    session.popt.pager = saved_pager;
    if let Some(pager) = pager {
        if let Err(err) = pager.close() {
            tracing::debug!(%err, "closing watch pager");
        }
    }
    ok
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Result<WatchParams> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        WatchParams::parse(&args, &Variables::new())
    }

    #[test]
    fn parameters() {
        assert_eq!(parse(&[]).unwrap(), WatchParams { interval: 2.0, count: None, min_rows: None });
        assert_eq!(parse(&["0.5"]).unwrap().interval, 0.5);
        assert_eq!(parse(&["0"]).unwrap().interval, 0.0);

        let params = parse(&["i=1", "c=3", "m=2"]).unwrap();
        assert_eq!(params, WatchParams { interval: 1.0, count: Some(3), min_rows: Some(2) });

        let params = parse(&["interval=5", "count=1"]).unwrap();
        assert_eq!((params.interval, params.count), (5.0, Some(1)));
    }

    #[test]
    fn invalid_parameters() {
        assert_eq!(parse(&["c=0"]).unwrap_err().to_string(), "\\watch: incorrect iteration count \"0\"");
        assert_eq!(parse(&["m=x"]).unwrap_err().to_string(), "\\watch: incorrect minimum row count \"x\"");
        assert_eq!(parse(&["-1"]).unwrap_err().to_string(), "\\watch: incorrect interval value \"-1\"");
        assert_eq!(parse(&["z=1"]).unwrap_err().to_string(), "\\watch: unrecognized parameter \"z=1\"");
        assert_eq!(
            parse(&["1", "i=2"]).unwrap_err().to_string(),
            "\\watch: interval value is specified more than once"
        );
    }

    #[test]
    fn interval_variable() {
        let mut vars = Variables::new();
        vars.set("WATCH_INTERVAL", Some("7")).unwrap();
        assert_eq!(WatchParams::parse(&[], &vars).unwrap().interval, 7.0);
    }

    #[test]
    fn titles() {
        assert_eq!(title(None, "now", 2.0), "now (every 2s)\n");
        assert_eq!(title(Some("t"), "now", 0.5), "t\tnow (every 0.5s)\n");
    }
}
