//! Send engine.
//!
//! Builds the protocol messages for the latched [`SendMode`], drains the results in order and
//! hands each one to the printer. Pipeline mode keeps a queue of what was sent so results can
//! be matched to commands, and so commands skipped after an error can be reported as aborted.
use std::{
    collections::VecDeque,
    io::{self, BufRead, Write},
    time::{Duration, Instant},
};

use postro_wire::{
    PgTransport, PgTransportExt, TransactionStatus,
    postgres::{BackendMessage, frontend},
};

use crate::{
    crosstab,
    output::Output,
    print::{pager::{self, Pager}, print_table, Format, PrintOptions},
    result::{Column, PgResult, ResultStatus},
    scan::quote_literal,
    session::Session,
    variables::{Echo, OnErrorRollback},
    Error, ErrorKind, Result,
};

const SAVEPOINT: &str = "pg_psql_temporary_savepoint";

/// How the next query is sent, latched by `\bind`, `\parse`, the pipeline commands and so on,
/// then reset to [`SendMode::Query`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SendMode {
    /// Simple query protocol.
    #[default]
    Query,
    /// `\close_prepared name`.
    ExtendedClose(String),
    /// `\parse name`.
    ExtendedParse(String),
    /// `\bind`, unnamed statement with parameters.
    ExtendedQueryParams(Vec<Option<String>>),
    /// `\bind_named name`.
    ExtendedQueryPrepared(String, Vec<Option<String>>),
    StartPipeline,
    EndPipeline,
    PipelineSync,
    Flush,
    FlushRequest,
    /// `\getresults [n]`.
    GetResults(Option<u32>),
}

impl SendMode {
    pub fn is_extended(&self) -> bool {
        matches!(
            self,
            Self::ExtendedClose(_)
                | Self::ExtendedParse(_)
                | Self::ExtendedQueryParams(_)
                | Self::ExtendedQueryPrepared(..)
        )
    }
}

/// What a queued pipeline entry waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Queued {
    Query,
    Parse,
    Close,
    Sync,
}

/// Pipeline bookkeeping.
#[derive(Debug, Default)]
pub struct Pipeline {
    pub on: bool,
    /// Commands sent since the last sync or flush request.
    pub piped_commands: u32,
    /// Syncs sent and not yet read back.
    pub piped_syncs: u32,
    /// Results the server has been asked to deliver.
    pub available_results: u32,
    pub requested_results: u32,
    queue: VecDeque<Queued>,
    /// A command failed, everything up to the next sync is skipped by the server.
    aborted: bool,
}

impl Pipeline {
    /// `%P` of the prompt.
    pub fn status(&self) -> &'static str {
        match (self.on, self.aborted) {
            (false, _) => "off",
            (true, true) => "abort",
            (true, false) => "on",
        }
    }

    fn queue_command(&mut self, queued: Queued) {
        self.queue.push_back(queued);
        self.piped_commands += 1;
    }

    fn queue_sync(&mut self) {
        self.queue.push_back(Queued::Sync);
        self.piped_syncs += 1;
        self.flush_request();
    }

    fn flush_request(&mut self) {
        self.available_results += self.piped_commands;
        self.piped_commands = 0;
    }

    /// Nothing left to read.
    fn is_drained(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Printing overrides of `\watch`.
#[derive(Debug)]
pub struct WatchPrint {
    pub opt: PrintOptions,
    /// Stop when a result has fewer rows, 0 never stops.
    pub min_rows: usize,
}

/// Summary of one round trip.
#[derive(Debug, Default)]
pub struct Outcome {
    pub ok: bool,
    /// The last command ended the implicit savepoint itself.
    pub savepoint_gone: bool,
    /// A `\watch` result had fewer rows than asked for.
    pub stop: bool,
}

enum Event {
    /// Rows of a result still being received, only when fetching in chunks.
    Chunk(PgResult),
    Result(PgResult),
    CopyIn,
    CopyOut,
    Ready,
}

#[derive(Default)]
struct Collect {
    current: Option<PgResult>,
    /// Rows per chunk, 0 buffers whole results.
    chunk: usize,
    /// A `ParseComplete` ends a result.
    parse_result: bool,
}

/// Progress of a result printed in chunks.
#[derive(Default)]
struct Chunks {
    active: bool,
    printed: u64,
    /// Opened with the first chunk, finished after the last.
    pager: Option<Pager>,
}

impl Chunks {
    fn finish(&mut self) -> Result<()> {
        self.active = false;
        self.printed = 0;
        if let Some(pager) = self.pager.take() {
            pager.finish()?;
        }
        Ok(())
    }
}

/// State shared while draining the results of one send.
struct Drain<'a> {
    query: &'a str,
    watch: Option<&'a WatchPrint>,
    target: Option<&'a mut Output>,
    outcome: Outcome,
    chunks: Chunks,
    /// Cells of the last result, for `\gexec`.
    gexec: Option<PgResult>,
}

impl Session {
    pub(crate) fn recv_message(&mut self) -> Result<BackendMessage> {
        let Session { conn, rt, .. } = self;
        let conn = conn.as_mut().ok_or(ErrorKind::NoConnection)?;
        let token = conn.cancel_token();
        Ok(rt.cancellable(token.as_ref(), conn.recv::<BackendMessage>())?)
    }

    pub(crate) fn flush_conn(&mut self) -> Result<()> {
        let Session { conn, rt, .. } = self;
        let conn = conn.as_mut().ok_or(ErrorKind::NoConnection)?;
        rt.block_on(conn.flush())
            .map_err(|err| Error::connection(format!("could not send data to server: {err}")))
    }

    fn next_event(&mut self, collect: &mut Collect) -> Result<Event> {
        loop {
            let msg = match self.recv_message() {
                Ok(msg) => msg,
                Err(err) => {
                    collect.current = None;
                    return match err.into_kind() {
                        ErrorKind::Server(notice) => Ok(Event::Result(PgResult::from_error(notice))),
                        kind => Err(kind.into()),
                    };
                }
            };

            match msg {
                BackendMessage::RowDescription(desc) => {
                    let columns = desc.fields.into_iter().map(Column::from).collect();
                    collect.current = Some(PgResult::with_columns(columns));
                }
                BackendMessage::DataRow(row) => {
                    let Some(current) = collect.current.as_mut() else {
                        return Err(Error::protocol("unexpected DataRow without RowDescription"));
                    };
                    let mut values = Vec::with_capacity(current.columns.len());
                    for value in row.values() {
                        values.push(value?.map(|v| String::from_utf8_lossy(&v).into_owned()));
                    }
                    current.rows.push(values);
                    if collect.chunk > 0 && current.rows.len() >= collect.chunk {
                        let rows = std::mem::take(&mut current.rows);
                        return Ok(Event::Chunk(PgResult { rows, ..current.clone() }));
                    }
                }
                BackendMessage::CommandComplete(complete) => {
                    let mut result = collect
                        .current
                        .take()
                        .unwrap_or_else(|| PgResult::new(ResultStatus::CommandOk));
                    result.tag = complete.tag;
                    return Ok(Event::Result(result));
                }
                BackendMessage::PortalSuspended(_) => {
                    let result = collect
                        .current
                        .take()
                        .unwrap_or_else(|| PgResult::new(ResultStatus::CommandOk));
                    return Ok(Event::Result(result));
                }
                BackendMessage::EmptyQueryResponse(_) => {
                    return Ok(Event::Result(PgResult::new(ResultStatus::EmptyQuery)));
                }
                BackendMessage::ParseComplete(_) if collect.parse_result => {
                    return Ok(Event::Result(PgResult::new(ResultStatus::CommandOk)));
                }
                BackendMessage::CloseComplete(_) => {
                    return Ok(Event::Result(PgResult::new(ResultStatus::CommandOk)));
                }
                BackendMessage::CopyInResponse(_) => return Ok(Event::CopyIn),
                BackendMessage::CopyOutResponse(_) => return Ok(Event::CopyOut),
                BackendMessage::CopyBothResponse(_) => {
                    return Err(Error::protocol("COPY BOTH is not supported"));
                }
                BackendMessage::ReadyForQuery(_) => return Ok(Event::Ready),
                other => {
                    tracing::trace!(msg = BackendMessage::message_name(other.msgtype()), "skipped");
                }
            }
        }
    }

    /// Run one simple query and return its last result, or the first failed one.
    pub(crate) fn run_simple(&mut self, sql: &str) -> Result<PgResult> {
        if self.pipeline.on {
            return Err(Error::usage(
                "synchronous command execution functions are not allowed in pipeline mode",
            ));
        }
        self.conn()?.send(frontend::Query { sql });
        self.flush_conn()?;

        let mut collect = Collect::default();
        let mut failed = None;
        let mut last = None;
        loop {
            match self.next_event(&mut collect)? {
                Event::Result(result) if result.error.is_some() => {
                    failed.get_or_insert(result);
                }
                Event::Result(result) => last = Some(result),
                Event::Chunk(_) => {}
                Event::CopyIn => {
                    self.conn()?.send(frontend::CopyFail { message: "COPY is not supported here" });
                    self.flush_conn()?;
                }
                Event::CopyOut => {
                    if let Some(notice) = self.copy_out_to(&mut io::sink())? {
                        failed.get_or_insert(PgResult::from_error(notice));
                    }
                }
                Event::Ready => break,
            }
        }
        Ok(failed.or(last).unwrap_or_else(|| PgResult::new(ResultStatus::EmptyQuery)))
    }

    /// Run `query` under the latched send mode and print its results.
    ///
    /// Errors are reported here, the return value tells whether everything succeeded.
    pub fn send_query(&mut self, query: &str) -> bool {
        let ok = match self.send_query_inner(query) {
            Ok(ok) => ok,
            Err(err) => {
                self.report(&err);
                if err.is_connection_lost() {
                    self.check_connection();
                }
                false
            }
        };
        self.emit_notices();
        if let Err(err) = self.emit_notifications() {
            self.report(&err);
        }
        self.reset_send_state();
        ok
    }

    /// Forget the modifiers of `\g` and friends.
    pub fn reset_send_state(&mut self) {
        if let Some(popt) = self.send_opts.saved_popt.take() {
            self.popt = popt;
        }
        self.send_opts = Default::default();
        self.send_mode = SendMode::Query;
        self.copy = None;
    }

    fn send_query_inner(&mut self, query: &str) -> Result<bool> {
        // `\g` with nothing to send
        if self.send_mode == SendMode::Query && query.trim().is_empty() {
            return Ok(true);
        }
        if self.conn.is_none() {
            return Err(ErrorKind::NoConnection.into());
        }
        let settings = self.vars.settings().clone();

        if settings.singlestep {
            if !confirm_single_step(query)? {
                return Ok(false);
            }
        } else if settings.echo == Echo::Queries {
            println!("{query}");
        }
        self.log_query(query);

        let mut savepoint = false;
        let guards_apply = !self.pipeline.on && self.send_mode.is_query_like();
        if guards_apply {
            let status = self.conn()?.transaction_status();
            if status == TransactionStatus::Idle && !settings.autocommit && !command_no_begin(query) {
                let result = self.run_simple("BEGIN")?;
                if let Some(notice) = &result.error {
                    self.report_server(notice, None);
                    return Ok(false);
                }
            }

            let rollback = match settings.on_error_rollback {
                OnErrorRollback::Off => false,
                OnErrorRollback::On => true,
                OnErrorRollback::Interactive => self.cur_interactive,
            };
            if rollback && self.conn()?.transaction_status() == TransactionStatus::InTransaction {
                let result = self.run_simple(&format!("SAVEPOINT {SAVEPOINT}"))?;
                if let Some(notice) = &result.error {
                    self.report_server(notice, None);
                    return Ok(false);
                }
                savepoint = true;
            }
        }

        let start = Instant::now();
        let outcome = if self.send_opts.gdesc {
            self.describe_query(query)?
        } else {
            let mut target = match self.send_opts.fname.clone() {
                Some(fname) => match Output::open(&fname) {
                    Ok(out) => Some(out),
                    Err(err) => {
                        self.error(format!("{fname}: {err}"));
                        return Ok(false);
                    }
                },
                None => None,
            };
            let outcome = self.exec_query(query, None, target.as_mut());
            if let Some(target) = target {
                if let Err(err) = target.close() {
                    self.error(format!("could not close output: {err}"));
                }
            }
            outcome?
        };
        let elapsed = start.elapsed();

        if !outcome.ok && settings.echo == Echo::Errors {
            self.info(format!("STATEMENT:  {query}"));
        }

        let mut ok = outcome.ok;
        if savepoint {
            let command = match self.conn()?.transaction_status() {
                TransactionStatus::Failed => Some(format!("ROLLBACK TO {SAVEPOINT}")),
                TransactionStatus::InTransaction if !outcome.savepoint_gone => {
                    Some(format!("RELEASE {SAVEPOINT}"))
                }
                _ => None,
            };
            if let Some(command) = command {
                let result = self.run_simple(&command)?;
                if let Some(notice) = &result.error {
                    self.report_server(notice, None);
                    ok = false;
                }
            }
        }

        if self.timing {
            println!("{}", format_timing(elapsed));
        }
        Ok(ok)
    }

    /// Send `query` and process everything it returns, used by [`Session::send_query`] and
    /// `\watch`.
    pub(crate) fn exec_query(
        &mut self,
        query: &str,
        watch: Option<&WatchPrint>,
        target: Option<&mut Output>,
    ) -> Result<Outcome> {
        let mode = std::mem::take(&mut self.send_mode);
        let in_pipeline = self.pipeline.on;
        let mut drain = Drain {
            query,
            watch,
            target,
            outcome: Outcome { ok: true, ..Default::default() },
            chunks: Chunks::default(),
            gexec: None,
        };

        let queued = match &mode {
            SendMode::Query if in_pipeline => {
                self.conn()?.send(frontend::Parse { prepare_name: "", sql: query, oids: &[] });
                self.send_extended("", &[])?;
                Queued::Query
            }
            SendMode::Query => {
                self.conn()?.send(frontend::Query { sql: query });
                Queued::Query
            }
            SendMode::ExtendedParse(name) => {
                self.conn()?.send(frontend::Parse { prepare_name: name, sql: query, oids: &[] });
                Queued::Parse
            }
            SendMode::ExtendedQueryParams(params) => {
                self.conn()?.send(frontend::Parse { prepare_name: "", sql: query, oids: &[] });
                self.send_extended("", params)?;
                Queued::Query
            }
            SendMode::ExtendedQueryPrepared(name, params) => {
                self.send_extended(name, params)?;
                Queued::Query
            }
            SendMode::ExtendedClose(name) => {
                self.conn()?.send(frontend::Close { variant: b'S', name });
                Queued::Close
            }
            SendMode::StartPipeline => {
                if in_pipeline {
                    return Err(Error::usage("already in pipeline mode"));
                }
                self.pipeline = Pipeline { on: true, ..Default::default() };
                return Ok(drain.outcome);
            }
            SendMode::PipelineSync => {
                self.require_pipeline("send pipeline sync")?;
                self.conn()?.send(frontend::Sync);
                self.flush_conn()?;
                self.pipeline.queue_sync();
                return Ok(drain.outcome);
            }
            SendMode::Flush => {
                self.require_pipeline("flush")?;
                self.flush_conn()?;
                return Ok(drain.outcome);
            }
            SendMode::FlushRequest => {
                self.require_pipeline("send flush request")?;
                self.conn()?.send(frontend::Flush);
                self.flush_conn()?;
                self.pipeline.flush_request();
                return Ok(drain.outcome);
            }
            SendMode::GetResults(limit) => {
                self.require_pipeline("get results")?;
                if self.pipeline.available_results == 0 && self.pipeline.piped_syncs == 0 {
                    self.info("No pending results to get");
                    drain.outcome.ok = false;
                    return Ok(drain.outcome);
                }
                self.pipeline.requested_results = limit.unwrap_or(0);
                self.drain_pipeline(&mut drain)?;
                return Ok(drain.outcome);
            }
            SendMode::EndPipeline => {
                self.require_pipeline("exit pipeline mode")?;
                self.conn()?.send(frontend::Sync);
                self.flush_conn()?;
                self.pipeline.queue_sync();
                self.pipeline.requested_results = 0;
                let drained = self.drain_pipeline(&mut drain);
                self.pipeline = Pipeline::default();
                drained?;
                return Ok(drain.outcome);
            }
        };

        if in_pipeline {
            self.pipeline.queue_command(queued);
            return Ok(drain.outcome);
        }
        if mode.is_extended() {
            self.conn()?.send(frontend::Sync);
        }
        self.flush_conn()?;
        self.drain_results(&mut drain, queued == Queued::Parse)?;

        if let Some(result) = drain.gexec.take() {
            drain.outcome.ok &= self.exec_gexec(&result);
        }
        Ok(drain.outcome)
    }

    /// Bind, describe and execute through the unnamed portal.
    fn send_extended(&mut self, stmt_name: &str, params: &[Option<String>]) -> Result<()> {
        let conn = self.conn()?;
        conn.send(frontend::Bind { portal_name: "", stmt_name, params });
        conn.send(frontend::Describe { kind: b'P', name: "" });
        conn.send(frontend::Execute { portal_name: "", max_row: 0 });
        Ok(())
    }

    fn require_pipeline(&self, what: &str) -> Result<()> {
        match self.pipeline.on {
            true => Ok(()),
            false => Err(Error::usage(format!("cannot {what} when not in pipeline mode"))),
        }
    }

    /// Read results up to `ReadyForQuery`, the last one is processed after all the others.
    fn drain_results(&mut self, drain: &mut Drain<'_>, parse_result: bool) -> Result<()> {
        let fetch_count = self.vars.settings().fetch_count;
        let chunked = fetch_count > 0
            && drain.watch.is_none()
            && self.send_opts.gset_prefix.is_none()
            && self.send_opts.crosstab.is_none()
            && !self.send_opts.gexec;
        let mut collect = Collect {
            chunk: if chunked { fetch_count as usize } else { 0 },
            parse_result,
            ..Default::default()
        };

        let mut pending: Option<PgResult> = None;
        loop {
            match self.next_event(&mut collect)? {
                Event::Chunk(chunk) => {
                    if let Some(prev) = pending.take() {
                        self.process_result(prev, false, drain)?;
                    }
                    self.print_chunk(&chunk, false, drain)?;
                }
                Event::Result(result) if drain.chunks.active && result.error.is_none() => {
                    self.print_chunk(&result, true, drain)?;
                    self.finish_result(&result, drain);
                }
                Event::Result(result) => {
                    drain.chunks.finish()?;
                    if let Some(prev) = pending.replace(result) {
                        self.process_result(prev, false, drain)?;
                    }
                }
                Event::CopyIn => {
                    if let Some(prev) = pending.take() {
                        self.process_result(prev, false, drain)?;
                    }
                    self.handle_copy_in()?;
                }
                Event::CopyOut => {
                    if let Some(prev) = pending.take() {
                        self.process_result(prev, false, drain)?;
                    }
                    let failed = match drain.target.as_deref_mut() {
                        Some(target) => self.copy_out_to(target)?,
                        None => self.handle_copy_out()?,
                    };
                    pending = failed.map(PgResult::from_error);
                }
                Event::Ready => break,
            }
            self.emit_notices();
        }
        drain.chunks.finish()?;

        if let Some(last) = pending {
            self.process_result(last, true, drain)?;
        }
        Ok(())
    }

    /// Read queued pipeline results, up to the requested count or everything available.
    fn drain_pipeline(&mut self, drain: &mut Drain<'_>) -> Result<()> {
        let limit = self.pipeline.requested_results;
        let mut got = 0;
        while let Some(&head) = self.pipeline.queue.front() {
            if head != Queued::Sync {
                if self.pipeline.available_results == 0 || (limit > 0 && got >= limit) {
                    break;
                }
                got += 1;
                self.pipeline.available_results -= 1;
            }
            self.pipeline.queue.pop_front();

            let result = match head {
                Queued::Sync => {
                    self.read_pipeline_sync()?;
                    self.pipeline.piped_syncs -= 1;
                    self.pipeline.aborted = false;
                    PgResult::new(ResultStatus::PipelineSync)
                }
                _ if self.pipeline.aborted => PgResult::new(ResultStatus::PipelineAborted),
                queued => {
                    let mut collect = Collect { parse_result: queued == Queued::Parse, ..Default::default() };
                    let result = self.read_pipeline_result(&mut collect)?;
                    if result.error.is_some() {
                        self.pipeline.aborted = true;
                    }
                    result
                }
            };
            self.process_result(result, true, drain)?;
            self.emit_notices();
        }
        self.pipeline.requested_results = 0;
        debug_assert!(self.pipeline.on || self.pipeline.is_drained());
        Ok(())
    }

    fn read_pipeline_result(&mut self, collect: &mut Collect) -> Result<PgResult> {
        loop {
            match self.next_event(collect)? {
                Event::Result(result) => return Ok(result),
                Event::Chunk(_) => {}
                Event::CopyIn | Event::CopyOut => {
                    return Err(Error::protocol("COPY is not allowed in pipeline mode"));
                }
                Event::Ready => return Err(Error::protocol("unexpected ReadyForQuery in pipeline")),
            }
        }
    }

    fn read_pipeline_sync(&mut self) -> Result<()> {
        let mut collect = Collect::default();
        loop {
            match self.next_event(&mut collect)? {
                Event::Ready => return Ok(()),
                Event::Result(result) if result.error.is_some() => {
                    let notice = result.error.as_ref().map(|n| n.message.clone()).unwrap_or_default();
                    tracing::debug!(%notice, "error before pipeline sync");
                }
                _ => {}
            }
        }
    }

    fn print_chunk(&mut self, chunk: &PgResult, last: bool, drain: &mut Drain<'_>) -> Result<()> {
        let first = !drain.chunks.active;
        let mut opt = self.print_options(drain);
        opt.start_table = first;
        opt.stop_table = last;
        opt.prior_records = drain.chunks.printed;
        drain.chunks.active = true;
        drain.chunks.printed += chunk.ntuples() as u64;

        let text = self.render_tuples(chunk, &opt, drain)?;
        if first && drain.target.is_none() && self.out.is_terminal() {
            drain.chunks.pager = pager::open_for_chunks(&self.popt);
        }
        match drain.chunks.pager.as_mut() {
            Some(pager) => {
                pager.write(text.as_bytes())?;
                self.write_log(&text);
            }
            None => self.write_unpaged(&text, drain.target.as_deref_mut())?,
        }
        if last {
            drain.chunks.finish()?;
        }
        Ok(())
    }

    fn print_options(&self, drain: &Drain<'_>) -> PrintOptions {
        match drain.watch {
            Some(watch) => watch.opt.clone(),
            None => self.popt.clone(),
        }
    }

    fn render_tuples(&self, result: &PgResult, opt: &PrintOptions, drain: &Drain<'_>) -> Result<String> {
        let table = result.to_table(opt, opt.title.clone());
        let to_terminal = match drain.target.as_deref() {
            Some(target) => target.is_terminal(),
            None => self.out.is_terminal(),
        };
        let mut buf = Vec::new();
        print_table(&table, opt, &mut buf, to_terminal)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn print_tuples(&mut self, result: &PgResult, opt: &PrintOptions, drain: &mut Drain<'_>) -> Result<()> {
        let text = self.render_tuples(result, opt, drain)?;
        self.write_paged(&text, drain.target.as_deref_mut())
    }

    /// Print `result` as a grid, `false` after reporting why it cannot be.
    fn print_crosstab(&mut self, result: &PgResult, drain: &mut Drain<'_>) -> Result<bool> {
        let args = self.send_opts.crosstab.clone().unwrap_or_default();
        let opt = self.print_options(drain);
        let table = match crosstab::pivot(result, &args, &opt) {
            Ok(table) => table,
            Err(message) => {
                self.error(format!("\\crosstabview: {message}"));
                return Ok(false);
            }
        };
        let to_terminal = match drain.target.as_deref() {
            Some(target) => target.is_terminal(),
            None => self.out.is_terminal(),
        };
        let mut buf = Vec::new();
        print_table(&table, &opt, &mut buf, to_terminal)?;
        self.write_paged(&String::from_utf8_lossy(&buf), drain.target.as_deref_mut())?;
        Ok(true)
    }

    fn print_status(&mut self, result: &PgResult, drain: &mut Drain<'_>) -> Result<()> {
        if self.quiet() || result.tag.is_empty() {
            return Ok(());
        }
        let text = match self.popt.format {
            Format::Html => format!("<p>{}</p>\n", html_escape(&result.tag)),
            _ => format!("{}\n", result.tag),
        };
        match drain.target.as_deref_mut() {
            Some(target) => {
                target.write_all(text.as_bytes())?;
                target.flush()?;
                self.write_log(&text);
                Ok(())
            }
            None => self.write_out(&text),
        }
    }

    /// Print or store one result.
    fn process_result(&mut self, result: PgResult, last: bool, drain: &mut Drain<'_>) -> Result<()> {
        let show = last || self.vars.settings().show_all_results;
        self.finish_result(&result, drain);
        match result.status {
            ResultStatus::FatalError => {
                drain.outcome.ok = false;
                if let Some(notice) = &result.error {
                    self.report_server(notice, Some(drain.query));
                }
            }
            ResultStatus::PipelineAborted => drain.outcome.ok = false,
            ResultStatus::TuplesOk if last && self.send_opts.gset_prefix.is_some() => {
                if !self.store_gset(&result) {
                    drain.outcome.ok = false;
                }
            }
            ResultStatus::TuplesOk if last && self.send_opts.gexec => drain.gexec = Some(result),
            ResultStatus::TuplesOk if last && self.send_opts.crosstab.is_some() => {
                if !self.print_crosstab(&result, drain)? {
                    drain.outcome.ok = false;
                }
            }
            ResultStatus::TuplesOk => {
                if show {
                    let opt = self.print_options(drain);
                    self.print_tuples(&result, &opt, drain)?;
                    if is_returning_tag(&result.tag) {
                        self.print_status(&result, drain)?;
                    }
                }
                if let Some(watch) = drain.watch {
                    if watch.min_rows > 0 && result.ntuples() < watch.min_rows {
                        drain.outcome.stop = true;
                    }
                }
            }
            ResultStatus::CommandOk if show => self.print_status(&result, drain)?,
            _ => {}
        }
        Ok(())
    }

    fn finish_result(&mut self, result: &PgResult, drain: &mut Drain<'_>) {
        let first = result.tag.split_whitespace().next().unwrap_or_default();
        drain.outcome.savepoint_gone =
            matches!(first, "COMMIT" | "SAVEPOINT" | "RELEASE" | "PREPARE" | "ROLLBACK");
        if !matches!(result.status, ResultStatus::PipelineSync) {
            self.set_result_variables(result);
        }
    }

    /// `ERROR`, `SQLSTATE`, `ROW_COUNT` and the last error variables.
    pub(crate) fn set_result_variables(&mut self, result: &PgResult) {
        let vars = &mut self.vars;
        match &result.error {
            Some(notice) => {
                let code = if notice.code.is_empty() { "XX000" } else { notice.code.as_str() };
                let _ = vars.set("ERROR", Some("true"));
                let _ = vars.set("SQLSTATE", Some(code));
                let _ = vars.set("ROW_COUNT", Some("0"));
                let _ = vars.set("LAST_ERROR_MESSAGE", Some(&notice.message));
                let _ = vars.set("LAST_ERROR_SQLSTATE", Some(code));
            }
            None if result.status == ResultStatus::PipelineAborted => {
                let _ = vars.set("ERROR", Some("true"));
            }
            None => {
                let _ = vars.set("ERROR", Some("false"));
                let _ = vars.set("SQLSTATE", Some("00000"));
                let _ = vars.set("ROW_COUNT", Some(&result.row_count().to_string()));
            }
        }
    }

    /// Store the single row of `result` into variables, for `\gset`.
    fn store_gset(&mut self, result: &PgResult) -> bool {
        let prefix = self.send_opts.gset_prefix.clone().unwrap_or_default();
        match result.ntuples() {
            0 => {
                self.error("no rows returned for \\gset");
                return false;
            }
            1 => {}
            _ => {
                self.error("more than one row returned for \\gset");
                return false;
            }
        }
        for (i, column) in result.columns.iter().enumerate() {
            let name = format!("{prefix}{}", column.name);
            if self.vars.has_hooks(&name) {
                self.warning(format!("attempt to \\gset into specially treated variable \"{name}\" ignored"));
                continue;
            }
            if let Err(err) = self.vars.set(&name, result.value(0, i)) {
                self.report(&err);
                return false;
            }
        }
        true
    }

    /// Run every non-null cell as a query, for `\gexec`.
    fn exec_gexec(&mut self, result: &PgResult) -> bool {
        let mut ok = true;
        self.send_opts = Default::default();
        let settings = self.vars.settings().clone();
        for row in 0..result.ntuples() {
            for col in 0..result.nfields() {
                let Some(query) = result.value(row, col) else { continue };
                if settings.echo == Echo::All && !settings.singlestep {
                    println!("{query}");
                }
                let query = query.to_owned();
                if !self.send_query(&query) {
                    ok = false;
                    if settings.on_error_stop {
                        return false;
                    }
                }
                if self.rt.interrupted() {
                    return false;
                }
            }
        }
        ok
    }

    /// Describe the result columns of `query` without running it, for `\gdesc`.
    fn describe_query(&mut self, query: &str) -> Result<Outcome> {
        if self.pipeline.on {
            return Err(Error::usage("\\gdesc not allowed in pipeline mode"));
        }
        let conn = self.conn()?;
        conn.send(frontend::Parse { prepare_name: "", sql: query, oids: &[] });
        conn.send(frontend::Describe { kind: b'S', name: "" });
        conn.send(frontend::Sync);
        self.flush_conn()?;

        let mut columns = None;
        let mut failed = None;
        loop {
            let msg = match self.recv_message() {
                Ok(msg) => msg,
                Err(err) => match err.into_kind() {
                    ErrorKind::Server(notice) => {
                        failed = Some(notice);
                        continue;
                    }
                    kind => return Err(kind.into()),
                },
            };
            match msg {
                BackendMessage::RowDescription(desc) => {
                    columns = Some(desc.fields.into_iter().map(Column::from).collect::<Vec<_>>());
                }
                BackendMessage::NoData(_) => columns = Some(vec![]),
                BackendMessage::ReadyForQuery(_) => break,
                _ => {}
            }
        }

        if let Some(notice) = failed {
            self.report_server(&notice, Some(query));
            self.set_result_variables(&PgResult::from_error(notice));
            return Ok(Outcome::default());
        }

        let columns = columns.unwrap_or_default();
        if columns.is_empty() {
            self.write_out("The command has no result, or the result has no columns.\n")?;
            return Ok(Outcome { ok: true, ..Default::default() });
        }

        let values = columns
            .iter()
            .map(|c| format!("({}, '{}'::pg_catalog.oid, {})", quote_literal(&c.name), c.type_oid, c.type_modifier))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT name AS \"Column\", pg_catalog.format_type(tp, tpm) AS \"Type\" \
             FROM (VALUES {values}) s(name, tp, tpm)"
        );
        let result = self.run_simple(&sql)?;
        let mut drain = Drain {
            query,
            watch: None,
            target: None,
            outcome: Outcome { ok: true, ..Default::default() },
            chunks: Chunks::default(),
            gexec: None,
        };
        self.send_opts.gdesc = false;
        self.process_result(result, true, &mut drain)?;
        Ok(drain.outcome)
    }
}

impl SendMode {
    /// Sends a statement that may open a transaction.
    fn is_query_like(&self) -> bool {
        matches!(self, Self::Query | Self::ExtendedQueryParams(_) | Self::ExtendedQueryPrepared(..))
    }
}

/// Ask before each query in single step mode, false cancels.
fn confirm_single_step(query: &str) -> Result<bool> {
    println!(
        "/**(Single step mode: verify command)******************************************/\n\
         {query}\n\
         /**(press return to proceed or enter x and return to cancel)********************/"
    );
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(!line.starts_with('x'))
}

/// `Time: ...` line of `\timing`.
pub fn format_timing(elapsed: Duration) -> String {
    let ms = elapsed.as_secs_f64() * 1000.0;
    if ms < 1000.0 {
        return format!("Time: {ms:.3} ms");
    }
    let mut seconds = ms / 1000.0;
    let mut minutes = (seconds / 60.0).floor();
    seconds -= 60.0 * minutes;
    if minutes < 60.0 {
        return format!("Time: {ms:.3} ms ({:02}:{seconds:06.3})", minutes as u32);
    }
    let mut hours = (minutes / 60.0).floor();
    minutes -= 60.0 * hours;
    if hours < 24.0 {
        return format!("Time: {ms:.3} ms ({:02}:{:02}:{seconds:06.3})", hours as u32, minutes as u32);
    }
    let days = (hours / 24.0).floor();
    hours -= 24.0 * days;
    format!(
        "Time: {ms:.3} ms ({days:.0} d {:02}:{:02}:{seconds:06.3})",
        hours as u32, minutes as u32
    )
}

fn is_returning_tag(tag: &str) -> bool {
    matches!(
        tag.split_whitespace().next(),
        Some("INSERT" | "UPDATE" | "DELETE" | "MERGE")
    )
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Skip whitespace and comments, `/* */` nest.
fn skip_white_space(query: &str) -> &str {
    let mut rest = query;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map_or("", |i| &after[i + 1..]);
        } else if rest.starts_with("/*") {
            let mut depth = 0;
            let bytes = rest.as_bytes();
            let mut i = 0;
            while i < bytes.len() {
                if bytes[i..].starts_with(b"/*") {
                    depth += 1;
                    i += 2;
                } else if bytes[i..].starts_with(b"*/") {
                    depth -= 1;
                    i += 2;
                    if depth == 0 {
                        break;
                    }
                } else {
                    i += 1;
                }
            }
            rest = rest.get(i..).unwrap_or("");
        } else {
            return rest;
        }
    }
}

/// Split off the leading keyword.
fn next_word(query: &str) -> (String, &str) {
    let query = skip_white_space(query);
    let end = query
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(query.len());
    (query[..end].to_ascii_lowercase(), &query[end..])
}

/// The command must not be wrapped in an implicit `BEGIN`, either because it manages
/// transactions itself or because it cannot run inside one.
pub fn command_no_begin(query: &str) -> bool {
    let (word, rest) = next_word(query);
    match word.as_str() {
        "begin" | "start" | "commit" | "end" | "rollback" | "abort" | "savepoint" | "release" => true,
        "prepare" => next_word(rest).0 == "transaction",
        "vacuum" | "cluster" => true,
        "alter" => next_word(rest).0 == "system",
        "discard" => next_word(rest).0 == "all",
        "create" | "drop" | "reindex" => {
            let (mut next, mut after) = next_word(rest);
            if word == "create" && next == "unique" {
                (next, after) = next_word(after);
            }
            match next.as_str() {
                "database" | "tablespace" if word != "reindex" => true,
                "database" | "system" if word == "reindex" => true,
                "index" => next_word(after).0 == "concurrently",
                _ => false,
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn implicit_begin_exemptions() {
        assert!(command_no_begin("BEGIN"));
        assert!(command_no_begin("  -- comment\n commit"));
        assert!(command_no_begin("/* a /* nested */ one */ vacuum full"));
        assert!(command_no_begin("prepare transaction 'x'"));
        assert!(!command_no_begin("prepare stmt as select 1"));
        assert!(command_no_begin("create database foo"));
        assert!(command_no_begin("DROP TABLESPACE t"));
        assert!(command_no_begin("create unique index concurrently i on t(a)"));
        assert!(!command_no_begin("create index i on t(a)"));
        assert!(command_no_begin("reindex system db"));
        assert!(!command_no_begin("reindex table t"));
        assert!(command_no_begin("alter system set work_mem = '1MB'"));
        assert!(!command_no_begin("alter table t add c int"));
        assert!(command_no_begin("discard all"));
        assert!(!command_no_begin("select 1"));
        assert!(!command_no_begin(""));
    }

    #[test]
    fn timing_format() {
        assert_eq!(format_timing(Duration::from_micros(1500)), "Time: 1.500 ms");
        assert_eq!(format_timing(Duration::from_millis(61_500)), "Time: 61500.000 ms (01:01.500)");
        assert_eq!(
            format_timing(Duration::from_secs(3 * 3600 + 2 * 60 + 1)),
            "Time: 10921000.000 ms (03:02:01.000)"
        );
        assert_eq!(
            format_timing(Duration::from_secs(26 * 3600)),
            "Time: 93600000.000 ms (1 d 02:00:00.000)"
        );
    }

    #[test]
    fn pipeline_counters() {
        let mut pipeline = Pipeline { on: true, ..Default::default() };
        assert_eq!(pipeline.status(), "on");
        pipeline.queue_command(Queued::Query);
        pipeline.queue_command(Queued::Query);
        assert_eq!(pipeline.piped_commands, 2);
        pipeline.queue_sync();
        assert_eq!((pipeline.piped_commands, pipeline.piped_syncs, pipeline.available_results), (0, 1, 2));
        assert_eq!(pipeline.queue.len(), 3);
        pipeline.aborted = true;
        assert_eq!(pipeline.status(), "abort");
        assert_eq!(Pipeline::default().status(), "off");
    }

    #[test]
    fn result_variables() {
        let mut session =
            Session::new(crate::variables::Variables::with_defaults(), crate::input::Input::script("", None), false)
                .unwrap();
        let mut result = PgResult::new(ResultStatus::CommandOk);
        result.tag = "UPDATE 4".into();
        session.set_result_variables(&result);
        assert_eq!(session.vars.get("ERROR"), Some("false"));
        assert_eq!(session.vars.get("ROW_COUNT"), Some("4"));

        let notice = postro_wire::ServerNotice {
            severity: "ERROR".into(),
            code: "42P01".into(),
            message: "relation \"nope\" does not exist".into(),
            ..Default::default()
        };
        session.set_result_variables(&PgResult::from_error(notice));
        assert_eq!(session.vars.get("ERROR"), Some("true"));
        assert_eq!(session.vars.get("SQLSTATE"), Some("42P01"));
        assert_eq!(session.vars.get("LAST_ERROR_SQLSTATE"), Some("42P01"));
        assert_eq!(session.vars.get("ROW_COUNT"), Some("0"));
    }
}
