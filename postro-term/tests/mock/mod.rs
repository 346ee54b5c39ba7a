//! Scripted Postgres backend on a local socket.
//!
//! Every frontend message after startup is recorded as a short string, e.g. `Q:select 1`,
//! `P::select $1`, `B::[7]`, `D:P`, `E`, `S`, so tests can assert on what was sent.
//! Queries are answered from canned replies keyed by their text, without a trailing `;`.
#![allow(dead_code)]
use std::{
    collections::HashMap,
    io::{self, Read, Write},
    net::{TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
};

use postro_term::{
    connect::{self, PasswordPrompt},
    input::Input,
    session::Session,
    variables::Variables,
};
use postro_wire::Config;

const TEXT_OID: u32 = 25;

#[derive(Debug, Clone)]
pub enum Reply {
    Rows { columns: Vec<String>, rows: Vec<Vec<Option<String>>> },
    Command(String),
    Error { code: String, message: String },
}

#[derive(Default)]
pub struct Backend {
    replies: HashMap<String, Reply>,
    password: Option<String>,
}

impl Backend {
    pub fn new() -> Backend {
        Backend::default()
    }

    /// Answer `sql` with text columns.
    pub fn rows(mut self, sql: &str, columns: &[&str], rows: &[&[Option<&str>]]) -> Backend {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|v| v.map(str::to_owned)).collect())
            .collect();
        self.replies.insert(sql.into(), Reply::Rows { columns, rows });
        self
    }

    pub fn command(mut self, sql: &str, tag: &str) -> Backend {
        self.replies.insert(sql.into(), Reply::Command(tag.into()));
        self
    }

    pub fn error(mut self, sql: &str, code: &str, message: &str) -> Backend {
        self.replies.insert(sql.into(), Reply::Error { code: code.into(), message: message.into() });
        self
    }

    /// Ask for this cleartext password at startup.
    pub fn password(mut self, password: &str) -> Backend {
        self.password = Some(password.into());
        self
    }

    /// Serve connections on a background thread.
    pub fn start(self) -> Server {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let log = Arc::new(Mutex::new(vec![]));
        let password = self.password.clone();
        let backend = Arc::new(self);

        let shared = log.clone();
        thread::spawn(move || {
            for (pid, stream) in listener.incoming().enumerate() {
                let Ok(stream) = stream else { return };
                let backend = backend.clone();
                let log = shared.clone();
                thread::spawn(move || {
                    let mut conn = Conn { stream: Some(stream), backend, log, pid: pid as u32 + 1, ..Default::default() };
                    // a client going away ends the connection
                    let _ = conn.serve();
                });
            }
        });

        Server { port, password, log }
    }
}

pub struct Server {
    pub port: u16,
    /// Password the client connects with, the backend's by default.
    pub password: Option<String>,
    log: Arc<Mutex<Vec<String>>>,
}

impl Server {
    pub fn with_password(mut self, password: Option<&str>) -> Server {
        self.password = password.map(str::to_owned);
        self
    }

    pub fn config(&self) -> Config {
        Config {
            host: Some("127.0.0.1".into()),
            port: Some(self.port.to_string()),
            user: Some("alice".into()),
            dbname: Some("app".into()),
            password: self.password.clone(),
            ..Default::default()
        }
    }

    /// Connected session reading `script`.
    pub fn session(&self, script: &str) -> Session {
        let input = Input::script(script, Some("script.sql"));
        let mut session = Session::new(Variables::with_defaults(), input, false).unwrap();
        session.password_prompt = PasswordPrompt::Never;
        connect::connect_initial(&mut session, self.config()).unwrap();
        session
    }

    /// Everything received so far.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Received messages, without startup and authentication.
    pub fn messages(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|m| !m.starts_with("startup:") && !m.starts_with("password:") && m != "X")
            .collect()
    }
}

#[derive(Default)]
struct Conn {
    stream: Option<TcpStream>,
    backend: Arc<Backend>,
    log: Arc<Mutex<Vec<String>>>,
    pid: u32,
    status: u8,
    statements: HashMap<String, String>,
    portal: Option<String>,
    /// An extended protocol error, everything up to Sync is ignored.
    skipping: bool,
}

impl Conn {
    fn stream(&mut self) -> &mut TcpStream {
        self.stream.as_mut().expect("connection stream")
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn serve(&mut self) -> io::Result<()> {
        if !self.startup()? {
            return Ok(());
        }
        loop {
            let (ty, body) = self.read_message()?;
            let mut body = Body(&body);
            if ty == b'X' {
                self.record("X".into());
                return Ok(());
            }
            if self.skipping && ty != b'S' {
                self.record(format!("{}", ty as char));
                continue;
            }
            match ty {
                b'Q' => {
                    let sql = normalize(body.cstr());
                    self.record(format!("Q:{sql}"));
                    self.simple_query(&sql)?;
                }
                b'P' => {
                    let name = body.cstr();
                    let sql = normalize(body.cstr());
                    self.record(format!("P:{name}:{sql}"));
                    self.statements.insert(name, sql);
                    self.send(b'1', &[])?;
                }
                b'B' => {
                    let _portal = body.cstr();
                    let stmt = body.cstr();
                    let formats = body.i16();
                    for _ in 0..formats {
                        body.i16();
                    }
                    let mut params = vec![];
                    for _ in 0..body.i16() {
                        params.push(match body.i32() {
                            -1 => "NULL".to_owned(),
                            len => String::from_utf8_lossy(body.take(len as usize)).into_owned(),
                        });
                    }
                    self.record(format!("B:{stmt}:[{}]", params.join(",")));
                    self.portal = self.statements.get(&stmt).cloned();
                    self.send(b'2', &[])?;
                }
                b'D' => {
                    let kind = body.u8();
                    let name = body.cstr();
                    self.record(format!("D:{}{name}", kind as char));
                    let sql = match kind {
                        b'S' => self.statements.get(&name).cloned(),
                        _ => self.portal.clone(),
                    };
                    match sql.and_then(|sql| self.reply(&sql)) {
                        Some(Reply::Rows { columns, .. }) => self.row_description(&columns)?,
                        _ => self.send(b'n', &[])?,
                    }
                }
                b'E' => {
                    self.record("E".into());
                    let sql = self.portal.clone().unwrap_or_default();
                    if !self.execute(&sql, false)? {
                        self.skipping = true;
                    }
                }
                b'C' => {
                    let kind = body.u8();
                    let name = body.cstr();
                    self.record(format!("C:{}{name}", kind as char));
                    self.statements.remove(&name);
                    self.send(b'3', &[])?;
                }
                b'H' => self.record("H".into()),
                b'S' => {
                    self.record("S".into());
                    self.skipping = false;
                    self.ready()?;
                }
                other => self.record(format!("?{}", other as char)),
            }
        }
    }

    /// Returns `false` when authentication failed.
    fn startup(&mut self) -> io::Result<bool> {
        let body = loop {
            let len = self.read_i32()?;
            let mut body = vec![0; len as usize - 4];
            self.stream().read_exact(&mut body)?;
            // SSLRequest, refused
            if body[..4] == 80877103u32.to_be_bytes() {
                self.stream().write_all(b"N")?;
                continue;
            }
            break body.split_off(4);
        };
        let mut params = HashMap::new();
        let mut read = Body(&body);
        loop {
            let key = read.cstr();
            if key.is_empty() {
                break;
            }
            params.insert(key, read.cstr());
        }

        let user = params.get("user").cloned().unwrap_or_default();
        let database = params.get("database").cloned().unwrap_or_default();
        self.record(format!("startup:{user}:{database}"));

        if let Some(password) = self.backend.password.clone() {
            self.send(b'R', &3i32.to_be_bytes())?;
            let (ty, body) = self.read_message()?;
            let given = Body(&body).cstr();
            if ty != b'p' || given != password {
                self.record("password:bad".into());
                self.error_response("FATAL", "28P01", &format!("password authentication failed for user \"{user}\""))?;
                return Ok(false);
            }
            self.record("password:ok".into());
        }

        self.send(b'R', &0i32.to_be_bytes())?;
        for (name, value) in [
            ("server_version", "16.2"),
            ("server_encoding", "UTF8"),
            ("client_encoding", "UTF8"),
            ("standard_conforming_strings", "on"),
            ("DateStyle", "ISO, MDY"),
        ] {
            self.send(b'S', format!("{name}\0{value}\0").as_bytes())?;
        }
        let mut key = self.pid.to_be_bytes().to_vec();
        key.extend_from_slice(&7u32.to_be_bytes());
        self.send(b'K', &key)?;
        self.status = b'I';
        self.ready()?;
        Ok(true)
    }

    fn reply(&self, sql: &str) -> Option<Reply> {
        if let Some(reply) = self.backend.replies.get(sql) {
            return Some(reply.clone());
        }
        let first = sql.split_whitespace().next().unwrap_or_default().to_ascii_uppercase();
        match first.as_str() {
            "BEGIN" | "COMMIT" | "ROLLBACK" | "SAVEPOINT" | "RELEASE" => Some(Reply::Command(first)),
            _ => None,
        }
    }

    fn simple_query(&mut self, sql: &str) -> io::Result<()> {
        if sql.is_empty() {
            self.send(b'I', &[])?;
        } else {
            self.execute(sql, true)?;
        }
        self.ready()
    }

    /// Send the rows and completion of `sql`, `false` after an error.
    fn execute(&mut self, sql: &str, describe: bool) -> io::Result<bool> {
        match self.reply(sql) {
            Some(Reply::Rows { columns, rows }) => {
                if describe {
                    self.row_description(&columns)?;
                }
                for row in &rows {
                    let mut body = (row.len() as i16).to_be_bytes().to_vec();
                    for value in row {
                        match value {
                            Some(value) => {
                                body.extend_from_slice(&(value.len() as i32).to_be_bytes());
                                body.extend_from_slice(value.as_bytes());
                            }
                            None => body.extend_from_slice(&(-1i32).to_be_bytes()),
                        }
                    }
                    self.send(b'D', &body)?;
                }
                self.complete(&format!("SELECT {}", rows.len()))?;
                Ok(true)
            }
            Some(Reply::Command(tag)) => {
                let upper = sql.to_ascii_uppercase();
                if upper.starts_with("BEGIN") {
                    self.status = b'T';
                } else if (upper.starts_with("COMMIT") || upper.starts_with("ROLLBACK")) && !upper.contains(" TO ") {
                    self.status = b'I';
                }
                self.complete(&tag)?;
                Ok(true)
            }
            Some(Reply::Error { code, message }) => {
                self.error_response("ERROR", &code, &message)?;
                Ok(false)
            }
            None => {
                self.error_response("ERROR", "42601", &format!("unexpected query: {sql}"))?;
                Ok(false)
            }
        }
    }

    fn row_description(&mut self, columns: &[String]) -> io::Result<()> {
        let mut body = (columns.len() as i16).to_be_bytes().to_vec();
        for column in columns {
            body.extend_from_slice(column.as_bytes());
            body.push(0);
            body.extend_from_slice(&0u32.to_be_bytes());
            body.extend_from_slice(&0i16.to_be_bytes());
            body.extend_from_slice(&TEXT_OID.to_be_bytes());
            body.extend_from_slice(&(-1i16).to_be_bytes());
            body.extend_from_slice(&(-1i32).to_be_bytes());
            body.extend_from_slice(&0i16.to_be_bytes());
        }
        self.send(b'T', &body)
    }

    fn complete(&mut self, tag: &str) -> io::Result<()> {
        self.send(b'C', format!("{tag}\0").as_bytes())
    }

    fn error_response(&mut self, severity: &str, code: &str, message: &str) -> io::Result<()> {
        if severity == "ERROR" && self.status == b'T' {
            self.status = b'E';
        }
        let body = format!("S{severity}\0V{severity}\0C{code}\0M{message}\0\0");
        self.send(b'E', body.as_bytes())
    }

    fn ready(&mut self) -> io::Result<()> {
        let status = self.status;
        self.send(b'Z', &[status])
    }

    fn send(&mut self, ty: u8, body: &[u8]) -> io::Result<()> {
        let mut frame = vec![ty];
        frame.extend_from_slice(&(body.len() as i32 + 4).to_be_bytes());
        frame.extend_from_slice(body);
        self.stream().write_all(&frame)
    }

    fn read_i32(&mut self) -> io::Result<i32> {
        let mut buf = [0; 4];
        self.stream().read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn read_message(&mut self) -> io::Result<(u8, Vec<u8>)> {
        let mut ty = [0; 1];
        self.stream().read_exact(&mut ty)?;
        let len = self.read_i32()?;
        let mut body = vec![0; len as usize - 4];
        self.stream().read_exact(&mut body)?;
        Ok((ty[0], body))
    }
}

/// Query text as the replies are keyed.
fn normalize(sql: String) -> String {
    sql.trim().trim_end_matches(';').trim_end().to_owned()
}

struct Body<'a>(&'a [u8]);

impl<'a> Body<'a> {
    fn take(&mut self, n: usize) -> &'a [u8] {
        let (head, rest) = self.0.split_at(n.min(self.0.len()));
        self.0 = rest;
        head
    }

    fn cstr(&mut self) -> String {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(self.0.len());
        let text = String::from_utf8_lossy(&self.0[..end]).into_owned();
        self.0 = &self.0[(end + 1).min(self.0.len())..];
        text
    }

    fn u8(&mut self) -> u8 {
        self.take(1).first().copied().unwrap_or_default()
    }

    fn i16(&mut self) -> i16 {
        let bytes = self.take(2);
        i16::from_be_bytes([bytes[0], bytes[1]])
    }

    fn i32(&mut self) -> i32 {
        let bytes = self.take(4);
        i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}
