//! A single authenticated session with the server.
use bytes::Bytes;
use std::{
    borrow::Cow,
    collections::{HashMap, VecDeque},
    fmt, io,
    task::{Context, Poll, ready},
};

use crate::{
    CancelToken, Result,
    auth::{self, ScramSha256, UnsupportedAuth},
    common::verbose,
    config::Config,
    net::Target,
    postgres::{
        BackendMessage, BackendProtocol, FrontendProtocol, Notification, ProtocolError,
        ServerNotice,
        backend::{self, Authentication},
        frontend,
    },
    stream::PgStream,
    transport::{PgTransport, PgTransportExt},
    Error, ErrorKind,
};

/// Transaction state reported by the last `ReadyForQuery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionStatus {
    #[default]
    Idle,
    /// In a transaction block.
    InTransaction,
    /// In a failed transaction block, queries are rejected until the block ends.
    Failed,
    /// A command is in progress.
    Active,
    /// The connection is gone.
    Unknown,
}

impl TransactionStatus {
    fn from_byte(b: u8) -> TransactionStatus {
        match b {
            b'I' => Self::Idle,
            b'T' => Self::InTransaction,
            b'E' => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

/// An authenticated session.
///
/// Asynchronous messages are kept aside while receiving: notices are queued for
/// [`take_notices`][Connection::take_notices], notifications for
/// [`take_notifications`][Connection::take_notifications], and parameter status updates are
/// applied to [`parameter`][Connection::parameter]. An `ErrorResponse` is returned as
/// [`ErrorKind::Database`].
#[derive(Debug)]
pub struct Connection {
    stream: PgStream,
    config: Config,
    target: Target,
    user: String,
    dbname: String,
    password: Option<String>,
    password_used: bool,
    params: HashMap<String, String>,
    key: Option<backend::BackendKeyData>,
    status: TransactionStatus,
    notices: Vec<ServerNotice>,
    notifications: VecDeque<Notification>,
    closed: bool,
}

impl Connection {
    /// Connect using `config`, trying each host in order.
    pub async fn connect(config: &Config) -> Result<Connection> {
        let config = &config.resolve_service()?;
        let sslmode = config.sslmode()?;
        if sslmode.is_required() {
            let mode = config.sslmode.as_deref().unwrap_or_default();
            return Err(ConnectError::new(format!(
                "sslmode value \"{mode}\" invalid when SSL support is not compiled in"
            ))
            .into());
        }

        let timeout = config.connect_timeout()?;
        let targets = config.targets()?;

        let mut last_err = None;
        for target in targets {
            let attempt = Self::connect_target(config, target.clone());
            let result = match timeout {
                Some(timeout) => match tokio::time::timeout(timeout, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(ConnectError::new("timeout expired").into()),
                },
                None => attempt.await,
            };

            match result {
                Ok(conn) => return Ok(conn),
                // no point trying other hosts without a password
                Err(err) if matches!(err.kind(), ErrorKind::PasswordRequired) => {
                    return Err(err.context(describe_target(&target)));
                }
                Err(err) => {
                    verbose!(?err, "connection attempt failed");
                    last_err = Some(err.context(describe_target(&target)));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ConnectError::new("no host to connect to").into()))
    }

    async fn connect_target(config: &Config, target: Target) -> Result<Connection> {
        let stream = PgStream::connect(&target).await?;

        let password = match &config.password {
            Some(password) => Some(password.clone()),
            None => config.pgpass_password(&target),
        };

        let mut me = Connection {
            stream,
            target,
            user: config.user_or_default(),
            dbname: config.dbname_or_default(),
            config: config.clone(),
            password,
            password_used: false,
            params: HashMap::new(),
            key: None,
            status: TransactionStatus::Unknown,
            notices: vec![],
            notifications: VecDeque::new(),
            closed: false,
        };

        me.startup().await?;

        Ok(me)
    }

    /// Perform a startup message.
    ///
    /// <https://www.postgresql.org/docs/current/protocol-flow.html#PROTOCOL-FLOW-START-UP>
    async fn startup(&mut self) -> Result<()> {
        let mut params: Vec<(&str, &str)> = vec![];
        if let Some(app) = self.config.application_name() {
            params.push(("application_name", app));
        }
        params.push(("client_encoding", self.config.client_encoding.as_deref().unwrap_or("UTF8")));
        if let Some(options) = self.config.options.as_deref() {
            params.push(("options", options));
        }

        self.stream.send_startup(frontend::Startup {
            user: &self.user,
            database: Some(&self.dbname),
            params: &params,
        });
        self.stream.flush().await?;

        // For all authentication methods except GSSAPI, SSPI and SASL, there is at most one request and one response.
        // For GSSAPI, SSPI and SASL, multiple exchanges of packets may be needed to complete the authentication.

        let mut scram = None;

        loop {
            use Authentication::*;
            let auth = match self.stream.recv::<BackendMessage>().await? {
                BackendMessage::Authentication(auth) => auth,
                BackendMessage::ErrorResponse(err) => return Err(err.notice.into()),
                BackendMessage::NoticeResponse(notice) => {
                    self.notices.push(notice.notice);
                    continue;
                }
                f => Err(ProtocolError::unexpected_phase(f.msgtype(), "authentication"))?,
            };

            match auth {
                Ok => break,
                CleartextPassword => {
                    let password = self.require_password()?;
                    self.stream.send(frontend::PasswordMessage { password: &password });
                }
                MD5Password { salt } => {
                    let password = self.require_password()?;
                    let hash = auth::md5_password(&self.user, &password, salt);
                    self.stream.send(frontend::PasswordMessage { password: &hash });
                }
                SASL { mechanisms } => {
                    let supported = Authentication::sasl_mechanisms(&mechanisms)
                        .any(|m| m == auth::SCRAM_SHA_256.as_bytes());
                    if !supported {
                        return Err(UnsupportedAuth { method: "SASL" }.into());
                    }
                    let password = self.require_password()?;
                    let client = ScramSha256::new(&password);
                    self.stream.send(frontend::SASLInitialResponse {
                        mechanism: auth::SCRAM_SHA_256,
                        data: &client.client_first(),
                    });
                    scram = Some(client);
                }
                SASLContinue { data } => {
                    let Some(client) = scram.as_mut() else {
                        return Err(ProtocolError::unexpected_phase(Authentication::MSGTYPE, "SASL").into());
                    };
                    let response = client.update(&data)?;
                    self.stream.send(frontend::SASLResponse { data: &response });
                }
                SASLFinal { data } => {
                    let Some(client) = scram.as_mut() else {
                        return Err(ProtocolError::unexpected_phase(Authentication::MSGTYPE, "SASL").into());
                    };
                    client.finish(&data)?;
                    continue;
                }
                KerberosV5 => Err(UnsupportedAuth { method: "Kerberos V5" })?,
                GSS | GSSContinue { .. } => Err(UnsupportedAuth { method: "GSSAPI" })?,
                SSPI => Err(UnsupportedAuth { method: "SSPI" })?,
            }
            self.stream.flush().await?;
        }

        // After having received AuthenticationOk, the frontend must wait for further messages from the server.
        // In this phase a backend process is being started, and the frontend is just an interested bystander.

        loop {
            match self.stream.recv::<BackendMessage>().await? {
                BackendMessage::ReadyForQuery(ready) => {
                    self.status = TransactionStatus::from_byte(ready.status);
                    break;
                }
                BackendMessage::BackendKeyData(key) => self.key = Some(key),
                BackendMessage::ParameterStatus(param) => {
                    self.params.insert(param.name, param.value);
                }
                BackendMessage::NoticeResponse(notice) => self.notices.push(notice.notice),
                BackendMessage::NegotiateProtocolVersion(_) => { }
                BackendMessage::ErrorResponse(err) => return Err(err.notice.into()),
                f => Err(ProtocolError::unexpected_phase(f.msgtype(), "startup phase"))?,
            }
        }

        Ok(())
    }

    fn require_password(&mut self) -> Result<String> {
        match self.password.clone() {
            Some(password) => {
                self.password_used = true;
                Ok(password)
            }
            None => Err(ErrorKind::PasswordRequired.into()),
        }
    }

    /// The config this connection was made with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    /// The password, if the server asked for one.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|_| self.password_used)
    }

    /// Did the server ask for a password.
    pub fn password_used(&self) -> bool {
        self.password_used
    }

    /// Current value of a server reported parameter, e.g. `server_version`.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Server version as a number, `160002` for 16.2.
    pub fn server_version_num(&self) -> Option<u32> {
        parse_server_version(self.parameter("server_version")?)
    }

    pub fn backend_pid(&self) -> Option<u32> {
        self.key.as_ref().map(|k| k.process_id)
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        if self.closed {
            return TransactionStatus::Unknown;
        }
        self.status
    }

    /// Mark a command as in flight until the next `ReadyForQuery`.
    pub fn set_active(&mut self) {
        self.status = TransactionStatus::Active;
    }

    pub fn take_notices(&mut self) -> Vec<ServerNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    /// Token to cancel the running query from elsewhere.
    pub fn cancel_token(&self) -> Option<CancelToken> {
        let key = self.key.as_ref()?;
        Some(CancelToken::new(self.target.clone(), key.process_id, key.secret_key))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Send `Terminate` and close the socket.
    pub async fn close(mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.stream.send(frontend::Terminate);
            self.stream.flush().await?;
            self.stream.shutdown().await?;
        }
        Ok(())
    }

    fn poll_recv_inner(&mut self, cx: &mut Context) -> Poll<Result<(u8, Bytes)>> {
        loop {
            let (msgtype, body) = match ready!(self.stream.poll_recv_raw(cx)) {
                Ok(ok) => ok,
                Err(err) => {
                    self.closed = true;
                    return Poll::Ready(Err(err));
                }
            };

            match msgtype {
                backend::NoticeResponse::MSGTYPE => {
                    let notice = backend::NoticeResponse::decode(msgtype, body)?;
                    self.notices.push(notice.notice);
                }
                backend::NotificationResponse::MSGTYPE => {
                    let notify = backend::NotificationResponse::decode(msgtype, body)?;
                    self.notifications.push_back(notify.notification);
                }
                backend::ParameterStatus::MSGTYPE => {
                    let param = backend::ParameterStatus::decode(msgtype, body)?;
                    self.params.insert(param.name, param.value);
                }
                backend::ErrorResponse::MSGTYPE => {
                    let err = backend::ErrorResponse::decode(msgtype, body)?;
                    let err = Error::from(err.notice);
                    if err.is_connection_lost() {
                        self.closed = true;
                    }
                    return Poll::Ready(Err(err));
                }
                backend::ReadyForQuery::MSGTYPE => {
                    if let Some(status) = body.first() {
                        self.status = TransactionStatus::from_byte(*status);
                    }
                    return Poll::Ready(Ok((msgtype, body)));
                }
                _ => return Poll::Ready(Ok((msgtype, body))),
            }
        }
    }

    /// Wait for a notification without sending anything.
    pub async fn wait_notification(&mut self) -> Result<()> {
        std::future::poll_fn(|cx| {
            if !self.notifications.is_empty() {
                return Poll::Ready(Ok(()));
            }
            match ready!(self.poll_recv_inner(cx)) {
                Ok((msgtype, _)) => {
                    Poll::Ready(Err(ProtocolError::unexpected_phase(msgtype, "idle").into()))
                }
                Err(err) => Poll::Ready(Err(err)),
            }
        })
        .await
    }
}

impl PgTransport for Connection {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        let result = ready!(self.stream.poll_flush(cx));
        if result.is_err() {
            self.closed = true;
        }
        Poll::Ready(result)
    }

    fn poll_recv<B: BackendProtocol>(&mut self, cx: &mut Context) -> Poll<Result<B>> {
        let (msgtype, body) = ready!(self.poll_recv_inner(cx))?;
        Poll::Ready(Ok(B::decode(msgtype, body)?))
    }

    fn send<F: FrontendProtocol>(&mut self, message: F) {
        self.stream.send(message);
    }

    fn send_startup(&mut self, startup: frontend::Startup) {
        self.stream.send_startup(startup);
    }
}

fn describe_target(target: &Target) -> String {
    match target {
        Target::Unix { .. } => format!(
            "connection to server on socket \"{}\" failed",
            target.socket_path().unwrap_or_default(),
        ),
        Target::Tcp { host, port } => {
            format!("connection to server at \"{host}\", port {port} failed")
        }
    }
}

/// `"16.2 (Debian 16.2-1)"` into `160002`, `"9.6.3"` into `90603`.
pub fn parse_server_version(version: &str) -> Option<u32> {
    let version = version.split_whitespace().next()?;
    let mut parts = version
        .split('.')
        .map(|p| p.trim_end_matches(|c: char| !c.is_ascii_digit()).parse::<u32>().ok());
    let major = parts.next()??;
    let minor = parts.next().flatten().unwrap_or(0);
    if major >= 10 {
        Some(major * 10000 + minor)
    } else {
        let patch = parts.next().flatten().unwrap_or(0);
        Some(major * 10000 + minor * 100 + patch)
    }
}

/// Error establishing the connection.
pub struct ConnectError {
    reason: Cow<'static, str>,
}

impl ConnectError {
    pub fn new(reason: impl Into<Cow<'static, str>>) -> ConnectError {
        Self { reason: reason.into() }
    }
}

impl std::error::Error for ConnectError { }

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl fmt::Debug for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn server_version() {
        assert_eq!(parse_server_version("16.2 (Debian 16.2-1.pgdg120+2)"), Some(160002));
        assert_eq!(parse_server_version("9.6.3"), Some(90603));
        assert_eq!(parse_server_version("17devel"), Some(170000));
        assert_eq!(parse_server_version("x"), None);
    }

    #[test]
    fn target_description() {
        assert_eq!(
            describe_target(&Target::new("/tmp", 5432)),
            "connection to server on socket \"/tmp/.s.PGSQL.5432\" failed",
        );
        assert_eq!(
            describe_target(&Target::new("db", 5433)),
            "connection to server at \"db\", port 5433 failed",
        );
    }

    #[tokio::test]
    async fn refused_connection() {
        // bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config::parse(&format!("host=127.0.0.1 port={port} user=u")).unwrap();
        let err = Connection::connect(&config).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io(_)));
        assert!(err.to_string().starts_with(&format!("connection to server at \"127.0.0.1\", port {port} failed: ")));
    }

    #[tokio::test]
    async fn ssl_required_rejected() {
        let config = Config::parse("host=localhost sslmode=require").unwrap();
        let err = Connection::connect(&config).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "sslmode value \"require\" invalid when SSL support is not compiled in",
        );
    }
}
