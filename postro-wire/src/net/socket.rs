use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

/// Where a [`Socket`] connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Host name or address, with port.
    Tcp { host: String, port: u16 },
    /// Socket directory, the file is `{dir}/.s.PGSQL.{port}`.
    Unix { dir: String, port: u16 },
}

impl Target {
    /// A host beginning with a slash names a unix socket directory.
    pub fn new(host: &str, port: u16) -> Target {
        if host.starts_with('/') {
            Target::Unix { dir: host.to_owned(), port }
        } else {
            Target::Tcp { host: host.to_owned(), port }
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Target::Tcp { port, .. } | Target::Unix { port, .. } => *port,
        }
    }

    /// Host name or socket directory.
    pub fn host(&self) -> &str {
        match self {
            Target::Tcp { host, .. } => host,
            Target::Unix { dir, .. } => dir,
        }
    }

    pub fn is_unix(&self) -> bool {
        matches!(self, Target::Unix { .. })
    }

    /// Path of the unix socket file.
    pub fn socket_path(&self) -> Option<String> {
        match self {
            Target::Unix { dir, port } => Some(format!("{}/.s.PGSQL.{port}", dir.trim_end_matches('/'))),
            Target::Tcp { .. } => None,
        }
    }
}

/// an either `TcpStream` or `UnixStream`, which implement
/// `AsyncRead` and `AsyncWrite` transparently
pub struct Socket {
    kind: Kind,
}

enum Kind {
    Tcp(tokio::net::TcpStream),
    #[cfg(unix)]
    Unix(tokio::net::UnixStream),
}

impl Socket {
    pub async fn connect(target: &Target) -> io::Result<Socket> {
        match target {
            Target::Tcp { host, port } => Self::connect_tcp(host, *port).await,
            Target::Unix { .. } => {
                let path = target.socket_path().unwrap_or_default();
                Self::connect_socket(&path).await
            }
        }
    }

    pub async fn connect_tcp(host: &str, port: u16) -> io::Result<Socket> {
        let socket = tokio::net::TcpStream::connect((host, port)).await?;
        socket.set_nodelay(true)?;
        Ok(Socket { kind: Kind::Tcp(socket) })
    }

    pub async fn connect_socket(path: &str) -> io::Result<Socket> {
        #[cfg(unix)]
        {
            let socket = tokio::net::UnixStream::connect(path).await?;
            Ok(Socket { kind: Kind::Unix(socket) })
        }

        #[cfg(not(unix))]
        {
            let _ = path;
            Err(io::Error::new(io::ErrorKind::Unsupported, "unix sockets are not supported"))
        }
    }
}

impl tokio::io::AsyncRead for Socket {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.kind {
            Kind::Tcp(t) => Pin::new(t).poll_read(cx, buf),
            #[cfg(unix)]
            Kind::Unix(u) => Pin::new(u).poll_read(cx, buf),
        }
    }
}

impl tokio::io::AsyncWrite for Socket {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.kind {
            Kind::Tcp(t) => Pin::new(t).poll_write(cx, buf),
            #[cfg(unix)]
            Kind::Unix(u) => Pin::new(u).poll_write(cx, buf),
        }
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match &mut self.kind {
            Kind::Tcp(t) => Pin::new(t).poll_write_vectored(cx, bufs),
            #[cfg(unix)]
            Kind::Unix(u) => Pin::new(u).poll_write_vectored(cx, bufs),
        }
    }

    fn is_write_vectored(&self) -> bool {
        match &self.kind {
            Kind::Tcp(t) => t.is_write_vectored(),
            #[cfg(unix)]
            Kind::Unix(u) => u.is_write_vectored(),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.kind {
            Kind::Tcp(t) => Pin::new(t).poll_flush(cx),
            #[cfg(unix)]
            Kind::Unix(u) => Pin::new(u).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.kind {
            Kind::Tcp(t) => Pin::new(t).poll_shutdown(cx),
            #[cfg(unix)]
            Kind::Unix(u) => Pin::new(u).poll_shutdown(cx),
        }
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            Kind::Tcp(ref tcp) => std::fmt::Debug::fmt(tcp, f),
            #[cfg(unix)]
            Kind::Unix(ref unix) => std::fmt::Debug::fmt(unix, f),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn target_kind() {
        let t = Target::new("/tmp/", 5433);
        assert!(t.is_unix());
        assert_eq!(t.socket_path().as_deref(), Some("/tmp/.s.PGSQL.5433"));

        let t = Target::new("db.local", 5432);
        assert!(!t.is_unix());
        assert_eq!(t.host(), "db.local");
        assert_eq!(t.socket_path(), None);
    }
}
