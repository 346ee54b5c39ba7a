use bytes::{Buf, Bytes, BytesMut};
use std::{
    io,
    task::{Context, Poll, ready},
};

use crate::{
    Result,
    common::{span, trace, verbose},
    io::{poll_read, poll_write_all},
    net::{Socket, Target},
    postgres::{BackendMessage, BackendProtocol, FrontendProtocol, ProtocolError, frontend},
    transport::PgTransport,
};

#[cfg(feature = "log")]
use crate::ext::FmtExt;

const DEFAULT_BUF_CAPACITY: usize = 1024;

/// msgtype + length
const HEADER: usize = 1 + 4;

/// Buffered connection to postgres.
#[derive(Debug)]
pub struct PgStream {
    socket: Socket,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl PgStream {
    pub async fn connect(target: &Target) -> io::Result<Self> {
        let socket = Socket::connect(target).await?;
        Ok(Self {
            socket,
            read_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            write_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
        })
    }

    /// Buffer raw bytes, for untyped requests like `CancelRequest`.
    pub fn write_buf(&mut self) -> &mut BytesMut {
        &mut self.write_buf
    }

    /// Receive one message undecoded, returns message type and body.
    pub fn poll_recv_raw(&mut self, cx: &mut Context) -> Poll<Result<(u8, Bytes)>> {
        loop {
            let Some(mut header) = self.read_buf.get(..HEADER) else {
                self.read_buf.reserve(DEFAULT_BUF_CAPACITY);
                if ready!(poll_read(&mut self.socket, &mut self.read_buf, cx))? == 0 {
                    return Poll::Ready(Err(closed().into()));
                }
                continue;
            };

            let msgtype = header.get_u8();
            let len = header.get_i32();
            if len < 4 {
                return Poll::Ready(Err(ProtocolError::malformed("invalid message length").into()));
            }
            let len = len as usize;

            if self.read_buf.len() - 1/*msgtype*/ < len {
                self.read_buf.reserve(1 + len);
                if ready!(poll_read(&mut self.socket, &mut self.read_buf, cx))? == 0 {
                    return Poll::Ready(Err(closed().into()));
                }
                continue;
            }

            self.read_buf.advance(HEADER);
            let body = self.read_buf.split_to(len - 4).freeze();

            span!("recv", msg = BackendMessage::message_name(msgtype));
            trace!("(B) {}: {:?}", BackendMessage::message_name(msgtype), body[..].lossy());
            verbose!(len = len, "backend message");

            return Poll::Ready(Ok((msgtype, body)));
        }
    }

    /// Wait until the server closes the connection, discarding anything it sends.
    pub async fn read_eof(&mut self) -> io::Result<()> {
        std::future::poll_fn(|cx| loop {
            self.read_buf.clear();
            self.read_buf.reserve(DEFAULT_BUF_CAPACITY);
            if ready!(poll_read(&mut self.socket, &mut self.read_buf, cx))? == 0 {
                return Poll::Ready(Ok(()));
            }
        })
        .await
    }

    /// Shutdown the write half.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        tokio::io::AsyncWriteExt::shutdown(&mut self.socket).await
    }
}

pub(crate) fn closed() -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "server closed the connection unexpectedly",
    )
}

impl PgTransport for PgStream {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        if !self.write_buf.is_empty() {
            trace!("(F) {:?}", self.write_buf[..].lossy());
        }
        poll_write_all(&mut self.socket, &mut self.write_buf, cx)
    }

    fn poll_recv<B: BackendProtocol>(&mut self, cx: &mut Context) -> Poll<Result<B>> {
        let (msgtype, body) = ready!(self.poll_recv_raw(cx))?;
        Poll::Ready(Ok(B::decode(msgtype, body)?))
    }

    fn send<F: FrontendProtocol>(&mut self, message: F) {
        frontend::write(message, &mut self.write_buf);
    }

    fn send_startup(&mut self, startup: frontend::Startup) {
        startup.write(&mut self.write_buf);
    }
}
