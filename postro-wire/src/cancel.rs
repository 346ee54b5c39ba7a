//! Out of band query cancellation.
use std::time::Duration;

use crate::{
    Result,
    connection::ConnectError,
    net::Target,
    postgres::frontend,
    stream::PgStream,
    transport::PgTransportExt,
};

const CANCEL_TIMEOUT: Duration = Duration::from_secs(30);

/// Cancel the query running on a connection, from another task or thread.
///
/// The request travels on a fresh socket, the server gives no indication whether it had any
/// effect.
#[derive(Debug, Clone)]
pub struct CancelToken {
    target: Target,
    process_id: u32,
    secret_key: u32,
}

impl CancelToken {
    pub fn new(target: Target, process_id: u32, secret_key: u32) -> CancelToken {
        CancelToken { target, process_id, secret_key }
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// Send `CancelRequest` and wait for the server to close the socket.
    pub async fn cancel(&self) -> Result<()> {
        let request = async {
            let mut stream = PgStream::connect(&self.target).await?;
            frontend::CancelRequest {
                process_id: self.process_id,
                secret_key: self.secret_key,
            }
            .write(stream.write_buf());
            stream.flush().await?;
            stream.read_eof().await?;
            Result::Ok(())
        };

        match tokio::time::timeout(CANCEL_TIMEOUT, request).await {
            Ok(result) => result,
            Err(_) => Err(ConnectError::new("timeout expired").into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn sends_cancel_request() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 16];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let token = CancelToken::new(Target::new("127.0.0.1", port), 42, 7);
        token.cancel().await.unwrap();

        let buf = server.await.unwrap();
        assert_eq!(&buf[..4], &16u32.to_be_bytes());
        assert_eq!(&buf[4..8], &80_877_102u32.to_be_bytes());
        assert_eq!(&buf[8..12], &42u32.to_be_bytes());
        assert_eq!(&buf[12..], &7u32.to_be_bytes());
    }
}
