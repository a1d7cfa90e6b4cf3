use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::DomainError;
use domain::driver::Transport;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use super::framing::{read_frame, write_request};

/// ESC/VP.net session header: magic, protocol version 1.0, CONNECT, no headers
pub const ESCVP_NET_HELLO: [u8; 16] = *b"ESC/VP.net\x10\x03\x00\x00\x00\x00";
const ESCVP_NET_MAGIC: &[u8] = b"ESC/VP.net";
const ESCVP_NET_STATUS_OK: u8 = 0x20;
const ESCVP_NET_STATUS_INDEX: usize = 14;

/// ESC/VP.net endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_port() -> u16 {
    3629
}
fn default_connect_timeout_ms() -> u64 {
    5000
}

impl TcpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Projector reached over ESC/VP.net (TCP)
pub struct TcpTransport {
    config: TcpConfig,
    exchange_timeout: Duration,
    stream: Option<TcpStream>,
    last_activity: Option<DateTime<Utc>>,
}

impl TcpTransport {
    pub fn new(config: TcpConfig, exchange_timeout: Duration) -> Self {
        Self {
            config,
            exchange_timeout,
            stream: None,
            last_activity: None,
        }
    }

    async fn handshake(&self, stream: &mut TcpStream) -> Result<(), DomainError> {
        let address = self.config.address();
        stream
            .write_all(&ESCVP_NET_HELLO)
            .await
            .map_err(|e| DomainError::connect(&address, format!("Handshake write failed: {}", e)))?;

        let mut reply = [0u8; 16];
        match tokio::time::timeout(self.exchange_timeout, stream.read_exact(&mut reply)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(DomainError::connect(&address, format!("Handshake read failed: {}", e)));
            }
            Err(_) => return Err(DomainError::connect(&address, "Handshake timed out")),
        }

        if !reply.starts_with(ESCVP_NET_MAGIC) {
            return Err(DomainError::connect(&address, "Peer is not an ESC/VP.net projector"));
        }
        if reply[ESCVP_NET_STATUS_INDEX] != ESCVP_NET_STATUS_OK {
            return Err(DomainError::connect(
                &address,
                format!(
                    "Projector refused the session (status 0x{:02X})",
                    reply[ESCVP_NET_STATUS_INDEX]
                ),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&mut self) -> Result<(), DomainError> {
        let address = self.config.address();
        debug!(address = %address, "Connecting to projector");

        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let mut stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                // Downgraded to WARN to avoid spamming error logs during retries
                warn!(address = %address, error = %e, "Failed to connect to projector");
                return Err(DomainError::connect(&address, e));
            }
            Err(_) => {
                warn!(address = %address, "Connection attempt timed out");
                return Err(DomainError::connect(&address, "Connection timed out"));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not disable Nagle");
        }

        self.handshake(&mut stream).await?;
        self.stream = Some(stream);
        self.last_activity = Some(Utc::now());

        info!(address = %address, "ESC/VP.net session established");
        Ok(())
    }

    async fn send(&mut self, request: &[u8]) -> Result<Vec<u8>, DomainError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| DomainError::IoClosed("Transport not open".to_string()))?;

        let result = match write_request(stream, request).await {
            Ok(()) => read_frame(stream, self.exchange_timeout).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(frame) => {
                self.last_activity = Some(Utc::now());
                Ok(frame)
            }
            Err(e) => {
                if e.is_io() {
                    // Invalidate connection
                    self.stream = None;
                }
                Err(e)
            }
        }
    }

    async fn close(&mut self) -> Result<(), DomainError> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "Error shutting down TCP stream");
            }
            info!(address = %self.config.address(), "Projector connection closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }

    fn endpoint(&self) -> String {
        self.config.address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_millis(500);

    async fn fake_projector(status: u8, replies: Vec<&'static [u8]>) -> TcpConfig {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut hello = [0u8; 16];
            socket.read_exact(&mut hello).await.unwrap();
            assert_eq!(hello, ESCVP_NET_HELLO);

            let mut answer = ESCVP_NET_HELLO;
            answer[ESCVP_NET_STATUS_INDEX] = status;
            socket.write_all(&answer).await.unwrap();

            for reply in replies {
                let mut request = [0u8; 64];
                let n = socket.read(&mut request).await.unwrap();
                if n == 0 {
                    return;
                }
                socket.write_all(reply).await.unwrap();
            }
        });

        TcpConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout_ms: 1000,
        }
    }

    #[test]
    fn test_tcp_config_defaults() {
        let config: TcpConfig = serde_json::from_value(serde_json::json!({"host": "10.0.0.7"})).unwrap();
        assert_eq!(config.port, 3629);
        assert_eq!(config.connect_timeout_ms, 5000);
        assert_eq!(config.address(), "10.0.0.7:3629");
    }

    #[test]
    fn test_hello_layout() {
        assert_eq!(&ESCVP_NET_HELLO[..10], b"ESC/VP.net");
        assert_eq!(ESCVP_NET_HELLO[10], 0x10);
        assert_eq!(ESCVP_NET_HELLO[11], 0x03);
    }

    #[tokio::test]
    async fn test_open_and_exchange() {
        let config = fake_projector(ESCVP_NET_STATUS_OK, vec![&b"PWR=01\r:"[..]]).await;
        let mut transport = TcpTransport::new(config, TIMEOUT);

        transport.open().await.unwrap();
        assert!(transport.is_open());

        let frame = transport.send(b"PWR?\r").await.unwrap();
        assert_eq!(frame, b"PWR=01\r:");
        assert!(transport.last_activity().is_some());

        transport.close().await.unwrap();
        assert!(!transport.is_open());
        // Idempotent
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_session_is_connect_error() {
        let config = fake_projector(0x43, vec![]).await;
        let mut transport = TcpTransport::new(config, TIMEOUT);

        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, DomainError::ConnectError { .. }));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_connection_refused_is_connect_error() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut transport = TcpTransport::new(
            TcpConfig {
                host: "127.0.0.1".to_string(),
                port,
                connect_timeout_ms: 1000,
            },
            TIMEOUT,
        );

        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, DomainError::ConnectError { .. }));
    }

    #[tokio::test]
    async fn test_peer_hangup_is_io_closed() {
        let config = fake_projector(ESCVP_NET_STATUS_OK, vec![]).await;
        let mut transport = TcpTransport::new(config, TIMEOUT);
        transport.open().await.unwrap();

        let err = transport.send(b"PWR?\r").await.unwrap_err();
        assert!(matches!(err, DomainError::IoClosed(_)));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_send_without_open_is_io_closed() {
        let mut transport = TcpTransport::new(TcpConfig::new("127.0.0.1"), TIMEOUT);
        let err = transport.send(b"PWR?\r").await.unwrap_err();
        assert!(matches!(err, DomainError::IoClosed(_)));
    }
}
