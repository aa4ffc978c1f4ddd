//! Stream connectors for the tool server connection

use std::fmt;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use super::error::{RpcError, RpcResult};

/// Bidirectional byte stream the client runs its protocol over
pub trait RpcStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> RpcStream for T {}

pub type BoxedStream = Box<dyn RpcStream>;

/// Opens a fresh connection to the tool server
///
/// Called once initially and again on every reconnect.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> io::Result<BoxedStream>;

    /// Human-readable target, for logs
    fn describe(&self) -> String;
}

/// Tool server address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `host:port`
    Tcp(String),
    /// Unix domain socket path
    Unix(PathBuf),
}

impl Endpoint {
    /// Parse `tcp://host:port`, `unix:/path`, `unix:///path` or bare `host:port`
    pub fn parse(s: &str) -> RpcResult<Self> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix("unix://").or_else(|| s.strip_prefix("unix:")) {
            if path.is_empty() {
                return Err(RpcError::ConnectionFailed(format!("Invalid endpoint: {}", s)));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }

        let addr = s.strip_prefix("tcp://").unwrap_or(s);
        match addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Endpoint::Tcp(addr.to_string()))
            }
            _ => Err(RpcError::ConnectionFailed(format!("Invalid endpoint: {}", s))),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

#[async_trait]
impl Connector for Endpoint {
    async fn connect(&self) -> io::Result<BoxedStream> {
        match self {
            Endpoint::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr.as_str()).await?;
                stream.set_nodelay(true)?;
                Ok(Box::new(stream))
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path).await?;
                Ok(Box::new(stream))
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "Unix sockets are not supported on this platform",
            )),
        }
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoints() {
        assert_eq!(
            Endpoint::parse("tcp://127.0.0.1:8080").unwrap(),
            Endpoint::Tcp("127.0.0.1:8080".into())
        );
        assert_eq!(
            Endpoint::parse("localhost:9000").unwrap(),
            Endpoint::Tcp("localhost:9000".into())
        );
        assert_eq!(
            Endpoint::parse("unix:/tmp/tools.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/tmp/tools.sock"))
        );
        assert_eq!(
            Endpoint::parse("unix:///tmp/tools.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/tmp/tools.sock"))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Endpoint::parse("tcp://nohost").is_err());
        assert!(Endpoint::parse("unix:").is_err());
        assert!(Endpoint::parse("127.0.0.1:notaport").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Endpoint::Tcp("h:1".into()).to_string(), "tcp://h:1");
        assert_eq!(Endpoint::Unix(PathBuf::from("/s")).to_string(), "unix:/s");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = Endpoint::Tcp(addr.to_string());
        assert!(endpoint.connect().await.is_err());
    }
}
