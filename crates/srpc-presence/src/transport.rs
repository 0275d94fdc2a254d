//! Transport seam between the presence client and the local consumer.
//!
//! The client only needs a bidirectional byte stream; tests substitute
//! in-memory duplex pipes for the real socket.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Highest endpoint index the consumer listens on.
const MAX_PIPE_INDEX: u32 = 9;

/// A connected byte stream to the consumer.
pub trait IpcStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> IpcStream for T {}

pub type BoxedIpcStream = Box<dyn IpcStream>;

/// Opens connections to the presence consumer.
#[async_trait]
pub trait IpcConnector: Send + Sync + 'static {
    async fn connect(&self) -> io::Result<BoxedIpcStream>;
}

#[async_trait]
impl<T: IpcConnector> IpcConnector for Arc<T> {
    async fn connect(&self) -> io::Result<BoxedIpcStream> {
        (**self).connect().await
    }
}

/// Connects to the consumer's local socket (Unix) or named pipe (Windows),
/// probing `discord-ipc-N` from the configured index upward.
#[derive(Debug, Clone)]
pub struct LocalIpcConnector {
    first_index: u32,
}

impl LocalIpcConnector {
    pub fn new(first_index: u32) -> Self {
        Self {
            first_index: first_index.min(MAX_PIPE_INDEX),
        }
    }

    /// Candidate endpoint paths in the order they are tried.
    pub fn candidates(&self) -> Vec<PathBuf> {
        (self.first_index..=MAX_PIPE_INDEX)
            .map(ipc_endpoint_path)
            .collect()
    }
}

impl Default for LocalIpcConnector {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl IpcConnector for LocalIpcConnector {
    async fn connect(&self) -> io::Result<BoxedIpcStream> {
        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no IPC endpoint available");
        for path in self.candidates() {
            match open_endpoint(&path).await {
                Ok(stream) => {
                    debug!(path = %path.display(), "Opened IPC endpoint");
                    return Ok(stream);
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "IPC endpoint unavailable");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(unix)]
fn ipc_endpoint_path(index: u32) -> PathBuf {
    let base = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .find_map(|key| std::env::var_os(key).filter(|v| !v.is_empty()))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    base.join(format!("discord-ipc-{index}"))
}

#[cfg(windows)]
fn ipc_endpoint_path(index: u32) -> PathBuf {
    PathBuf::from(format!(r"\\?\pipe\discord-ipc-{index}"))
}

#[cfg(unix)]
async fn open_endpoint(path: &std::path::Path) -> io::Result<BoxedIpcStream> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    Ok(Box::new(stream))
}

#[cfg(windows)]
async fn open_endpoint(path: &std::path::Path) -> io::Result<BoxedIpcStream> {
    let pipe = tokio::net::windows::named_pipe::ClientOptions::new().open(path)?;
    Ok(Box::new(pipe))
}
