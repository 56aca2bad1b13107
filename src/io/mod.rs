//! Collaborator interfaces at the edges of the pipeline.
//!
//! The coordinator only ever sees these traits; devices, files, and sockets
//! live behind them.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::session::aggregate::Artifact;

/// Produces PCM bytes, backed by a device or a file.
#[async_trait]
pub trait CaptureSource: Send {
    /// Read up to `max_bytes` of PCM. `Ok(None)` signals end of stream.
    async fn read(&mut self, max_bytes: usize) -> Result<Option<Vec<u8>>>;
}

/// Consumes PCM bytes for playback.
#[async_trait]
pub trait PlaybackSink: Send {
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Release the underlying device.
    async fn close(&mut self) -> Result<()>;
}

/// Sending half of a duplex transport. Exactly one writer exists at a time.
#[async_trait]
pub trait TransportSender: Send {
    async fn send(&mut self, message: String) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Receiving half of a duplex transport.
#[async_trait]
pub trait TransportReceiver: Send {
    /// Wait for the next framed message. `Ok(None)` means the peer closed.
    async fn receive(&mut self) -> Result<Option<String>>;
}

/// A duplex channel carrying framed protocol messages.
///
/// Messages preserve send order per direction; there is no ordering guarantee
/// across directions. Splitting lets the reader run fully concurrently with
/// the single writer.
#[async_trait]
pub trait TransportLink: Send {
    async fn send(&mut self, message: String) -> Result<()>;

    async fn receive(&mut self) -> Result<Option<String>>;

    async fn close(&mut self) -> Result<()>;

    /// Split into independently owned halves.
    fn split(self: Box<Self>) -> (Box<dyn TransportSender>, Box<dyn TransportReceiver>);
}

/// Receives completed artifacts. Shared across finalization tasks.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn write(&self, artifact: Artifact) -> Result<()>;
}
