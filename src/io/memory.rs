//! In-memory collaborators for buffer-fed sessions and tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    ArtifactSink, CaptureSource, PlaybackSink, TransportLink, TransportReceiver, TransportSender,
};
use crate::error::{Result, VoxlinkError};
use crate::session::aggregate::Artifact;

/// Capture source reading from an already-materialized byte buffer.
///
/// Stands in for a device when the audio for a whole turn is on hand, the way
/// file-fed sessions work.
pub struct BufferCapture {
    data: Vec<u8>,
    position: usize,
}

impl BufferCapture {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }
}

#[async_trait]
impl CaptureSource for BufferCapture {
    async fn read(&mut self, max_bytes: usize) -> Result<Option<Vec<u8>>> {
        if self.position >= self.data.len() {
            return Ok(None);
        }
        let end = (self.position + max_bytes).min(self.data.len());
        let chunk = self.data[self.position..end].to_vec();
        self.position = end;
        Ok(Some(chunk))
    }
}

/// Playback sink appending into a shared byte buffer.
#[derive(Clone, Default)]
pub struct MemoryPlayback {
    bytes: Arc<Mutex<Vec<u8>>>,
    closed: Arc<Mutex<bool>>,
}

impl MemoryPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.lock().expect("playback lock should not poison").clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().expect("playback lock should not poison")
    }
}

#[async_trait]
impl PlaybackSink for MemoryPlayback {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.bytes
            .lock()
            .expect("playback lock should not poison")
            .extend_from_slice(bytes);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        *self.closed.lock().expect("playback lock should not poison") = true;
        Ok(())
    }
}

/// Artifact sink collecting into a shared list.
#[derive(Clone, Default)]
pub struct MemoryArtifacts {
    artifacts: Arc<Mutex<Vec<Artifact>>>,
}

impl MemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Artifact> {
        self.artifacts
            .lock()
            .expect("artifact lock should not poison")
            .clone()
    }
}

#[async_trait]
impl ArtifactSink for MemoryArtifacts {
    async fn write(&self, artifact: Artifact) -> Result<()> {
        self.artifacts
            .lock()
            .expect("artifact lock should not poison")
            .push(artifact);
        Ok(())
    }
}

/// One end of an in-memory duplex link.
pub struct MemoryLink {
    outgoing: mpsc::UnboundedSender<String>,
    incoming: mpsc::UnboundedReceiver<String>,
}

/// Create a connected pair of in-memory transport links.
pub fn duplex() -> (MemoryLink, MemoryLink) {
    let (left_tx, left_rx) = mpsc::unbounded_channel();
    let (right_tx, right_rx) = mpsc::unbounded_channel();
    (
        MemoryLink {
            outgoing: left_tx,
            incoming: right_rx,
        },
        MemoryLink {
            outgoing: right_tx,
            incoming: left_rx,
        },
    )
}

pub struct MemorySender {
    outgoing: Option<mpsc::UnboundedSender<String>>,
}

pub struct MemoryReceiver {
    incoming: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl TransportSender for MemorySender {
    async fn send(&mut self, message: String) -> Result<()> {
        let outgoing = self
            .outgoing
            .as_ref()
            .ok_or_else(|| VoxlinkError::Transport("Link already closed".into()))?;
        outgoing
            .send(message)
            .map_err(|_| VoxlinkError::Transport("Peer hung up".into()))
    }

    async fn close(&mut self) -> Result<()> {
        self.outgoing.take();
        Ok(())
    }
}

#[async_trait]
impl TransportReceiver for MemoryReceiver {
    async fn receive(&mut self) -> Result<Option<String>> {
        Ok(self.incoming.recv().await)
    }
}

#[async_trait]
impl TransportLink for MemoryLink {
    async fn send(&mut self, message: String) -> Result<()> {
        self.outgoing
            .send(message)
            .map_err(|_| VoxlinkError::Transport("Peer hung up".into()))
    }

    async fn receive(&mut self) -> Result<Option<String>> {
        Ok(self.incoming.recv().await)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn split(self: Box<Self>) -> (Box<dyn TransportSender>, Box<dyn TransportReceiver>) {
        (
            Box::new(MemorySender {
                outgoing: Some(self.outgoing),
            }),
            Box::new(MemoryReceiver {
                incoming: self.incoming,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffer_capture_reads_in_bounded_chunks_then_ends() {
        let mut capture = BufferCapture::new((0u8..10).collect());
        assert_eq!(
            capture.read(4).await.expect("read should succeed"),
            Some(vec![0, 1, 2, 3])
        );
        assert_eq!(
            capture.read(4).await.expect("read should succeed"),
            Some(vec![4, 5, 6, 7])
        );
        assert_eq!(
            capture.read(4).await.expect("read should succeed"),
            Some(vec![8, 9])
        );
        assert_eq!(capture.read(4).await.expect("read should succeed"), None);
    }

    #[tokio::test]
    async fn duplex_links_exchange_messages_in_order() {
        let (mut client, mut server) = duplex();
        client.send("one".into()).await.expect("send should succeed");
        client.send("two".into()).await.expect("send should succeed");
        assert_eq!(
            server.receive().await.expect("receive should succeed"),
            Some("one".into())
        );
        assert_eq!(
            server.receive().await.expect("receive should succeed"),
            Some("two".into())
        );

        server.send("ack".into()).await.expect("send should succeed");
        assert_eq!(
            client.receive().await.expect("receive should succeed"),
            Some("ack".into())
        );
    }

    #[tokio::test]
    async fn split_halves_work_independently_and_close_hangs_up() {
        let (client, mut server) = duplex();
        let (mut sender, mut receiver) = Box::new(client).split();

        sender.send("hello".into()).await.expect("send should succeed");
        assert_eq!(
            server.receive().await.expect("receive should succeed"),
            Some("hello".into())
        );

        server.send("world".into()).await.expect("send should succeed");
        assert_eq!(
            receiver.receive().await.expect("receive should succeed"),
            Some("world".into())
        );

        sender.close().await.expect("close should succeed");
        assert!(sender.send("late".into()).await.is_err());
        // The peer observes the closed direction as end of stream.
        assert_eq!(server.receive().await.expect("receive should succeed"), None);
    }

    #[tokio::test]
    async fn memory_playback_accumulates_and_closes() {
        let mut playback = MemoryPlayback::new();
        playback.write(&[1, 2]).await.expect("write should succeed");
        playback.write(&[3]).await.expect("write should succeed");
        assert_eq!(playback.bytes(), vec![1, 2, 3]);
        assert!(!playback.is_closed());
        playback.close().await.expect("close should succeed");
        assert!(playback.is_closed());
    }
}
