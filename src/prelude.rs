//! Commonly used voxlink types.

pub use crate::audio::{AudioChunker, AudioFrame, PcmFormat};
pub use crate::config::{SessionConfig, SessionLifetime, TurnDetection};
pub use crate::error::{Result, VoxlinkError};
pub use crate::io::{ArtifactSink, CaptureSource, PlaybackSink, TransportLink};
pub use crate::protocol::{ClientEvent, ServerEvent};
pub use crate::session::{
    Artifact, ArtifactKind, ArtifactPayload, SessionCoordinator, SessionHandle, SessionObserver,
    SessionResult, SessionState,
};
pub use crate::transport::{WsConnectOptions, WsTransport};
