//! voxlink — realtime bidirectional voice session coordinator.
//!
//! Manages a persistent duplex connection carrying interleaved audio and
//! control events: locally captured audio is chunked, resampled, and
//! multiplexed into outbound frames while inbound server events are
//! demultiplexed into typed item and response streams, with capture,
//! transmission, reception, and playback running concurrently.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use voxlink::config::SessionConfig;
//! use voxlink::io::memory::{BufferCapture, MemoryArtifacts, MemoryPlayback};
//! use voxlink::session::SessionCoordinator;
//! use voxlink::transport::{WsConnectOptions, WsTransport};
//!
//! # async fn example() -> voxlink::error::Result<()> {
//! let transport = WsTransport::connect(&WsConnectOptions {
//!     url: "wss://api.openai.com/v1/realtime".into(),
//!     api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
//!     model: "gpt-4o-realtime-preview".into(),
//! })
//! .await?;
//!
//! let artifacts = MemoryArtifacts::new();
//! let mut coordinator = SessionCoordinator::new(SessionConfig::default())?;
//! let result = coordinator
//!     .run(
//!         Box::new(BufferCapture::new(vec![0u8; 3200])),
//!         Box::new(transport),
//!         Box::new(MemoryPlayback::new()),
//!         Arc::new(artifacts.clone()),
//!     )
//!     .await?;
//! println!("completed {} responses", result.responses_completed);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod io;
pub mod prelude;
pub mod protocol;
pub mod session;
pub mod transport;
