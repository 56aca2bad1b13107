//! Audio framing and resampling for the streaming pipeline.

pub mod chunk;
pub mod resample;
pub mod types;

pub use chunk::AudioChunker;
pub use resample::resample;
pub use types::{pcm16_bytes_to_samples, pcm16_samples_to_bytes, AudioFrame, PcmFormat};
