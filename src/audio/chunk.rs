//! Fixed-duration framing of PCM byte streams.

use super::types::{AudioFrame, PcmFormat};
use crate::error::{Result, VoxlinkError};

/// Splits a continuous PCM byte stream into fixed-duration frames sized for
/// transport.
///
/// Framing is lazy and restartable per call; nothing blocks. The final frame
/// may be shorter than the rest when the stream length is not an exact
/// multiple of the frame size.
#[derive(Debug, Clone, Copy)]
pub struct AudioChunker {
    format: PcmFormat,
    frame_bytes: usize,
}

impl AudioChunker {
    pub fn new(format: PcmFormat, frame_ms: u32) -> Result<Self> {
        format.validate()?;
        if frame_ms == 0 {
            return Err(VoxlinkError::AudioFormat(
                "Frame duration must be positive".into(),
            ));
        }
        let samples_per_frame = format.sample_rate as usize * frame_ms as usize / 1000;
        let frame_bytes = samples_per_frame * format.frame_alignment();
        if frame_bytes == 0 {
            return Err(VoxlinkError::AudioFormat(format!(
                "Frame of {frame_ms}ms at {}Hz holds no samples",
                format.sample_rate
            )));
        }
        Ok(Self {
            format,
            frame_bytes,
        })
    }

    /// Size in bytes of every frame except possibly the last.
    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Frame an already-materialized byte range.
    ///
    /// The input must be whole-sample aligned; a torn sample at the boundary
    /// is an audio format error, fatal to the outbound path only.
    pub fn frames<'a>(&self, bytes: &'a [u8]) -> Result<impl Iterator<Item = AudioFrame<'a>>> {
        if bytes.len() % self.format.frame_alignment() != 0 {
            return Err(VoxlinkError::AudioFormat(format!(
                "Stream of {} bytes is not aligned to {}-byte samples",
                bytes.len(),
                self.format.frame_alignment()
            )));
        }
        let format = self.format;
        Ok(bytes
            .chunks(self.frame_bytes)
            .map(move |chunk| AudioFrame {
                bytes: chunk,
                format,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker_16k_100ms() -> AudioChunker {
        AudioChunker::new(PcmFormat::pcm16_mono(16_000), 100).expect("chunker should build")
    }

    #[test]
    fn frame_size_matches_rate_and_duration() {
        // 16000 Hz * 0.1 s * 2 bytes = 3200 bytes per frame.
        assert_eq!(chunker_16k_100ms().frame_bytes(), 3200);
        let chunker =
            AudioChunker::new(PcmFormat::pcm16_mono(24_000), 100).expect("chunker should build");
        assert_eq!(chunker.frame_bytes(), 4800);
    }

    #[test]
    fn concatenated_frames_reproduce_the_stream() {
        let chunker = chunker_16k_100ms();
        let stream: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let frames: Vec<_> = chunker
            .frames(&stream)
            .expect("aligned stream should frame")
            .collect();

        let mut rebuilt = Vec::new();
        for frame in &frames {
            rebuilt.extend_from_slice(frame.bytes);
        }
        assert_eq!(rebuilt, stream);

        // All frames but the last are full-size; the last holds the remainder.
        for frame in &frames[..frames.len() - 1] {
            assert_eq!(frame.bytes.len(), 3200);
        }
        assert_eq!(frames.last().expect("frames should exist").bytes.len(), 10_000 % 3200);
    }

    #[test]
    fn exact_multiple_has_no_short_frame() {
        let chunker = chunker_16k_100ms();
        let stream = vec![0u8; 3200 * 3];
        let frames: Vec<_> = chunker
            .frames(&stream)
            .expect("aligned stream should frame")
            .collect();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.bytes.len() == 3200));
    }

    #[test]
    fn every_frame_is_whole_sample_aligned() {
        let chunker = chunker_16k_100ms();
        let stream = vec![0u8; 7000];
        for frame in chunker.frames(&stream).expect("aligned stream should frame") {
            assert_eq!(frame.bytes.len() % frame.format.frame_alignment(), 0);
        }
    }

    #[test]
    fn torn_sample_at_the_boundary_is_rejected() {
        let chunker = chunker_16k_100ms();
        let stream = vec![0u8; 3201];
        assert!(matches!(
            chunker.frames(&stream).map(|_| ()),
            Err(VoxlinkError::AudioFormat(_))
        ));
    }

    #[test]
    fn empty_stream_yields_no_frames() {
        let chunker = chunker_16k_100ms();
        assert_eq!(
            chunker
                .frames(&[])
                .expect("empty stream should frame")
                .count(),
            0
        );
    }

    #[test]
    fn framing_is_restartable() {
        let chunker = chunker_16k_100ms();
        let stream = vec![7u8; 6400];
        let first = chunker
            .frames(&stream)
            .expect("aligned stream should frame")
            .count();
        let second = chunker
            .frames(&stream)
            .expect("aligned stream should frame")
            .count();
        assert_eq!(first, second);
    }

    #[test]
    fn degenerate_frames_are_rejected_at_construction() {
        assert!(AudioChunker::new(PcmFormat::pcm16_mono(16_000), 0).is_err());
        // 1 ms at 100 Hz rounds down to zero samples.
        assert!(AudioChunker::new(PcmFormat::pcm16_mono(100), 1).is_err());
    }
}
