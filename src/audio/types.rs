//! PCM format descriptors and frame types.

use crate::error::{Result, VoxlinkError};

/// Linear PCM stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bytes_per_sample: u16,
}

impl PcmFormat {
    /// 16-bit signed little-endian mono at the given rate, the only format
    /// crossing the wire boundary.
    pub const fn pcm16_mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bytes_per_sample: 2,
        }
    }

    /// Bytes occupied by one sample across all channels.
    pub const fn frame_alignment(&self) -> usize {
        self.bytes_per_sample as usize * self.channels as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(VoxlinkError::AudioFormat(
                "Sample rate must be positive".into(),
            ));
        }
        if self.channels == 0 || self.bytes_per_sample == 0 {
            return Err(VoxlinkError::AudioFormat(
                "Channel count and sample width must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// A fixed-duration slice of a PCM byte stream.
///
/// Length is always a whole multiple of the format's frame alignment; the
/// chunker enforces this for every frame including the final short one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFrame<'a> {
    pub bytes: &'a [u8],
    pub format: PcmFormat,
}

impl AudioFrame<'_> {
    pub fn sample_count(&self) -> usize {
        self.bytes.len() / self.format.frame_alignment()
    }

    pub fn duration_ms(&self) -> f64 {
        self.sample_count() as f64 * 1000.0 / self.format.sample_rate as f64
    }
}

/// Decode little-endian 16-bit PCM bytes into samples.
///
/// A trailing odd byte is dropped rather than misread.
pub fn pcm16_bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode 16-bit PCM samples as little-endian bytes.
pub fn pcm16_samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm16_round_trips_through_bytes() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN, 12345];
        let bytes = pcm16_samples_to_bytes(&samples);
        assert_eq!(bytes.len(), samples.len() * 2);
        assert_eq!(pcm16_bytes_to_samples(&bytes), samples);
    }

    #[test]
    fn trailing_odd_byte_is_dropped() {
        let samples = pcm16_bytes_to_samples(&[0x01, 0x02, 0x03]);
        assert_eq!(samples, vec![0x0201]);
    }

    #[test]
    fn frame_duration_reflects_format() {
        let format = PcmFormat::pcm16_mono(16_000);
        let bytes = vec![0u8; 3200];
        let frame = AudioFrame {
            bytes: &bytes,
            format,
        };
        assert_eq!(frame.sample_count(), 1600);
        assert!((frame.duration_ms() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_formats_are_rejected() {
        assert!(PcmFormat::pcm16_mono(0).validate().is_err());
        let format = PcmFormat {
            sample_rate: 16_000,
            channels: 0,
            bytes_per_sample: 2,
        };
        assert!(format.validate().is_err());
        assert!(PcmFormat::pcm16_mono(16_000).validate().is_ok());
    }
}
