//! Band-limited PCM resampling.

use crate::error::{Result, VoxlinkError};

/// Half-width of the windowed-sinc kernel, in input samples.
const KERNEL_HALF_WIDTH: isize = 16;

/// Resample a 16-bit PCM sample sequence from `native_hz` to `target_hz`.
///
/// Uses windowed-sinc (Hann) interpolation with the low-pass cutoff at the
/// lower of the two Nyquist frequencies, so downsampling does not alias.
/// Output length is exactly `round(len * target / native)`. Deterministic for
/// identical inputs; an empty input yields an empty output.
pub fn resample(samples: &[i16], native_hz: u32, target_hz: u32) -> Result<Vec<i16>> {
    if native_hz == 0 || target_hz == 0 {
        return Err(VoxlinkError::AudioFormat(format!(
            "Sample rates must be positive, got {native_hz} -> {target_hz}"
        )));
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    if native_hz == target_hz {
        return Ok(samples.to_vec());
    }

    let ratio = target_hz as f64 / native_hz as f64;
    let output_len = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);

    // Cutoff in cycles per input sample: 0.5 for upsampling, scaled down when
    // decimating so frequencies above the target Nyquist are suppressed.
    let cutoff = 0.5 * ratio.min(1.0);

    for output_index in 0..output_len {
        let source_position = output_index as f64 / ratio;
        let center = source_position.floor() as isize;

        let mut accumulated = 0.0f64;
        let mut weight_sum = 0.0f64;
        for tap in (center - KERNEL_HALF_WIDTH + 1)..=(center + KERNEL_HALF_WIDTH) {
            if tap < 0 || tap >= samples.len() as isize {
                continue;
            }
            let distance = source_position - tap as f64;
            let weight = windowed_sinc(distance, cutoff);
            accumulated += samples[tap as usize] as f64 * weight;
            weight_sum += weight;
        }

        // Normalizing by the window weight keeps constant signals flat near
        // the stream edges where the kernel is truncated.
        let value = if weight_sum.abs() > f64::EPSILON {
            accumulated / weight_sum
        } else {
            0.0
        };
        output.push(value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
    }

    Ok(output)
}

fn windowed_sinc(distance: f64, cutoff: f64) -> f64 {
    let normalized = distance / KERNEL_HALF_WIDTH as f64;
    if normalized.abs() >= 1.0 {
        return 0.0;
    }
    let window = 0.5 * (1.0 + (std::f64::consts::PI * normalized).cos());
    2.0 * cutoff * sinc(2.0 * cutoff * distance) * window
}

fn sinc(t: f64) -> f64 {
    if t.abs() < 1e-12 {
        1.0
    } else {
        let pt = std::f64::consts::PI * t;
        pt.sin() / pt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_length_is_exactly_rounded() {
        for (native, target, len) in [
            (24_000u32, 16_000u32, 2400usize),
            (44_100, 16_000, 4410),
            (16_000, 24_000, 160),
            (48_000, 16_000, 481),
            (8_000, 16_000, 3),
        ] {
            let samples = vec![0i16; len];
            let resampled = resample(&samples, native, target).expect("resample should succeed");
            let expected = (len as f64 * target as f64 / native as f64).round() as usize;
            assert_eq!(resampled.len(), expected, "{native} -> {target} with {len}");
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let resampled = resample(&[], 44_100, 16_000).expect("resample should succeed");
        assert!(resampled.is_empty());
    }

    #[test]
    fn zero_rate_is_an_audio_format_error() {
        assert!(matches!(
            resample(&[1, 2, 3], 0, 16_000),
            Err(VoxlinkError::AudioFormat(_))
        ));
        assert!(matches!(
            resample(&[1, 2, 3], 16_000, 0),
            Err(VoxlinkError::AudioFormat(_))
        ));
    }

    #[test]
    fn identity_rate_returns_input_unchanged() {
        let samples = vec![5i16, -7, 200, -32_000];
        let resampled = resample(&samples, 16_000, 16_000).expect("resample should succeed");
        assert_eq!(resampled, samples);
    }

    #[test]
    fn constant_signal_survives_resampling() {
        let samples = vec![1000i16; 2400];
        let resampled = resample(&samples, 24_000, 16_000).expect("resample should succeed");
        // Interior samples of a DC signal must stay flat within rounding.
        for &sample in &resampled[8..resampled.len() - 8] {
            assert!((sample - 1000).abs() <= 1, "got {sample}");
        }
    }

    #[test]
    fn resampling_is_deterministic() {
        let samples: Vec<i16> = (0..2400).map(|i| ((i * 37) % 20_000) as i16 - 10_000).collect();
        let first = resample(&samples, 24_000, 16_000).expect("resample should succeed");
        let second = resample(&samples, 24_000, 16_000).expect("resample should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn silence_stays_silent() {
        let samples = vec![0i16; 1600];
        let resampled = resample(&samples, 16_000, 24_000).expect("resample should succeed");
        assert!(resampled.iter().all(|&s| s == 0));
    }
}
