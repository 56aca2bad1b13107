//! Session configuration.

use std::time::Duration;

use crate::error::{Result, VoxlinkError};

/// Policy deciding when a spoken input turn is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDetection {
    /// The server detects end of speech (server VAD); the coordinator never
    /// sends explicit commit or response-create messages.
    ServerVad,
    /// The caller decides; the coordinator commits the input buffer and
    /// requests a response when capture ends or the session is stopped.
    Manual,
}

/// How long the receive loop stays alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLifetime {
    /// Close the session after the first completed response.
    SingleTurn,
    /// Keep receiving until the caller stops the session or the transport
    /// closes.
    MultiTurn,
}

/// Configuration for a streaming voice session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub turn_detection: TurnDetection,
    /// Model used for server-side transcription of input audio, e.g.
    /// `whisper-1`. `None` disables input transcription.
    pub transcription_model: Option<String>,
    /// Sample rate of audio produced by the capture source.
    pub capture_rate_hz: u32,
    /// Sample rate audio is resampled to before transmission.
    pub send_rate_hz: u32,
    /// Sample rate of audio received from the server.
    pub receive_rate_hz: u32,
    /// Duration of each outbound audio frame.
    pub chunk_ms: u32,
    /// Bounded wait for the first response activity after a commit. Expiry is
    /// surfaced as a non-fatal timeout, never an abort.
    pub response_timeout: Duration,
    pub lifetime: SessionLifetime,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turn_detection: TurnDetection::ServerVad,
            transcription_model: Some("whisper-1".to_string()),
            capture_rate_hz: 16_000,
            send_rate_hz: 16_000,
            receive_rate_hz: 24_000,
            chunk_ms: 100,
            response_timeout: Duration::from_secs(30),
            lifetime: SessionLifetime::SingleTurn,
        }
    }
}

impl SessionConfig {
    /// Validate session parameters before any streaming starts.
    pub fn validate(&self) -> Result<()> {
        if self.capture_rate_hz == 0 || self.send_rate_hz == 0 || self.receive_rate_hz == 0 {
            return Err(VoxlinkError::Configuration(
                "Sample rates must be positive".into(),
            ));
        }
        if self.chunk_ms == 0 {
            return Err(VoxlinkError::Configuration(
                "Chunk duration must be positive".into(),
            ));
        }
        if let Some(model) = &self.transcription_model {
            if model.trim().is_empty() {
                return Err(VoxlinkError::Configuration(
                    "Transcription model name cannot be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.turn_detection, TurnDetection::ServerVad);
        assert_eq!(config.send_rate_hz, 16_000);
        assert_eq!(config.receive_rate_hz, 24_000);
        assert_eq!(config.chunk_ms, 100);
    }

    #[test]
    fn zero_rate_is_rejected() {
        let config = SessionConfig {
            send_rate_hz: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VoxlinkError::Configuration(_))
        ));
    }

    #[test]
    fn empty_model_name_is_rejected() {
        let config = SessionConfig {
            transcription_model: Some("  ".into()),
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            transcription_model: None,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_chunk_duration_is_rejected() {
        let config = SessionConfig {
            chunk_ms: 0,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
