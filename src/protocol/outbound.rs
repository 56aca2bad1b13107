//! Client-to-server protocol events.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{SessionConfig, TurnDetection};
use crate::error::Result;

/// A client-to-server event, discriminated by the `type` field on the wire.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Configure the session. Sent exactly once, before any audio.
    #[serde(rename = "session.update")]
    SessionUpdate {
        event_id: String,
        session: SessionUpdateParams,
    },

    /// Append a base64 PCM chunk to the input audio buffer.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { event_id: String, audio: String },

    /// Commit the input buffer: no further audio for this turn.
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit { event_id: String },

    /// Ask the server to generate a response from the committed input.
    #[serde(rename = "response.create")]
    ResponseCreate { event_id: String },
}

/// Session parameters carried by [`ClientEvent::SessionUpdate`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionUpdateParams {
    /// `Some` enables server VAD; explicit `null` on the wire selects manual
    /// turn detection.
    pub turn_detection: Option<TurnDetectionParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputTranscriptionParams>,
    pub input_audio_format: String,
    pub output_audio_format: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TurnDetectionParams {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InputTranscriptionParams {
    pub model: String,
}

impl ClientEvent {
    /// Build the configuration event for a session.
    pub fn session_update(config: &SessionConfig) -> Self {
        let turn_detection = match config.turn_detection {
            TurnDetection::ServerVad => Some(TurnDetectionParams {
                kind: "server_vad".to_string(),
            }),
            TurnDetection::Manual => None,
        };
        let input_audio_transcription =
            config
                .transcription_model
                .as_ref()
                .map(|model| InputTranscriptionParams {
                    model: model.clone(),
                });
        Self::SessionUpdate {
            event_id: next_event_id(),
            session: SessionUpdateParams {
                turn_detection,
                input_audio_transcription,
                input_audio_format: "pcm16".to_string(),
                output_audio_format: "pcm16".to_string(),
            },
        }
    }

    /// Build an audio append event from raw PCM bytes.
    pub fn audio_append(pcm: &[u8]) -> Self {
        Self::InputAudioBufferAppend {
            event_id: next_event_id(),
            audio: BASE64.encode(pcm),
        }
    }

    pub fn commit() -> Self {
        Self::InputAudioBufferCommit {
            event_id: next_event_id(),
        }
    }

    pub fn response_create() -> Self {
        Self::ResponseCreate {
            event_id: next_event_id(),
        }
    }

    /// The wire discriminant for this event.
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::InputAudioBufferCommit { .. } => "input_audio_buffer.commit",
            Self::ResponseCreate { .. } => "response.create",
        }
    }

    /// Serialize to the wire message.
    pub fn to_message(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn next_event_id() -> String {
    format!("evt_{}", Uuid::new_v4().simple())
}
