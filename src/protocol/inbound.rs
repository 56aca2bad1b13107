//! Server-to-client protocol events.
//!
//! The event table is closed over the kinds the server is documented to send;
//! anything else lands in [`ServerEvent::Unknown`] with its payload intact so
//! new server event kinds never break a running session.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, VoxlinkError};

/// A server-to-client event, discriminated by the `type` field on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated { session: SessionInfo },

    #[serde(rename = "session.updated")]
    SessionUpdated { session: Option<SessionInfo> },

    #[serde(rename = "error")]
    Error { error: ErrorInfo },

    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted {
        item_id: String,
        previous_item_id: Option<String>,
    },

    #[serde(rename = "input_audio_buffer.cleared")]
    InputAudioBufferCleared {},

    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted {
        item_id: String,
        audio_start_ms: Option<u64>,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioBufferSpeechStopped {
        item_id: String,
        audio_end_ms: Option<u64>,
    },

    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated {
        item: ConversationItem,
        previous_item_id: Option<String>,
    },

    #[serde(rename = "conversation.item.truncated")]
    ConversationItemTruncated {
        item_id: String,
        content_index: Option<u32>,
        audio_end_ms: Option<u64>,
    },

    #[serde(rename = "conversation.item.deleted")]
    ConversationItemDeleted { item_id: String },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted {
        item_id: String,
        content_index: Option<u32>,
        transcript: String,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    InputAudioTranscriptionFailed {
        item_id: String,
        error: Option<ErrorInfo>,
    },

    #[serde(rename = "response.created")]
    ResponseCreated { response: ResponseInfo },

    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseInfo },

    #[serde(rename = "response.output_item.added")]
    ResponseOutputItemAdded {
        response_id: String,
        output_index: Option<u32>,
        item: ConversationItem,
    },

    #[serde(rename = "response.output_item.done")]
    ResponseOutputItemDone {
        response_id: String,
        item: ConversationItem,
    },

    #[serde(rename = "response.content_part.added")]
    ResponseContentPartAdded {
        response_id: String,
        item_id: String,
        content_index: Option<u32>,
        part: Option<Value>,
    },

    #[serde(rename = "response.content_part.done")]
    ResponseContentPartDone {
        response_id: String,
        item_id: String,
        content_index: Option<u32>,
        part: Option<Value>,
    },

    #[serde(rename = "response.text.delta")]
    ResponseTextDelta {
        response_id: String,
        item_id: String,
        content_index: Option<u32>,
        delta: String,
    },

    #[serde(rename = "response.text.done")]
    ResponseTextDone {
        response_id: String,
        item_id: String,
        content_index: Option<u32>,
        text: String,
    },

    #[serde(rename = "response.audio_transcript.delta")]
    ResponseAudioTranscriptDelta {
        response_id: String,
        item_id: String,
        content_index: Option<u32>,
        delta: String,
    },

    #[serde(rename = "response.audio_transcript.done")]
    ResponseAudioTranscriptDone {
        response_id: String,
        item_id: String,
        content_index: Option<u32>,
        transcript: String,
    },

    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta {
        response_id: String,
        item_id: String,
        content_index: Option<u32>,
        /// Base64-encoded PCM; decoded by the aggregator on arrival.
        delta: String,
    },

    #[serde(rename = "response.audio.done")]
    ResponseAudioDone {
        response_id: String,
        item_id: String,
        content_index: Option<u32>,
    },

    #[serde(rename = "response.function_call_arguments.delta")]
    ResponseFunctionCallArgumentsDelta {
        response_id: String,
        item_id: String,
        call_id: Option<String>,
        delta: String,
    },

    #[serde(rename = "response.function_call_arguments.done")]
    ResponseFunctionCallArgumentsDone {
        response_id: String,
        item_id: String,
        call_id: Option<String>,
        arguments: String,
    },

    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated { rate_limits: Vec<RateLimit> },

    /// Catch-all for well-formed events with an unrecognized tag.
    #[serde(skip)]
    Unknown { event_type: String, payload: Value },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorInfo {
    pub message: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl ErrorInfo {
    pub fn describe(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "unspecified server error".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConversationItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseInfo {
    pub id: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RateLimit {
    pub name: String,
    pub limit: Option<f64>,
    pub remaining: Option<f64>,
    pub reset_seconds: Option<f64>,
}

impl ServerEvent {
    /// Parse a raw wire message. Fails only when the text is not JSON or
    /// carries no `type` discriminant; unrecognized tags succeed as
    /// [`ServerEvent::Unknown`].
    pub fn from_message(text: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(text)
            .map_err(|error| VoxlinkError::Protocol(format!("Unparseable event: {error}")))?;
        Self::from_payload(payload)
    }

    /// Classify an already-parsed payload.
    pub fn from_payload(payload: Value) -> Result<Self> {
        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                VoxlinkError::Protocol("Event is missing its type discriminant".into())
            })?
            .to_string();

        match serde_json::from_value::<ServerEvent>(payload.clone()) {
            Ok(event) => Ok(event),
            // A known tag with an unexpected shape is treated the same as a
            // foreign tag: routed to the catch-all, never fatal.
            Err(_) => Ok(ServerEvent::Unknown {
                event_type,
                payload,
            }),
        }
    }

    /// The wire discriminant of this event.
    pub fn event_type(&self) -> &str {
        match self {
            Self::SessionCreated { .. } => "session.created",
            Self::SessionUpdated { .. } => "session.updated",
            Self::Error { .. } => "error",
            Self::InputAudioBufferCommitted { .. } => "input_audio_buffer.committed",
            Self::InputAudioBufferCleared {} => "input_audio_buffer.cleared",
            Self::InputAudioBufferSpeechStarted { .. } => "input_audio_buffer.speech_started",
            Self::InputAudioBufferSpeechStopped { .. } => "input_audio_buffer.speech_stopped",
            Self::ConversationItemCreated { .. } => "conversation.item.created",
            Self::ConversationItemTruncated { .. } => "conversation.item.truncated",
            Self::ConversationItemDeleted { .. } => "conversation.item.deleted",
            Self::InputAudioTranscriptionCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            Self::InputAudioTranscriptionFailed { .. } => {
                "conversation.item.input_audio_transcription.failed"
            }
            Self::ResponseCreated { .. } => "response.created",
            Self::ResponseDone { .. } => "response.done",
            Self::ResponseOutputItemAdded { .. } => "response.output_item.added",
            Self::ResponseOutputItemDone { .. } => "response.output_item.done",
            Self::ResponseContentPartAdded { .. } => "response.content_part.added",
            Self::ResponseContentPartDone { .. } => "response.content_part.done",
            Self::ResponseTextDelta { .. } => "response.text.delta",
            Self::ResponseTextDone { .. } => "response.text.done",
            Self::ResponseAudioTranscriptDelta { .. } => "response.audio_transcript.delta",
            Self::ResponseAudioTranscriptDone { .. } => "response.audio_transcript.done",
            Self::ResponseAudioDelta { .. } => "response.audio.delta",
            Self::ResponseAudioDone { .. } => "response.audio.done",
            Self::ResponseFunctionCallArgumentsDelta { .. } => {
                "response.function_call_arguments.delta"
            }
            Self::ResponseFunctionCallArgumentsDone { .. } => {
                "response.function_call_arguments.done"
            }
            Self::RateLimitsUpdated { .. } => "rate_limits.updated",
            Self::Unknown { event_type, .. } => event_type,
        }
    }
}
