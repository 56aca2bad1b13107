//! Per-item delta aggregation.
//!
//! Streamed deltas arrive keyed by response and item identifiers, interleaved
//! across items and content channels. The aggregator owns the partial
//! accumulators and turns each channel's delta sequence into exactly one
//! completed [`Artifact`] when the matching done event arrives.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{Result, VoxlinkError};

/// What kind of completed payload an artifact carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Text,
    Audio,
    Transcript,
    ToolCallArguments,
    /// Transcript of a user-submitted input item, produced asynchronously.
    InputTranscript,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactPayload {
    Text(String),
    Audio(Vec<u8>),
}

/// A completed output emitted once per finalized accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub item_id: String,
    pub response_id: Option<String>,
    pub kind: ArtifactKind,
    pub payload: ArtifactPayload,
    /// Set when the artifact is an error marker (e.g. failed transcription)
    /// rather than real content.
    pub error: Option<String>,
}

/// Lifecycle of a server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    Created,
    Streaming,
    Completed,
}

/// One server-generated response and the items it produced, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord {
    pub id: String,
    pub state: ResponseState,
    pub item_ids: Vec<String>,
}

/// Content channels within one item. Deltas are ordered per channel; the
/// aggregator never reorders across channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Text,
    Audio,
    Transcript,
    Arguments,
}

impl Channel {
    fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
            Self::Transcript => "transcript",
            Self::Arguments => "arguments",
        }
    }
}

/// Partial accumulators for one streamed item.
///
/// Each channel is append-only until its done event, then immutable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemRecord {
    pub id: String,
    pub response_id: Option<String>,
    text: Option<String>,
    audio: Option<Vec<u8>>,
    transcript: Option<String>,
    arguments: Option<String>,
    text_done: bool,
    audio_done: bool,
    transcript_done: bool,
    arguments_done: bool,
}

impl ItemRecord {
    fn new(id: &str, response_id: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            response_id: response_id.map(ToString::to_string),
            ..Self::default()
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn audio(&self) -> Option<&[u8]> {
        self.audio.as_deref()
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    pub fn arguments(&self) -> Option<&str> {
        self.arguments.as_deref()
    }

    fn done(&self, channel: Channel) -> bool {
        match channel {
            Channel::Text => self.text_done,
            Channel::Audio => self.audio_done,
            Channel::Transcript => self.transcript_done,
            Channel::Arguments => self.arguments_done,
        }
    }

    fn guard_open(&self, channel: Channel) -> Result<()> {
        if self.done(channel) {
            return Err(VoxlinkError::Protocol(format!(
                "Delta for finalized {} channel of item {}",
                channel.name(),
                self.id
            )));
        }
        Ok(())
    }

    fn finalize(&mut self, channel: Channel, final_value: Option<ArtifactPayload>) -> Option<Artifact> {
        if self.done(channel) {
            return None;
        }
        let payload = match channel {
            Channel::Text => {
                self.text_done = true;
                merge_text(self.text.take(), final_value)
            }
            Channel::Audio => {
                self.audio_done = true;
                self.audio.take().map(ArtifactPayload::Audio)
            }
            Channel::Transcript => {
                self.transcript_done = true;
                merge_text(self.transcript.take(), final_value)
            }
            Channel::Arguments => {
                self.arguments_done = true;
                merge_text(self.arguments.take(), final_value)
            }
        }?;
        let kind = match channel {
            Channel::Text => ArtifactKind::Text,
            Channel::Audio => ArtifactKind::Audio,
            Channel::Transcript => ArtifactKind::Transcript,
            Channel::Arguments => ArtifactKind::ToolCallArguments,
        };
        Some(Artifact {
            item_id: self.id.clone(),
            response_id: self.response_id.clone(),
            kind,
            payload,
            error: None,
        })
    }
}

/// Prefer the deltas accumulated in arrival order; fall back to the final
/// value the done event carries when no deltas were seen.
fn merge_text(
    accumulated: Option<String>,
    final_value: Option<ArtifactPayload>,
) -> Option<ArtifactPayload> {
    match accumulated {
        Some(text) => Some(ArtifactPayload::Text(text)),
        None => final_value,
    }
}

/// A user-submitted item echoed back by the server.
///
/// Resolved only once the corresponding transcription completed or failed
/// event arrives; consumers must not read the transcript before then.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputItemRecord {
    pub id: String,
    pub previous_item_id: Option<String>,
    pub audio_start_ms: Option<u64>,
    pub audio_end_ms: Option<u64>,
    pub transcript: Option<String>,
    pub failure: Option<String>,
}

impl InputItemRecord {
    pub fn is_resolved(&self) -> bool {
        self.transcript.is_some() || self.failure.is_some()
    }
}

/// Accumulates streamed deltas per item and response identifier.
#[derive(Debug, Default)]
pub struct ItemAggregator {
    responses: HashMap<String, ResponseRecord>,
    items: HashMap<String, ItemRecord>,
    input_items: HashMap<String, InputItemRecord>,
}

impl ItemAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn response(&self, id: &str) -> Option<&ResponseRecord> {
        self.responses.get(id)
    }

    pub fn item(&self, id: &str) -> Option<&ItemRecord> {
        self.items.get(id)
    }

    pub fn input_item(&self, id: &str) -> Option<&InputItemRecord> {
        self.input_items.get(id)
    }

    pub fn response_created(&mut self, id: &str) {
        self.responses
            .entry(id.to_string())
            .or_insert_with(|| ResponseRecord {
                id: id.to_string(),
                state: ResponseState::Created,
                item_ids: Vec::new(),
            });
    }

    /// Complete a response and hand it off by reference count. The record
    /// leaves the aggregator; it is freed when the last consumer drops it.
    pub fn response_done(&mut self, id: &str) -> Arc<ResponseRecord> {
        let mut record = self.responses.remove(id).unwrap_or_else(|| ResponseRecord {
            id: id.to_string(),
            state: ResponseState::Created,
            item_ids: Vec::new(),
        });
        record.state = ResponseState::Completed;
        Arc::new(record)
    }

    pub fn output_item_added(&mut self, response_id: &str, item_id: &str) {
        self.response_created(response_id);
        if let Some(response) = self.responses.get_mut(response_id) {
            response.state = ResponseState::Streaming;
            if !response.item_ids.iter().any(|id| id == item_id) {
                response.item_ids.push(item_id.to_string());
            }
        }
        self.items
            .entry(item_id.to_string())
            .or_insert_with(|| ItemRecord::new(item_id, Some(response_id)));
    }

    fn item_mut(&mut self, item_id: &str, response_id: Option<&str>) -> &mut ItemRecord {
        self.items
            .entry(item_id.to_string())
            .or_insert_with(|| ItemRecord::new(item_id, response_id))
    }

    pub fn text_delta(&mut self, response_id: &str, item_id: &str, delta: &str) -> Result<()> {
        let item = self.item_mut(item_id, Some(response_id));
        item.guard_open(Channel::Text)?;
        item.text.get_or_insert_with(String::new).push_str(delta);
        Ok(())
    }

    pub fn text_done(&mut self, response_id: &str, item_id: &str, text: &str) -> Option<Artifact> {
        self.item_mut(item_id, Some(response_id)).finalize(
            Channel::Text,
            Some(ArtifactPayload::Text(text.to_string())),
        )
    }

    /// Decode and append a base64 audio delta, returning the decoded bytes so
    /// the caller can also stream them to playback.
    pub fn audio_delta(
        &mut self,
        response_id: &str,
        item_id: &str,
        delta_b64: &str,
    ) -> Result<Vec<u8>> {
        let decoded = BASE64.decode(delta_b64).map_err(|error| {
            VoxlinkError::Protocol(format!("Undecodable audio delta for item {item_id}: {error}"))
        })?;
        let item = self.item_mut(item_id, Some(response_id));
        item.guard_open(Channel::Audio)?;
        item.audio
            .get_or_insert_with(Vec::new)
            .extend_from_slice(&decoded);
        Ok(decoded)
    }

    pub fn audio_done(&mut self, response_id: &str, item_id: &str) -> Option<Artifact> {
        self.item_mut(item_id, Some(response_id))
            .finalize(Channel::Audio, None)
    }

    pub fn transcript_delta(
        &mut self,
        response_id: &str,
        item_id: &str,
        delta: &str,
    ) -> Result<()> {
        let item = self.item_mut(item_id, Some(response_id));
        item.guard_open(Channel::Transcript)?;
        item.transcript
            .get_or_insert_with(String::new)
            .push_str(delta);
        Ok(())
    }

    pub fn transcript_done(
        &mut self,
        response_id: &str,
        item_id: &str,
        transcript: &str,
    ) -> Option<Artifact> {
        self.item_mut(item_id, Some(response_id)).finalize(
            Channel::Transcript,
            Some(ArtifactPayload::Text(transcript.to_string())),
        )
    }

    pub fn arguments_delta(
        &mut self,
        response_id: &str,
        item_id: &str,
        delta: &str,
    ) -> Result<()> {
        let item = self.item_mut(item_id, Some(response_id));
        item.guard_open(Channel::Arguments)?;
        item.arguments
            .get_or_insert_with(String::new)
            .push_str(delta);
        Ok(())
    }

    pub fn arguments_done(
        &mut self,
        response_id: &str,
        item_id: &str,
        arguments: &str,
    ) -> Option<Artifact> {
        self.item_mut(item_id, Some(response_id)).finalize(
            Channel::Arguments,
            Some(ArtifactPayload::Text(arguments.to_string())),
        )
    }

    fn input_item_mut(&mut self, item_id: &str) -> &mut InputItemRecord {
        self.input_items
            .entry(item_id.to_string())
            .or_insert_with(|| InputItemRecord {
                id: item_id.to_string(),
                ..InputItemRecord::default()
            })
    }

    pub fn input_committed(&mut self, item_id: &str, previous_item_id: Option<&str>) {
        let record = self.input_item_mut(item_id);
        record.previous_item_id = previous_item_id.map(ToString::to_string);
    }

    pub fn speech_started(&mut self, item_id: &str, audio_start_ms: Option<u64>) {
        self.input_item_mut(item_id).audio_start_ms = audio_start_ms;
    }

    pub fn speech_stopped(&mut self, item_id: &str, audio_end_ms: Option<u64>) {
        self.input_item_mut(item_id).audio_end_ms = audio_end_ms;
    }

    /// Resolve an input item with its transcript.
    pub fn transcription_completed(&mut self, item_id: &str, transcript: &str) -> Artifact {
        let record = self.input_item_mut(item_id);
        record.transcript = Some(transcript.to_string());
        Artifact {
            item_id: item_id.to_string(),
            response_id: None,
            kind: ArtifactKind::InputTranscript,
            payload: ArtifactPayload::Text(transcript.to_string()),
            error: None,
        }
    }

    /// Resolve an input item with an error marker. Isolated to this item;
    /// every other accumulator is untouched.
    pub fn transcription_failed(&mut self, item_id: &str, message: &str) -> Artifact {
        let record = self.input_item_mut(item_id);
        record.failure = Some(message.to_string());
        Artifact {
            item_id: item_id.to_string(),
            response_id: None,
            kind: ArtifactKind::InputTranscript,
            payload: ArtifactPayload::Text(String::new()),
            error: Some(message.to_string()),
        }
    }

    pub fn item_deleted(&mut self, item_id: &str) {
        self.items.remove(item_id);
        self.input_items.remove(item_id);
    }

    /// Flush every partial accumulator in its current state.
    ///
    /// Used on close and on abort paths: drain, don't discard.
    pub fn drain(&mut self) -> Vec<Artifact> {
        let mut item_ids: Vec<String> = self.items.keys().cloned().collect();
        item_ids.sort();

        let mut artifacts = Vec::new();
        for item_id in item_ids {
            if let Some(item) = self.items.get_mut(&item_id) {
                for channel in [
                    Channel::Text,
                    Channel::Audio,
                    Channel::Transcript,
                    Channel::Arguments,
                ] {
                    if let Some(artifact) = item.finalize(channel, None) {
                        artifacts.push(artifact);
                    }
                }
            }
        }
        self.items.clear();
        self.responses.clear();
        artifacts
    }
}
