//! Inbound event classification and routing.

use std::sync::Arc;

use tracing::{debug, warn};

use super::aggregate::{Artifact, ItemAggregator, ResponseRecord};
use super::observer::SessionObserver;
use crate::protocol::inbound::ServerEvent;

/// Control-flow signal handed back to the coordinator after each event.
#[derive(Debug, Clone)]
pub enum Flow {
    Continue,
    /// A response finished; the completed record is handed off by reference
    /// count.
    ResponseCompleted(Arc<ResponseRecord>),
}

/// Everything one dispatched event produced.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub flow: Flow,
    /// Artifacts completed by this event, ready for finalization.
    pub artifacts: Vec<Artifact>,
    /// Decoded audio delta to stream to playback, when the event carried one.
    pub playback: Option<Vec<u8>>,
}

impl DispatchOutcome {
    fn passthrough() -> Self {
        Self {
            flow: Flow::Continue,
            artifacts: Vec::new(),
            playback: None,
        }
    }
}

/// Classifies inbound events and routes them to the aggregation state.
///
/// Unrecognized events are logged and skipped, never fatal. The observer is
/// notified for every event before classification.
pub struct EventDispatcher {
    aggregator: ItemAggregator,
    observer: Arc<dyn SessionObserver>,
}

impl EventDispatcher {
    pub fn new(observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            aggregator: ItemAggregator::new(),
            observer,
        }
    }

    pub fn aggregator(&self) -> &ItemAggregator {
        &self.aggregator
    }

    /// Flush all partial accumulators (close and abort paths).
    pub fn drain(&mut self) -> Vec<Artifact> {
        self.aggregator.drain()
    }

    /// Route one inbound event.
    pub fn dispatch(&mut self, event: &ServerEvent) -> DispatchOutcome {
        self.observer.on_event(event);
        let mut outcome = DispatchOutcome::passthrough();

        match event {
            ServerEvent::SessionCreated { session } => {
                debug!(session_id = %session.id, "session created");
            }
            ServerEvent::SessionUpdated { session } => {
                let session_id = session.as_ref().map(|s| s.id.as_str()).unwrap_or("unknown");
                debug!(session_id, "session updated");
            }
            ServerEvent::Error { error } => {
                // Server-reported errors are informational at this layer;
                // fatal conditions show up as transport failures.
                warn!(message = %error.describe(), "server reported an error");
            }
            ServerEvent::InputAudioBufferCommitted {
                item_id,
                previous_item_id,
            } => {
                self.aggregator
                    .input_committed(item_id, previous_item_id.as_deref());
            }
            ServerEvent::InputAudioBufferCleared {} => {
                debug!("input audio buffer cleared");
            }
            ServerEvent::InputAudioBufferSpeechStarted {
                item_id,
                audio_start_ms,
            } => {
                self.aggregator.speech_started(item_id, *audio_start_ms);
            }
            ServerEvent::InputAudioBufferSpeechStopped {
                item_id,
                audio_end_ms,
            } => {
                self.aggregator.speech_stopped(item_id, *audio_end_ms);
            }
            ServerEvent::ConversationItemCreated {
                item,
                previous_item_id,
            } => {
                if item.role.as_deref() == Some("user") {
                    self.aggregator
                        .input_committed(&item.id, previous_item_id.as_deref());
                }
                debug!(item_id = %item.id, "conversation item created");
            }
            ServerEvent::ConversationItemTruncated {
                item_id,
                audio_end_ms,
                ..
            } => {
                debug!(item_id, audio_end_ms, "conversation item truncated");
            }
            ServerEvent::ConversationItemDeleted { item_id } => {
                self.aggregator.item_deleted(item_id);
            }
            ServerEvent::InputAudioTranscriptionCompleted {
                item_id, transcript, ..
            } => {
                outcome
                    .artifacts
                    .push(self.aggregator.transcription_completed(item_id, transcript));
            }
            ServerEvent::InputAudioTranscriptionFailed { item_id, error } => {
                let message = error
                    .as_ref()
                    .map(|e| e.describe())
                    .unwrap_or_else(|| "transcription failed".to_string());
                warn!(item_id, %message, "input transcription failed");
                outcome
                    .artifacts
                    .push(self.aggregator.transcription_failed(item_id, &message));
            }
            ServerEvent::ResponseCreated { response } => {
                self.aggregator.response_created(&response.id);
            }
            ServerEvent::ResponseDone { response } => {
                let record = self.aggregator.response_done(&response.id);
                outcome.flow = Flow::ResponseCompleted(record);
            }
            ServerEvent::ResponseOutputItemAdded {
                response_id, item, ..
            } => {
                self.aggregator.output_item_added(response_id, &item.id);
            }
            ServerEvent::ResponseOutputItemDone {
                response_id, item, ..
            } => {
                debug!(response_id, item_id = %item.id, "output item done");
            }
            ServerEvent::ResponseContentPartAdded {
                response_id,
                item_id,
                ..
            }
            | ServerEvent::ResponseContentPartDone {
                response_id,
                item_id,
                ..
            } => {
                debug!(response_id, item_id, "content part boundary");
            }
            ServerEvent::ResponseTextDelta {
                response_id,
                item_id,
                delta,
                ..
            } => {
                if let Err(error) = self.aggregator.text_delta(response_id, item_id, delta) {
                    warn!(item_id, %error, "dropping text delta");
                }
            }
            ServerEvent::ResponseTextDone {
                response_id,
                item_id,
                text,
                ..
            } => {
                outcome
                    .artifacts
                    .extend(self.aggregator.text_done(response_id, item_id, text));
            }
            ServerEvent::ResponseAudioTranscriptDelta {
                response_id,
                item_id,
                delta,
                ..
            } => {
                if let Err(error) = self.aggregator.transcript_delta(response_id, item_id, delta)
                {
                    warn!(item_id, %error, "dropping transcript delta");
                }
            }
            ServerEvent::ResponseAudioTranscriptDone {
                response_id,
                item_id,
                transcript,
                ..
            } => {
                outcome.artifacts.extend(self.aggregator.transcript_done(
                    response_id,
                    item_id,
                    transcript,
                ));
            }
            ServerEvent::ResponseAudioDelta {
                response_id,
                item_id,
                delta,
                ..
            } => match self.aggregator.audio_delta(response_id, item_id, delta) {
                Ok(decoded) => outcome.playback = Some(decoded),
                Err(error) => warn!(item_id, %error, "dropping audio delta"),
            },
            ServerEvent::ResponseAudioDone {
                response_id,
                item_id,
                ..
            } => {
                outcome
                    .artifacts
                    .extend(self.aggregator.audio_done(response_id, item_id));
            }
            ServerEvent::ResponseFunctionCallArgumentsDelta {
                response_id,
                item_id,
                delta,
                ..
            } => {
                if let Err(error) = self.aggregator.arguments_delta(response_id, item_id, delta) {
                    warn!(item_id, %error, "dropping arguments delta");
                }
            }
            ServerEvent::ResponseFunctionCallArgumentsDone {
                response_id,
                item_id,
                arguments,
                ..
            } => {
                outcome.artifacts.extend(self.aggregator.arguments_done(
                    response_id,
                    item_id,
                    arguments,
                ));
            }
            ServerEvent::RateLimitsUpdated { rate_limits } => {
                debug!(limits = rate_limits.len(), "rate limits updated");
            }
            ServerEvent::Unknown { event_type, .. } => {
                debug!(event_type, "ignoring unknown event");
            }
        }

        outcome
    }
}
