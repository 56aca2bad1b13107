//! Session lifecycle and the streaming pipeline.
//!
//! One coordinator supervises two concurrent directions: an outbound task
//! draining the capture source (chunk, resample, send) and an inbound loop
//! dispatching server events into the aggregator. Completed artifacts are
//! finalized on spawned tasks collected in a [`JoinSet`]; the close sequence
//! joins them all so nothing is dropped on shutdown.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use super::dispatch::{EventDispatcher, Flow};
use super::observer::{NullObserver, SessionObserver};
use crate::audio::{pcm16_bytes_to_samples, pcm16_samples_to_bytes, resample, AudioChunker, PcmFormat};
use crate::config::{SessionConfig, SessionLifetime, TurnDetection};
use crate::error::{Result, VoxlinkError};
use crate::io::{ArtifactSink, CaptureSource, PlaybackSink, TransportLink};
use crate::protocol::inbound::ServerEvent;
use crate::protocol::outbound::ClientEvent;
use crate::session::aggregate::Artifact;

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Configuring,
    Streaming,
    Closing,
    Closed,
    Failed,
}

/// Terminal summary returned to the caller on any non-fatal path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResult {
    pub responses_completed: usize,
    /// The bounded post-commit wait expired with no response activity.
    pub timed_out: bool,
    /// The outbound task failed without aborting the session (audio format
    /// errors are fatal to that direction only).
    pub outbound_failure: Option<String>,
}

/// Explicit start/stop handle for a running session.
///
/// The only mutation point for caller-initiated shutdown; pass it wherever
/// the stop decision is made instead of sharing ambient flags.
#[derive(Clone)]
pub struct SessionHandle {
    stop: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    /// Request the cancellation sequence: stop capture, flush buffered audio,
    /// commit in manual mode, close the transport, await finalization.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

/// Orchestrates the configuration handshake, the audio ingestion loop, and
/// inbound event dispatch for one session.
pub struct SessionCoordinator {
    config: SessionConfig,
    observer: Arc<dyn SessionObserver>,
    stop: Arc<watch::Sender<bool>>,
    state: SessionState,
}

impl SessionCoordinator {
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let (stop, _) = watch::channel(false);
        Ok(Self {
            config,
            observer: Arc::new(NullObserver),
            stop: Arc::new(stop),
            state: SessionState::Idle,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            stop: Arc::clone(&self.stop),
        }
    }

    fn set_state(&mut self, state: SessionState) {
        debug!(?state, "session state");
        self.state = state;
        self.observer.on_state(state);
    }

    /// Run one session over the given collaborators until it closes.
    ///
    /// Fatal transport failures return `Err` after a best-effort flush of
    /// partial artifacts; every other path returns a [`SessionResult`].
    pub async fn run(
        &mut self,
        capture: Box<dyn CaptureSource>,
        link: Box<dyn TransportLink>,
        mut playback: Box<dyn PlaybackSink>,
        artifacts: Arc<dyn ArtifactSink>,
    ) -> Result<SessionResult> {
        if matches!(
            self.state,
            SessionState::Configuring | SessionState::Streaming | SessionState::Closing
        ) {
            return Err(VoxlinkError::InvalidState(
                "Session is already running".into(),
            ));
        }
        self.stop.send_replace(false);

        self.set_state(SessionState::Configuring);
        let (sender, mut receiver) = link.split();
        let (out_tx, out_rx) = mpsc::channel::<String>(64);
        let writer = spawn_writer(sender, out_rx);

        // The configuration event goes through the same single-writer queue
        // as audio, so queue order alone guarantees it reaches the wire
        // before the first frame.
        if let Err(error) = enqueue(&out_tx, ClientEvent::session_update(&self.config)).await {
            self.set_state(SessionState::Failed);
            return Err(error);
        }
        self.set_state(SessionState::Streaming);

        let mut outbound = spawn_outbound(
            capture,
            self.config.clone(),
            out_tx.clone(),
            self.stop.subscribe(),
        );

        let mut dispatcher = EventDispatcher::new(Arc::clone(&self.observer));
        let mut finalizers: JoinSet<()> = JoinSet::new();
        let mut stop_rx = self.stop.subscribe();

        let mut outbound_done: Option<Result<bool>> = None;
        let mut deadline: Option<Instant> = None;
        let mut responses_completed = 0usize;
        let mut timed_out = false;
        let mut fatal: Option<VoxlinkError> = None;

        'inbound: loop {
            tokio::select! {
                joined = &mut outbound, if outbound_done.is_none() => {
                    let result = joined.unwrap_or_else(|error| {
                        Err(VoxlinkError::Transport(format!(
                            "Outbound task failed: {error}"
                        )))
                    });
                    if matches!(result, Ok(true)) {
                        deadline = Some(Instant::now() + self.config.response_timeout);
                    }
                    outbound_done = Some(result);
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        debug!("stop requested");
                        break 'inbound;
                    }
                }
                _ = sleep_until_opt(deadline), if deadline.is_some() => {
                    warn!("no response activity within the post-commit window");
                    timed_out = true;
                    break 'inbound;
                }
                received = receiver.receive() => {
                    match received {
                        Ok(Some(text)) => {
                            let event = match ServerEvent::from_message(&text) {
                                Ok(event) => event,
                                Err(error) => {
                                    // Cannot even classify the frame.
                                    fatal = Some(error);
                                    break 'inbound;
                                }
                            };
                            if deadline.is_some() && event.event_type().starts_with("response.") {
                                deadline = None;
                            }
                            let outcome = dispatcher.dispatch(&event);
                            if let Some(bytes) = outcome.playback {
                                if let Err(error) = playback.write(&bytes).await {
                                    warn!(%error, "playback write failed");
                                }
                            }
                            for artifact in outcome.artifacts {
                                spawn_finalizer(&mut finalizers, &artifacts, artifact);
                            }
                            if let Flow::ResponseCompleted(record) = outcome.flow {
                                responses_completed += 1;
                                debug!(
                                    response_id = %record.id,
                                    items = record.item_ids.len(),
                                    "response completed"
                                );
                                if self.config.lifetime == SessionLifetime::SingleTurn {
                                    break 'inbound;
                                }
                            }
                        }
                        Ok(None) => {
                            debug!("transport closed by peer");
                            break 'inbound;
                        }
                        Err(error) => {
                            fatal = Some(error);
                            break 'inbound;
                        }
                    }
                }
            }
        }

        self.set_state(SessionState::Closing);

        // Wind down the outbound direction if it is still pulling capture.
        let _ = self.stop.send(true);
        let outbound_result = match outbound_done {
            Some(result) => result,
            None => outbound.await.unwrap_or_else(|error| {
                Err(VoxlinkError::Transport(format!(
                    "Outbound task failed: {error}"
                )))
            }),
        };
        let outbound_failure = match outbound_result {
            Ok(_) => None,
            Err(error) => {
                warn!(%error, "outbound task ended in error");
                Some(error.to_string())
            }
        };

        // Drain, don't discard: flush every partial accumulator before the
        // transport goes away.
        for artifact in dispatcher.drain() {
            spawn_finalizer(&mut finalizers, &artifacts, artifact);
        }

        // Close the transport, then hold the join barrier so no artifact is
        // lost.
        drop(out_tx);
        if let Err(error) = writer.await.unwrap_or_else(|error| {
            Err(VoxlinkError::Transport(format!("Writer task failed: {error}")))
        }) {
            if fatal.is_none() {
                fatal = Some(error);
            }
        }
        while finalizers.join_next().await.is_some() {}
        if let Err(error) = playback.close().await {
            warn!(%error, "playback close failed");
        }

        if let Some(error) = fatal {
            self.set_state(SessionState::Failed);
            return Err(error);
        }
        self.set_state(SessionState::Closed);
        Ok(SessionResult {
            responses_completed,
            timed_out,
            outbound_failure,
        })
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(instant) => time::sleep_until(instant).await,
        None => std::future::pending().await,
    }
}

fn spawn_finalizer(
    finalizers: &mut JoinSet<()>,
    artifacts: &Arc<dyn ArtifactSink>,
    artifact: Artifact,
) {
    let sink = Arc::clone(artifacts);
    finalizers.spawn(async move {
        if let Err(error) = sink.write(artifact).await {
            warn!(%error, "artifact finalization failed");
        }
    });
}

fn spawn_writer(
    mut sender: Box<dyn crate::io::TransportSender>,
    mut out_rx: mpsc::Receiver<String>,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            sender.send(message).await?;
        }
        sender.close().await
    })
}

/// Returns whether a commit was sent, for arming the response timeout.
fn spawn_outbound(
    mut capture: Box<dyn CaptureSource>,
    config: SessionConfig,
    out_tx: mpsc::Sender<String>,
    mut stop_rx: watch::Receiver<bool>,
) -> JoinHandle<Result<bool>> {
    tokio::spawn(async move { pump_outbound(&mut capture, &config, &out_tx, &mut stop_rx).await })
}

async fn pump_outbound(
    capture: &mut Box<dyn CaptureSource>,
    config: &SessionConfig,
    out_tx: &mpsc::Sender<String>,
    stop_rx: &mut watch::Receiver<bool>,
) -> Result<bool> {
    let capture_format = PcmFormat::pcm16_mono(config.capture_rate_hz);
    let chunker = AudioChunker::new(capture_format, config.chunk_ms)?;
    let frame_bytes = chunker.frame_bytes();
    let mut pending: Vec<u8> = Vec::new();

    loop {
        if *stop_rx.borrow() {
            break;
        }
        let read = tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
            read = capture.read(frame_bytes) => read?,
        };
        match read {
            Some(bytes) => {
                pending.extend_from_slice(&bytes);
                let whole = pending.len() - pending.len() % frame_bytes;
                if whole > 0 {
                    let batch: Vec<u8> = pending.drain(..whole).collect();
                    for frame in chunker.frames(&batch)? {
                        send_frame(frame.bytes, config, out_tx).await?;
                    }
                }
            }
            None => break,
        }
    }

    // Flush whatever is buffered as a final short frame.
    if !pending.is_empty() {
        let remainder = std::mem::take(&mut pending);
        for frame in chunker.frames(&remainder)? {
            send_frame(frame.bytes, config, out_tx).await?;
        }
    }

    if config.turn_detection == TurnDetection::Manual {
        enqueue(out_tx, ClientEvent::commit()).await?;
        enqueue(out_tx, ClientEvent::response_create()).await?;
        return Ok(true);
    }
    Ok(false)
}

async fn send_frame(frame: &[u8], config: &SessionConfig, out_tx: &mpsc::Sender<String>) -> Result<()> {
    let payload;
    let bytes = if config.capture_rate_hz == config.send_rate_hz {
        frame
    } else {
        let samples = pcm16_bytes_to_samples(frame);
        let resampled = resample(&samples, config.capture_rate_hz, config.send_rate_hz)?;
        payload = pcm16_samples_to_bytes(&resampled);
        &payload
    };
    enqueue(out_tx, ClientEvent::audio_append(bytes)).await
}

async fn enqueue(out_tx: &mpsc::Sender<String>, event: ClientEvent) -> Result<()> {
    let message = event.to_message()?;
    out_tx
        .send(message)
        .await
        .map_err(|_| VoxlinkError::Transport("Send queue closed".into()))
}
