//! # Session Controller
//!
//! Drives one subscription through its lifecycle:
//!
//! ```text
//! Idle -> Connecting -> Subscribing -> Streaming
//!             ^  |                         |
//!      backoff +--+                        v
//!             +-------- Reconnecting <-----+
//! ```
//!
//! Each state is handled by one method that returns the next state. The
//! controller runs on a single task and is the only writer of its
//! [`ProgressTracker`]; decoded updates leave it through a bounded channel,
//! so consumer code never runs while progress is being updated.
//!
//! Every suspension point (connect, subscribe acknowledgment, next frame,
//! backoff sleep, and a full delivery queue) races the cancel flag.

use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, error, info, trace, warn};

use super::handle::{cancel_requested, SessionStats, SessionStatus, SubscriptionId};
use crate::algorithms::{Backoff, ProgressTracker};
use crate::config::SessionConfig;
use crate::domain::{
    invariant_valid_transition, ConnectionError, FilterSpecification, SessionError, SessionState,
    UpdateRecord,
};
use crate::metrics;
use crate::ports::inbound::SessionEvent;
use crate::ports::outbound::{FrameDecoder, TransportConnector, UpdateStream};

type FrameOf<C> = <<C as TransportConnector>::Stream as UpdateStream>::Frame;

/// Run `fut` unless the session is cancelled first. `None` means cancelled.
async fn until_cancelled<F: Future>(
    cancel: &mut watch::Receiver<bool>,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        // Resolves on `true` and also when the handle side is dropped.
        _ = cancel.wait_for(|cancelled| *cancelled) => None,
        output = fut => Some(output),
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// What woke the streaming loop.
enum StreamEvent<F> {
    Cancelled,
    Frame(Option<Result<F, ConnectionError>>),
    Deadline,
}

/// Result of handling one frame.
enum FrameOutcome {
    Continue,
    Next(SessionState),
}

/// Outstanding liveness probe.
#[derive(Clone, Copy)]
struct Probe {
    id: i32,
    deadline: Instant,
}

/// One subscription session.
pub struct SessionController<C: TransportConnector, D> {
    id: SubscriptionId,
    config: SessionConfig,
    connector: Arc<C>,
    decoder: Arc<D>,
    /// Current subscribe request; its `from_slot` is rewritten on resume.
    request: FilterSpecification,
    state: SessionState,
    status: Weak<SessionStatus>,
    stats: Arc<SessionStats>,
    progress: ProgressTracker,
    backoff: Backoff,
    events: mpsc::Sender<SessionEvent>,
    cancel: watch::Receiver<bool>,
    stream: Option<C::Stream>,
    /// Consecutive failed connect or subscribe attempts.
    failed_attempts: u32,
    consecutive_malformed: u32,
    last_error: Option<ConnectionError>,
    terminal_error: Option<SessionError>,
    streaming_since: Option<Instant>,
    next_ping_id: i32,
}

impl<C, D> SessionController<C, D>
where
    C: TransportConnector,
    D: FrameDecoder<FrameOf<C>>,
{
    /// Create a controller in `Idle`. Nothing happens until [`run`](Self::run).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: SubscriptionId,
        config: SessionConfig,
        connector: Arc<C>,
        decoder: Arc<D>,
        filter: FilterSpecification,
        status: Weak<SessionStatus>,
        stats: Arc<SessionStats>,
        events: mpsc::Sender<SessionEvent>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        let progress = ProgressTracker::new(
            filter.from_slot,
            config.dedup.window_capacity,
            config.dedup.resume_slot_margin,
        );
        let backoff = Backoff::new(
            config.backoff_floor(),
            config.backoff_ceiling(),
            config.backoff.jitter_ratio,
        );
        Self {
            id,
            config,
            connector,
            decoder,
            request: filter,
            state: SessionState::Idle,
            status,
            stats,
            progress,
            backoff,
            events,
            cancel,
            stream: None,
            failed_attempts: 0,
            consecutive_malformed: 0,
            last_error: None,
            terminal_error: None,
            streaming_since: None,
            next_ping_id: 1,
        }
    }

    /// Drive the session until it is closed or fails. Returns the terminal
    /// state.
    pub async fn run(mut self) -> SessionState {
        info!(
            subscription_id = %self.id,
            endpoint = %self.config.endpoint,
            from_slot = ?self.request.from_slot,
            "Session started"
        );

        while !self.state.is_terminal() {
            let next = if cancel_requested(&self.cancel) {
                SessionState::Closed
            } else {
                match self.state {
                    SessionState::Idle => self.on_idle(),
                    SessionState::Connecting => self.on_connecting().await,
                    SessionState::Subscribing => self.on_subscribing().await,
                    SessionState::Streaming => self.on_streaming().await,
                    SessionState::Reconnecting => self.on_reconnecting().await,
                    SessionState::Closed | SessionState::Failed => break,
                }
            };
            self.transition(next);
        }

        self.finish().await;
        self.state
    }

    // ------------------------------------------------------------------
    // State handlers
    // ------------------------------------------------------------------

    fn on_idle(&mut self) -> SessionState {
        match self.request.validate() {
            Ok(normalized) => {
                debug!(
                    subscription_id = %self.id,
                    entities = ?normalized.subscribed_entities(),
                    commitment = %normalized.commitment,
                    "Filter validated"
                );
                self.request = normalized;
                SessionState::Connecting
            }
            Err(e) => {
                self.terminal_error = Some(SessionError::InvalidFilter(e));
                SessionState::Failed
            }
        }
    }

    async fn on_connecting(&mut self) -> SessionState {
        self.stats.record_connect_attempt();
        debug!(
            subscription_id = %self.id,
            attempt = self.failed_attempts + 1,
            "Connecting"
        );

        let attempt = timeout(
            self.config.connect_timeout(),
            self.connector.connect(&self.config.endpoint),
        );
        let outcome = until_cancelled(&mut self.cancel, attempt).await;

        match outcome {
            None => SessionState::Closed,
            Some(Ok(Ok(stream))) => {
                self.stream = Some(stream);
                SessionState::Subscribing
            }
            Some(Ok(Err(e))) => self.on_connect_failed(e).await,
            Some(Err(_elapsed)) => self.on_connect_failed(ConnectionError::Timeout("connecting")).await,
        }
    }

    async fn on_connect_failed(&mut self, error: ConnectionError) -> SessionState {
        if !error.is_transient() {
            return self.fail(error.into());
        }

        self.failed_attempts += 1;
        warn!(
            subscription_id = %self.id,
            attempt = self.failed_attempts,
            error = %error,
            "Connect attempt failed"
        );
        self.record_error(SessionError::Connection(error.clone()));

        if !self.notify_transient(&error).await {
            return SessionState::Closed;
        }
        if let Some(exhausted) = self.attempts_exhausted(&error) {
            return self.fail(exhausted);
        }
        self.last_error = Some(error);

        if !self.wait_backoff().await {
            return SessionState::Closed;
        }
        SessionState::Connecting
    }

    async fn on_subscribing(&mut self) -> SessionState {
        let Some(stream) = self.stream.as_mut() else {
            return SessionState::Connecting;
        };
        let ack = timeout(
            self.config.subscribe_timeout(),
            stream.subscribe(&self.request),
        );
        let outcome = until_cancelled(&mut self.cancel, ack).await;

        match outcome {
            None => SessionState::Closed,
            Some(Ok(Ok(()))) => {
                info!(
                    subscription_id = %self.id,
                    from_slot = ?self.request.from_slot,
                    "Subscription acknowledged"
                );
                self.failed_attempts = 0;
                self.consecutive_malformed = 0;
                self.streaming_since = Some(Instant::now());
                SessionState::Streaming
            }
            Some(Ok(Err(e))) => {
                self.failed_attempts += 1;
                self.on_stream_failed(e)
            }
            Some(Err(_elapsed)) => {
                self.failed_attempts += 1;
                self.on_stream_failed(ConnectionError::Timeout("subscribing"))
            }
        }
    }

    async fn on_streaming(&mut self) -> SessionState {
        let idle_threshold = self.config.idle_threshold();
        let mut last_activity = Instant::now();
        let mut probe: Option<Probe> = None;

        loop {
            let deadline = match (probe, idle_threshold) {
                (Some(probe), _) => Some(probe.deadline),
                (None, Some(idle)) => Some(last_activity + idle),
                (None, None) => None,
            };
            let Some(stream) = self.stream.as_mut() else {
                return SessionState::Reconnecting;
            };

            let event = tokio::select! {
                biased;
                _ = self.cancel.wait_for(|cancelled| *cancelled) => StreamEvent::Cancelled,
                frame = stream.next_frame() => StreamEvent::Frame(frame),
                _ = sleep_until_opt(deadline) => StreamEvent::Deadline,
            };

            match event {
                StreamEvent::Cancelled => return SessionState::Closed,
                StreamEvent::Frame(None) => {
                    return self.on_stream_failed(ConnectionError::ServerClosed(
                        "stream ended".into(),
                    ));
                }
                StreamEvent::Frame(Some(Err(e))) => return self.on_stream_failed(e),
                StreamEvent::Frame(Some(Ok(frame))) => {
                    last_activity = Instant::now();
                    // Any traffic proves the stream is alive.
                    probe = None;
                    if let FrameOutcome::Next(state) = self.handle_frame(frame).await {
                        return state;
                    }
                }
                StreamEvent::Deadline => {
                    if let Some(unanswered) = probe {
                        debug!(
                            subscription_id = %self.id,
                            ping_id = unanswered.id,
                            "Probe unanswered"
                        );
                        let idle = idle_threshold.unwrap_or_default();
                        return self.on_stream_failed(ConnectionError::IdleTimeout(idle));
                    }
                    let id = self.next_ping_id;
                    self.next_ping_id = self.next_ping_id.wrapping_add(1);
                    debug!(subscription_id = %self.id, ping_id = id, "Stream idle, probing");

                    let Some(stream) = self.stream.as_mut() else {
                        return SessionState::Reconnecting;
                    };
                    if let Err(e) = stream.send_ping(id).await {
                        return self.on_stream_failed(e);
                    }
                    probe = Some(Probe {
                        id,
                        deadline: Instant::now() + self.config.pong_timeout(),
                    });
                }
            }
        }
    }

    async fn on_reconnecting(&mut self) -> SessionState {
        if let Some(mut stream) = self.stream.take() {
            stream.close().await;
        }
        self.stats.record_reconnect();
        metrics::record_reconnect();

        if let Some(since) = self.streaming_since.take() {
            if since.elapsed() >= self.config.healthy_after() {
                debug!(subscription_id = %self.id, "Previous stream was healthy, resetting backoff");
                self.backoff.reset();
            }
        }

        if let Some(error) = self.last_error.clone() {
            if !self.notify_transient(&error).await {
                return SessionState::Closed;
            }
            if let Some(exhausted) = self.attempts_exhausted(&error) {
                return self.fail(exhausted);
            }
        }

        let resume = self.progress.resume_point();
        self.request.from_slot = resume;
        info!(
            subscription_id = %self.id,
            resume_slot = ?resume,
            last_delivered = ?self.progress.last_delivered(),
            "Reconnecting with resume point"
        );

        if !self.wait_backoff().await {
            return SessionState::Closed;
        }
        SessionState::Connecting
    }

    // ------------------------------------------------------------------
    // Streaming helpers
    // ------------------------------------------------------------------

    async fn handle_frame(&mut self, frame: FrameOf<C>) -> FrameOutcome {
        let record = match self.decoder.decode(frame) {
            Ok(record) => record,
            Err(e) => {
                self.consecutive_malformed += 1;
                self.stats.record_malformed();
                metrics::record_malformed_frame();
                debug!(
                    subscription_id = %self.id,
                    consecutive = self.consecutive_malformed,
                    error = %e,
                    "Discarding malformed frame"
                );
                if self.consecutive_malformed > self.config.max_consecutive_malformed {
                    let error = ConnectionError::StreamCorrupted {
                        consecutive: self.consecutive_malformed,
                    };
                    return FrameOutcome::Next(self.on_stream_failed(error));
                }
                return FrameOutcome::Continue;
            }
        };
        self.consecutive_malformed = 0;

        match record {
            UpdateRecord::Ping => {
                trace!(subscription_id = %self.id, "Answering server ping");
                let Some(stream) = self.stream.as_mut() else {
                    return FrameOutcome::Next(SessionState::Reconnecting);
                };
                if let Err(e) = stream.send_pong().await {
                    return FrameOutcome::Next(self.on_stream_failed(e));
                }
                self.stats.record_ping_answered();
                FrameOutcome::Continue
            }
            UpdateRecord::Pong { id } => {
                trace!(subscription_id = %self.id, ping_id = id, "Probe answered");
                FrameOutcome::Continue
            }
            record => self.deliver(record).await,
        }
    }

    async fn deliver(&mut self, record: UpdateRecord) -> FrameOutcome {
        let (Some(slot), Some(entity)) = (record.slot(), record.entity_type()) else {
            return FrameOutcome::Continue;
        };

        if self
            .progress
            .record_delivered(slot, entity, record.item_key())
        {
            self.stats.record_suppressed();
            metrics::record_duplicate_suppressed();
            trace!(subscription_id = %self.id, slot, entity = %entity, "Suppressed redelivery");
            return FrameOutcome::Continue;
        }

        self.stats.record_delivered(slot);
        metrics::record_delivered(entity.as_str(), slot);
        if !self.emit(Ok(record)).await {
            return FrameOutcome::Next(SessionState::Closed);
        }
        FrameOutcome::Continue
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    fn on_stream_failed(&mut self, error: ConnectionError) -> SessionState {
        if !error.is_transient() {
            return self.fail(error.into());
        }
        warn!(
            subscription_id = %self.id,
            state = %self.state,
            last_delivered = ?self.progress.last_delivered(),
            error = %error,
            "Stream failed"
        );
        self.record_error(SessionError::Connection(error.clone()));
        self.last_error = Some(error);
        SessionState::Reconnecting
    }

    fn fail(&mut self, error: SessionError) -> SessionState {
        self.terminal_error = Some(error);
        SessionState::Failed
    }

    fn attempts_exhausted(&self, last: &ConnectionError) -> Option<SessionError> {
        let max = self.config.backoff.max_attempts?;
        (self.failed_attempts >= max).then(|| SessionError::ReconnectExhausted {
            attempts: self.failed_attempts,
            last: last.clone(),
        })
    }

    fn record_error(&self, error: SessionError) {
        if let Some(status) = self.status.upgrade() {
            status.set_last_error(error);
        }
    }

    /// Surface a transient error if configured. `false` means the consumer
    /// is gone.
    async fn notify_transient(&mut self, error: &ConnectionError) -> bool {
        if !self.config.surface_transient_errors {
            return true;
        }
        self.emit(Err(SessionError::Connection(error.clone()))).await
    }

    /// Queue an event for the consumer. `false` if cancelled or the consumer
    /// is gone.
    async fn emit(&mut self, event: SessionEvent) -> bool {
        let outcome = until_cancelled(&mut self.cancel, self.events.send(event)).await;
        matches!(outcome, Some(Ok(())))
    }

    /// Sleep the next backoff delay. `false` if cancelled meanwhile.
    async fn wait_backoff(&mut self) -> bool {
        let delay = self.backoff.next_delay();
        debug!(
            subscription_id = %self.id,
            attempt = self.backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            "Backing off"
        );
        until_cancelled(&mut self.cancel, sleep(delay)).await.is_some()
    }

    fn transition(&mut self, next: SessionState) {
        if next == self.state {
            return;
        }
        debug_assert!(
            invariant_valid_transition(self.state, next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        info!(
            subscription_id = %self.id,
            from = %self.state,
            to = %next,
            "Session state changed"
        );
        self.state = next;
        // Terminal states are published once delivery has drained.
        if !next.is_terminal() {
            if let Some(status) = self.status.upgrade() {
                status.publish(next);
            }
        }
    }

    async fn finish(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close().await;
        }

        if self.state != SessionState::Failed {
            info!(
                subscription_id = %self.id,
                delivered = self.progress.delivered(),
                suppressed = self.progress.suppressed(),
                "Session closed"
            );
            return;
        }

        let error = self.terminal_error.take().unwrap_or_else(|| {
            SessionError::Connection(ConnectionError::Reset("session failed".into()))
        });
        error!(
            subscription_id = %self.id,
            class = error.class().as_str(),
            error = %error,
            "Session failed"
        );
        metrics::record_session_failure(error.class().as_str());
        self.record_error(error.clone());

        if !cancel_requested(&self.cancel) {
            let _ = self.emit(Err(error)).await;
        }
    }
}
