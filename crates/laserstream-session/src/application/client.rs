//! Client entry point
//!
//! [`LaserstreamClient`] owns the configuration, connector and decoder
//! shared by every session it opens. Each `subscribe*` call starts an
//! independent session on its own task.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::controller::SessionController;
use super::dispatch::{spawn_dispatcher, SessionStream};
use super::handle::{SessionStats, SessionStatus, SubscriptionHandle, SubscriptionId};
use crate::config::{ConfigError, SessionConfig};
use crate::domain::{FilterSpecification, SessionState};
use crate::ports::inbound::{DeliverySink, SessionEvent, SubscriptionApi};
use crate::ports::outbound::{FrameDecoder, TransportConnector, UpdateStream};

/// Opens subscription sessions against one upstream.
pub struct LaserstreamClient<C, D> {
    config: SessionConfig,
    connector: Arc<C>,
    decoder: Arc<D>,
}

impl<C, D> Clone for LaserstreamClient<C, D> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            connector: self.connector.clone(),
            decoder: self.decoder.clone(),
        }
    }
}

/// Pieces of a session that has not been spawned yet.
struct Launch<C: TransportConnector, D> {
    handle: SubscriptionHandle,
    controller: SessionController<C, D>,
    status: Arc<SessionStatus>,
    events: mpsc::Receiver<SessionEvent>,
    cancel: watch::Receiver<bool>,
}

impl<C, D> LaserstreamClient<C, D>
where
    C: TransportConnector,
    D: FrameDecoder<<C::Stream as UpdateStream>::Frame>,
{
    /// Create a client. Rejects a configuration that fails validation.
    pub fn new(config: SessionConfig, connector: C, decoder: D) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            connector: Arc::new(connector),
            decoder: Arc::new(decoder),
        })
    }

    /// Configuration applied to new sessions.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The shared transport connector.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn prepare(&self, filter: FilterSpecification) -> Launch<C, D> {
        let id = SubscriptionId::new();
        let status = Arc::new(SessionStatus::new());
        let stats = Arc::new(SessionStats::default());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::channel(self.config.channel_capacity.max(1));

        let controller = SessionController::new(
            id,
            self.config.clone(),
            self.connector.clone(),
            self.decoder.clone(),
            filter,
            Arc::downgrade(&status),
            stats.clone(),
            events_tx,
            cancel_rx.clone(),
        );
        debug!(subscription_id = %id, "Session prepared");

        Launch {
            handle: SubscriptionHandle::new(id, status.clone(), stats, cancel_tx),
            controller,
            status,
            events: events_rx,
            cancel: cancel_rx,
        }
    }
}

/// Run the driver, wait for delivery to drain, then publish the final state.
///
/// A driver that panics ends the session as `Failed`. Its event sender is
/// dropped with it, so the dispatcher still drains and stops.
async fn run_session<C, D>(
    id: SubscriptionId,
    controller: SessionController<C, D>,
    dispatcher: Option<JoinHandle<()>>,
    status: std::sync::Weak<SessionStatus>,
) where
    C: TransportConnector,
    D: FrameDecoder<<C::Stream as UpdateStream>::Frame>,
{
    let final_state = match tokio::spawn(controller.run()).await {
        Ok(state) => state,
        Err(join_error) => {
            error!(subscription_id = %id, error = %join_error, "Session driver aborted");
            SessionState::Failed
        }
    };
    if let Some(dispatcher) = dispatcher {
        let _ = dispatcher.await;
    }
    if let Some(status) = status.upgrade() {
        status.publish(final_state);
    }
}

impl<C, D> SubscriptionApi for LaserstreamClient<C, D>
where
    C: TransportConnector,
    D: FrameDecoder<<C::Stream as UpdateStream>::Frame>,
{
    fn subscribe<S: DeliverySink>(&self, filter: FilterSpecification, sink: S) -> SubscriptionHandle {
        let launch = self.prepare(filter);
        let dispatcher = spawn_dispatcher(launch.handle.id(), launch.events, sink, launch.cancel);
        tokio::spawn(run_session(
            launch.handle.id(),
            launch.controller,
            Some(dispatcher),
            Arc::downgrade(&launch.status),
        ));
        launch.handle
    }

    fn subscribe_stream(
        &self,
        filter: FilterSpecification,
    ) -> (SubscriptionHandle, SessionStream) {
        let launch = self.prepare(filter);
        let stream = SessionStream::new(launch.events, launch.cancel);
        tokio::spawn(run_session(
            launch.handle.id(),
            launch.controller,
            None,
            Arc::downgrade(&launch.status),
        ));
        (launch.handle, stream)
    }
}
