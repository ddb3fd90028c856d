//! Driving Ports (API - Inbound)
//!
//! How consumers open subscriptions and receive their updates.

use async_trait::async_trait;

use crate::application::{SessionStream, SubscriptionHandle};
use crate::domain::{FilterSpecification, SessionError, UpdateRecord};

/// Event pushed to a consumer: an update, or an error notice.
///
/// Exactly one side is meaningful per event. Errors are transient notices
/// (when enabled) or the single terminal error, after which nothing else is
/// delivered.
pub type SessionEvent = Result<UpdateRecord, SessionError>;

/// Consumer of session events.
///
/// Invoked sequentially from one dispatcher task, never re-entrantly. A slow
/// sink applies backpressure to the session rather than losing updates.
#[async_trait]
pub trait DeliverySink: Send + 'static {
    /// Handle one event.
    async fn deliver(&mut self, event: SessionEvent);
}

#[async_trait]
impl<F> DeliverySink for F
where
    F: FnMut(SessionEvent) + Send + 'static,
{
    async fn deliver(&mut self, event: SessionEvent) {
        (self)(event)
    }
}

/// Sink built from separate update and error callbacks.
pub struct SplitSink<U, E> {
    on_update: U,
    on_error: E,
}

impl<U, E> SplitSink<U, E>
where
    U: FnMut(UpdateRecord) + Send + 'static,
    E: FnMut(SessionError) + Send + 'static,
{
    /// Pair an update callback with an error callback.
    pub fn new(on_update: U, on_error: E) -> Self {
        Self {
            on_update,
            on_error,
        }
    }
}

#[async_trait]
impl<U, E> DeliverySink for SplitSink<U, E>
where
    U: FnMut(UpdateRecord) + Send + 'static,
    E: FnMut(SessionError) + Send + 'static,
{
    async fn deliver(&mut self, event: SessionEvent) {
        match event {
            Ok(update) => (self.on_update)(update),
            Err(error) => (self.on_error)(error),
        }
    }
}

/// Primary API for opening subscription sessions.
///
/// Each call starts an independent session on its own task and must be made
/// from within a tokio runtime.
pub trait SubscriptionApi {
    /// Start a session delivering every event to `sink`.
    fn subscribe<S: DeliverySink>(
        &self,
        filter: FilterSpecification,
        sink: S,
    ) -> SubscriptionHandle;

    /// Start a session with separate update and error callbacks.
    fn subscribe_with_errors<U, E>(
        &self,
        filter: FilterSpecification,
        on_update: U,
        on_error: E,
    ) -> SubscriptionHandle
    where
        U: FnMut(UpdateRecord) + Send + 'static,
        E: FnMut(SessionError) + Send + 'static,
    {
        self.subscribe(filter, SplitSink::new(on_update, on_error))
    }

    /// Start a session whose events are read as a stream.
    fn subscribe_stream(&self, filter: FilterSpecification)
        -> (SubscriptionHandle, SessionStream);
}
