//! Event delivery
//!
//! The driver is the only producer of session events; it pushes them into a
//! bounded channel. On the other end sits exactly one consumer: either a
//! dispatcher task feeding a [`DeliverySink`], or a [`SessionStream`] polled
//! by the caller.

use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::trace;

use super::handle::{cancel_requested, SubscriptionId};
use crate::ports::inbound::{DeliverySink, SessionEvent};

fn is_terminal_event(event: &SessionEvent) -> bool {
    matches!(event, Err(error) if error.is_terminal())
}

/// Drain `events` into `sink` until the session ends or is cancelled.
pub(crate) fn spawn_dispatcher<S: DeliverySink>(
    id: SubscriptionId,
    mut events: mpsc::Receiver<SessionEvent>,
    mut sink: S,
    cancel: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if cancel_requested(&cancel) {
                trace!(subscription_id = %id, "Dropping buffered events after cancel");
                break;
            }
            let terminal = is_terminal_event(&event);
            sink.deliver(event).await;
            if terminal {
                break;
            }
        }
    })
}

/// Session events as a [`Stream`].
///
/// Ends after the terminal error, or as soon as the session is cancelled.
/// The stream reads the handle's cancel flag, so dropping the handle ends
/// the stream too.
#[derive(Debug)]
pub struct SessionStream {
    events: mpsc::Receiver<SessionEvent>,
    cancel: watch::Receiver<bool>,
    done: bool,
}

impl SessionStream {
    pub(crate) fn new(events: mpsc::Receiver<SessionEvent>, cancel: watch::Receiver<bool>) -> Self {
        Self {
            events,
            cancel,
            done: false,
        }
    }
}

impl Stream for SessionStream {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done || cancel_requested(&self.cancel) {
            return Poll::Ready(None);
        }
        match self.events.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if is_terminal_event(&event) {
                    self.done = true;
                }
                Poll::Ready(Some(event))
            }
            other => other,
        }
    }
}
