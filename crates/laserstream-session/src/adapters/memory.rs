//! In-memory transport
//!
//! A channel-backed [`TransportConnector`] whose server side is driven by the
//! caller: accept or reject each connection, acknowledge or reject each
//! subscribe, push frames or errors, and observe what the client sends.
//!
//! Used by the test suite and the throughput benchmark.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::domain::{ConnectionError, FilterSpecification};
use crate::ports::outbound::{TransportConnector, UpdateStream};

/// Create a connected connector / server pair.
pub fn in_memory_transport<F: Send + 'static>() -> (InMemoryConnector<F>, InMemoryServer<F>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let attempts = Arc::new(AtomicU32::new(0));
    (
        InMemoryConnector {
            requests: tx,
            attempts: attempts.clone(),
        },
        InMemoryServer {
            requests: rx,
            attempts,
        },
    )
}

// ============================================================================
// Client side
// ============================================================================

/// Client half: hands connection requests to the [`InMemoryServer`].
pub struct InMemoryConnector<F> {
    requests: mpsc::UnboundedSender<IncomingConnection<F>>,
    attempts: Arc<AtomicU32>,
}

impl<F> Clone for InMemoryConnector<F> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
            attempts: self.attempts.clone(),
        }
    }
}

impl<F> InMemoryConnector<F> {
    /// Connection attempts made so far.
    pub fn connect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F: Send + 'static> TransportConnector for InMemoryConnector<F> {
    type Stream = InMemoryStream<F>;

    async fn connect(&self, endpoint: &str) -> Result<Self::Stream, ConnectionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let (reply, response) = oneshot::channel();
        self.requests
            .send(IncomingConnection {
                endpoint: endpoint.to_string(),
                reply,
            })
            .map_err(|_| ConnectionError::Unavailable("in-memory server is gone".into()))?;

        match response.await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Unavailable(
                "connection request dropped".into(),
            )),
        }
    }
}

/// Client end of one in-memory stream.
pub struct InMemoryStream<F> {
    frames: mpsc::UnboundedReceiver<Result<F, ConnectionError>>,
    outbound: mpsc::UnboundedSender<ClientMessage>,
}

impl<F> InMemoryStream<F> {
    fn send(&self, message: ClientMessage) -> Result<(), ConnectionError> {
        self.outbound
            .send(message)
            .map_err(|_| ConnectionError::Reset("in-memory connection closed".into()))
    }
}

#[async_trait]
impl<F: Send + 'static> UpdateStream for InMemoryStream<F> {
    type Frame = F;

    async fn subscribe(&mut self, request: &FilterSpecification) -> Result<(), ConnectionError> {
        let (ack, acked) = oneshot::channel();
        self.send(ClientMessage::Subscribe(PendingSubscribe {
            request: request.clone(),
            ack,
        }))?;
        match acked.await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::ServerClosed(
                "subscribe was never acknowledged".into(),
            )),
        }
    }

    async fn next_frame(&mut self) -> Option<Result<F, ConnectionError>> {
        self.frames.recv().await
    }

    async fn send_pong(&mut self) -> Result<(), ConnectionError> {
        self.send(ClientMessage::Pong)
    }

    async fn send_ping(&mut self, id: i32) -> Result<(), ConnectionError> {
        self.send(ClientMessage::Ping { id })
    }

    async fn close(&mut self) {
        let _ = self.send(ClientMessage::Close);
        self.frames.close();
    }
}

// ============================================================================
// Server side
// ============================================================================

/// Message sent by the client over an open stream.
#[derive(Debug)]
pub enum ClientMessage {
    /// Subscribe request awaiting acknowledgment.
    Subscribe(PendingSubscribe),
    /// Liveness probe.
    Ping {
        /// Probe id to echo back.
        id: i32,
    },
    /// Answer to a server ping.
    Pong,
    /// The client released the stream.
    Close,
}

/// Subscribe request the server has not answered yet.
#[derive(Debug)]
pub struct PendingSubscribe {
    request: FilterSpecification,
    ack: oneshot::Sender<Result<(), ConnectionError>>,
}

impl PendingSubscribe {
    /// The request as sent by the client.
    pub fn request(&self) -> &FilterSpecification {
        &self.request
    }

    /// Acknowledge the subscription and return the request.
    pub fn accept(self) -> FilterSpecification {
        let _ = self.ack.send(Ok(()));
        self.request
    }

    /// Refuse the subscription.
    pub fn reject(self, error: ConnectionError) -> FilterSpecification {
        let _ = self.ack.send(Err(error));
        self.request
    }
}

/// Server half: receives connection requests.
pub struct InMemoryServer<F> {
    requests: mpsc::UnboundedReceiver<IncomingConnection<F>>,
    attempts: Arc<AtomicU32>,
}

impl<F> InMemoryServer<F> {
    /// Wait for the next connection request. `None` once every connector is
    /// dropped.
    pub async fn accept(&mut self) -> Option<IncomingConnection<F>> {
        self.requests.recv().await
    }

    /// Connection attempts made so far.
    pub fn connect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Connection request the server has not answered yet.
pub struct IncomingConnection<F> {
    endpoint: String,
    reply: oneshot::Sender<Result<InMemoryStream<F>, ConnectionError>>,
}

impl<F> IncomingConnection<F> {
    /// Endpoint the client dialled.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Open the connection.
    pub fn accept(self) -> ServerConnection<F> {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let stream = InMemoryStream {
            frames: frames_rx,
            outbound: outbound_tx,
        };
        // A client that gave up waiting leaves a dead connection behind,
        // which the server observes as closed channels.
        let _ = self.reply.send(Ok(stream));
        ServerConnection {
            frames: frames_tx,
            inbound: outbound_rx,
        }
    }

    /// Refuse the connection.
    pub fn reject(self, error: ConnectionError) {
        let _ = self.reply.send(Err(error));
    }
}

/// Server end of one open stream. Dropping it ends the stream.
pub struct ServerConnection<F> {
    frames: mpsc::UnboundedSender<Result<F, ConnectionError>>,
    inbound: mpsc::UnboundedReceiver<ClientMessage>,
}

impl<F> ServerConnection<F> {
    /// Push a frame. Returns `false` if the client is gone.
    pub fn send(&self, frame: F) -> bool {
        self.frames.send(Ok(frame)).is_ok()
    }

    /// Fail the stream with `error`. Returns `false` if the client is gone.
    pub fn fail(&self, error: ConnectionError) -> bool {
        self.frames.send(Err(error)).is_ok()
    }

    /// Next message from the client. `None` once the client dropped the
    /// stream.
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        self.inbound.recv().await
    }

    /// Skip liveness traffic until the client's subscribe request arrives.
    pub async fn next_subscribe(&mut self) -> Option<PendingSubscribe> {
        while let Some(message) = self.recv().await {
            if let ClientMessage::Subscribe(pending) = message {
                return Some(pending);
            }
        }
        None
    }

    /// Whether the client released its end.
    pub fn is_closed(&self) -> bool {
        self.frames.is_closed()
    }
}
