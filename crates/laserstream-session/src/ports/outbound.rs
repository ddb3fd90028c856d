//! Driven Ports (SPI - Outbound Dependencies)
//!
//! The session engine never touches the network directly. A transport
//! adapter opens streams, and a decoder turns the transport's frames into
//! [`UpdateRecord`]s.

use async_trait::async_trait;

use crate::domain::{ConnectionError, DecodeError, FilterSpecification, UpdateRecord};

/// Opens subscription streams to the upstream.
#[async_trait]
pub trait TransportConnector: Send + Sync + 'static {
    /// Stream type produced by this connector.
    type Stream: UpdateStream;

    /// Open a new bidirectional stream.
    ///
    /// Authentication failures must surface as a Fatal [`ConnectionError`];
    /// anything the session may retry must be Transient.
    async fn connect(&self, endpoint: &str) -> Result<Self::Stream, ConnectionError>;
}

/// One open bidirectional subscription stream.
#[async_trait]
pub trait UpdateStream: Send + 'static {
    /// Raw frame type handed to the decoder.
    type Frame: Send + 'static;

    /// Send the subscribe request and wait for the upstream to accept it.
    async fn subscribe(&mut self, request: &FilterSpecification) -> Result<(), ConnectionError>;

    /// Next inbound frame. `None` means the upstream closed the stream.
    async fn next_frame(&mut self) -> Option<Result<Self::Frame, ConnectionError>>;

    /// Answer a server ping.
    async fn send_pong(&mut self) -> Result<(), ConnectionError>;

    /// Probe the upstream; it answers with a pong carrying `id`.
    async fn send_ping(&mut self, id: i32) -> Result<(), ConnectionError>;

    /// Release the stream. Errors while closing are ignored by the session.
    async fn close(&mut self);
}

/// Turns transport frames into typed update records.
///
/// Decoding is synchronous and pure; one frame yields one record.
pub trait FrameDecoder<F>: Send + Sync + 'static {
    /// Decode a single frame.
    fn decode(&self, frame: F) -> Result<UpdateRecord, DecodeError>;
}
