//! Ports module for subscription sessions

pub mod inbound;
pub mod outbound;

pub use inbound::{DeliverySink, SessionEvent, SplitSink, SubscriptionApi};
pub use outbound::{FrameDecoder, TransportConnector, UpdateStream};
