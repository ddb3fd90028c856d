//! Adapters module for subscription sessions
//!
//! - `memory`: channel-backed transport with a scriptable server side
//! - `wire`: frame decoders for the upstream update message

pub mod memory;
pub mod wire;

pub use memory::{
    in_memory_transport, ClientMessage, InMemoryConnector, InMemoryServer, InMemoryStream,
    IncomingConnection, PendingSubscribe, ServerConnection,
};
pub use wire::{
    decode_wire, BincodeDecoder, PassthroughDecoder, WireAccount, WireBlock, WireBlockMeta,
    WireDecoder, WireEntry, WireSlot, WireTransaction, WireTransactionStatus, WireUpdate,
    WireUpdateKind,
};
