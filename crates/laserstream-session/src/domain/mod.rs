//! # Domain Layer
//!
//! Pure types and rules for subscription sessions. Nothing here performs
//! I/O.

pub mod errors;
pub mod filter;
pub mod invariants;
pub mod state;
pub mod updates;

pub use errors::*;
pub use filter::*;
pub use invariants::*;
pub use state::*;
pub use updates::*;
