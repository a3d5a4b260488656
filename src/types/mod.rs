//! Core types: chat messages, envelopes, delegation contract, calculation parameters.

pub mod calculation;
pub mod envelope;
pub mod extraction;
pub mod message;

pub use calculation::*;
pub use envelope::*;
pub use extraction::*;
pub use message::*;
