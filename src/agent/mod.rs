//! Agent runtime: wiring, run loop and session expiry.

pub mod agent;
pub mod runtime;

pub use agent::{Agent, DIRECT_QUERY_CONVERSATION};
pub use runtime::EXPIRED_REQUEST_TEXT;
