//! Courier: a currency conversion agent.
//!
//! The agent speaks a chat protocol with other agents. Each chat message is
//! acknowledged and answered with a currency conversion. In delegated mode the
//! parameters are extracted by an external structured-output agent; the
//! requester is parked in a [`session::SessionStore`] until the extraction
//! reply arrives on the same session.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use courier::prelude::*;
//! use courier::transport::MemoryTransport;
//!
//! # async fn example() -> courier::Result<()> {
//! let agent = Agent::from_settings(AgentSettings::default(), Arc::new(MemoryTransport::new()))?;
//! println!("{}", agent.query("Convert 100 USD to EUR").await);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod calculation;
pub mod config;
pub mod error;
pub mod prelude;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;
pub mod util;

#[cfg(feature = "rest")]
pub mod rest;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{CourierError, Result};
