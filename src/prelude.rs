//! Convenience re-exports for common use.

pub use crate::agent::Agent;
pub use crate::calculation::{CalculationAdapter, ConversationKey, CurrencyCalculator};
pub use crate::config::{AgentSettings, ExpiryPolicy, ProcessingMode};
pub use crate::error::{CourierError, Result};
pub use crate::protocol::{Context, MessageHandler, Protocol, RouteOutcome, Router};
pub use crate::session::SessionStore;
pub use crate::transport::Transport;
pub use crate::types::{
    AgentAddress, CalculationRequest, ChatAcknowledgement, ChatMessage, ContentPart, Envelope,
    MessageKind, Payload, SessionId, StructuredOutputPrompt, StructuredOutputResponse,
};
