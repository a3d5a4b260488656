//! Currency calculation: the domain operation behind every reply.
//!
//! [`CalculationAdapter`] is the only entry point the protocol handlers use.
//! It never fails: collaborator errors and timeouts come back as a
//! formatted error string that can be sent to the requester as-is.

pub mod converter;
pub mod parser;
pub mod rates;

pub use converter::{ConversationMemory, ConversionRecord, RateConverter};
pub use parser::parse_request;
pub use rates::{FrankfurterClient, RateProvider, RateQuote};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{AgentAddress, CalculationRequest};
use crate::util::timeout::with_timeout;

/// Heading placed above every successful result.
pub const RESULT_HEADING: &str = "💱 CURRENCY CONVERSION 💱";
/// Heading placed above every failed result.
pub const ERROR_HEADING: &str = "💱 CURRENCY CONVERSION ERROR 💱";

/// Key under which a collaborator may accumulate conversation context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// One conversation per requesting agent.
    pub fn for_sender(sender: &AgentAddress) -> Self {
        Self(format!("chat_{sender}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// External domain operation that turns parameters into result text.
#[async_trait]
pub trait CurrencyCalculator: Send + Sync {
    async fn convert(
        &self,
        request: &CalculationRequest,
        conversation: &ConversationKey,
    ) -> Result<String>;
}

/// Calls the calculator and formats whatever comes back.
#[derive(Clone)]
pub struct CalculationAdapter {
    calculator: Arc<dyn CurrencyCalculator>,
    timeout: Option<Duration>,
}

impl fmt::Debug for CalculationAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculationAdapter")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl CalculationAdapter {
    pub fn new(calculator: Arc<dyn CurrencyCalculator>) -> Self {
        Self {
            calculator,
            timeout: None,
        }
    }

    /// Bound each calculator call; an overrun is reported like any other failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn compute(
        &self,
        request: &CalculationRequest,
        conversation: &ConversationKey,
    ) -> String {
        tracing::debug!(
            from = %request.currency_from,
            to = %request.currency_to,
            amount = request.amount,
            %conversation,
            "computing conversion"
        );

        let call = self.calculator.convert(request, conversation);
        let outcome = match self.timeout {
            Some(limit) => with_timeout(limit, call).await,
            None => call.await,
        };

        match outcome {
            Ok(text) if !text.trim().is_empty() => format!("{RESULT_HEADING}\n\n{text}"),
            Ok(_) => format!(
                "{RESULT_HEADING}\n\nUnable to convert {} {} to {}",
                request.amount, request.currency_from, request.currency_to
            ),
            Err(e) => {
                tracing::warn!(error = %e, %conversation, "currency calculation failed");
                format!("{ERROR_HEADING}\n\nError: {e}")
            }
        }
    }
}
