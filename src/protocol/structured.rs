//! Structured-output client protocol.
//!
//! The chat handler sends a [`StructuredOutputPrompt`] to an external agent
//! and parks the requester in the [`SessionStore`]. When the
//! [`StructuredOutputResponse`] comes back on the same session, the bridge
//! takes the parked sender, runs the calculation and replies to them.

use std::sync::Arc;

use async_trait::async_trait;

use super::{reply, Context, MessageHandler, Protocol};
use crate::calculation::{CalculationAdapter, ConversationKey};
use crate::error::{CourierError, Result};
use crate::session::SessionStore;
use crate::types::{
    AgentAddress, CalculationRequest, MessageKind, Payload, StructuredOutputPrompt,
    StructuredOutputResponse,
};

pub const STRUCTURED_OUTPUT_PROTOCOL_NAME: &str = "StructuredOutputClientProtocol";
pub const STRUCTURED_OUTPUT_PROTOCOL_VERSION: &str = "0.1.0";

/// Build the extraction request for one piece of user text.
pub fn extraction_prompt(text: &str) -> StructuredOutputPrompt {
    let prompt = format!(
        r#"Extract the currency conversion parameters from this message:

"{text}"

The user wants to perform a currency conversion. Extract:
1. The currency_from: Source currency code (e.g., "USD", "EUR", "GBP")
2. The currency_to: Target currency code (e.g., "USD", "EUR", "GBP")
3. The amount: Amount to convert (default: 1.0 if not specified)

Examples:
- "Convert 100 USD to EUR" -> currency_from: "USD", currency_to: "EUR", amount: 100.0
- "What is GBP to JPY rate?" -> currency_from: "GBP", currency_to: "JPY", amount: 1.0
- "Show me 50 euros in dollars" -> currency_from: "EUR", currency_to: "USD", amount: 50.0

If you cannot determine the currencies, set currency_from: "USD" and currency_to: "EUR" as defaults.
If no amount is specified, use 1.0 as the default amount.
"#
    );
    StructuredOutputPrompt {
        prompt,
        output_schema: CalculationRequest::output_schema(),
    }
}

/// Resumes a parked conversation when its structured output arrives.
#[derive(Debug)]
pub struct StructuredOutputBridge {
    sessions: Arc<SessionStore>,
    calculator: CalculationAdapter,
}

impl StructuredOutputBridge {
    pub fn new(sessions: Arc<SessionStore>, calculator: CalculationAdapter) -> Self {
        Self {
            sessions,
            calculator,
        }
    }

    /// Returns whether a reply was sent.
    pub async fn on_response(
        &self,
        ctx: &Context,
        sender: &AgentAddress,
        response: StructuredOutputResponse,
    ) -> Result<bool> {
        tracing::info!(%sender, session = %ctx.session(), output = ?response.output, "received structured output");

        let request = CalculationRequest::from_output(&response.output);
        tracing::info!(
            amount = request.amount,
            from = %request.currency_from,
            to = %request.currency_to,
            "extracted parameters"
        );

        let Some(pending) = self.sessions.take(ctx.session()) else {
            tracing::error!(
                session = %ctx.session(),
                %sender,
                "could not find original sender in session storage; dropping result"
            );
            return Ok(false);
        };

        let result = self
            .calculator
            .compute(&request, &ConversationKey::for_sender(&pending.sender))
            .await;
        reply::send_text(ctx, &pending.sender, result).await?;
        tracing::info!(
            recipient = %pending.sender,
            request_id = %pending.request_id,
            "sent currency result to original sender"
        );
        Ok(true)
    }
}

#[async_trait]
impl MessageHandler for StructuredOutputBridge {
    async fn handle(&self, ctx: &Context, sender: &AgentAddress, payload: Payload) -> Result<()> {
        match payload {
            Payload::StructuredOutputResponse(response) => {
                self.on_response(ctx, sender, response).await.map(|_| ())
            }
            other => Err(CourierError::InvalidArgument(format!(
                "structured output protocol cannot handle {}",
                other.kind()
            ))),
        }
    }
}

pub fn structured_output_protocol(bridge: Arc<StructuredOutputBridge>) -> Protocol {
    Protocol::new(STRUCTURED_OUTPUT_PROTOCOL_NAME, STRUCTURED_OUTPUT_PROTOCOL_VERSION)
        .on_message(MessageKind::StructuredOutputResponse, bridge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::CurrencyCalculator;
    use crate::transport::MemoryTransport;
    use crate::types::SessionId;
    use serde_json::json;

    struct Fails;

    #[async_trait]
    impl CurrencyCalculator for Fails {
        async fn convert(&self, _: &CalculationRequest, _: &ConversationKey) -> Result<String> {
            Err(CourierError::api(404, "not found"))
        }
    }

    fn bridge(sessions: Arc<SessionStore>) -> StructuredOutputBridge {
        StructuredOutputBridge::new(sessions, CalculationAdapter::new(Arc::new(Fails)))
    }

    #[test]
    fn prompt_embeds_text_and_schema() {
        let prompt = extraction_prompt("Show me 50 euros in dollars");
        assert!(prompt.prompt.contains("\"Show me 50 euros in dollars\""));
        assert!(prompt.prompt.contains("currency_from"));
        assert_eq!(prompt.output_schema, CalculationRequest::output_schema());
    }

    #[tokio::test]
    async fn missing_session_drops_reply() {
        let transport = Arc::new(MemoryTransport::new());
        let ctx = Context::new("me".into(), SessionId::from("never-seen"), transport.clone());
        let replied = bridge(Arc::new(SessionStore::new()))
            .on_response(&ctx, &"extractor".into(), StructuredOutputResponse::default())
            .await
            .unwrap();
        assert!(!replied);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn failing_calculation_still_replies_once() {
        let sessions = Arc::new(SessionStore::new());
        sessions.put(SessionId::from("s1"), "X".into());
        let transport = Arc::new(MemoryTransport::new());
        let ctx = Context::new("me".into(), SessionId::from("s1"), transport.clone());

        let output = match json!({"currency_from": "GBP", "currency_to": "JPY", "amount": 1.0}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let replied = bridge(sessions.clone())
            .on_response(&ctx, &"extractor".into(), StructuredOutputResponse::new(output))
            .await
            .unwrap();

        assert!(replied);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, AgentAddress::from("X"));
        match sent[0].decode().unwrap() {
            Payload::ChatMessage(msg) => {
                let text: Vec<_> = msg.text_parts().collect();
                assert!(text[0].contains("Error"));
            }
            other => panic!("expected chat reply, got {other:?}"),
        }
        assert!(sessions.is_empty());
    }
}
