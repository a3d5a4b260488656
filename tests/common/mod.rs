//! Shared test helpers: a scripted calculator and agent builders.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use courier::agent::Agent;
use courier::calculation::{ConversationKey, CurrencyCalculator};
use courier::config::{AgentSettings, ProcessingMode};
use courier::error::{CourierError, Result};
use courier::transport::MemoryTransport;
use courier::types::{
    AgentAddress, CalculationRequest, ChatMessage, Envelope, Payload, StructuredOutputResponse,
};

pub const EXTRACTOR: &str = "agent1qextractor";
pub const ME: &str = "agent1qcourier";

/// Calculator that records every call and answers with a fixed shape.
#[derive(Default)]
pub struct ScriptedCalculator {
    calls: Mutex<Vec<(CalculationRequest, ConversationKey)>>,
    fail_with: Mutex<Option<String>>,
}

impl ScriptedCalculator {
    pub fn failing(message: &str) -> Self {
        let calc = Self::default();
        *calc.fail_with.lock().unwrap() = Some(message.to_string());
        calc
    }

    pub fn calls(&self) -> Vec<(CalculationRequest, ConversationKey)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CurrencyCalculator for ScriptedCalculator {
    async fn convert(
        &self,
        request: &CalculationRequest,
        conversation: &ConversationKey,
    ) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((request.clone(), conversation.clone()));
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(CourierError::provider("frankfurter", message));
        }
        Ok(format!(
            "{} {} -> {}",
            request.amount, request.currency_from, request.currency_to
        ))
    }
}

pub struct Harness {
    pub agent: Agent,
    pub transport: Arc<MemoryTransport>,
    pub calculator: Arc<ScriptedCalculator>,
}

pub fn harness(mode: ProcessingMode, calculator: ScriptedCalculator) -> Harness {
    let settings = AgentSettings::builder()
        .mode(mode)
        .extraction_agent(AgentAddress::from(EXTRACTOR))
        .build();
    harness_with(settings, calculator)
}

pub fn harness_with(settings: AgentSettings, calculator: ScriptedCalculator) -> Harness {
    let transport = Arc::new(MemoryTransport::new());
    let calculator = Arc::new(calculator);
    let agent = Agent::new(settings, transport.clone(), calculator.clone()).unwrap();
    Harness {
        agent,
        transport,
        calculator,
    }
}

pub fn chat(sender: &str, session: &str, text: &str) -> Envelope {
    Envelope::new(sender.into(), ME.into(), session.into(), ChatMessage::text(text)).unwrap()
}

pub fn structured_reply(session: &str, output: Value) -> Envelope {
    let output = match output {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Envelope::new(
        EXTRACTOR.into(),
        ME.into(),
        session.into(),
        StructuredOutputResponse::new(output),
    )
    .unwrap()
}

pub fn gbp_to_jpy() -> Value {
    json!({"currency_from": "GBP", "currency_to": "JPY", "amount": 1.0})
}

/// Joined text parts of a chat message envelope.
pub fn reply_text(envelope: &Envelope) -> String {
    match envelope.decode().unwrap() {
        Payload::ChatMessage(msg) => msg.text_parts().collect::<Vec<_>>().join("\n"),
        other => panic!("expected chat message, got {other:?}"),
    }
}
