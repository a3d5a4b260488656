//! Transport envelopes and the closed set of message kinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::extraction::{StructuredOutputPrompt, StructuredOutputResponse};
use super::message::{AgentAddress, ChatAcknowledgement, ChatMessage, SessionId};
use crate::error::{CourierError, Result};

/// Message-type identifier carried in [`Envelope::schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageKind {
    ChatMessage,
    ChatAcknowledgement,
    StructuredOutputPrompt,
    StructuredOutputResponse,
}

/// Decoded envelope body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    ChatMessage(ChatMessage),
    ChatAcknowledgement(ChatAcknowledgement),
    StructuredOutputPrompt(StructuredOutputPrompt),
    StructuredOutputResponse(StructuredOutputResponse),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::ChatMessage(_) => MessageKind::ChatMessage,
            Self::ChatAcknowledgement(_) => MessageKind::ChatAcknowledgement,
            Self::StructuredOutputPrompt(_) => MessageKind::StructuredOutputPrompt,
            Self::StructuredOutputResponse(_) => MessageKind::StructuredOutputResponse,
        }
    }

    fn to_value(&self) -> Result<serde_json::Value> {
        let value = match self {
            Self::ChatMessage(m) => serde_json::to_value(m)?,
            Self::ChatAcknowledgement(m) => serde_json::to_value(m)?,
            Self::StructuredOutputPrompt(m) => serde_json::to_value(m)?,
            Self::StructuredOutputResponse(m) => serde_json::to_value(m)?,
        };
        Ok(value)
    }
}

impl From<ChatMessage> for Payload {
    fn from(value: ChatMessage) -> Self {
        Self::ChatMessage(value)
    }
}

impl From<ChatAcknowledgement> for Payload {
    fn from(value: ChatAcknowledgement) -> Self {
        Self::ChatAcknowledgement(value)
    }
}

impl From<StructuredOutputPrompt> for Payload {
    fn from(value: StructuredOutputPrompt) -> Self {
        Self::StructuredOutputPrompt(value)
    }
}

impl From<StructuredOutputResponse> for Payload {
    fn from(value: StructuredOutputResponse) -> Self {
        Self::StructuredOutputResponse(value)
    }
}

/// An addressed unit on the wire.
///
/// The body stays as raw JSON until routing so that an unknown `schema`
/// or a malformed body can be dropped without touching the rest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub id: Uuid,
    pub sender: AgentAddress,
    pub target: AgentAddress,
    pub session: SessionId,
    pub schema: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default = "Utc::now")]
    pub sent_at: DateTime<Utc>,
}

impl Envelope {
    /// Encode a payload into a new envelope.
    pub fn new(
        sender: AgentAddress,
        target: AgentAddress,
        session: SessionId,
        payload: impl Into<Payload>,
    ) -> Result<Self> {
        let payload = payload.into();
        Ok(Self {
            id: Uuid::new_v4(),
            sender,
            target,
            session,
            schema: payload.kind().to_string(),
            payload: payload.to_value()?,
            sent_at: Utc::now(),
        })
    }

    /// Resolve the declared message type.
    pub fn kind(&self) -> Result<MessageKind> {
        self.schema
            .parse()
            .map_err(|_| CourierError::UnknownMessageType(self.schema.clone()))
    }

    /// Decode the body according to the declared message type.
    pub fn decode(&self) -> Result<Payload> {
        let body = self.payload.clone();
        let payload = match self.kind()? {
            MessageKind::ChatMessage => Payload::ChatMessage(serde_json::from_value(body)?),
            MessageKind::ChatAcknowledgement => {
                Payload::ChatAcknowledgement(serde_json::from_value(body)?)
            }
            MessageKind::StructuredOutputPrompt => {
                Payload::StructuredOutputPrompt(serde_json::from_value(body)?)
            }
            MessageKind::StructuredOutputResponse => {
                Payload::StructuredOutputResponse(serde_json::from_value(body)?)
            }
        };
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(schema: &str, payload: serde_json::Value) -> Envelope {
        Envelope {
            id: Uuid::new_v4(),
            sender: "agent1qsender".into(),
            target: "agent1qtarget".into(),
            session: "s1".into(),
            schema: schema.to_string(),
            payload,
            sent_at: Utc::now(),
        }
    }

    #[test]
    fn schema_names_are_snake_case() {
        assert_eq!(MessageKind::StructuredOutputResponse.to_string(), "structured_output_response");
        assert_eq!(
            "chat_acknowledgement".parse::<MessageKind>().unwrap(),
            MessageKind::ChatAcknowledgement
        );
    }

    #[test]
    fn new_envelope_records_schema_and_decodes_back() {
        let message = ChatMessage::text("hello");
        let env = Envelope::new("a".into(), "b".into(), "s1".into(), message.clone()).unwrap();
        assert_eq!(env.schema, "chat_message");
        assert_eq!(env.decode().unwrap(), Payload::ChatMessage(message));
    }

    #[test]
    fn unknown_schema_is_reported() {
        let env = envelope("weather_report", json!({}));
        assert!(matches!(
            env.decode(),
            Err(CourierError::UnknownMessageType(schema)) if schema == "weather_report"
        ));
    }

    #[test]
    fn malformed_body_is_a_serialization_error() {
        let env = envelope("chat_message", json!({"content": "not-a-list"}));
        assert!(matches!(env.decode(), Err(CourierError::Serialization(_))));
    }

    #[test]
    fn structured_response_tolerates_missing_output() {
        let env = envelope("structured_output_response", json!({}));
        assert_eq!(
            env.decode().unwrap(),
            Payload::StructuredOutputResponse(StructuredOutputResponse::default())
        );
    }
}
