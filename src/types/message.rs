//! Chat protocol message types and agent identities.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Prefix shared by every derived agent address.
pub const ADDRESS_PREFIX: &str = "agent1q";

/// Opaque addressable identity of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentAddress(String);

impl AgentAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Derive a stable address from a seed phrase.
    ///
    /// The same seed always yields the same address, so an agent restarted
    /// with its seed stays reachable at the address peers already know.
    pub fn from_seed(seed: &str) -> Self {
        let digest = Sha256::digest(seed.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self(format!("{ADDRESS_PREFIX}{hex}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AgentAddress {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Conversation-scoped key supplied by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A single typed part of a chat message.
///
/// Only [`ContentPart::Text`] is acted on; every other variant is carried
/// through untouched. Inside a [`ChatMessage`], unknown or ill-shaped parts
/// decode as [`ContentPart::Unsupported`] instead of failing the whole message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Resource {
        resource_id: Uuid,
        #[serde(default)]
        resource: serde_json::Value,
    },
    Metadata {
        metadata: HashMap<String, String>,
    },
    StartSession,
    EndSession,
    #[serde(other)]
    Unsupported,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// An inbound or outbound chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub timestamp: DateTime<Utc>,
    pub msg_id: Uuid,
    #[serde(default, deserialize_with = "lenient_parts")]
    pub content: Vec<ContentPart>,
}

fn lenient_parts<'de, D>(deserializer: D) -> Result<Vec<ContentPart>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|part| ContentPart::deserialize(part).unwrap_or(ContentPart::Unsupported))
        .collect())
}

impl ChatMessage {
    /// Build a message with a fresh id and the current time.
    pub fn new(content: Vec<ContentPart>) -> Self {
        Self {
            timestamp: Utc::now(),
            msg_id: Uuid::new_v4(),
            content,
        }
    }

    /// Build a message carrying a single text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![ContentPart::text(text)])
    }

    /// Iterate the text parts in order, skipping every other part type.
    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|part| match part {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Receipt for a specific inbound [`ChatMessage`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatAcknowledgement {
    pub timestamp: DateTime<Utc>,
    pub acknowledged_msg_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl ChatAcknowledgement {
    pub fn for_message(msg_id: Uuid) -> Self {
        Self {
            timestamp: Utc::now(),
            acknowledged_msg_id: msg_id,
            metadata: None,
        }
    }
}
