//! Message routing: protocols, handlers and the dispatch table.
//!
//! A [`Protocol`] groups the handlers for a set of [`MessageKind`]s. The
//! [`Router`] merges the protocols an agent speaks into one table and
//! dispatches every inbound [`Envelope`] to the single handler registered
//! for its kind. Nothing that happens inside `dispatch` can fail the agent:
//! unknown kinds and malformed bodies are dropped, handler errors are logged.

pub mod chat;
pub mod reply;
pub mod structured;

pub use chat::{chat_protocol, ChatHandler, ChatProcessing, CHAT_PROTOCOL_NAME};
pub use reply::send_text;
pub use structured::{
    extraction_prompt, structured_output_protocol, StructuredOutputBridge,
    STRUCTURED_OUTPUT_PROTOCOL_NAME,
};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{CourierError, Result};
use crate::transport::Transport;
use crate::types::{AgentAddress, Envelope, MessageKind, Payload, SessionId};

/// Per-dispatch view of the agent: who we are, which conversation, how to send.
#[derive(Clone)]
pub struct Context {
    address: AgentAddress,
    session: SessionId,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("address", &self.address)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(address: AgentAddress, session: SessionId, transport: Arc<dyn Transport>) -> Self {
        Self {
            address,
            session,
            transport,
        }
    }

    /// Context for handling `envelope` on behalf of `address`.
    pub fn for_envelope(
        address: AgentAddress,
        envelope: &Envelope,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::new(address, envelope.session.clone(), transport)
    }

    pub fn address(&self) -> &AgentAddress {
        &self.address
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Send `payload` to `target` within the current conversation.
    pub async fn send(&self, target: &AgentAddress, payload: impl Into<Payload>) -> Result<()> {
        let envelope = Envelope::new(
            self.address.clone(),
            target.clone(),
            self.session.clone(),
            payload,
        )?;
        self.transport.send(envelope).await
    }
}

/// Handles decoded payloads of the kinds it is registered for.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, ctx: &Context, sender: &AgentAddress, payload: Payload) -> Result<()>;
}

/// A named, versioned set of message handlers.
#[derive(Clone)]
pub struct Protocol {
    name: String,
    version: String,
    handlers: HashMap<MessageKind, Arc<dyn MessageHandler>>,
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl Protocol {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `kind`, replacing any earlier one in this protocol.
    pub fn on_message(mut self, kind: MessageKind, handler: Arc<dyn MessageHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn kinds(&self) -> Vec<MessageKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.to_string());
        kinds
    }
}

struct Route {
    protocol: String,
    handler: Arc<dyn MessageHandler>,
}

/// What happened to a dispatched envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The handler completed.
    Handled(MessageKind),
    /// The handler returned an error, which was logged.
    Failed(MessageKind),
    /// No protocol handles this message type.
    Unhandled(String),
    /// The body did not match its declared type.
    Malformed(MessageKind),
}

/// Dispatch table from message kind to handler.
#[derive(Default)]
pub struct Router {
    routes: HashMap<MessageKind, Route>,
    protocols: Vec<(String, String)>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("protocols", &self.protocols)
            .finish_non_exhaustive()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every handler of `protocol` to the table.
    ///
    /// Fails without changing the table if any of its kinds is already
    /// claimed by a protocol included earlier.
    pub fn include(&mut self, protocol: Protocol) -> Result<()> {
        for kind in protocol.handlers.keys() {
            if let Some(existing) = self.routes.get(kind) {
                return Err(CourierError::DuplicateHandler {
                    kind: kind.to_string(),
                    protocol: existing.protocol.clone(),
                });
            }
        }

        tracing::debug!(
            protocol = %protocol.name,
            version = %protocol.version,
            kinds = ?protocol.kinds(),
            "including protocol"
        );
        for (kind, handler) in protocol.handlers {
            self.routes.insert(
                kind,
                Route {
                    protocol: protocol.name.clone(),
                    handler,
                },
            );
        }
        self.protocols.push((protocol.name, protocol.version));
        Ok(())
    }

    /// Builder-style [`Router::include`].
    pub fn with(mut self, protocol: Protocol) -> Result<Self> {
        self.include(protocol)?;
        Ok(self)
    }

    pub fn handles(&self, kind: MessageKind) -> bool {
        self.routes.contains_key(&kind)
    }

    /// `(name, version)` of every included protocol, in inclusion order.
    pub fn protocols(&self) -> &[(String, String)] {
        &self.protocols
    }

    /// Decode `envelope` and run the handler registered for its kind.
    pub async fn dispatch(&self, ctx: &Context, envelope: &Envelope) -> RouteOutcome {
        let Ok(kind) = envelope.kind() else {
            tracing::debug!(schema = %envelope.schema, sender = %envelope.sender, "dropping unknown message type");
            return RouteOutcome::Unhandled(envelope.schema.clone());
        };
        let Some(route) = self.routes.get(&kind) else {
            tracing::debug!(%kind, sender = %envelope.sender, "no handler registered; dropping");
            return RouteOutcome::Unhandled(envelope.schema.clone());
        };

        let payload = match envelope.decode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(%kind, sender = %envelope.sender, error = %e, "dropping malformed message");
                return RouteOutcome::Malformed(kind);
            }
        };

        match route.handler.handle(ctx, &envelope.sender, payload).await {
            Ok(()) => RouteOutcome::Handled(kind),
            Err(e) => {
                tracing::error!(
                    %kind,
                    protocol = %route.protocol,
                    sender = %envelope.sender,
                    session = %envelope.session,
                    error = %e,
                    "handler failed"
                );
                RouteOutcome::Failed(kind)
            }
        }
    }
}
