//! Chat protocol: acknowledge every message, then answer each text part.

use std::sync::Arc;

use async_trait::async_trait;

use super::structured::extraction_prompt;
use super::{reply, Context, MessageHandler, Protocol};
use crate::calculation::{parse_request, CalculationAdapter, ConversationKey};
use crate::error::{CourierError, Result};
use crate::session::{PendingSession, SessionStore};
use crate::types::{AgentAddress, ChatAcknowledgement, ChatMessage, MessageKind, Payload};

pub const CHAT_PROTOCOL_NAME: &str = "AgentChatProtocol";
pub const CHAT_PROTOCOL_VERSION: &str = "0.3.0";

/// How this deployment turns text into a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatProcessing {
    /// Parse locally and reply immediately.
    Direct,
    /// Ask `extraction_agent` for structured parameters; the reply is sent
    /// later by the structured-output bridge.
    Delegated { extraction_agent: AgentAddress },
}

/// Handler for [`ChatMessage`] and [`ChatAcknowledgement`].
#[derive(Debug)]
pub struct ChatHandler {
    processing: ChatProcessing,
    sessions: Arc<SessionStore>,
    calculator: CalculationAdapter,
}

impl ChatHandler {
    pub fn new(
        processing: ChatProcessing,
        sessions: Arc<SessionStore>,
        calculator: CalculationAdapter,
    ) -> Self {
        Self {
            processing,
            sessions,
            calculator,
        }
    }

    pub async fn on_message(&self, ctx: &Context, sender: &AgentAddress, msg: ChatMessage) {
        if let Some(text) = msg.text_parts().next() {
            tracing::info!(%sender, session = %ctx.session(), text, "got currency request");
        }

        if let Err(e) = ctx
            .send(sender, ChatAcknowledgement::for_message(msg.msg_id))
            .await
        {
            tracing::warn!(%sender, msg_id = %msg.msg_id, error = %e, "failed to acknowledge message");
        }

        for text in msg.text_parts() {
            if let Err(e) = self.process_text(ctx, sender, text).await {
                tracing::error!(%sender, session = %ctx.session(), error = %e, "error processing currency request");
                let apology = format!("Sorry, I encountered an error: {e}");
                if let Err(send_err) = reply::send_text(ctx, sender, apology).await {
                    tracing::error!(%sender, error = %send_err, "failed to deliver error reply");
                }
            }
        }
    }

    pub fn on_acknowledgement(&self, sender: &AgentAddress, ack: &ChatAcknowledgement) {
        tracing::info!(%sender, acknowledged = %ack.acknowledged_msg_id, "received acknowledgement");
    }

    async fn process_text(&self, ctx: &Context, sender: &AgentAddress, text: &str) -> Result<()> {
        match &self.processing {
            ChatProcessing::Direct => {
                tracing::info!(%sender, text, "processing currency query");
                let request = parse_request(text);
                let result = self
                    .calculator
                    .compute(&request, &ConversationKey::for_sender(sender))
                    .await;
                reply::send_text(ctx, sender, result).await?;
                tracing::info!(%sender, "sent currency response");
                Ok(())
            }
            ChatProcessing::Delegated { extraction_agent } => {
                self.delegate(ctx, sender, text, extraction_agent).await
            }
        }
    }

    async fn delegate(
        &self,
        ctx: &Context,
        sender: &AgentAddress,
        text: &str,
        extraction_agent: &AgentAddress,
    ) -> Result<()> {
        let pending = PendingSession::new(sender.clone());
        let request_id = pending.request_id;
        if let Some(previous) = self.sessions.put_pending(ctx.session().clone(), pending) {
            // Replies are matched by session only, so the earlier request's
            // answer will now go to this sender.
            tracing::warn!(
                session = %ctx.session(),
                previous_sender = %previous.sender,
                previous_request = %previous.request_id,
                "replaced in-flight delegation for session"
            );
        }

        tracing::info!(
            %extraction_agent,
            session = %ctx.session(),
            %request_id,
            "sending structured output request"
        );
        if let Err(e) = ctx.send(extraction_agent, extraction_prompt(text)).await {
            self.sessions.withdraw(ctx.session(), request_id);
            return Err(CourierError::Transport(format!(
                "could not reach extraction agent {extraction_agent}: {e}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for ChatHandler {
    async fn handle(&self, ctx: &Context, sender: &AgentAddress, payload: Payload) -> Result<()> {
        match payload {
            Payload::ChatMessage(msg) => {
                self.on_message(ctx, sender, msg).await;
                Ok(())
            }
            Payload::ChatAcknowledgement(ack) => {
                self.on_acknowledgement(sender, &ack);
                Ok(())
            }
            other => Err(CourierError::InvalidArgument(format!(
                "chat protocol cannot handle {}",
                other.kind()
            ))),
        }
    }
}

/// The chat protocol with `handler` serving both of its message kinds.
pub fn chat_protocol(handler: Arc<ChatHandler>) -> Protocol {
    Protocol::new(CHAT_PROTOCOL_NAME, CHAT_PROTOCOL_VERSION)
        .on_message(MessageKind::ChatMessage, handler.clone())
        .on_message(MessageKind::ChatAcknowledgement, handler)
}
