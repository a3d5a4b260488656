//! Outbound text replies.

use super::Context;
use crate::error::Result;
use crate::types::{AgentAddress, ChatMessage};

/// Send `text` to `recipient` as a fresh chat message.
///
/// No acknowledgement is awaited.
pub async fn send_text(ctx: &Context, recipient: &AgentAddress, text: impl Into<String>) -> Result<()> {
    let message = ChatMessage::text(text);
    let msg_id = message.msg_id;
    ctx.send(recipient, message).await?;
    tracing::debug!(%recipient, %msg_id, session = %ctx.session(), "sent reply");
    Ok(())
}
