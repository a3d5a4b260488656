//! Agent run loop and abandoned-session sweeping.

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval, Interval, MissedTickBehavior};

use super::Agent;
use crate::config::ExpiryPolicy;
use crate::error::Result;
use crate::protocol::{send_text, Context};
use crate::types::Envelope;

/// Reply sent to a requester whose delegation expired under [`ExpiryPolicy::NotifySender`].
pub const EXPIRED_REQUEST_TEXT: &str =
    "Sorry, your currency request timed out before the extraction agent replied. Please try again.";

impl Agent {
    /// Serve `inbound` until the channel closes or shutdown is requested.
    ///
    /// Each envelope is handled in its own task so a slow conversation
    /// never holds up another. In-flight tasks are drained before returning.
    pub async fn run(&self, mut inbound: mpsc::Receiver<Envelope>) -> Result<()> {
        tracing::info!(
            name = %self.settings().name,
            address = %self.address(),
            mode = %self.settings().mode,
            "agent started"
        );

        let shutdown = self.shutdown_token();
        let mut sweeper = self.settings().session_ttl().map(|_| {
            let mut ticker = interval(self.settings().sweep_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                received = inbound.recv() => {
                    let Some(envelope) = received else {
                        tracing::info!("inbound channel closed");
                        break;
                    };
                    let agent = self.clone();
                    tasks.spawn(async move {
                        agent.handle(envelope).await;
                    });
                }
                _ = tick(&mut sweeper), if sweeper.is_some() => {
                    self.sweep_expired().await;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "message task panicked");
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "message task panicked");
            }
        }
        tracing::info!(pending_sessions = self.sessions().len(), "agent stopped");
        Ok(())
    }

    /// Evict expired delegations, notifying senders if configured.
    ///
    /// Returns the number of evicted sessions.
    pub async fn sweep_expired(&self) -> usize {
        let evicted = self.sessions().evict_expired();
        for (session, pending) in &evicted {
            tracing::warn!(
                %session,
                sender = %pending.sender,
                request_id = %pending.request_id,
                "delegation expired without a structured output reply"
            );
            if self.settings().expiry_policy == ExpiryPolicy::NotifySender {
                let ctx = Context::new(self.address().clone(), session.clone(), self.transport().clone());
                if let Err(e) = send_text(&ctx, &pending.sender, EXPIRED_REQUEST_TEXT).await {
                    tracing::error!(%session, error = %e, "failed to notify expired requester");
                }
            }
        }
        evicted.len()
    }
}

async fn tick(sweeper: &mut Option<Interval>) {
    match sweeper {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::calculation::{ConversationKey, CurrencyCalculator};
    use crate::config::{AgentSettings, ProcessingMode};
    use crate::protocol::RouteOutcome;
    use crate::transport::MemoryTransport;
    use crate::types::{AgentAddress, CalculationRequest, ChatMessage, MessageKind, Payload};

    struct Fixed;

    #[async_trait]
    impl CurrencyCalculator for Fixed {
        async fn convert(
            &self,
            request: &CalculationRequest,
            _: &ConversationKey,
        ) -> crate::error::Result<String> {
            Ok(format!("{} {} -> {}", request.amount, request.currency_from, request.currency_to))
        }
    }

    fn delegated(ttl: Option<u64>, policy: ExpiryPolicy) -> (Agent, Arc<MemoryTransport>) {
        let settings = AgentSettings::builder()
            .mode(ProcessingMode::Delegated)
            .extraction_agent(AgentAddress::from("extractor"))
            .maybe_session_ttl_secs(ttl)
            .sweep_interval_secs(1)
            .expiry_policy(policy)
            .build();
        let transport = Arc::new(MemoryTransport::new());
        let agent = Agent::new(settings, transport.clone(), Arc::new(Fixed)).unwrap();
        (agent, transport)
    }

    fn chat(from: &str, session: &str, text: &str) -> Envelope {
        Envelope::new(from.into(), "me".into(), session.into(), ChatMessage::text(text)).unwrap()
    }

    #[test]
    fn direct_mode_skips_structured_protocol() {
        let agent = Agent::new(
            AgentSettings::default(),
            Arc::new(MemoryTransport::new()),
            Arc::new(Fixed),
        )
        .unwrap();
        assert!(agent.router().handles(MessageKind::ChatMessage));
        assert!(!agent.router().handles(MessageKind::StructuredOutputResponse));
    }

    #[test]
    fn delegated_mode_without_extraction_agent_is_rejected() {
        let settings = AgentSettings::builder().mode(ProcessingMode::Delegated).build();
        let err = Agent::new(settings, Arc::new(MemoryTransport::new()), Arc::new(Fixed))
            .unwrap_err();
        assert!(err.to_string().contains("extraction_agent"));
    }

    #[tokio::test]
    async fn query_uses_local_parser() {
        let agent = Agent::new(
            AgentSettings::default(),
            Arc::new(MemoryTransport::new()),
            Arc::new(Fixed),
        )
        .unwrap();
        let text = agent.query("Convert 100 USD to EUR").await;
        assert!(text.ends_with("100 USD -> EUR"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_notifies_abandoned_requester() {
        let (agent, transport) = delegated(Some(30), ExpiryPolicy::NotifySender);
        let outcome = agent.handle(chat("X", "s1", "Convert 5 USD to EUR")).await;
        assert_eq!(outcome, RouteOutcome::Handled(MessageKind::ChatMessage));
        transport.take_sent();

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(agent.sweep_expired().await, 1);
        assert!(agent.sessions().is_empty());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, AgentAddress::from("X"));
        match sent[0].decode().unwrap() {
            Payload::ChatMessage(msg) => {
                assert_eq!(msg.text_parts().next(), Some(EXPIRED_REQUEST_TEXT))
            }
            other => panic!("expected chat reply, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn silent_sweep_sends_nothing() {
        let (agent, transport) = delegated(Some(30), ExpiryPolicy::Silent);
        agent.handle(chat("X", "s1", "Convert 5 USD to EUR")).await;
        transport.take_sent();

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(agent.sweep_expired().await, 1);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn run_answers_every_sender_before_channel_closes() {
        let transport = Arc::new(MemoryTransport::new());
        let agent = Agent::new(AgentSettings::default(), transport.clone(), Arc::new(Fixed)).unwrap();
        let (tx, rx) = mpsc::channel(8);
        let run = tokio::spawn({
            let agent = agent.clone();
            async move { agent.run(rx).await }
        });

        tx.send(chat("X", "s1", "Convert 1 GBP to JPY")).await.unwrap();
        tx.send(chat("Y", "s2", "Convert 2 USD to EUR")).await.unwrap();
        let sent = transport.wait_for(4, Duration::from_secs(5)).await.unwrap();
        drop(tx);
        run.await.unwrap().unwrap();

        for (sender, expected) in [("X", "1 GBP -> JPY"), ("Y", "2 USD -> EUR")] {
            let to_sender: Vec<_> = sent
                .iter()
                .filter(|e| e.target == AgentAddress::from(sender))
                .collect();
            assert_eq!(to_sender.len(), 2, "sender {sender}");
            assert_eq!(to_sender[0].kind().unwrap(), MessageKind::ChatAcknowledgement);
            match to_sender[1].decode().unwrap() {
                Payload::ChatMessage(msg) => {
                    assert!(msg.text_parts().next().unwrap().ends_with(expected))
                }
                other => panic!("expected chat reply, got {other:?}"),
            }
        }
        assert_eq!(transport.sent().len(), 4);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (agent, _) = delegated(None, ExpiryPolicy::Silent);
        let (_tx, rx) = mpsc::channel::<Envelope>(1);
        let token = agent.shutdown_token();
        let handle = tokio::spawn({
            let agent = agent.clone();
            async move { agent.run(rx).await }
        });
        token.cancel();
        handle.await.unwrap().unwrap();
    }
}
