//! Core Agent struct: protocols, session store and collaborators wired together.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::calculation::{
    parse_request, CalculationAdapter, ConversationKey, CurrencyCalculator, FrankfurterClient,
    RateConverter,
};
use crate::config::{AgentSettings, ProcessingMode};
use crate::error::{CourierError, Result};
use crate::protocol::{
    chat_protocol, structured_output_protocol, ChatHandler, ChatProcessing, Context, RouteOutcome,
    Router, StructuredOutputBridge,
};
use crate::session::SessionStore;
use crate::transport::Transport;
use crate::types::{AgentAddress, Envelope};

/// Conversation key used for one-shot direct queries outside any chat.
pub const DIRECT_QUERY_CONVERSATION: &str = "http_session";

/// A currency agent: routes inbound envelopes and replies through a transport.
///
/// Cloning is cheap; clones share the router, session store and transport.
#[derive(Clone)]
pub struct Agent {
    settings: Arc<AgentSettings>,
    address: AgentAddress,
    router: Arc<Router>,
    sessions: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
    calculator: CalculationAdapter,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.settings.name)
            .field("address", &self.address)
            .field("mode", &self.settings.mode)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Build an agent around an explicit calculator.
    ///
    /// The chat protocol is always included; the structured-output client
    /// protocol only in delegated mode.
    pub fn new(
        settings: AgentSettings,
        transport: Arc<dyn Transport>,
        calculator: Arc<dyn CurrencyCalculator>,
    ) -> Result<Self> {
        settings.validate()?;

        let mut sessions = SessionStore::new();
        if let Some(ttl) = settings.session_ttl() {
            sessions = sessions.with_ttl(ttl);
        }
        let sessions = Arc::new(sessions);
        let adapter = CalculationAdapter::new(calculator).with_timeout(settings.request_timeout());

        let processing = match settings.mode {
            ProcessingMode::Direct => ChatProcessing::Direct,
            ProcessingMode::Delegated => ChatProcessing::Delegated {
                extraction_agent: settings.extraction_agent.clone().ok_or_else(|| {
                    CourierError::Configuration(
                        "delegated mode requires an extraction_agent address".to_string(),
                    )
                })?,
            },
        };

        let mut router = Router::new();
        router.include(chat_protocol(Arc::new(ChatHandler::new(
            processing,
            sessions.clone(),
            adapter.clone(),
        ))))?;
        if settings.mode == ProcessingMode::Delegated {
            router.include(structured_output_protocol(Arc::new(
                StructuredOutputBridge::new(sessions.clone(), adapter.clone()),
            )))?;
        }

        Ok(Self {
            address: settings.address(),
            settings: Arc::new(settings),
            router: Arc::new(router),
            sessions,
            transport,
            calculator: adapter,
            shutdown: CancellationToken::new(),
        })
    }

    /// Build an agent that converts with live Frankfurter rates.
    pub fn from_settings(settings: AgentSettings, transport: Arc<dyn Transport>) -> Result<Self> {
        let client =
            FrankfurterClient::with_timeout(settings.rates_base_url.clone(), settings.request_timeout())?;
        let converter = RateConverter::new(Arc::new(client));
        Self::new(settings, transport, Arc::new(converter))
    }

    pub fn address(&self) -> &AgentAddress {
        &self.address
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Token that stops [`Agent::run`] when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Route one inbound envelope to completion.
    pub async fn handle(&self, envelope: Envelope) -> RouteOutcome {
        if envelope.target != self.address {
            tracing::debug!(
                target_address = %envelope.target,
                own = %self.address,
                "envelope addressed to another agent"
            );
        }
        let ctx = Context::for_envelope(self.address.clone(), &envelope, self.transport.clone());
        self.router.dispatch(&ctx, &envelope).await
    }

    /// One round of direct text-in/text-out processing, bypassing delegation.
    pub async fn query(&self, text: &str) -> String {
        let request = parse_request(text);
        self.calculator
            .compute(&request, &ConversationKey::new(DIRECT_QUERY_CONVERSATION))
            .await
    }
}
