//! HTTP surface for one-shot conversions.

use std::net::SocketAddr;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::error::{CourierError, Result};

/// Body of `POST /currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRequest {
    pub text: String,
}

/// Reply of `POST /currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyResponse {
    pub response: String,
    pub agent_address: String,
    /// Unix seconds.
    pub timestamp: i64,
}

pub fn router(agent: Agent) -> Router {
    Router::new()
        .route("/currency", post(convert))
        .route("/health", get(health))
        .with_state(agent)
}

async fn convert(State(agent): State<Agent>, Json(body): Json<CurrencyRequest>) -> Json<CurrencyResponse> {
    tracing::info!(text = %body.text, "received REST currency query");
    let response = agent.query(&body.text).await;
    Json(CurrencyResponse {
        response,
        agent_address: agent.address().to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

async fn health() -> &'static str {
    "ok"
}

/// Serve the REST routes on `bind` until `agent` is shut down.
pub async fn serve(agent: Agent, bind: &str) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .map_err(|_| CourierError::Configuration(format!("invalid rest_bind '{bind}'")))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "REST endpoint listening");

    let shutdown = agent.shutdown_token();
    axum::serve(listener, router(agent))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::calculation::{ConversationKey, CurrencyCalculator, RESULT_HEADING};
    use crate::config::AgentSettings;
    use crate::transport::MemoryTransport;
    use crate::types::CalculationRequest;

    struct Fixed;

    #[async_trait]
    impl CurrencyCalculator for Fixed {
        async fn convert(&self, request: &CalculationRequest, conversation: &ConversationKey) -> Result<String> {
            Ok(format!("{} {} in {conversation}", request.amount, request.currency_from))
        }
    }

    fn agent() -> Agent {
        Agent::new(AgentSettings::default(), Arc::new(MemoryTransport::new()), Arc::new(Fixed)).unwrap()
    }

    #[tokio::test]
    async fn currency_endpoint_answers_with_agent_address() {
        let agent = agent();
        let request = Request::post("/currency")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text":"Convert 100 USD to EUR"}"#))
            .unwrap();
        let response = router(agent.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: CurrencyResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.response, format!("{RESULT_HEADING}\n\n100 USD in http_session"));
        assert_eq!(body.agent_address, agent.address().to_string());
        assert!(body.timestamp > 0);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = router(agent())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn missing_text_is_rejected() {
        let request = Request::post("/currency")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = router(agent()).oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }
}
