//! Rate-backed currency calculator with per-conversation history.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;

use super::rates::RateProvider;
use super::{ConversationKey, CurrencyCalculator};
use crate::error::{CourierError, Result};
use crate::types::CalculationRequest;

const DEFAULT_HISTORY_LIMIT: usize = 20;

/// One completed conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRecord {
    pub request: CalculationRequest,
    pub rate: f64,
    pub converted: f64,
    pub date: Option<NaiveDate>,
}

impl ConversionRecord {
    pub fn summary(&self) -> String {
        let date = self
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "today".to_string());
        format!(
            "{} {} = {:.2} {} (rate {}, {})",
            self.request.amount,
            self.request.currency_from,
            self.converted,
            self.request.currency_to,
            self.rate,
            date
        )
    }
}

/// Conversions performed so far, grouped by conversation.
#[derive(Debug)]
pub struct ConversationMemory {
    conversations: Mutex<HashMap<ConversationKey, Vec<ConversionRecord>>>,
    limit: usize,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` records per conversation, dropping the oldest.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            limit: limit.max(1),
        }
    }

    pub fn record(&self, key: &ConversationKey, record: ConversionRecord) {
        let mut conversations = self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let history = conversations.entry(key.clone()).or_default();
        history.push(record);
        if history.len() > self.limit {
            let excess = history.len() - self.limit;
            history.drain(..excess);
        }
    }

    pub fn history(&self, key: &ConversationKey) -> Vec<ConversionRecord> {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Forget a conversation.
    pub fn remove(&self, key: &ConversationKey) -> Option<Vec<ConversionRecord>> {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn conversation_keys(&self) -> Vec<ConversationKey> {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

/// Converts amounts using quotes from a [`RateProvider`].
pub struct RateConverter {
    provider: Arc<dyn RateProvider>,
    memory: Arc<ConversationMemory>,
}

impl RateConverter {
    pub fn new(provider: Arc<dyn RateProvider>) -> Self {
        Self {
            provider,
            memory: Arc::new(ConversationMemory::new()),
        }
    }

    pub fn with_memory(mut self, memory: Arc<ConversationMemory>) -> Self {
        self.memory = memory;
        self
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    async fn resolve(&self, request: &CalculationRequest) -> Result<ConversionRecord> {
        if request.currency_from == request.currency_to {
            return Ok(ConversionRecord {
                request: request.clone(),
                rate: 1.0,
                converted: request.amount,
                date: None,
            });
        }

        let quote = self
            .provider
            .quote(
                &request.currency_from,
                &request.currency_to,
                request.currency_date,
            )
            .await?;
        let rate = quote.rate_for(&request.currency_to).ok_or_else(|| {
            CourierError::provider(
                "frankfurter",
                format!("no {} rate in response", request.currency_to),
            )
        })?;

        Ok(ConversionRecord {
            request: request.clone(),
            rate,
            converted: request.amount * rate,
            date: Some(quote.date),
        })
    }
}

#[async_trait]
impl CurrencyCalculator for RateConverter {
    async fn convert(
        &self,
        request: &CalculationRequest,
        conversation: &ConversationKey,
    ) -> Result<String> {
        let record = self.resolve(request).await?;
        let summary = record.summary();
        self.memory.record(conversation, record);
        Ok(summary)
    }
}
