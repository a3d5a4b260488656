//! Normalized currency conversion parameters.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::CourierError;

/// Source currency used when none could be determined.
pub const DEFAULT_CURRENCY_FROM: &str = "USD";
/// Target currency used when none could be determined.
pub const DEFAULT_CURRENCY_TO: &str = "EUR";
/// Quantity used when none could be determined.
pub const DEFAULT_AMOUNT: f64 = 1.0;

/// Which day's rates to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateDate {
    #[default]
    Latest,
    On(NaiveDate),
}

impl fmt::Display for RateDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::On(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl FromStr for RateDate {
    type Err = CourierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(Self::On)
            .map_err(|e| CourierError::InvalidArgument(format!("invalid rate date '{s}': {e}")))
    }
}

impl Serialize for RateDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RateDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parameters handed to the currency calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRequest {
    pub currency_from: String,
    pub currency_to: String,
    #[serde(default = "default_amount")]
    pub amount: f64,
    #[serde(default)]
    pub currency_date: RateDate,
}

fn default_amount() -> f64 {
    DEFAULT_AMOUNT
}

impl Default for CalculationRequest {
    fn default() -> Self {
        Self {
            currency_from: DEFAULT_CURRENCY_FROM.to_string(),
            currency_to: DEFAULT_CURRENCY_TO.to_string(),
            amount: DEFAULT_AMOUNT,
            currency_date: RateDate::Latest,
        }
    }
}

impl CalculationRequest {
    /// Build a request, normalizing currency codes to upper case.
    pub fn new(currency_from: &str, currency_to: &str, amount: f64) -> Self {
        Self {
            currency_from: normalize_code(currency_from),
            currency_to: normalize_code(currency_to),
            amount,
            currency_date: RateDate::Latest,
        }
    }

    pub fn on_date(mut self, date: RateDate) -> Self {
        self.currency_date = date;
        self
    }

    /// Fold a structured-output mapping into a request.
    ///
    /// Absent or ill-typed fields fall back to the documented defaults
    /// instead of failing; numeric strings are accepted for `amount`.
    pub fn from_output(output: &Map<String, Value>) -> Self {
        let currency_from = code_field(output, "currency_from")
            .unwrap_or_else(|| DEFAULT_CURRENCY_FROM.to_string());
        let currency_to =
            code_field(output, "currency_to").unwrap_or_else(|| DEFAULT_CURRENCY_TO.to_string());

        let amount = match output.get("amount") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|a| a.is_finite())
        .unwrap_or(DEFAULT_AMOUNT);

        let currency_date = output
            .get("currency_date")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            currency_from,
            currency_to,
            amount,
            currency_date,
        }
    }

    /// JSON Schema advertised to structured-output agents.
    pub fn output_schema() -> Value {
        serde_json::json!({
            "title": "CurrencyCalculationRequest",
            "type": "object",
            "properties": {
                "currency_from": {
                    "title": "Currency From",
                    "type": "string",
                    "description": "Source currency code, e.g. USD"
                },
                "currency_to": {
                    "title": "Currency To",
                    "type": "string",
                    "description": "Target currency code, e.g. EUR"
                },
                "amount": {
                    "title": "Amount",
                    "type": "number",
                    "default": DEFAULT_AMOUNT
                }
            },
            "required": ["currency_from", "currency_to"]
        })
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn code_field(output: &Map<String, Value>, key: &str) -> Option<String> {
    output
        .get(key)
        .and_then(Value::as_str)
        .map(normalize_code)
        .filter(|code| !code.is_empty())
}
