//! In-process extraction of conversion parameters from free text.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{CalculationRequest, RateDate, DEFAULT_CURRENCY_FROM, DEFAULT_CURRENCY_TO};

/// ISO codes served by the Frankfurter rate provider.
pub const SUPPORTED_CODES: &[&str] = &[
    "AUD", "BGN", "BRL", "CAD", "CHF", "CNY", "CZK", "DKK", "EUR", "GBP", "HKD", "HUF", "IDR",
    "ILS", "INR", "ISK", "JPY", "KRW", "MXN", "MYR", "NOK", "NZD", "PHP", "PLN", "RON", "SEK",
    "SGD", "THB", "TRY", "USD", "ZAR",
];

// Lower-case forms that are also ordinary English words.
const AMBIGUOUS_LOWERCASE: &[&str] = &["try"];

const ALIASES: &[(&str, &str)] = &[
    ("$", "USD"),
    ("dollar", "USD"),
    ("dollars", "USD"),
    ("bucks", "USD"),
    ("€", "EUR"),
    ("euro", "EUR"),
    ("euros", "EUR"),
    ("£", "GBP"),
    ("pound", "GBP"),
    ("pounds", "GBP"),
    ("sterling", "GBP"),
    ("¥", "JPY"),
    ("yen", "JPY"),
    ("yuan", "CNY"),
    ("renminbi", "CNY"),
    ("rupee", "INR"),
    ("rupees", "INR"),
    ("franc", "CHF"),
    ("francs", "CHF"),
    ("peso", "MXN"),
    ("pesos", "MXN"),
    ("reais", "BRL"),
    ("rand", "ZAR"),
    ("zloty", "PLN"),
    ("krona", "SEK"),
    ("kronor", "SEK"),
    ("lira", "TRY"),
];

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?P<num>\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)|(?P<word>[A-Za-z]+|[$€£¥])")
            .expect("token pattern is valid")
    })
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("date pattern is valid"))
}

/// Resolve a word or symbol to an ISO currency code.
pub fn resolve_currency(token: &str) -> Option<&'static str> {
    if let Some(code) = SUPPORTED_CODES.iter().find(|code| **code == token) {
        return Some(code);
    }
    let lower = token.to_lowercase();
    if !AMBIGUOUS_LOWERCASE.contains(&lower.as_str()) {
        if let Some(code) = SUPPORTED_CODES
            .iter()
            .find(|code| code.eq_ignore_ascii_case(&lower))
        {
            return Some(code);
        }
    }
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, code)| *code)
}

/// Parse text such as "Convert 100 USD to EUR" into a request.
///
/// The first number is the amount, the first currency mentioned is the
/// source and the second is the target. Anything that cannot be found
/// uses the usual defaults.
pub fn parse_request(text: &str) -> CalculationRequest {
    let date = date_regex()
        .find(text)
        .and_then(|m| m.as_str().parse::<RateDate>().ok())
        .unwrap_or_default();
    let without_date = date_regex().replace_all(text, " ");

    let mut amount = None;
    let mut currencies: Vec<&'static str> = Vec::new();
    for caps in token_regex().captures_iter(&without_date) {
        if let Some(num) = caps.name("num") {
            if amount.is_none() {
                amount = num.as_str().replace(',', "").parse::<f64>().ok();
            }
        } else if let Some(word) = caps.name("word") {
            if let Some(code) = resolve_currency(word.as_str()) {
                if currencies.last() != Some(&code) {
                    currencies.push(code);
                }
            }
        }
    }

    let (from, to) = match currencies.as_slice() {
        [] => (DEFAULT_CURRENCY_FROM, DEFAULT_CURRENCY_TO),
        [only] if *only == DEFAULT_CURRENCY_TO => (*only, DEFAULT_CURRENCY_FROM),
        [only] => (*only, DEFAULT_CURRENCY_TO),
        [from, to, ..] => (*from, *to),
    };

    let mut request = CalculationRequest::new(from, to, amount.unwrap_or(1.0)).on_date(date);
    if !request.amount.is_finite() {
        request.amount = 1.0;
    }
    request
}
