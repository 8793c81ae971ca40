use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::Competitor;

/// Fatal parse failures for the competitor identification response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("response is not valid JSON: {detail}")]
    InvalidJson { detail: String },
    #[error("response JSON has no `competitors` array")]
    MissingCompetitors,
}

static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("percent regex compiles"));

/// Parse the identification response into at most `limit` competitors.
///
/// Models wrap JSON in code fences or emit almost-JSON (trailing commas,
/// single quotes) often enough that we strip fences first and fall back to
/// json5 when strict parsing fails. Only two conditions are fatal: text
/// that is not JSON at all, and JSON without a top-level `competitors`
/// array. Malformed individual entries are skipped with a warning.
pub fn parse_competitor_response(raw: &str, limit: usize) -> Result<Vec<Competitor>, ParseError> {
    let payload = extract_json_payload(raw);
    let value = parse_relaxed(&payload)?;

    let entries = value
        .get("competitors")
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingCompetitors)?;

    let mut competitors = Vec::with_capacity(entries.len().min(limit));
    for entry in entries {
        match WireCompetitor::deserialize(entry) {
            Ok(wire) => competitors.push(wire.into_competitor()),
            Err(err) => {
                warn!(%err, "skipping malformed competitor entry");
            }
        }
    }

    if competitors.len() > limit {
        warn!(
            returned = competitors.len(),
            limit, "model returned more competitors than requested; truncating"
        );
        competitors.truncate(limit);
    }

    Ok(competitors)
}

fn parse_relaxed(payload: &str) -> Result<Value, ParseError> {
    match serde_json::from_str(payload) {
        Ok(value) => Ok(value),
        Err(strict_err) => json5::from_str(payload).map_err(|_| ParseError::InvalidJson {
            detail: strict_err.to_string(),
        }),
    }
}

/// Competitor entry as emitted on the wire. `market_share` is whatever the
/// model produced; the percentage is recovered best-effort.
#[derive(Deserialize)]
struct WireCompetitor {
    name: String,
    #[serde(default)]
    products: Vec<String>,
    #[serde(default)]
    market_share: Value,
    #[serde(default)]
    differentiation: String,
}

impl WireCompetitor {
    fn into_competitor(self) -> Competitor {
        let market_share_percent = market_share_percent(&self.market_share);
        Competitor {
            name: self.name,
            products: self.products,
            market_share_percent,
            differentiation: self.differentiation,
        }
    }
}

/// Extract a numeric percentage from a loosely-typed market-share value.
/// Accepts `"20%"`, `"20.5 %"`, `"20"`, and bare JSON numbers; anything
/// else yields `None` rather than an error.
pub fn market_share_percent(value: &Value) -> Option<f32> {
    match value {
        Value::Number(number) => number.as_f64().map(|v| v as f32),
        Value::String(text) => {
            if let Some(captures) = PERCENT_RE.captures(text) {
                captures[1].parse().ok()
            } else {
                text.trim().parse().ok()
            }
        }
        _ => None,
    }
}

/// Strip a surrounding markdown code fence (``` or ```json) if present.
pub fn extract_json_payload(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let mut body = rest.trim_start();
    if let Some(after_tag) = body.strip_prefix("json") {
        body = after_tag.trim_start();
    }
    let end = body.rfind("```").unwrap_or(body.len());
    body[..end].trim().to_string()
}
