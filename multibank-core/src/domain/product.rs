//! Product domain model and recommendation keys

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bank product offer, fetched per request and never persisted
///
/// `product_type` is a freeform string using the banks' nomenclature.
/// Common values are "deposit", "loan", "card" and "account", but any
/// string is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub product_type: String,
    pub product_name: String,
    pub description: String,
    /// Banks report rates/amounts as native numbers; a malformed or missing
    /// value parses to zero rather than failing the whole product.
    pub interest_rate: f64,
    pub min_amount: f64,
    pub max_amount: f64,
    pub term_months: i32,

    // Owning bank, for attribution in merged results
    pub bank_id: i64,
    pub bank_code: String,
    pub bank_name: String,
    pub fetched_at: DateTime<Utc>,

    /// Computed by set-membership lookup at response time, not stored
    pub is_recommended: bool,
}

impl Product {
    /// Recommendation key for this product
    pub fn recommendation_key(&self) -> RecommendationKey {
        RecommendationKey::new(&self.product_id, &self.bank_code, &self.product_type)
    }
}

/// Filter for the product aggregation fan-out
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Restrict to one product type (passed through to each bank)
    pub product_type: Option<String>,
    /// Restrict the fan-out to these bank ids (empty = all enabled)
    pub bank_ids: Vec<i64>,
}

/// Bank-agnostic key identifying an explicitly recommended product
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecommendationKey {
    pub product_id: String,
    pub bank_code: String,
    pub product_type: String,
}

impl RecommendationKey {
    pub fn new(
        product_id: impl Into<String>,
        bank_code: impl Into<String>,
        product_type: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            bank_code: bank_code.into(),
            product_type: product_type.into(),
        }
    }
}

/// A stored recommendation rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRule {
    pub key: RecommendationKey,
    pub created_at: DateTime<Utc>,
}

/// Parse a bank-reported decimal that may be missing, use a comma decimal
/// separator, or be outright garbage. Malformed input yields zero.
pub fn parse_amount_or_zero(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return 0.0;
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_or_zero() {
        assert_eq!(parse_amount_or_zero(Some("12.5")), 12.5);
        assert_eq!(parse_amount_or_zero(Some("12,5")), 12.5);
        assert_eq!(parse_amount_or_zero(Some("  7 ")), 7.0);
        assert_eq!(parse_amount_or_zero(Some("")), 0.0);
        assert_eq!(parse_amount_or_zero(Some("garbage")), 0.0);
        assert_eq!(parse_amount_or_zero(Some("NaN")), 0.0);
        assert_eq!(parse_amount_or_zero(Some("inf")), 0.0);
        assert_eq!(parse_amount_or_zero(None), 0.0);
    }

    #[test]
    fn test_recommendation_key_equality() {
        let a = RecommendationKey::new("prod-1", "alpha", "card");
        let b = RecommendationKey::new("prod-1", "alpha", "card");
        let c = RecommendationKey::new("prod-1", "alpha", "loan");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
