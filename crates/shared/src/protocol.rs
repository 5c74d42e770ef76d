use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::TokenStatus;

pub fn tokens_route() -> &'static str {
    "/tokens"
}

pub fn token_lookup_route() -> &'static str {
    "/tokens/lookup"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLookupQuery {
    pub code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTokensQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TokenStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueTokenRequest {
    pub code: String,
    pub value_cents: i64,
    pub currency: String,
}

/// Body of `PATCH /tokens/:token_id/status`. The update only applies while
/// the stored status still equals `from_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTokenStatusRequest {
    pub from_status: TokenStatus,
    pub to_status: TokenStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
}
