use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_newtype!(TokenId);

/// Lifecycle of a prepaid token. `Redeemed` and `Void` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Issued,
    Redeemed,
    Void,
}

impl TokenStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenStatus::Issued => "issued",
            TokenStatus::Redeemed => "redeemed",
            TokenStatus::Void => "void",
        }
    }

    /// Upper-case label used on receipts and status badges.
    pub fn label(self) -> &'static str {
        match self {
            TokenStatus::Issued => "ISSUED",
            TokenStatus::Redeemed => "REDEEMED",
            TokenStatus::Void => "VOID",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TokenStatus::Issued)
    }

    /// Only `issued -> redeemed` and `issued -> void` are legal.
    pub fn can_transition_to(self, next: TokenStatus) -> bool {
        matches!(
            (self, next),
            (TokenStatus::Issued, TokenStatus::Redeemed) | (TokenStatus::Issued, TokenStatus::Void)
        )
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown token status '{0}'")]
pub struct UnknownTokenStatus(pub String);

impl FromStr for TokenStatus {
    type Err = UnknownTokenStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "issued" => Ok(TokenStatus::Issued),
            "redeemed" => Ok(TokenStatus::Redeemed),
            "void" => Ok(TokenStatus::Void),
            _ => Err(UnknownTokenStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub code: String,
    pub value_cents: i64,
    pub currency: String,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn formatted_value(&self) -> String {
        format_value(self.value_cents, &self.currency)
    }
}

/// Result of a status update that is guarded by the expected prior status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdateOutcome {
    Updated(Token),
    /// The row exists but its status no longer matched `from_status`.
    PreconditionFailed,
    Missing,
}

/// Trims a human-entered token code; `None` when nothing is left.
pub fn normalize_code(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Renders minor units as `"{currency} {units}.{cents}"`, e.g. `NGN 1250.50`.
pub fn format_value(value_cents: i64, currency: &str) -> String {
    let sign = if value_cents < 0 { "-" } else { "" };
    let abs = value_cents.unsigned_abs();
    format!("{currency} {sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minor_units_with_two_decimals() {
        assert_eq!(format_value(0, "NGN"), "NGN 0.00");
        assert_eq!(format_value(999, "NGN"), "NGN 9.99");
        assert_eq!(format_value(125050, "NGN"), "NGN 1250.50");
        assert_eq!(format_value(500000, "NGN"), "NGN 5000.00");
        assert_eq!(format_value(-50, "USD"), "USD -0.50");
    }

    #[test]
    fn only_issued_tokens_can_move() {
        assert!(TokenStatus::Issued.can_transition_to(TokenStatus::Redeemed));
        assert!(TokenStatus::Issued.can_transition_to(TokenStatus::Void));
        assert!(!TokenStatus::Redeemed.can_transition_to(TokenStatus::Issued));
        assert!(!TokenStatus::Redeemed.can_transition_to(TokenStatus::Void));
        assert!(!TokenStatus::Void.can_transition_to(TokenStatus::Redeemed));
        assert!(!TokenStatus::Issued.can_transition_to(TokenStatus::Issued));
    }

    #[test]
    fn status_round_trips_through_wire_names() {
        let json = serde_json::to_string(&TokenStatus::Redeemed).expect("json");
        assert_eq!(json, "\"redeemed\"");
        assert_eq!("VOID".parse::<TokenStatus>(), Ok(TokenStatus::Void));
        assert!("spent".parse::<TokenStatus>().is_err());
    }

    #[test]
    fn normalize_code_rejects_blank_input() {
        assert_eq!(normalize_code("  PROMO1 \n"), Some("PROMO1"));
        assert_eq!(normalize_code(" \t "), None);
        assert_eq!(normalize_code(""), None);
    }
}
