use std::fmt;

use chrono::{DateTime, Utc};
use shared::domain::Token;

const RULE: &str = "=====================";

/// Human-readable redemption slip. Not meant to be parsed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub code: String,
    pub value: String,
    pub status: &'static str,
    pub printed_at: DateTime<Utc>,
}

impl Receipt {
    pub fn new(token: &Token, printed_at: DateTime<Utc>) -> Self {
        Self {
            code: token.code.clone(),
            value: token.formatted_value(),
            status: token.status.label(),
            printed_at,
        }
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FILLING STATION RECEIPT")?;
        writeln!(f, "{RULE}")?;
        writeln!(f)?;
        writeln!(f, "Token Code: {}", self.code)?;
        writeln!(f, "Value: {}", self.value)?;
        writeln!(f, "Status: {}", self.status)?;
        writeln!(
            f,
            "Redeemed: {}",
            self.printed_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(f)?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Thank you for your business!")
    }
}

/// Wherever a rendered receipt ends up: a terminal, a spool file, a printer.
pub trait ReceiptSink {
    fn deliver(&self, receipt: &Receipt) -> anyhow::Result<()>;
}
