//! Operator-facing notifications for each workflow outcome.

use shared::domain::TokenStatus;

use crate::error::{RedemptionError, StoreOperation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSeverity {
    Info,
    Success,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: NoticeSeverity,
    pub title: &'static str,
    pub description: String,
}

impl Notice {
    fn new(severity: NoticeSeverity, title: &'static str, description: impl Into<String>) -> Self {
        Self {
            severity,
            title,
            description: description.into(),
        }
    }

    pub fn redeemed() -> Self {
        Self::new(
            NoticeSeverity::Success,
            "Token Redeemed Successfully",
            "The token has been processed and is ready for printing",
        )
    }
}

/// Shown when a looked-up token can no longer be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWarning {
    AlreadyRedeemed,
    Void,
}

impl StatusWarning {
    pub fn for_status(status: TokenStatus) -> Option<Self> {
        match status {
            TokenStatus::Issued => None,
            TokenStatus::Redeemed => Some(StatusWarning::AlreadyRedeemed),
            TokenStatus::Void => Some(StatusWarning::Void),
        }
    }

    pub fn notice(self) -> Notice {
        match self {
            StatusWarning::AlreadyRedeemed => Notice::new(
                NoticeSeverity::Destructive,
                "Token Already Redeemed",
                "This token has already been used",
            ),
            StatusWarning::Void => Notice::new(
                NoticeSeverity::Destructive,
                "Token Void",
                "This token has been voided and cannot be used",
            ),
        }
    }
}

impl RedemptionError {
    pub fn notice(&self) -> Notice {
        match self {
            RedemptionError::Validation => Notice::new(
                NoticeSeverity::Destructive,
                "Error",
                "Please enter a token code",
            ),
            RedemptionError::NotFound { .. } => Notice::new(
                NoticeSeverity::Destructive,
                "Token Not Found",
                "Invalid token code or token does not exist",
            ),
            RedemptionError::StoreRead(_) => Notice::new(
                NoticeSeverity::Destructive,
                "Error",
                "Failed to lookup token",
            ),
            RedemptionError::StoreWrite(_) => Notice::new(
                NoticeSeverity::Destructive,
                "Redemption Failed",
                "Failed to redeem token. Please try again.",
            ),
            RedemptionError::PreconditionFailed { .. } => Notice::new(
                NoticeSeverity::Destructive,
                "Redemption Failed",
                "This token was redeemed or voided elsewhere. Look it up again.",
            ),
            RedemptionError::TimedOut(operation) => Notice::new(
                NoticeSeverity::Destructive,
                "Error",
                format!("The token {operation} timed out. Please try again."),
            ),
            RedemptionError::Busy(operation) => Notice::new(
                NoticeSeverity::Info,
                "Please Wait",
                match operation {
                    StoreOperation::Lookup => "A token lookup is already in progress",
                    StoreOperation::Redeem => "A redemption is already in progress",
                },
            ),
            RedemptionError::ReceiptUnavailable => Notice::new(
                NoticeSeverity::Info,
                "No Receipt",
                "Only redeemed tokens can be printed",
            ),
        }
    }
}
