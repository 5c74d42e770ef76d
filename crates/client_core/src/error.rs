use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Lookup,
    Redeem,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreOperation::Lookup => "lookup",
            StoreOperation::Redeem => "redeem",
        })
    }
}

/// Every failure the redemption workflow surfaces to the operator. None of
/// them are fatal; the operator re-triggers the action by hand.
#[derive(Debug, Error)]
pub enum RedemptionError {
    #[error("token code is required")]
    Validation,
    #[error("no token matches code '{code}'")]
    NotFound { code: String },
    #[error("token lookup failed: {0}")]
    StoreRead(#[source] StoreError),
    #[error("token redemption failed: {0}")]
    StoreWrite(#[source] StoreError),
    #[error("token '{code}' is no longer issued")]
    PreconditionFailed { code: String },
    #[error("token store did not answer the {0} request in time")]
    TimedOut(StoreOperation),
    #[error("a {0} request is already in flight")]
    Busy(StoreOperation),
    #[error("receipts are only available for redeemed tokens")]
    ReceiptUnavailable,
}
