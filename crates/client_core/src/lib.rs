//! Operator-side token redemption: the store seam, the redemption
//! controller, and the notices and receipts it produces.

pub mod controller;
pub mod error;
pub mod notice;
pub mod receipt;
pub mod store;

pub use controller::{
    LookupOutcome, RedeemOutcome, RedemptionController, RedemptionPhase, RedemptionSnapshot,
    DEFAULT_STORE_TIMEOUT,
};
pub use error::{RedemptionError, StoreOperation};
pub use notice::{Notice, NoticeSeverity, StatusWarning};
pub use receipt::{Receipt, ReceiptSink};
pub use store::{HttpTokenStore, StoreError, TokenStore};

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod store_tests;
