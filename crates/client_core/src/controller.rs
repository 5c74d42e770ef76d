//! Lookup, redeem and receipt flow over a single "current token" slot.

use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use shared::domain::{normalize_code, StatusUpdateOutcome, Token, TokenStatus};
use tokio::{sync::Mutex, time::timeout};
use tracing::{info, warn};

use crate::{
    error::{RedemptionError, StoreOperation},
    notice::StatusWarning,
    receipt::Receipt,
    store::{StoreError, TokenStore},
};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionPhase {
    Empty,
    LookingUp,
    Found(TokenStatus),
    Redeeming,
    Redeemed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionSnapshot {
    pub phase: RedemptionPhase,
    pub token: Option<Token>,
    pub input_code: String,
    pub is_loading: bool,
    pub is_redeeming: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Loaded {
        token: Token,
        warning: Option<StatusWarning>,
    },
    /// A `reset` or newer lookup landed first; the response was dropped.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    Redeemed(Token),
    /// No token loaded, or the loaded token is not `issued`.
    NotRedeemable,
    Superseded,
}

struct ControllerState {
    phase: RedemptionPhase,
    token: Option<Token>,
    input_code: String,
    is_loading: bool,
    is_redeeming: bool,
    generation: u64,
}

impl ControllerState {
    fn empty() -> Self {
        Self {
            phase: RedemptionPhase::Empty,
            token: None,
            input_code: String::new(),
            is_loading: false,
            is_redeeming: false,
            generation: 0,
        }
    }

    fn snapshot(&self) -> RedemptionSnapshot {
        RedemptionSnapshot {
            phase: self.phase,
            token: self.token.clone(),
            input_code: self.input_code.clone(),
            is_loading: self.is_loading,
            is_redeeming: self.is_redeeming,
        }
    }

    fn redeemable_token(&self) -> Option<&Token> {
        self.token
            .as_ref()
            .filter(|token| token.status == TokenStatus::Issued)
    }
}

/// Drives token redemption against an injected [`TokenStore`].
///
/// Methods take `&self` so one controller can be shared between an input
/// loop and in-flight requests. Each store round trip is bounded by the
/// store timeout, and a response is discarded if `reset` or a newer
/// `lookup` happened while it was in flight.
pub struct RedemptionController<S: TokenStore> {
    store: S,
    store_timeout: Duration,
    state: Mutex<ControllerState>,
}

impl<S: TokenStore> RedemptionController<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            state: Mutex::new(ControllerState::empty()),
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn snapshot(&self) -> RedemptionSnapshot {
        self.state.lock().await.snapshot()
    }

    /// True only while the loaded token is `issued` and no redeem is running.
    pub async fn can_redeem(&self) -> bool {
        let guard = self.state.lock().await;
        !guard.is_redeeming && !guard.is_loading && guard.redeemable_token().is_some()
    }

    pub async fn can_print_receipt(&self) -> bool {
        let guard = self.state.lock().await;
        matches!(&guard.token, Some(token) if token.status == TokenStatus::Redeemed)
    }

    pub async fn lookup(&self, raw_code: &str) -> Result<LookupOutcome, RedemptionError> {
        let (code, generation) = {
            let mut guard = self.state.lock().await;
            if guard.is_loading {
                return Err(RedemptionError::Busy(StoreOperation::Lookup));
            }
            guard.input_code = raw_code.to_string();
            let code = normalize_code(raw_code)
                .ok_or(RedemptionError::Validation)?
                .to_string();

            guard.generation += 1;
            guard.is_loading = true;
            // A lookup abandons any redeem still in flight.
            guard.is_redeeming = false;
            guard.phase = RedemptionPhase::LookingUp;
            (code, guard.generation)
        };

        let result = timeout(self.store_timeout, self.store.find_by_code(&code)).await;

        let mut guard = self.state.lock().await;
        if guard.generation != generation {
            info!(%code, "dropping superseded lookup response");
            return Ok(LookupOutcome::Superseded);
        }
        guard.is_loading = false;

        let failure = match result {
            Ok(Ok(Some(token))) => {
                let warning = StatusWarning::for_status(token.status);
                info!(
                    token_id = %token.id,
                    %code,
                    status = %token.status,
                    "token loaded"
                );
                guard.phase = RedemptionPhase::Found(token.status);
                guard.token = Some(token.clone());
                return Ok(LookupOutcome::Loaded { token, warning });
            }
            Ok(Ok(None)) => RedemptionError::NotFound { code },
            Ok(Err(err)) => RedemptionError::StoreRead(err),
            Err(_) => RedemptionError::TimedOut(StoreOperation::Lookup),
        };

        warn!(error = %failure, "token lookup failed");
        guard.token = None;
        guard.phase = RedemptionPhase::Error;
        Err(failure)
    }

    /// Redeems the loaded token if, and only if, it is currently `issued`.
    ///
    /// On success the local copy is moved to `redeemed` without re-reading
    /// the store. On any failure the local token is left exactly as it was.
    pub async fn redeem(&self) -> Result<RedeemOutcome, RedemptionError> {
        let (token, generation) = {
            let mut guard = self.state.lock().await;
            if guard.is_redeeming {
                return Err(RedemptionError::Busy(StoreOperation::Redeem));
            }
            if guard.is_loading {
                return Err(RedemptionError::Busy(StoreOperation::Lookup));
            }
            let Some(token) = guard.redeemable_token().cloned() else {
                return Ok(RedeemOutcome::NotRedeemable);
            };
            guard.is_redeeming = true;
            guard.phase = RedemptionPhase::Redeeming;
            (token, guard.generation)
        };

        let redeemed_at = Utc::now();
        let result = timeout(
            self.store_timeout,
            self.store.update_status_conditional(
                token.id,
                TokenStatus::Issued,
                TokenStatus::Redeemed,
                Some(redeemed_at),
            ),
        )
        .await;

        let mut guard = self.state.lock().await;
        if guard.generation != generation {
            info!(token_id = %token.id, "dropping superseded redeem response");
            return Ok(RedeemOutcome::Superseded);
        }
        guard.is_redeeming = false;

        let failure = match result {
            Ok(Ok(StatusUpdateOutcome::Updated(_))) => {
                let redeemed = Token {
                    status: TokenStatus::Redeemed,
                    redeemed_at: Some(redeemed_at),
                    ..token
                };
                info!(token_id = %redeemed.id, code = %redeemed.code, "token redeemed");
                guard.phase = RedemptionPhase::Redeemed;
                guard.token = Some(redeemed.clone());
                return Ok(RedeemOutcome::Redeemed(redeemed));
            }
            Ok(Ok(StatusUpdateOutcome::PreconditionFailed)) => {
                RedemptionError::PreconditionFailed { code: token.code }
            }
            Ok(Ok(StatusUpdateOutcome::Missing)) => RedemptionError::StoreWrite(
                StoreError::Backend(anyhow!("token {} no longer exists", token.id)),
            ),
            Ok(Err(err)) => RedemptionError::StoreWrite(err),
            Err(_) => RedemptionError::TimedOut(StoreOperation::Redeem),
        };

        warn!(error = %failure, "token redemption failed");
        guard.phase = RedemptionPhase::Error;
        Err(failure)
    }

    pub async fn render_receipt(&self) -> Result<Receipt, RedemptionError> {
        self.render_receipt_at(Utc::now()).await
    }

    /// Builds the receipt for the loaded token, stamped with `printed_at`
    /// rather than the stored redemption time.
    pub async fn render_receipt_at(
        &self,
        printed_at: DateTime<Utc>,
    ) -> Result<Receipt, RedemptionError> {
        let guard = self.state.lock().await;
        match &guard.token {
            Some(token) if token.status == TokenStatus::Redeemed => {
                Ok(Receipt::new(token, printed_at))
            }
            _ => Err(RedemptionError::ReceiptUnavailable),
        }
    }

    pub async fn reset(&self) {
        let mut guard = self.state.lock().await;
        let generation = guard.generation + 1;
        *guard = ControllerState {
            generation,
            ..ControllerState::empty()
        };
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
