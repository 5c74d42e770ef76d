//! The token table as seen by the redemption workflow, plus its adapters.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use shared::{
    domain::{StatusUpdateOutcome, Token, TokenId, TokenStatus},
    error::{ApiError, ErrorCode},
    protocol::{token_lookup_route, UpdateTokenStatusRequest},
};
use storage::Storage;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token store rejected request ({code:?}): {message}")]
    Rejected { code: ErrorCode, message: String },
    #[error("invalid token store url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Read/update access to the persistent `tokens` table.
///
/// `update_status_conditional` must only apply when the stored status still
/// equals `from_status`, and must report a mismatch as
/// `StatusUpdateOutcome::PreconditionFailed` rather than as success.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<Token>, StoreError>;

    async fn update_status_conditional(
        &self,
        token_id: TokenId,
        from_status: TokenStatus,
        to_status: TokenStatus,
        redeemed_at: Option<DateTime<Utc>>,
    ) -> Result<StatusUpdateOutcome, StoreError>;
}

#[async_trait]
impl<T> TokenStore for Arc<T>
where
    T: TokenStore + ?Sized,
{
    async fn find_by_code(&self, code: &str) -> Result<Option<Token>, StoreError> {
        (**self).find_by_code(code).await
    }

    async fn update_status_conditional(
        &self,
        token_id: TokenId,
        from_status: TokenStatus,
        to_status: TokenStatus,
        redeemed_at: Option<DateTime<Utc>>,
    ) -> Result<StatusUpdateOutcome, StoreError> {
        (**self)
            .update_status_conditional(token_id, from_status, to_status, redeemed_at)
            .await
    }
}

#[async_trait]
impl TokenStore for Storage {
    async fn find_by_code(&self, code: &str) -> Result<Option<Token>, StoreError> {
        Ok(self.find_token_by_code(code).await?)
    }

    async fn update_status_conditional(
        &self,
        token_id: TokenId,
        from_status: TokenStatus,
        to_status: TokenStatus,
        redeemed_at: Option<DateTime<Utc>>,
    ) -> Result<StatusUpdateOutcome, StoreError> {
        Ok(
            Storage::update_status_conditional(self, token_id, from_status, to_status, redeemed_at)
                .await?,
        )
    }
}

/// Talks to the token service over HTTP.
#[derive(Clone)]
pub struct HttpTokenStore {
    http: Client,
    base_url: Url,
}

impl HttpTokenStore {
    pub fn new(server_url: &str) -> Result<Self, StoreError> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(server_url.trim())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a route below the base url, so a server mounted under a
    /// path prefix keeps that prefix.
    fn endpoint(&self, route: &str) -> Result<Url, StoreError> {
        Ok(self.base_url.join(route.trim_start_matches('/'))?)
    }
}

#[async_trait]
impl TokenStore for HttpTokenStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Token>, StoreError> {
        let response = self
            .http
            .get(self.endpoint(token_lookup_route())?)
            .query(&[("code", code)])
            .send()
            .await?;

        if !response.status().is_success() {
            return match rejection(response).await {
                StoreError::Rejected {
                    code: ErrorCode::NotFound,
                    ..
                } => {
                    debug!(code, "token lookup returned not found");
                    Ok(None)
                }
                other => Err(other),
            };
        }
        Ok(Some(response.json().await?))
    }

    async fn update_status_conditional(
        &self,
        token_id: TokenId,
        from_status: TokenStatus,
        to_status: TokenStatus,
        redeemed_at: Option<DateTime<Utc>>,
    ) -> Result<StatusUpdateOutcome, StoreError> {
        let response = self
            .http
            .patch(self.endpoint(&format!("tokens/{token_id}/status"))?)
            .json(&UpdateTokenStatusRequest {
                from_status,
                to_status,
                redeemed_at,
            })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(StatusUpdateOutcome::Updated(response.json().await?)),
            _ => match rejection(response).await {
                StoreError::Rejected {
                    code: ErrorCode::NotFound,
                    ..
                } => Ok(StatusUpdateOutcome::Missing),
                StoreError::Rejected {
                    code: ErrorCode::PreconditionFailed,
                    ..
                } => Ok(StatusUpdateOutcome::PreconditionFailed),
                other => Err(other),
            },
        }
    }
}

/// Decodes the service's `ApiError` body. Anything else, such as the bare 404
/// of a server without token routes, becomes an `Internal` rejection.
async fn rejection(response: reqwest::Response) -> StoreError {
    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(body) => StoreError::Rejected {
            code: body.code,
            message: body.message,
        },
        Err(_) => StoreError::Rejected {
            code: ErrorCode::Internal,
            message: format!("unexpected status {status}"),
        },
    }
}
