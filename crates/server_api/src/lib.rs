use shared::{
    domain::{normalize_code, StatusUpdateOutcome, Token, TokenId, TokenStatus},
    error::{ApiError, ErrorCode},
    protocol::{IssueTokenRequest, ListTokensQuery, UpdateTokenStatusRequest},
};
use storage::Storage;
use tracing::{info, warn};

pub const MAX_CODE_LEN: usize = 64;
pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 200;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn lookup_token(ctx: &ApiContext, code: &str) -> Result<Token, ApiError> {
    let code = normalize_code(code).ok_or_else(|| ApiError::validation("token code is required"))?;
    ctx.storage
        .find_token_by_code(code)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("token not found"))
}

pub async fn issue_token(ctx: &ApiContext, request: &IssueTokenRequest) -> Result<Token, ApiError> {
    let code = normalize_code(&request.code)
        .ok_or_else(|| ApiError::validation("token code is required"))?;
    if code.len() > MAX_CODE_LEN {
        return Err(ApiError::validation(format!(
            "token code exceeds {MAX_CODE_LEN} bytes"
        )));
    }
    if request.value_cents < 0 {
        return Err(ApiError::validation("token value cannot be negative"));
    }
    let currency = normalize_currency(&request.currency)?;

    let token = ctx
        .storage
        .insert_token(code, request.value_cents, &currency)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            ApiError::new(
                ErrorCode::Conflict,
                format!("token code '{code}' is already issued"),
            )
        })?;
    info!(token_id = %token.id, code = %token.code, value = %token.formatted_value(), "token issued");
    Ok(token)
}

/// Applies `from_status -> to_status` only if the stored status still equals
/// `from_status`; a mismatch surfaces as `ErrorCode::PreconditionFailed`.
pub async fn update_token_status(
    ctx: &ApiContext,
    token_id: TokenId,
    request: &UpdateTokenStatusRequest,
) -> Result<Token, ApiError> {
    if !request.from_status.can_transition_to(request.to_status) {
        return Err(ApiError::validation(format!(
            "illegal status transition {} -> {}",
            request.from_status, request.to_status
        )));
    }
    match (request.to_status, request.redeemed_at) {
        (TokenStatus::Redeemed, None) => {
            return Err(ApiError::validation(
                "redeemed_at is required when redeeming a token",
            ));
        }
        (status, Some(_)) if status != TokenStatus::Redeemed => {
            return Err(ApiError::validation(
                "redeemed_at is only allowed when redeeming a token",
            ));
        }
        _ => {}
    }

    let outcome = ctx
        .storage
        .update_status_conditional(
            token_id,
            request.from_status,
            request.to_status,
            request.redeemed_at,
        )
        .await
        .map_err(internal)?;

    match outcome {
        StatusUpdateOutcome::Updated(token) => {
            info!(
                %token_id,
                code = %token.code,
                from = %request.from_status,
                to = %token.status,
                "token status updated"
            );
            Ok(token)
        }
        StatusUpdateOutcome::PreconditionFailed => {
            warn!(
                %token_id,
                expected = %request.from_status,
                "token status changed before update was applied"
            );
            Err(ApiError::new(
                ErrorCode::PreconditionFailed,
                format!("token is no longer {}", request.from_status),
            ))
        }
        StatusUpdateOutcome::Missing => Err(ApiError::not_found("token not found")),
    }
}

pub async fn void_token(ctx: &ApiContext, token_id: TokenId) -> Result<Token, ApiError> {
    update_token_status(
        ctx,
        token_id,
        &UpdateTokenStatusRequest {
            from_status: TokenStatus::Issued,
            to_status: TokenStatus::Void,
            redeemed_at: None,
        },
    )
    .await
}

pub async fn list_tokens(ctx: &ApiContext, query: &ListTokensQuery) -> Result<Vec<Token>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    ctx.storage
        .list_tokens(query.status, limit)
        .await
        .map_err(internal)
}

fn normalize_currency(raw: &str) -> Result<String, ApiError> {
    let currency = raw.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::validation(
            "currency must be a three-letter code such as NGN",
        ));
    }
    Ok(currency.to_ascii_uppercase())
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
