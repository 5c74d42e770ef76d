use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use server_api::{
    issue_token, list_tokens, lookup_token, update_token_status, void_token, ApiContext,
};
use shared::{
    domain::{Token, TokenId},
    error::{ApiError, ErrorCode},
    protocol::{
        token_lookup_route, tokens_route, IssueTokenRequest, ListTokensQuery, TokenLookupQuery,
        UpdateTokenStatusRequest,
    },
};
use storage::Storage;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

type HttpResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "token service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(tokens_route(), get(http_list_tokens).post(http_issue_token))
        .route(token_lookup_route(), get(http_lookup_token))
        .route("/tokens/:token_id/status", patch(http_update_token_status))
        .route("/tokens/:token_id/void", post(http_void_token))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> HttpResult<&'static str> {
    state.api.storage.health_check().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn http_lookup_token(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TokenLookupQuery>,
) -> HttpResult<Json<Token>> {
    let token = lookup_token(&state.api, &q.code).await.map_err(reject)?;
    Ok(Json(token))
}

async fn http_list_tokens(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListTokensQuery>,
) -> HttpResult<Json<Vec<Token>>> {
    let tokens = list_tokens(&state.api, &q).await.map_err(reject)?;
    Ok(Json(tokens))
}

async fn http_issue_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IssueTokenRequest>,
) -> HttpResult<(StatusCode, Json<Token>)> {
    let token = issue_token(&state.api, &req).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(token)))
}

async fn http_update_token_status(
    State(state): State<Arc<AppState>>,
    Path(token_id): Path<TokenId>,
    Json(req): Json<UpdateTokenStatusRequest>,
) -> HttpResult<Json<Token>> {
    let token = update_token_status(&state.api, token_id, &req)
        .await
        .map_err(reject)?;
    Ok(Json(token))
}

async fn http_void_token(
    State(state): State<Arc<AppState>>,
    Path(token_id): Path<TokenId>,
) -> HttpResult<Json<Token>> {
    let token = void_token(&state.api, token_id).await.map_err(reject)?;
    Ok(Json(token))
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
