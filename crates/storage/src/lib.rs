use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{StatusUpdateOutcome, Token, TokenId, TokenStatus};

const TOKEN_COLUMNS: &str = "id, code, value_cents, currency, status, created_at, redeemed_at";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Inserts a freshly issued token. Returns `None` when the code is taken.
    pub async fn insert_token(
        &self,
        code: &str,
        value_cents: i64,
        currency: &str,
    ) -> Result<Option<Token>> {
        let row = sqlx::query(&format!(
            "INSERT INTO tokens (id, code, value_cents, currency, status, created_at)
             VALUES (?, ?, ?, ?, 'issued', ?)
             ON CONFLICT(code) DO NOTHING
             RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(TokenId::new_v4().to_string())
        .bind(code)
        .bind(value_cents)
        .bind(currency)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to insert token '{code}'"))?;

        row.as_ref().map(token_from_row).transpose()
    }

    pub async fn find_token_by_code(&self, code: &str) -> Result<Option<Token>> {
        let row = sqlx::query(&format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE code = ?"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(token_from_row).transpose()
    }

    pub async fn find_token(&self, token_id: TokenId) -> Result<Option<Token>> {
        let row = sqlx::query(&format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE id = ?"))
            .bind(token_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(token_from_row).transpose()
    }

    pub async fn list_tokens(&self, status: Option<TokenStatus>, limit: u32) -> Result<Vec<Token>> {
        let rows = if let Some(status) = status {
            sqlx::query(&format!(
                "SELECT {TOKEN_COLUMNS}
                 FROM tokens
                 WHERE status = ?
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?"
            ))
            .bind(status.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {TOKEN_COLUMNS}
                 FROM tokens
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?"
            ))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(token_from_row).collect()
    }

    /// Moves a token from `from_status` to `to_status` in a single statement.
    ///
    /// Matches zero rows unless the stored status still equals `from_status`;
    /// that case is reported as `PreconditionFailed`, never as success.
    pub async fn update_status_conditional(
        &self,
        token_id: TokenId,
        from_status: TokenStatus,
        to_status: TokenStatus,
        redeemed_at: Option<DateTime<Utc>>,
    ) -> Result<StatusUpdateOutcome> {
        let row = sqlx::query(&format!(
            "UPDATE tokens
             SET status = ?, redeemed_at = ?
             WHERE id = ? AND status = ?
             RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(to_status.as_str())
        .bind(redeemed_at)
        .bind(token_id.to_string())
        .bind(from_status.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to update status of token {token_id}"))?;

        if let Some(row) = row {
            return Ok(StatusUpdateOutcome::Updated(token_from_row(&row)?));
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tokens WHERE id = ?")
            .bind(token_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        debug!(
            %token_id,
            from = %from_status,
            to = %to_status,
            exists = exists.is_some(),
            "conditional status update matched no row"
        );
        Ok(match exists {
            Some(_) => StatusUpdateOutcome::PreconditionFailed,
            None => StatusUpdateOutcome::Missing,
        })
    }
}

fn token_from_row(row: &SqliteRow) -> Result<Token> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    Ok(Token {
        id: id
            .parse()
            .with_context(|| format!("stored token id '{id}' is not a uuid"))?,
        code: row.try_get("code")?,
        value_cents: row.try_get("value_cents")?,
        currency: row.try_get("currency")?,
        status: status.parse()?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        redeemed_at: row.try_get::<Option<DateTime<Utc>>, _>("redeemed_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
