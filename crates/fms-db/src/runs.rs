//! Queries over scrape runs and the media files they collected.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub posts_scraped: i32,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MediaFileRow {
    pub id: i64,
    pub run_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMediaFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Most recent runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_runs(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<RunRow>, DbError> {
    let rows = sqlx::query_as::<_, RunRow>(
        "SELECT id, public_id, started_at, completed_at, posts_scraped, status, \
                error_message, created_at \
         FROM scrape_runs ORDER BY started_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// All media files collected during one run, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_media_for_run(pool: &PgPool, run_id: i64) -> Result<Vec<MediaFileRow>, DbError> {
    let rows = sqlx::query_as::<_, MediaFileRow>(
        "SELECT id, run_id, file_name, content_type, data, created_at \
         FROM media_files WHERE run_id = $1 ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Open a new run record in `running` state; returns the inserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_run(pool: &PgPool) -> Result<RunRow, DbError> {
    let row = sqlx::query_as::<_, RunRow>(
        "INSERT INTO scrape_runs DEFAULT VALUES \
         RETURNING id, public_id, started_at, completed_at, posts_scraped, status, \
                   error_message, created_at",
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Close a run with its outcome.
///
/// `posts_scraped` is only overwritten when a count is supplied; the scraper
/// reports its own count during the run, so callers that merely finalize the
/// lifecycle pass `None`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has that id, or [`DbError::Sqlx`]
/// on query failure.
pub async fn complete_run(
    pool: &PgPool,
    run_id: i64,
    posts_scraped: Option<i32>,
    status: &str,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scrape_runs \
         SET completed_at = NOW(), posts_scraped = COALESCE($2, posts_scraped), \
             status = $3, error_message = $4 \
         WHERE id = $1",
    )
    .bind(run_id)
    .bind(posts_scraped)
    .bind(status)
    .bind(error_message)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Attach a media blob to a run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_media_file(
    pool: &PgPool,
    run_id: i64,
    file: &NewMediaFile,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO media_files (run_id, file_name, content_type, data) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(run_id)
    .bind(&file.file_name)
    .bind(&file.content_type)
    .bind(&file.data)
    .fetch_one(pool)
    .await?;
    Ok(id)
}
