//! The `/query` endpoint: recent scrape runs with their media embedded.

use axum::{
    extract::{Query, State},
    Json,
};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, AppState};

const DEFAULT_LIMIT: i64 = 5;
const MAX_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub(super) struct QueryParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct QueryEnvelope {
    success: bool,
    runs: Vec<RunItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct RunItem {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    posts_scraped: i32,
    status: String,
    error_message: Option<String>,
    media: Vec<MediaItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct MediaItem {
    file_name: String,
    content_type: String,
    data_base64: String,
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryEnvelope>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let rows = fms_db::list_recent_runs(&state.pool, limit, offset)
        .await
        .map_err(|e| map_db_error(&e))?;

    let mut runs = Vec::with_capacity(rows.len());
    for row in rows {
        let media = fms_db::list_media_for_run(&state.pool, row.id)
            .await
            .map_err(|e| map_db_error(&e))?
            .into_iter()
            .map(|file| MediaItem {
                file_name: file.file_name,
                content_type: file.content_type,
                data_base64: base64::engine::general_purpose::STANDARD.encode(&file.data),
            })
            .collect();

        runs.push(RunItem {
            run_id: row.public_id,
            started_at: row.started_at,
            completed_at: row.completed_at,
            posts_scraped: row.posts_scraped,
            status: row.status,
            error_message: row.error_message,
            media,
        });
    }

    Ok(Json(QueryEnvelope {
        success: true,
        runs,
    }))
}

fn map_db_error(error: &fms_db::DbError) -> ApiError {
    tracing::error!(error = %error, "run query failed");
    ApiError::query_failed("database query failed")
}
