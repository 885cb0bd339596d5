//! The `/config` endpoints.

use axum::{extract::State, Json};
use serde_json::Value;

use crate::controller::PutError;

use super::{ApiError, AppState, ConfigEnvelope};

pub(super) async fn get_config(State(state): State<AppState>) -> Json<ConfigEnvelope> {
    Json(ConfigEnvelope {
        success: true,
        config: state.controller.current().await,
    })
}

pub(super) async fn put_config(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<ConfigEnvelope>, ApiError> {
    let Value::Object(candidate) = body else {
        return Err(ApiError::invalid_config("expected a flat JSON object"));
    };

    match state.controller.apply(&candidate).await {
        Ok(config) => Ok(Json(ConfigEnvelope {
            success: true,
            config,
        })),
        Err(PutError::Invalid(e)) => Err(ApiError::invalid_config(e.to_string())),
        Err(PutError::StillRunning { retry_at }) => Err(ApiError::still_running(retry_at)),
        Err(e) => {
            tracing::error!(error = %e, "failed to apply configuration");
            Err(ApiError::internal("failed to apply configuration"))
        }
    }
}
