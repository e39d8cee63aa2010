use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use course_db::models::code::SUPPORT_CODE;
use serde_json::json;
use tracing::{error, info};

use crate::handlers::internal_error;
use crate::state::AppState;

pub async fn usage_log(State(state): State<AppState>) -> Response {
    match state.ledger.usage_log().await {
        Ok(mut log) => {
            log.reverse();
            Json(log).into_response()
        }
        Err(e) => {
            error!("Failed to load code usage log: {}", e);
            internal_error()
        }
    }
}

pub async fn used_codes(State(state): State<AppState>) -> Response {
    match state.ledger.used_codes().await {
        Ok(codes) => Json(codes).into_response(),
        Err(e) => {
            error!("Failed to load used codes: {}", e);
            internal_error()
        }
    }
}

pub async fn requester_history(
    State(state): State<AppState>,
    Path(requester_id): Path<String>,
) -> Response {
    match state.ledger.requester_history(&requester_id).await {
        Ok(history) => Json(history).into_response(),
        Err(e) => {
            error!("Failed to load history for {}: {}", requester_id, e);
            internal_error()
        }
    }
}

/// Hands out the support code for someone who reached out directly.
pub async fn grant_support_code(State(state): State<AppState>) -> Response {
    let already_used = match state.ledger.is_redeemed(SUPPORT_CODE).await {
        Ok(used) => used,
        Err(e) => {
            error!("Failed to check support code: {}", e);
            return internal_error();
        }
    };

    info!("Support code granted (already redeemed: {})", already_used);
    Json(json!({ "code": SUPPORT_CODE, "redeemed": already_used })).into_response()
}
