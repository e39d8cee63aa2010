use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::handlers::internal_error;
use crate::state::AppState;

const RECENT_REGISTRATIONS: usize = 5;

pub async fn get_stats(State(state): State<AppState>) -> Response {
    match state.analytics_service.dashboard_stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!("Failed to compute dashboard stats: {:#}", e);
            internal_error()
        }
    }
}

pub async fn get_recent(State(state): State<AppState>) -> Response {
    match state.registrations.recent(RECENT_REGISTRATIONS).await {
        Ok(recent) => Json(recent).into_response(),
        Err(e) => {
            error!("Failed to load recent registrations: {:#}", e);
            internal_error()
        }
    }
}
