use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use course_db::models::registration::{RegistrationFilter, RegistrationStatus};
use serde::Deserialize;
use tracing::{error, info};

use crate::handlers::{csv_download, error_response, internal_error};
use crate::services::export_service::ExportService;
use crate::state::AppState;

const NOT_FOUND: &str = "التسجيل غير موجود";

/// GET /registrations?search=&country=&registration_type=&status=
pub async fn list_registrations(
    State(state): State<AppState>,
    Query(filter): Query<RegistrationFilter>,
) -> Response {
    match state.registrations.filter(&filter).await {
        Ok(regs) => Json(regs).into_response(),
        Err(e) => {
            error!("Failed to list registrations: {:#}", e);
            internal_error()
        }
    }
}

pub async fn get_registration(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registrations.get(&id).await {
        Ok(Some(reg)) => Json(reg).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, NOT_FOUND),
        Err(e) => {
            error!("Failed to load registration {}: {:#}", id, e);
            internal_error()
        }
    }
}

pub async fn delete_registration(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registrations.delete(&id).await {
        Ok(true) => {
            info!("Registration {} deleted", id);
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, NOT_FOUND),
        Err(e) => {
            error!("Failed to delete registration {}: {:#}", id, e);
            internal_error()
        }
    }
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: RegistrationStatus,
}

/// Manual verification of local payments, or cancellation.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Response {
    match state.registrations.set_status(&id, update.status).await {
        Ok(Some(reg)) => {
            info!("Registration {} is now {}", id, update.status.as_str());
            Json(reg).into_response()
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, NOT_FOUND),
        Err(e) => {
            error!("Failed to update registration {}: {:#}", id, e);
            internal_error()
        }
    }
}

pub async fn export_registrations(
    State(state): State<AppState>,
    Query(filter): Query<RegistrationFilter>,
) -> Response {
    match state.registrations.filter(&filter).await {
        Ok(regs) => {
            let filename = format!("registrations_{}.csv", Utc::now().format("%Y-%m-%d"));
            csv_download(&filename, ExportService::registrations_csv(&regs))
        }
        Err(e) => {
            error!("Failed to export registrations: {:#}", e);
            internal_error()
        }
    }
}
