use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use course_db::{Decision, Rejection};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::{error_response, internal_error};
use crate::services::registration_service::{RegistrationError, RegistrationRequest};
use crate::state::AppState;
use crate::utils::ClientInfo;

/// POST /api/registrations
pub async fn register(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(request): Json<RegistrationRequest>,
) -> Response {
    match state.registration_service.register(request, &client).await {
        Ok(done) => (StatusCode::CREATED, Json(done)).into_response(),
        Err(e) => {
            let status = match &e {
                RegistrationError::Invalid(_) | RegistrationError::CodeRejected(_) => StatusCode::BAD_REQUEST,
                RegistrationError::Closed => StatusCode::FORBIDDEN,
                RegistrationError::Full => StatusCode::CONFLICT,
                RegistrationError::Internal(inner) => {
                    error!("Registration failed: {:#}", inner);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            error_response(status, e.user_message())
        }
    }
}

#[derive(Deserialize)]
pub struct CheckCodeRequest {
    pub code: String,
}

#[derive(Serialize)]
struct CheckCodeResponse {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<Rejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

/// POST /api/codes/validate
///
/// Read-only check; nothing is redeemed until a registration goes through.
pub async fn check_code(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(body): Json<CheckCodeRequest>,
) -> Response {
    match state.ledger.validate(body.code.trim(), &client.requester_id).await {
        Ok(decision) => {
            let reason = match decision {
                Decision::Accepted => None,
                Decision::Rejected(reason) => Some(reason),
            };
            Json(CheckCodeResponse {
                accepted: decision.is_accepted(),
                reason,
                message: reason.map(|r| r.user_message()),
            })
            .into_response()
        }
        Err(e) => {
            error!("Code check failed: {}", e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, &e.user_message())
        }
    }
}

#[derive(Serialize)]
struct PublicCourse {
    course_id: String,
    start_date: String,
    end_date: String,
    syria_price: u32,
    international_price: u32,
    registration_open: bool,
}

/// GET /api/course
pub async fn course_info(State(state): State<AppState>) -> Response {
    let settings = match state.settings.course().await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load course settings: {:#}", e);
            return internal_error();
        }
    };

    Json(PublicCourse {
        course_id: settings.course_id,
        start_date: settings.start_date,
        end_date: settings.end_date,
        syria_price: settings.syria_price,
        international_price: settings.international_price,
        registration_open: settings.enable_registration,
    })
    .into_response()
}
