use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{error, info};

use crate::handlers::{error_response, internal_error};
use crate::services::email_service::{EmailTemplate, RecipientGroup};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct BulkEmailRequest {
    pub recipients: RecipientGroup,
    #[serde(default)]
    pub template: Option<EmailTemplate>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Explicit subject/message win over the template's.
pub async fn send_bulk_email(
    State(state): State<AppState>,
    Json(req): Json<BulkEmailRequest>,
) -> Response {
    let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
    let subject = non_empty(req.subject).or_else(|| req.template.map(|t| t.subject().to_string()));
    let message = non_empty(req.message).or_else(|| req.template.map(|t| t.body().to_string()));

    let (Some(subject), Some(message)) = (subject, message) else {
        return error_response(StatusCode::BAD_REQUEST, "يرجى إدخال الموضوع والرسالة أو اختيار قالب");
    };

    let recipients = match state.registrations.list().await {
        Ok(regs) => regs
            .into_iter()
            .filter(|r| req.recipients.includes(r))
            .collect::<Vec<_>>(),
        Err(e) => {
            error!("Failed to load recipients: {:#}", e);
            return internal_error();
        }
    };

    info!("Sending bulk email to {} recipients", recipients.len());
    let report = state.email_service.send_bulk(&recipients, &subject, &message).await;
    Json(report).into_response()
}
