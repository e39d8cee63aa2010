use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use course_db::models::settings::CourseSettings;
use tracing::{error, info};

use crate::handlers::{error_response, internal_error};
use crate::state::AppState;

pub async fn get_course_settings(State(state): State<AppState>) -> Response {
    match state.settings.course().await {
        Ok(settings) => Json(settings).into_response(),
        Err(e) => {
            error!("Failed to load course settings: {:#}", e);
            internal_error()
        }
    }
}

pub async fn save_course_settings(
    State(state): State<AppState>,
    Json(settings): Json<CourseSettings>,
) -> Response {
    if settings.max_participants == 0 {
        return error_response(StatusCode::BAD_REQUEST, "يجب أن يكون الحد الأقصى للمشاركين أكبر من صفر");
    }

    match state.settings.save_course(&settings).await {
        Ok(()) => {
            info!(
                "Course settings saved (registration {})",
                if settings.enable_registration { "open" } else { "closed" }
            );
            Json(settings).into_response()
        }
        Err(e) => {
            error!("Failed to save course settings: {:#}", e);
            internal_error()
        }
    }
}
