// Reseller dashboard API, mounted under /reseller/api/{reseller_id}.
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use course_db::LedgerError;
use course_db::models::code::GeneratedCode;
use course_db::models::reseller::Reseller;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::{csv_download, error_response, internal_error};
use crate::services::export_service::ExportService;
use crate::state::AppState;

pub async fn get_profile(State(state): State<AppState>, Path(reseller_id): Path<String>) -> Response {
    match state.reseller_service.profile(&reseller_id).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => {
            error!("Failed to load reseller {}: {:#}", reseller_id, e);
            internal_error()
        }
    }
}

#[derive(Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(reseller_id): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> Response {
    if update.name.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "يرجى إدخال الاسم");
    }

    let mut profile = match state.reseller_service.profile(&reseller_id).await {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to load reseller {}: {:#}", reseller_id, e);
            return internal_error();
        }
    };
    profile.name = update.name.trim().to_string();
    profile.email = update.email.trim().to_string();
    profile.phone = update.phone.trim().to_string();

    match state.reseller_service.save_profile(&profile).await {
        Ok(()) => Json(profile).into_response(),
        Err(e) => {
            error!("Failed to save reseller {}: {:#}", reseller_id, e);
            internal_error()
        }
    }
}

pub async fn get_stats(State(state): State<AppState>, Path(reseller_id): Path<String>) -> Response {
    match state.reseller_service.stats(&reseller_id).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!("Failed to compute stats for {}: {:#}", reseller_id, e);
            internal_error()
        }
    }
}

fn default_ticket_type() -> String {
    "syria-paid".to_string()
}

#[derive(Deserialize)]
pub struct GenerateRequest {
    pub quantity: u32,
    #[serde(default = "default_ticket_type")]
    pub ticket_type: String,
}

pub async fn generate_codes(
    State(state): State<AppState>,
    Path(reseller_id): Path<String>,
    Json(req): Json<GenerateRequest>,
) -> Response {
    match state
        .reseller_service
        .generate_codes(&reseller_id, req.quantity, &req.ticket_type)
        .await
    {
        Ok(codes) => (StatusCode::CREATED, Json(codes)).into_response(),
        Err(e) => match e.downcast_ref::<LedgerError>() {
            Some(ledger_err @ LedgerError::InvalidQuantity { .. }) => {
                error_response(StatusCode::BAD_REQUEST, &ledger_err.user_message())
            }
            _ => {
                error!("Code generation failed for {}: {:#}", reseller_id, e);
                internal_error()
            }
        },
    }
}

pub async fn list_codes(State(state): State<AppState>, Path(reseller_id): Path<String>) -> Response {
    match state.reseller_service.codes(&reseller_id).await {
        Ok(codes) => Json(codes).into_response(),
        Err(e) => {
            error!("Failed to load codes for {}: {:#}", reseller_id, e);
            internal_error()
        }
    }
}

/// Loads the profile and the batch entry, if the code belongs to this reseller.
async fn owned_code(
    state: &AppState,
    reseller_id: &str,
    code: &str,
) -> Result<(Reseller, GeneratedCode), Response> {
    let found = state.reseller_service.find_code(reseller_id, code).await.map_err(|e| {
        error!("Failed to look up {} for {}: {:#}", code, reseller_id, e);
        internal_error()
    })?;
    let Some(entry) = found else {
        return Err(error_response(StatusCode::NOT_FOUND, "الكود غير موجود"));
    };

    let reseller = state.reseller_service.profile(reseller_id).await.map_err(|e| {
        error!("Failed to load reseller {}: {:#}", reseller_id, e);
        internal_error()
    })?;
    Ok((reseller, entry))
}

/// Printable coupon for one code.
pub async fn coupon(
    State(state): State<AppState>,
    Path((reseller_id, code)): Path<(String, String)>,
) -> Response {
    let (reseller, entry) = match owned_code(&state, &reseller_id, &code).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    let settings = match state.settings.course().await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load course settings: {:#}", e);
            return internal_error();
        }
    };

    state.coupon_service.single(&reseller, &entry, &settings).into_response()
}

pub async fn share_code(
    State(state): State<AppState>,
    Path((reseller_id, code)): Path<(String, String)>,
) -> Response {
    let entry = match owned_code(&state, &reseller_id, &code).await {
        Ok((_, entry)) => entry,
        Err(resp) => return resp,
    };
    let settings = match state.settings.course().await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load course settings: {:#}", e);
            return internal_error();
        }
    };

    Json(json!({
        "code": code,
        "registration_url": state.coupon_service.registration_url(&code, &reseller_id),
        "text": state.coupon_service.share_text(&entry, &settings),
    }))
    .into_response()
}

/// Print sheet with every unused code in the batch.
pub async fn print_coupons(State(state): State<AppState>, Path(reseller_id): Path<String>) -> Response {
    let loaded = async {
        let reseller = state.reseller_service.profile(&reseller_id).await?;
        let codes = state.reseller_service.codes(&reseller_id).await?;
        let settings = state.settings.course().await?;
        anyhow::Ok((reseller, codes, settings))
    };
    let (reseller, codes, settings) = match loaded.await {
        Ok(v) => v,
        Err(e) => {
            error!("Failed to prepare coupon sheet for {}: {:#}", reseller_id, e);
            return internal_error();
        }
    };

    let sheet = state.coupon_service.sheet(&reseller, &codes, &settings);
    if sheet.coupons.is_empty() {
        return error_response(StatusCode::NOT_FOUND, "لا توجد كوبونات للطباعة");
    }
    sheet.into_response()
}

pub async fn recent_sales(State(state): State<AppState>, Path(reseller_id): Path<String>) -> Response {
    match state.reseller_service.recent_sales(&reseller_id).await {
        Ok(sales) => Json(sales).into_response(),
        Err(e) => {
            error!("Failed to load sales for {}: {:#}", reseller_id, e);
            internal_error()
        }
    }
}

pub async fn performance(State(state): State<AppState>, Path(reseller_id): Path<String>) -> Response {
    match state
        .reseller_service
        .monthly_performance(&reseller_id, Utc::now())
        .await
    {
        Ok(months) => Json(months).into_response(),
        Err(e) => {
            error!("Failed to compute performance for {}: {:#}", reseller_id, e);
            internal_error()
        }
    }
}

pub async fn export_sales(State(state): State<AppState>, Path(reseller_id): Path<String>) -> Response {
    match state.reseller_service.sales(&reseller_id).await {
        Ok(sales) => {
            let filename = format!(
                "sales_report_{}_{}.csv",
                reseller_id,
                Utc::now().format("%Y-%m-%d")
            );
            csv_download(&filename, ExportService::sales_csv(&sales))
        }
        Err(e) => {
            error!("Failed to export sales for {}: {:#}", reseller_id, e);
            internal_error()
        }
    }
}

pub async fn request_payout(State(state): State<AppState>, Path(reseller_id): Path<String>) -> Response {
    match state.reseller_service.request_payout(&reseller_id, Utc::now()).await {
        Ok(Some(payout)) => {
            info!("Payout of ${} queued for {}", payout.amount, reseller_id);
            (StatusCode::CREATED, Json(payout)).into_response()
        }
        Ok(None) => error_response(StatusCode::BAD_REQUEST, "لا توجد عمولة متاحة للصرف"),
        Err(e) => {
            error!("Payout request failed for {}: {:#}", reseller_id, e);
            internal_error()
        }
    }
}
