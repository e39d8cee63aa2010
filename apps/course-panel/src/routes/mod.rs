use axum::{
    Router,
    http::{HeaderValue, header},
    routing::{get, post},
};
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::handlers::{self, admin, reseller};
use crate::state::AppState;

const BODY_LIMIT: usize = 64 * 1024;

pub fn app_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/registrations", post(handlers::public::register))
        .route("/codes/validate", post(handlers::public::check_code))
        .route("/course", get(handlers::public::course_info));

    let admin_routes = Router::new()
        .route("/stats", get(admin::get_stats))
        .route("/registrations", get(admin::list_registrations))
        .route("/registrations/recent", get(admin::get_recent))
        .route("/registrations/export", get(admin::export_registrations))
        .route(
            "/registrations/{id}",
            get(admin::get_registration).delete(admin::delete_registration),
        )
        .route("/registrations/{id}/status", post(admin::update_status))
        .route("/emails/bulk", post(admin::send_bulk_email))
        .route(
            "/settings/course",
            get(admin::get_course_settings).post(admin::save_course_settings),
        )
        .route("/codes/usage-log", get(admin::usage_log))
        .route("/codes/used", get(admin::used_codes))
        .route("/codes/requesters/{requester_id}", get(admin::requester_history))
        .route("/codes/support", post(admin::grant_support_code));

    let reseller_routes = Router::new()
        .route("/profile", get(reseller::get_profile).post(reseller::update_profile))
        .route("/stats", get(reseller::get_stats))
        .route("/codes", get(reseller::list_codes))
        .route("/codes/generate", post(reseller::generate_codes))
        .route("/codes/{code}/coupon", get(reseller::coupon))
        .route("/codes/{code}/share", get(reseller::share_code))
        .route("/coupons/print", get(reseller::print_coupons))
        .route("/sales/recent", get(reseller::recent_sales))
        .route("/sales/export", get(reseller::export_sales))
        .route("/performance", get(reseller::performance))
        .route("/payouts", post(reseller::request_payout));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api", public_routes)
        .nest("/admin/api", admin_routes)
        .nest("/reseller/api/{reseller_id}", reseller_routes)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
