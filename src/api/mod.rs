pub mod dto;
pub mod errors;
pub mod handlers;

use std::time::Instant;

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{db::store::EnergyStore, reading_cache::ReadingCache, tuya::TuyaClient};
use handlers::ApiDoc;

/// Everything the handlers need, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub store: EnergyStore,
    pub tuya: TuyaClient,
    pub cache: ReadingCache,
    pub device_id: String,
    /// Currency units per kWh, applied to every cost figure
    pub unit_price: f64,
    pub started_at: Instant,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/api/current-data", get(handlers::current_data))
        .route("/api/daily-data", get(handlers::daily_data))
        .route("/api/historical-data", get(handlers::historical_data))
        .route("/api/recent-readings", get(handlers::recent_readings))
        .route("/api/today-usage", get(handlers::today_usage))
        .route("/api/monthly-usage", get(handlers::monthly_usage))
        .route("/api/cost-analysis", get(handlers::cost_analysis))
        .route("/api/all-data", get(handlers::all_data))
        .route("/api/date-data/{date}", get(handlers::date_data))
        .route("/api/system-status", get(handlers::system_status))
        .route("/api/control-device", post(handlers::control_device))
        .with_state(state)
        .split_for_parts();

    router.route(
        "/api-docs/openapi.json",
        get(move || async move { axum::Json(api) }),
    )
}
