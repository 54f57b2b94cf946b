use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::error;
use utoipa::OpenApi;

use super::dto::{
    CommandDto, ControlRequest, ControlResponse, CostAnalysisDto, CurrentDataDto, DailyRollupDto,
    HourlyAverageDto, MonthlyUsageDto, ReadingDto, SystemStatusDto, UsageDto,
};
use super::{errors::AppError, AppState};
use crate::aggregation;
use crate::tuya::models::Command;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Parse one range bound: a bare date widens to the start (or, for the end
/// bound, `23:59:59`) of that day; otherwise an RFC3339 timestamp.
fn parse_range_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, AppError> {
    if let Ok(date) = raw.parse::<NaiveDate>() {
        let time = if end_of_day {
            NaiveTime::from_hms_opt(23, 59, 59).expect("constant time is valid")
        } else {
            NaiveTime::MIN
        };
        return Ok(date.and_time(time).and_utc());
    }

    raw.parse::<DateTime<Utc>>()
        .map_err(|_| AppError::BadRequest(format!("invalid date: {raw}")))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Latest reading; a zero-valued object when nothing has been collected yet.
#[utoipa::path(
    get,
    path = "/api/current-data",
    responses(
        (status = 200, description = "Most recent reading", body = CurrentDataDto),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn current_data(State(state): State<AppState>) -> Result<Json<CurrentDataDto>, AppError> {
    if let Some(reading) = state.cache.latest().await {
        return Ok(Json(reading.into()));
    }

    // Cold start: nothing cached yet, fall back to the store.
    let dto = match state.store.latest_reading().await? {
        Some(reading) => reading.into(),
        None => CurrentDataDto::zero(),
    };
    Ok(Json(dto))
}

/// Mean power per hour-of-day over the trailing 24 hours. Hours without
/// readings are absent from the list.
#[utoipa::path(
    get,
    path = "/api/daily-data",
    responses(
        (status = 200, description = "Hourly averages", body = Vec<HourlyAverageDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "aggregates"
)]
pub async fn daily_data(
    State(state): State<AppState>,
) -> Result<Json<Vec<HourlyAverageDto>>, AppError> {
    let since = Utc::now() - Duration::days(1);
    let rows = state.store.hourly_averages(since).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Readings in an inclusive `startDate`..`endDate` range, ascending.
#[utoipa::path(
    get,
    path = "/api/historical-data",
    params(
        ("startDate" = String, Query, description = "Range start, date or RFC3339"),
        ("endDate" = String, Query, description = "Range end, date or RFC3339 (a bare date includes the whole day)"),
    ),
    responses(
        (status = 200, description = "Readings in range", body = Vec<ReadingDto>),
        (status = 400, description = "Missing or invalid range parameter"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn historical_data(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<ReadingDto>>, AppError> {
    let (Some(start_raw), Some(end_raw)) = (params.start_date, params.end_date) else {
        return Err(AppError::BadRequest(
            "startDate and endDate are required".to_owned(),
        ));
    };

    let start = parse_range_bound(&start_raw, false)?;
    let end = parse_range_bound(&end_raw, true)?;

    let rows = state.store.readings_between(start, end).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// The 10 most recent readings, newest first.
#[utoipa::path(
    get,
    path = "/api/recent-readings",
    responses(
        (status = 200, description = "Most recent readings", body = Vec<ReadingDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn recent_readings(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReadingDto>>, AppError> {
    let rows = state.store.recent_readings(10).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Integrated energy for the current UTC day.
#[utoipa::path(
    get,
    path = "/api/today-usage",
    responses(
        (status = 200, description = "Today's usage", body = UsageDto),
        (status = 500, description = "Internal server error"),
    ),
    tag = "aggregates"
)]
pub async fn today_usage(State(state): State<AppState>) -> Result<Json<UsageDto>, AppError> {
    let rows = state.store.readings_on_date(Utc::now().date_naive()).await?;
    let usage = aggregation::energy_kwh(&rows);
    Ok(Json(UsageDto::new(usage, rows.len())))
}

/// Integrated energy and cost for the current calendar month.
#[utoipa::path(
    get,
    path = "/api/monthly-usage",
    responses(
        (status = 200, description = "This month's usage and cost", body = MonthlyUsageDto),
        (status = 500, description = "Internal server error"),
    ),
    tag = "aggregates"
)]
pub async fn monthly_usage(
    State(state): State<AppState>,
) -> Result<Json<MonthlyUsageDto>, AppError> {
    let now = Utc::now();
    let rows = state.store.readings_in_month(now.year(), now.month()).await?;
    let usage = aggregation::energy_kwh(&rows);
    let cost = aggregation::cost(usage, state.unit_price);
    Ok(Json(MonthlyUsageDto::new(usage, cost, rows.len())))
}

/// All-time per-month usage and cost breakdown.
#[utoipa::path(
    get,
    path = "/api/cost-analysis",
    responses(
        (status = 200, description = "Per-month cost breakdown", body = Vec<CostAnalysisDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "aggregates"
)]
pub async fn cost_analysis(
    State(state): State<AppState>,
) -> Result<Json<Vec<CostAnalysisDto>>, AppError> {
    let rows = state.store.all_readings().await?;
    let months = aggregation::monthly_breakdown(&rows, state.unit_price);
    Ok(Json(months.into_iter().map(Into::into).collect()))
}

/// Per-date rollups over everything stored, most recent date first.
#[utoipa::path(
    get,
    path = "/api/all-data",
    responses(
        (status = 200, description = "Per-date rollups", body = Vec<DailyRollupDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "aggregates"
)]
pub async fn all_data(State(state): State<AppState>) -> Result<Json<Vec<DailyRollupDto>>, AppError> {
    let rows = state.store.daily_rollups().await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Every reading for one calendar date, ascending. An empty list is a
/// valid answer for a date with no data.
#[utoipa::path(
    get,
    path = "/api/date-data/{date}",
    params(
        ("date" = String, Path, description = "Calendar date, YYYY-MM-DD"),
    ),
    responses(
        (status = 200, description = "Readings for the date", body = Vec<ReadingDto>),
        (status = 400, description = "Invalid date"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn date_data(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Vec<ReadingDto>>, AppError> {
    let date: NaiveDate = date
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid date: {date}")))?;

    let rows = state.store.readings_on_date(date).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Operational summary: row counts, last collection time, uptime.
#[utoipa::path(
    get,
    path = "/api/system-status",
    responses(
        (status = 200, description = "Service status", body = SystemStatusDto),
        (status = 500, description = "Internal server error"),
    ),
    tag = "system"
)]
pub async fn system_status(
    State(state): State<AppState>,
) -> Result<Json<SystemStatusDto>, AppError> {
    let total_readings = state.store.reading_count().await?;
    let last_reading = state.store.latest_reading().await?.map(|r| r.timestamp);
    let error_count = state.store.event_count("ERROR").await?;

    Ok(Json(SystemStatusDto {
        total_readings,
        last_reading,
        error_count,
        uptime: state.started_at.elapsed().as_secs_f64(),
        server_online: true,
    }))
}

/// Dispatch a control command to the plug and log the outcome.
#[utoipa::path(
    post,
    path = "/api/control-device",
    request_body = ControlRequest,
    responses(
        (status = 200, description = "Command accepted by the device", body = ControlResponse),
        (status = 400, description = "Missing command"),
        (status = 500, description = "Device rejected the command or is unreachable"),
    ),
    tag = "system"
)]
pub async fn control_device(
    State(state): State<AppState>,
    Json(body): Json<ControlRequest>,
) -> Result<Json<ControlResponse>, AppError> {
    let Some(command) = body.command else {
        return Err(AppError::BadRequest("Command is required".to_owned()));
    };

    let dispatched = Command {
        code: command.code.clone(),
        value: command.value.clone(),
    };

    match state
        .tuya
        .send_commands(&state.device_id, vec![dispatched])
        .await
    {
        Ok(result) => {
            if let Err(e) = state
                .store
                .insert_command(&command.code, &command.value, true)
                .await
            {
                error!(error = %e, "Command logging failed");
            }
            Ok(Json(ControlResponse {
                success: true,
                response: result,
            }))
        }
        Err(e) => {
            if let Err(log_err) = state
                .store
                .insert_command(&command.code, &command.value, false)
                .await
            {
                error!(error = %log_err, "Command logging failed");
            }
            Err(AppError::Command(e))
        }
    }
}

// ---------------------------------------------------------------------------
// OpenAPI spec struct (used in api/mod.rs)
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        current_data,
        daily_data,
        historical_data,
        recent_readings,
        today_usage,
        monthly_usage,
        cost_analysis,
        all_data,
        date_data,
        system_status,
        control_device,
    ),
    components(schemas(
        CurrentDataDto,
        ReadingDto,
        HourlyAverageDto,
        UsageDto,
        MonthlyUsageDto,
        CostAnalysisDto,
        DailyRollupDto,
        SystemStatusDto,
        ControlRequest,
        CommandDto,
        ControlResponse,
    )),
    tags(
        (name = "readings", description = "Raw telemetry"),
        (name = "aggregates", description = "Usage and cost summaries"),
        (name = "system", description = "Status and device control"),
    ),
    info(
        title = "Energy Monitor API",
        version = "0.1.0",
        description = "REST API for smart-plug energy telemetry"
    )
)]
pub struct ApiDoc;
