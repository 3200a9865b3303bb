//! HTTP handlers for the ledger timeline, current stock and movement summary

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use shared::{
    parse_day_range, validate_prior_balance, validate_product_code, FilterError, GroupBy,
    WarehouseFilter,
};

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{ApiResponse, CurrentStock, MovementSummaryView};
use crate::services::export::timeline_to_csv;
use crate::services::timeline::{Baseline, TimelineRequest};
use crate::services::{LedgerTimelineService, MovementSummaryService};
use crate::AppState;

/// Query parameters for the timeline endpoints
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TimelineQuery {
    /// Only read by the query-string variant of the endpoint
    pub product_code: Option<String>,
    pub warehouse: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    #[validate(range(min = 1, message = "limit must be at least 1"))]
    pub limit: Option<i64>,
    pub prior_balance: Option<i64>,
    pub carry_forward: Option<bool>,
    /// `json` (default) or `csv`
    pub format: Option<String>,
}

/// Query parameters for the current stock endpoint
#[derive(Debug, Default, Deserialize)]
pub struct StockQuery {
    pub warehouse: Option<String>,
}

/// Query parameters for the movement summary
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementSummaryQuery {
    pub warehouse: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub group_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportFormat {
    Json,
    Csv,
}

impl TimelineQuery {
    fn into_request(
        self,
        product_code: Option<&str>,
        limits: &LedgerConfig,
    ) -> AppResult<(TimelineRequest, ExportFormat)> {
        self.validate()?;

        let product_code = validate_product_code(product_code)?;
        let days = parse_day_range(self.date_from.as_deref(), self.date_to.as_deref())?;

        let limit = self.limit.unwrap_or(limits.default_limit);
        if limit > limits.max_limit {
            return Err(AppError::Validation {
                field: "limit".to_string(),
                message: format!("limit must not exceed {}", limits.max_limit),
            });
        }

        let baseline = match (self.prior_balance, self.carry_forward.unwrap_or(false)) {
            (Some(_), true) => return Err(FilterError::ConflictingBaseline.into()),
            (Some(balance), false) => Baseline::Explicit(validate_prior_balance(balance)?),
            (None, true) => Baseline::CarryForward,
            (None, false) => Baseline::Zero,
        };

        let format = match self.format.as_deref().map(str::trim) {
            None | Some("") => ExportFormat::Json,
            Some(f) if f.eq_ignore_ascii_case("json") => ExportFormat::Json,
            Some(f) if f.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            Some(other) => {
                return Err(AppError::Validation {
                    field: "format".to_string(),
                    message: format!("format must be 'json' or 'csv', got '{}'", other),
                })
            }
        };

        let request = TimelineRequest {
            product_code,
            warehouse: WarehouseFilter::from_param(self.warehouse.as_deref()),
            days,
            limit,
            baseline,
        };
        Ok((request, format))
    }
}

/// Map query-string rejections (e.g. `limit=abc`) to validation errors
fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    query.map(|Query(params)| params).map_err(|rejection| AppError::Validation {
        field: "query".to_string(),
        message: rejection.body_text(),
    })
}

/// Get the balance-annotated timeline for a product
pub async fn get_product_timeline(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_code): Path<String>,
    query: Result<Query<TimelineQuery>, QueryRejection>,
) -> AppResult<Response> {
    check_permission(&current_user.0, "ledger", "read")?;
    let query = query_params(query)?;
    serve_timeline(&state, query, Some(&product_code)).await
}

/// Same as [`get_product_timeline`] with `productCode` in the query string
pub async fn get_timeline_by_query(
    State(state): State<AppState>,
    current_user: CurrentUser,
    query: Result<Query<TimelineQuery>, QueryRejection>,
) -> AppResult<Response> {
    check_permission(&current_user.0, "ledger", "read")?;
    let mut query = query_params(query)?;
    let product_code = query.product_code.take();
    serve_timeline(&state, query, product_code.as_deref()).await
}

async fn serve_timeline(
    state: &AppState,
    query: TimelineQuery,
    product_code: Option<&str>,
) -> AppResult<Response> {
    let (request, format) = query.into_request(product_code, &state.config.ledger)?;

    let service =
        LedgerTimelineService::from_pool(state.db.clone(), state.config.ledger.query_timeout());
    let served = service.get_timeline(&request).await?;

    match format {
        ExportFormat::Json => Ok(Json(ApiResponse::from(served)).into_response()),
        ExportFormat::Csv => {
            let csv = timeline_to_csv(&served.data.timeline)?;
            let disposition = format!(
                "attachment; filename=\"timeline_{}_{}.csv\"",
                sanitize_filename(&request.product_code),
                sanitize_filename(request.warehouse.label())
            );
            let mut response = (
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                csv,
            )
                .into_response();
            annotate_export(response.headers_mut(), served.degraded, served.message.as_deref());
            Ok(response)
        }
    }
}

/// Header set on a CSV export served from an unreachable ledger
pub const DEGRADED_HEADER: &str = "x-ledger-degraded";
/// Header carrying the degraded or partial-data message of a CSV export
pub const NOTICE_HEADER: &str = "x-ledger-notice";

/// CSV has no envelope, so degraded and partial-data state travel as headers
fn annotate_export(headers: &mut HeaderMap, degraded: bool, message: Option<&str>) {
    if degraded {
        headers.insert(DEGRADED_HEADER, HeaderValue::from_static("true"));
    }
    if let Some(value) = message.and_then(|m| HeaderValue::from_str(m).ok()) {
        headers.insert(NOTICE_HEADER, value);
    }
}

fn sanitize_filename(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Get active stock per warehouse for a product
pub async fn get_current_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_code): Path<String>,
    query: Result<Query<StockQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<Vec<CurrentStock>>>> {
    check_permission(&current_user.0, "ledger", "read")?;
    let query = query_params(query)?;
    let product_code = validate_product_code(Some(&product_code))?;
    let warehouse = WarehouseFilter::from_param(query.warehouse.as_deref());

    let service =
        LedgerTimelineService::from_pool(state.db.clone(), state.config.ledger.query_timeout());
    let rows = service.get_current_stock(&product_code, &warehouse).await?;
    Ok(Json(ApiResponse::ok(rows)))
}

/// Get movement totals grouped by product or warehouse
pub async fn get_movement_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
    query: Result<Query<MovementSummaryQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<MovementSummaryView>>> {
    check_permission(&current_user.0, "ledger", "read")?;
    let query = query_params(query)?;

    let days = parse_day_range(query.date_from.as_deref(), query.date_to.as_deref())?;
    let group_by = match query.group_by.as_deref().map(str::trim) {
        None | Some("") => GroupBy::default(),
        Some(raw) => raw.parse::<GroupBy>()?,
    };
    let warehouse = WarehouseFilter::from_param(query.warehouse.as_deref());

    let service = MovementSummaryService::from_pool(
        state.db.clone(),
        state.config.ledger.query_timeout(),
        state.config.ledger.aggregate_group_limit,
    );
    let served = service.get_summary(warehouse, days, group_by).await?;
    Ok(Json(ApiResponse::from(served)))
}
