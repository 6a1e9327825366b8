//! HTTP handler functions for the aggregation API.

use actix_web::{HttpResponse, web};
use la_crime_analytics::AnalyticsError;
use la_crime_cache::service::ServedAggregation;
use la_crime_crime_models::CrimeCategory;
use la_crime_server_models::{
    AggregationQueryParams, ApiAggregation, ApiCategory, ApiError, ApiHealth, DEFAULT_DAYS,
    RefreshQueryParams, WindowRequest,
};
use la_crime_source::SourceError;

use crate::AppState;

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        cached_aggregations: state.service.cache().len(),
    })
}

/// `GET /api/categories`
///
/// Returns the crime categories with the weights used for scoring.
pub async fn categories(state: web::Data<AppState>) -> HttpResponse {
    let weights = &state.service.params().weights;
    let categories: Vec<ApiCategory> = CrimeCategory::all()
        .iter()
        .map(|category| ApiCategory {
            name: *category,
            label: category.label().to_string(),
            weight: weights.get(*category),
        })
        .collect();

    HttpResponse::Ok().json(categories)
}

/// `GET /api/aggregation?days=N` or `GET /api/aggregation?start=..&end=..`
///
/// Served from the cache. When the upstream is down but an older result
/// exists, that result is returned with `stale: true`.
pub async fn aggregation(
    state: web::Data<AppState>,
    params: web::Query<AggregationQueryParams>,
) -> HttpResponse {
    let request = match params.window() {
        Ok(request) => request,
        Err(message) => return api_error(HttpResponse::BadRequest(), "invalid_window", message),
    };

    let served = match request {
        WindowRequest::Days(days) => state.service.get_aggregation_days(days).await,
        WindowRequest::Range { start, end } => {
            state.service.get_aggregation_range(start, end).await
        }
    };

    match served {
        Ok(ServedAggregation { result, stale }) => HttpResponse::Ok().json(ApiAggregation {
            stale,
            aggregation: &result,
        }),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/aggregation/refresh?days=N`
///
/// Rebuilds the window regardless of what is cached.
pub async fn refresh(
    state: web::Data<AppState>,
    params: web::Query<RefreshQueryParams>,
) -> HttpResponse {
    let days = params.days.unwrap_or(DEFAULT_DAYS);
    match state.service.force_refresh(days).await {
        Ok(result) => HttpResponse::Ok().json(ApiAggregation {
            stale: false,
            aggregation: &result,
        }),
        Err(e) => error_response(&e),
    }
}

fn error_response(e: &AnalyticsError) -> HttpResponse {
    match e {
        AnalyticsError::Source(SourceError::InvalidWindow { message }) => {
            api_error(HttpResponse::BadRequest(), "invalid_window", message.clone())
        }
        AnalyticsError::Source(_) => {
            log::error!("Aggregation unavailable: {e}");
            api_error(HttpResponse::ServiceUnavailable(), "source_unavailable", e.to_string())
        }
        AnalyticsError::NoNeighborhoods => {
            log::error!("Aggregation failed: {e}");
            api_error(HttpResponse::InternalServerError(), "no_neighborhoods", e.to_string())
        }
        AnalyticsError::Tally { .. } => {
            log::error!("Aggregation failed: {e}");
            api_error(HttpResponse::InternalServerError(), "aggregation_failed", e.to_string())
        }
    }
}

fn api_error(mut builder: actix_web::HttpResponseBuilder, kind: &str, error: String) -> HttpResponse {
    builder.json(ApiError {
        kind: kind.to_string(),
        error,
    })
}
