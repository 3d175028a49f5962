// src/handlers/revenue.rs

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::revenue::{ReportPeriod, RevenueFilter, RevenueFilters, RevenueResponse},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sources", get(list_sources))
        .route("/cache", delete(clear_cache))
        .route("/{source}", get(get_revenue))
}

// Query string malformada (ex: month=abc) também responde no formato padrão
fn query_rejection(rejection: QueryRejection, locale: &Locale) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        error: if locale.is_thai() {
            "พารามิเตอร์ไม่ถูกต้อง".to_string()
        } else {
            "One or more parameters are invalid.".to_string()
        },
        details: Some(json!({ "query": rejection.body_text() })),
    }
}

// ---
// GET /api/revenue/{source}
// ---
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RevenueQuery {
    /// Mês 1-12 (padrão: mês corrente)
    #[validate(range(min = 1, max = 12, message = "O mês deve estar entre 1 e 12."))]
    pub month: Option<u32>,

    /// Ano (padrão: ano corrente)
    #[validate(range(min = 2000, max = 2100, message = "O ano deve estar entre 2000 e 2100."))]
    pub year: Option<i32>,

    /// Responsável; "all" ou vazio = todos
    #[serde(alias = "sale_person")]
    #[validate(length(max = 100, message = "O nome deve ter no máximo 100 caracteres."))]
    pub person: Option<String>,
}

impl RevenueQuery {
    // Mês/ano ausentes usam o mês corrente
    fn period(&self, today: NaiveDate) -> Result<ReportPeriod, AppError> {
        self.validate()?;

        ReportPeriod::new(self.year.unwrap_or(today.year()), self.month.unwrap_or(today.month())).ok_or_else(|| {
            let mut error = ValidationError::new("range");
            error.message = Some("O mês deve estar entre 1 e 12.".into());
            let mut errors = ValidationErrors::new();
            errors.add("month", error);
            AppError::ValidationError(errors)
        })
    }
}

#[utoipa::path(
    get,
    path = "/api/revenue/{source}",
    tag = "Revenue",
    params(
        ("source" = String, Path, description = "Fonte de receita (ex: sale-incentive, lead-revenue)"),
        RevenueQuery,
    ),
    responses(
        (status = 200, description = "Matriz pessoa x dia do mês", body = RevenueResponse,
            headers(("X-Cache-Status" = String, description = "HIT, MISS ou STALE"))),
        (status = 400, description = "Parâmetros inválidos"),
        (status = 404, description = "Fonte desconhecida"),
        (status = 503, description = "Fonte indisponível e sem cache")
    )
)]
pub async fn get_revenue(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(source): Path<String>,
    query: Result<Query<RevenueQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(|r| query_rejection(r, &locale))?;

    let period = query
        .period(Utc::now().date_naive())
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    let cached = app_state
        .revenue_service
        .get_revenue_matrix(&source, period, query.person.as_deref())
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    let person = RevenueFilter::new(period, query.person.as_deref())
        .person
        .unwrap_or_else(|| "all".to_string());

    let headers = [
        ("x-cache-status", cached.status.as_str().to_string()),
        ("x-data-source", source.clone()),
    ];

    let body = RevenueResponse {
        success: true,
        source,
        is_stale: cached.is_stale(),
        computed_at: cached.computed_at,
        data: cached.value,
        filters: RevenueFilters {
            month: period.month,
            year: period.year,
            person,
        },
    };

    Ok((StatusCode::OK, headers, Json(body)))
}

// ---
// GET /api/revenue/sources
// ---
#[derive(Debug, Serialize, ToSchema)]
pub struct SourceListResponse {
    pub success: bool,
    pub data: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/api/revenue/sources",
    tag = "Revenue",
    responses(
        (status = 200, description = "Fontes de receita registradas", body = SourceListResponse)
    )
)]
pub async fn list_sources(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(SourceListResponse {
        success: true,
        data: app_state.revenue_service.source_names(),
    })
}

// ---
// DELETE /api/revenue/cache
// ---
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClearCacheQuery {
    /// Limpa apenas esta fonte; sem o parâmetro, limpa tudo
    pub source: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearCacheResponse {
    pub success: bool,
    pub removed: usize,
}

#[utoipa::path(
    delete,
    path = "/api/revenue/cache",
    tag = "Revenue",
    params(ClearCacheQuery),
    responses(
        (status = 200, description = "Entradas removidas do cache", body = ClearCacheResponse),
        (status = 404, description = "Fonte desconhecida")
    )
)]
pub async fn clear_cache(
    State(app_state): State<AppState>,
    locale: Locale,
    query: Result<Query<ClearCacheQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(|r| query_rejection(r, &locale))?;

    let removed = app_state
        .revenue_service
        .clear_cache(query.source.as_deref())
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(ClearCacheResponse { success: true, removed })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::{
        common::date_normalizer::{DateNormalizer, SerialDatePolicy},
        models::revenue::{RawRevenueRecord, RawValue},
        services::{
            aggregation::AggregationEngine,
            ttl_cache::{TtlCache, DEFAULT_GRACE, DEFAULT_TTL},
            RevenueService,
        },
        sources::RevenueSource,
    };

    // Fonte fixa em memória; "down" sempre falha
    struct StaticSource {
        name: &'static str,
        records: Vec<RawRevenueRecord>,
    }

    #[async_trait]
    impl RevenueSource for StaticSource {
        fn name(&self) -> &str {
            self.name
        }

        fn date_normalizer(&self) -> DateNormalizer {
            DateNormalizer::new(SerialDatePolicy::SpreadsheetEpoch)
        }

        async fn fetch_raw_records(&self, _filter: &RevenueFilter) -> Result<Vec<RawRevenueRecord>, AppError> {
            if self.name == "down" {
                return Err(AppError::source_unavailable(self.name, "connection refused"));
            }
            Ok(self.records.clone())
        }
    }

    fn record(person: &str, date: RawValue, amount: &str) -> RawRevenueRecord {
        RawRevenueRecord {
            person_identifier: person.to_string(),
            date_token: Some(date),
            amount_token: Some(RawValue::text(amount)),
            ..Default::default()
        }
    }

    fn app() -> Router {
        let fake: Arc<dyn RevenueSource> = Arc::new(StaticSource {
            name: "fake",
            records: vec![
                record("จีน", RawValue::text("11/11/2023"), "1,500"),
                record("", RawValue::Number(45241.into()), "500"),
                record("มุก", RawValue::text("2023-12-01"), "900"),
            ],
        });
        let down: Arc<dyn RevenueSource> = Arc::new(StaticSource { name: "down", records: vec![] });

        let state = AppState {
            revenue_service: RevenueService::new(
                vec![fake, down],
                AggregationEngine::default(),
                TtlCache::new(DEFAULT_TTL, DEFAULT_GRACE),
                Duration::from_secs(5),
            ),
        };

        Router::new().nest("/api/revenue", routes()).with_state(state)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn returns_the_matrix_with_cache_headers() {
        let app = app();
        let (status, headers, body) = send(app.clone(), get("/api/revenue/fake?month=11&year=2023")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-cache-status"], "MISS");
        assert_eq!(headers["x-data-source"], "fake");
        assert_eq!(body["success"], true);
        assert_eq!(body["isStale"], false);
        assert_eq!(body["data"]["matrix"]["จีน"]["11"], 1500.0);
        assert_eq!(body["data"]["matrix"]["ไม่ระบุ"]["11"], 500.0);
        assert_eq!(body["data"]["totals"]["processed"], 3);
        assert_eq!(body["data"]["totals"]["matched"], 2);
        assert_eq!(body["data"]["totals"]["totalAmount"], 2000.0);
        assert_eq!(body["filters"]["person"], "all");

        let (_, headers, _) = send(app, get("/api/revenue/fake?month=11&year=2023&person=all")).await;
        assert_eq!(headers["x-cache-status"], "HIT");
    }

    #[tokio::test]
    async fn invalid_month_is_a_validation_error() {
        let (status, _, body) = send(app(), get("/api/revenue/fake?month=13&year=2023")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["details"]["month"].is_array());
    }

    #[test]
    fn period_defaults_to_the_current_month_and_rejects_bad_months() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let query = |month, year| RevenueQuery { month, year, person: None };

        assert_eq!(query(None, None).period(today).unwrap(), ReportPeriod::new(2025, 3).unwrap());
        assert_eq!(query(Some(11), Some(2023)).period(today).unwrap(), ReportPeriod::new(2023, 11).unwrap());

        for month in [0, 13] {
            let err = query(Some(month), None).period(today).unwrap_err();
            let api = err.to_api_error(&Locale("en".into()));
            assert_eq!(api.status, StatusCode::BAD_REQUEST);
            assert!(api.details.unwrap()["month"].is_array());
        }
    }

    #[tokio::test]
    async fn malformed_query_keeps_the_error_shape() {
        let (status, _, body) = send(app(), get("/api/revenue/fake?month=abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["details"]["query"].is_string());
    }

    #[tokio::test]
    async fn unknown_source_is_localized() {
        let request = Request::builder()
            .uri("/api/revenue/nope?month=1&year=2024")
            .header(header::ACCEPT_LANGUAGE, "th-TH,th;q=0.9")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(app(), request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "ไม่พบแหล่งข้อมูลรายรับ");
        assert_eq!(body["details"]["source"], "nope");
    }

    #[tokio::test]
    async fn cold_source_failure_is_503() {
        let (status, _, body) = send(app(), get("/api/revenue/down?month=1&year=2024")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["details"]["source"], "down");
    }

    #[tokio::test]
    async fn lists_sources_and_clears_the_cache() {
        let app = app();
        let (status, _, body) = send(app.clone(), get("/api/revenue/sources")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], serde_json::json!(["down", "fake"]));

        send(app.clone(), get("/api/revenue/fake?month=11&year=2023")).await;
        send(app.clone(), get("/api/revenue/fake?month=12&year=2023")).await;

        let request = Request::builder()
            .method("DELETE")
            .uri("/api/revenue/cache?source=fake")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 2);

        let (_, headers, _) = send(app, get("/api/revenue/fake?month=11&year=2023")).await;
        assert_eq!(headers["x-cache-status"], "MISS");
    }
}
