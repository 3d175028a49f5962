// src/docs.rs

use utoipa::OpenApi;
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Revenue ---
        handlers::revenue::get_revenue,
        handlers::revenue::list_sources,
        handlers::revenue::clear_cache,
    ),
    components(
        schemas(
            models::revenue::RevenueResponse,
            models::revenue::RevenueMatrix,
            models::revenue::RevenueTotals,
            models::revenue::RevenueFilters,
            models::revenue::ReportPeriod,
            services::ttl_cache::CacheStatus,

            handlers::revenue::SourceListResponse,
            handlers::revenue::ClearCacheResponse,
        )
    ),
    tags(
        (name = "Revenue", description = "Matriz de receita por responsável e dia do mês")
    ),
    modifiers(&InfoAddon)
)]
pub struct ApiDoc;

struct InfoAddon;

impl utoipa::Modify for InfoAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = "Clinic Revenue API".to_string();
        openapi.info.description = Some(
            "Agrega receita (incentivos de venda, leads, planilha) em matrizes mensais com cache.".to_string(),
        );
    }
}
