// src/services/revenue_service.rs

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    common::error::AppError,
    models::revenue::{ReportPeriod, RevenueFilter, RevenueMatrix},
    services::{
        aggregation::AggregationEngine,
        ttl_cache::{Cached, TtlCache},
    },
    sources::RevenueSource,
};

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Ponto de entrada usado pelos handlers: fonte -> agregação -> cache.
#[derive(Clone)]
pub struct RevenueService {
    sources: Arc<BTreeMap<String, Arc<dyn RevenueSource>>>,
    engine: AggregationEngine,
    cache: TtlCache<RevenueMatrix>,
    source_timeout: Duration,
}

impl RevenueService {
    pub fn new(
        sources: Vec<Arc<dyn RevenueSource>>,
        engine: AggregationEngine,
        cache: TtlCache<RevenueMatrix>,
        source_timeout: Duration,
    ) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (source.name().to_string(), source))
            .collect();

        Self {
            sources: Arc::new(sources),
            engine,
            cache,
            source_timeout,
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    fn source(&self, name: &str) -> Result<Arc<dyn RevenueSource>, AppError> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::UnknownSource(name.to_string()))
    }

    /// Matriz de receita do mês para uma fonte. Só falha quando a fonte está
    /// fora do ar e não há nada no cache para essa combinação de filtros.
    pub async fn get_revenue_matrix(
        &self,
        source_name: &str,
        period: ReportPeriod,
        person: Option<&str>,
    ) -> Result<Cached<RevenueMatrix>, AppError> {
        let source = self.source(source_name)?;
        let filter = RevenueFilter::new(period, person);
        let key = filter.cache_key(source.name());

        let engine = self.engine.clone();
        let timeout = self.source_timeout;

        let cached = self
            .cache
            .get_or_refresh(&key, move || async move {
                let records = match tokio::time::timeout(timeout, source.fetch_raw_records(&filter)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        return Err(AppError::source_unavailable(
                            source.name(),
                            format!("sem resposta em {}s", timeout.as_secs()),
                        ));
                    }
                };

                Ok(engine.aggregate(&records, filter.period, &source.date_normalizer()))
            })
            .await?;

        tracing::info!("📊 Receita {} servida ({})", key, cached.status.as_str());
        Ok(cached)
    }

    /// Limpa o cache inteiro, ou só as entradas de uma fonte.
    pub fn clear_cache(&self, source_name: Option<&str>) -> Result<usize, AppError> {
        let removed = match source_name {
            Some(name) => {
                let source = self.source(name)?;
                self.cache.invalidate_prefix(&format!("{}:", source.name()))
            }
            None => self.cache.clear(),
        };
        tracing::info!("🧹 {} entradas removidas do cache de receita", removed);
        Ok(removed)
    }
}
