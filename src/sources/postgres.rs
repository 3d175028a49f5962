// src/sources/postgres.rs

use async_trait::async_trait;

use crate::{
    common::{
        date_normalizer::{DateNormalizer, SerialDatePolicy},
        error::AppError,
    },
    db::{LeadRepository, SaleIncentiveRepository},
    models::revenue::{RawRevenueRecord, RevenueFilter},
    sources::{RevenueSource, LEAD_REVENUE, SALE_INCENTIVE},
};

// Erro de banco aqui é sempre "fonte indisponível" para as camadas de cima
fn unavailable(source_name: &str, err: AppError) -> AppError {
    match err {
        AppError::DatabaseError(e) => AppError::source_unavailable(source_name, e),
        other => other,
    }
}

pub struct SaleIncentiveSource {
    repo: SaleIncentiveRepository,
    dates: DateNormalizer,
}

impl SaleIncentiveSource {
    pub fn new(repo: SaleIncentiveRepository, serial_dates: SerialDatePolicy) -> Self {
        Self { repo, dates: DateNormalizer::new(serial_dates) }
    }
}

#[async_trait]
impl RevenueSource for SaleIncentiveSource {
    fn name(&self) -> &str {
        SALE_INCENTIVE
    }

    fn date_normalizer(&self) -> DateNormalizer {
        self.dates
    }

    async fn fetch_raw_records(&self, filter: &RevenueFilter) -> Result<Vec<RawRevenueRecord>, AppError> {
        tracing::info!("📡 Buscando sale incentive no banco ({:?})...", filter);

        let rows = self
            .repo
            .find_by_period(filter)
            .await
            .map_err(|e| unavailable(self.name(), e))?;

        tracing::info!("✅ {} registros de sale incentive carregados", rows.len());
        Ok(rows.iter().map(RawRevenueRecord::from_row).collect())
    }
}

pub struct LeadRevenueSource {
    repo: LeadRepository,
    dates: DateNormalizer,
}

impl LeadRevenueSource {
    pub fn new(repo: LeadRepository, serial_dates: SerialDatePolicy) -> Self {
        Self { repo, dates: DateNormalizer::new(serial_dates) }
    }
}

#[async_trait]
impl RevenueSource for LeadRevenueSource {
    fn name(&self) -> &str {
        LEAD_REVENUE
    }

    fn date_normalizer(&self) -> DateNormalizer {
        self.dates
    }

    async fn fetch_raw_records(&self, filter: &RevenueFilter) -> Result<Vec<RawRevenueRecord>, AppError> {
        tracing::info!("📡 Buscando receita das leads ({:?})...", filter);

        // O pré-filtro SQL segue a mesma regra de seriais do normalizador
        let serial_dates = self.dates.serial_dates() == SerialDatePolicy::SpreadsheetEpoch;
        let rows = self
            .repo
            .find_by_period(filter, serial_dates)
            .await
            .map_err(|e| unavailable(self.name(), e))?;

        tracing::info!("✅ {} registros de leads carregados", rows.len());
        Ok(rows.iter().map(RawRevenueRecord::from_row).collect())
    }
}
