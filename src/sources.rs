// src/sources.rs

pub mod postgres;
pub mod sheet;

use async_trait::async_trait;

use crate::{
    common::{date_normalizer::DateNormalizer, error::AppError},
    models::revenue::{RawRevenueRecord, RevenueFilter},
};

pub use postgres::{LeadRevenueSource, SaleIncentiveSource};
pub use sheet::{SheetColumns, SheetRevenueSource};

pub const SALE_INCENTIVE: &str = "sale-incentive";
pub const LEAD_REVENUE: &str = "lead-revenue";
pub const SHEET_INCENTIVE: &str = "sheet-incentive";

/// Qualquer sistema externo (banco ou API) que fornece registros de receita.
///
/// Falhas de transporte ou de consulta devem voltar como
/// `AppError::SourceUnavailable`; quem decide o que fazer é o cache.
#[async_trait]
pub trait RevenueSource: Send + Sync {
    fn name(&self) -> &str;

    /// Normalizador de datas desta fonte (inclui a regra de seriais de planilha).
    fn date_normalizer(&self) -> DateNormalizer;

    async fn fetch_raw_records(&self, filter: &RevenueFilter) -> Result<Vec<RawRevenueRecord>, AppError>;
}
