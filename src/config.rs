// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::{Context, anyhow};
use reqwest::Url;
use sqlx::postgres::PgPoolOptions;

use crate::{
    common::date_normalizer::SerialDatePolicy,
    db::{LeadRepository, SaleIncentiveRepository},
    services::{
        RevenueService,
        aggregation::{AggregationEngine, AggregationOptions},
        ttl_cache::TtlCache,
    },
    sources::{LeadRevenueSource, RevenueSource, SaleIncentiveSource, SheetColumns, SheetRevenueSource},
};

/// Tudo que vem do ambiente (.env incluso), lido uma vez na inicialização.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_acquire_timeout: Duration,
    pub bind_addr: String,

    pub cache_ttl: Duration,
    pub cache_grace: Duration,
    pub source_timeout: Duration,
    pub count_unpriced_matches: bool,

    pub sheet_revenue_url: Option<Url>,
    pub sale_incentive_serial_dates: SerialDatePolicy,
    pub lead_revenue_serial_dates: SerialDatePolicy,
    pub sheet_revenue_serial_dates: SerialDatePolicy,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    // Separado do `env` para poder testar sem mexer no ambiente do processo
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secs = |key: &str, default: u64| -> anyhow::Result<Duration> {
            match var(key) {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} deve ser um número de segundos, veio {:?}", key, v)),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let flag = |key: &str, default: bool| -> anyhow::Result<bool> {
            match var(key) {
                Some(v) => parse_bool(&v).ok_or_else(|| anyhow!("{} deve ser true/false, veio {:?}", key, v)),
                None => Ok(default),
            }
        };

        let serial = |key: &str, default: bool| -> anyhow::Result<SerialDatePolicy> {
            Ok(if flag(key, default)? {
                SerialDatePolicy::SpreadsheetEpoch
            } else {
                SerialDatePolicy::Reject
            })
        };

        let database_url = var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;

        let database_max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS inválido: {:?}", v))?,
            None => 20,
        };

        let sheet_revenue_url = var("SHEET_REVENUE_URL")
            .map(|v| Url::parse(v.trim()).with_context(|| format!("SHEET_REVENUE_URL inválida: {:?}", v)))
            .transpose()?;

        Ok(Self {
            database_url,
            database_max_connections,
            database_acquire_timeout: secs("DATABASE_ACQUIRE_TIMEOUT_SECS", 10)?,
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            cache_ttl: secs("REVENUE_CACHE_TTL_SECS", 30)?,
            cache_grace: secs("REVENUE_CACHE_GRACE_SECS", 60)?,
            source_timeout: secs("REVENUE_SOURCE_TIMEOUT_SECS", 30)?,
            count_unpriced_matches: flag("REVENUE_COUNT_UNPRICED_MATCHES", true)?,
            sheet_revenue_url,
            // A tabela de leads guarda seriais de planilha; sale_incentive tem coluna DATE
            sale_incentive_serial_dates: serial("SALE_INCENTIVE_SERIAL_DATES", false)?,
            lead_revenue_serial_dates: serial("LEAD_REVENUE_SERIAL_DATES", true)?,
            sheet_revenue_serial_dates: serial("SHEET_REVENUE_SERIAL_DATES", true)?,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub revenue_service: RevenueService,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(settings.database_max_connections)
            .acquire_timeout(settings.database_acquire_timeout)
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let mut sources: Vec<Arc<dyn RevenueSource>> = vec![
            Arc::new(SaleIncentiveSource::new(
                SaleIncentiveRepository::new(db_pool.clone()),
                settings.sale_incentive_serial_dates,
            )),
            Arc::new(LeadRevenueSource::new(
                LeadRepository::new(db_pool.clone()),
                settings.lead_revenue_serial_dates,
            )),
        ];

        if let Some(url) = &settings.sheet_revenue_url {
            sources.push(Arc::new(SheetRevenueSource::new(
                url.clone(),
                SheetColumns::default(),
                settings.sheet_revenue_serial_dates,
                settings.source_timeout,
            )?));
            tracing::info!("📄 Fonte de planilha registrada: {}", url);
        }

        let engine = AggregationEngine::new(AggregationOptions {
            count_unpriced_matches: settings.count_unpriced_matches,
        });
        let cache = TtlCache::new(settings.cache_ttl, settings.cache_grace);

        Ok(Self {
            revenue_service: RevenueService::new(sources, engine, cache, settings.source_timeout),
        })
    }
}
