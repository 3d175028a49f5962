// src/sources/sheet.rs

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    common::{
        date_normalizer::{DateNormalizer, SerialDatePolicy},
        error::AppError,
    },
    models::revenue::{RawRevenueRecord, RawValue, RevenueFilter, RevenueRow},
    sources::{RevenueSource, SHEET_INCENTIVE},
};

/// Resposta do endpoint JSON que expõe a planilha: `{ success, data: [...] }`
#[derive(Debug, Deserialize)]
struct SheetResponse {
    success: bool,
    #[serde(default)]
    data: Value,
    error: Option<String>,
}

/// Em quais colunas da planilha estão pessoa, data e valor.
#[derive(Debug, Clone)]
pub struct SheetColumns {
    pub person: String,
    pub date: String,
    pub amount: String,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
}

impl Default for SheetColumns {
    fn default() -> Self {
        Self {
            person: "sale_person".into(),
            date: "sale_date".into(),
            amount: "income".into(),
            customer_name: Some("customer_name".into()),
            notes: Some("notes".into()),
        }
    }
}

// Uma linha da planilha vista através do mapeamento de colunas
struct SheetRow<'a> {
    row: &'a Map<String, Value>,
    columns: &'a SheetColumns,
}

impl SheetRow<'_> {
    fn text(&self, column: &str) -> Option<&str> {
        self.row.get(column).and_then(Value::as_str)
    }

    fn raw(&self, column: &str) -> Option<Cow<'_, RawValue>> {
        self.row.get(column).and_then(RawValue::from_json).map(Cow::Owned)
    }
}

impl RevenueRow for SheetRow<'_> {
    fn person_identifier(&self) -> Option<&str> {
        self.text(&self.columns.person)
    }

    fn date_token(&self) -> Option<Cow<'_, RawValue>> {
        self.raw(&self.columns.date)
    }

    fn amount_token(&self) -> Option<Cow<'_, RawValue>> {
        self.raw(&self.columns.amount)
    }

    fn customer_name(&self) -> Option<&str> {
        self.columns.customer_name.as_deref().and_then(|c| self.text(c))
    }

    fn notes(&self) -> Option<&str> {
        self.columns.notes.as_deref().and_then(|c| self.text(c))
    }
}

pub struct SheetRevenueSource {
    client: reqwest::Client,
    url: Url,
    columns: SheetColumns,
    dates: DateNormalizer,
}

impl SheetRevenueSource {
    pub fn new(
        url: Url,
        columns: SheetColumns,
        serial_dates: SerialDatePolicy,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            columns,
            dates: DateNormalizer::new(serial_dates),
        })
    }

    fn request_url(&self, filter: &RevenueFilter) -> Url {
        let mut url = self.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("month", &filter.period.month.to_string())
                .append_pair("year", &filter.period.year.to_string());
            if let Some(person) = &filter.person {
                query.append_pair("person", person);
            }
        }
        url
    }

    // Converte o corpo já decodificado em registros. `data` que não é lista é
    // quebra de contrato da fonte, não um registro ruim.
    fn records_from_response(
        &self,
        response: SheetResponse,
        filter: &RevenueFilter,
    ) -> Result<Vec<RawRevenueRecord>, AppError> {
        if !response.success {
            return Err(AppError::source_unavailable(
                self.name(),
                response.error.unwrap_or_else(|| "resposta sem sucesso".to_string()),
            ));
        }

        let rows = match response.data {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            other => {
                return Err(AppError::ComputeFailure(format!(
                    "fonte {} devolveu 'data' que não é lista: {}",
                    self.name(),
                    other
                )));
            }
        };

        let empty = Map::new();
        let records = rows
            .iter()
            .map(|value| {
                let row = value.as_object().unwrap_or(&empty);
                RawRevenueRecord::from_row(&SheetRow { row, columns: &self.columns })
            })
            // O endpoint da planilha nem sempre respeita o filtro de pessoa
            .filter(|record| match &filter.person {
                Some(person) => record.person_identifier.trim() == person,
                None => true,
            })
            .collect();

        Ok(records)
    }
}

#[async_trait]
impl RevenueSource for SheetRevenueSource {
    fn name(&self) -> &str {
        SHEET_INCENTIVE
    }

    fn date_normalizer(&self) -> DateNormalizer {
        self.dates
    }

    async fn fetch_raw_records(&self, filter: &RevenueFilter) -> Result<Vec<RawRevenueRecord>, AppError> {
        let url = self.request_url(filter);
        tracing::info!("📡 Buscando planilha em {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::source_unavailable(self.name(), e))?;

        let body: SheetResponse = response
            .json()
            .await
            .map_err(|e| AppError::source_unavailable(self.name(), e))?;

        let records = self.records_from_response(body, filter)?;
        tracing::info!("✅ {} registros carregados da planilha", records.len());
        Ok(records)
    }
}
