// src/models/revenue.rs

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Rótulo usado quando o registro não informa o responsável ("não especificado")
pub const UNSPECIFIED_PERSON: &str = "ไม่ระบุ";

// --- Tokens crus vindos das fontes ---

// Planilhas e APIs mandam datas e valores ora como texto, ora como número.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(serde_json::Number),
    Text(String),
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        RawValue::Text(value.into())
    }

    /// Converte um valor JSON arbitrário; null, booleanos e objetos viram `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => Some(RawValue::Number(n.clone())),
            serde_json::Value::String(s) => Some(RawValue::Text(s.clone())),
            _ => None,
        }
    }
}

impl From<Decimal> for RawValue {
    fn from(value: Decimal) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Number(n) => write!(f, "{}", n),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

// Uma linha transacional, do jeito que chegou da fonte.
// Criada a cada chamada da fonte e descartada depois da agregação.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRevenueRecord {
    pub person_identifier: String,
    pub date_token: Option<RawValue>,
    pub amount_token: Option<RawValue>,

    // Campos descritivos: apenas repassados, a agregação não usa
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl RawRevenueRecord {
    /// Copia uma linha de qualquer formato para o formato canônico.
    pub fn from_row<R: RevenueRow + ?Sized>(row: &R) -> Self {
        Self {
            person_identifier: row.person_identifier().unwrap_or_default().to_string(),
            date_token: row.date_token().map(Cow::into_owned),
            amount_token: row.amount_token().map(Cow::into_owned),
            customer_name: row.customer_name().map(str::to_string),
            phone: row.phone().map(str::to_string),
            notes: row.notes().map(str::to_string),
        }
    }
}

// --- Extração de campos ---

/// Estratégia de extração: cada formato de linha (tabela de incentivos,
/// tabela de leads, planilha) diz onde estão pessoa, data e valor.
pub trait RevenueRow {
    fn person_identifier(&self) -> Option<&str>;
    fn date_token(&self) -> Option<Cow<'_, RawValue>>;
    fn amount_token(&self) -> Option<Cow<'_, RawValue>>;

    fn customer_name(&self) -> Option<&str> {
        None
    }

    fn phone(&self) -> Option<&str> {
        None
    }

    fn notes(&self) -> Option<&str> {
        None
    }
}

impl RevenueRow for RawRevenueRecord {
    fn person_identifier(&self) -> Option<&str> {
        Some(&self.person_identifier)
    }

    fn date_token(&self) -> Option<Cow<'_, RawValue>> {
        self.date_token.as_ref().map(Cow::Borrowed)
    }

    fn amount_token(&self) -> Option<Cow<'_, RawValue>> {
        self.amount_token.as_ref().map(Cow::Borrowed)
    }

    fn customer_name(&self) -> Option<&str> {
        self.customer_name.as_deref()
    }

    fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

// --- Filtros ---

/// Mês de referência, 1-12 (convenção do chrono e da API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct ReportPeriod {
    pub year: i32,
    pub month: u32,
}

impl ReportPeriod {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevenueFilter {
    pub period: ReportPeriod,
    pub person: Option<String>,
}

impl RevenueFilter {
    pub fn new(period: ReportPeriod, person: Option<&str>) -> Self {
        // "all" e vazio significam "sem filtro", como no painel
        let person = person
            .map(str::trim)
            .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("all"))
            .map(str::to_string);
        Self { period, person }
    }

    /// Chave de cache: a tupla completa de filtros, serializada.
    pub fn cache_key(&self, source_name: &str) -> String {
        format!(
            "{}:{}-{:02}:{}",
            source_name,
            self.period.year,
            self.period.month,
            self.person.as_deref().unwrap_or("all")
        )
    }
}

// --- Resultado da agregação ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevenueTotals {
    /// Todos os registros recebidos
    pub processed: u64,
    /// Registros com data dentro do mês pedido
    pub matched: u64,
    pub total_amount: Decimal,

    // Diagnóstico
    pub unparseable_dates: u64,
    pub out_of_period: u64,
    pub unparseable_amounts: u64,
    pub zero_amounts: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevenueMatrix {
    pub year: i32,
    pub month: u32,
    /// pessoa -> dia do mês -> valor acumulado
    #[schema(value_type = Object)]
    pub matrix: BTreeMap<String, BTreeMap<u32, Decimal>>,
    #[schema(value_type = Object)]
    pub person_totals: BTreeMap<String, Decimal>,
    pub totals: RevenueTotals,
}

impl RevenueMatrix {
    pub fn empty(period: ReportPeriod) -> Self {
        Self {
            year: period.year,
            month: period.month,
            matrix: BTreeMap::new(),
            person_totals: BTreeMap::new(),
            totals: RevenueTotals::default(),
        }
    }
}

// Só para os testes: valor acumulado numa célula da matriz
#[cfg(test)]
impl RevenueMatrix {
    pub fn amount_for(&self, person: &str, day: u32) -> Decimal {
        self.matrix
            .get(person)
            .and_then(|days| days.get(&day))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

// --- Resposta HTTP ---

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevenueFilters {
    pub month: u32,
    pub year: i32,
    pub person: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevenueResponse {
    pub success: bool,
    pub source: String,
    pub data: RevenueMatrix,
    pub is_stale: bool,
    pub computed_at: DateTime<Utc>,
    pub filters: RevenueFilters,
}
