// src/models/sale_incentive.rs

use std::borrow::Cow;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use crate::models::revenue::{RawValue, RevenueRow};

// Linha da tabela `sale_incentive`
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SaleIncentiveRow {
    pub sale_person: Option<String>,
    pub sale_date: Option<String>, // TO_CHAR(sale_date, 'YYYY-MM-DD')
    pub income: Option<Decimal>,
    // Colunas derivadas, usadas quando sale_date vem nulo
    pub day: Option<i32>,
    pub month: Option<i32>,
    pub year: Option<i32>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
}

impl RevenueRow for SaleIncentiveRow {
    fn person_identifier(&self) -> Option<&str> {
        self.sale_person.as_deref()
    }

    fn date_token(&self) -> Option<Cow<'_, RawValue>> {
        if let Some(date) = self.sale_date.as_deref().filter(|d| !d.trim().is_empty()) {
            return Some(Cow::Owned(RawValue::text(date)));
        }
        match (self.year, self.month, self.day) {
            (Some(y), Some(m), Some(d)) => {
                Some(Cow::Owned(RawValue::Text(format!("{:04}-{:02}-{:02}", y, m, d))))
            }
            _ => None,
        }
    }

    fn amount_token(&self) -> Option<Cow<'_, RawValue>> {
        self.income.map(|income| Cow::Owned(RawValue::from(income)))
    }

    fn customer_name(&self) -> Option<&str> {
        self.customer_name.as_deref()
    }

    fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}
