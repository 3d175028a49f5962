// src/models/lead.rs

use std::borrow::Cow;

use serde::Serialize;
use sqlx::FromRow;

use crate::models::revenue::{RawValue, RevenueRow};

// Linha da tabela de leads (`bjh_all_leads`). Quase tudo é texto livre vindo
// da planilha de origem: a data pode ser DD/MM/YYYY ou serial, e o valor
// proposto pode ter vírgulas.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeadRevenueRow {
    pub contact_staff: Option<String>,
    pub surgery_date: Option<String>,
    pub proposed_amount: Option<String>,
    pub doctor: Option<String>,
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub appointment_time: Option<String>,
}

impl RevenueRow for LeadRevenueRow {
    fn person_identifier(&self) -> Option<&str> {
        self.contact_staff.as_deref()
    }

    fn date_token(&self) -> Option<Cow<'_, RawValue>> {
        self.surgery_date.as_deref().map(|d| Cow::Owned(RawValue::text(d)))
    }

    fn amount_token(&self) -> Option<Cow<'_, RawValue>> {
        self.proposed_amount.as_deref().map(|a| Cow::Owned(RawValue::text(a)))
    }

    fn customer_name(&self) -> Option<&str> {
        self.customer_name.as_deref()
    }

    fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    fn notes(&self) -> Option<&str> {
        self.doctor.as_deref()
    }
}
