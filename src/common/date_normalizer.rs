// src/common/date_normalizer.rs

use std::fmt;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::error::NormalizeError;
use crate::models::revenue::RawValue;

// Época das planilhas (Google Sheets / Excel): o serial 1 é 1899-12-31
const SPREADSHEET_EPOCH: (i32, u32, u32) = (1899, 12, 30);
// Mesma faixa aceita pela consulta SQL das leads
const MAX_SERIAL_DAY: u64 = 100_000;

// Formatos tentados por último, depois de ISO e DD/MM/YYYY
const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%B %d, %Y", // November 11, 2025
    "%d %B %Y",  // 11 Nov 2025
    "%Y/%m/%d",
    "%a %B %d %Y",
];

const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Data de calendário validada, sem hora, interpretada em UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NormalizedDate(NaiveDate);

impl NormalizedDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Mês 1-12
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }
}

impl fmt::Display for NormalizedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Como tratar inteiros "soltos" (ex.: `44911`).
///
/// Cada fonte escolhe explicitamente: a tabela de leads guarda seriais de
/// planilha, a tabela de incentivos usa uma coluna DATE de verdade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SerialDatePolicy {
    #[default]
    Reject,
    /// Dias desde 1899-12-30
    SpreadsheetEpoch,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateNormalizer {
    serial_dates: SerialDatePolicy,
}

impl DateNormalizer {
    pub fn new(serial_dates: SerialDatePolicy) -> Self {
        Self { serial_dates }
    }

    pub fn serial_dates(&self) -> SerialDatePolicy {
        self.serial_dates
    }

    /// Nunca entra em pânico: token ausente, vazio ou inválido vira `UnparseableDate`.
    pub fn normalize(&self, token: Option<&RawValue>) -> Result<NormalizedDate, NormalizeError> {
        match token {
            None => Err(NormalizeError::UnparseableDate(String::new())),
            Some(RawValue::Text(text)) => self.normalize_str(text),
            Some(RawValue::Number(number)) => self.normalize_number(number),
        }
    }

    pub fn normalize_str(&self, token: &str) -> Result<NormalizedDate, NormalizeError> {
        let clean = token.trim();
        let unparseable = || NormalizeError::UnparseableDate(token.to_string());

        if clean.is_empty() {
            return Err(unparseable());
        }

        // 1. YYYY-MM-DD, literal
        if let Some((year, month, day)) = split_iso(clean) {
            return NormalizedDate::from_ymd(year, month, day).ok_or_else(unparseable);
        }

        // 2. D/M/YYYY ou DD/MM/YYYY: o dia vem primeiro, sempre
        if let Some((day, month, year)) = split_day_first(clean) {
            if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
                return Err(unparseable());
            }
            // from_ymd_opt recusa 31/04 em vez de empurrar para 01/05
            return NormalizedDate::from_ymd(year, month, day).ok_or_else(unparseable);
        }

        // Inteiros soltos só passam se a fonte declarar seriais de planilha
        if clean.bytes().all(|b| b.is_ascii_digit()) {
            return clean
                .parse::<u64>()
                .ok()
                .and_then(|serial| self.from_serial(serial))
                .ok_or_else(unparseable);
        }

        // 3. Fallback genérico
        parse_fallback(clean).ok_or_else(unparseable)
    }

    fn normalize_number(&self, number: &serde_json::Number) -> Result<NormalizedDate, NormalizeError> {
        let unparseable = || NormalizeError::UnparseableDate(number.to_string());

        if let Some(serial) = number.as_u64() {
            return self.from_serial(serial).ok_or_else(unparseable);
        }

        // Serial com fração de dia (data + hora na planilha)
        match number.as_f64() {
            Some(value) if value.is_finite() && value >= 1.0 => {
                self.from_serial(value.floor() as u64).ok_or_else(unparseable)
            }
            _ => Err(unparseable()),
        }
    }

    fn from_serial(&self, serial: u64) -> Option<NormalizedDate> {
        if self.serial_dates != SerialDatePolicy::SpreadsheetEpoch {
            return None;
        }
        if !(1..=MAX_SERIAL_DAY).contains(&serial) {
            return None;
        }
        let (y, m, d) = SPREADSHEET_EPOCH;
        NaiveDate::from_ymd_opt(y, m, d)?
            .checked_add_days(Days::new(serial))
            .map(NormalizedDate)
    }
}

// YYYY-MM-DD com exatamente 4-2-2 dígitos
fn split_iso(s: &str) -> Option<(i32, u32, u32)> {
    let bytes = s.as_bytes();
    if !s.is_ascii() || bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits = |range: std::ops::Range<usize>| {
        let part = &s[range];
        part.bytes().all(|b| b.is_ascii_digit()).then_some(part)
    };
    let year = digits(0..4)?.parse().ok()?;
    let month = digits(5..7)?.parse().ok()?;
    let day = digits(8..10)?.parse().ok()?;
    Some((year, month, day))
}

// D/M/YYYY: 1-2 dígitos, 1-2 dígitos, 4 dígitos
fn split_day_first(s: &str) -> Option<(u32, u32, i32)> {
    let mut parts = s.split('/');
    let (first, second, third) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let numeric = |part: &str, min: usize, max: usize| {
        (min..=max).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
    };
    if !numeric(first, 1, 2) || !numeric(second, 1, 2) || !numeric(third, 4, 4) {
        return None;
    }

    Some((first.parse().ok()?, second.parse().ok()?, third.parse().ok()?))
}

fn parse_fallback(s: &str) -> Option<NormalizedDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(NormalizedDate(dt.with_timezone(&Utc).date_naive()));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(NormalizedDate(dt.with_timezone(&Utc).date_naive()));
    }

    FALLBACK_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            FALLBACK_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        })
        .map(NormalizedDate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict() -> DateNormalizer {
        DateNormalizer::new(SerialDatePolicy::Reject)
    }

    fn sheets() -> DateNormalizer {
        DateNormalizer::new(SerialDatePolicy::SpreadsheetEpoch)
    }

    fn ymd(date: NormalizedDate) -> (i32, u32, u32) {
        (date.year(), date.month(), date.day())
    }

    #[test]
    fn iso_tokens_keep_their_literal_components() {
        for (token, expected) in [
            ("2025-11-11", (2025, 11, 11)),
            ("2025-01-15", (2025, 1, 15)),
            ("2024-02-29", (2024, 2, 29)),
            ("1999-12-31", (1999, 12, 31)),
        ] {
            assert_eq!(ymd(strict().normalize_str(token).unwrap()), expected, "{token}");
        }
    }

    #[test]
    fn iso_tokens_must_be_real_days() {
        assert!(strict().normalize_str("2025-02-29").is_err());
        assert!(strict().normalize_str("2025-13-01").is_err());
        assert!(strict().normalize_str("2025-04-31").is_err());
    }

    #[test]
    fn slash_tokens_are_day_first() {
        assert_eq!(ymd(strict().normalize_str("11/03/2025").unwrap()), (2025, 3, 11));
        assert_eq!(ymd(strict().normalize_str("1/11/2025").unwrap()), (2025, 11, 1));
        assert_eq!(ymd(strict().normalize_str("31/12/2025").unwrap()), (2025, 12, 31));
        // 13/01 só faz sentido como dia 13
        assert_eq!(ymd(strict().normalize_str("13/01/2025").unwrap()), (2025, 1, 13));
    }

    #[test]
    fn slash_tokens_are_never_clamped_or_swapped() {
        assert!(strict().normalize_str("31/04/2025").is_err());
        assert!(strict().normalize_str("29/02/2025").is_err());
        // Mês 13 não é reinterpretado como MM/DD
        assert!(strict().normalize_str("01/13/2025").is_err());
        assert!(strict().normalize_str("0/1/2025").is_err());
    }

    #[test]
    fn empty_and_missing_tokens_are_unparseable() {
        assert!(strict().normalize(None).is_err());
        assert!(strict().normalize(Some(&RawValue::text(""))).is_err());
        assert!(strict().normalize(Some(&RawValue::text("   "))).is_err());
        assert!(strict().normalize_str("invalid").is_err());
    }

    #[test]
    fn serial_dates_follow_the_source_policy() {
        // 45241 = 2023-11-11 na época das planilhas
        assert_eq!(ymd(sheets().normalize_str("45241").unwrap()), (2023, 11, 11));
        assert_eq!(
            ymd(sheets().normalize(Some(&RawValue::Number(45241.into()))).unwrap()),
            (2023, 11, 11)
        );
        assert_eq!(ymd(sheets().normalize_str("1").unwrap()), (1899, 12, 31));

        assert!(strict().normalize_str("45241").is_err());
        assert!(strict().normalize(Some(&RawValue::Number(45241.into()))).is_err());
    }

    #[test]
    fn serial_dates_outside_the_sql_range_are_rejected() {
        assert!(sheets().normalize_str("0").is_err());
        assert!(sheets().normalize_str("100001").is_err());
    }

    #[test]
    fn fractional_serials_drop_the_time_of_day() {
        let number = serde_json::Number::from_f64(45241.75).unwrap();
        assert_eq!(ymd(sheets().normalize(Some(&RawValue::Number(number))).unwrap()), (2023, 11, 11));
    }

    #[test]
    fn fallback_accepts_common_text_forms() {
        assert_eq!(ymd(strict().normalize_str("November 11, 2025").unwrap()), (2025, 11, 11));
        assert_eq!(ymd(strict().normalize_str("11 Nov 2025").unwrap()), (2025, 11, 11));
        assert_eq!(ymd(strict().normalize_str("2025-11-11T23:30:00Z").unwrap()), (2025, 11, 11));
        // Convertido para UTC antes de descartar a hora
        assert_eq!(ymd(strict().normalize_str("2025-11-12T02:00:00+07:00").unwrap()), (2025, 11, 11));
    }

    #[test]
    fn display_is_iso() {
        assert_eq!(strict().normalize_str("5/3/2025").unwrap().to_string(), "2025-03-05");
    }
}
