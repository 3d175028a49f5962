// src/services/aggregation.rs

use rust_decimal::Decimal;

use crate::{
    common::{amount_normalizer::normalize_amount, date_normalizer::DateNormalizer},
    models::revenue::{ReportPeriod, RevenueMatrix, RevenueRow, UNSPECIFIED_PERSON},
};

#[derive(Debug, Clone, Copy)]
pub struct AggregationOptions {
    /// Registro com data no mês mas valor zero/ilegível ainda conta em `matched`?
    pub count_unpriced_matches: bool,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self { count_unpriced_matches: true }
    }
}

/// Motor único de agregação. Não conhece o formato das linhas: recebe
/// qualquer `RevenueRow` e o normalizador de datas da fonte.
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    options: AggregationOptions,
}

impl AggregationEngine {
    pub fn new(options: AggregationOptions) -> Self {
        Self { options }
    }

    /// Monta a matriz pessoa x dia do mês. Função pura: não altera a entrada,
    /// e a ordem dos registros não muda o resultado.
    pub fn aggregate<R: RevenueRow>(
        &self,
        rows: &[R],
        period: ReportPeriod,
        dates: &DateNormalizer,
    ) -> RevenueMatrix {
        let mut result = RevenueMatrix::empty(period);
        let totals = &mut result.totals;

        for row in rows {
            totals.processed += 1;

            // 1. Data
            let date = match dates.normalize(row.date_token().as_deref()) {
                Ok(date) => date,
                Err(_) => {
                    totals.unparseable_dates += 1;
                    continue;
                }
            };
            if date.year() != period.year || date.month() != period.month {
                totals.out_of_period += 1;
                continue;
            }

            // 2. Valor
            let amount = match normalize_amount(row.amount_token().as_deref()) {
                Ok(amount) if amount > Decimal::ZERO => amount,
                Ok(_) => {
                    totals.zero_amounts += 1;
                    if self.options.count_unpriced_matches {
                        totals.matched += 1;
                    }
                    continue;
                }
                Err(_) => {
                    totals.unparseable_amounts += 1;
                    if self.options.count_unpriced_matches {
                        totals.matched += 1;
                    }
                    continue;
                }
            };

            // 3. Pessoa
            let person = row
                .person_identifier()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .unwrap_or(UNSPECIFIED_PERSON);

            // 4. Acumula. Tudo é conferido antes de gravar: se alguma soma
            // estoura o Decimal, o registro conta como valor ilegível.
            let day = date.day();
            let day_total = result
                .matrix
                .get(person)
                .and_then(|days| days.get(&day))
                .copied()
                .unwrap_or(Decimal::ZERO)
                .checked_add(amount);
            let person_total = result
                .person_totals
                .get(person)
                .copied()
                .unwrap_or(Decimal::ZERO)
                .checked_add(amount);
            let grand_total = totals.total_amount.checked_add(amount);

            let (Some(day_total), Some(person_total), Some(grand_total)) = (day_total, person_total, grand_total)
            else {
                tracing::warn!("⚠️ Valor {} estoura o acumulado de {}, registro ignorado", amount, person);
                totals.unparseable_amounts += 1;
                if self.options.count_unpriced_matches {
                    totals.matched += 1;
                }
                continue;
            };

            totals.matched += 1;
            result.matrix.entry(person.to_string()).or_default().insert(day, day_total);
            result.person_totals.insert(person.to_string(), person_total);
            totals.total_amount = grand_total;
        }

        tracing::info!(
            "💰 Receita {}-{:02}: {} registros processados, {} no período, total {}",
            period.year,
            period.month,
            result.totals.processed,
            result.totals.matched,
            result.totals.total_amount
        );
        tracing::debug!(
            unparseable_dates = result.totals.unparseable_dates,
            out_of_period = result.totals.out_of_period,
            unparseable_amounts = result.totals.unparseable_amounts,
            zero_amounts = result.totals.zero_amounts,
            "diagnóstico da agregação"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::common::date_normalizer::SerialDatePolicy;
    use crate::models::revenue::{RawRevenueRecord, RawValue};

    fn record(person: &str, date: &str, amount: &str) -> RawRevenueRecord {
        RawRevenueRecord {
            person_identifier: person.to_string(),
            date_token: Some(RawValue::text(date)),
            amount_token: Some(RawValue::text(amount)),
            ..Default::default()
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn march_2025() -> ReportPeriod {
        ReportPeriod::new(2025, 3).unwrap()
    }

    fn sample() -> Vec<RawRevenueRecord> {
        vec![
            record("จีน", "2025-03-01", "10,000"),
            record("จีน", "01/03/2025", "2,500.50"),
            record("มุก", "15/03/2025", "฿ 7,000"),
            record("  ", "2025-03-15", "1000"),
            record("มุก", "15/04/2025", "99999"), // fora do mês
            record("เจ", "31/04/2025", "500"),    // data inválida
            record("เจ", "2025-03-20", "0"),      // valor zero
            record("เจ", "2025-03-21", "n/a"),    // valor ilegível
        ]
    }

    #[test]
    fn buckets_by_person_and_day() {
        let engine = AggregationEngine::default();
        let m = engine.aggregate(&sample(), march_2025(), &DateNormalizer::default());

        assert_eq!(m.amount_for("จีน", 1), dec("12500.50"));
        assert_eq!(m.amount_for("มุก", 15), dec("7000"));
        assert_eq!(m.amount_for(UNSPECIFIED_PERSON, 15), dec("1000"));
        assert!(!m.matrix.contains_key("เจ"));
        assert_eq!(m.totals.total_amount, dec("20500.50"));
        assert_eq!(m.person_totals["จีน"], dec("12500.50"));
    }

    #[test]
    fn counters_cover_every_record() {
        let engine = AggregationEngine::default();
        let m = engine.aggregate(&sample(), march_2025(), &DateNormalizer::default());

        assert_eq!(m.totals.processed, 8);
        assert_eq!(m.totals.unparseable_dates, 1);
        assert_eq!(m.totals.out_of_period, 1);
        assert_eq!(m.totals.zero_amounts, 1);
        assert_eq!(m.totals.unparseable_amounts, 1);
        // 4 com valor + 2 sem valor
        assert_eq!(m.totals.matched, 6);
    }

    #[test]
    fn unpriced_matches_can_be_left_out_of_the_counter() {
        let engine = AggregationEngine::new(AggregationOptions { count_unpriced_matches: false });
        let m = engine.aggregate(&sample(), march_2025(), &DateNormalizer::default());

        assert_eq!(m.totals.matched, 4);
        assert_eq!(m.totals.total_amount, dec("20500.50"));
    }

    #[test]
    fn never_includes_records_outside_the_period() {
        let engine = AggregationEngine::default();
        let rows = vec![
            record("a", "2025-03-31", "1"),
            record("a", "2025-04-01", "1"),
            record("a", "2024-03-15", "1"),
            record("a", "28/02/2025", "1"),
        ];
        let m = engine.aggregate(&rows, march_2025(), &DateNormalizer::default());

        assert_eq!(m.matrix["a"].len(), 1);
        assert_eq!(m.amount_for("a", 31), dec("1"));
        assert_eq!(m.totals.out_of_period, 3);
    }

    #[test]
    fn order_of_records_does_not_matter() {
        let engine = AggregationEngine::default();
        let dates = DateNormalizer::default();
        let rows = sample();

        let forward = engine.aggregate(&rows, march_2025(), &dates);
        let mut reversed = rows.clone();
        reversed.reverse();
        let mut rotated = rows.clone();
        rotated.rotate_left(3);

        assert_eq!(forward, engine.aggregate(&reversed, march_2025(), &dates));
        assert_eq!(forward, engine.aggregate(&rotated, march_2025(), &dates));
    }

    #[test]
    fn matrix_sums_match_totals() {
        let engine = AggregationEngine::default();
        let m = engine.aggregate(&sample(), march_2025(), &DateNormalizer::default());

        let mut grand = Decimal::ZERO;
        for (person, days) in &m.matrix {
            let person_sum: Decimal = days.values().copied().sum();
            assert_eq!(person_sum, m.person_totals[person]);
            assert!(days.values().all(|v| *v > Decimal::ZERO));
            grand += person_sum;
        }
        assert_eq!(grand, m.totals.total_amount);
    }

    #[test]
    fn overflowing_amounts_are_skipped_not_fatal() {
        let engine = AggregationEngine::default();
        let mut rows = vec![
            record("จีน", "2025-03-01", "79228162514264337593543950335"),
            record("จีน", "2025-03-01", "1"),
            record("มุก", "2025-03-02", "500"),
        ];
        let m = engine.aggregate(&rows, march_2025(), &DateNormalizer::default());

        // Depois de Decimal::MAX qualquer soma estoura o total geral
        assert_eq!(m.amount_for("จีน", 1), Decimal::MAX);
        assert_eq!(m.person_totals["จีน"], Decimal::MAX);
        assert_eq!(m.totals.total_amount, Decimal::MAX);
        assert!(!m.matrix.contains_key("มุก"));
        assert!(!m.person_totals.contains_key("มุก"));
        assert_eq!(m.totals.unparseable_amounts, 2);
        assert_eq!(m.totals.matched, 3);

        // Em qualquer ordem, os três acumulados continuam batendo
        rows.reverse();
        let m = engine.aggregate(&rows, march_2025(), &DateNormalizer::default());
        let grand: Decimal = m.person_totals.values().copied().sum();
        assert_eq!(grand, m.totals.total_amount);
        assert_eq!(m.totals.unparseable_amounts, 1);
    }

    #[test]
    fn serial_dates_depend_on_the_source_normalizer() {
        let engine = AggregationEngine::default();
        // 45731 = 2025-03-15
        let rows = vec![RawRevenueRecord {
            person_identifier: "มุก".into(),
            date_token: Some(RawValue::Number(45731.into())),
            amount_token: Some(RawValue::Number(3000.into())),
            ..Default::default()
        }];

        let strict = engine.aggregate(&rows, march_2025(), &DateNormalizer::default());
        assert_eq!(strict.totals.unparseable_dates, 1);
        assert!(strict.matrix.is_empty());

        let sheets = DateNormalizer::new(SerialDatePolicy::SpreadsheetEpoch);
        let lenient = engine.aggregate(&rows, march_2025(), &sheets);
        assert_eq!(lenient.amount_for("มุก", 15), dec("3000"));
    }

    #[test]
    fn empty_input_gives_an_empty_matrix() {
        let engine = AggregationEngine::default();
        let rows: Vec<RawRevenueRecord> = Vec::new();
        let m = engine.aggregate(&rows, march_2025(), &DateNormalizer::default());
        assert_eq!(m, RevenueMatrix::empty(march_2025()));
    }
}
