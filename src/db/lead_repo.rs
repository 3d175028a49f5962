// src/db/lead_repo.rs

use sqlx::PgPool;

use crate::{
    common::error::AppError,
    models::{lead::LeadRevenueRow, revenue::RevenueFilter},
};

// Leitura da tabela de leads. A coluna surgery_date é texto livre; o filtro
// de período é feito aqui por uma chave YYYYMM extraída do texto (sem
// TO_DATE, que derruba a consulta inteira com datas como 31/04/2025).
// A validação completa da data acontece depois, no normalizador.
// day_key (YYYYMMDD) sai dos mesmos componentes e só serve para ordenar.
const FIND_BY_PERIOD_SQL: &str = r#"
WITH leads AS (
    SELECT
        l.*,
        TRIM(l.surgery_date::TEXT) AS raw_date
    FROM "BJH-Server".bjh_all_leads l
    WHERE l.surgery_date IS NOT NULL
),
keyed AS (
    SELECT
        leads.*,
        CASE
            WHEN raw_date ~ '^[0-9]{4}-[0-9]{2}-[0-9]{2}$'
            THEN split_part(raw_date, '-', 1)::INT * 100 + split_part(raw_date, '-', 2)::INT
            WHEN raw_date ~ '^[0-9]{1,2}/[0-9]{1,2}/[0-9]{4}$'
            THEN split_part(raw_date, '/', 3)::INT * 100 + split_part(raw_date, '/', 2)::INT
            WHEN $3 AND raw_date ~ '^[0-9]{1,6}$'
            THEN CASE
                WHEN raw_date::INT BETWEEN 1 AND 100000
                THEN TO_CHAR(DATE '1899-12-30' + raw_date::INT, 'YYYYMM')::INT
            END
        END AS period_key,
        CASE
            WHEN raw_date ~ '^[0-9]{4}-[0-9]{2}-[0-9]{2}$'
            THEN replace(raw_date, '-', '')::INT
            WHEN raw_date ~ '^[0-9]{1,2}/[0-9]{1,2}/[0-9]{4}$'
            THEN split_part(raw_date, '/', 3)::INT * 10000
                + split_part(raw_date, '/', 2)::INT * 100
                + split_part(raw_date, '/', 1)::INT
            WHEN $3 AND raw_date ~ '^[0-9]{1,6}$'
            THEN CASE
                WHEN raw_date::INT BETWEEN 1 AND 100000
                THEN TO_CHAR(DATE '1899-12-30' + raw_date::INT, 'YYYYMMDD')::INT
            END
        END AS day_key
    FROM leads
)
SELECT
    contact_staff::TEXT AS contact_staff,
    raw_date AS surgery_date,
    proposed_amount::TEXT AS proposed_amount,
    doctor::TEXT AS doctor,
    customer_name::TEXT AS customer_name,
    phone::TEXT AS phone,
    appointment_time::TEXT AS appointment_time
FROM keyed
WHERE period_key = $1
  AND ($2::TEXT IS NULL OR TRIM(contact_staff) = $2)
ORDER BY day_key DESC NULLS LAST, raw_date
"#;

#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_period(
        &self,
        filter: &RevenueFilter,
        serial_dates: bool,
    ) -> Result<Vec<LeadRevenueRow>, AppError> {
        let period_key = filter.period.year * 100 + filter.period.month as i32;

        let rows = sqlx::query_as::<_, LeadRevenueRow>(FIND_BY_PERIOD_SQL)
            .bind(period_key)
            .bind(filter.person.as_deref())
            .bind(serial_dates)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
