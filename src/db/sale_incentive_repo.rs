// src/db/sale_incentive_repo.rs

use sqlx::PgPool;

use crate::{
    common::error::AppError,
    models::{revenue::RevenueFilter, sale_incentive::SaleIncentiveRow},
};

// Leitura da tabela `sale_incentive`. Somente leitura: este serviço não é
// dono dos dados.
#[derive(Clone)]
pub struct SaleIncentiveRepository {
    pool: PgPool,
}

impl SaleIncentiveRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_period(&self, filter: &RevenueFilter) -> Result<Vec<SaleIncentiveRow>, AppError> {
        let rows = sqlx::query_as::<_, SaleIncentiveRow>(
            r#"
            SELECT
                sale_person::TEXT AS sale_person,
                TO_CHAR(sale_date, 'YYYY-MM-DD') AS sale_date,
                income::NUMERIC AS income,
                day::INT4 AS day,
                month::INT4 AS month,
                year::INT4 AS year,
                customer_name::TEXT AS customer_name,
                notes::TEXT AS notes
            FROM sale_incentive
            WHERE month = $1
              AND year = $2
              AND ($3::TEXT IS NULL OR TRIM(sale_person) = $3)
            ORDER BY sale_date DESC NULLS LAST, created_at DESC
            "#,
        )
            .bind(filter.period.month as i32)
            .bind(filter.period.year)
            .bind(filter.person.as_deref())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
