//! # Payment Repository
//!
//! Money received against an order. Payments are removed with their order.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;

use studio_core::validation::{require, PaymentInput};
use studio_core::{Money, Payment, PaymentMethod, ValidationErrors};

use super::{check_reference, new_id, push_page, push_search, Page, PageRequest};
use crate::error::{DbError, DbResult};

const SELECT_PAYMENT: &str = "SELECT id, order_id, method, amount_cents, received_at FROM payments";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentFilter {
    pub order_id: Option<String>,
    pub method: Option<PaymentMethod>,
    /// Matches the order id.
    pub search: Option<String>,
    pub page: PageRequest,
}

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Records a payment. `received_at` defaults to now.
    pub async fn create(&self, input: &PaymentInput) -> DbResult<Payment> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        check_integrity(&mut tx, input).await?;

        let payment = Payment {
            id: new_id(),
            order_id: input.order_id.clone(),
            method: require("method", input.method)?,
            amount_cents: input.amount_cents,
            received_at: input.received_at.unwrap_or_else(Utc::now),
        };

        sqlx::query(
            "INSERT INTO payments (id, order_id, method, amount_cents, received_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(payment.received_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            id = %payment.id,
            order_id = %payment.order_id,
            method = %payment.method,
            amount = %payment.amount(),
            "Recorded payment"
        );
        Ok(payment)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!("{SELECT_PAYMENT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    pub async fn update(&self, id: &str, input: &PaymentInput) -> DbResult<Payment> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, Payment>(&format!("{SELECT_PAYMENT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", id))?;

        check_integrity(&mut tx, input).await?;

        let payment = Payment {
            order_id: input.order_id.clone(),
            method: require("method", input.method)?,
            amount_cents: input.amount_cents,
            received_at: input.received_at.unwrap_or(existing.received_at),
            ..existing
        };

        sqlx::query(
            "UPDATE payments SET order_id = ?2, method = ?3, amount_cents = ?4, received_at = ?5 \
             WHERE id = ?1",
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(payment.received_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(payment)
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM payments WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Payment", id));
        }

        Ok(())
    }

    /// Sum of every payment recorded against an order.
    pub async fn total_for_order(&self, order_id: &str) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM payments WHERE order_id = ?1",
        )
        .bind(order_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(cents))
    }

    /// Lists payments, most recently received first.
    pub async fn list(&self, filter: &PaymentFilter) -> DbResult<Page<Payment>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM payments WHERE 1 = 1");
        push_filters(&mut count, filter)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_PAYMENT);
        select.push(" WHERE 1 = 1");
        push_filters(&mut select, filter)?;
        select.push(" ORDER BY received_at DESC, rowid DESC");
        push_page(&mut select, &filter.page);

        let payments = select.build_query_as::<Payment>().fetch_all(&self.pool).await?;

        Ok(Page::new(payments, total, &filter.page))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PaymentFilter) -> DbResult<()> {
    if let Some(order_id) = &filter.order_id {
        qb.push(" AND order_id = ").push_bind(order_id.clone());
    }
    if let Some(method) = filter.method {
        qb.push(" AND method = ").push_bind(method);
    }
    push_search(qb, filter.search.as_deref(), &["order_id"])
}

async fn check_integrity(conn: &mut SqliteConnection, input: &PaymentInput) -> DbResult<()> {
    let mut errors = ValidationErrors::new();
    check_reference(conn, &mut errors, "order_id", "orders", &input.order_id).await?;
    errors.into_result()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use chrono::{Duration, TimeZone};
    use studio_core::ValidationError;

    fn input(order_id: &str, method: PaymentMethod, amount_cents: i64) -> PaymentInput {
        PaymentInput {
            order_id: order_id.to_string(),
            method: Some(method),
            amount_cents,
            received_at: None,
        }
    }

    #[tokio::test]
    async fn test_method_required_and_order_must_exist() {
        let db = test_db().await;

        let err = db
            .payments()
            .create(&PaymentInput {
                method: None,
                ..input("550e8400-e29b-41d4-a716-446655440000", PaymentMethod::Card, 100)
            })
            .await
            .unwrap_err();
        assert!(err.validation_errors().unwrap().has("method"));

        let err = db
            .payments()
            .create(&input("550e8400-e29b-41d4-a716-446655440000", PaymentMethod::Card, 100))
            .await
            .unwrap_err();
        assert!(matches!(
            err.validation_errors().unwrap().get("order_id"),
            Some(ValidationError::UnknownReference { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first_and_total() {
        let db = test_db().await;
        let sale = order(&db).await;
        let t0 = Utc.with_ymd_and_hms(2025, 4, 10, 10, 0, 0).unwrap();

        for (i, (method, cents)) in [(PaymentMethod::Card, 5000), (PaymentMethod::Cash, 2550)]
            .into_iter()
            .enumerate()
        {
            db.payments()
                .create(&PaymentInput {
                    received_at: Some(t0 + Duration::hours(i as i64)),
                    ..input(&sale.id, method, cents)
                })
                .await
                .unwrap();
        }

        let page = db
            .payments()
            .list(&PaymentFilter {
                order_id: Some(sale.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].method, PaymentMethod::Cash);

        let paid = db.payments().total_for_order(&sale.id).await.unwrap();
        assert_eq!(paid.cents(), 7550);

        let page = db
            .payments()
            .list(&PaymentFilter {
                method: Some(PaymentMethod::Card),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.items[0].amount_cents, 5000);
    }
}
