//! # Order Item Repository
//!
//! Lines of an order. Items go with their order; a variant that appears on
//! an item cannot be deleted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use studio_core::validation::OrderItemInput;
use studio_core::{OrderItem, OrderItemView, ValidationErrors};

use super::{check_reference, new_id, push_page, push_search, row_exists, Page, PageRequest};
use crate::error::{DbError, DbResult};

const SELECT_ITEM: &str = "SELECT id, order_id, variant_id, qty, unit_price_cents FROM order_items";

const SELECT_VIEW: &str = "SELECT oi.id, oi.order_id, oi.variant_id, oi.qty, oi.unit_price_cents, \
                           v.option_label AS variant_label, p.title AS product_title \
                           FROM order_items oi \
                           JOIN product_variants v ON v.id = oi.variant_id \
                           JOIN products p ON p.id = v.product_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderItemFilter {
    pub order_id: Option<String>,
    pub variant_id: Option<String>,
    /// Matches order id, option label and product title.
    pub search: Option<String>,
    pub page: PageRequest,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    #[sqlx(flatten)]
    item: OrderItem,
    variant_label: String,
    product_title: String,
}

impl From<OrderItemRow> for OrderItemView {
    fn from(row: OrderItemRow) -> Self {
        OrderItemView {
            item: row.item,
            variant_label: row.variant_label,
            product_title: row.product_title,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderItemRepository {
    pool: SqlitePool,
}

impl OrderItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderItemRepository { pool }
    }

    pub async fn create(&self, input: &OrderItemInput) -> DbResult<OrderItem> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        let item = insert(&mut tx, input).await?;
        tx.commit().await?;

        Ok(item)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<OrderItem>> {
        let item = sqlx::query_as::<_, OrderItem>(&format!("{SELECT_ITEM} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    pub async fn get_view(&self, id: &str) -> DbResult<Option<OrderItemView>> {
        let row = sqlx::query_as::<_, OrderItemRow>(&format!("{SELECT_VIEW} WHERE oi.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(OrderItemView::from))
    }

    pub async fn update(&self, id: &str, input: &OrderItemInput) -> DbResult<OrderItem> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        if !row_exists(&mut tx, "order_items", id).await? {
            return Err(DbError::not_found("OrderItem", id));
        }
        check_integrity(&mut tx, input).await?;

        let item = build(id.to_string(), input);

        sqlx::query(
            "UPDATE order_items SET order_id = ?2, variant_id = ?3, qty = ?4, unit_price_cents = ?5 \
             WHERE id = ?1",
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.variant_id)
        .bind(item.qty)
        .bind(item.unit_price_cents)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(item)
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM order_items WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("OrderItem", id));
        }

        Ok(())
    }

    pub async fn list(&self, filter: &OrderItemFilter) -> DbResult<Page<OrderItemView>> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM order_items oi \
             JOIN product_variants v ON v.id = oi.variant_id \
             JOIN products p ON p.id = v.product_id WHERE 1 = 1",
        );
        push_filters(&mut count, filter)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_VIEW);
        select.push(" WHERE 1 = 1");
        push_filters(&mut select, filter)?;
        select.push(" ORDER BY oi.order_id, oi.rowid");
        push_page(&mut select, &filter.page);

        let rows = select.build_query_as::<OrderItemRow>().fetch_all(&self.pool).await?;

        Ok(Page::new(rows, total, &filter.page).map(OrderItemView::from))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &OrderItemFilter) -> DbResult<()> {
    if let Some(order_id) = &filter.order_id {
        qb.push(" AND oi.order_id = ").push_bind(order_id.clone());
    }
    if let Some(variant_id) = &filter.variant_id {
        qb.push(" AND oi.variant_id = ").push_bind(variant_id.clone());
    }
    push_search(
        qb,
        filter.search.as_deref(),
        &["oi.order_id", "v.option_label", "p.title"],
    )
}

fn build(id: String, input: &OrderItemInput) -> OrderItem {
    OrderItem {
        id,
        order_id: input.order_id.clone(),
        variant_id: input.variant_id.clone(),
        qty: input.qty,
        unit_price_cents: input.unit_price_cents,
    }
}

async fn check_integrity(conn: &mut SqliteConnection, input: &OrderItemInput) -> DbResult<()> {
    let mut errors = ValidationErrors::new();
    check_reference(conn, &mut errors, "order_id", "orders", &input.order_id).await?;
    check_reference(conn, &mut errors, "variant_id", "product_variants", &input.variant_id).await?;
    errors.into_result()?;
    Ok(())
}

pub(crate) async fn insert(conn: &mut SqliteConnection, input: &OrderItemInput) -> DbResult<OrderItem> {
    check_integrity(conn, input).await?;

    let item = build(new_id(), input);

    sqlx::query(
        "INSERT INTO order_items (id, order_id, variant_id, qty, unit_price_cents) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.variant_id)
    .bind(item.qty)
    .bind(item.unit_price_cents)
    .execute(&mut *conn)
    .await?;

    Ok(item)
}

/// Item views for a set of orders, keyed by order id, in insertion order.
pub(crate) async fn views_for_orders(
    pool: &SqlitePool,
    order_ids: &[String],
) -> DbResult<HashMap<String, Vec<OrderItemView>>> {
    let mut grouped: HashMap<String, Vec<OrderItemView>> = HashMap::new();
    if order_ids.is_empty() {
        return Ok(grouped);
    }

    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_VIEW);
    qb.push(" WHERE oi.order_id IN (");
    let mut ids = qb.separated(", ");
    for id in order_ids {
        ids.push_bind(id.clone());
    }
    ids.push_unseparated(") ORDER BY oi.rowid");

    let rows = qb.build_query_as::<OrderItemRow>().fetch_all(pool).await?;
    for row in rows {
        grouped
            .entry(row.item.order_id.clone())
            .or_default()
            .push(OrderItemView::from(row));
    }

    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use studio_core::ValidationError;

    #[tokio::test]
    async fn test_create_checks_references_and_quantity() {
        let db = test_db().await;
        let sale = order(&db).await;

        let err = db
            .order_items()
            .create(&OrderItemInput {
                order_id: sale.id.clone(),
                variant_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
                qty: 1,
                unit_price_cents: 4500,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.validation_errors().unwrap().get("variant_id"),
            Some(ValidationError::UnknownReference { .. })
        ));

        let err = db
            .order_items()
            .create(&OrderItemInput {
                order_id: sale.id.clone(),
                variant_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
                qty: 0,
                unit_price_cents: 4500,
            })
            .await
            .unwrap_err();
        assert!(err.validation_errors().unwrap().has("qty"));
    }

    #[tokio::test]
    async fn test_view_and_order_cascade() {
        let db = test_db().await;
        let harbor = product(&db, "Harbor").await;
        let a4 = variant(&db, &harbor.id, "A4").await;
        let sale = order(&db).await;

        let item = db
            .order_items()
            .create(&OrderItemInput {
                order_id: sale.id.clone(),
                variant_id: a4.id.clone(),
                qty: 2,
                unit_price_cents: 4500,
            })
            .await
            .unwrap();

        let view = db.order_items().get_view(&item.id).await.unwrap().unwrap();
        assert_eq!(view.variant_label, "A4");
        assert_eq!(view.product_title, "Harbor");

        let page = db
            .order_items()
            .list(&OrderItemFilter {
                search: Some("harb".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        db.orders().delete(&sale.id).await.unwrap();
        assert!(db.order_items().get_by_id(&item.id).await.unwrap().is_none());

        // the variant is free to go once no item references it
        db.variants().delete(&a4.id).await.unwrap();
    }
}
