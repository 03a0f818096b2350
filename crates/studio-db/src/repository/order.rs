//! # Order Repository
//!
//! Orders with their lines and payments.
//!
//! ## Delete Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DELETE order                                                          │
//! │    ├── order_items      CASCADE                                        │
//! │    └── payments         CASCADE                                        │
//! │                                                                         │
//! │  DELETE buyer contact → orders.buyer_contact_id SET NULL               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Money columns are stored as given. Nothing here recomputes totals from
//! the lines or moves `edition_sold`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use studio_core::validation::{OrderInput, OrderItemInput};
use studio_core::{Order, OrderChannel, OrderStatus, OrderView, ValidationErrors};

use super::order_item::{self, views_for_orders};
use super::{check_reference, nested, new_id, push_page, push_search, Page, PageRequest, SortDirection};
use crate::error::{DbError, DbResult};

const SELECT_ORDER: &str = "SELECT id, buyer_contact_id, channel, status, subtotal_cents, \
                            tax_cents, shipping_cents, total_cents, created_at, paid_at FROM orders";

const SELECT_VIEW: &str = "SELECT o.id, o.buyer_contact_id, o.channel, o.status, \
                           o.subtotal_cents, o.tax_cents, o.shipping_cents, o.total_cents, \
                           o.created_at, o.paid_at, c.name AS buyer_name \
                           FROM orders o LEFT JOIN contacts c ON c.id = o.buyer_contact_id";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSort {
    #[default]
    CreatedAt,
    TotalCents,
}

impl OrderSort {
    fn column(&self) -> &'static str {
        match self {
            OrderSort::CreatedAt => "o.created_at",
            OrderSort::TotalCents => "o.total_cents",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub channel: Option<OrderChannel>,
    pub buyer_contact_id: Option<String>,
    /// Matches order id and buyer name.
    pub search: Option<String>,
    pub sort: OrderSort,
    /// Newest / largest first when not given.
    pub direction: Option<SortDirection>,
    pub page: PageRequest,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    #[sqlx(flatten)]
    order: Order,
    buyer_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Creates an order with no lines.
    pub async fn create(&self, input: &OrderInput) -> DbResult<Order> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        let order = insert(&mut tx, input).await?;
        tx.commit().await?;

        debug!(id = %order.id, status = %order.status, "Created order");
        Ok(order)
    }

    /// Creates an order and its lines in one transaction.
    ///
    /// Each line's `order_id` is replaced with the new order's id. Line
    /// errors are keyed `items[i].field`; any failure leaves nothing behind.
    pub async fn create_with_items(
        &self,
        input: &OrderInput,
        items: &[OrderItemInput],
    ) -> DbResult<OrderView> {
        let order_id = new_id();
        let items: Vec<OrderItemInput> = items
            .iter()
            .map(|item| OrderItemInput {
                order_id: order_id.clone(),
                ..item.clone()
            })
            .collect();

        let mut errors = ValidationErrors::new();
        if let Err(report) = input.validate() {
            errors.extend(report);
        }
        for (i, item) in items.iter().enumerate() {
            if let Err(report) = item.validate() {
                errors.extend(report.prefixed(&format!("items[{i}]")));
            }
        }
        errors.into_result()?;

        let mut tx = self.pool.begin().await?;

        let order = insert_with_id(&mut tx, order_id, input).await?;
        for (i, item) in items.iter().enumerate() {
            order_item::insert(&mut tx, item)
                .await
                .map_err(|e| nested(e, &format!("items[{i}]")))?;
        }

        tx.commit().await?;

        info!(id = %order.id, items = items.len(), total_cents = order.total_cents, "Created order with items");

        self.get_view(&order.id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order.id))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!("{SELECT_ORDER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Gets an order with buyer name and lines.
    pub async fn get_view(&self, id: &str) -> DbResult<Option<OrderView>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_VIEW} WHERE o.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let mut items = views_for_orders(&self.pool, &[row.order.id.clone()]).await?;
        let items = items.remove(&row.order.id).unwrap_or_default();

        Ok(Some(OrderView {
            order: row.order,
            buyer_name: row.buyer_name,
            items,
        }))
    }

    /// Rewrites an order. Omitted channel, status, amounts and `created_at`
    /// keep their stored values; buyer and `paid_at` are taken as given.
    pub async fn update(&self, id: &str, input: &OrderInput) -> DbResult<Order> {
        debug!(id = %id, "Updating order");

        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, Order>(&format!("{SELECT_ORDER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;

        check_integrity(&mut tx, input).await?;

        let order = Order {
            buyer_contact_id: input.buyer_contact_id().map(str::to_string),
            channel: input.channel.unwrap_or(existing.channel),
            status: input.status.unwrap_or(existing.status),
            subtotal_cents: input.subtotal_cents.unwrap_or(existing.subtotal_cents),
            tax_cents: input.tax_cents.unwrap_or(existing.tax_cents),
            shipping_cents: input.shipping_cents.unwrap_or(existing.shipping_cents),
            total_cents: input.total_cents.unwrap_or(existing.total_cents),
            created_at: input.created_at.unwrap_or(existing.created_at),
            paid_at: input.paid_at,
            ..existing
        };

        sqlx::query(
            r#"
            UPDATE orders SET
                buyer_contact_id = ?2,
                channel = ?3,
                status = ?4,
                subtotal_cents = ?5,
                tax_cents = ?6,
                shipping_cents = ?7,
                total_cents = ?8,
                created_at = ?9,
                paid_at = ?10
            WHERE id = ?1
            "#,
        )
        .bind(&order.id)
        .bind(&order.buyer_contact_id)
        .bind(order.channel)
        .bind(order.status)
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.shipping_cents)
        .bind(order.total_cents)
        .bind(order.created_at)
        .bind(order.paid_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(order)
    }

    /// Deletes an order with its lines and payments.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting order");

        let result = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }

        Ok(())
    }

    /// Lists orders with lines, newest first unless told otherwise.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Page<OrderView>> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM orders o LEFT JOIN contacts c ON c.id = o.buyer_contact_id \
             WHERE 1 = 1",
        );
        push_filters(&mut count, filter)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let direction = filter.direction.unwrap_or(SortDirection::Desc);

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_VIEW);
        select.push(" WHERE 1 = 1");
        push_filters(&mut select, filter)?;
        select.push(format!(
            " ORDER BY {} {dir}, o.rowid {dir}",
            filter.sort.column(),
            dir = direction.sql()
        ));
        push_page(&mut select, &filter.page);

        let rows = select.build_query_as::<OrderRow>().fetch_all(&self.pool).await?;

        let ids: Vec<String> = rows.iter().map(|r| r.order.id.clone()).collect();
        let mut items = views_for_orders(&self.pool, &ids).await?;

        Ok(Page::new(rows, total, &filter.page).map(|row| {
            let lines = items.remove(&row.order.id).unwrap_or_default();
            OrderView {
                order: row.order,
                buyer_name: row.buyer_name,
                items: lines,
            }
        }))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &OrderFilter) -> DbResult<()> {
    if let Some(status) = filter.status {
        qb.push(" AND o.status = ").push_bind(status);
    }
    if let Some(channel) = filter.channel {
        qb.push(" AND o.channel = ").push_bind(channel);
    }
    if let Some(buyer) = &filter.buyer_contact_id {
        qb.push(" AND o.buyer_contact_id = ").push_bind(buyer.clone());
    }
    push_search(qb, filter.search.as_deref(), &["o.id", "c.name"])
}

async fn check_integrity(conn: &mut SqliteConnection, input: &OrderInput) -> DbResult<()> {
    let mut errors = ValidationErrors::new();
    if let Some(buyer) = input.buyer_contact_id() {
        check_reference(conn, &mut errors, "buyer_contact_id", "contacts", buyer).await?;
    }
    errors.into_result()?;
    Ok(())
}

async fn insert(conn: &mut SqliteConnection, input: &OrderInput) -> DbResult<Order> {
    insert_with_id(conn, new_id(), input).await
}

async fn insert_with_id(conn: &mut SqliteConnection, id: String, input: &OrderInput) -> DbResult<Order> {
    check_integrity(conn, input).await?;

    let order = Order {
        id,
        buyer_contact_id: input.buyer_contact_id().map(str::to_string),
        channel: input.channel.unwrap_or_default(),
        status: input.status.unwrap_or_default(),
        subtotal_cents: input.subtotal_cents.unwrap_or(0),
        tax_cents: input.tax_cents.unwrap_or(0),
        shipping_cents: input.shipping_cents.unwrap_or(0),
        total_cents: input.total_cents.unwrap_or(0),
        created_at: input.created_at.unwrap_or_else(Utc::now),
        paid_at: input.paid_at,
    };

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, buyer_contact_id, channel, status, subtotal_cents,
            tax_cents, shipping_cents, total_cents, created_at, paid_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&order.id)
    .bind(&order.buyer_contact_id)
    .bind(order.channel)
    .bind(order.status)
    .bind(order.subtotal_cents)
    .bind(order.tax_cents)
    .bind(order.shipping_cents)
    .bind(order.total_cents)
    .bind(order.created_at)
    .bind(order.paid_at)
    .execute(&mut *conn)
    .await?;

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use chrono::{Duration, TimeZone};
    use studio_core::validation::PaymentInput;
    use studio_core::{ContactKind, PaymentMethod, ValidationError};

    fn line(variant_id: &str, qty: i64) -> OrderItemInput {
        OrderItemInput {
            variant_id: variant_id.to_string(),
            qty,
            unit_price_cents: 12500,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let db = test_db().await;
        let sale = order(&db).await;

        assert_eq!(sale.channel, OrderChannel::Online);
        assert_eq!(sale.status, OrderStatus::Pending);
        assert_eq!(sale.total_cents, 0);
        assert_eq!(sale.buyer_contact_id, None);
    }

    #[tokio::test]
    async fn test_unknown_buyer_rejected() {
        let db = test_db().await;

        let err = db
            .orders()
            .create(&OrderInput {
                buyer_contact_id: Some("550e8400-e29b-41d4-a716-446655440000".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.validation_errors().unwrap().get("buyer_contact_id"),
            Some(ValidationError::UnknownReference { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_with_items_builds_view() {
        let db = test_db().await;
        let ada = contact(&db, ContactKind::Collector, "Ada").await;
        let harbor = product(&db, "Harbor").await;
        let a4 = variant(&db, &harbor.id, "A4").await;
        let a3 = variant(&db, &harbor.id, "A3").await;

        let view = db
            .orders()
            .create_with_items(
                &OrderInput {
                    buyer_contact_id: Some(ada.id.clone()),
                    channel: Some(OrderChannel::InPerson),
                    total_cents: Some(37500),
                    ..Default::default()
                },
                &[line(&a4.id, 1), line(&a3.id, 2)],
            )
            .await
            .unwrap();

        assert_eq!(view.buyer_name.as_deref(), Some("Ada"));
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.items[0].variant_label, "A4");
        assert_eq!(view.order.total().to_string(), "$375.00");
    }

    #[tokio::test]
    async fn test_create_with_items_is_atomic() {
        let db = test_db().await;
        let harbor = product(&db, "Harbor").await;
        let a4 = variant(&db, &harbor.id, "A4").await;

        let err = db
            .orders()
            .create_with_items(
                &OrderInput::default(),
                &[line(&a4.id, 1), line("550e8400-e29b-41d4-a716-446655440000", 1)],
            )
            .await
            .unwrap_err();
        assert!(err.validation_errors().unwrap().has("items[1].variant_id"));

        let page = db.orders().list(&OrderFilter::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_delete_cascades_items_and_payments() {
        let db = test_db().await;
        let harbor = product(&db, "Harbor").await;
        let a4 = variant(&db, &harbor.id, "A4").await;
        let view = db
            .orders()
            .create_with_items(&OrderInput::default(), &[line(&a4.id, 1)])
            .await
            .unwrap();
        let paid = db
            .payments()
            .create(&PaymentInput {
                order_id: view.order.id.clone(),
                method: Some(PaymentMethod::Cash),
                amount_cents: 12500,
                received_at: None,
            })
            .await
            .unwrap();

        // the ordered variant is protected until the order goes
        assert!(matches!(
            db.variants().delete(&a4.id).await,
            Err(DbError::Conflict { .. })
        ));

        db.orders().delete(&view.order.id).await.unwrap();
        assert!(db.payments().get_by_id(&paid.id).await.unwrap().is_none());
        assert!(db.order_items().get_by_id(&view.items[0].item.id).await.unwrap().is_none());
        db.variants().delete(&a4.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_keeps_omitted_fields() {
        let db = test_db().await;
        let sale = db
            .orders()
            .create(&OrderInput {
                total_cents: Some(9900),
                channel: Some(OrderChannel::Consignment),
                ..Default::default()
            })
            .await
            .unwrap();

        let paid_at = Utc.with_ymd_and_hms(2025, 6, 2, 15, 30, 0).unwrap();
        let updated = db
            .orders()
            .update(
                &sale.id,
                &OrderInput {
                    status: Some(OrderStatus::Paid),
                    paid_at: Some(paid_at),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Paid);
        assert_eq!(updated.channel, OrderChannel::Consignment);
        assert_eq!(updated.total_cents, 9900);
        assert_eq!(updated.paid_at, Some(paid_at));
        assert_eq!(updated.created_at, sale.created_at);
    }

    #[tokio::test]
    async fn test_list_newest_first_and_filters() {
        let db = test_db().await;
        let ada = contact(&db, ContactKind::Collector, "Ada Lovelace").await;
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();

        for (i, total) in [1000, 5000, 3000].into_iter().enumerate() {
            db.orders()
                .create(&OrderInput {
                    buyer_contact_id: (i == 1).then(|| ada.id.clone()),
                    total_cents: Some(total),
                    status: Some(if i == 2 { OrderStatus::Paid } else { OrderStatus::Pending }),
                    created_at: Some(t0 + Duration::days(i as i64)),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let page = db.orders().list(&OrderFilter::default()).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items[0].order.total_cents, 3000);

        let page = db
            .orders()
            .list(&OrderFilter {
                sort: OrderSort::TotalCents,
                direction: Some(SortDirection::Asc),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.items[0].order.total_cents, 1000);

        let page = db
            .orders()
            .list(&OrderFilter {
                search: Some("lovelace".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].order.total_cents, 5000);

        let page = db
            .orders()
            .list(&OrderFilter {
                status: Some(OrderStatus::Paid),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }
}
