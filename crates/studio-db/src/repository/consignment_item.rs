//! # Consignment Item Repository
//!
//! Variants placed with a gallery under a consignment. Items go with their
//! consignment; a consigned variant cannot be deleted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use studio_core::validation::ConsignmentItemInput;
use studio_core::{ConsignmentItem, ConsignmentItemView, ValidationErrors};

use super::{check_reference, new_id, push_page, push_search, row_exists, Page, PageRequest};
use crate::error::{DbError, DbResult};

const SELECT_ITEM: &str =
    "SELECT id, consignment_id, variant_id, qty, listed_price_cents FROM consignment_items";

const SELECT_VIEW: &str = "SELECT ci.id, ci.consignment_id, ci.variant_id, ci.qty, \
                           ci.listed_price_cents, v.option_label AS variant_label, \
                           p.title AS product_title \
                           FROM consignment_items ci \
                           JOIN product_variants v ON v.id = ci.variant_id \
                           JOIN products p ON p.id = v.product_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsignmentItemFilter {
    pub consignment_id: Option<String>,
    pub variant_id: Option<String>,
    /// Matches consignment id, option label and product title.
    pub search: Option<String>,
    pub page: PageRequest,
}

#[derive(sqlx::FromRow)]
struct ConsignmentItemRow {
    #[sqlx(flatten)]
    item: ConsignmentItem,
    variant_label: String,
    product_title: String,
}

impl From<ConsignmentItemRow> for ConsignmentItemView {
    fn from(row: ConsignmentItemRow) -> Self {
        ConsignmentItemView {
            item: row.item,
            variant_label: row.variant_label,
            product_title: row.product_title,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsignmentItemRepository {
    pool: SqlitePool,
}

impl ConsignmentItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ConsignmentItemRepository { pool }
    }

    pub async fn create(&self, input: &ConsignmentItemInput) -> DbResult<ConsignmentItem> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        let item = insert(&mut tx, input).await?;
        tx.commit().await?;

        Ok(item)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ConsignmentItem>> {
        let item = sqlx::query_as::<_, ConsignmentItem>(&format!("{SELECT_ITEM} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    pub async fn get_view(&self, id: &str) -> DbResult<Option<ConsignmentItemView>> {
        let row = sqlx::query_as::<_, ConsignmentItemRow>(&format!("{SELECT_VIEW} WHERE ci.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ConsignmentItemView::from))
    }

    pub async fn update(&self, id: &str, input: &ConsignmentItemInput) -> DbResult<ConsignmentItem> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        if !row_exists(&mut tx, "consignment_items", id).await? {
            return Err(DbError::not_found("ConsignmentItem", id));
        }
        check_integrity(&mut tx, input).await?;

        let item = build(id.to_string(), input);

        sqlx::query(
            "UPDATE consignment_items SET consignment_id = ?2, variant_id = ?3, qty = ?4, \
             listed_price_cents = ?5 WHERE id = ?1",
        )
        .bind(&item.id)
        .bind(&item.consignment_id)
        .bind(&item.variant_id)
        .bind(item.qty)
        .bind(item.listed_price_cents)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(item)
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM consignment_items WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ConsignmentItem", id));
        }

        Ok(())
    }

    pub async fn list(&self, filter: &ConsignmentItemFilter) -> DbResult<Page<ConsignmentItemView>> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM consignment_items ci \
             JOIN product_variants v ON v.id = ci.variant_id \
             JOIN products p ON p.id = v.product_id WHERE 1 = 1",
        );
        push_filters(&mut count, filter)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_VIEW);
        select.push(" WHERE 1 = 1");
        push_filters(&mut select, filter)?;
        select.push(" ORDER BY p.title, v.option_label, ci.rowid");
        push_page(&mut select, &filter.page);

        let rows = select
            .build_query_as::<ConsignmentItemRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(rows, total, &filter.page).map(ConsignmentItemView::from))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ConsignmentItemFilter) -> DbResult<()> {
    if let Some(consignment_id) = &filter.consignment_id {
        qb.push(" AND ci.consignment_id = ").push_bind(consignment_id.clone());
    }
    if let Some(variant_id) = &filter.variant_id {
        qb.push(" AND ci.variant_id = ").push_bind(variant_id.clone());
    }
    push_search(qb, filter.search.as_deref(), &["ci.consignment_id", "v.option_label", "p.title"])
}

fn build(id: String, input: &ConsignmentItemInput) -> ConsignmentItem {
    ConsignmentItem {
        id,
        consignment_id: input.consignment_id.clone(),
        variant_id: input.variant_id.clone(),
        qty: input.qty,
        listed_price_cents: input.listed_price_cents,
    }
}

async fn check_integrity(conn: &mut SqliteConnection, input: &ConsignmentItemInput) -> DbResult<()> {
    let mut errors = ValidationErrors::new();
    check_reference(conn, &mut errors, "consignment_id", "consignments", &input.consignment_id).await?;
    check_reference(conn, &mut errors, "variant_id", "product_variants", &input.variant_id).await?;
    errors.into_result()?;
    Ok(())
}

pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    input: &ConsignmentItemInput,
) -> DbResult<ConsignmentItem> {
    check_integrity(conn, input).await?;

    let item = build(new_id(), input);

    sqlx::query(
        "INSERT INTO consignment_items (id, consignment_id, variant_id, qty, listed_price_cents) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&item.id)
    .bind(&item.consignment_id)
    .bind(&item.variant_id)
    .bind(item.qty)
    .bind(item.listed_price_cents)
    .execute(&mut *conn)
    .await?;

    Ok(item)
}

/// Item views for a set of consignments, keyed by consignment id.
pub(crate) async fn views_for_consignments(
    pool: &SqlitePool,
    consignment_ids: &[String],
) -> DbResult<HashMap<String, Vec<ConsignmentItemView>>> {
    let mut grouped: HashMap<String, Vec<ConsignmentItemView>> = HashMap::new();
    if consignment_ids.is_empty() {
        return Ok(grouped);
    }

    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_VIEW);
    qb.push(" WHERE ci.consignment_id IN (");
    let mut ids = qb.separated(", ");
    for id in consignment_ids {
        ids.push_bind(id.clone());
    }
    ids.push_unseparated(") ORDER BY ci.rowid");

    let rows = qb
        .build_query_as::<ConsignmentItemRow>()
        .fetch_all(pool)
        .await?;
    for row in rows {
        grouped
            .entry(row.item.consignment_id.clone())
            .or_default()
            .push(ConsignmentItemView::from(row));
    }

    Ok(grouped)
}
