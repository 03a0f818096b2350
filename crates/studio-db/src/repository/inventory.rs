//! # Inventory Repository
//!
//! On-hand counts per variant and location. There is at most one row per
//! (variant, location) pair; both sides cascade on delete.
//!
//! ## Stock Entry
//! ```text
//! create()            one new pair, Duplicate when the pair exists
//! update()            rewrite an existing row
//! set_for_variant()   upsert every location of one variant in one tx
//! ```

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use studio_core::validation::InventoryInput;
use studio_core::{InventoryByLocation, InventoryView, ValidationError, ValidationErrors};

use super::{check_reference, new_id, push_page, push_search, row_exists, Page, PageRequest};
use crate::error::{DbError, DbResult};

const SELECT_ROW: &str = "SELECT id, variant_id, location_id, on_hand FROM inventory_by_location";

const SELECT_VIEW: &str = "SELECT i.id, i.variant_id, i.location_id, i.on_hand, \
                           p.title AS product, v.option_label AS variant_label, \
                           l.name AS location_name \
                           FROM inventory_by_location i \
                           JOIN product_variants v ON v.id = i.variant_id \
                           JOIN products p ON p.id = v.product_id \
                           JOIN locations l ON l.id = i.location_id";

const FROM_VIEW: &str = "FROM inventory_by_location i \
                         JOIN product_variants v ON v.id = i.variant_id \
                         JOIN products p ON p.id = v.product_id \
                         JOIN locations l ON l.id = i.location_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryFilter {
    pub variant_id: Option<String>,
    pub location_id: Option<String>,
    /// Matches option label, product title and location name.
    pub search: Option<String>,
    pub page: PageRequest,
}

#[derive(sqlx::FromRow)]
struct InventoryRow {
    #[sqlx(flatten)]
    row: InventoryByLocation,
    product: String,
    variant_label: String,
    location_name: String,
}

impl From<InventoryRow> for InventoryView {
    fn from(r: InventoryRow) -> Self {
        InventoryView {
            row: r.row,
            product: r.product,
            variant_label: r.variant_label,
            location_name: r.location_name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Creates the row for a new (variant, location) pair. `on_hand`
    /// defaults to zero.
    pub async fn create(&self, input: &InventoryInput) -> DbResult<InventoryByLocation> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        check_integrity(&mut tx, input, None).await?;

        let row = InventoryByLocation {
            id: new_id(),
            variant_id: input.variant_id.clone(),
            location_id: input.location_id.clone(),
            on_hand: input.on_hand.unwrap_or(0),
        };

        sqlx::query(
            "INSERT INTO inventory_by_location (id, variant_id, location_id, on_hand) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&row.id)
        .bind(&row.variant_id)
        .bind(&row.location_id)
        .bind(row.on_hand)
        .execute(&mut *tx)
        .await
        .map_err(|e| pair_conflict(e.into(), &row.location_id))?;

        tx.commit().await?;

        Ok(row)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InventoryByLocation>> {
        let row = sqlx::query_as::<_, InventoryByLocation>(&format!("{SELECT_ROW} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    pub async fn get_view(&self, id: &str) -> DbResult<Option<InventoryView>> {
        let row = sqlx::query_as::<_, InventoryRow>(&format!("{SELECT_VIEW} WHERE i.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(InventoryView::from))
    }

    pub async fn update(&self, id: &str, input: &InventoryInput) -> DbResult<InventoryByLocation> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, InventoryByLocation>(&format!("{SELECT_ROW} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("InventoryByLocation", id))?;

        check_integrity(&mut tx, input, Some(id)).await?;

        let row = InventoryByLocation {
            variant_id: input.variant_id.clone(),
            location_id: input.location_id.clone(),
            on_hand: input.on_hand.unwrap_or(existing.on_hand),
            ..existing
        };

        sqlx::query(
            "UPDATE inventory_by_location SET variant_id = ?2, location_id = ?3, on_hand = ?4 \
             WHERE id = ?1",
        )
        .bind(&row.id)
        .bind(&row.variant_id)
        .bind(&row.location_id)
        .bind(row.on_hand)
        .execute(&mut *tx)
        .await
        .map_err(|e| pair_conflict(e.into(), &row.location_id))?;

        tx.commit().await?;

        Ok(row)
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM inventory_by_location WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InventoryByLocation", id));
        }

        Ok(())
    }

    /// Sets on-hand counts for one variant across several locations.
    ///
    /// Each entry inserts its pair or overwrites the existing count. The
    /// `variant_id` of every entry is replaced with `variant_id`. Nothing is
    /// written unless every entry is valid; errors are keyed
    /// `inventory[i].field`. Pairs not mentioned are left alone.
    pub async fn set_for_variant(
        &self,
        variant_id: &str,
        entries: &[InventoryInput],
    ) -> DbResult<Vec<InventoryByLocation>> {
        let entries: Vec<InventoryInput> = entries
            .iter()
            .map(|e| InventoryInput {
                variant_id: variant_id.to_string(),
                ..e.clone()
            })
            .collect();

        let mut report = ValidationErrors::new();
        for (i, entry) in entries.iter().enumerate() {
            if let Err(errors) = entry.validate() {
                report.extend(errors.prefixed(&format!("inventory[{i}]")));
            }
        }
        report.into_result()?;

        let mut tx = self.pool.begin().await?;

        if !row_exists(&mut tx, "product_variants", variant_id).await? {
            return Err(DbError::not_found("ProductVariant", variant_id));
        }

        let mut report = ValidationErrors::new();
        for (i, entry) in entries.iter().enumerate() {
            let mut errors = ValidationErrors::new();
            check_reference(&mut tx, &mut errors, "location_id", "locations", &entry.location_id).await?;
            if entries[..i].iter().any(|e| e.location_id == entry.location_id) {
                errors.push(ValidationError::Duplicate {
                    field: "location_id".to_string(),
                    value: entry.location_id.clone(),
                });
            }
            report.extend(errors.prefixed(&format!("inventory[{i}]")));
        }
        report.into_result()?;

        let mut rows = Vec::with_capacity(entries.len());
        for entry in &entries {
            let row = sqlx::query_as::<_, InventoryByLocation>(
                r#"
                INSERT INTO inventory_by_location (id, variant_id, location_id, on_hand)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (variant_id, location_id) DO UPDATE SET on_hand = excluded.on_hand
                RETURNING id, variant_id, location_id, on_hand
                "#,
            )
            .bind(new_id())
            .bind(&entry.variant_id)
            .bind(&entry.location_id)
            .bind(entry.on_hand.unwrap_or(0))
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }

        tx.commit().await?;

        debug!(variant_id = %variant_id, rows = rows.len(), "Set inventory for variant");
        Ok(rows)
    }

    /// Units of a variant on hand across every location.
    pub async fn total_on_hand(&self, variant_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(on_hand), 0) FROM inventory_by_location WHERE variant_id = ?1",
        )
        .bind(variant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Lists rows ordered by product, option label and location.
    pub async fn list(&self, filter: &InventoryFilter) -> DbResult<Page<InventoryView>> {
        let mut count = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) {FROM_VIEW} WHERE 1 = 1"));
        push_filters(&mut count, filter)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_VIEW);
        select.push(" WHERE 1 = 1");
        push_filters(&mut select, filter)?;
        select.push(" ORDER BY p.title, v.option_label, l.name");
        push_page(&mut select, &filter.page);

        let rows = select.build_query_as::<InventoryRow>().fetch_all(&self.pool).await?;

        Ok(Page::new(rows, total, &filter.page).map(InventoryView::from))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &InventoryFilter) -> DbResult<()> {
    if let Some(variant_id) = &filter.variant_id {
        qb.push(" AND i.variant_id = ").push_bind(variant_id.clone());
    }
    if let Some(location_id) = &filter.location_id {
        qb.push(" AND i.location_id = ").push_bind(location_id.clone());
    }
    push_search(
        qb,
        filter.search.as_deref(),
        &["v.option_label", "p.title", "l.name"],
    )
}

/// References exist and the pair is not already stocked by another row.
async fn check_integrity(
    conn: &mut SqliteConnection,
    input: &InventoryInput,
    exclude_id: Option<&str>,
) -> DbResult<()> {
    let mut errors = ValidationErrors::new();
    check_reference(conn, &mut errors, "variant_id", "product_variants", &input.variant_id).await?;
    check_reference(conn, &mut errors, "location_id", "locations", &input.location_id).await?;
    errors.into_result()?;

    let taken: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM inventory_by_location \
         WHERE variant_id = ?1 AND location_id = ?2 AND id IS NOT ?3",
    )
    .bind(&input.variant_id)
    .bind(&input.location_id)
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await?;

    if taken > 0 {
        return Err(DbError::duplicate("location_id", input.location_id.as_str()));
    }

    Ok(())
}

fn pair_conflict(err: DbError, location_id: &str) -> DbError {
    if err.is_unique_violation_on("inventory_by_location.variant_id") {
        DbError::duplicate("location_id", location_id)
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;

    fn stock(location_id: &str, on_hand: i64) -> InventoryInput {
        InventoryInput {
            location_id: location_id.to_string(),
            on_hand: Some(on_hand),
            ..Default::default()
        }
    }

    #[test]
    fn test_raw_pair_violation_becomes_duplicate() {
        let raw = DbError::UniqueViolation {
            field: "inventory_by_location.variant_id, inventory_by_location.location_id".to_string(),
            value: "unknown".to_string(),
        };
        let err = pair_conflict(raw, "loc-1");
        assert!(matches!(
            err.validation_errors().unwrap().get("location_id"),
            Some(studio_core::ValidationError::Duplicate { value, .. }) if value == "loc-1"
        ));
    }

    #[tokio::test]
    async fn test_pair_is_unique() {
        let db = test_db().await;
        let harbor = product(&db, "Harbor").await;
        let a4 = variant(&db, &harbor.id, "A4").await;
        let studio = location(&db, "Studio").await;

        let input = InventoryInput {
            variant_id: a4.id.clone(),
            location_id: studio.id.clone(),
            on_hand: None,
        };
        let row = db.inventory().create(&input).await.unwrap();
        assert_eq!(row.on_hand, 0);

        let err = db.inventory().create(&input).await.unwrap_err();
        assert!(matches!(
            err.validation_errors().unwrap().get("location_id"),
            Some(ValidationError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_for_variant_upserts() {
        let db = test_db().await;
        let harbor = product(&db, "Harbor").await;
        let a4 = variant(&db, &harbor.id, "A4").await;
        let studio = location(&db, "Studio").await;
        let storage = location(&db, "Storage").await;

        db.inventory()
            .set_for_variant(&a4.id, &[stock(&studio.id, 2)])
            .await
            .unwrap();
        let rows = db
            .inventory()
            .set_for_variant(&a4.id, &[stock(&studio.id, 5), stock(&storage.id, 1)])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        let page = db
            .inventory()
            .list(&InventoryFilter {
                variant_id: Some(a4.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].location_name, "Storage");
        assert_eq!(page.items[1].row.on_hand, 5);
        assert_eq!(page.items[1].product, "Harbor");
        assert_eq!(db.inventory().total_on_hand(&a4.id).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_set_for_variant_is_all_or_nothing() {
        let db = test_db().await;
        let harbor = product(&db, "Harbor").await;
        let a4 = variant(&db, &harbor.id, "A4").await;
        let studio = location(&db, "Studio").await;

        let err = db
            .inventory()
            .set_for_variant(
                &a4.id,
                &[
                    stock(&studio.id, 3),
                    stock("550e8400-e29b-41d4-a716-446655440000", 1),
                    stock(&studio.id, -1),
                ],
            )
            .await
            .unwrap_err();
        assert!(err.validation_errors().unwrap().has("inventory[2].on_hand"));

        let err = db
            .inventory()
            .set_for_variant(
                &a4.id,
                &[stock(&studio.id, 3), stock("550e8400-e29b-41d4-a716-446655440000", 1)],
            )
            .await
            .unwrap_err();
        assert!(err.validation_errors().unwrap().has("inventory[1].location_id"));
        assert_eq!(db.inventory().total_on_hand(&a4.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_location_delete_cascades() {
        let db = test_db().await;
        let harbor = product(&db, "Harbor").await;
        let a4 = variant(&db, &harbor.id, "A4").await;
        let studio = location(&db, "Studio").await;
        let rows = db
            .inventory()
            .set_for_variant(&a4.id, &[stock(&studio.id, 4)])
            .await
            .unwrap();

        db.locations().delete(&studio.id).await.unwrap();
        assert!(db.inventory().get_by_id(&rows[0].id).await.unwrap().is_none());
    }
}
