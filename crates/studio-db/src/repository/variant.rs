//! # Variant Repository
//!
//! Database operations for product variants.
//!
//! ## Delete Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DELETE variant                                                        │
//! │    ├── inventory_by_location   CASCADE   (rows go with it)             │
//! │    ├── coa_certificates        SET NULL  (certificate survives)        │
//! │    ├── order_items             PROTECT   → Conflict                    │
//! │    └── consignment_items       PROTECT   → Conflict                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use studio_core::validation::VariantInput;
use studio_core::{ProductVariant, ValidationError, ValidationErrors, VariantView};

use super::{
    check_reference, count_references, new_id, protect, push_page, push_search, row_exists, Page,
    PageRequest, SortDirection,
};
use crate::error::{DbError, DbResult};

const SELECT_VARIANT: &str = "SELECT id, product_id, option_label, price_cents, edition_size, \
                              edition_sold, weight_grams, taxable FROM product_variants";

const SELECT_VIEW: &str = "SELECT v.id, v.product_id, v.option_label, v.price_cents, \
                           v.edition_size, v.edition_sold, v.weight_grams, v.taxable, \
                           p.title AS product_title \
                           FROM product_variants v JOIN products p ON p.id = v.product_id";

/// Sort keys for variant lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantSort {
    /// Product title, then option label.
    #[default]
    Product,
    PriceCents,
    EditionSold,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantFilter {
    pub product_id: Option<String>,
    pub edition_size: Option<i64>,
    pub taxable: Option<bool>,
    /// Matches option label and product title.
    pub search: Option<String>,
    pub sort: VariantSort,
    pub direction: SortDirection,
    pub page: PageRequest,
}

#[derive(sqlx::FromRow)]
struct VariantRow {
    #[sqlx(flatten)]
    variant: ProductVariant,
    product_title: String,
}

impl From<VariantRow> for VariantView {
    fn from(row: VariantRow) -> Self {
        VariantView::new(row.variant, row.product_title)
    }
}

/// Repository for product variants.
#[derive(Debug, Clone)]
pub struct VariantRepository {
    pool: SqlitePool,
}

impl VariantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VariantRepository { pool }
    }

    /// Creates a variant. Editions sold beyond the edition size are stored
    /// and logged, not rejected.
    pub async fn create(&self, input: &VariantInput) -> DbResult<ProductVariant> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        let variant = insert(&mut tx, input).await?;
        tx.commit().await?;

        debug!(id = %variant.id, product_id = %variant.product_id, "Created variant");
        Ok(variant)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ProductVariant>> {
        let variant = sqlx::query_as::<_, ProductVariant>(&format!("{SELECT_VARIANT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(variant)
    }

    /// Gets a variant with its display price and product title.
    pub async fn get_view(&self, id: &str) -> DbResult<Option<VariantView>> {
        let row = sqlx::query_as::<_, VariantRow>(&format!("{SELECT_VIEW} WHERE v.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(VariantView::from))
    }

    /// Variants of one product, ordered by option label.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<ProductVariant>> {
        let variants = sqlx::query_as::<_, ProductVariant>(&format!(
            "{SELECT_VARIANT} WHERE product_id = ?1 ORDER BY option_label"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(variants)
    }

    pub async fn update(&self, id: &str, input: &VariantInput) -> DbResult<ProductVariant> {
        debug!(id = %id, "Updating variant");

        input.validate()?;
        let price_cents = input.resolved_price_cents()?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, ProductVariant>(&format!("{SELECT_VARIANT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("ProductVariant", id))?;

        check_integrity(&mut tx, input, Some(id)).await?;

        // omitted counters keep their stored values
        let variant = ProductVariant {
            edition_sold: input.edition_sold.unwrap_or(existing.edition_sold),
            taxable: input.taxable.unwrap_or(existing.taxable),
            ..build(id.to_string(), input, price_cents)
        };
        warn_if_oversold(&variant);

        sqlx::query(
            r#"
            UPDATE product_variants SET
                product_id = ?2,
                option_label = ?3,
                price_cents = ?4,
                edition_size = ?5,
                edition_sold = ?6,
                weight_grams = ?7,
                taxable = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.option_label)
        .bind(variant.price_cents)
        .bind(variant.edition_size)
        .bind(variant.edition_sold)
        .bind(variant.weight_grams)
        .bind(variant.taxable)
        .execute(&mut *tx)
        .await
        .map_err(|e| label_conflict(e.into(), &variant.option_label))?;

        tx.commit().await?;

        Ok(variant)
    }

    /// Deletes a variant.
    ///
    /// ## Errors
    /// - `NotFound` when the id does not exist
    /// - `Conflict` while an order item or consignment item references it
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting variant");

        let mut tx = self.pool.begin().await?;

        if !row_exists(&mut tx, "product_variants", id).await? {
            return Err(DbError::not_found("ProductVariant", id));
        }

        for table in ["order_items", "consignment_items"] {
            if count_references(&mut tx, table, "variant_id", id).await? > 0 {
                return Err(DbError::conflict("ProductVariant", id, table));
            }
        }

        sqlx::query("DELETE FROM product_variants WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| protect(e.into(), "ProductVariant", id))?;

        tx.commit().await?;

        Ok(())
    }

    pub async fn list(&self, filter: &VariantFilter) -> DbResult<Page<VariantView>> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM product_variants v JOIN products p ON p.id = v.product_id WHERE 1 = 1",
        );
        push_filters(&mut count, filter)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_VIEW);
        select.push(" WHERE 1 = 1");
        push_filters(&mut select, filter)?;

        let direction = filter.direction.sql();
        match filter.sort {
            VariantSort::Product => select
                .push(" ORDER BY p.title ")
                .push(direction)
                .push(", v.option_label ")
                .push(direction),
            VariantSort::PriceCents => select.push(" ORDER BY v.price_cents ").push(direction),
            VariantSort::EditionSold => select.push(" ORDER BY v.edition_sold ").push(direction),
        };
        select.push(", v.id");
        push_page(&mut select, &filter.page);

        let rows = select.build_query_as::<VariantRow>().fetch_all(&self.pool).await?;

        Ok(Page::new(rows, total, &filter.page).map(VariantView::from))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &VariantFilter) -> DbResult<()> {
    if let Some(product_id) = &filter.product_id {
        qb.push(" AND v.product_id = ").push_bind(product_id.clone());
    }
    if let Some(edition_size) = filter.edition_size {
        qb.push(" AND v.edition_size = ").push_bind(edition_size);
    }
    if let Some(taxable) = filter.taxable {
        qb.push(" AND v.taxable = ").push_bind(taxable);
    }
    push_search(qb, filter.search.as_deref(), &["v.option_label", "p.title"])
}

fn build(id: String, input: &VariantInput, price_cents: i64) -> ProductVariant {
    ProductVariant {
        id,
        product_id: input.product_id.clone(),
        option_label: input.option_label.trim().to_string(),
        price_cents,
        edition_size: input.edition_size,
        edition_sold: input.edition_sold.unwrap_or(0),
        weight_grams: input.weight_grams,
        taxable: input.taxable.unwrap_or(true),
    }
}

fn label_conflict(err: DbError, option_label: &str) -> DbError {
    if err.is_unique_violation_on("product_variants.product_id") {
        DbError::duplicate("option_label", option_label)
    } else {
        err
    }
}

fn warn_if_oversold(variant: &ProductVariant) {
    if variant.is_oversold() {
        warn!(
            id = %variant.id,
            edition_size = ?variant.edition_size,
            edition_sold = variant.edition_sold,
            "Variant has sold more than its edition size"
        );
    }
}

/// Product exists and the label is free within it.
async fn check_integrity(
    conn: &mut SqliteConnection,
    input: &VariantInput,
    exclude_id: Option<&str>,
) -> DbResult<()> {
    let mut errors = ValidationErrors::new();

    check_reference(conn, &mut errors, "product_id", "products", &input.product_id).await?;

    let label = input.option_label.trim();
    let taken: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM product_variants \
         WHERE product_id = ?1 AND option_label = ?2 AND id IS NOT ?3",
    )
    .bind(&input.product_id)
    .bind(label)
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await?;

    if taken > 0 {
        errors.push(ValidationError::Duplicate {
            field: "option_label".to_string(),
            value: label.to_string(),
        });
    }

    errors.into_result()?;
    Ok(())
}

/// Inserts a validated variant.
pub(crate) async fn insert(conn: &mut SqliteConnection, input: &VariantInput) -> DbResult<ProductVariant> {
    let price_cents = input.resolved_price_cents()?;

    check_integrity(conn, input, None).await?;

    let variant = build(new_id(), input, price_cents);
    warn_if_oversold(&variant);

    sqlx::query(
        r#"
        INSERT INTO product_variants (
            id, product_id, option_label, price_cents,
            edition_size, edition_sold, weight_grams, taxable
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&variant.id)
    .bind(&variant.product_id)
    .bind(&variant.option_label)
    .bind(variant.price_cents)
    .bind(variant.edition_size)
    .bind(variant.edition_sold)
    .bind(variant.weight_grams)
    .bind(variant.taxable)
    .execute(&mut *conn)
    .await
    .map_err(|e| label_conflict(e.into(), &variant.option_label))?;

    Ok(variant)
}

// =============================================================================
// Unit Tests
// =============================================================================
