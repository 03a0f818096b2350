//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - SKU allocation inside the create transaction
//! - Inline creation of variants and media with the product
//! - Delete with cascade to variants / media, refused while any variant is
//!   on an order or consignment
//!
//! ## SKU Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sku given?  ── yes ──► taken? ── yes ──► Validation(Duplicate sku)    │
//! │      │                    │                                             │
//! │      no                   no ──► insert                                 │
//! │      ▼                                                                  │
//! │  normalize("{artist}-{title}")                                         │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  SELECT sku WHERE sku starts with the candidates' common prefix        │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  allocate_unique(base, taken)  ──► insert                              │
//! │                                      │                                  │
//! │            UNIQUE(sku) violated? ◄───┘  (another writer got there)     │
//! │                  │                                                      │
//! │                  └── roll back, allocate again (max 3 attempts)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use tracing::{debug, warn};

use studio_core::sku;
use studio_core::validation::{non_blank, require, MediaInput, ProductInput, VariantInput};
use studio_core::{Media, Product, ProductType, ProductVariant, ValidationError, ValidationErrors, SKU_MAX_LEN};

use super::{
    media, nested, new_id, protect, push_page, push_search, row_exists, value_taken, variant, Page,
    PageRequest, SortDirection,
};
use crate::error::{DbError, DbResult};

/// Whole-transaction attempts when a concurrent writer takes the SKU
/// between allocation and insert.
pub const SKU_WRITE_RETRIES: u32 = 3;

const SELECT_PRODUCT: &str = "SELECT id, sku, title, description, product_type, artist, series, \
                              is_active, created_at FROM products";

/// Sort keys for product lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Title,
    CreatedAt,
}

/// Filters for [`ProductRepository::list`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub product_type: Option<ProductType>,
    pub is_active: Option<bool>,
    pub series: Option<String>,
    pub artist: Option<String>,
    /// Matches title, sku, description, series and artist.
    pub search: Option<String>,
    pub sort: ProductSort,
    pub direction: SortDirection,
    pub page: PageRequest,
}

/// A product together with the rows created alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductWithChildren {
    pub product: Product,
    pub variants: Vec<ProductVariant>,
    pub media: Vec<Media>,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.create(&input).await?;
/// let page = repo.list(&ProductFilter { search: Some("sunset".into()), ..Default::default() }).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product, allocating a SKU when none is given.
    pub async fn create(&self, input: &ProductInput) -> DbResult<Product> {
        Ok(self.create_with_children(input, &[], &[]).await?.product)
    }

    /// Creates a product with its variants and media in one transaction.
    ///
    /// The `product_id` of every child input is ignored and replaced by the
    /// new product's id. Errors on child rows are keyed `variants[i].field`
    /// and `media[i].field`.
    pub async fn create_with_children(
        &self,
        input: &ProductInput,
        variants: &[VariantInput],
        media: &[MediaInput],
    ) -> DbResult<ProductWithChildren> {
        let product_id = new_id();

        let variants: Vec<VariantInput> = variants
            .iter()
            .map(|v| VariantInput {
                product_id: product_id.clone(),
                ..v.clone()
            })
            .collect();
        let media: Vec<MediaInput> = media
            .iter()
            .map(|m| MediaInput {
                product_id: product_id.clone(),
                ..m.clone()
            })
            .collect();

        let mut errors = ValidationErrors::new();
        if let Err(report) = input.validate() {
            errors.extend(report);
        }
        for (i, v) in variants.iter().enumerate() {
            if let Err(report) = v.validate() {
                errors.extend(report.prefixed(&format!("variants[{i}]")));
            }
        }
        for (i, m) in media.iter().enumerate() {
            if let Err(report) = m.validate() {
                errors.extend(report.prefixed(&format!("media[{i}]")));
            }
        }
        errors.into_result()?;

        let mut attempt = 1;
        loop {
            match self.try_create(&product_id, input, &variants, &media).await {
                Err(err) if err.is_unique_violation_on("products.sku") => {
                    if let Some(sku) = input.manual_sku() {
                        return Err(DbError::duplicate("sku", sku));
                    }
                    if attempt >= SKU_WRITE_RETRIES {
                        return Err(err);
                    }
                    warn!(attempt, title = %input.title, "SKU taken concurrently, reallocating");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn try_create(
        &self,
        product_id: &str,
        input: &ProductInput,
        variants: &[VariantInput],
        media: &[MediaInput],
    ) -> DbResult<ProductWithChildren> {
        let mut tx = self.pool.begin().await?;

        let product = insert(&mut tx, product_id, input).await?;

        let mut created_variants = Vec::with_capacity(variants.len());
        for (i, v) in variants.iter().enumerate() {
            let row = variant::insert(&mut tx, v)
                .await
                .map_err(|e| nested(e, &format!("variants[{i}]")))?;
            created_variants.push(row);
        }

        let mut created_media = Vec::with_capacity(media.len());
        for (i, m) in media.iter().enumerate() {
            let row = media::insert(&mut tx, m)
                .await
                .map_err(|e| nested(e, &format!("media[{i}]")))?;
            created_media.push(row);
        }

        tx.commit().await?;

        debug!(
            id = %product.id,
            sku = %product.sku,
            variants = created_variants.len(),
            media = created_media.len(),
            "Created product"
        );

        Ok(ProductWithChildren {
            product,
            variants: created_variants,
            media: created_media,
        })
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE sku = ?1"))
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Replaces a product's editable fields.
    ///
    /// The SKU never changes: leaving it blank keeps the stored one, giving
    /// a different one is rejected.
    pub async fn update(&self, id: &str, input: &ProductInput) -> DbResult<Product> {
        debug!(id = %id, "Updating product");

        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let existing = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        if let Some(sku) = input.manual_sku() {
            if sku != existing.sku {
                return Err(ValidationError::Immutable {
                    field: "sku".to_string(),
                }
                .into());
            }
        }

        let product = Product {
            title: input.title.trim().to_string(),
            description: input.description.clone(),
            product_type: require("product_type", input.product_type)?,
            artist: non_blank(input.artist.as_deref())
                .map(str::to_string)
                .unwrap_or(existing.artist),
            series: input.series.clone(),
            is_active: input.is_active.unwrap_or(existing.is_active),
            created_at: input.created_at.unwrap_or(existing.created_at),
            ..existing
        };

        sqlx::query(
            r#"
            UPDATE products SET
                title = ?2,
                description = ?3,
                product_type = ?4,
                artist = ?5,
                series = ?6,
                is_active = ?7,
                created_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.product_type)
        .bind(&product.artist)
        .bind(&product.series)
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(product)
    }

    /// Deletes a product with its variants and media.
    ///
    /// ## Errors
    /// - `NotFound` when the id does not exist
    /// - `Conflict` when any variant is on an order or a consignment
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let mut tx = self.pool.begin().await?;

        if !row_exists(&mut tx, "products", id).await? {
            return Err(DbError::not_found("Product", id));
        }

        for table in ["order_items", "consignment_items"] {
            let sql = format!(
                "SELECT COUNT(*) FROM {table} r \
                 JOIN product_variants v ON v.id = r.variant_id \
                 WHERE v.product_id = ?1"
            );
            let count: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *tx).await?;
            if count > 0 {
                return Err(DbError::conflict("Product", id, table));
            }
        }

        sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| protect(e.into(), "Product", id))?;

        tx.commit().await?;

        Ok(())
    }

    /// Lists products matching `filter`, ordered by title unless asked
    /// otherwise.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Page<Product>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products p WHERE 1 = 1");
        push_filters(&mut count, filter)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(
            "SELECT p.id, p.sku, p.title, p.description, p.product_type, p.artist, p.series, \
             p.is_active, p.created_at FROM products p WHERE 1 = 1",
        );
        push_filters(&mut select, filter)?;

        let column = match filter.sort {
            ProductSort::Title => "p.title",
            ProductSort::CreatedAt => "p.created_at",
        };
        select
            .push(" ORDER BY ")
            .push(column)
            .push(" ")
            .push(filter.direction.sql())
            .push(", p.id");
        push_page(&mut select, &filter.page);

        let items = select.build_query_as::<Product>().fetch_all(&self.pool).await?;

        debug!(count = items.len(), total, "Listed products");
        Ok(Page::new(items, total, &filter.page))
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) -> DbResult<()> {
    if let Some(product_type) = filter.product_type {
        qb.push(" AND p.product_type = ").push_bind(product_type);
    }
    if let Some(is_active) = filter.is_active {
        qb.push(" AND p.is_active = ").push_bind(is_active);
    }
    if let Some(series) = &filter.series {
        qb.push(" AND p.series = ").push_bind(series.clone());
    }
    if let Some(artist) = &filter.artist {
        qb.push(" AND p.artist = ").push_bind(artist.clone());
    }
    push_search(
        qb,
        filter.search.as_deref(),
        &["p.title", "p.sku", "p.description", "p.series", "p.artist"],
    )
}

/// Loads a product on the caller's connection.
pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(product)
}

/// Inserts a validated product, resolving its SKU first.
pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    id: &str,
    input: &ProductInput,
) -> DbResult<Product> {
    let sku = match input.manual_sku() {
        Some(sku) => {
            if value_taken(conn, "products", "sku", sku, None).await? {
                return Err(DbError::duplicate("sku", sku));
            }
            sku.to_string()
        }
        None => allocate_sku(conn, &input.sku_base()).await?,
    };

    let product = Product {
        id: id.to_string(),
        sku,
        title: input.title.trim().to_string(),
        description: input.description.clone(),
        product_type: require("product_type", input.product_type)?,
        artist: input.artist_or_default().to_string(),
        series: input.series.clone(),
        is_active: input.is_active.unwrap_or(true),
        created_at: input.created_at.unwrap_or_else(Utc::now),
    };

    debug!(sku = %product.sku, "Inserting product");

    sqlx::query(
        r#"
        INSERT INTO products (
            id, sku, title, description, product_type,
            artist, series, is_active, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&product.id)
    .bind(&product.sku)
    .bind(&product.title)
    .bind(&product.description)
    .bind(product.product_type)
    .bind(&product.artist)
    .bind(&product.series)
    .bind(product.is_active)
    .bind(product.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(product)
}

/// Picks a free SKU for `base_text` against the SKUs stored so far.
async fn allocate_sku(conn: &mut SqliteConnection, base_text: &str) -> DbResult<String> {
    let mut normalized = sku::normalize(base_text);
    normalized.truncate(SKU_MAX_LEN);

    if normalized.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        }
        .into());
    }

    let prefix = sku::candidate_prefix(&normalized, SKU_MAX_LEN);

    let taken: HashSet<String> =
        sqlx::query_scalar::<_, String>("SELECT sku FROM products WHERE substr(sku, 1, ?1) = ?2")
            .bind(prefix.len() as i64)
            .bind(prefix)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

    let sku = sku::allocate_unique(base_text, |candidate| taken.contains(candidate), SKU_MAX_LEN)?;

    debug!(sku = %sku, existing = taken.len(), "Allocated SKU");
    Ok(sku)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use studio_core::validation::OrderItemInput;
    use studio_core::MediaKind;

    fn input(title: &str) -> ProductInput {
        ProductInput {
            title: title.to_string(),
            product_type: Some(ProductType::Original),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_allocates_sku_from_artist_and_title() {
        let db = test_db().await;

        let first = db.products().create(&input("Sunset #3!!")).await.unwrap();
        assert_eq!(first.sku, "PATRICIA-FORBES-SUNSET-3");
        assert_eq!(first.artist, "Patricia Forbes");
        assert!(first.is_active);

        let second = db.products().create(&input("Sunset #3")).await.unwrap();
        assert_eq!(second.sku, "PATRICIA-FORBES-SUNSET-3-2");

        let third = db.products().create(&input("sunset 3")).await.unwrap();
        assert_eq!(third.sku, "PATRICIA-FORBES-SUNSET-3-3");
    }

    #[tokio::test]
    async fn test_create_with_manual_sku() {
        let db = test_db().await;

        let product = db
            .products()
            .create(&ProductInput {
                sku: Some(" PF-001 ".to_string()),
                ..input("Dawn")
            })
            .await
            .unwrap();
        assert_eq!(product.sku, "PF-001");

        let err = db
            .products()
            .create(&ProductInput {
                sku: Some("PF-001".to_string()),
                ..input("Dusk")
            })
            .await
            .unwrap_err();
        let report = err.validation_errors().unwrap();
        assert!(matches!(report.get("sku"), Some(ValidationError::Duplicate { .. })));
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_reports_every_field_error() {
        let db = test_db().await;

        let err = db
            .products()
            .create(&ProductInput::default())
            .await
            .unwrap_err();
        let report = err.validation_errors().unwrap();
        assert!(report.has("title"));
        assert!(report.has("product_type"));
    }

    #[tokio::test]
    async fn test_update_keeps_sku_immutable() {
        let db = test_db().await;
        let product = db.products().create(&input("Dawn")).await.unwrap();

        let err = db
            .products()
            .update(
                &product.id,
                &ProductInput {
                    sku: Some("OTHER".to_string()),
                    ..input("Dawn")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.validation_errors().unwrap().get("sku"),
            Some(ValidationError::Immutable { .. })
        ));

        let updated = db
            .products()
            .update(
                &product.id,
                &ProductInput {
                    sku: Some(product.sku.clone()),
                    is_active: Some(false),
                    ..input("Dawn II")
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.sku, product.sku);
        assert_eq!(updated.title, "Dawn II");
        assert!(!updated.is_active);
        assert_eq!(updated.created_at, product.created_at);

        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let db = test_db().await;
        let err = db
            .products()
            .update("550e8400-e29b-41d4-a716-446655440000", &input("Ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_create_with_children() {
        let db = test_db().await;

        let created = db
            .products()
            .create_with_children(
                &input("Tidal Study"),
                &[
                    variant_input("", "12x16", 4500),
                    variant_input("", "18x24", 8500),
                ],
                &[MediaInput {
                    kind: Some(MediaKind::Primary),
                    image: Some("products/2025/09/tidal.jpg".to_string()),
                    ..Default::default()
                }],
            )
            .await
            .unwrap();

        assert_eq!(created.variants.len(), 2);
        assert_eq!(created.media.len(), 1);
        assert!(created
            .variants
            .iter()
            .all(|v| v.product_id == created.product.id));
        assert_eq!(created.media[0].product_id, created.product.id);
    }

    #[tokio::test]
    async fn test_create_with_children_is_atomic() {
        let db = test_db().await;

        let err = db
            .products()
            .create_with_children(
                &input("Tidal Study"),
                &[
                    variant_input("", "12x16", 4500),
                    variant_input("", "12x16", 8500),
                ],
                &[],
            )
            .await
            .unwrap_err();

        let report = err.validation_errors().unwrap();
        assert!(matches!(
            report.get("variants[1].option_label"),
            Some(ValidationError::Duplicate { .. })
        ));
        assert_eq!(db.products().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_cascades_variants_and_media() {
        let db = test_db().await;
        let created = db
            .products()
            .create_with_children(
                &input("Dawn"),
                &[variant_input("", "A4", 2000)],
                &[MediaInput {
                    kind: Some(MediaKind::Detail),
                    ..Default::default()
                }],
            )
            .await
            .unwrap();

        db.products().delete(&created.product.id).await.unwrap();

        assert!(db.products().get_by_id(&created.product.id).await.unwrap().is_none());
        assert!(db
            .variants()
            .get_by_id(&created.variants[0].id)
            .await
            .unwrap()
            .is_none());
        assert!(db.media().get_by_id(&created.media[0].id).await.unwrap().is_none());

        let err = db.products().delete(&created.product.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_refused_while_variant_is_ordered() {
        let db = test_db().await;
        let product = product(&db, "Dawn").await;
        let variant = variant(&db, &product.id, "A4").await;
        let order = order(&db).await;
        db.order_items()
            .create(&OrderItemInput {
                order_id: order.id.clone(),
                variant_id: variant.id.clone(),
                qty: 1,
                unit_price_cents: 12500,
            })
            .await
            .unwrap();

        let err = db.products().delete(&product.id).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));
        assert!(db.products().get_by_id(&product.id).await.unwrap().is_some());
        assert!(db.variants().get_by_id(&variant.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_filters_search_and_paging() {
        let db = test_db().await;
        for (title, kind) in [
            ("Harbor at Dawn", ProductType::Original),
            ("Harbor at Dusk", ProductType::LimitedPrint),
            ("Studio Tote", ProductType::Merch),
        ] {
            db.products()
                .create(&ProductInput {
                    product_type: Some(kind),
                    ..input(title)
                })
                .await
                .unwrap();
        }

        let page = db
            .products()
            .list(&ProductFilter {
                search: Some("harbor".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].title, "Harbor at Dawn");

        let page = db
            .products()
            .list(&ProductFilter {
                product_type: Some(ProductType::Merch),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].sku, "PATRICIA-FORBES-STUDIO-TOTE");

        let page = db
            .products()
            .list(&ProductFilter {
                direction: SortDirection::Desc,
                page: PageRequest::new(1, 0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "Studio Tote");

        let page = db
            .products()
            .list(&ProductFilter {
                direction: SortDirection::Desc,
                page: PageRequest::new(1, 1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.items[0].title, "Harbor at Dusk");
    }
}
