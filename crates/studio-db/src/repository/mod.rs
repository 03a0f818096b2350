//! # Repository Module
//!
//! One repository per entity, all sharing the same write discipline.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    create / update / delete                             │
//! │                                                                         │
//! │  input.validate()            ── field report, nothing touched yet      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pool.begin()                                                           │
//! │       │                                                                 │
//! │       ├── referenced rows exist?      → UnknownReference               │
//! │       ├── unique values free?         → Duplicate                      │
//! │       ├── protected references?       → Conflict (delete only)         │
//! │       ▼                                                                 │
//! │  INSERT / UPDATE / DELETE     ── schema constraints are the backstop   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tx.commit()                  ── dropped tx rolls back on any error    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything that runs inside a transaction takes `&mut SqliteConnection`
//! so nested writes (inline child rows) share one transaction.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Products, SKU allocation, inline children
//! - [`VariantRepository`](variant::VariantRepository) - Size / edition options
//! - [`MediaRepository`](media::MediaRepository) - Product images
//! - [`ContactRepository`](contact::ContactRepository) - Collectors, galleries, vendors
//! - [`CrmNoteRepository`](crm_note::CrmNoteRepository) - Notes on contacts
//! - [`LocationRepository`](location::LocationRepository) - Stock locations
//! - [`InventoryRepository`](inventory::InventoryRepository) - On-hand per variant and location
//! - [`OrderRepository`](order::OrderRepository) - Orders with inline items
//! - [`OrderItemRepository`](order_item::OrderItemRepository) - Order lines
//! - [`PaymentRepository`](payment::PaymentRepository) - Payment ledger
//! - [`CoaRepository`](coa::CoaRepository) - Certificates of authenticity
//! - [`ConsignmentRepository`](consignment::ConsignmentRepository) - Gallery consignments
//! - [`ConsignmentItemRepository`](consignment_item::ConsignmentItemRepository) - Consigned lines

pub mod coa;
pub mod consignment;
pub mod consignment_item;
pub mod contact;
pub mod crm_note;
pub mod inventory;
pub mod location;
pub mod media;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod variant;

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use studio_core::validation::validate_search_query;
use studio_core::{ValidationError, ValidationErrors};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Page size when the caller gives none.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page a caller can ask for.
pub const MAX_PAGE_SIZE: i64 = 500;

// =============================================================================
// Paging
// =============================================================================

/// Limit / offset as requested by the caller. Out-of-range values are
/// clamped rather than rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageRequest {
    pub fn new(limit: i64, offset: i64) -> Self {
        PageRequest {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// One page of a list result plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, total: i64, request: &PageRequest) -> Self {
        Page {
            items,
            total,
            limit: request.limit(),
            offset: request.offset(),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

// =============================================================================
// Query Helpers
// =============================================================================

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Appends `AND (col LIKE %term% OR ...)` for a non-blank search term.
///
/// SQLite's LIKE is case-insensitive for ASCII letters.
pub(crate) fn push_search(
    qb: &mut QueryBuilder<'_, Sqlite>,
    search: Option<&str>,
    columns: &[&str],
) -> DbResult<()> {
    let Some(raw) = search else {
        return Ok(());
    };

    let term = validate_search_query(raw)?;
    if term.is_empty() {
        return Ok(());
    }

    let pattern = format!("%{}%", escape_like(&term));

    qb.push(" AND (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push(*column)
            .push(" LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\'");
    }
    qb.push(")");

    Ok(())
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub(crate) fn push_page(qb: &mut QueryBuilder<'_, Sqlite>, page: &PageRequest) {
    qb.push(" LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
}

// =============================================================================
// Integrity Checks (run inside the write transaction)
// =============================================================================

/// Whether a row with `id` exists in `table`.
pub(crate) async fn row_exists(conn: &mut SqliteConnection, table: &str, id: &str) -> DbResult<bool> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE id = ?1");
    let count: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *conn).await?;
    Ok(count > 0)
}

/// Records `UnknownReference` for `field` when `id` is not in `table`.
pub(crate) async fn check_reference(
    conn: &mut SqliteConnection,
    errors: &mut ValidationErrors,
    field: &str,
    table: &str,
    id: &str,
) -> DbResult<()> {
    if !row_exists(conn, table, id).await? {
        errors.push(ValidationError::UnknownReference {
            field: field.to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Number of rows in `table` whose `column` equals `id`.
pub(crate) async fn count_references(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    id: &str,
) -> DbResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1");
    let count: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *conn).await?;
    Ok(count)
}

/// Whether `value` is already used in `table.column` by a row other than
/// `exclude_id`.
pub(crate) async fn value_taken(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    value: &str,
    exclude_id: Option<&str>,
) -> DbResult<bool> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1 AND id IS NOT ?2");
    let count: i64 = sqlx::query_scalar(&sql)
        .bind(value)
        .bind(exclude_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

/// Re-keys a nested row's validation report under `prefix`.
pub(crate) fn nested(err: DbError, prefix: &str) -> DbError {
    match err {
        DbError::Validation(report) => DbError::Validation(report.prefixed(prefix)),
        other => other,
    }
}

/// Turns a raw FK failure during a delete into a `Conflict`.
pub(crate) fn protect(err: DbError, entity: &str, id: &str) -> DbError {
    match err {
        DbError::ForeignKeyViolation { .. } => DbError::conflict(entity, id, "protected references"),
        other => other,
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use studio_core::validation::{
        ConsignmentInput, ContactInput, LocationInput, OrderInput, ProductInput, VariantInput,
    };
    use studio_core::{
        Consignment, Contact, ContactKind, Location, Order, Product, ProductType, ProductVariant,
    };

    use crate::{Database, DbConfig};

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn product(db: &Database, title: &str) -> Product {
        db.products()
            .create(&ProductInput {
                title: title.to_string(),
                product_type: Some(ProductType::LimitedPrint),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub fn variant_input(product_id: &str, label: &str, price_cents: i64) -> VariantInput {
        VariantInput {
            product_id: product_id.to_string(),
            option_label: label.to_string(),
            price_cents: Some(price_cents),
            ..Default::default()
        }
    }

    pub async fn variant(db: &Database, product_id: &str, label: &str) -> ProductVariant {
        db.variants()
            .create(&variant_input(product_id, label, 12500))
            .await
            .unwrap()
    }

    pub async fn contact(db: &Database, kind: ContactKind, name: &str) -> Contact {
        db.contacts()
            .create(&ContactInput {
                kind: Some(kind),
                name: name.to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub async fn location(db: &Database, name: &str) -> Location {
        db.locations()
            .create(&LocationInput {
                name: name.to_string(),
                is_sellable: None,
            })
            .await
            .unwrap()
    }

    pub async fn order(db: &Database) -> Order {
        db.orders().create(&OrderInput::default()).await.unwrap()
    }

    pub fn consignment_input(gallery_id: &str) -> ConsignmentInput {
        ConsignmentInput {
            gallery_contact_id: gallery_id.to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1),
            end_date: None,
            commission_rate: "40".to_string(),
        }
    }

    pub async fn consignment(db: &Database, gallery_id: &str) -> Consignment {
        db.consignments()
            .create(&consignment_input(gallery_id))
            .await
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(PageRequest::default().limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(PageRequest::new(10_000, -5).limit(), MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(0, -5).limit(), 1);
        assert_eq!(PageRequest::new(10, -5).offset(), 0);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("dawn"), "dawn");
    }

    #[test]
    fn test_page_serializes_flat() {
        let page = Page::new(vec!["a", "b"], 7, &PageRequest::new(2, 4));
        let json = serde_json::to_value(&page).unwrap();

        assert_eq!(json["items"], serde_json::json!(["a", "b"]));
        assert_eq!(json["total"], 7);
        assert_eq!(json["limit"], 2);
        assert_eq!(json["offset"], 4);
    }
}
