//! # Certificate of Authenticity Repository
//!
//! Certificates outlive what they describe. Deleting the product, variant
//! or purchaser clears that reference and keeps the certificate.
//!
//! A serial number is unique per variant. Certificates without a variant
//! are not checked against each other.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;

use studio_core::validation::CoaInput;
use studio_core::{CoaCertificate, CoaView, ValidationErrors};

use super::{check_reference, new_id, push_page, push_search, row_exists, Page, PageRequest};
use crate::error::{DbError, DbResult};

const SELECT_COA: &str = "SELECT id, product_id, variant_id, serial_no, purchaser_contact_id, \
                          issued_at FROM coa_certificates";

const FROM_VIEW: &str = "FROM coa_certificates a \
                         LEFT JOIN products p ON p.id = a.product_id \
                         LEFT JOIN product_variants v ON v.id = a.variant_id \
                         LEFT JOIN contacts c ON c.id = a.purchaser_contact_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoaFilter {
    pub product_id: Option<String>,
    pub variant_id: Option<String>,
    pub purchaser_contact_id: Option<String>,
    /// Matches serial number, product title, option label and purchaser name.
    pub search: Option<String>,
    pub page: PageRequest,
}

#[derive(sqlx::FromRow)]
struct CoaRow {
    #[sqlx(flatten)]
    certificate: CoaCertificate,
    product_title: Option<String>,
    variant_label: Option<String>,
    purchaser_name: Option<String>,
}

impl From<CoaRow> for CoaView {
    fn from(row: CoaRow) -> Self {
        CoaView {
            certificate: row.certificate,
            product_title: row.product_title,
            variant_label: row.variant_label,
            purchaser_name: row.purchaser_name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoaRepository {
    pool: SqlitePool,
}

impl CoaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CoaRepository { pool }
    }

    /// Issues a certificate. `issued_at` defaults to now.
    ///
    /// ## Errors
    /// - `Validation` with `Duplicate` on `serial_no` when the variant
    ///   already has a certificate with that serial
    pub async fn create(&self, input: &CoaInput) -> DbResult<CoaCertificate> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        check_integrity(&mut tx, input, None).await?;

        let coa = CoaCertificate {
            id: new_id(),
            product_id: input.product_id().map(str::to_string),
            variant_id: input.variant_id().map(str::to_string),
            serial_no: input.serial_no.trim().to_string(),
            purchaser_contact_id: input.purchaser_contact_id().map(str::to_string),
            issued_at: input.issued_at.unwrap_or_else(Utc::now),
        };

        sqlx::query(
            r#"
            INSERT INTO coa_certificates (
                id, product_id, variant_id, serial_no, purchaser_contact_id, issued_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&coa.id)
        .bind(&coa.product_id)
        .bind(&coa.variant_id)
        .bind(&coa.serial_no)
        .bind(&coa.purchaser_contact_id)
        .bind(coa.issued_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| serial_conflict(e.into(), &coa.serial_no))?;

        tx.commit().await?;

        info!(id = %coa.id, serial_no = %coa.serial_no, "Issued certificate");
        Ok(coa)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CoaCertificate>> {
        let coa = sqlx::query_as::<_, CoaCertificate>(&format!("{SELECT_COA} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(coa)
    }

    pub async fn get_view(&self, id: &str) -> DbResult<Option<CoaView>> {
        let row = sqlx::query_as::<_, CoaRow>(&format!("{} WHERE a.id = ?1", select_view()))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(CoaView::from))
    }

    pub async fn update(&self, id: &str, input: &CoaInput) -> DbResult<CoaCertificate> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, CoaCertificate>(&format!("{SELECT_COA} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("CoaCertificate", id))?;

        check_integrity(&mut tx, input, Some(id)).await?;

        let coa = CoaCertificate {
            product_id: input.product_id().map(str::to_string),
            variant_id: input.variant_id().map(str::to_string),
            serial_no: input.serial_no.trim().to_string(),
            purchaser_contact_id: input.purchaser_contact_id().map(str::to_string),
            issued_at: input.issued_at.unwrap_or(existing.issued_at),
            ..existing
        };

        sqlx::query(
            r#"
            UPDATE coa_certificates SET
                product_id = ?2,
                variant_id = ?3,
                serial_no = ?4,
                purchaser_contact_id = ?5,
                issued_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&coa.id)
        .bind(&coa.product_id)
        .bind(&coa.variant_id)
        .bind(&coa.serial_no)
        .bind(&coa.purchaser_contact_id)
        .bind(coa.issued_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| serial_conflict(e.into(), &coa.serial_no))?;

        tx.commit().await?;

        Ok(coa)
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        if !row_exists(&mut tx, "coa_certificates", id).await? {
            return Err(DbError::not_found("CoaCertificate", id));
        }

        sqlx::query("DELETE FROM coa_certificates WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Lists certificates, most recently issued first.
    pub async fn list(&self, filter: &CoaFilter) -> DbResult<Page<CoaView>> {
        let mut count = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) {FROM_VIEW} WHERE 1 = 1"));
        push_filters(&mut count, filter)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(select_view());
        select.push(" WHERE 1 = 1");
        push_filters(&mut select, filter)?;
        select.push(" ORDER BY a.issued_at DESC, a.rowid DESC");
        push_page(&mut select, &filter.page);

        let rows = select.build_query_as::<CoaRow>().fetch_all(&self.pool).await?;

        Ok(Page::new(rows, total, &filter.page).map(CoaView::from))
    }
}

fn select_view() -> String {
    format!(
        "SELECT a.id, a.product_id, a.variant_id, a.serial_no, a.purchaser_contact_id, \
         a.issued_at, p.title AS product_title, v.option_label AS variant_label, \
         c.name AS purchaser_name {FROM_VIEW}"
    )
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &CoaFilter) -> DbResult<()> {
    if let Some(product_id) = &filter.product_id {
        qb.push(" AND a.product_id = ").push_bind(product_id.clone());
    }
    if let Some(variant_id) = &filter.variant_id {
        qb.push(" AND a.variant_id = ").push_bind(variant_id.clone());
    }
    if let Some(purchaser) = &filter.purchaser_contact_id {
        qb.push(" AND a.purchaser_contact_id = ").push_bind(purchaser.clone());
    }
    push_search(
        qb,
        filter.search.as_deref(),
        &["a.serial_no", "p.title", "v.option_label", "c.name"],
    )
}

async fn check_integrity(
    conn: &mut SqliteConnection,
    input: &CoaInput,
    exclude_id: Option<&str>,
) -> DbResult<()> {
    let mut errors = ValidationErrors::new();
    if let Some(product_id) = input.product_id() {
        check_reference(conn, &mut errors, "product_id", "products", product_id).await?;
    }
    if let Some(variant_id) = input.variant_id() {
        check_reference(conn, &mut errors, "variant_id", "product_variants", variant_id).await?;
    }
    if let Some(purchaser) = input.purchaser_contact_id() {
        check_reference(conn, &mut errors, "purchaser_contact_id", "contacts", purchaser).await?;
    }
    errors.into_result()?;

    let Some(variant_id) = input.variant_id() else {
        return Ok(());
    };

    let serial_no = input.serial_no.trim();
    let taken: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM coa_certificates \
         WHERE variant_id = ?1 AND serial_no = ?2 AND id IS NOT ?3",
    )
    .bind(variant_id)
    .bind(serial_no)
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await?;

    if taken > 0 {
        return Err(DbError::duplicate("serial_no", serial_no));
    }

    Ok(())
}

fn serial_conflict(err: DbError, serial_no: &str) -> DbError {
    if err.is_unique_violation_on("coa_certificates.serial_no") {
        DbError::duplicate("serial_no", serial_no)
    } else {
        err
    }
}
