//! # Consignment Repository
//!
//! Agreements under which a gallery sells work for a commission.
//!
//! ## Rules
//! ```text
//! gallery_contact_id   must name a contact of kind `gallery`
//! commission_rate      "40" / "40.00" → stored as 4000 basis points
//! end_date             open-ended when absent, never before start_date
//! DELETE consignment   items CASCADE
//! DELETE gallery       consignment CASCADE (and its items)
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use studio_core::validation::{require, ConsignmentInput, ConsignmentItemInput};
use studio_core::{Consignment, ConsignmentView, ContactKind, ValidationError, ValidationErrors};

use super::consignment_item::{self, views_for_consignments};
use super::{nested, new_id, push_page, push_search, Page, PageRequest};
use crate::error::{DbError, DbResult};

const SELECT_CONSIGNMENT: &str = "SELECT id, gallery_contact_id, start_date, end_date, \
                                  commission_rate_bps FROM consignments";

const SELECT_VIEW: &str = "SELECT s.id, s.gallery_contact_id, s.start_date, s.end_date, \
                           s.commission_rate_bps, c.name AS gallery_name \
                           FROM consignments s JOIN contacts c ON c.id = s.gallery_contact_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsignmentFilter {
    pub gallery_contact_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    /// Agreements running on this date: started on or before it and not
    /// yet ended.
    pub active_on: Option<NaiveDate>,
    /// Matches gallery name.
    pub search: Option<String>,
    pub page: PageRequest,
}

#[derive(sqlx::FromRow)]
struct ConsignmentRow {
    #[sqlx(flatten)]
    consignment: Consignment,
    gallery_name: String,
}

#[derive(Debug, Clone)]
pub struct ConsignmentRepository {
    pool: SqlitePool,
}

impl ConsignmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ConsignmentRepository { pool }
    }

    /// Opens a consignment with no items.
    pub async fn create(&self, input: &ConsignmentInput) -> DbResult<Consignment> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        let consignment = insert(&mut tx, new_id(), input).await?;
        tx.commit().await?;

        debug!(id = %consignment.id, gallery = %consignment.gallery_contact_id, "Created consignment");
        Ok(consignment)
    }

    /// Opens a consignment and places its items in one transaction.
    ///
    /// Item errors are keyed `items[i].field`.
    pub async fn create_with_items(
        &self,
        input: &ConsignmentInput,
        items: &[ConsignmentItemInput],
    ) -> DbResult<ConsignmentView> {
        let consignment_id = new_id();
        let items: Vec<ConsignmentItemInput> = items
            .iter()
            .map(|item| ConsignmentItemInput {
                consignment_id: consignment_id.clone(),
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

        let consignment = insert(&mut tx, consignment_id, input).await?;
        for (i, item) in items.iter().enumerate() {
            consignment_item::insert(&mut tx, item)
                .await
                .map_err(|e| nested(e, &format!("items[{i}]")))?;
        }

        tx.commit().await?;

        info!(
            id = %consignment.id,
            items = items.len(),
            commission = %consignment.commission_rate(),
            "Created consignment with items"
        );

        self.get_view(&consignment.id)
            .await?
            .ok_or_else(|| DbError::not_found("Consignment", consignment.id))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Consignment>> {
        let consignment =
            sqlx::query_as::<_, Consignment>(&format!("{SELECT_CONSIGNMENT} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(consignment)
    }

    /// Gets a consignment with gallery name, formatted rate and items.
    pub async fn get_view(&self, id: &str) -> DbResult<Option<ConsignmentView>> {
        let Some(row) =
            sqlx::query_as::<_, ConsignmentRow>(&format!("{SELECT_VIEW} WHERE s.id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let mut items = views_for_consignments(&self.pool, &[row.consignment.id.clone()]).await?;
        let items = items.remove(&row.consignment.id).unwrap_or_default();

        Ok(Some(ConsignmentView::new(row.consignment, row.gallery_name, items)))
    }

    pub async fn update(&self, id: &str, input: &ConsignmentInput) -> DbResult<Consignment> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let existing =
            sqlx::query_as::<_, Consignment>(&format!("{SELECT_CONSIGNMENT} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Consignment", id))?;

        check_gallery(&mut tx, &input.gallery_contact_id).await?;

        let consignment = build(existing.id, input)?;

        sqlx::query(
            r#"
            UPDATE consignments SET
                gallery_contact_id = ?2,
                start_date = ?3,
                end_date = ?4,
                commission_rate_bps = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&consignment.id)
        .bind(&consignment.gallery_contact_id)
        .bind(consignment.start_date)
        .bind(consignment.end_date)
        .bind(consignment.commission_rate_bps)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(consignment)
    }

    /// Deletes a consignment and its items.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM consignments WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Consignment", id));
        }

        Ok(())
    }

    /// Lists consignments, latest start first.
    pub async fn list(&self, filter: &ConsignmentFilter) -> DbResult<Page<ConsignmentView>> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM consignments s JOIN contacts c ON c.id = s.gallery_contact_id \
             WHERE 1 = 1",
        );
        push_filters(&mut count, filter)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_VIEW);
        select.push(" WHERE 1 = 1");
        push_filters(&mut select, filter)?;
        select.push(" ORDER BY s.start_date DESC, s.rowid DESC");
        push_page(&mut select, &filter.page);

        let rows = select.build_query_as::<ConsignmentRow>().fetch_all(&self.pool).await?;

        let ids: Vec<String> = rows.iter().map(|r| r.consignment.id.clone()).collect();
        let mut items = views_for_consignments(&self.pool, &ids).await?;

        Ok(Page::new(rows, total, &filter.page).map(|row| {
            let lines = items.remove(&row.consignment.id).unwrap_or_default();
            ConsignmentView::new(row.consignment, row.gallery_name, lines)
        }))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ConsignmentFilter) -> DbResult<()> {
    if let Some(gallery) = &filter.gallery_contact_id {
        qb.push(" AND s.gallery_contact_id = ").push_bind(gallery.clone());
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND s.start_date = ").push_bind(start);
    }
    if let Some(day) = filter.active_on {
        qb.push(" AND s.start_date <= ")
            .push_bind(day)
            .push(" AND (s.end_date IS NULL OR s.end_date >= ")
            .push_bind(day)
            .push(")");
    }
    push_search(qb, filter.search.as_deref(), &["c.name"])
}

fn build(id: String, input: &ConsignmentInput) -> DbResult<Consignment> {
    Ok(Consignment {
        id,
        gallery_contact_id: input.gallery_contact_id.clone(),
        start_date: require("start_date", input.start_date)?,
        end_date: input.end_date,
        commission_rate_bps: input.commission_rate()?.bps(),
    })
}

/// The contact must exist and be a gallery.
async fn check_gallery(conn: &mut SqliteConnection, contact_id: &str) -> DbResult<()> {
    let kind: Option<ContactKind> = sqlx::query_scalar("SELECT kind FROM contacts WHERE id = ?1")
        .bind(contact_id)
        .fetch_optional(&mut *conn)
        .await?;

    match kind {
        Some(ContactKind::Gallery) => Ok(()),
        Some(_) => Err(ValidationError::NotAllowed {
            field: "gallery_contact_id".to_string(),
            allowed: vec![ContactKind::Gallery.as_str().to_string()],
        }
        .into()),
        None => Err(ValidationError::UnknownReference {
            field: "gallery_contact_id".to_string(),
            id: contact_id.to_string(),
        }
        .into()),
    }
}

async fn insert(conn: &mut SqliteConnection, id: String, input: &ConsignmentInput) -> DbResult<Consignment> {
    check_gallery(conn, &input.gallery_contact_id).await?;

    let consignment = build(id, input)?;

    sqlx::query(
        r#"
        INSERT INTO consignments (id, gallery_contact_id, start_date, end_date, commission_rate_bps)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&consignment.id)
    .bind(&consignment.gallery_contact_id)
    .bind(consignment.start_date)
    .bind(consignment.end_date)
    .bind(consignment.commission_rate_bps)
    .execute(&mut *conn)
    .await?;

    Ok(consignment)
}
