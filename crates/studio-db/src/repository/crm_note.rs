//! # CRM Note Repository
//!
//! Free-text notes attached to a contact, newest first.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use studio_core::validation::CrmNoteInput;
use studio_core::{CrmNote, CrmNoteView, ValidationErrors};

use super::{check_reference, new_id, push_page, push_search, row_exists, Page, PageRequest};
use crate::error::{DbError, DbResult};

const SELECT_NOTE: &str = "SELECT id, contact_id, note, created_at FROM crm_notes";

const SELECT_VIEW: &str = "SELECT n.id, n.contact_id, n.note, n.created_at, \
                           c.name AS contact_name \
                           FROM crm_notes n JOIN contacts c ON c.id = n.contact_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrmNoteFilter {
    pub contact_id: Option<String>,
    /// Matches note text and contact name.
    pub search: Option<String>,
    pub page: PageRequest,
}

#[derive(sqlx::FromRow)]
struct CrmNoteRow {
    #[sqlx(flatten)]
    note: CrmNote,
    contact_name: String,
}

impl From<CrmNoteRow> for CrmNoteView {
    fn from(row: CrmNoteRow) -> Self {
        CrmNoteView {
            note: row.note,
            contact_name: row.contact_name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrmNoteRepository {
    pool: SqlitePool,
}

impl CrmNoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CrmNoteRepository { pool }
    }

    /// Adds a note. `created_at` defaults to now.
    pub async fn create(&self, input: &CrmNoteInput) -> DbResult<CrmNote> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        check_integrity(&mut tx, input).await?;

        let note = CrmNote {
            id: new_id(),
            contact_id: input.contact_id.clone(),
            note: input.note.clone(),
            created_at: input.created_at.unwrap_or_else(Utc::now),
        };

        sqlx::query("INSERT INTO crm_notes (id, contact_id, note, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&note.id)
            .bind(&note.contact_id)
            .bind(&note.note)
            .bind(note.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(note)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CrmNote>> {
        let note = sqlx::query_as::<_, CrmNote>(&format!("{SELECT_NOTE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(note)
    }

    pub async fn get_view(&self, id: &str) -> DbResult<Option<CrmNoteView>> {
        let row = sqlx::query_as::<_, CrmNoteRow>(&format!("{SELECT_VIEW} WHERE n.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(CrmNoteView::from))
    }

    /// Rewrites the text or moves the note to another contact. A missing
    /// `created_at` keeps the stored timestamp.
    pub async fn update(&self, id: &str, input: &CrmNoteInput) -> DbResult<CrmNote> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, CrmNote>(&format!("{SELECT_NOTE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("CrmNote", id))?;

        check_integrity(&mut tx, input).await?;

        let note = CrmNote {
            contact_id: input.contact_id.clone(),
            note: input.note.clone(),
            created_at: input.created_at.unwrap_or(existing.created_at),
            ..existing
        };

        sqlx::query("UPDATE crm_notes SET contact_id = ?2, note = ?3, created_at = ?4 WHERE id = ?1")
            .bind(&note.id)
            .bind(&note.contact_id)
            .bind(&note.note)
            .bind(note.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(note)
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        if !row_exists(&mut tx, "crm_notes", id).await? {
            return Err(DbError::not_found("CrmNote", id));
        }

        sqlx::query("DELETE FROM crm_notes WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Lists notes, newest first.
    pub async fn list(&self, filter: &CrmNoteFilter) -> DbResult<Page<CrmNoteView>> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM crm_notes n JOIN contacts c ON c.id = n.contact_id WHERE 1 = 1",
        );
        push_filters(&mut count, filter)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_VIEW);
        select.push(" WHERE 1 = 1");
        push_filters(&mut select, filter)?;
        select.push(" ORDER BY n.created_at DESC, n.rowid DESC");
        push_page(&mut select, &filter.page);

        let rows = select.build_query_as::<CrmNoteRow>().fetch_all(&self.pool).await?;

        Ok(Page::new(rows, total, &filter.page).map(CrmNoteView::from))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &CrmNoteFilter) -> DbResult<()> {
    if let Some(contact_id) = &filter.contact_id {
        qb.push(" AND n.contact_id = ").push_bind(contact_id.clone());
    }
    push_search(qb, filter.search.as_deref(), &["n.note", "c.name"])
}

async fn check_integrity(conn: &mut SqliteConnection, input: &CrmNoteInput) -> DbResult<()> {
    let mut errors = ValidationErrors::new();
    check_reference(conn, &mut errors, "contact_id", "contacts", &input.contact_id).await?;
    errors.into_result()?;
    Ok(())
}
