//! # Contact Repository
//!
//! Collectors, galleries, vendors and staff.
//!
//! ## Delete Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DELETE contact                                                        │
//! │    ├── crm_notes                     CASCADE                           │
//! │    ├── consignments (as gallery)     CASCADE  (and their items)        │
//! │    ├── orders.buyer_contact_id       SET NULL                          │
//! │    └── coa_certificates.purchaser    SET NULL                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Emails are unique when present. A blank email is stored as NULL, so any
//! number of contacts may have none.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use studio_core::validation::{require, ContactInput};
use studio_core::{Contact, ContactKind, ValidationError};

use super::{
    count_references, new_id, push_page, push_search, row_exists, value_taken, Page, PageRequest,
};
use crate::error::{DbError, DbResult};

const SELECT_CONTACT: &str = "SELECT id, kind, name, email, phone, notes FROM contacts";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactFilter {
    pub kind: Option<ContactKind>,
    /// Matches name, email, phone and notes.
    pub search: Option<String>,
    pub page: PageRequest,
}

#[derive(Debug, Clone)]
pub struct ContactRepository {
    pool: SqlitePool,
}

impl ContactRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ContactRepository { pool }
    }

    /// Creates a contact.
    ///
    /// ## Errors
    /// - `Validation` with `Duplicate` on `email` when another contact has it
    pub async fn create(&self, input: &ContactInput) -> DbResult<Contact> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        check_email(&mut tx, input, None).await?;
        let contact = build(new_id(), input)?;

        sqlx::query(
            r#"
            INSERT INTO contacts (id, kind, name, email, phone, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&contact.id)
        .bind(contact.kind)
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.notes)
        .execute(&mut *tx)
        .await
        .map_err(|e| email_conflict(e.into(), &contact))?;

        tx.commit().await?;

        debug!(id = %contact.id, kind = %contact.kind, "Created contact");
        Ok(contact)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(&format!("{SELECT_CONTACT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(contact)
    }

    /// Looks a contact up by email, ignoring surrounding whitespace.
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(&format!("{SELECT_CONTACT} WHERE email = ?1"))
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(contact)
    }

    /// Updates a contact.
    ///
    /// ## Errors
    /// - `Validation` with `Duplicate` on `email` when another contact has it
    /// - `Validation` with `NotAllowed` on `kind` when a gallery that still
    ///   holds consignments is changed to another kind
    pub async fn update(&self, id: &str, input: &ContactInput) -> DbResult<Contact> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        if !row_exists(&mut tx, "contacts", id).await? {
            return Err(DbError::not_found("Contact", id));
        }
        check_email(&mut tx, input, Some(id)).await?;

        let contact = build(id.to_string(), input)?;
        check_gallery_kind(&mut tx, &contact).await?;

        sqlx::query(
            r#"
            UPDATE contacts SET
                kind = ?2,
                name = ?3,
                email = ?4,
                phone = ?5,
                notes = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&contact.id)
        .bind(contact.kind)
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.notes)
        .execute(&mut *tx)
        .await
        .map_err(|e| email_conflict(e.into(), &contact))?;

        tx.commit().await?;

        Ok(contact)
    }

    /// Deletes a contact along with its notes and consignments. Orders and
    /// certificates keep their rows with the contact reference cleared.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting contact");

        let result = sqlx::query("DELETE FROM contacts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Contact", id));
        }

        Ok(())
    }

    /// Lists contacts ordered by name.
    pub async fn list(&self, filter: &ContactFilter) -> DbResult<Page<Contact>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM contacts WHERE 1 = 1");
        push_filters(&mut count, filter)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_CONTACT);
        select.push(" WHERE 1 = 1");
        push_filters(&mut select, filter)?;
        select.push(" ORDER BY name, id");
        push_page(&mut select, &filter.page);

        let contacts = select.build_query_as::<Contact>().fetch_all(&self.pool).await?;

        Ok(Page::new(contacts, total, &filter.page))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ContactFilter) -> DbResult<()> {
    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ").push_bind(kind);
    }
    push_search(qb, filter.search.as_deref(), &["name", "email", "phone", "notes"])
}

fn build(id: String, input: &ContactInput) -> DbResult<Contact> {
    Ok(Contact {
        id,
        kind: require("kind", input.kind)?,
        name: input.name.trim().to_string(),
        email: input.normalized_email().map(str::to_string),
        phone: input.phone.clone(),
        notes: input.notes.clone(),
    })
}

async fn check_email(
    conn: &mut SqliteConnection,
    input: &ContactInput,
    exclude_id: Option<&str>,
) -> DbResult<()> {
    if let Some(email) = input.normalized_email() {
        if value_taken(conn, "contacts", "email", email, exclude_id).await? {
            return Err(DbError::duplicate("email", email));
        }
    }
    Ok(())
}

/// Consignments must keep pointing at a gallery.
async fn check_gallery_kind(conn: &mut SqliteConnection, contact: &Contact) -> DbResult<()> {
    if contact.kind == ContactKind::Gallery {
        return Ok(());
    }
    if count_references(conn, "consignments", "gallery_contact_id", &contact.id).await? > 0 {
        return Err(ValidationError::NotAllowed {
            field: "kind".to_string(),
            allowed: vec![ContactKind::Gallery.as_str().to_string()],
        }
        .into());
    }
    Ok(())
}

fn email_conflict(err: DbError, contact: &Contact) -> DbError {
    match (&contact.email, err.is_unique_violation_on("contacts.email")) {
        (Some(email), true) => DbError::duplicate("email", email.as_str()),
        _ => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use chrono::Utc;
    use studio_core::validation::{CoaInput, OrderInput};

    fn collector(name: &str, email: Option<&str>) -> ContactInput {
        ContactInput {
            kind: Some(ContactKind::Collector),
            name: name.to_string(),
            email: email.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = test_db().await;
        db.contacts()
            .create(&collector("Ada", Some("ada@example.com")))
            .await
            .unwrap();

        let err = db
            .contacts()
            .create(&collector("Ada Again", Some(" ada@example.com ")))
            .await
            .unwrap_err();
        assert!(matches!(
            err.validation_errors().unwrap().get("email"),
            Some(ValidationError::Duplicate { .. })
        ));

        let page = db.contacts().list(&ContactFilter::default()).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_blank_emails_never_collide() {
        let db = test_db().await;
        let first = db.contacts().create(&collector("Ada", Some("  "))).await.unwrap();
        db.contacts().create(&collector("Grace", Some(""))).await.unwrap();
        db.contacts().create(&collector("Hedy", None)).await.unwrap();

        assert_eq!(first.email, None);
        let page = db.contacts().list(&ContactFilter::default()).await.unwrap();
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_update_keeps_own_email() {
        let db = test_db().await;
        let ada = db
            .contacts()
            .create(&collector("Ada", Some("ada@example.com")))
            .await
            .unwrap();
        db.contacts()
            .create(&collector("Grace", Some("grace@example.com")))
            .await
            .unwrap();

        let renamed = db
            .contacts()
            .update(&ada.id, &collector("Ada Lovelace", Some("ada@example.com")))
            .await
            .unwrap();
        assert_eq!(renamed.name, "Ada Lovelace");

        let err = db
            .contacts()
            .update(&ada.id, &collector("Ada", Some("grace@example.com")))
            .await
            .unwrap_err();
        assert!(err.validation_errors().unwrap().has("email"));

        let found = db.contacts().get_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(found.name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_delete_clears_buyer_and_purchaser() {
        let db = test_db().await;
        let ada = contact(&db, ContactKind::Collector, "Ada").await;

        let sold = db
            .orders()
            .create(&OrderInput {
                buyer_contact_id: Some(ada.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        let coa = db
            .coas()
            .create(&CoaInput {
                serial_no: "1/10".to_string(),
                purchaser_contact_id: Some(ada.id.clone()),
                issued_at: Some(Utc::now()),
                ..Default::default()
            })
            .await
            .unwrap();

        db.contacts().delete(&ada.id).await.unwrap();

        let sold = db.orders().get_by_id(&sold.id).await.unwrap().unwrap();
        assert_eq!(sold.buyer_contact_id, None);
        let coa = db.coas().get_by_id(&coa.id).await.unwrap().unwrap();
        assert_eq!(coa.purchaser_contact_id, None);
    }

    #[tokio::test]
    async fn test_delete_gallery_cascades_consignments() {
        let db = test_db().await;
        let gallery = contact(&db, ContactKind::Gallery, "Harbor Gallery").await;
        let held = consignment(&db, &gallery.id).await;

        db.contacts().delete(&gallery.id).await.unwrap();

        assert!(db.consignments().get_by_id(&held.id).await.unwrap().is_none());
        assert!(matches!(
            db.contacts().delete(&gallery.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_gallery_with_consignments_keeps_its_kind() {
        let db = test_db().await;
        let gallery = contact(&db, ContactKind::Gallery, "Harbor Gallery").await;
        let held = consignment(&db, &gallery.id).await;

        let as_collector = ContactInput {
            kind: Some(ContactKind::Collector),
            name: "Harbor Gallery".to_string(),
            ..Default::default()
        };
        let err = db.contacts().update(&gallery.id, &as_collector).await.unwrap_err();
        assert!(matches!(
            err.validation_errors().unwrap().get("kind"),
            Some(ValidationError::NotAllowed { allowed, .. }) if allowed == &["gallery".to_string()]
        ));
        let stored = db.contacts().get_by_id(&gallery.id).await.unwrap().unwrap();
        assert_eq!(stored.kind, ContactKind::Gallery);

        // renaming without changing kind is fine
        let renamed = db
            .contacts()
            .update(
                &gallery.id,
                &ContactInput {
                    kind: Some(ContactKind::Gallery),
                    name: "Harborview".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Harborview");

        db.consignments().delete(&held.id).await.unwrap();
        let changed = db.contacts().update(&gallery.id, &as_collector).await.unwrap();
        assert_eq!(changed.kind, ContactKind::Collector);
    }

    #[tokio::test]
    async fn test_list_filters_by_kind_and_search() {
        let db = test_db().await;
        contact(&db, ContactKind::Gallery, "Harbor Gallery").await;
        contact(&db, ContactKind::Collector, "Ada").await;
        db.contacts()
            .create(&collector("Grace", Some("grace@harbor.example")))
            .await
            .unwrap();

        let page = db
            .contacts()
            .list(&ContactFilter {
                search: Some("harbor".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].name, "Grace");

        let page = db
            .contacts()
            .list(&ContactFilter {
                kind: Some(ContactKind::Gallery),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }
}
