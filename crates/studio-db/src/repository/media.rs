//! # Media Repository
//!
//! Product images. Rows are removed with their product.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use studio_core::validation::{require, MediaInput};
use studio_core::{Media, MediaKind, MediaView, ValidationErrors};

use super::{check_reference, new_id, push_page, push_search, row_exists, Page, PageRequest};
use crate::error::{DbError, DbResult};

const SELECT_MEDIA: &str = "SELECT id, product_id, kind, image, alt_text FROM media";

const SELECT_VIEW: &str = "SELECT m.id, m.product_id, m.kind, m.image, m.alt_text, \
                           p.title AS product_title \
                           FROM media m JOIN products p ON p.id = m.product_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaFilter {
    pub product_id: Option<String>,
    pub kind: Option<MediaKind>,
    /// Matches alt text and product title.
    pub search: Option<String>,
    pub page: PageRequest,
}

#[derive(sqlx::FromRow)]
struct MediaRow {
    #[sqlx(flatten)]
    media: Media,
    product_title: String,
}

/// Repository for product images.
#[derive(Debug, Clone)]
pub struct MediaRepository {
    pool: SqlitePool,
    media_base_url: Option<String>,
}

impl MediaRepository {
    pub fn new(pool: SqlitePool, media_base_url: Option<String>) -> Self {
        MediaRepository {
            pool,
            media_base_url,
        }
    }

    pub async fn create(&self, input: &MediaInput) -> DbResult<Media> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        let media = insert(&mut tx, input).await?;
        tx.commit().await?;

        debug!(id = %media.id, product_id = %media.product_id, "Created media");
        Ok(media)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Media>> {
        let media = sqlx::query_as::<_, Media>(&format!("{SELECT_MEDIA} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(media)
    }

    pub async fn get_view(&self, id: &str) -> DbResult<Option<MediaView>> {
        let row = sqlx::query_as::<_, MediaRow>(&format!("{SELECT_VIEW} WHERE m.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| self.view(r)))
    }

    pub async fn update(&self, id: &str, input: &MediaInput) -> DbResult<Media> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        if !row_exists(&mut tx, "media", id).await? {
            return Err(DbError::not_found("Media", id));
        }
        check_integrity(&mut tx, input).await?;

        let media = build(id.to_string(), input)?;

        sqlx::query(
            "UPDATE media SET product_id = ?2, kind = ?3, image = ?4, alt_text = ?5 WHERE id = ?1",
        )
        .bind(&media.id)
        .bind(&media.product_id)
        .bind(media.kind)
        .bind(&media.image)
        .bind(&media.alt_text)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(media)
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM media WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Media", id));
        }

        Ok(())
    }

    pub async fn list(&self, filter: &MediaFilter) -> DbResult<Page<MediaView>> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM media m JOIN products p ON p.id = m.product_id WHERE 1 = 1",
        );
        push_filters(&mut count, filter)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_VIEW);
        select.push(" WHERE 1 = 1");
        push_filters(&mut select, filter)?;
        select.push(" ORDER BY p.title, m.rowid");
        push_page(&mut select, &filter.page);

        let rows = select.build_query_as::<MediaRow>().fetch_all(&self.pool).await?;

        Ok(Page::new(rows, total, &filter.page).map(|r| self.view(r)))
    }

    fn view(&self, row: MediaRow) -> MediaView {
        MediaView::new(row.media, row.product_title, self.media_base_url.as_deref())
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &MediaFilter) -> DbResult<()> {
    if let Some(product_id) = &filter.product_id {
        qb.push(" AND m.product_id = ").push_bind(product_id.clone());
    }
    if let Some(kind) = filter.kind {
        qb.push(" AND m.kind = ").push_bind(kind);
    }
    push_search(qb, filter.search.as_deref(), &["m.alt_text", "p.title"])
}

fn build(id: String, input: &MediaInput) -> DbResult<Media> {
    Ok(Media {
        id,
        product_id: input.product_id.clone(),
        kind: require("kind", input.kind)?,
        image: input.image.clone(),
        alt_text: input.alt_text.clone(),
    })
}

async fn check_integrity(conn: &mut SqliteConnection, input: &MediaInput) -> DbResult<()> {
    let mut errors = ValidationErrors::new();
    check_reference(conn, &mut errors, "product_id", "products", &input.product_id).await?;
    errors.into_result()?;
    Ok(())
}

/// Inserts a validated media row.
pub(crate) async fn insert(conn: &mut SqliteConnection, input: &MediaInput) -> DbResult<Media> {
    check_integrity(conn, input).await?;

    let media = build(new_id(), input)?;

    sqlx::query(
        "INSERT INTO media (id, product_id, kind, image, alt_text) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&media.id)
    .bind(&media.product_id)
    .bind(media.kind)
    .bind(&media.image)
    .bind(&media.alt_text)
    .execute(&mut *conn)
    .await?;

    Ok(media)
}
