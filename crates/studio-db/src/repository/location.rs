//! # Location Repository
//!
//! Places stock is kept. Deleting a location drops its inventory rows.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use studio_core::validation::LocationInput;
use studio_core::Location;

use super::{new_id, push_page, push_search, row_exists, value_taken, Page, PageRequest};
use crate::error::{DbError, DbResult};

const SELECT_LOCATION: &str = "SELECT id, name, is_sellable FROM locations";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationFilter {
    pub is_sellable: Option<bool>,
    pub search: Option<String>,
    pub page: PageRequest,
}

#[derive(Debug, Clone)]
pub struct LocationRepository {
    pool: SqlitePool,
}

impl LocationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LocationRepository { pool }
    }

    /// Creates a location; sellable unless told otherwise.
    pub async fn create(&self, input: &LocationInput) -> DbResult<Location> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        check_name(&mut tx, input, None).await?;
        let location = Location {
            id: new_id(),
            name: input.name.trim().to_string(),
            is_sellable: input.is_sellable.unwrap_or(true),
        };

        sqlx::query("INSERT INTO locations (id, name, is_sellable) VALUES (?1, ?2, ?3)")
            .bind(&location.id)
            .bind(&location.name)
            .bind(location.is_sellable)
            .execute(&mut *tx)
            .await
            .map_err(|e| name_conflict(e.into(), &location.name))?;

        tx.commit().await?;

        debug!(id = %location.id, name = %location.name, "Created location");
        Ok(location)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>(&format!("{SELECT_LOCATION} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(location)
    }

    pub async fn update(&self, id: &str, input: &LocationInput) -> DbResult<Location> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, Location>(&format!("{SELECT_LOCATION} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Location", id))?;

        check_name(&mut tx, input, Some(id)).await?;

        let location = Location {
            name: input.name.trim().to_string(),
            is_sellable: input.is_sellable.unwrap_or(existing.is_sellable),
            ..existing
        };

        sqlx::query("UPDATE locations SET name = ?2, is_sellable = ?3 WHERE id = ?1")
            .bind(&location.id)
            .bind(&location.name)
            .bind(location.is_sellable)
            .execute(&mut *tx)
            .await
            .map_err(|e| name_conflict(e.into(), &location.name))?;

        tx.commit().await?;

        Ok(location)
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        if !row_exists(&mut tx, "locations", id).await? {
            return Err(DbError::not_found("Location", id));
        }

        sqlx::query("DELETE FROM locations WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn list(&self, filter: &LocationFilter) -> DbResult<Page<Location>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM locations WHERE 1 = 1");
        push_filters(&mut count, filter)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_LOCATION);
        select.push(" WHERE 1 = 1");
        push_filters(&mut select, filter)?;
        select.push(" ORDER BY name");
        push_page(&mut select, &filter.page);

        let locations = select.build_query_as::<Location>().fetch_all(&self.pool).await?;

        Ok(Page::new(locations, total, &filter.page))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &LocationFilter) -> DbResult<()> {
    if let Some(sellable) = filter.is_sellable {
        qb.push(" AND is_sellable = ").push_bind(sellable);
    }
    push_search(qb, filter.search.as_deref(), &["name"])
}

async fn check_name(
    conn: &mut SqliteConnection,
    input: &LocationInput,
    exclude_id: Option<&str>,
) -> DbResult<()> {
    let name = input.name.trim();
    if value_taken(conn, "locations", "name", name, exclude_id).await? {
        return Err(DbError::duplicate("name", name));
    }
    Ok(())
}

fn name_conflict(err: DbError, name: &str) -> DbError {
    if err.is_unique_violation_on("locations.name") {
        DbError::duplicate("name", name)
    } else {
        err
    }
}
