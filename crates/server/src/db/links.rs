//! Admin link repository.

use chrono::{DateTime, Utc};
use shoper_search_core::{AdminLink, LinkId, OpenType};
use sqlx::PgPool;
use sqlx::types::Json;

use super::RepositoryError;

/// Optional equality filters for [`AdminLinkRepository::list`].
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct LinkFilter {
    pub placement: Option<String>,
    pub object: Option<String>,
    pub action: Option<String>,
}

/// Internal row type for `PostgreSQL` queries.
#[derive(sqlx::FromRow)]
struct AdminLinkRow {
    id: String,
    name: String,
    url: String,
    object: Option<String>,
    action: Option<String>,
    placement: Option<String>,
    open_type: String,
    permissions: Json<Vec<String>>,
    scope: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AdminLinkRow> for AdminLink {
    type Error = RepositoryError;

    fn try_from(row: AdminLinkRow) -> Result<Self, Self::Error> {
        let open_type: OpenType = row
            .open_type
            .parse()
            .map_err(|e| RepositoryError::DataCorruption(format!("admin link {}: {e}", row.id)))?;

        Ok(Self {
            id: LinkId::from(row.id),
            name: row.name,
            url: row.url,
            object: row.object,
            action: row.action,
            placement: row.placement,
            open_type,
            permissions: row.permissions.0,
            scope: row.scope,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = r"
    SELECT id, name, url, object, action, placement, open_type, permissions, scope,
           created_at, updated_at
    FROM app.admin_links
";

/// Repository for admin link database operations.
pub struct AdminLinkRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminLinkRepository<'a> {
    /// Create a new admin link repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List links matching the filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &LinkFilter) -> Result<Vec<AdminLink>, RepositoryError> {
        let sql = format!(
            "{SELECT_COLUMNS}
            WHERE ($1::text IS NULL OR placement = $1)
              AND ($2::text IS NULL OR object = $2)
              AND ($3::text IS NULL OR action = $3)
            ORDER BY created_at DESC"
        );

        let rows = sqlx::query_as::<_, AdminLinkRow>(&sql)
            .bind(filter.placement.as_deref())
            .bind(filter.object.as_deref())
            .bind(filter.action.as_deref())
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(AdminLink::try_from).collect()
    }

    /// Get a link by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: &LinkId) -> Result<Option<AdminLink>, RepositoryError> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = $1");

        let row = sqlx::query_as::<_, AdminLinkRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(self.pool)
            .await?;

        row.map(AdminLink::try_from).transpose()
    }

    /// Insert a new link.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the ID already exists.
    pub async fn create(&self, link: &AdminLink) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO app.admin_links
                (id, name, url, object, action, placement, open_type, permissions, scope,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(link.id.as_str())
        .bind(&link.name)
        .bind(&link.url)
        .bind(link.object.as_deref())
        .bind(link.action.as_deref())
        .bind(link.placement.as_deref())
        .bind(link.open_type.as_str())
        .bind(Json(&link.permissions))
        .bind(link.scope.as_deref())
        .bind(link.created_at)
        .bind(link.updated_at)
        .execute(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;

        Ok(())
    }

    /// Replace every field of a stored link. Returns `false` if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update(&self, link: &AdminLink) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE app.admin_links SET
                name = $2, url = $3, object = $4, action = $5, placement = $6,
                open_type = $7, permissions = $8, scope = $9, updated_at = $10
            WHERE id = $1
            ",
        )
        .bind(link.id.as_str())
        .bind(&link.name)
        .bind(&link.url)
        .bind(link.object.as_deref())
        .bind(link.action.as_deref())
        .bind(link.placement.as_deref())
        .bind(link.open_type.as_str())
        .bind(Json(&link.permissions))
        .bind(link.scope.as_deref())
        .bind(link.updated_at)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a link. Returns `false` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: &LinkId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM app.admin_links WHERE id = $1")
            .bind(id.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of stored links.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app.admin_links")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
