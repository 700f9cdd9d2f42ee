use chrono::NaiveDateTime;
use sqlx::Row;
use sqlx::SqlitePool;

use crate::db::models::{Dashboard, DashboardSummary};
use crate::error::{AppError, AppResult};

pub struct DashboardRepository;

impl DashboardRepository {
    /// Insert a freshly minted dashboard. A duplicate id surfaces as a
    /// conflict instead of a generic database error.
    pub async fn insert(pool: &SqlitePool, dashboard: &Dashboard) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO dashboards (id, title, owned_by, created_by, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&dashboard.id)
        .bind(&dashboard.title)
        .bind(dashboard.owned_by)
        .bind(dashboard.created_by)
        .bind(&dashboard.data)
        .bind(dashboard.created_at)
        .bind(dashboard.updated_at)
        .execute(pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                AppError::Conflict("dashboard id already exists".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(())
    }

    /// Update title/data/updated_at only; ownership and creation metadata
    /// never change through this path. An id matching zero rows is not an
    /// error.
    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        title: &str,
        data: &str,
        updated_at: NaiveDateTime,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE dashboards
            SET title = ?, data = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(title)
        .bind(data)
        .bind(updated_at)
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Dashboard>> {
        sqlx::query_as::<_, Dashboard>(
            r#"
            SELECT id, title, owned_by, created_by, data, created_at, updated_at
            FROM dashboards
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// The team a dashboard currently belongs to.
    pub async fn find_owner(pool: &SqlitePool, id: &str) -> AppResult<Option<i64>> {
        let row = sqlx::query("SELECT owned_by FROM dashboards WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row.map(|r| r.get("owned_by")))
    }

    pub async fn update_owner(pool: &SqlitePool, id: &str, owned_by: i64) -> AppResult<()> {
        sqlx::query("UPDATE dashboards SET owned_by = ? WHERE id = ?")
            .bind(owned_by)
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Delete by id. Deleting an id that doesn't exist is a no-op, not an
    /// error.
    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM dashboards WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// All dashboards owned by a team, without the data payload. Storage
    /// order; no ORDER BY is imposed.
    pub async fn list_by_team(pool: &SqlitePool, team_id: i64) -> AppResult<Vec<DashboardSummary>> {
        sqlx::query_as::<_, DashboardSummary>(
            r#"
            SELECT id, title, created_at, updated_at
            FROM dashboards
            WHERE owned_by = ?
            "#,
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
