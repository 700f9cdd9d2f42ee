use chrono::Utc;
use sqlx::Row;
use sqlx::SqlitePool;

use crate::db::models::Team;
use crate::error::{AppError, AppResult};

pub struct TeamRepository;

impl TeamRepository {
    pub async fn create(pool: &SqlitePool, name: &str) -> AppResult<Team> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            INSERT INTO teams (name, created_at, updated_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Team {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> AppResult<Option<Team>> {
        sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, created_at, updated_at
            FROM teams
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn add_member(
        pool: &SqlitePool,
        team_id: i64,
        user_id: i64,
        role: &str,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO team_members (team_id, user_id, role, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Whether the user holds the admin role inside this team.
    pub async fn is_team_admin(pool: &SqlitePool, team_id: i64, user_id: i64) -> AppResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n
            FROM team_members
            WHERE team_id = ? AND user_id = ? AND role = 'admin'
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        let n: i64 = row.get("n");
        Ok(n > 0)
    }
}
