//! Team-level management permission checks.

use sqlx::SqlitePool;

use crate::db::models::User;
use crate::db::TeamRepository;
use crate::error::AppResult;

pub struct PermissionService;

impl PermissionService {
    /// Whether `user` may manage resources owned by `team_id`: instance
    /// admins may manage every team, everyone else needs the admin role
    /// inside that team.
    pub async fn can_manage_team(pool: &SqlitePool, user: &User, team_id: i64) -> AppResult<bool> {
        if user.role.is_admin() {
            return Ok(true);
        }

        TeamRepository::is_team_admin(pool, team_id, user.id).await
    }
}
