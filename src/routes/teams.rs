use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::models::DashboardSummary;
use crate::db::DashboardRepository;
use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::routes::DataResponse;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:id/dashboards", get(list_team_dashboards))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Listing projection: the data payload is deliberately omitted.
#[derive(Debug, Serialize)]
pub struct TeamDashboardResponse {
    pub id: String,
    pub title: String,
    pub created: NaiveDateTime,
    pub updated: NaiveDateTime,
}

impl From<DashboardSummary> for TeamDashboardResponse {
    fn from(d: DashboardSummary) -> Self {
        Self {
            id: d.id,
            title: d.title,
            created: d.created_at,
            updated: d.updated_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// List the dashboards a team owns. A team that owns nothing (or doesn't
/// exist) yields an empty array.
async fn list_team_dashboards(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Path(team_id): Path<i64>,
) -> AppResult<Json<DataResponse<Vec<TeamDashboardResponse>>>> {
    let dashboards = DashboardRepository::list_by_team(&state.db, team_id).await?;
    let resp: Vec<TeamDashboardResponse> = dashboards.into_iter().map(Into::into).collect();

    Ok(Json(DataResponse::new(resp)))
}
