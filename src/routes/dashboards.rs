use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::{Dashboard, HOME_DASHBOARD_ID};
use crate::db::{DashboardRepository, TeamRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::routes::DataResponse;
use crate::services::permissions::PermissionService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(save_dashboard))
        .route("/owner", post(update_owner))
        .route("/:id", get(get_dashboard).delete(delete_dashboard))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDashboardRequest {
    /// Absent (or empty) id means create; the server mints one.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub owned_by: i64,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOwnerRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub owned_by: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub id: String,
    pub title: String,
    pub owned_by: i64,
    pub created_by: i64,
    pub data: Value,
    pub created: NaiveDateTime,
    pub updated: NaiveDateTime,
    pub editable: bool,
}

impl DashboardResponse {
    fn from_record(dash: Dashboard) -> AppResult<Self> {
        let data = serde_json::from_str(&dash.data).map_err(|e| {
            AppError::Internal(anyhow::anyhow!(
                "decode data of dashboard {}: {}",
                dash.id,
                e
            ))
        })?;

        Ok(Self {
            id: dash.id,
            title: dash.title,
            owned_by: dash.owned_by,
            created_by: dash.created_by,
            data,
            created: dash.created_at,
            updated: dash.updated_at,
            editable: false,
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create or update a dashboard. Without an id a new dashboard is minted;
/// with one, title/data are updated in place. Either way the caller must be
/// able to manage the owning team.
async fn save_dashboard(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<Value>,
) -> AppResult<Json<DataResponse<String>>> {
    let payload: SaveDashboardRequest = serde_json::from_value(body).map_err(|e| {
        tracing::warn!("invalid request in saving dashboard: {}", e);
        AppError::BadRequest("invalid dashboard payload".to_string())
    })?;

    if !PermissionService::can_manage_team(&state.db, &user, payload.owned_by).await? {
        return Err(AppError::Forbidden);
    }

    let data = serde_json::to_string(&payload.data).map_err(|e| {
        tracing::warn!("encode dashboard data error: {}", e);
        AppError::BadRequest("invalid dashboard data".to_string())
    })?;

    let now = Utc::now().naive_utc();
    let id = payload.id.filter(|id| !id.is_empty());

    let id = match id {
        None => {
            let id = new_dashboard_id();
            let dashboard = Dashboard {
                id: id.clone(),
                title: payload.title,
                owned_by: payload.owned_by,
                created_by: user.id,
                data,
                created_at: now,
                updated_at: now,
            };
            DashboardRepository::insert(&state.db, &dashboard).await?;
            id
        }
        Some(id) => {
            // Last writer wins; an id that no longer exists updates zero
            // rows and still reports success.
            DashboardRepository::update(&state.db, &id, &payload.title, &data, now).await?;
            id
        }
    };

    Ok(Json(DataResponse::new(id)))
}

/// Fetch a dashboard by id. The returned representation is always marked
/// editable; the flag is a server-side hint and is not derived from the
/// caller's permissions.
async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<DashboardResponse>>> {
    let dash = DashboardRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("dashboard id `{}` not found", id)))?;

    let mut resp = DashboardResponse::from_record(dash)?;
    resp.editable = true;

    Ok(Json(DataResponse::new(resp)))
}

/// Delete a dashboard. The home dashboard is protected; everything else is
/// deleted unconditionally for any authenticated caller, and deleting an id
/// that doesn't exist is still a success.
async fn delete_dashboard(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<()>>> {
    if id.trim().is_empty() {
        return Err(AppError::BadRequest("dashboard id is required".to_string()));
    }

    if id == HOME_DASHBOARD_ID {
        return Err(AppError::BadRequest(
            "home dashboard can not be deleted".to_string(),
        ));
    }

    DashboardRepository::delete(&state.db, &id).await?;

    Ok(Json(DataResponse::new(())))
}

/// Transfer a dashboard to another team. The target team must exist, and the
/// caller must be able to manage the team the dashboard currently belongs to.
async fn update_owner(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<Value>,
) -> AppResult<Json<DataResponse<()>>> {
    let payload: UpdateOwnerRequest = serde_json::from_value(body).map_err(|e| {
        tracing::warn!("invalid request in updating dashboard owner: {}", e);
        AppError::BadRequest("invalid transfer payload".to_string())
    })?;

    if payload.id.is_empty() || payload.owned_by == 0 {
        return Err(AppError::BadRequest(
            "dashboard id and target team are required".to_string(),
        ));
    }

    if TeamRepository::find_by_id(&state.db, payload.owned_by)
        .await?
        .is_none()
    {
        return Err(AppError::BadRequest(
            "target team does not exist".to_string(),
        ));
    }

    // The dashboard must currently belong to a team; a missing row here is an
    // internal inconsistency, not a user error.
    let current_owner = DashboardRepository::find_owner(&state.db, &payload.id)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "dashboard {} has no owning team",
                payload.id
            ))
        })?;

    // Authorization is against the team the dashboard belongs to *before*
    // the transfer.
    if !PermissionService::can_manage_team(&state.db, &user, current_owner).await? {
        return Err(AppError::Forbidden);
    }

    DashboardRepository::update_owner(&state.db, &payload.id, payload.owned_by).await?;

    Ok(Json(DataResponse::new(())))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Mint a dashboard id: the reserved `d-` prefix plus a short alphanumeric
/// uid. Uniqueness is enforced by the primary key at insert time.
fn new_dashboard_id() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let uid: String = (0..8)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();

    format!("d-{}", uid)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::Utc;
    use serde_json::json;

    use super::new_dashboard_id;
    use crate::db::models::{Dashboard, UserRole, HOME_DASHBOARD_ID};
    use crate::db::{DashboardRepository, TeamRepository};
    use crate::routes::testutil::{request, seed_user, test_app};

    #[test]
    fn minted_ids_use_the_reserved_prefix_format() {
        for _ in 0..100 {
            let id = new_dashboard_id();
            let uid = id.strip_prefix("d-").expect("d- prefix");
            assert_eq!(uid.len(), 8);
            assert!(uid.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    async fn seed_dashboard(pool: &sqlx::SqlitePool, id: &str, title: &str, team: i64) {
        let now = Utc::now().naive_utc();
        DashboardRepository::insert(
            pool,
            &Dashboard {
                id: id.to_string(),
                title: title.to_string(),
                owned_by: team,
                created_by: 1,
                data: "{}".to_string(),
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn save_without_id_mints_one_and_fetch_round_trips() {
        let (app, state) = test_app().await;
        let team = TeamRepository::create(&state.db, "sre").await.unwrap();
        let token = seed_user(&state, "lead", UserRole::Editor, Some(team.id)).await;

        let (status, body) = request(
            &app,
            "POST",
            "/api/dashboards",
            Some(&token),
            Some(json!({"title": "A", "ownedBy": team.id, "data": {"panels": [1, 2]}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let id = body["data"].as_str().unwrap().to_string();
        let uid = id.strip_prefix("d-").expect("d- prefix");
        assert_eq!(uid.len(), 8);
        assert!(uid.chars().all(|c| c.is_ascii_alphanumeric()));

        let (status, body) = request(
            &app,
            "GET",
            &format!("/api/dashboards/{}", id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["title"], "A");
        assert_eq!(body["data"]["ownedBy"], team.id);
        assert_eq!(body["data"]["editable"], true);
        assert_eq!(body["data"]["data"], json!({"panels": [1, 2]}));
    }

    #[tokio::test]
    async fn save_is_forbidden_without_a_manage_role() {
        let (app, state) = test_app().await;
        let team = TeamRepository::create(&state.db, "sre").await.unwrap();
        let token = seed_user(&state, "viewer", UserRole::Viewer, None).await;

        let (status, _) = request(
            &app,
            "POST",
            "/api/dashboards",
            Some(&token),
            Some(json!({"title": "A", "ownedBy": team.id, "data": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let rows = DashboardRepository::list_by_team(&state.db, team.id)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn instance_admin_saves_to_any_team() {
        let (app, state) = test_app().await;
        let team = TeamRepository::create(&state.db, "sre").await.unwrap();
        let token = seed_user(&state, "root", UserRole::Admin, None).await;

        let (status, _) = request(
            &app,
            "POST",
            "/api/dashboards",
            Some(&token),
            Some(json!({"title": "A", "ownedBy": team.id, "data": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn save_with_id_keeps_creation_metadata_and_refreshes_updated() {
        let (app, state) = test_app().await;
        let team = TeamRepository::create(&state.db, "sre").await.unwrap();
        let token = seed_user(&state, "lead", UserRole::Editor, Some(team.id)).await;

        let (_, body) = request(
            &app,
            "POST",
            "/api/dashboards",
            Some(&token),
            Some(json!({"title": "before", "ownedBy": team.id, "data": {}})),
        )
        .await;
        let id = body["data"].as_str().unwrap().to_string();

        let original = DashboardRepository::find_by_id(&state.db, &id)
            .await
            .unwrap()
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let (status, _) = request(
            &app,
            "POST",
            "/api/dashboards",
            Some(&token),
            Some(json!({"id": id, "title": "after", "ownedBy": team.id, "data": {"v": 2}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let updated = DashboardRepository::find_by_id(&state.db, &id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "after");
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.created_by, original.created_by);
        assert!(updated.updated_at > original.updated_at);
    }

    #[tokio::test]
    async fn save_with_unknown_id_still_reports_success() {
        // Updates race deletes: an update matching zero rows is not an error.
        let (app, state) = test_app().await;
        let team = TeamRepository::create(&state.db, "sre").await.unwrap();
        let token = seed_user(&state, "lead", UserRole::Editor, Some(team.id)).await;

        let (status, body) = request(
            &app,
            "POST",
            "/api/dashboards",
            Some(&token),
            Some(json!({"id": "d-vanished", "title": "A", "ownedBy": team.id, "data": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "d-vanished");
        assert!(DashboardRepository::find_by_id(&state.db, "d-vanished")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn malformed_save_payload_is_bad_request() {
        let (app, state) = test_app().await;
        let token = seed_user(&state, "root", UserRole::Admin, None).await;

        // title missing
        let (status, body) = request(
            &app,
            "POST",
            "/api/dashboards",
            Some(&token),
            Some(json!({"ownedBy": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn fetch_of_missing_dashboard_names_the_id() {
        let (app, state) = test_app().await;
        let token = seed_user(&state, "root", UserRole::Admin, None).await;

        let (status, body) = request(
            &app,
            "GET",
            "/api/dashboards/d-nope",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("d-nope"));
    }

    #[tokio::test]
    async fn home_dashboard_can_not_be_deleted() {
        let (app, state) = test_app().await;
        seed_dashboard(&state.db, HOME_DASHBOARD_ID, "Home", 1).await;
        let token = seed_user(&state, "viewer", UserRole::Viewer, None).await;

        let (status, body) = request(
            &app,
            "DELETE",
            &format!("/api/dashboards/{}", HOME_DASHBOARD_ID),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("home dashboard"));

        assert!(DashboardRepository::find_by_id(&state.db, HOME_DASHBOARD_ID)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn delete_needs_no_team_role_and_is_idempotent() {
        let (app, state) = test_app().await;
        seed_dashboard(&state.db, "d-victim01", "Victim", 1).await;
        let token = seed_user(&state, "viewer", UserRole::Viewer, None).await;

        let (status, _) = request(
            &app,
            "DELETE",
            "/api/dashboards/d-victim01",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(DashboardRepository::find_by_id(&state.db, "d-victim01")
            .await
            .unwrap()
            .is_none());

        // Deleting it again (or any unknown id) still succeeds.
        let (status, _) = request(
            &app,
            "DELETE",
            "/api/dashboards/d-victim01",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn delete_of_blank_id_is_bad_request() {
        let (app, state) = test_app().await;
        let token = seed_user(&state, "viewer", UserRole::Viewer, None).await;

        let (status, _) = request(&app, "DELETE", "/api/dashboards/%20", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn transfer_moves_ownership_when_current_team_admin_asks() {
        let (app, state) = test_app().await;
        let from = TeamRepository::create(&state.db, "from").await.unwrap();
        let to = TeamRepository::create(&state.db, "to").await.unwrap();
        seed_dashboard(&state.db, "d-moving01", "Moving", from.id).await;
        let token = seed_user(&state, "lead", UserRole::Editor, Some(from.id)).await;

        let (status, _) = request(
            &app,
            "POST",
            "/api/dashboards/owner",
            Some(&token),
            Some(json!({"id": "d-moving01", "ownedBy": to.id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let owner = DashboardRepository::find_owner(&state.db, "d-moving01")
            .await
            .unwrap();
        assert_eq!(owner, Some(to.id));
    }

    #[tokio::test]
    async fn transfer_to_nonexistent_team_is_rejected_even_for_admins() {
        let (app, state) = test_app().await;
        let from = TeamRepository::create(&state.db, "from").await.unwrap();
        seed_dashboard(&state.db, "d-moving01", "Moving", from.id).await;
        let token = seed_user(&state, "root", UserRole::Admin, None).await;

        let (status, body) = request(
            &app,
            "POST",
            "/api/dashboards/owner",
            Some(&token),
            Some(json!({"id": "d-moving01", "ownedBy": 999})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("target team"));
    }

    #[tokio::test]
    async fn transfer_authorizes_against_the_current_team() {
        // Admin of the *target* team only: not good enough.
        let (app, state) = test_app().await;
        let from = TeamRepository::create(&state.db, "from").await.unwrap();
        let to = TeamRepository::create(&state.db, "to").await.unwrap();
        seed_dashboard(&state.db, "d-moving01", "Moving", from.id).await;
        let token = seed_user(&state, "lead", UserRole::Editor, Some(to.id)).await;

        let (status, _) = request(
            &app,
            "POST",
            "/api/dashboards/owner",
            Some(&token),
            Some(json!({"id": "d-moving01", "ownedBy": to.id})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let owner = DashboardRepository::find_owner(&state.db, "d-moving01")
            .await
            .unwrap();
        assert_eq!(owner, Some(from.id));
    }

    #[tokio::test]
    async fn transfer_requires_id_and_target_team() {
        let (app, state) = test_app().await;
        let token = seed_user(&state, "root", UserRole::Admin, None).await;

        let (status, _) = request(
            &app,
            "POST",
            "/api/dashboards/owner",
            Some(&token),
            Some(json!({"id": "", "ownedBy": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = request(
            &app,
            "POST",
            "/api/dashboards/owner",
            Some(&token),
            Some(json!({"id": "d-x", "ownedBy": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn transfer_of_unknown_dashboard_is_an_internal_error() {
        let (app, state) = test_app().await;
        let to = TeamRepository::create(&state.db, "to").await.unwrap();
        let token = seed_user(&state, "root", UserRole::Admin, None).await;

        let (status, _) = request(
            &app,
            "POST",
            "/api/dashboards/owner",
            Some(&token),
            Some(json!({"id": "d-ghost", "ownedBy": to.id})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
