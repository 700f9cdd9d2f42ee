use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Reserved dashboard id that can never be deleted.
pub const HOME_DASHBOARD_ID: &str = "d-home";

/// A stored dashboard row. `data` holds the JSON-encoded layout payload
/// exactly as it was serialized at write time; it is decoded back into a
/// JSON value at the API boundary.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: String,
    pub title: String,
    pub owned_by: i64,
    pub created_by: i64,
    pub data: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Projection used by team listings: everything except the data payload.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub id: String,
    pub title: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
