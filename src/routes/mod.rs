pub mod auth;
pub mod dashboards;
pub mod health;
pub mod teams;

use serde::Serialize;

/// Uniform success envelope: every endpoint wraps its payload as `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
