use axum::{routing::get, Json, Router};

use super::response::ApiResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::ok("NEXTRA Core is running"))
}
