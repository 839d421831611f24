//! Liveness endpoint

use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponseDto {
    pub success: bool,
    pub message: String,
    /// Server time, RFC 3339
    pub timestamp: String,
}

/// Health check
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is running", body = HealthResponseDto)
    )
)]
pub async fn health_check() -> Json<HealthResponseDto> {
    Json(HealthResponseDto {
        success: true,
        message: "Server is running".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

pub fn routes() -> Router {
    Router::new().route("/api/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::Value;

    #[tokio::test]
    async fn test_health_check() {
        let server = TestServer::new(routes()).unwrap();

        let response = server.get("/api/health").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
    }
}
