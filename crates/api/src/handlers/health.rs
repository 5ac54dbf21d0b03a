use axum::{extract::State, Json};
use serde::Serialize;

use crate::routes::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: state.service_name.as_deref().map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_includes_service_name() {
        let Json(body) = health_check(State(AppState::new(Some("hatchetest")))).await;
        assert_eq!(body.status, "healthy");
        assert_eq!(body.service.as_deref(), Some("hatchetest"));
    }

    #[tokio::test]
    async fn test_health_without_service_name() {
        let Json(body) = health_check(State(AppState::default())).await;
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, serde_json::json!({ "status": "healthy" }));
    }
}
