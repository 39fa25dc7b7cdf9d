use axum::{http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::utils::{message_to_api_response, success_to_api_response};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
}

pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        success_to_api_response(
            "ok",
            HealthResponse {
                status: "ok".to_string(),
                timestamp: chrono::Utc::now().timestamp(),
            },
        ),
    )
}

pub async fn welcome() -> impl IntoResponse {
    message_to_api_response("Welcome to the API")
}
