use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use secrecy::ExposeSecret;
use serde_json::{json, Value};

use crate::bootstrap::AppState;

/// Error payload shared by every handler: an HTTP status, a human-readable
/// message, and optionally a structured detail object.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), detail: None }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.message });
        if let Some(detail) = self.detail {
            body["detail"] = detail;
        }
        (self.status, Json(body)).into_response()
    }
}

/// Bearer-token check for `/admin` routes. A missing `server.admin_token`
/// leaves the routes open, which is the expected mode for local development.
pub fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = &state.admin_token else {
        return Ok(());
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected.expose_secret() => Ok(()),
        _ => Err(ApiError::new(StatusCode::UNAUTHORIZED, "missing or invalid admin token")),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

    use crate::bootstrap::AppState;

    use super::authorize_admin;

    async fn state_with_token(token: Option<&str>) -> AppState {
        let pool = tierline_db::connect_with_settings("sqlite::memory:", 1, 5)
            .await
            .expect("pool should connect");
        AppState {
            db_pool: pool,
            claims: std::sync::Arc::new(tierline_db::ClaimSet::default()),
            admin_token: token.map(|value| value.to_string().into()),
            default_profile_id: None,
            recompute_batch_size: 100,
        }
    }

    #[tokio::test]
    async fn open_mode_allows_everything() {
        let state = state_with_token(None).await;
        assert!(authorize_admin(&state, &HeaderMap::new()).is_ok());
    }

    #[tokio::test]
    async fn configured_token_rejects_missing_and_wrong_headers() {
        let state = state_with_token(Some("tl-secret")).await;

        let denied = authorize_admin(&state, &HeaderMap::new()).expect_err("no header");
        assert_eq!(denied.status, StatusCode::UNAUTHORIZED);

        let mut wrong = HeaderMap::new();
        wrong.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer nope"));
        assert!(authorize_admin(&state, &wrong).is_err());

        let mut right = HeaderMap::new();
        right.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tl-secret"));
        assert!(authorize_admin(&state, &right).is_ok());
    }
}
