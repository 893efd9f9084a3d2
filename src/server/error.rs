// src/server/error.rs
//! Mapping of library errors onto HTTP responses

use crate::error::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// An error on its way to the client
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn internal(message: impl std::fmt::Display) -> Self {
        ApiError(Error::InitError(message.to_string()))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError(Error::BadRequest(message.into()))
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("{}", self.0);
        } else {
            tracing::warn!("{} {}", status.as_u16(), self.0);
        }

        let body = json!({
            "message": self.0.to_string(),
            "errors": self.0.messages(),
        });
        (status, Json(body)).into_response()
    }
}
