// src/server/routes.rs
//! Axum router configuration for the pushreq server

use crate::server::ServerState;
use crate::server::handlers::{files, index, pr};
use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{get, post, put},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Create the main application router
pub fn create_router(state: Arc<RwLock<ServerState>>) -> Router {
    let origins = match state.try_read() {
        Ok(state) => state.config.cors_allowed_origins.clone(),
        Err(_) => Vec::new(),
    };
    let cors = cors_layer(&origins);

    Router::new()
        .route("/health", get(health_check))
        .route("/:user", put(index::put_user))
        .route("/:user/+pr-list", get(pr::user_listing))
        .route(
            "/:user/:index",
            get(index::get_index)
                .put(index::put_index)
                .patch(index::patch_index)
                .delete(index::delete_index),
        )
        .route("/:user/:index/+pr-list", get(pr::index_listing))
        .route(
            "/:user/:index/+upload/:project/:version/:filename",
            post(files::upload),
        )
        .route("/:user/:index/+push", post(files::push))
        .route("/:user/:index/+files/:project", get(files::project_links))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::PUT,
        Method::PATCH,
        Method::POST,
        Method::DELETE,
    ];
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(methods)
        .allow_headers(Any)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_check() {
        let config = crate::server::ServerConfig::default();
        let state = Arc::new(RwLock::new(crate::server::ServerState::new(config)));
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let config = crate::server::ServerConfig::default();
        let state = Arc::new(RwLock::new(crate::server::ServerState::new(config)));
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/alice/dev")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
