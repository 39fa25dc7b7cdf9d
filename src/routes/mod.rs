use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::{
    AppState,
    middleware::{RateLimiter, auth_middleware, log_requests, rate_limit},
};

pub mod health;
pub mod user;

/// Builds the full application router, middleware included.
pub fn app(state: AppState) -> Router {
    let rate_limiter = Arc::new(RateLimiter::new(state.cache.clone(), &state.config));

    let public_routes = Router::new()
        .route("/users", post(user::create).get(user::list))
        .route("/users/{id}", get(user::find))
        .route("/users/{id}/details", get(user::details))
        .route("/login", post(user::login));

    let protected_routes = Router::new()
        .route(
            "/users/{id}",
            put(user::update).patch(user::update).delete(user::delete),
        )
        .route("/users/{id}/change-password", put(user::change_password))
        .route("/users/{id}/terminate", put(user::terminate))
        .route("/me", get(user::me))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(health::welcome))
        .route("/health", get(health::health))
        .nest(
            &state.config.api_base_uri,
            Router::new().merge(public_routes).merge(protected_routes),
        )
        .layer(axum::middleware::from_fn(log_requests))
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter,
            rate_limit,
        ))
        .with_state(state)
}
