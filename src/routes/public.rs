use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no credentials: liveness, registration, public user
/// profiles and login. Nothing here touches posts.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /users
        .route("/users", post(handlers::register_user))
        // GET /users/{id}
        .route("/users/{id}", get(handlers::get_user))
        // POST /login
        // Issues the bearer token used by every authenticated route.
        .route("/login", post(handlers::login))
}
