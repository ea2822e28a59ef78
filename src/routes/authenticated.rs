use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Authenticated Router Module
///
/// Every route here runs behind the auth middleware in `create_router`, so
/// each handler receives a resolved `AuthUser`. Ownership of individual posts
/// and accounts is checked in the service layer, not here.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /posts?limit=&skip=&search=
        // Lists only the caller's posts.
        .route(
            "/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        // GET/PUT/DELETE /posts/{id}
        // Owner only. A missing post is 404 before ownership is considered.
        .route(
            "/posts/{id}",
            get(handlers::get_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
        // POST /vote
        // Any authenticated user may vote on any existing post.
        .route("/vote", post(handlers::vote))
        // DELETE /users/{id}
        // Account holder only.
        .route("/users/{id}", delete(handlers::delete_user))
}
