use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no token: the credential gateway (register, login) and
/// read-only access to blogs and comments.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Welcome banner.
        .route("/", get(handlers::welcome))
        // GET /health
        // Liveness check for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Creates an identity. The first one ever becomes the bootstrap admin.
        .route("/register", post(handlers::register_user))
        // POST /login
        // Returns a session token, plus an admin-scope token for admins.
        .route("/login", post(handlers::login_user))
        // GET /blogs
        .route("/blogs", get(handlers::list_blogs))
        // GET /blog/{id}
        .route("/blog/{id}", get(handlers::get_blog))
        // GET /blog/{id}/comments
        // 404 when the blog has no comments. Comments outlive their blog.
        .route("/blog/{id}/comments", get(handlers::get_comments))
}
