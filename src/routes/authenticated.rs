use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, post, put},
};

/// Authenticated Router Module
///
/// Mutations open to any registered identity holding a valid session token. Each
/// handler resolves the acting identity from the token and the repository applies
/// the ownership rules (author or admin) atomically with the mutation.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Blogs ---
        // POST /blog/create
        .route("/blog/create", post(handlers::create_blog))
        // PUT /blog/update/{id}
        // Author or admin. Empty fields keep their previous value.
        .route("/blog/update/{id}", put(handlers::update_blog))
        // DELETE /blog/delete/{id}
        // Author or admin. Hard delete, no cascade to comments.
        .route("/blog/delete/{id}", delete(handlers::delete_blog))
        // POST /blog/{id}/like
        // Toggle: calling twice restores the original like set.
        .route("/blog/{id}/like", post(handlers::like_blog))
        // --- Comments ---
        // POST /blog/{id}/comment
        .route("/blog/{id}/comment", post(handlers::add_comment))
        // DELETE /comment/{id}
        // Comment author or admin.
        .route("/comment/{id}", delete(handlers::delete_comment))
}
