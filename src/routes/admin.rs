use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Admin Router Module
///
/// Routes exclusively for admins. Handlers verify the token against the admin-scope
/// key, so a general session token can never be replayed here.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/promote
        // One-way user → admin promotion.
        .route("/promote", post(handlers::promote_user))
}
