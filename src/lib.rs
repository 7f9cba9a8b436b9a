use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core services: identity, tokens, authorization and the store.
pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod storage;
pub mod tokens;

// Routing segregation (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{MemoryRepository, RepositoryState};
pub use storage::{JsonFileStorage, MockStorageService, StorageState};
pub use tokens::TokenService;

/// ApiDoc
///
/// OpenAPI document for every route and payload, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login_user, handlers::list_blogs,
        handlers::get_blog, handlers::get_comments, handlers::create_blog,
        handlers::update_blog, handlers::delete_blog, handlers::like_blog,
        handlers::add_comment, handlers::delete_comment, handlers::promote_user
    ),
    components(
        schemas(
            models::Role, models::Blog, models::Comment, models::CredentialsRequest,
            models::LoginResponse, models::PromoteRequest, models::CreateBlogRequest,
            models::UpdateBlogRequest, models::TokenRequest, models::LikeRequest,
            models::LikeResponse, models::CreateCommentRequest,
        )
    ),
    tags(
        (name = "blog-backend", description = "Blogging API with role-based authorization")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container for all services and configuration, cloned cheaply
/// into every request.
#[derive(Clone)]
pub struct AppState {
    /// Credential and resource store.
    pub repo: RepositoryState,
    /// Token issuing and verification, one key per scope.
    pub tokens: TokenService,
}

impl AppState {
    /// Wires a state from a configuration and an already loaded store. Only the token
    /// settings are kept; the rest of the configuration is consumed by `main`.
    pub fn new(config: AppConfig, repo: RepositoryState) -> Self {
        Self {
            tokens: TokenService::from_config(&config),
            repo,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

/// create_router
///
/// Assembles the routing structure, applies the observability layers and registers
/// the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .nest("/admin", admin::admin_routes())
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing, one span per request carrying the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span from the method, URI and `x-request-id` header.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
