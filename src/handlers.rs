use crate::{
    AppState,
    auth::{self, BearerToken},
    error::{ApiError, Result},
    models::{
        Blog, Comment, CreateBlogRequest, CreateCommentRequest, CredentialsRequest, LikeRequest,
        LikeResponse, LoginResponse, PromoteRequest, Role, TokenRequest, UpdateBlogRequest,
    },
    repository::RepositoryState,
    tokens::{KeyScope, TokenService},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

// --- Public Handlers ---

/// welcome
///
/// [Public Route] Plain-text banner for the service root.
pub async fn welcome() -> &'static str {
    "WELCOME TO THE BLOG APP"
}

/// register_user
///
/// [Public Route] Creates an identity. The first identity ever registered becomes the
/// bootstrap admin; everyone after is a plain user.
#[utoipa::path(
    post,
    path = "/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Registered", body = String),
        (status = 400, description = "Missing fields or identity already exists")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<(StatusCode, &'static str)> {
    let identity = auth::register(&state.repo, &payload.email, &payload.password).await?;
    let message = match identity.role {
        Role::Admin => "First user registered as admin successfully",
        Role::User => "User registered successfully",
    };
    Ok((StatusCode::CREATED, message))
}

/// login_user
///
/// [Public Route] Exchanges credentials for a session token (plus an admin-scope
/// token for admins).
#[utoipa::path(
    post,
    path = "/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Unknown identity or wrong password")
    )
)]
pub async fn login_user(
    State(repo): State<RepositoryState>,
    State(tokens): State<TokenService>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<LoginResponse>> {
    let response = auth::login(&repo, &tokens, &payload.email, &payload.password).await?;
    Ok(Json(response))
}

/// list_blogs
///
/// [Public Route] All blogs, ordered by id.
#[utoipa::path(
    get,
    path = "/blogs",
    responses((status = 200, description = "Blogs", body = [Blog]))
)]
pub async fn list_blogs(State(repo): State<RepositoryState>) -> Json<Vec<Blog>> {
    Json(repo.list_blogs().await)
}

/// get_blog
///
/// [Public Route] One blog by id.
#[utoipa::path(
    get,
    path = "/blog/{id}",
    params(("id" = u64, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Found", body = Blog),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_blog(State(repo): State<RepositoryState>, Path(id): Path<u64>) -> Result<Json<Blog>> {
    repo.get_blog(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Blog not found".to_string()))
}

/// get_comments
///
/// [Public Route] Comments for a blog in creation order. Comments of a deleted blog
/// are still listed. An empty result is reported as 404.
#[utoipa::path(
    get,
    path = "/blog/{id}/comments",
    params(("id" = u64, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Comments", body = [Comment]),
        (status = 404, description = "No comments")
    )
)]
pub async fn get_comments(
    State(repo): State<RepositoryState>,
    Path(blog_id): Path<u64>,
) -> Result<Json<Vec<Comment>>> {
    let comments = repo.get_comments(blog_id).await;
    if comments.is_empty() {
        return Err(ApiError::NotFound(
            "No comments found for this blog".to_string(),
        ));
    }
    Ok(Json(comments))
}

// --- Authenticated Handlers ---

/// create_blog
///
/// [Authenticated Route] The author is always the token's identity.
#[utoipa::path(
    post,
    path = "/blog/create",
    request_body = CreateBlogRequest,
    responses(
        (status = 201, description = "Created", body = Blog),
        (status = 400, description = "Missing title or content"),
        (status = 403, description = "Invalid token or unknown identity")
    )
)]
pub async fn create_blog(
    State(state): State<AppState>,
    bearer: BearerToken,
    Json(payload): Json<CreateBlogRequest>,
) -> Result<(StatusCode, Json<Blog>)> {
    let token = bearer.or_body(payload.token);
    let actor =
        auth::authenticate(&state.repo, &state.tokens, token.as_deref(), KeyScope::Session).await?;

    if payload.title.trim().is_empty() || payload.content.trim().is_empty() {
        return Err(ApiError::Validation(
            "Please provide a title and content".to_string(),
        ));
    }

    let blog = state
        .repo
        .create_blog(&actor, payload.title, payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(blog)))
}

/// update_blog
///
/// [Authenticated Route] Author or admin only. Empty or absent fields keep their
/// previous value.
#[utoipa::path(
    put,
    path = "/blog/update/{id}",
    params(("id" = u64, Path, description = "Blog ID")),
    request_body = UpdateBlogRequest,
    responses(
        (status = 200, description = "Updated", body = Blog),
        (status = 403, description = "Invalid token or not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_blog(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    bearer: BearerToken,
    Json(payload): Json<UpdateBlogRequest>,
) -> Result<Json<Blog>> {
    let token = bearer.or_body(payload.token);
    let actor =
        auth::authenticate(&state.repo, &state.tokens, token.as_deref(), KeyScope::Session).await?;

    let blog = state
        .repo
        .update_blog(&actor, id, payload.title, payload.content)
        .await?;
    Ok(Json(blog))
}

/// delete_blog
///
/// [Authenticated Route] Author or admin only. Comments on the blog are kept.
#[utoipa::path(
    delete,
    path = "/blog/delete/{id}",
    params(("id" = u64, Path, description = "Blog ID")),
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Deleted"),
        (status = 403, description = "Invalid token or not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_blog(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    bearer: BearerToken,
    Json(payload): Json<TokenRequest>,
) -> Result<(StatusCode, &'static str)> {
    let token = bearer.or_body(payload.token);
    let actor =
        auth::authenticate(&state.repo, &state.tokens, token.as_deref(), KeyScope::Session).await?;

    state.repo.delete_blog(&actor, id).await?;
    Ok((StatusCode::OK, "Blog deleted successfully"))
}

/// like_blog
///
/// [Authenticated Route] Toggles the caller's like: a second call undoes the first.
/// Likes are keyed by the verified identity; a `userId` in the body must agree with it.
#[utoipa::path(
    post,
    path = "/blog/{id}/like",
    params(("id" = u64, Path, description = "Blog ID")),
    request_body = LikeRequest,
    responses(
        (status = 200, description = "Toggled", body = LikeResponse),
        (status = 403, description = "Invalid token or mismatched userId"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn like_blog(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    bearer: BearerToken,
    Json(payload): Json<LikeRequest>,
) -> Result<Json<LikeResponse>> {
    let token = bearer.or_body(payload.token);
    let actor =
        auth::authenticate(&state.repo, &state.tokens, token.as_deref(), KeyScope::Session).await?;

    if let Some(user_id) = payload.user_id.as_deref() {
        if user_id.trim() != actor.id.to_string() {
            return Err(ApiError::Unauthorized(
                "User not found or unauthorized".to_string(),
            ));
        }
    }

    let outcome = state.repo.toggle_like(&actor, id).await?;
    Ok(Json(outcome))
}

/// add_comment
///
/// [Authenticated Route] Comments on an existing blog, optionally as a reply to a
/// comment on the same blog. A missing blog is reported before an empty body.
#[utoipa::path(
    post,
    path = "/blog/{id}/comment",
    params(("id" = u64, Path, description = "Blog ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment Added", body = Comment),
        (status = 400, description = "Empty comment or invalid parent"),
        (status = 403, description = "Invalid token"),
        (status = 404, description = "Blog not found")
    )
)]
pub async fn add_comment(
    State(state): State<AppState>,
    Path(blog_id): Path<u64>,
    bearer: BearerToken,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>)> {
    let token = bearer.or_body(payload.token);
    let actor =
        auth::authenticate(&state.repo, &state.tokens, token.as_deref(), KeyScope::Session).await?;

    let comment = state
        .repo
        .add_comment(&actor, blog_id, payload.comment, payload.parent_comment_id)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// delete_comment
///
/// [Authenticated Route] Comment author or admin only. Replies keep their parent id.
#[utoipa::path(
    delete,
    path = "/comment/{id}",
    params(("id" = u64, Path, description = "Comment ID")),
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Deleted"),
        (status = 403, description = "Invalid token or not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<u64>,
    bearer: BearerToken,
    Json(payload): Json<TokenRequest>,
) -> Result<(StatusCode, &'static str)> {
    let token = bearer.or_body(payload.token);
    let actor =
        auth::authenticate(&state.repo, &state.tokens, token.as_deref(), KeyScope::Session).await?;

    state.repo.delete_comment(&actor, comment_id).await?;
    Ok((StatusCode::OK, "Comment deleted successfully"))
}

// --- Admin Handlers ---

/// promote_user
///
/// [Admin Route] Moves a plain user into the admin set.
///
/// *RBAC*: the token must verify under the admin-scope key; a session token is
/// rejected outright even if its role claim says admin.
#[utoipa::path(
    post,
    path = "/admin/promote",
    request_body = PromoteRequest,
    responses(
        (status = 200, description = "Promoted"),
        (status = 403, description = "Not an admin-scope token"),
        (status = 404, description = "No such plain user")
    )
)]
pub async fn promote_user(
    State(state): State<AppState>,
    bearer: BearerToken,
    Json(payload): Json<PromoteRequest>,
) -> Result<(StatusCode, &'static str)> {
    let token = bearer.or_body(payload.token);
    let actor =
        auth::authenticate(&state.repo, &state.tokens, token.as_deref(), KeyScope::Admin).await?;

    state.repo.promote_identity(&actor, payload.email.trim()).await?;
    Ok((StatusCode::OK, "User promoted to admin"))
}
