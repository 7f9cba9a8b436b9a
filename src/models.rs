use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Records (Persisted as JSON record sets) ---

/// Role
///
/// The RBAC attribute of an identity. Promotion is one-way: `User` → `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

/// Identity
///
/// A registered actor. Identities live in a single collection keyed by id; the
/// user/admin split only exists on disk (`users.json` / `admins.json`).
/// The credential hash is an Argon2 PHC string and never leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    // Unique across users and admins combined, never reused.
    pub id: u64,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
}

/// Blog
///
/// A post owned by its author. `likes` keeps identity ids in the order they liked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Blog {
    pub id: u64,
    pub title: String,
    pub content: String,
    // FK to Identity.id. May dangle only if identities are removed out of band.
    pub author_id: u64,
    #[serde(default)]
    pub likes: Vec<u64>,
}

/// Comment
///
/// A comment on a blog. `parent_comment_id` links replies into a tree on the same blog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Comment {
    pub comment_id: u64,
    // FK to Blog.id. Left dangling when the blog is deleted (no cascade).
    pub blog_id: u64,
    pub user_id: u64,
    pub body: String,
    pub parent_comment_id: Option<u64>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Sequences
///
/// Last id handed out per collection. Persisted independently of the collections so
/// that deleting the newest record never causes its id to be reissued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Sequences {
    pub identity: u64,
    pub blog: u64,
    pub comment: u64,
}

// --- Request Payloads (Input Schemas) ---

/// Credentials body shared by POST /register and POST /login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// LoginResponse
///
/// `admin_token` is only present for identities holding the admin role at login time.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub admin_token: Option<String>,
}

/// PromoteRequest
///
/// POST /admin/promote. `token` must be signed with the admin-scope key.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PromoteRequest {
    pub token: Option<String>,
    #[serde(default)]
    pub email: String,
}

/// CreateBlogRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateBlogRequest {
    pub token: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// UpdateBlogRequest
///
/// Partial update. A field that is absent OR empty keeps the stored value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateBlogRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// TokenRequest
///
/// Body of requests that carry nothing but a credential (DELETE routes).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenRequest {
    pub token: Option<String>,
}

/// LikeRequest
///
/// `user_id` is optional; when sent it must name the same identity as the token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LikeRequest {
    pub token: Option<String>,
    pub user_id: Option<String>,
}

/// LikeResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct LikeResponse {
    // true if this request added the like, false if it removed it.
    pub liked: bool,
    pub likes: usize,
}

/// CreateCommentRequest
///
/// `parentCommentId` of `0` or absent means a top-level comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCommentRequest {
    pub token: Option<String>,
    #[serde(default)]
    pub comment: String,
    pub parent_comment_id: Option<u64>,
}
