use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::{
    authz::Actor,
    error::{ApiError, Result},
    models::{Identity, LoginResponse},
    password,
    repository::RepositoryState,
    tokens::{KeyScope, TokenRejection, TokenService},
};

/// BearerToken Extractor
///
/// Pulls an optional token from an `Authorization: Bearer ...` header. Routes carry
/// their token in the JSON body; this header is an accepted alternative, and the body
/// value wins when both are present. Never rejects: a missing header is `None`.
#[derive(Debug, Clone, Default)]
pub struct BearerToken(pub Option<String>);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        Ok(BearerToken(token))
    }
}

impl BearerToken {
    /// Picks the body token if present, else the header token.
    pub fn or_body(self, body: Option<String>) -> Option<String> {
        body.filter(|t| !t.is_empty()).or(self.0)
    }
}

/// authenticate
///
/// Resolves a presented token to an acting identity:
/// 1. Token Verification under `scope` (missing, expired, forged or malformed → `InvalidToken`).
/// 2. Identity Lookup: the id in the claims must still resolve (else `Unauthorized`).
/// 3. Role Selection: session-scope actors keep the role captured at issuance;
///    admin-scope actors use the identity's current role, so admin-only actions are
///    re-checked against the admin set.
pub async fn authenticate(
    repo: &RepositoryState,
    tokens: &TokenService,
    token: Option<&str>,
    scope: KeyScope,
) -> Result<Actor> {
    let token = token.ok_or(TokenRejection::Missing)?;
    let claims = tokens.verify(token, scope)?;

    let identity = repo
        .find_identity(claims.id)
        .await
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))?;

    let actor = match scope {
        KeyScope::Session => Actor::from_claims(&claims, scope),
        KeyScope::Admin => Actor::new(identity.id, identity.role, scope),
    };
    tracing::debug!(actor = actor.id, role = ?actor.role, ?scope, "token accepted");
    Ok(actor)
}

/// register
///
/// Credential store entry point: validates input, rejects known identifiers early
/// (the store re-checks atomically), hashes the password and creates the identity.
pub async fn register(repo: &RepositoryState, email: &str, password: &str) -> Result<Identity> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::Validation("Please provide all details".to_string()));
    }
    if repo.find_identity_by_email(email).await.is_some() {
        return Err(ApiError::DuplicateIdentity(email.to_string()));
    }

    let hash = password::hash_password_blocking(password.to_string()).await?;
    repo.create_identity(email, hash).await
}

/// login
///
/// Verifies the credential and issues a session token. Admins also receive a token
/// signed with the admin-scope key, required for admin-only operations.
pub async fn login(
    repo: &RepositoryState,
    tokens: &TokenService,
    email: &str,
    password: &str,
) -> Result<LoginResponse> {
    let identity = repo
        .find_identity_by_email(email.trim())
        .await
        .ok_or(ApiError::AuthenticationFailure("User not found"))?;

    let valid =
        password::verify_password_blocking(identity.password_hash.clone(), password.to_string())
            .await?;
    if !valid {
        return Err(ApiError::AuthenticationFailure("Invalid password"));
    }

    let token = tokens.issue(identity.id, identity.role, KeyScope::Session)?;
    let admin_token = if identity.role.is_admin() {
        Some(tokens.issue(identity.id, identity.role, KeyScope::Admin)?)
    } else {
        None
    };

    tracing::info!(id = identity.id, role = ?identity.role, "login succeeded");
    Ok(LoginResponse { token, admin_token })
}
