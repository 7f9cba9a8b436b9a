use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{config::AppConfig, error::ApiError, models::Role};

/// Claims
///
/// Payload signed into every token. `role` is the role held at issuance and is not
/// re-checked against current state for session-scope operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id.
    pub id: u64,
    pub role: Role,
    /// Issued At (seconds since epoch).
    pub iat: u64,
    /// Expiration Time (seconds since epoch).
    pub exp: u64,
}

/// KeyScope
///
/// Which signing key a token is issued under / verified against. A session token
/// never verifies under the admin scope and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    Session,
    Admin,
}

/// TokenRejection
///
/// Fine-grained reason a token failed verification. Collapsed to a single
/// `Invalid token` response at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("no token presented")]
    Missing,
    #[error("token expired")]
    Expired,
    #[error("signature mismatch")]
    BadSignature,
    #[error("malformed token")]
    Malformed,
}

impl TokenRejection {
    /// Short reason code for structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Expired => "expired",
            Self::BadSignature => "bad_signature",
            Self::Malformed => "malformed",
        }
    }
}

/// TokenService
///
/// Issues and verifies HS256 JWTs with one secret per `KeyScope`.
#[derive(Clone)]
pub struct TokenService {
    session_secret: Vec<u8>,
    admin_secret: Vec<u8>,
    ttl_secs: u64,
}

impl TokenService {
    pub fn new(session_secret: &str, admin_secret: &str, ttl_secs: u64) -> Self {
        Self {
            session_secret: session_secret.as_bytes().to_vec(),
            admin_secret: admin_secret.as_bytes().to_vec(),
            ttl_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, &config.admin_jwt_secret, config.token_ttl_secs)
    }

    fn secret(&self, scope: KeyScope) -> &[u8] {
        match scope {
            KeyScope::Session => &self.session_secret,
            KeyScope::Admin => &self.admin_secret,
        }
    }

    /// issue
    ///
    /// Signs `{id, role}` with an expiry of now + ttl under the given scope. The expiry
    /// saturates at `u64::MAX` instead of wrapping.
    pub fn issue(&self, id: u64, role: Role, scope: KeyScope) -> Result<String, ApiError> {
        let now = now_secs();
        let claims = Claims {
            id,
            role,
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        };
        self.sign(&claims, scope)
    }

    /// Signs arbitrary claims. Exposed so callers can mint tokens with a chosen expiry.
    pub fn sign(&self, claims: &Claims, scope: KeyScope) -> Result<String, ApiError> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret(scope)),
        )
        .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
    }

    /// verify
    ///
    /// Checks signature and expiry against the scope's key and returns the claims.
    pub fn verify(&self, token: &str, scope: KeyScope) -> Result<Claims, TokenRejection> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(scope)),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenRejection::Expired,
            ErrorKind::InvalidSignature => TokenRejection::BadSignature,
            _ => TokenRejection::Malformed,
        })
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
