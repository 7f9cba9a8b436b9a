use std::{env, path::PathBuf};

/// Fallback signing keys for local development only.
const LOCAL_JWT_SECRET: &str = "local-session-signing-key-change-me";
const LOCAL_ADMIN_JWT_SECRET: &str = "local-admin-signing-key-change-me";

/// Default lifetime of an issued token (one hour).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// immutable afterwards; handlers pull it out of the shared state via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and secret enforcement.
    pub env: Env,
    // Key used to sign and verify general session tokens.
    pub jwt_secret: String,
    // Key reserved for admin-only operations. Never equal to `jwt_secret` in production.
    pub admin_jwt_secret: String,
    // Lifetime of every issued token, in seconds.
    pub token_ttl_secs: u64,
    // Directory holding the JSON record sets.
    pub data_dir: PathBuf,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
}

/// Env
///
/// Defines the runtime context: developer conveniences in `Local`, hardened
/// secrets and structured logs in `Production`.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Non-panicking configuration used for test state scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            admin_jwt_secret: LOCAL_ADMIN_JWT_SECRET.to_string(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            data_dir: PathBuf::from("./data"),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables and fails fast.
    ///
    /// # Panics
    /// Panics in `Production` if either signing key is missing or if both keys are
    /// identical. Also panics if `TOKEN_TTL_SECS` is set but not a positive integer.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let (jwt_secret, admin_jwt_secret) = match env {
            Env::Production => {
                let session = env::var("JWT_SECRET")
                    .expect("FATAL: JWT_SECRET must be set in production.");
                let admin = env::var("ADMIN_JWT_SECRET")
                    .expect("FATAL: ADMIN_JWT_SECRET must be set in production.");
                assert_ne!(
                    session, admin,
                    "FATAL: JWT_SECRET and ADMIN_JWT_SECRET must differ."
                );
                (session, admin)
            }
            Env::Local => (
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                env::var("ADMIN_JWT_SECRET")
                    .unwrap_or_else(|_| LOCAL_ADMIN_JWT_SECRET.to_string()),
            ),
        };

        let token_ttl_secs = match env::var("TOKEN_TTL_SECS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => panic!("FATAL: TOKEN_TTL_SECS must be a positive integer, got {raw:?}"),
            },
            Err(_) => DEFAULT_TOKEN_TTL_SECS,
        };

        Self {
            env,
            jwt_secret,
            admin_jwt_secret,
            token_ttl_secs,
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        }
    }
}
