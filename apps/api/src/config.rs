use anyhow::{bail, Context, Result};

/// Where Clerk session tokens get their verification key from.
#[derive(Debug, Clone)]
pub enum ClerkKeySource {
    /// PEM-encoded RSA public key from the Clerk dashboard (networkless verification).
    Pem(String),
    /// JWKS endpoint of the Clerk frontend API.
    Jwks(String),
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub clerk_key: ClerkKeySource,
    pub clerk_issuer: Option<String>,
    pub clerk_audience: Option<String>,
    pub stripe_webhook_secret: String,
    pub stripe_webhook_tolerance_secs: i64,
    pub free_project_limit: i64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let clerk_key = match (optional_env("CLERK_JWT_KEY"), optional_env("CLERK_JWKS_URL")) {
            (Some(pem), _) => ClerkKeySource::Pem(pem.replace("\\n", "\n")),
            (None, Some(url)) => ClerkKeySource::Jwks(url),
            (None, None) => bail!("Either 'CLERK_JWT_KEY' or 'CLERK_JWKS_URL' must be set"),
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            clerk_key,
            clerk_issuer: optional_env("CLERK_ISSUER"),
            clerk_audience: optional_env("CLERK_AUDIENCE"),
            stripe_webhook_secret: require_env("STRIPE_WEBHOOK_SECRET")?,
            stripe_webhook_tolerance_secs: parse_env("STRIPE_WEBHOOK_TOLERANCE_SECS", 300)?,
            free_project_limit: parse_env("FREE_PROJECT_LIMIT", 1)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}
