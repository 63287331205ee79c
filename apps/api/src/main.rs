mod actions;
mod analytics;
mod auth;
mod billing;
mod config;
mod db;
mod errors;
mod models;
mod projects;
mod routes;
mod state;
mod users;
mod validation;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::{ClerkVerifier, JwksKeyProvider, KeyProvider, StaticKeyProvider};
use crate::config::{ClerkKeySource, Config};
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("purple_api={},tower_http=info", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Purple API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Clerk token verification
    let auth = build_verifier(&config)?;

    info!(
        "Free tier allows {} project(s) per user",
        config.free_project_limit
    );

    let state = AppState {
        db,
        config: config.clone(),
        auth,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the web front end's domain

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Picks the key source for Clerk session tokens: a pinned PEM key when one is
/// configured, otherwise the JWKS endpoint.
fn build_verifier(config: &Config) -> Result<ClerkVerifier> {
    let keys: Arc<dyn KeyProvider> = match &config.clerk_key {
        ClerkKeySource::Pem(pem) => {
            info!("Verifying session tokens with the configured Clerk public key");
            Arc::new(
                StaticKeyProvider::from_rsa_pem(pem)
                    .context("CLERK_JWT_KEY is not a valid RSA public key")?,
            )
        }
        ClerkKeySource::Jwks(url) => {
            info!("Verifying session tokens against JWKS at {url}");
            Arc::new(JwksKeyProvider::new(url.clone())?)
        }
    };

    Ok(ClerkVerifier::new(
        keys,
        config.clerk_issuer.clone(),
        config.clerk_audience.clone(),
    ))
}
