use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};
use jsonwebtoken::Algorithm;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use storefront_api::token::is_hmac;
use storefront_api::{AppStateInner, AuthConfig, TokenIssuer};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_server=debug,storefront_api=debug,storefront_db=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let auth = auth_config()?;
    let db_path = std::env::var("STOREFRONT_DB_PATH").unwrap_or_else(|_| "storefront.db".into());
    let host = std::env::var("STOREFRONT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("STOREFRONT_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .context("STOREFRONT_PORT must be a port number")?;

    // Init database
    let db = storefront_db::Database::open(&PathBuf::from(&db_path))?;

    info!(
        "Tokens signed with {:?}, valid for {} minutes",
        auth.algorithm,
        auth.token_lifetime.num_minutes()
    );
    let state = AppStateInner::new(db, TokenIssuer::new(auth));

    let app = storefront_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn auth_config() -> anyhow::Result<AuthConfig> {
    let secret = std::env::var("STOREFRONT_JWT_SECRET").unwrap_or_default();
    if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
        bail!("STOREFRONT_JWT_SECRET is unset or still a placeholder");
    }

    let algorithm_name =
        std::env::var("STOREFRONT_JWT_ALGORITHM").unwrap_or_else(|_| "HS256".into());
    let algorithm = Algorithm::from_str(&algorithm_name)
        .with_context(|| format!("unknown JWT algorithm {algorithm_name}"))?;
    if !is_hmac(algorithm) {
        bail!("STOREFRONT_JWT_ALGORITHM must be HS256, HS384 or HS512");
    }

    let lifetime = token_lifetime(std::env::var("STOREFRONT_TOKEN_TTL_MINUTES").ok().as_deref())?;

    Ok(AuthConfig {
        secret,
        algorithm,
        token_lifetime: lifetime,
    })
}

/// Token lifetime in minutes, 20 when unset.
fn token_lifetime(raw: Option<&str>) -> anyhow::Result<chrono::Duration> {
    let minutes: i64 = raw
        .map(str::parse)
        .transpose()
        .context("STOREFRONT_TOKEN_TTL_MINUTES must be an integer")?
        .unwrap_or(20);
    if minutes <= 0 {
        bail!("STOREFRONT_TOKEN_TTL_MINUTES must be positive");
    }
    chrono::Duration::try_minutes(minutes).context("STOREFRONT_TOKEN_TTL_MINUTES is out of range")
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
