use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use auth::{
    AppState, AuthGateway, CredentialVault, SessionStore, TokenCipher, TokenCodec,
    config::ServerConfig,
    create_router,
    github::{GitHubClient, GitHubConfig},
    repositories::{self, PgCredentialRepository, PgSessionRepository, PgUserRepository},
    token::TokenConfig,
};
use common::database;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting authentication service");

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    repositories::migrate(&pool).await?;

    let server_config = ServerConfig::from_env()?;
    let token_config = TokenConfig::from_env()?;
    let cipher = TokenCipher::from_secret(&token_config.secret);
    let codec = TokenCodec::new(token_config);

    let sessions = SessionStore::new(Arc::new(PgSessionRepository::new(pool.clone())));
    let expired = sessions.deactivate_expired().await?;
    if expired > 0 {
        info!("Deactivated {} expired sessions", expired);
    }

    let github = GitHubClient::new(GitHubConfig::from_env())?;
    let vault = CredentialVault::new(
        cipher,
        Arc::new(PgCredentialRepository::new(pool.clone())),
        Arc::new(github),
    );

    let gateway = AuthGateway::new(
        codec,
        sessions,
        Arc::new(PgUserRepository::new(pool)),
        server_config.session_ttl,
    );

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = create_router(AppState { gateway, vault });

    let listener = tokio::net::TcpListener::bind(&server_config.bind_address).await?;
    info!(
        "Authentication service listening on {}",
        server_config.bind_address
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
