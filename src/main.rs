use std::sync::Arc;

use links_graphql::result_ext::ResultExt;
use links_graphql::store::postgres::create_pool;
use links_graphql::{
    build_schema, router, seed_users, AppConfig, MemoryStore, PgStore, SharedStore, TokenKeys,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let config = AppConfig::from_env().log("Failed to load configuration")?;
    tracing::info!(?config, "Configuration loaded");

    let in_memory = config.database_url.is_none();
    let store: SharedStore = match config.database_url.as_deref() {
        Some(url) => {
            let pool = create_pool(&config, url)
                .await
                .log("Failed to connect to database")?;
            let store = PgStore::new(pool);
            store.migrate().await.log("Failed to apply schema")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("APP_DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let seeds = config.seed_users().log("Invalid APP_SEED_USERS")?;
    let users = seed_users(store.as_ref(), &seeds)
        .await
        .log("Failed to seed users")?;

    let keys = TokenKeys::from_secret(config.secret.as_bytes());
    if in_memory {
        // dev tokens only; the in-memory store has no other way to sign in
        let expires_at = chrono::Utc::now() + chrono::Duration::hours(24);
        for user in &users {
            let token = keys.issue(user.id, Some(expires_at)).log("Failed to issue token")?;
            tracing::info!(user_id = user.id, email = %user.email, %token, "Development token");
        }
    }
    let app = router(build_schema(store), keys);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .log("Failed to bind to address")?;
    tracing::info!(%addr, "GraphQL endpoint http://{}/graphql", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .log("Failed to serve app")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
