use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pecup::{
    api,
    auth::TokenVerifier,
    config::{Config, StorageBackend},
    lookup_cache::LookupCache,
    object_store as obj,
    storage::Database,
    AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "pecup starting");

    // Load configuration
    let config = Config::load()?;
    info!(
        superadmins = config.auth.superadmin_emails.len(),
        test_mode = config.test_mode,
        "Loaded configuration"
    );

    // Initialize database
    let db = Database::open(&config.node.data_dir)?;
    info!("Database opened at: {}", config.node.data_dir);

    // Initialize object store backend
    let object_store: Arc<dyn obj::ObjectStore> = match config.storage.backend {
        StorageBackend::Local => {
            let store = obj::LocalStore::new(&config.storage.local_storage_path)?;
            info!(
                "Using local storage backend at: {}",
                config.storage.local_storage_path
            );
            Arc::new(store)
        }
        StorageBackend::Supabase => {
            let (Some(url), Some(key)) = (
                config.storage.supabase_url.as_deref(),
                config.storage.supabase_service_key.as_deref(),
            ) else {
                anyhow::bail!("SUPABASE_URL and SUPABASE_SERVICE_KEY must be set");
            };
            let store = obj::SupabaseStore::new(url, key, &config.storage.supabase_bucket)?;
            info!(
                "Using Supabase storage backend, bucket: {}",
                config.storage.supabase_bucket
            );
            Arc::new(store)
        }
    };

    let lookups = LookupCache::new(
        db.clone(),
        Duration::from_secs(config.lookup_cache_ttl_secs),
    );
    let verifier = TokenVerifier::new(&config.auth.jwt_secret);

    // Create shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        lookups,
        object_store,
        verifier,
    });

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
