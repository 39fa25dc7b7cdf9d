use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use restaurant_backend::{
    AppState,
    cache::{Cache, MemoryCache, RedisCache},
    config::Config,
    database, routes,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(env = %config.app_env, "configuration loaded");

    let pool = database::connect(&config)
        .await
        .expect("Failed to connect to Postgres");
    tracing::info!("connected to database");

    if config.migrate {
        database::migrate(&pool)
            .await
            .expect("Failed to apply migrations");
        tracing::info!("database migrations applied");
    }

    let cache: Arc<dyn Cache> = if config.is_redis {
        let redis = RedisCache::open(&config.redis_url).expect("Failed to create Redis client");
        tracing::info!("using redis cache");
        Arc::new(redis)
    } else {
        tracing::warn!("IS_REDIS is off, falling back to the in-process cache");
        Arc::new(MemoryCache::new())
    };

    let state = AppState::new(pool, config, cache);
    let router = routes::app(state.clone());

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    state.pool.close().await;
    tracing::info!("database connection closed");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
