use std::sync::Arc;

use auth::TokenService;
use cache::Cache;
use config::Config;
use database::UserStore;
use sqlx::PgPool;

pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod utils;
pub mod validation;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub cache: Arc<dyn Cache>,
    pub tokens: Arc<TokenService>,
    pub users: UserStore,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, cache: Arc<dyn Cache>) -> Self {
        let tokens = Arc::new(TokenService::from_config(&config));
        let users = UserStore::new(
            pool.clone(),
            cache.clone(),
            tokens.clone(),
            config.cache_ttl(),
        );

        Self {
            pool,
            config: Arc::new(config),
            cache,
            tokens,
            users,
        }
    }
}
