use std::sync::Arc;

use crate::auth::{
    jwt::JwtKeys,
    memory::MemoryUserStore,
    repo::{PgUserStore, UserStore},
};
use crate::config::AppConfig;
use crate::db;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub keys: JwtKeys,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Reads configuration, builds signing keys and connects to Postgres.
    /// Any failure here is fatal for the process.
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let pool = db::connect(&config.database_url).await?;
        db::migrate(&pool).await?;
        Self::from_parts(config, Arc::new(PgUserStore::new(pool)))
    }

    pub fn from_parts(config: AppConfig, users: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let keys = JwtKeys::from_config(&config.jwt)?;
        Ok(Self {
            users,
            keys,
            config: Arc::new(config),
        })
    }

    /// State backed by an in-memory store and the test configuration.
    pub fn fake() -> Self {
        Self::fake_with_store(Arc::new(MemoryUserStore::new()))
    }

    pub fn fake_with_store(users: Arc<dyn UserStore>) -> Self {
        let config = AppConfig::for_tests();
        let keys = JwtKeys::from_config(&config.jwt).expect("test jwt config is valid");
        Self {
            users,
            keys,
            config: Arc::new(config),
        }
    }
}
