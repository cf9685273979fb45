//! Service wiring: stores, codec, hasher and the application services.

use std::sync::Arc;

use propdesk_auth::{Argon2PasswordHasher, PasswordHasher, TokenCodec};
use propdesk_infra::Stores;
use propdesk_infra::services::{AccountService, CompanyService, LocationService, UserService};

use crate::config::{ApiConfig, StorageBackend};

#[derive(Debug, Clone)]
pub struct AppServices {
    pub codec: Arc<TokenCodec>,
    pub accounts: AccountService,
    pub companies: CompanyService,
    pub users: UserService,
    pub locations: LocationService,
}

impl AppServices {
    pub fn new(stores: Stores, codec: Arc<TokenCodec>, hasher: Arc<dyn PasswordHasher>) -> Self {
        let companies = CompanyService::new(stores.clone(), codec.clone());
        let accounts = AccountService::new(stores.clone(), codec.clone(), hasher, companies.clone());
        let users = UserService::new(stores.clone(), accounts.clone());
        let locations = LocationService::new(stores);

        Self {
            codec,
            accounts,
            companies,
            users,
            locations,
        }
    }

    /// In-memory stores with Argon2id hashing.
    pub fn in_memory(codec: Arc<TokenCodec>) -> Self {
        Self::new(Stores::in_memory(), codec, Arc::new(Argon2PasswordHasher::new()))
    }

    /// Build from configuration, connecting (and migrating) Postgres when
    /// selected.
    pub async fn from_config(config: &ApiConfig) -> anyhow::Result<Self> {
        let codec = Arc::new(TokenCodec::new(
            config.auth.jwt_secret.as_bytes(),
            config.auth.token_settings(),
        )?);

        let stores = match config.storage.backend {
            StorageBackend::Memory => {
                tracing::warn!("using in-memory storage; data is lost on restart");
                Stores::in_memory()
            }
            StorageBackend::Postgres => postgres_stores(config).await?,
        };

        Ok(Self::new(stores, codec, Arc::new(Argon2PasswordHasher::new())))
    }
}

#[cfg(feature = "postgres")]
async fn postgres_stores(config: &ApiConfig) -> anyhow::Result<Stores> {
    use anyhow::Context;

    let url = config
        .storage
        .database_url
        .as_deref()
        .context("storage.database_url is required for the postgres backend")?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.storage.max_connections)
        .connect(url)
        .await
        .context("failed to connect to postgres")?;
    propdesk_infra::store::postgres::migrate(&pool).await?;
    tracing::info!("connected to postgres");

    Ok(Stores::postgres(pool))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_stores(_config: &ApiConfig) -> anyhow::Result<Stores> {
    anyhow::bail!("the postgres backend requires building with the `postgres` feature")
}
