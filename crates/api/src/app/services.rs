use std::sync::Arc;

use anyhow::Context;

use facilities_infra::{AppConfig, FacilityService, FacilityStore, InMemoryFacilityStore, PgFacilityStore};

/// Shared handles for every handler.
#[derive(Clone)]
pub struct AppServices {
    pub facility: FacilityService,
    /// Store backend name, for logs.
    pub backend: &'static str,
}

impl AppServices {
    pub fn new(store: Arc<dyn FacilityStore>, backend: &'static str, config: &AppConfig) -> Self {
        Self {
            facility: FacilityService::new(store, config.default_frequency),
            backend,
        }
    }

    /// Services over a fresh in-memory store.
    pub fn in_memory(config: &AppConfig) -> Self {
        Self::new(Arc::new(InMemoryFacilityStore::new()), "in-memory", config)
    }
}

/// Postgres when `DATABASE_URL` is configured, in-memory otherwise.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
        return Ok(AppServices::in_memory(config));
    };

    let store = PgFacilityStore::connect(url, config.max_connections)
        .await
        .context("failed to connect to postgres")?;

    if config.run_migrations {
        store.migrate().await.context("failed to apply migrations")?;
        tracing::info!("migrations applied");
    }

    tracing::info!(max_connections = config.max_connections, "using postgres store");
    Ok(AppServices::new(Arc::new(store), "postgres", config))
}
