use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::catalog::ProductCatalog;
use crate::config::{AppConfig, StoreBackend};
use crate::error::{AppError, AppResult};
use crate::store::{MemoryStore, Storage, StoreActor};
use crate::workflow::OrderWorkflow;

/// The running application: storage plus the handles callers use.
///
/// Responsible for starting the store, wiring the workflow and catalog to
/// it, and shutting it down.
pub struct OrderSystem {
    pub workflow: OrderWorkflow,
    pub catalog: ProductCatalog,
    memory: Option<MemoryStore>,
    handles: Vec<JoinHandle<()>>,
}

impl OrderSystem {
    /// Starts the backend selected by `config`.
    #[instrument(skip(config), fields(backend = config.backend.as_str()))]
    pub async fn start(config: &AppConfig) -> AppResult<Self> {
        match config.backend {
            StoreBackend::Memory => Ok(Self::in_memory(config)),
            StoreBackend::Postgres => Self::connect_postgres(config).await,
        }
    }

    /// Spawns the store actor and wires everything to it.
    pub fn in_memory(config: &AppConfig) -> Self {
        let (actor, store) = StoreActor::new(config.mailbox_size, config.transaction_timeout);
        let handle = tokio::spawn(actor.run());
        info!("In-memory store started");

        let storage: Arc<dyn Storage> = Arc::new(store.clone());
        Self {
            workflow: OrderWorkflow::new(storage.clone()),
            catalog: ProductCatalog::new(storage),
            memory: Some(store),
            handles: vec![handle],
        }
    }

    #[cfg(feature = "postgres")]
    async fn connect_postgres(config: &AppConfig) -> AppResult<Self> {
        use crate::store::postgres::{PostgresConfig, PostgresStore};

        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| crate::config::ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;
        let pg_config = PostgresConfig {
            max_connections: config.max_connections,
            ..PostgresConfig::default()
        };
        let store = PostgresStore::connect(url, &pg_config).await?;
        store.migrate().await?;
        info!("PostgreSQL store connected");

        let storage: Arc<dyn Storage> = Arc::new(store);
        Ok(Self {
            workflow: OrderWorkflow::new(storage.clone()),
            catalog: ProductCatalog::new(storage),
            memory: None,
            handles: Vec::new(),
        })
    }

    #[cfg(not(feature = "postgres"))]
    async fn connect_postgres(_config: &AppConfig) -> AppResult<Self> {
        Err(AppError::BackendUnavailable(
            "built without the `postgres` feature".to_string(),
        ))
    }

    /// Stops the store actor, if any, after it drains queued requests.
    pub async fn shutdown(self) -> AppResult<()> {
        info!("Shutting down system...");
        if let Some(store) = &self.memory {
            store.shutdown().await?;
        }

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Actor task failed: {:?}", e);
                return Err(AppError::ActorTask(e.to_string()));
            }
        }

        info!("System shutdown complete.");
        Ok(())
    }
}
