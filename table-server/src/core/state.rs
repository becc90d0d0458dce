use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::MemoryCatalog;
use crate::core::{Config, Result};
use crate::handler::Handler;
use crate::message::MessageBus;
use crate::service::{TableService, TableStorage};

/// Server state - shared references to every service
///
/// Cheap to clone; all fields are `Arc`s or handles over shared state.
///
/// | Field | Type | Meaning |
/// |-------|------|---------|
/// | config | Config | Configuration (immutable) |
/// | storage | TableStorage | redb database |
/// | bus | Arc<MessageBus> | Realtime signal fan-out |
/// | catalog | Arc<MemoryCatalog> | Catalog cache used for snapshots |
/// | service | TableService | Tables, rounds, checkout, accounting |
/// | handler | Handler | Request layer over `service` |
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub storage: TableStorage,
    pub bus: Arc<MessageBus>,
    pub catalog: Arc<MemoryCatalog>,
    pub service: TableService,
    pub handler: Handler,
}

impl ServerState {
    /// Initialize the server state
    ///
    /// In order:
    /// 1. Working directory
    /// 2. Database (work_dir/db_file)
    /// 3. Message bus, catalog, services
    /// 4. Fixed table seeding
    pub fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;

        let db_path = config.db_path();
        let storage = TableStorage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Database opened");

        let bus = Arc::new(MessageBus::with_capacity(config.bus_channel_capacity));
        let catalog = Arc::new(MemoryCatalog::new());
        let service = TableService::new(storage.clone(), catalog.clone(), bus.clone())
            .with_timezone(config.timezone)
            .with_fixed_table_count(config.fixed_table_count);
        service.seed_fixed_tables(config.fixed_table_count)?;
        let handler = Handler::new(service.clone());

        Ok(Self {
            config: config.clone(),
            storage,
            bus,
            catalog,
            service,
            handler,
        })
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.work_dir)
    }

    pub fn message_bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }
}
