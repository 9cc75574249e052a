//! Infrastructure layer: engine services, stores, catalog seam, broadcasting, config.

pub mod broadcaster;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod period_manager;
pub mod service;
pub mod snapshot_store;
pub mod store;

mod engine;

pub use broadcaster::{ChangeBroadcaster, PeriodSubscription, StocktakeEnvelope};
pub use catalog::{CatalogMovement, InMemoryCatalog, ItemCatalog};
pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use ledger::{MovementLedger, RecordedMovement, UpdatedMovement};
pub use period_manager::{CloseOutcome, PeriodManager, PeriodView, PopulateOutcome};
pub use service::{InMemoryBus, StocktakeService};
pub use snapshot_store::{ClosedPeriod, InMemorySnapshotStore, SnapshotStore};
pub use store::{InMemoryStocktakeStore, StocktakeStore, StoreError};
