use std::sync::Arc;
use std::time::Duration;

use cellarbook_infra::{InMemoryCatalog, StocktakeService};

use crate::config::ApiConfig;

/// Everything a handler needs: the engine and the catalog it reads from.
///
/// The catalog is the in-process dev seam; a deployment backed by a real
/// catalog service would hand the engine a different `ItemCatalog`.
pub struct AppServices {
    pub engine: StocktakeService,
    pub catalog: Arc<InMemoryCatalog>,
    pub sse_heartbeat: Duration,
}

pub fn build_services(config: &ApiConfig) -> AppServices {
    let catalog = Arc::new(InMemoryCatalog::new());
    let engine = StocktakeService::in_memory(catalog.clone(), config.engine.clone());
    tracing::info!(
        "stocktake engine ready (force close {})",
        if config.engine.allow_force_close { "allowed" } else { "disabled" }
    );

    AppServices {
        engine,
        catalog,
        sse_heartbeat: config.sse_heartbeat,
    }
}
