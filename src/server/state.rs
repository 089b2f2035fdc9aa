//! Application state container
//!
//! Shared state handed to every handler through Axum's state extraction.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{ProviderCatalog, Settings};
use crate::services::rotation::{Orchestrator, RotationManager};

/// Shared application state
///
/// Cheap to clone; the manager carries its own lock.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,

    pub manager: Arc<RotationManager>,

    /// Application start time (for uptime calculation)
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings, manager: Arc<RotationManager>) -> Self {
        Self {
            settings: Arc::new(settings),
            manager,
            start_time: Instant::now(),
        }
    }

    /// Build the rotation manager from the settings and a credential catalogue
    pub fn from_catalog(settings: Settings, catalog: ProviderCatalog) -> anyhow::Result<Self> {
        let manager = build_manager(&settings, catalog)?;
        tracing::info!("Application state initialized successfully");
        Ok(Self::new(settings, Arc::new(manager)))
    }

    /// Get the application uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn requires_admin_key(&self) -> bool {
        self.settings.admin_api_key.is_some()
    }

    /// Orchestrator for outbound calls, with retry behaviour from the settings
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.manager.clone())
            .with_retry(self.settings.retry_config())
            .with_abort_on_payment_required(self.settings.rotation.abort_on_payment_required)
    }
}

pub fn build_manager(settings: &Settings, catalog: ProviderCatalog) -> anyhow::Result<RotationManager> {
    let services = catalog.services().to_vec();
    let manager = RotationManager::builder(settings.rotation_config()?)
        .services(services)
        .credentials(catalog.into_credentials())
        .build()?;
    Ok(manager)
}
