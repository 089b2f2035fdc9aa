//! Credential Rotation Module
//!
//! Keeps pools of API credentials per logical service and decides, for each
//! outbound call, which credential to use. Credential health is tracked by a
//! lazily-evaluated state machine; failures put credentials into cooldowns
//! whose length depends on how the provider failed.
//!
//! # Features
//! - Round-robin-with-skip selection over each pool
//! - Per-minute request caps, error thresholds and classified cooldowns
//! - Retry with exponential backoff and cross-service fallback chains
//! - Read-only status reports and Prometheus counters for every signal
//!
//! # Example
//! ```ignore
//! use api_rotation::services::rotation::{
//!     CredentialConfig, Orchestrator, ProviderFailure, RotationConfig, RotationManager,
//! };
//!
//! let manager = RotationManager::builder(RotationConfig::default())
//!     .credential(CredentialConfig::new("groq", "groq_1", key, "https://api.groq.com/openai/v1", 30))
//!     .build()?;
//! let orchestrator = Orchestrator::new(Arc::new(manager));
//!
//! let body = orchestrator
//!     .execute("groq", |handle| {
//!         let client = client.clone();
//!         async move {
//!             let response = handle
//!                 .authorize(client.post(handle.endpoint("chat/completions")))
//!                 .json(&payload)
//!                 .send()
//!                 .await?;
//!             let status = response.status();
//!             if status.is_success() {
//!                 Ok(response.text().await?)
//!             } else {
//!                 // Non-2xx responses must be reported so the key gets its cooldown
//!                 let body = response.text().await.unwrap_or_default();
//!                 Err(ProviderFailure::from_status(status.as_u16(), body))
//!             }
//!         }
//!     })
//!     .await?;
//! ```

mod classify;
mod clock;
mod credential;
mod error;
mod fallback;
mod health;
mod manager;
mod metrics;
mod orchestrator;
mod pool;
mod report;
mod selector;

pub use classify::{classify_message, CooldownPolicy, FailureKind, ProviderFailure};
pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::{ApiStatus, CredentialConfig, CredentialHandle, CredentialRecord, CredentialState};
pub use error::RotationError;
pub use fallback::FallbackChains;
pub use health::{FailureOutcome, HealthPolicy, Projection, Transition};
pub use manager::{RotationConfig, RotationManager, RotationManagerBuilder, SelectedCredential};
pub use metrics::{AttemptOutcome, RotationMetrics, Signal};
pub use orchestrator::Orchestrator;
pub use pool::{Pool, PoolTransition};
pub use report::{CredentialReport, HealthStatus, ServiceReport, ServiceSummary, StatusReport};
pub use selector::{select_next, Selection};
