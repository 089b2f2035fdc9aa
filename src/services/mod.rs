//! Services module
//!
//! Contains the credential rotation engine.

pub mod rotation;

pub use rotation::{
    CredentialConfig, CredentialHandle, FallbackChains, HealthPolicy, Orchestrator,
    ProviderFailure, RotationConfig, RotationError, RotationManager, StatusReport,
};
