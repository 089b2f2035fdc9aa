//! Configuration management module
//!
//! Loads settings and the credential catalogue from environment variables and
//! `.env` files.

pub mod credentials;
pub mod settings;

pub use credentials::{ProviderCatalog, ProviderSpec, PROVIDERS};
pub use settings::{Environment, RotationSettings, Settings};
