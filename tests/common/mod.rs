//! Shared helpers for integration tests.

use std::sync::Arc;

use api_rotation::services::rotation::{
    CredentialConfig, FallbackChains, ManualClock, RotationConfig, RotationManager,
};

pub fn credential(service: &str, name: &str, rpm: u32) -> CredentialConfig {
    CredentialConfig::new(
        service,
        name,
        format!("sk-{}-{}-0123456789abcdef", service, name),
        format!("https://{}.example.com/v1", service),
        rpm,
    )
}

/// Manager over qwen/gemini/groq with the default fallback chains
#[allow(dead_code)]
pub fn manager_with(
    clock: Arc<ManualClock>,
    credentials: Vec<CredentialConfig>,
) -> RotationManager {
    RotationManager::builder(
        RotationConfig::default().with_fallbacks(FallbackChains::llm_defaults()),
    )
    .clock(clock)
    .services(["qwen", "gemini", "groq", "tavily"])
    .credentials(credentials)
    .build()
    .expect("manager builds")
}
