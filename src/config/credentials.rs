//! Credential catalogue
//!
//! Maps the provider key variables found in the environment onto the
//! credential list a [`RotationManager`](crate::services::rotation::RotationManager)
//! is built from.

use std::env;

use crate::services::rotation::CredentialConfig;

/// One logical service and where its keys come from
#[derive(Debug, Clone, Copy)]
pub struct ProviderSpec {
    pub service: &'static str,
    /// Prefix of each credential label (`{label}_{n}`)
    pub label: &'static str,
    pub key_vars: &'static [&'static str],
    pub base_url: &'static str,
    /// Variable that overrides `base_url`, if any
    pub base_url_var: Option<&'static str>,
    pub max_requests_per_minute: u32,
}

/// Every service the rotation engine knows about
pub const PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        service: "qwen",
        label: "qwen",
        key_vars: &[
            "OPENROUTER_API_KEY",
            "OPENROUTER_API_KEY_1",
            "OPENROUTER_API_KEY_2",
            "OPENROUTER_API_KEY_3",
            "OPENROUTER_API_KEY_4",
            "OPENROUTER_API_KEY_5",
            "OPENROUTER_API_KEY_6",
            "OPENROUTER_API_KEY_7",
            "OPENROUTER_API_KEY_8",
            "OPENROUTER_API_KEY_9",
        ],
        base_url: "https://openrouter.ai/api/v1",
        base_url_var: Some("OPENROUTER_BASE_URL"),
        max_requests_per_minute: 100,
    },
    ProviderSpec {
        service: "gemini",
        label: "gemini",
        key_vars: &["GEMINI_API_KEY", "GEMINI_API_KEY_1"],
        base_url: "https://generativelanguage.googleapis.com/v1beta",
        base_url_var: None,
        max_requests_per_minute: 60,
    },
    ProviderSpec {
        service: "groq",
        label: "groq",
        key_vars: &["GROQ_API_KEY", "GROQ_API_KEY_1"],
        base_url: "https://api.groq.com/openai/v1",
        base_url_var: None,
        max_requests_per_minute: 30,
    },
    ProviderSpec {
        service: "tavily",
        label: "tavily",
        key_vars: &["TAVILY_API_KEY"],
        base_url: "https://api.tavily.com",
        base_url_var: None,
        max_requests_per_minute: 100,
    },
    ProviderSpec {
        service: "exa",
        label: "exa",
        key_vars: &["EXA_API_KEY", "EXA_API_KEY_1"],
        base_url: "https://api.exa.ai",
        base_url_var: None,
        max_requests_per_minute: 100,
    },
    ProviderSpec {
        service: "serpapi",
        label: "serper",
        key_vars: &["SERPER_API_KEY"],
        base_url: "https://google.serper.dev/search",
        base_url_var: None,
        max_requests_per_minute: 100,
    },
    ProviderSpec {
        service: "youtube",
        label: "youtube",
        key_vars: &["YOUTUBE_API_KEY"],
        base_url: "https://www.googleapis.com/youtube/v3",
        base_url_var: None,
        max_requests_per_minute: 100,
    },
];

const PLACEHOLDER_PREFIX: &str = "your_";

/// Credentials discovered at startup, grouped by service
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    services: Vec<String>,
    credentials: Vec<CredentialConfig>,
}

impl ProviderCatalog {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut catalog = Self::default();

        for provider in PROVIDERS {
            catalog.services.push(provider.service.to_string());

            let base_url = provider
                .base_url_var
                .and_then(&lookup)
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| provider.base_url.to_string());

            let mut secrets: Vec<String> = Vec::new();
            for var in provider.key_vars {
                let Some(value) = lookup(var) else { continue };
                let value = value.trim();
                if value.is_empty() || value.starts_with(PLACEHOLDER_PREFIX) {
                    continue;
                }
                if secrets.iter().any(|s| s == value) {
                    tracing::debug!(service = provider.service, var = *var, "Skipping duplicate key");
                    continue;
                }
                secrets.push(value.to_string());
            }

            for (n, secret) in secrets.into_iter().enumerate() {
                catalog.credentials.push(CredentialConfig::new(
                    provider.service,
                    format!("{}_{}", provider.label, n + 1),
                    secret,
                    base_url.clone(),
                    provider.max_requests_per_minute,
                ));
            }
        }

        catalog
    }

    /// Every known service, including those without a key
    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub fn credentials(&self) -> &[CredentialConfig] {
        &self.credentials
    }

    pub fn into_credentials(self) -> Vec<CredentialConfig> {
        self.credentials
    }

    pub fn count_for(&self, service: &str) -> usize {
        self.credentials.iter().filter(|c| c.service == service).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn catalog(vars: &[(&str, &str)]) -> ProviderCatalog {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        ProviderCatalog::from_lookup(|key| map.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_empty_environment_registers_every_service() {
        let catalog = catalog(&[]);
        assert_eq!(catalog.services().len(), PROVIDERS.len());
        assert!(catalog.credentials().is_empty());
    }

    #[test]
    fn test_labels_follow_loaded_keys() {
        let catalog = catalog(&[
            ("OPENROUTER_API_KEY", "sk-or-v1-main"),
            ("OPENROUTER_API_KEY_1", ""),
            ("OPENROUTER_API_KEY_2", "your_openrouter_key_here"),
            ("OPENROUTER_API_KEY_3", "sk-or-v1-third"),
            ("OPENROUTER_API_KEY_4", "sk-or-v1-main"),
        ]);

        let names: Vec<&str> = catalog.credentials().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["qwen_1", "qwen_2"]);
        assert_eq!(catalog.credentials()[1].secret, "sk-or-v1-third");
        assert_eq!(catalog.count_for("qwen"), 2);
    }

    #[test]
    fn test_base_url_override_and_rpm() {
        let catalog = catalog(&[
            ("OPENROUTER_API_KEY", "sk-or-v1-main"),
            ("OPENROUTER_BASE_URL", "http://localhost:9999/v1"),
            ("GROQ_API_KEY", "gsk_abc"),
            ("SERPER_API_KEY", "serper-secret"),
        ]);

        let qwen = &catalog.credentials()[0];
        assert_eq!(qwen.base_url, "http://localhost:9999/v1");
        assert_eq!(qwen.max_requests_per_minute, 100);

        let groq = catalog.credentials().iter().find(|c| c.service == "groq").unwrap();
        assert_eq!(groq.max_requests_per_minute, 30);

        let serper = catalog.credentials().iter().find(|c| c.service == "serpapi").unwrap();
        assert_eq!(serper.name, "serper_1");
    }
}
