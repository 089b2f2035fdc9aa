//! Cross-service fallback chains

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Ordered alternates per logical service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FallbackChains {
    chains: BTreeMap<String, Vec<String>>,
}

impl FallbackChains {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three sibling model services back each other up
    pub fn llm_defaults() -> Self {
        Self::new()
            .with_chain("qwen", ["gemini", "groq"])
            .with_chain("gemini", ["qwen", "groq"])
            .with_chain("groq", ["qwen", "gemini"])
    }

    /// Set the chain for a service; the service itself and repeats are dropped
    pub fn with_chain<I, S>(mut self, service: impl Into<String>, alternates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let service = service.into();
        let mut chain: Vec<String> = Vec::new();
        for alternate in alternates {
            let alternate = alternate.into();
            if alternate != service && !chain.contains(&alternate) {
                chain.push(alternate);
            }
        }
        self.chains.insert(service, chain);
        self
    }

    pub fn for_service(&self, service: &str) -> &[String] {
        self.chains.get(service).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Parse `primary=alt1,alt2;other=alt3`
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut chains = Self::new();
        for entry in input.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (service, alternates) = entry
                .split_once('=')
                .ok_or_else(|| format!("Fallback entry '{}' is missing '='", entry))?;
            let service = service.trim();
            if service.is_empty() {
                return Err(format!("Fallback entry '{}' has no service name", entry));
            }
            let alternates: Vec<&str> = alternates
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .collect();
            if alternates.contains(&service) {
                return Err(format!("Service '{}' cannot fall back to itself", service));
            }
            chains = chains.with_chain(service, alternates);
        }
        Ok(chains)
    }
}

impl fmt::Display for FallbackChains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .chains
            .iter()
            .map(|(service, chain)| format!("{}={}", service, chain.join(",")))
            .collect();
        f.write_str(&entries.join(";"))
    }
}
