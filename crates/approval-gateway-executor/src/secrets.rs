//! Secret lookup seam.
//!
//! The vault is an external collaborator. Handlers ask a [`SecretSource`]
//! for a named secret right before the backend call and never return or
//! log its value.

use std::collections::HashMap;

/// Source of named secrets.
pub trait SecretSource: Send + Sync {
    /// Look up a secret. Empty values count as missing.
    fn get(&self, name: &str) -> Option<String>;

    /// First secret found among `names`.
    fn first_of(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|n| self.get(n))
    }
}

/// Reads secrets from process environment variables.
#[derive(Debug, Default, Clone)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Fixed in-memory secrets.
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl SecretSource for StaticSecrets {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).filter(|v| !v.trim().is_empty()).cloned()
    }
}
