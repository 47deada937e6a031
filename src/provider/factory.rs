// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider construction by name.
//!
//! Constructors are registered explicitly, once, at process start:
//!
//! ```rust
//! use zonemux::provider::factory::{register_builtin_providers, ProviderFactory};
//!
//! let mut factory = ProviderFactory::new();
//! register_builtin_providers(&mut factory);
//! assert!(factory.is_registered("inmemory"));
//! ```

use super::{google, inmemory, rfc2136, Credentials, Provider, ProviderConfig};
use crate::constants::{PROVIDER_GOOGLE, PROVIDER_INMEMORY, PROVIDER_RFC2136};
use crate::errors::ConfigError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds a provider from its credentials and shared configuration.
pub type ProviderConstructor =
    fn(&Credentials, ProviderConfig) -> Result<Arc<dyn Provider>, ConfigError>;

/// Registry of provider constructors keyed by provider name.
#[derive(Clone, Default)]
pub struct ProviderFactory {
    constructors: BTreeMap<String, ProviderConstructor>,
}

impl ProviderFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, constructor: ProviderConstructor) {
        let name = name.into();
        debug!(provider = %name, "Registering DNS provider");
        self.constructors.insert(name, constructor);
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered provider names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Construct the provider registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProvider`] for unregistered names and the
    /// constructor's own [`ConfigError`] otherwise.
    pub fn build(
        &self,
        name: &str,
        credentials: &Credentials,
        config: ProviderConfig,
    ) -> Result<Arc<dyn Provider>, ConfigError> {
        let constructor =
            self.constructors
                .get(name)
                .ok_or_else(|| ConfigError::UnknownProvider {
                    name: name.to_string(),
                    registered: self.names().join(", "),
                })?;
        let provider = constructor(credentials, config)?;
        info!(provider = %name, "DNS provider constructed");
        Ok(provider)
    }
}

/// Register every provider shipped with zonemux.
pub fn register_builtin_providers(factory: &mut ProviderFactory) {
    factory.register(PROVIDER_GOOGLE, google::build);
    factory.register(PROVIDER_RFC2136, rfc2136::build);
    factory.register(PROVIDER_INMEMORY, inmemory::build);
}

#[cfg(test)]
#[path = "factory_tests.rs"]
mod factory_tests;
