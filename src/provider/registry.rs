// src/provider/registry.rs
// Maps provider ids to adapter constructors so callers pick a service by name.

use std::collections::HashMap;
use thiserror::Error;

use super::{ElevenLabsAdapter, GroqAdapter, OpenAiAdapter, ProviderAdapter, ProviderError};
use crate::config::Credentials;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown provider {0:?}")]
    UnknownProvider(String),

    #[error("missing credential for provider {0:?}")]
    MissingCredential(String),

    #[error("failed to construct adapter for {provider:?}: {source}")]
    Construction {
        provider: String,
        #[source]
        source: ProviderError,
    },
}

pub type AdapterFactory = fn(&Credentials) -> Result<Box<dyn ProviderAdapter>, RegistryError>;

pub struct ProviderRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in adapters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("groq", |creds| {
            let key = creds
                .groq_api_key
                .clone()
                .ok_or_else(|| RegistryError::MissingCredential("groq".to_string()))?;
            let adapter = GroqAdapter::new(key).map_err(|e| RegistryError::Construction {
                provider: "groq".to_string(),
                source: e,
            })?;
            Ok(Box::new(adapter))
        });
        registry.register("openai", |creds| {
            let key = creds
                .openai_api_key
                .clone()
                .ok_or_else(|| RegistryError::MissingCredential("openai".to_string()))?;
            let adapter = OpenAiAdapter::new(key).map_err(|e| RegistryError::Construction {
                provider: "openai".to_string(),
                source: e,
            })?;
            Ok(Box::new(adapter))
        });
        registry.register("elevenlabs", |creds| {
            let key = creds
                .elevenlabs_api_key
                .clone()
                .ok_or_else(|| RegistryError::MissingCredential("elevenlabs".to_string()))?;
            let adapter = ElevenLabsAdapter::new(key).map_err(|e| RegistryError::Construction {
                provider: "elevenlabs".to_string(),
                source: e,
            })?;
            Ok(Box::new(adapter))
        });
        registry
    }

    pub fn register(&mut self, id: &str, factory: AdapterFactory) {
        self.factories.insert(id.to_string(), factory);
    }

    pub fn create(
        &self,
        id: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn ProviderAdapter>, RegistryError> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| RegistryError::UnknownProvider(id.to_string()))?;
        factory(credentials)
    }

    pub fn provider_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(|k| k.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ConcurrencyMode;

    #[test]
    fn unknown_provider_is_an_error() {
        let registry = ProviderRegistry::with_defaults();
        let err = registry.create("deepgram", &Credentials::default()).err().unwrap();
        assert!(matches!(err, RegistryError::UnknownProvider(_)));
    }

    #[test]
    fn missing_credential_is_an_error() {
        let registry = ProviderRegistry::with_defaults();
        let err = registry.create("groq", &Credentials::default()).err().unwrap();
        assert!(matches!(err, RegistryError::MissingCredential(_)));
    }

    #[test]
    fn creates_adapter_when_credential_present() {
        let registry = ProviderRegistry::with_defaults();
        let creds = Credentials {
            groq_api_key: Some("gsk_test".to_string()),
            ..Default::default()
        };
        let adapter = registry.create("groq", &creds).unwrap();
        assert_eq!(adapter.capability().name, "groq");
        assert_eq!(adapter.capability().concurrency, ConcurrencyMode::Parallel);
    }

    #[test]
    fn defaults_cover_all_three_providers() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.provider_ids(), vec!["elevenlabs", "groq", "openai"]);
    }
}
