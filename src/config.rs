//! Declarative configuration for filters and protection keys
//!
//! Lets a host describe its encryption filters and AES keys as JSON and
//! build the registry and gateway from it, instead of wiring each filter by
//! hand.

use crate::crypto::{validate_key_id, Aes256GcmGateway};
use crate::error::{ProtectError, Result};
use crate::filter::{
    EncryptionFilter, FilterRegistry, PathPrefixFilter, PathSuffixFilter, PropertyNameFilter,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// One configured encryption filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum FilterSpec {
    /// Match by property name
    #[serde(rename_all = "camelCase")]
    PropertyName {
        names: Vec<String>,
        #[serde(default)]
        case_insensitive: bool,
    },
    /// Match by path suffix
    PathSuffix { suffix: String },
    /// Match a subtree, optionally restricted to property names
    PathPrefix {
        prefix: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        names: Vec<String>,
    },
}

impl FilterSpec {
    fn validate(&self) -> Result<()> {
        match self {
            Self::PropertyName { names, .. } if names.is_empty() => Err(ProtectError::Config(
                "propertyName filter needs at least one name".to_string(),
            )),
            Self::PropertyName { names, .. } | Self::PathPrefix { names, .. }
                if names.iter().any(|n| n.is_empty()) =>
            {
                Err(ProtectError::Config(
                    "Filter property names must not be empty".to_string(),
                ))
            }
            Self::PathSuffix { suffix } if suffix.is_empty() => Err(ProtectError::Config(
                "pathSuffix filter needs a non-empty suffix".to_string(),
            )),
            Self::PathPrefix { prefix, .. } if !prefix.starts_with('/') => {
                Err(ProtectError::Config(format!(
                    "pathPrefix filter needs an absolute prefix, got '{}'",
                    prefix
                )))
            }
            _ => Ok(()),
        }
    }

    /// Instantiate the filter
    pub fn build(&self) -> Arc<dyn EncryptionFilter> {
        match self {
            Self::PropertyName {
                names,
                case_insensitive,
            } => {
                let filter = PropertyNameFilter::new(names.iter().cloned());
                if *case_insensitive {
                    Arc::new(filter.case_insensitive())
                } else {
                    Arc::new(filter)
                }
            }
            Self::PathSuffix { suffix } => Arc::new(PathSuffixFilter::new(suffix.clone())),
            Self::PathPrefix { prefix, names } => {
                let filter = PathPrefixFilter::new(prefix.clone());
                if names.is_empty() {
                    Arc::new(filter)
                } else {
                    Arc::new(filter.with_names(PropertyNameFilter::new(names.iter().cloned())))
                }
            }
        }
    }
}

/// A named AES-256 key, base64-encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySpec {
    pub id: String,
    pub key: String,
}

impl KeySpec {
    fn decode(&self) -> Result<[u8; 32]> {
        validate_key_id(&self.id)?;
        let bytes = BASE64.decode(&self.key).map_err(|e| {
            ProtectError::Config(format!("Key '{}' is not valid base64: {}", self.id, e))
        })?;
        bytes.try_into().map_err(|b: Vec<u8>| {
            ProtectError::Config(format!(
                "Key '{}' must be 32 bytes, got {}",
                self.id,
                b.len()
            ))
        })
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectConfig {
    /// Filters registered at startup
    #[serde(default)]
    pub filters: Vec<FilterSpec>,

    /// Keys available to the gateway
    #[serde(default)]
    pub keys: Vec<KeySpec>,

    /// Key used for new protections; defaults to the first key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_key: Option<String>,
}

impl ProtectConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ProtectError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_json(&json)?;
        tracing::debug!(
            path = %path.display(),
            filters = config.filters.len(),
            keys = config.keys.len(),
            "Protect config loaded"
        );
        Ok(config)
    }

    /// Check filters and keys without building anything
    pub fn validate(&self) -> Result<()> {
        for filter in &self.filters {
            filter.validate()?;
        }
        for key in &self.keys {
            key.decode()?;
        }
        if let Some(active) = &self.active_key {
            if !self.keys.iter().any(|k| &k.id == active) {
                return Err(ProtectError::Config(format!(
                    "Active key '{}' is not among the configured keys",
                    active
                )));
            }
        }
        Ok(())
    }

    /// Instantiate every configured filter
    pub fn build_filters(&self) -> Vec<Arc<dyn EncryptionFilter>> {
        self.filters.iter().map(FilterSpec::build).collect()
    }

    /// Registry pre-populated with the configured filters
    pub fn build_registry(&self) -> FilterRegistry {
        let registry = FilterRegistry::new();
        for filter in self.build_filters() {
            registry.register(filter);
        }
        registry
    }

    /// AES-256-GCM gateway holding every configured key
    pub fn build_gateway(&self) -> Result<Aes256GcmGateway> {
        let (first, rest) = self
            .keys
            .split_first()
            .ok_or_else(|| ProtectError::Config("No protection keys configured".to_string()))?;

        let mut gateway = Aes256GcmGateway::new(first.id.clone(), &first.decode()?)?;
        for key in rest {
            gateway.add_key(key.id.clone(), &key.decode()?)?;
        }
        if let Some(active) = &self.active_key {
            gateway.rotate_to(active)?;
        }
        Ok(gateway)
    }
}
