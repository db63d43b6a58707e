//! Encryption filters — decide which property paths must be protected
//!
//! Filters are plugged in and out at runtime through `FilterRegistry`.
//! A path is supported when at least one registered filter supports it.

use crate::types::PropertyPath;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

/// Predicate deciding whether a property path should be encrypted
pub trait EncryptionFilter: Send + Sync {
    /// Filter name, used in logs and registry listings
    fn name(&self) -> &str;

    /// Whether the property at `path` must be stored protected
    fn supports(&self, path: &str) -> bool;
}

/// Process-wide, dynamically mutable set of encryption filters
///
/// Set semantics are by identity: registering the same `Arc` twice is a
/// no-op, while two distinct instances with equal configuration are both
/// kept. Queries evaluate a snapshot of the set, so filters may be added or
/// removed while saves are in flight.
pub struct FilterRegistry {
    filters: RwLock<Vec<Arc<dyn EncryptionFilter>>>,
}

impl FilterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            filters: RwLock::new(Vec::new()),
        }
    }

    /// Add a filter to the active set
    ///
    /// Returns `false` when this exact instance is already registered.
    pub fn register(&self, filter: Arc<dyn EncryptionFilter>) -> bool {
        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        if filters.iter().any(|f| Arc::ptr_eq(f, &filter)) {
            tracing::warn!(filter = %filter.name(), "Encryption filter already registered");
            return false;
        }
        tracing::info!(filter = %filter.name(), "Encryption filter registered");
        filters.push(filter);
        true
    }

    /// Remove a filter from the active set
    ///
    /// Returns `false` when the instance was not registered.
    pub fn unregister(&self, filter: &Arc<dyn EncryptionFilter>) -> bool {
        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        let before = filters.len();
        filters.retain(|f| !Arc::ptr_eq(f, filter));
        let removed = filters.len() != before;
        if removed {
            tracing::info!(filter = %filter.name(), "Encryption filter unregistered");
        }
        removed
    }

    /// Whether at least one registered filter supports `path`
    pub fn is_supported(&self, path: &str) -> bool {
        self.snapshot().iter().any(|f| f.supports(path))
    }

    /// Number of registered filters
    pub fn len(&self) -> usize {
        self.filters.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no filter is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of all registered filters, in registration order
    pub fn filter_names(&self) -> Vec<String> {
        self.snapshot().iter().map(|f| f.name().to_string()).collect()
    }

    /// Remove every filter
    pub fn clear(&self) {
        self.filters.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    // Filter code runs outside the lock.
    fn snapshot(&self) -> Vec<Arc<dyn EncryptionFilter>> {
        self.filters.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Matches properties by name (last path segment)
#[derive(Debug, Clone)]
pub struct PropertyNameFilter {
    name: String,
    names: HashSet<String>,
    case_insensitive: bool,
}

impl PropertyNameFilter {
    /// Match any of `names` exactly
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: HashSet<String> = names.into_iter().map(Into::into).collect();
        let mut sorted: Vec<&str> = names.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        Self {
            name: format!("property-name[{}]", sorted.join(",")),
            names,
            case_insensitive: false,
        }
    }

    /// Compare names ignoring ASCII case
    pub fn case_insensitive(mut self) -> Self {
        self.names = self.names.iter().map(|n| n.to_ascii_lowercase()).collect();
        self.case_insensitive = true;
        self
    }

    fn matches_name(&self, property_name: &str) -> bool {
        if self.case_insensitive {
            self.names.contains(&property_name.to_ascii_lowercase())
        } else {
            self.names.contains(property_name)
        }
    }
}

impl EncryptionFilter for PropertyNameFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, path: &str) -> bool {
        self.matches_name(PropertyPath::new(path).property_name())
    }
}

/// Matches paths ending with a fixed suffix (e.g., `/password`)
#[derive(Debug, Clone)]
pub struct PathSuffixFilter {
    name: String,
    suffix: String,
}

impl PathSuffixFilter {
    pub fn new(suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        Self {
            name: format!("path-suffix[{}]", suffix),
            suffix,
        }
    }
}

impl EncryptionFilter for PathSuffixFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, path: &str) -> bool {
        !self.suffix.is_empty() && path.ends_with(&self.suffix)
    }
}

/// Matches paths inside a subtree, optionally restricted to property names
#[derive(Debug, Clone)]
pub struct PathPrefixFilter {
    name: String,
    prefix: String,
    names: Option<PropertyNameFilter>,
}

impl PathPrefixFilter {
    /// Match every property under `prefix`
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            name: format!("path-prefix[{}]", prefix),
            prefix,
            names: None,
        }
    }

    /// Only match properties under the prefix whose name is listed
    pub fn with_names(mut self, names: PropertyNameFilter) -> Self {
        self.name = format!("path-prefix[{}]+{}", self.prefix, names.name());
        self.names = Some(names);
        self
    }
}

impl EncryptionFilter for PathPrefixFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, path: &str) -> bool {
        if !PropertyPath::new(path).is_under(&self.prefix) {
            return false;
        }
        match &self.names {
            Some(names) => names.supports(path),
            None => true,
        }
    }
}

/// Filter backed by an arbitrary closure
pub struct FnFilter<F> {
    name: String,
    predicate: F,
}

impl<F> FnFilter<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

impl<F> EncryptionFilter for FnFilter<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, path: &str) -> bool {
        (self.predicate)(path)
    }
}
