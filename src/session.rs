//! Repository session seam
//!
//! The host owns the repository and its transactions. The pipeline only
//! needs to read a property, and to write a new value into the same
//! session; committing is the host's job.

use crate::error::{ProtectError, Result};
use std::cell::Cell;
use std::collections::{BTreeMap, HashSet};

/// A property read from the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Absolute property path
    pub path: String,

    /// Stored string value; `None` when the property holds no value
    pub value: Option<String>,
}

impl Property {
    pub fn new(path: impl Into<String>, value: Option<String>) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }

    /// String value, with a missing value read as the empty string
    pub fn get_string(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

/// Request-scoped repository session
pub trait Session {
    /// Read the property at `path`
    ///
    /// Returns `Ok(None)` if the property does not exist. `Err` is reserved
    /// for real access failures (permissions, storage errors).
    fn get_property(&self, path: &str) -> Result<Option<Property>>;

    /// Set the value of the property at `path` within this session
    fn set_property(&mut self, path: &str, value: &str) -> Result<()>;
}

/// Request context handed to save hooks by the host
pub trait RequestContext {
    /// The repository session bound to this request, if any
    fn session(&mut self) -> Option<&mut dyn Session>;
}

/// In-memory session for testing and stand-alone use
///
/// Properties are kept in a sorted map. Reads and writes can be made to
/// fail for chosen paths to simulate repository access errors.
#[derive(Debug, Default, Clone)]
pub struct MemorySession {
    properties: BTreeMap<String, Option<String>>,
    read_failures: HashSet<String>,
    write_failures: HashSet<String>,
    reads: Cell<usize>,
    writes: usize,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a property with a value
    pub fn with_property(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(path.into(), Some(value.into()));
        self
    }

    /// Builder-style insert of a property without a value
    pub fn with_empty_property(mut self, path: impl Into<String>) -> Self {
        self.properties.insert(path.into(), None);
        self
    }

    /// Make every read of `path` fail
    pub fn fail_reads(mut self, path: impl Into<String>) -> Self {
        self.read_failures.insert(path.into());
        self
    }

    /// Make every write to `path` fail
    pub fn fail_writes(mut self, path: impl Into<String>) -> Self {
        self.write_failures.insert(path.into());
        self
    }

    /// Remove a property, returning whether it existed
    pub fn remove(&mut self, path: &str) -> bool {
        self.properties.remove(path).is_some()
    }

    /// Current value of a property (`None` if absent or empty)
    pub fn value(&self, path: &str) -> Option<&str> {
        self.properties.get(path).and_then(|v| v.as_deref())
    }

    /// Whether a property exists
    pub fn contains(&self, path: &str) -> bool {
        self.properties.contains_key(path)
    }

    /// Number of property reads served (including failed ones)
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    /// Number of successful property writes
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Session for MemorySession {
    fn get_property(&self, path: &str) -> Result<Option<Property>> {
        self.reads.set(self.reads.get() + 1);
        if self.read_failures.contains(path) {
            return Err(ProtectError::repository(path, "read access denied"));
        }
        Ok(self
            .properties
            .get(path)
            .map(|value| Property::new(path, value.clone())))
    }

    fn set_property(&mut self, path: &str, value: &str) -> Result<()> {
        if self.write_failures.contains(path) {
            return Err(ProtectError::repository(path, "write access denied"));
        }
        if !self.properties.contains_key(path) {
            return Err(ProtectError::repository(path, "property does not exist"));
        }
        self.properties.insert(path.to_string(), Some(value.to_string()));
        self.writes += 1;
        Ok(())
    }
}

/// In-memory request carrying an optional session
#[derive(Debug, Default)]
pub struct MemoryRequest {
    session: Option<MemorySession>,
}

impl MemoryRequest {
    /// Request bound to `session`
    pub fn new(session: MemorySession) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Request with no session available
    pub fn without_session() -> Self {
        Self { session: None }
    }

    pub fn memory_session(&self) -> Option<&MemorySession> {
        self.session.as_ref()
    }

    pub fn into_session(self) -> Option<MemorySession> {
        self.session
    }
}

impl RequestContext for MemoryRequest {
    fn session(&mut self) -> Option<&mut dyn Session> {
        self.session.as_mut().map(|s| s as &mut dyn Session)
    }
}
