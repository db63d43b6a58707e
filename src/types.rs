//! Core types for the a3s-protect save pipeline
//!
//! All types use camelCase JSON serialization so hosts can ship save
//! batches across process boundaries unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between node path segments and the property name
pub const PATH_SEPARATOR: char = '/';

/// Kind of change a modification describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModificationKind {
    /// Property was created by this save
    Created,
    /// Property value was changed by this save
    Modified,
    /// Property was removed by this save
    Deleted,
    /// Item was moved to `source`
    Moved,
    /// Item was copied to `source`
    Copied,
    /// Child order of a node changed
    Ordered,
}

impl ModificationKind {
    /// Whether this kind leaves a property value behind that may need protection
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Created | Self::Modified)
    }
}

impl fmt::Display for ModificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Moved => "moved",
            Self::Copied => "copied",
            Self::Ordered => "ordered",
        };
        f.write_str(s)
    }
}

/// One pending change in a save batch
///
/// Produced by the host save pipeline and scoped to a single save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modification {
    /// Absolute property path (e.g., `/users/a/password`)
    pub source: String,

    /// What happened to the property
    pub kind: ModificationKind,
}

impl Modification {
    /// Create a modification of the given kind
    pub fn new(source: impl Into<String>, kind: ModificationKind) -> Self {
        Self {
            source: source.into(),
            kind,
        }
    }

    /// Shorthand for a `Created` modification
    pub fn created(source: impl Into<String>) -> Self {
        Self::new(source, ModificationKind::Created)
    }

    /// Shorthand for a `Modified` modification
    pub fn modified(source: impl Into<String>) -> Self {
        Self::new(source, ModificationKind::Modified)
    }

    /// Shorthand for a `Deleted` modification
    pub fn deleted(source: impl Into<String>) -> Self {
        Self::new(source, ModificationKind::Deleted)
    }

    /// Source path viewed as a property path
    pub fn path(&self) -> PropertyPath<'_> {
        PropertyPath::new(&self.source)
    }
}

/// Borrowed view over a `<nodePath>/<propertyName>` string
///
/// Purely lexical: no normalization, no validation beyond splitting on
/// the last separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyPath<'a> {
    raw: &'a str,
}

impl<'a> PropertyPath<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self { raw }
    }

    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    /// Path of the node owning the property
    ///
    /// `/users/a/password` → `/users/a`, `/password` → `/`, `password` → ``.
    pub fn node_path(&self) -> &'a str {
        match self.raw.rfind(PATH_SEPARATOR) {
            Some(0) => &self.raw[..1],
            Some(idx) => &self.raw[..idx],
            None => "",
        }
    }

    /// Name of the property (last path segment)
    pub fn property_name(&self) -> &'a str {
        match self.raw.rfind(PATH_SEPARATOR) {
            Some(idx) => &self.raw[idx + 1..],
            None => self.raw,
        }
    }

    /// Whether the path lies under `prefix` (segment aware)
    pub fn is_under(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches(PATH_SEPARATOR);
        if prefix.is_empty() {
            return self.raw.starts_with(PATH_SEPARATOR);
        }
        self.raw
            .strip_prefix(prefix)
            .map(|rest| rest.starts_with(PATH_SEPARATOR))
            .unwrap_or(false)
    }
}

impl fmt::Display for PropertyPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw)
    }
}
