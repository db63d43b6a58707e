//! Encryption decision for save batches

use crate::filter::FilterRegistry;
use crate::types::Modification;
use std::sync::Arc;

/// Decides which modifications of a save batch need protection
///
/// A pure function of the current registry state and the modification's
/// source path; never touches the repository.
#[derive(Clone)]
pub struct EncryptionDecider {
    registry: Arc<FilterRegistry>,
}

impl EncryptionDecider {
    pub fn new(registry: Arc<FilterRegistry>) -> Self {
        Self { registry }
    }

    /// Whether the modified property should be encrypted
    pub fn should_encrypt(&self, modification: &Modification) -> bool {
        self.registry.is_supported(&modification.source)
    }

    /// Source paths of the modifications to encrypt, in input order
    pub fn select<'a>(&self, modifications: &'a [Modification]) -> Vec<&'a str> {
        modifications
            .iter()
            .filter(|m| self.should_encrypt(m))
            .map(|m| m.source.as_str())
            .collect()
    }

    pub fn registry(&self) -> &Arc<FilterRegistry> {
        &self.registry
    }
}
