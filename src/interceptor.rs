//! Save interceptor — protects sensitive properties before persistence
//!
//! Runs inside the host's save pipeline, after the modifications have been
//! applied to the session and before the host commits. Each selected
//! property is handled on its own: a failure is logged and the batch moves
//! on, so one bad value never blocks the rest of the save.

use crate::crypto::CryptoGateway;
use crate::decider::EncryptionDecider;
use crate::error::{ProtectError, Result};
use crate::filter::FilterRegistry;
use crate::session::{RequestContext, Session};
use crate::types::Modification;
use std::sync::Arc;

/// Hook invoked by the host after a save batch has been applied
pub trait SavePostProcessor: Send + Sync {
    /// Post-process the modifications of one save request
    fn process(&self, request: &mut dyn RequestContext, modifications: &[Modification]);
}

/// What happened to a single selected property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyOutcome {
    /// Value was protected and written back
    Encrypted,
    /// Value was already protected; left untouched
    AlreadyProtected,
    /// Property no longer exists; nothing to do
    Vanished,
}

/// Encrypts sensitive properties of a save batch in place
pub struct SaveInterceptor {
    decider: EncryptionDecider,
    gateway: Arc<dyn CryptoGateway>,
}

impl SaveInterceptor {
    /// Create an interceptor over a shared filter registry
    pub fn new(registry: Arc<FilterRegistry>, gateway: Arc<dyn CryptoGateway>) -> Self {
        Self {
            decider: EncryptionDecider::new(registry),
            gateway,
        }
    }

    pub fn decider(&self) -> &EncryptionDecider {
        &self.decider
    }

    /// Protect every selected property of the batch
    ///
    /// Never fails: a missing session aborts the call before anything is
    /// read, and per-property failures are logged and skipped.
    pub fn process(&self, request: &mut dyn RequestContext, modifications: &[Modification]) {
        let paths = self.decider.select(modifications);
        tracing::debug!(
            modifications = modifications.len(),
            selected = paths.len(),
            "Save batch filtered"
        );

        let session = match request.session() {
            Some(session) => session,
            None => {
                tracing::error!(
                    error = %ProtectError::SessionUnavailable,
                    selected = paths.len(),
                    "Failed to obtain repository session, skipping property encryption"
                );
                return;
            }
        };

        for path in paths {
            if let Err(e) = self.encrypt_property(session, path) {
                tracing::error!(path = %path, error = %e, "Failed to encrypt property");
            }
        }
    }

    /// Protect one property if it exists and is not yet protected
    pub fn encrypt_property(&self, session: &mut dyn Session, path: &str) -> Result<PropertyOutcome> {
        let property = match session.get_property(path)? {
            Some(property) => property,
            None => {
                tracing::debug!(path = %path, "Property vanished before encryption, skipping");
                return Ok(PropertyOutcome::Vanished);
            }
        };

        let value = property.get_string();
        let protected = self.gateway.is_protected(value).map_err(|e| {
            tracing::warn!(
                path = %path,
                error = %e,
                "Value looks protected but cannot be parsed, left unencrypted"
            );
            e
        })?;
        if protected {
            tracing::debug!(path = %path, "Property already protected");
            return Ok(PropertyOutcome::AlreadyProtected);
        }

        tracing::info!(path = %path, "Encrypting property");
        let protected = self.gateway.protect(value)?;
        session.set_property(path, protected.as_str())?;
        tracing::info!(path = %path, "Property encrypted");

        Ok(PropertyOutcome::Encrypted)
    }
}

impl SavePostProcessor for SaveInterceptor {
    fn process(&self, request: &mut dyn RequestContext, modifications: &[Modification]) {
        SaveInterceptor::process(self, request, modifications)
    }
}
