//! # a3s-protect
//!
//! Selective property encryption for content-save pipelines in the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-protect` hooks into a repository's save pipeline and encrypts
//! sensitive properties (passwords, API keys, ...) in place before the host
//! commits. Which properties are sensitive is decided by a runtime-pluggable
//! set of filters; how values are protected is decided by a `CryptoGateway`.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_protect::{
//!     Aes256GcmGateway, FilterRegistry, MemoryRequest, MemorySession, Modification,
//!     PathSuffixFilter, SaveInterceptor,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> a3s_protect::Result<()> {
//! let registry = Arc::new(FilterRegistry::new());
//! registry.register(Arc::new(PathSuffixFilter::new("/password")));
//!
//! let gateway = Arc::new(Aes256GcmGateway::new("key-1", &[0x42; 32])?);
//! let interceptor = SaveInterceptor::new(registry, gateway);
//!
//! let mut request = MemoryRequest::new(
//!     MemorySession::new().with_property("/users/a/password", "secret"),
//! );
//! interceptor.process(&mut request, &[Modification::modified("/users/a/password")]);
//!
//! let stored = request.memory_session().unwrap().value("/users/a/password").unwrap();
//! assert!(stored.starts_with("{key-1:"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **FilterRegistry** — thread-safe, dynamically mutable set of `EncryptionFilter`s
//! - **CryptoGateway** trait — seam to the protect/isProtected capability
//! - **EncryptionDecider** — selects the modifications that need protection
//! - **SaveInterceptor** — per-property read, check, protect, write with failure isolation
//! - **Session** / **RequestContext** traits — seam to the host repository

pub mod config;
pub mod crypto;
pub mod decider;
pub mod error;
pub mod filter;
pub mod interceptor;
pub mod session;
pub mod types;

// Re-export core types
pub use config::{FilterSpec, KeySpec, ProtectConfig};
pub use crypto::{Aes256GcmGateway, CryptoGateway, ProtectedString};
pub use decider::EncryptionDecider;
pub use error::{ProtectError, Result};
pub use filter::{
    EncryptionFilter, FilterRegistry, FnFilter, PathPrefixFilter, PathSuffixFilter,
    PropertyNameFilter,
};
pub use interceptor::{PropertyOutcome, SaveInterceptor, SavePostProcessor};
pub use session::{MemoryRequest, MemorySession, Property, RequestContext, Session};
pub use types::{Modification, ModificationKind, PropertyPath, PATH_SEPARATOR};
