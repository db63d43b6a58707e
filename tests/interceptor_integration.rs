//! Save interceptor integration tests
//!
//! End-to-end tests exercising the full pipeline: filter registry,
//! decider, AES-256-GCM gateway and in-memory repository session. Covers
//! selective encryption, idempotence, failure isolation, missing sessions,
//! vanished properties, configuration and concurrency.

use a3s_protect::{
    Aes256GcmGateway, CryptoGateway, EncryptionFilter, FilterRegistry, FnFilter, MemoryRequest,
    MemorySession, Modification, PathSuffixFilter, PropertyOutcome, ProtectConfig, ProtectError,
    ProtectedString, RequestContext, SaveInterceptor, Session,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn gateway() -> Arc<Aes256GcmGateway> {
    Arc::new(Aes256GcmGateway::new("key-1", &[0x42; 32]).unwrap())
}

fn password_registry() -> Arc<FilterRegistry> {
    let registry = Arc::new(FilterRegistry::new());
    registry.register(Arc::new(PathSuffixFilter::new("/password")));
    registry
}

fn stored(request: &MemoryRequest, path: &str) -> Option<String> {
    request
        .memory_session()
        .and_then(|s| s.value(path))
        .map(str::to_string)
}

// ─── Selective encryption ────────────────────────────────────────

#[test]
fn test_only_password_property_is_encrypted() {
    let gw = gateway();
    let interceptor = SaveInterceptor::new(password_registry(), gw.clone());

    let mut request = MemoryRequest::new(
        MemorySession::new()
            .with_property("/users/a/password", "secret")
            .with_property("/users/a/name", "alice"),
    );
    interceptor.process(
        &mut request,
        &[
            Modification::modified("/users/a/password"),
            Modification::modified("/users/a/name"),
        ],
    );

    let password = stored(&request, "/users/a/password").unwrap();
    assert_ne!(password, "secret");
    assert!(gw.is_protected(&password).unwrap());
    assert_eq!(gw.unprotect(&password).unwrap(), "secret");

    assert_eq!(stored(&request, "/users/a/name").as_deref(), Some("alice"));
}

#[test]
fn test_already_protected_value_is_byte_identical() {
    let gw = gateway();
    let protected = gw.protect("secret").unwrap().into_string();
    let interceptor = SaveInterceptor::new(password_registry(), gw);

    let mut request =
        MemoryRequest::new(MemorySession::new().with_property("/users/a/password", protected.clone()));
    interceptor.process(&mut request, &[Modification::modified("/users/a/password")]);

    assert_eq!(stored(&request, "/users/a/password"), Some(protected));
    assert_eq!(request.memory_session().unwrap().writes(), 0);
}

#[test]
fn test_processing_twice_does_not_double_protect() {
    let gw = gateway();
    let interceptor = SaveInterceptor::new(password_registry(), gw.clone());
    let batch = [Modification::modified("/users/a/password")];

    let mut request =
        MemoryRequest::new(MemorySession::new().with_property("/users/a/password", "secret"));
    interceptor.process(&mut request, &batch);
    let first = stored(&request, "/users/a/password");

    interceptor.process(&mut request, &batch);
    let second = stored(&request, "/users/a/password");

    assert_eq!(first, second);
    // One unprotect recovers the plaintext
    assert_eq!(gw.unprotect(&second.unwrap()).unwrap(), "secret");
}

#[test]
fn test_empty_value_is_protected() {
    let gw = gateway();
    let interceptor = SaveInterceptor::new(password_registry(), gw.clone());

    let mut request = MemoryRequest::new(
        MemorySession::new()
            .with_property("/users/a/password", "")
            .with_empty_property("/users/b/password"),
    );
    interceptor.process(
        &mut request,
        &[
            Modification::created("/users/a/password"),
            Modification::created("/users/b/password"),
        ],
    );

    for path in ["/users/a/password", "/users/b/password"] {
        let value = stored(&request, path).unwrap();
        assert!(gw.is_protected(&value).unwrap());
        assert_eq!(gw.unprotect(&value).unwrap(), "");
    }
}

// ─── Failure isolation ───────────────────────────────────────────

/// Delegates to AES but refuses to protect one specific plaintext
struct FlakyGateway {
    inner: Aes256GcmGateway,
    poison: &'static str,
}

impl CryptoGateway for FlakyGateway {
    fn is_protected(&self, value: &str) -> a3s_protect::Result<bool> {
        self.inner.is_protected(value)
    }

    fn protect(&self, value: &str) -> a3s_protect::Result<ProtectedString> {
        if value == self.poison {
            return Err(ProtectError::Crypto("key material unavailable".to_string()));
        }
        self.inner.protect(value)
    }

    fn unprotect(&self, value: &str) -> a3s_protect::Result<String> {
        self.inner.unprotect(value)
    }
}

#[test]
fn test_one_crypto_failure_does_not_abort_batch() {
    let gw = Arc::new(FlakyGateway {
        inner: Aes256GcmGateway::new("key-1", &[0x42; 32]).unwrap(),
        poison: "legacy",
    });
    let interceptor = SaveInterceptor::new(password_registry(), gw.clone());

    let paths: Vec<String> = (0..5).map(|i| format!("/users/u{}/password", i)).collect();
    let mut session = MemorySession::new();
    for (i, path) in paths.iter().enumerate() {
        let value = if i == 2 { "legacy".to_string() } else { format!("pw{}", i) };
        session = session.with_property(path.clone(), value);
    }
    let mut request = MemoryRequest::new(session);
    let batch: Vec<Modification> = paths.iter().map(|p| Modification::modified(p.clone())).collect();

    interceptor.process(&mut request, &batch);

    for (i, path) in paths.iter().enumerate() {
        let value = stored(&request, path).unwrap();
        if i == 2 {
            assert_eq!(value, "legacy");
        } else {
            assert_eq!(gw.unprotect(&value).unwrap(), format!("pw{}", i));
        }
    }
}

#[test]
fn test_repository_failures_are_isolated() {
    let gw = gateway();
    let interceptor = SaveInterceptor::new(password_registry(), gw.clone());

    let mut request = MemoryRequest::new(
        MemorySession::new()
            .with_property("/a/password", "one")
            .with_property("/b/password", "two")
            .with_property("/c/password", "three")
            .fail_reads("/a/password")
            .fail_writes("/b/password"),
    );
    interceptor.process(
        &mut request,
        &[
            Modification::modified("/a/password"),
            Modification::modified("/b/password"),
            Modification::modified("/c/password"),
        ],
    );

    assert_eq!(stored(&request, "/a/password").as_deref(), Some("one"));
    assert_eq!(stored(&request, "/b/password").as_deref(), Some("two"));
    let c = stored(&request, "/c/password").unwrap();
    assert_eq!(gw.unprotect(&c).unwrap(), "three");
}

#[test]
fn test_malformed_protected_value_is_left_alone() {
    let interceptor = SaveInterceptor::new(password_registry(), gateway());
    let mut session = MemorySession::new().with_property("/a/password", "{key-1:%%%}");

    let result = interceptor.encrypt_property(&mut session, "/a/password");
    assert!(matches!(result, Err(ProtectError::Crypto(_))));
    assert_eq!(session.value("/a/password"), Some("{key-1:%%%}"));
}

#[test]
fn test_envelope_shaped_plaintext_is_left_unencrypted() {
    let interceptor = SaveInterceptor::new(password_registry(), gateway());
    let mut request =
        MemoryRequest::new(MemorySession::new().with_property("/a/password", "{admin:hunter2}"));
    let batch = [Modification::modified("/a/password")];

    interceptor.process(&mut request, &batch);
    interceptor.process(&mut request, &batch);

    assert_eq!(stored(&request, "/a/password").as_deref(), Some("{admin:hunter2}"));
    assert_eq!(request.memory_session().unwrap().writes(), 0);
}

// ─── Missing session / vanished properties ───────────────────────

/// Request whose session lookup is counted and always fails
struct NoSessionRequest {
    lookups: usize,
}

impl RequestContext for NoSessionRequest {
    fn session(&mut self) -> Option<&mut dyn Session> {
        self.lookups += 1;
        None
    }
}

#[test]
fn test_missing_session_returns_without_processing() {
    let gateway_calls = Arc::new(AtomicUsize::new(0));
    let counter = gateway_calls.clone();

    let registry = Arc::new(FilterRegistry::new());
    registry.register(Arc::new(FnFilter::new("all", |_: &str| true)));

    struct CountingGateway(Arc<AtomicUsize>);
    impl CryptoGateway for CountingGateway {
        fn is_protected(&self, _: &str) -> a3s_protect::Result<bool> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
        fn protect(&self, value: &str) -> a3s_protect::Result<ProtectedString> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ProtectedString::new(value))
        }
        fn unprotect(&self, value: &str) -> a3s_protect::Result<String> {
            Ok(value.to_string())
        }
    }

    let interceptor = SaveInterceptor::new(registry, Arc::new(CountingGateway(counter)));
    let mut request = NoSessionRequest { lookups: 0 };
    interceptor.process(
        &mut request,
        &[
            Modification::modified("/users/a/password"),
            Modification::modified("/users/b/password"),
        ],
    );

    assert_eq!(request.lookups, 1);
    assert_eq!(gateway_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_vanished_property_is_skipped() {
    let interceptor = SaveInterceptor::new(password_registry(), gateway());
    let mut session = MemorySession::new().with_property("/users/a/password", "secret");
    session.remove("/users/a/password");

    assert_eq!(
        interceptor
            .encrypt_property(&mut session, "/users/a/password")
            .unwrap(),
        PropertyOutcome::Vanished
    );
    assert!(!session.contains("/users/a/password"));
    assert_eq!(session.writes(), 0);
}

#[test]
fn test_deleted_modification_in_batch_is_harmless() {
    let gw = gateway();
    let interceptor = SaveInterceptor::new(password_registry(), gw.clone());
    let mut request =
        MemoryRequest::new(MemorySession::new().with_property("/users/b/password", "secret"));

    interceptor.process(
        &mut request,
        &[
            Modification::deleted("/users/a/password"),
            Modification::modified("/users/b/password"),
        ],
    );

    let session = request.memory_session().unwrap();
    assert!(!session.contains("/users/a/password"));
    assert_eq!(
        gw.unprotect(session.value("/users/b/password").unwrap()).unwrap(),
        "secret"
    );
}

// ─── Dynamic filters ─────────────────────────────────────────────

#[test]
fn test_filters_registered_at_runtime_take_effect() {
    let registry = Arc::new(FilterRegistry::new());
    let interceptor = SaveInterceptor::new(registry.clone(), gateway());
    let batch = [Modification::modified("/services/x/apiKey")];

    let mut request =
        MemoryRequest::new(MemorySession::new().with_property("/services/x/apiKey", "k"));
    interceptor.process(&mut request, &batch);
    assert_eq!(stored(&request, "/services/x/apiKey").as_deref(), Some("k"));

    let filter: Arc<dyn EncryptionFilter> = Arc::new(PathSuffixFilter::new("/apiKey"));
    registry.register(filter.clone());
    interceptor.process(&mut request, &batch);
    assert_ne!(stored(&request, "/services/x/apiKey").as_deref(), Some("k"));

    registry.unregister(&filter);
    let mut fresh =
        MemoryRequest::new(MemorySession::new().with_property("/services/x/apiKey", "k"));
    interceptor.process(&mut fresh, &batch);
    assert_eq!(stored(&fresh, "/services/x/apiKey").as_deref(), Some("k"));
}

#[test]
fn test_concurrent_saves_with_registry_churn() {
    let registry = password_registry();
    let gw = gateway();
    let interceptor = Arc::new(SaveInterceptor::new(registry.clone(), gw.clone()));

    let churn = {
        let registry = registry.clone();
        thread::spawn(move || {
            for i in 0..500 {
                let f: Arc<dyn EncryptionFilter> =
                    Arc::new(PathSuffixFilter::new(format!("/transient{}", i)));
                registry.register(f.clone());
                registry.unregister(&f);
            }
        })
    };

    let mut workers = Vec::new();
    for t in 0..4 {
        let interceptor = interceptor.clone();
        let gw = gw.clone();
        workers.push(thread::spawn(move || {
            for n in 0..25 {
                let path = format!("/users/t{}n{}/password", t, n);
                let mut request =
                    MemoryRequest::new(MemorySession::new().with_property(path.clone(), "pw"));
                interceptor.process(&mut request, &[Modification::modified(path.clone())]);

                let value = request.memory_session().unwrap().value(&path).unwrap().to_string();
                assert_eq!(gw.unprotect(&value).unwrap(), "pw");
            }
        }));
    }

    churn.join().unwrap();
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(registry.len(), 1);
}

// ─── Configuration ───────────────────────────────────────────────

#[test]
fn test_pipeline_built_from_config() {
    let json = r#"{
        "filters": [
            { "type": "propertyName", "names": ["password", "secret"] }
        ],
        "keys": [
            { "id": "prod-1", "key": "QUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUE=" }
        ]
    }"#;
    let config = ProtectConfig::from_json(json).unwrap();
    let gw = Arc::new(config.build_gateway().unwrap());
    let interceptor = SaveInterceptor::new(Arc::new(config.build_registry()), gw.clone());

    let mut request = MemoryRequest::new(
        MemorySession::new()
            .with_property("/conf/mail/secret", "s3cr3t")
            .with_property("/conf/mail/host", "smtp.local"),
    );
    interceptor.process(
        &mut request,
        &[
            Modification::modified("/conf/mail/secret"),
            Modification::modified("/conf/mail/host"),
        ],
    );

    let secret = stored(&request, "/conf/mail/secret").unwrap();
    assert!(secret.starts_with("{prod-1:"));
    assert_eq!(gw.unprotect(&secret).unwrap(), "s3cr3t");
    assert_eq!(stored(&request, "/conf/mail/host").as_deref(), Some("smtp.local"));
}

#[test]
fn test_config_with_unembeddable_key_id_is_rejected() {
    for id in ["", "prod 1", "a:b", "{a}"] {
        let json = format!(
            r#"{{
                "filters": [ {{ "type": "pathSuffix", "suffix": "/password" }} ],
                "keys": [ {{ "id": "{}", "key": "QUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUE=" }} ]
            }}"#,
            id
        );
        assert!(
            matches!(ProtectConfig::from_json(&json), Err(ProtectError::Config(_))),
            "key id {:?} should be rejected",
            id
        );
    }
}
