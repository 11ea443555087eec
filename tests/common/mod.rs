//! Common test utilities shared across integration tests.

use std::sync::Once;

static RUSTLS_INIT: Once = Once::new();

/// Install the rustls crypto provider once per test binary. Required before any
/// test exercises code that constructs a `kube::Client` or `reqwest::Client`.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("failed to install rustls crypto provider");
    });
}
