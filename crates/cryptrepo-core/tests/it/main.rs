//! Integration tests for cryptrepo-core.

mod encrypted_datastore;
mod helpers;
mod repo_lifecycle;
mod sqlcipher_header;

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("cryptrepo_core=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}
