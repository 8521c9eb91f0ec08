//! Shared harness for the stash integration tests.
//!
//! `tests/api_tests.rs` drives an in-process admin API over the in-memory
//! backend. `tests/database_tests.rs` needs docker and the `integration`
//! feature:
//!
//! ```text
//! cargo test -p stash-tests --features integration
//! ```

pub mod containers;
pub mod context;
pub mod fixtures;
pub mod helpers;

pub use context::TestContext;
pub use fixtures::*;
pub use helpers::*;

use tracing_subscriber::{EnvFilter, fmt};

/// Route `tracing` output through the test writer. Safe to call from every
/// test; only the first call installs the subscriber.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,stash_scheduler=debug,stash_cache=debug"));
    let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
}
