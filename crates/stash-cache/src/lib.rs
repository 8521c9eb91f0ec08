//! Response cache for stash.
//!
//! [`CacheStore`] is the facade every caller goes through. It never returns
//! errors: an unavailable backend reads as a miss, and a disabled store is a
//! no-op.

pub mod keys;
pub mod memory;
pub mod store;

pub use keys::{ParsedKey, build_key, parse_key};
pub use memory::MemoryRepository;
pub use store::CacheStore;
