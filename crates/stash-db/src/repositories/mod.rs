//! Repository implementations.

mod cache_entry;

pub use cache_entry::PgCacheRepository;
