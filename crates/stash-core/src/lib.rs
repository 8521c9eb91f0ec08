//! Stash Core
//!
//! Core domain types, traits, and error handling for Stash.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used across all other crates.

pub mod clock;
pub mod entry;
pub mod error;
pub mod ports;
pub mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{
    CacheEntry, CacheStats, Dimensions, EndpointStats, Envelope, GlobalStats, UpsertRecord,
    result_count,
};
pub use error::{Error, Result};
pub use ttl::{TtlTable, Volatility};
