//! Cache layer for zapgrid.
//!
//! Stores raw API payloads as gzip-compressed JSON blobs, one per grid
//! window and one per enriched program. Entries never expire.

/// Gzip and lenient JSON decoding.
pub mod codec;
/// File-backed blob store.
pub mod store;

pub use codec::{decode_json, gunzip, gzip};
pub use store::{CacheKey, CacheStore};
