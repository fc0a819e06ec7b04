//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Matched GET request:
//!     → options.rs (effective ttl/limit, no-cache bypass, key derivation)
//!     → store.rs lookup (fresh → serve with Expires, expired → drop)
//!     → [handler runs on miss]
//!     → store.rs insert (then LFU-evict urls over the limit)
//! ```
//!
//! # Design Decisions
//! - Key is url (path + query) × caller identity × accept-language
//! - Cache state is owned by the server, not a global

pub mod options;
pub mod store;

pub use options::{cache_options, CacheKey, CacheOptions};
pub use store::{CacheHit, CacheSnapshot, CacheStore};
