//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Matched request:
//!     → throttle.rs (count hit per remote IP × route pattern × method, reject over limit)
//!     → auth.rs (bearer token → principal, required on `auth` routes)
//!     → Pass to cache / handler
//! ```
//!
//! # Design Decisions
//! - Throttle runs before authentication so bad tokens still count
//! - Fail closed: a route marked `auth` never runs without a principal
//! - No trust in client input

pub mod auth;
pub mod throttle;

pub use auth::{AuthError, Authenticator, Principal, StaticTokens};
pub use throttle::{throttle_options, ThrottleEntry, ThrottleKey, ThrottleOptions, ThrottleStore};
