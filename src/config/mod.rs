//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, apply DISPATCH_* env overrides)
//!     → validation.rs (semantic checks)
//!     → DispatchConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps cache/throttle defaults (arc-swap)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Routing prefix/version are baked into the route table at startup;
//!   changing them requires a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    AdminConfig, CacheConfig, DispatchConfig, ListenerConfig, ObservabilityConfig, RoutingConfig,
    SecurityConfig, ThrottleConfig, TimeoutConfig,
};
pub use watcher::ConfigWatcher;
