//! HTTP route dispatcher: segment-tree routing, per-identity response cache
//! with LFU eviction, and fixed-window request throttling.

pub mod admin;
pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::DispatchConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
