//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → dispatch.rs (route, throttle, auth, cache, validate)
//!     → handler.rs (application code → Reply)
//!     → error.rs (early exits → status + headers)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod error;
pub mod handler;
pub mod request;
pub mod server;

pub use dispatch::{dispatch, DispatchState, Policy};
pub use error::DispatchError;
pub use handler::{Context, Handler, HandlerError, Reply};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
