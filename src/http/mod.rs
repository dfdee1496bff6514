//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, peer address, graceful shutdown)
//!     → middleware/interceptor.rs (incoming log, timing)
//!     → handlers.rs (/, /health, /metrics)
//!     → middleware/interceptor.rs (completed log, metrics)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use middleware::{instrument, Interceptor};
pub use server::{AppState, ServiceServer};
