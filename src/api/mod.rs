//! HTTP layer
//!
//! - Server-rendered pages (landing, private, error)
//! - Metrics (Prometheus)

pub mod metrics;
pub mod pages;

pub use metrics::metrics_router;
pub use pages::pages_router;
