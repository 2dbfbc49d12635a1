//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → spans.rs (one span per top-level traversal)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every event of a traversal via the dispatch span
//! - Metrics are cheap (atomic increments) and no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
pub mod spans;
