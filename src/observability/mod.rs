//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Prober, engines, public surface produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → whatever subscriber / recorder the host installs
//! ```
//!
//! # Design Decisions
//! - The library never installs a metrics recorder; counters are no-ops
//!   until the host does
//! - Logging setup is idempotent so hosts and tests can both call it

pub mod logging;
pub mod metrics;
