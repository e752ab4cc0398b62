//! CDN fallback engine.
//!
//! Keeps a page usable when its static-asset delivery domain fails by
//! re-pointing scripts, stylesheets, images and CSS backgrounds at a
//! fallback origin.

pub mod api;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod observability;
pub mod probe;
pub mod report;
pub mod rewrite;

pub use api::{CdnFallback, ElementTarget};
pub use config::{FallbackConfig, FallbackOptions};
pub use dom::{Document, SharedDocument};
pub use error::FallbackError;
pub use probe::loader::{HttpLoader, ResourceLoader};
pub use probe::Availability;
pub use report::{ErrorReporter, TracingReporter};
