//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! init options (code) or config file (TOML)
//!     → loader.rs (parse & deserialize, file path only)
//!     → validation.rs (semantic checks, file path only)
//!     → schema.rs: FallbackOptions merged over defaults
//!     → FallbackConfig (resolved, immutable)
//!     → shared via Arc with every engine pass
//!
//! On re-init:
//!     → new FallbackConfig replaces the old one wholesale
//!     → probe result resets to Unknown
//! ```
//!
//! # Design Decisions
//! - Config is immutable once resolved; changes require a fresh `init`
//! - All fields have defaults to allow minimal configs
//! - `init` does not validate; only the file loader does

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::FallbackConfig;
pub use schema::FallbackOptions;
