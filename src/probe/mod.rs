//! Delivery-domain availability probe.
//!
//! # Data Flow
//! ```text
//! probe()
//!     → background fallback disabled? → Available, no request
//!     → result already decided?       → cached result
//!     → one load of <probe url>?_=<millis> raced against probe timeout
//!         load ok        → Available
//!         load error     → Unavailable
//!         timeout first  → Unavailable (load future dropped)
//!     → ProbeState::resolve (first writer wins)
//! ```
//!
//! # Design Decisions
//! - Result is tri-state and final for the session once decided
//! - A single async gate serializes concurrent callers so one session
//!   issues at most one request
//! - Only `reset` (re-init, forced retest) moves the state back to Unknown

pub mod loader;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time;

use crate::config::FallbackConfig;
use crate::observability::metrics;
use loader::{cache_busted, ResourceLoader};

/// Whether the delivery domain is reachable.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Unknown = 0,
    Available = 1,
    Unavailable = 2,
}

impl From<u8> for Availability {
    fn from(val: u8) -> Self {
        match val {
            1 => Availability::Available,
            2 => Availability::Unavailable,
            _ => Availability::Unknown,
        }
    }
}

impl Availability {
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Unknown => "unknown",
            Availability::Available => "available",
            Availability::Unavailable => "unavailable",
        }
    }

    pub fn is_decided(self) -> bool {
        self != Availability::Unknown
    }
}

/// Process-wide probe result with a single-writer rule.
#[derive(Debug, Default)]
pub struct ProbeState {
    state: AtomicU8,
}

impl ProbeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Availability {
        Availability::from(self.state.load(Ordering::Acquire))
    }

    /// Record `outcome` unless a result is already set. Returns the value
    /// that ended up stored.
    pub fn resolve(&self, outcome: Availability) -> Availability {
        match self.state.compare_exchange(
            Availability::Unknown as u8,
            outcome as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => outcome,
            Err(current) => Availability::from(current),
        }
    }

    pub fn reset(&self) {
        self.state.store(Availability::Unknown as u8, Ordering::Release);
    }
}

/// Runs availability probes through a [`ResourceLoader`].
pub struct Prober {
    loader: Arc<dyn ResourceLoader>,
    state: ProbeState,
    gate: Mutex<()>,
}

impl Prober {
    pub fn new(loader: Arc<dyn ResourceLoader>) -> Self {
        Self {
            loader,
            state: ProbeState::new(),
            gate: Mutex::new(()),
        }
    }

    pub fn availability(&self) -> Availability {
        self.state.get()
    }

    pub fn reset(&self) {
        self.state.reset();
    }

    /// Decide availability for `config`, probing over `scheme` if needed.
    pub async fn probe(&self, config: &FallbackConfig, scheme: &str) -> Availability {
        let Some(url) = config.probe_url(scheme) else {
            tracing::debug!("No probe image configured, assuming CDN available");
            return self.state.resolve(Availability::Available);
        };

        let current = self.state.get();
        if current.is_decided() {
            return current;
        }

        let _guard = self.gate.lock().await;
        let current = self.state.get();
        if current.is_decided() {
            return current;
        }

        let url = cache_busted(&url);
        tracing::info!(url = %url, timeout_ms = config.probe_timeout_ms, "Probing CDN availability");

        let outcome = match time::timeout(config.probe_timeout(), self.loader.load(&url)).await {
            Ok(Ok(())) => Availability::Available,
            Ok(Err(e)) => {
                tracing::warn!(url = %url, error = %e, "CDN probe failed: load error");
                Availability::Unavailable
            }
            Err(_) => {
                tracing::warn!(url = %url, timeout_ms = config.probe_timeout_ms, "CDN probe failed: timeout");
                Availability::Unavailable
            }
        };

        let stored = self.state.resolve(outcome);
        metrics::record_probe(stored);
        tracing::info!(result = stored.as_str(), "CDN probe finished");
        stored
    }
}
