//! Metrics collection.
//!
//! # Metrics
//! - `cdn_fallback_probe_total` (counter): probe outcomes by `outcome`
//! - `cdn_fallback_rewrites_total` (counter): rewritten resources by `kind`
//! - `cdn_fallback_failed_total` (counter): fallback-also-failed by `tag`

use crate::probe::Availability;

pub fn record_probe(outcome: Availability) {
    metrics::counter!("cdn_fallback_probe_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_rewrite(kind: &'static str) {
    metrics::counter!("cdn_fallback_rewrites_total", "kind" => kind).increment(1);
}

pub fn record_failed(tag: &str) {
    metrics::counter!("cdn_fallback_failed_total", "tag" => tag.to_string()).increment(1);
}
