//! Tuning knobs for the banded strategy.

use serde::{Deserialize, Serialize};

/// Immutable configuration for one banded packing attempt.
///
/// Every orchestrator attempt builds its own value; nothing here is shared or
/// mutated while a layout is being computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackingConfig {
    /// Number of candidate band heights evaluated per band.
    pub top_k: usize,
    /// Weight of the one-level lookahead score.
    pub lookahead: f64,
    /// Last-band utilization fraction below which the tail retry kicks in.
    pub tail_threshold: f64,
    /// Multiplier on `(min part dimension + kerf)` giving the sliver threshold.
    pub sliver_factor: f64,
    /// Alternate-height evaluations allowed per sheet during tail retries.
    pub max_retries: usize,
    /// Total efficiency (percent) at which a banded result is accepted.
    pub accept_efficiency: f64,
}

impl PackingConfig {
    pub const DEFAULT_TOP_K: usize = 5;
    pub const DEFAULT_LOOKAHEAD: f64 = 0.4;
    pub const DEFAULT_TAIL_THRESHOLD: f64 = 0.55;
    pub const DEFAULT_SLIVER_FACTOR: f64 = 1.0;
    pub const DEFAULT_MAX_RETRIES: usize = 3;
    pub const DEFAULT_ACCEPT_EFFICIENCY: f64 = 60.0;

    /// Lookahead weights tried when the baseline falls short.
    pub const LOOKAHEAD_SWEEP: [f64; 2] = [0.2, 0.6];

    pub fn with_lookahead(self, lookahead: f64) -> Self {
        Self { lookahead, ..self }
    }

    /// Fewer, safer candidates and a wider sliver margin.
    pub fn conservative(self) -> Self {
        Self {
            top_k: 2,
            sliver_factor: 1.2,
            ..self
        }
    }

    /// Smallest leftover width a placement may leave behind.
    pub fn sliver_threshold(&self, min_part_dimension: f64, kerf: f64) -> f64 {
        (min_part_dimension + kerf) * self.sliver_factor
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            top_k: Self::DEFAULT_TOP_K,
            lookahead: Self::DEFAULT_LOOKAHEAD,
            tail_threshold: Self::DEFAULT_TAIL_THRESHOLD,
            sliver_factor: Self::DEFAULT_SLIVER_FACTOR,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            accept_efficiency: Self::DEFAULT_ACCEPT_EFFICIENCY,
        }
    }
}
