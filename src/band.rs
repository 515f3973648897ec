use std::collections::BTreeMap;

use crate::config::PackingConfig;
use crate::span::{BandFill, SpanAllocator};
use crate::types::{EPS, UnitPart, dim_key};

const SLIVER_WEIGHT: f64 = 1_000_000.0;
const SPAN_WEIGHT: f64 = 1_000.0;
const UTILIZATION_WEIGHT: f64 = 10.0;
const INTEGER_FIT_BONUS: f64 = 1.0;

/// Scores closer than this are treated as equal, so the first candidate wins.
const SCORE_TIE: f64 = 1e-9;

/// The band picked for the current position, with its total score.
#[derive(Debug, Clone, PartialEq)]
pub struct BandChoice {
    pub fill: BandFill,
    pub score: f64,
}

/// Chooses the height and contents of the next band on a sheet.
#[derive(Debug, Clone, Copy)]
pub struct BandSelector {
    config: PackingConfig,
    band_width: f64,
    kerf: f64,
}

impl BandSelector {
    pub fn new(config: PackingConfig, band_width: f64, kerf: f64) -> Self {
        Self {
            config,
            band_width,
            kerf,
        }
    }

    pub fn band_width(&self) -> f64 {
        self.band_width
    }

    pub fn kerf(&self) -> f64 {
        self.kerf
    }

    /// Allocator for the given remaining parts.
    ///
    /// The sliver threshold uses the smallest dimension of *all* remaining
    /// parts, not just those that could land in a given span.
    pub fn allocator(&self, parts: &[UnitPart]) -> SpanAllocator {
        let min_dim = parts
            .iter()
            .filter(|p| p.width > 0.0 && p.height > 0.0)
            .map(|p| p.shortest_side())
            .fold(f64::INFINITY, f64::min);
        let min_dim = if min_dim.is_finite() { min_dim } else { 0.0 };
        SpanAllocator::new(
            self.band_width,
            self.kerf,
            self.config.sliver_threshold(min_dim, self.kerf),
        )
    }

    /// Distinct band heights producible from `parts`, tallest first, at most `top_k`.
    pub fn candidate_heights(&self, parts: &[UnitPart], available: f64) -> Vec<f64> {
        let mut heights: BTreeMap<i64, f64> = BTreeMap::new();
        let mut offer = |h: f64, w: f64| {
            if h > 0.0 && w > 0.0 && h <= available + EPS && w <= self.band_width + EPS {
                heights.entry(dim_key(h)).or_insert(h);
            }
        };
        for p in parts {
            offer(p.height, p.width);
            if p.rotatable {
                offer(p.width, p.height);
            }
        }
        heights
            .into_values()
            .rev()
            .take(self.config.top_k)
            .collect()
    }

    /// Runs the allocator for one height, dropping invalid or empty bands.
    pub fn evaluate(
        &self,
        allocator: &SpanAllocator,
        height: f64,
        parts: &[UnitPart],
    ) -> Option<BandFill> {
        let fill = allocator.fill(height, parts);
        if fill.is_empty() || !fill.is_valid(allocator.sliver_threshold()) {
            return None;
        }
        Some(fill)
    }

    /// Lexicographic value of a band on its own, without lookahead.
    pub fn base_score(&self, fill: &BandFill, sliver_threshold: f64) -> f64 {
        let slivers = fill.sliver_count(sliver_threshold) as f64;
        let spans = fill.spans.len() as f64;
        let bonus = if fill.spans.is_empty() {
            INTEGER_FIT_BONUS
        } else {
            0.0
        };
        -(slivers * SLIVER_WEIGHT) - (spans * SPAN_WEIGHT)
            + fill.utilization(self.band_width) * UTILIZATION_WEIGHT
            + bonus
    }

    /// Best base score of a hypothetical next band. Does not look further ahead.
    fn lookahead_score(
        &self,
        allocator: &SpanAllocator,
        parts: &[UnitPart],
        available: f64,
    ) -> f64 {
        if available <= EPS || parts.is_empty() {
            return 0.0;
        }
        self.candidate_heights(parts, available)
            .into_iter()
            .filter_map(|h| self.evaluate(allocator, h, parts))
            .map(|fill| self.base_score(&fill, allocator.sliver_threshold()))
            .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))))
            .unwrap_or(0.0)
    }

    /// Picks the best band for `available` vertical space, or `None` when no
    /// candidate height yields a valid, non-empty band.
    pub fn select(&self, parts: &[UnitPart], available: f64) -> Option<BandChoice> {
        let allocator = self.allocator(parts);
        let mut best: Option<BandChoice> = None;

        for height in self.candidate_heights(parts, available) {
            let Some(fill) = self.evaluate(&allocator, height, parts) else {
                continue;
            };
            let mut score = self.base_score(&fill, allocator.sliver_threshold());
            if self.config.lookahead != 0.0 {
                let rest: Vec<UnitPart> = parts
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !fill.contains(*i))
                    .map(|(_, p)| p.clone())
                    .collect();
                // The follow-up band sees its own sliver threshold, which can
                // only tighten once this band's parts are gone.
                let next_available = available - height - self.kerf;
                score += self.config.lookahead
                    * self.lookahead_score(&self.allocator(&rest), &rest, next_available);
            }
            if best.as_ref().is_none_or(|b| score > b.score + SCORE_TIE) {
                best = Some(BandChoice { fill, score });
            }
        }

        best
    }
}
