use crate::band::BandSelector;
use crate::config::PackingConfig;
use crate::sheet::BandRecord;
use crate::span::BandFill;
use crate::types::{Board, EPS, dim_key};

/// Alternate heights tried per repair.
const MAX_ALTERNATES: usize = 2;

/// Local repair of a poorly used last band.
#[derive(Debug, Clone, Copy)]
pub struct TailRetry {
    threshold: f64,
    max_retries: usize,
}

impl TailRetry {
    pub fn new(config: &PackingConfig) -> Self {
        Self {
            threshold: config.tail_threshold,
            max_retries: config.max_retries,
        }
    }

    /// Alternate-height evaluations allowed on one sheet.
    pub fn budget(&self) -> usize {
        self.max_retries
    }

    pub fn needs_retry(&self, fill: &BandFill, band_width: f64) -> bool {
        fill.utilization(band_width) < self.threshold
    }

    /// Re-lays the band from its snapshot at up to two other heights and returns
    /// the fill with strictly more used area, if any. Each height tried costs
    /// one unit of `budget`.
    pub fn repair(
        &self,
        selector: &BandSelector,
        record: &BandRecord,
        board: &Board,
        budget: &mut usize,
    ) -> Option<BandFill> {
        if *budget == 0 || !self.needs_retry(&record.fill, selector.band_width()) {
            return None;
        }

        let parts = &record.before.remaining;
        let available = record.before.available(board);
        let allocator = selector.allocator(parts);
        let original = dim_key(record.fill.height);
        let alternates = selector
            .candidate_heights(parts, available)
            .into_iter()
            .filter(|h| dim_key(*h) != original)
            .take(MAX_ALTERNATES);

        let mut best: Option<BandFill> = None;
        for height in alternates {
            if *budget == 0 {
                break;
            }
            *budget -= 1;
            let Some(fill) = selector.evaluate(&allocator, height, parts) else {
                continue;
            };
            let floor = best
                .as_ref()
                .map_or(record.fill.used_area, |b| b.used_area);
            if fill.used_area > floor + EPS {
                best = Some(fill);
            }
        }
        best
    }
}
