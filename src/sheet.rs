use std::sync::atomic::{AtomicBool, Ordering};

use crate::band::BandSelector;
use crate::config::PackingConfig;
use crate::span::BandFill;
use crate::tail::TailRetry;
use crate::types::{Board, CutLines, EPS, PlacedPart, Sheet, UnitPart};

/// Layout of a sheet between two bands.
///
/// Every band produces a new value, so the previous one doubles as the
/// snapshot the tail retry rolls back to.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetState {
    pub remaining: Vec<UnitPart>,
    pub placed: Vec<PlacedPart>,
    pub cuts: CutLines,
    /// Top edge of the next band.
    pub next_y: f64,
    pub bands: usize,
}

impl SheetState {
    pub fn new(remaining: Vec<UnitPart>) -> Self {
        Self {
            remaining,
            placed: Vec::new(),
            cuts: CutLines::default(),
            next_y: 0.0,
            bands: 0,
        }
    }

    pub fn available(&self, board: &Board) -> f64 {
        board.height - self.next_y
    }

    /// State after laying `fill` at the current position.
    pub fn with_band(&self, fill: &BandFill, board: &Board, kerf: f64) -> Self {
        let y = self.next_y;
        let mut placed = self.placed.clone();
        let mut cuts = self.cuts.clone();
        for slot in &fill.slots {
            let part = slot.part.place_at(slot.x, y);
            record_cuts(&mut cuts, &part, board);
            placed.push(part);
        }
        let remaining = self
            .remaining
            .iter()
            .enumerate()
            .filter(|(i, _)| !fill.contains(*i))
            .map(|(_, p)| p.clone())
            .collect();
        Self {
            remaining,
            placed,
            cuts,
            next_y: y + fill.height + kerf,
            bands: self.bands + 1,
        }
    }
}

/// Registers the cuts that free `part`: its right and bottom edges, unless
/// they lie on the sheet border.
pub fn record_cuts(cuts: &mut CutLines, part: &PlacedPart, board: &Board) {
    if part.right() < board.width - EPS {
        cuts.add_x(part.right());
    }
    if part.bottom() < board.height - EPS {
        cuts.add_y(part.bottom());
    }
}

/// The last band laid on a sheet together with the state it was laid on.
#[derive(Debug, Clone, PartialEq)]
pub struct BandRecord {
    pub before: SheetState,
    pub fill: BandFill,
}

#[derive(Debug, Clone)]
pub struct SheetOutcome {
    /// `None` when not a single band could be placed.
    pub sheet: Option<Sheet>,
    pub remaining: Vec<UnitPart>,
    pub cancelled: bool,
}

/// Fills one sheet band by band.
#[derive(Debug, Clone, Copy)]
pub struct SheetBuilder<'a> {
    board: Board,
    selector: BandSelector,
    tail: TailRetry,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> SheetBuilder<'a> {
    pub fn new(board: Board, kerf: f64, config: PackingConfig) -> Self {
        Self {
            board,
            selector: BandSelector::new(config, board.width, kerf),
            tail: TailRetry::new(&config),
            cancel: None,
        }
    }

    pub fn with_cancel(self, cancel: &'a AtomicBool) -> Self {
        Self {
            cancel: Some(cancel),
            ..self
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    }

    pub fn build(&self, parts: Vec<UnitPart>) -> SheetOutcome {
        let mut state = SheetState::new(parts);
        let mut last: Option<BandRecord> = None;
        let mut retries = self.tail.budget();
        let mut cancelled;

        loop {
            cancelled = self.fill_bands(&mut state, &mut last);
            if cancelled {
                break;
            }
            let Some(record) = last.as_ref() else {
                break;
            };
            let Some(fill) = self
                .tail
                .repair(&self.selector, record, &self.board, &mut retries)
            else {
                break;
            };
            tracing::debug!(
                from = record.fill.height,
                to = fill.height,
                used = fill.used_area,
                "tail band replaced"
            );
            let before = record.before.clone();
            state = before.with_band(&fill, &self.board, self.selector.kerf());
            last = Some(BandRecord { before, fill });
        }

        if state.bands == 0 {
            return SheetOutcome {
                sheet: None,
                remaining: state.remaining,
                cancelled,
            };
        }

        let sheet = Sheet::finalize(self.board, state.placed, &state.cuts);
        SheetOutcome {
            sheet: Some(sheet),
            remaining: state.remaining,
            cancelled,
        }
    }

    /// Lays bands until the sheet is full or nothing fits. Returns `true` if
    /// the run was cancelled.
    fn fill_bands(&self, state: &mut SheetState, last: &mut Option<BandRecord>) -> bool {
        loop {
            if self.is_cancelled() {
                return true;
            }
            let available = state.available(&self.board);
            if available <= EPS || state.remaining.is_empty() {
                return false;
            }
            let Some(choice) = self.selector.select(&state.remaining, available) else {
                return false;
            };
            let next = state.with_band(&choice.fill, &self.board, self.selector.kerf());
            let before = std::mem::replace(state, next);
            *last = Some(BandRecord {
                before,
                fill: choice.fill,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand_requests;
    use crate::types::PartRequest;

    fn assert_no_overlaps(sheet: &Sheet) {
        for (i, a) in sheet.placed.iter().enumerate() {
            for b in &sheet.placed[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_two_exact_bands() {
        let parts = expand_requests(&[PartRequest::fixed(50.0, 50.0, 4)]);
        let builder = SheetBuilder::new(Board::new(100.0, 100.0), 0.0, PackingConfig::default());
        let out = builder.build(parts);
        let sheet = out.sheet.unwrap();
        assert!(out.remaining.is_empty());
        assert_eq!(sheet.placed.len(), 4);
        assert_eq!(sheet.cuts_x, vec![50.0]);
        assert_eq!(sheet.cuts_y, vec![50.0]);
        assert_eq!(sheet.cutting_count, 2);
        assert!((sheet.efficiency - 100.0).abs() < 1e-9);
        assert_no_overlaps(&sheet);
    }

    #[test]
    fn test_kerf_between_bands_and_parts() {
        let parts = expand_requests(&[PartRequest::fixed(45.0, 30.0, 4)]);
        let builder = SheetBuilder::new(Board::new(100.0, 100.0), 5.0, PackingConfig::default());
        let sheet = builder.build(parts).sheet.unwrap();
        let pos: Vec<(f64, f64)> = sheet.placed.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(pos, vec![(0.0, 0.0), (50.0, 0.0), (0.0, 35.0), (50.0, 35.0)]);
        assert_eq!(sheet.cuts_x, vec![45.0, 95.0]);
        assert_eq!(sheet.cuts_y, vec![30.0, 65.0]);
        assert_eq!(sheet.cutting_count, 4);
        assert_no_overlaps(&sheet);
    }

    #[test]
    fn test_nothing_fits_gives_no_sheet() {
        let parts = expand_requests(&[PartRequest::fixed(200.0, 200.0, 1)]);
        let builder = SheetBuilder::new(Board::new(100.0, 100.0), 0.0, PackingConfig::default());
        let out = builder.build(parts);
        assert!(out.sheet.is_none());
        assert_eq!(out.remaining.len(), 1);
        assert!(!out.cancelled);
    }

    fn tail_parts() -> Vec<UnitPart> {
        // Two 20x50 parts win the first band (nothing fits below them) but use
        // only 40% of it; three 25x30 parts would fill more.
        expand_requests(&[
            PartRequest::fixed(20.0, 50.0, 2),
            PartRequest::fixed(25.0, 30.0, 3),
            PartRequest::fixed(20.0, 20.0, 1),
        ])
    }

    #[test]
    fn test_tail_retry_replaces_poor_last_band() {
        let builder = SheetBuilder::new(Board::new(100.0, 60.0), 0.0, PackingConfig::default());
        let out = builder.build(tail_parts());
        let sheet = out.sheet.unwrap();
        assert_eq!(sheet.placed.len(), 4);
        assert!(sheet.placed.iter().all(|p| p.height < 50.0));
        assert!((sheet.used_area - 2650.0).abs() < 1e-9);
        assert_eq!(out.remaining.len(), 2);
        assert!(out.remaining.iter().all(|p| p.height == 50.0));
        assert_no_overlaps(&sheet);
    }

    #[test]
    fn test_tail_retry_disabled() {
        for config in [
            PackingConfig {
                tail_threshold: 0.0,
                ..PackingConfig::default()
            },
            PackingConfig {
                max_retries: 0,
                ..PackingConfig::default()
            },
        ] {
            let builder = SheetBuilder::new(Board::new(100.0, 60.0), 0.0, config);
            let out = builder.build(tail_parts());
            let sheet = out.sheet.unwrap();
            assert_eq!(sheet.placed.len(), 2);
            assert!(sheet.placed.iter().all(|p| p.height == 50.0));
            assert_eq!(out.remaining.len(), 4);
        }
    }

    #[test]
    fn test_cancelled_before_first_band() {
        let cancel = AtomicBool::new(true);
        let parts = expand_requests(&[PartRequest::fixed(50.0, 50.0, 4)]);
        let builder = SheetBuilder::new(Board::new(100.0, 100.0), 0.0, PackingConfig::default())
            .with_cancel(&cancel);
        let out = builder.build(parts);
        assert!(out.cancelled);
        assert!(out.sheet.is_none());
        assert_eq!(out.remaining.len(), 4);
    }
}
