use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::PackingConfig;
use crate::expand::expand_requests;
use crate::sheet::SheetBuilder;
use crate::strip::WidthStripPacker;
use crate::types::{Board, PackMode, PackingResult, PartRequest, StrategyTag, UnitPart};

/// Runs the packing strategies for one board, kerf and part list.
#[derive(Debug, Clone)]
pub struct Solver {
    board: Board,
    kerf: f64,
    config: PackingConfig,
    requests: Vec<PartRequest>,
}

impl Solver {
    pub fn new(board: Board, kerf: f64, requests: Vec<PartRequest>) -> Self {
        Self {
            board,
            kerf,
            config: PackingConfig::default(),
            requests,
        }
    }

    /// Replaces the baseline configuration the auto mode starts from.
    pub fn with_config(self, config: PackingConfig) -> Self {
        Self { config, ..self }
    }

    pub fn board(&self) -> Board {
        self.board
    }

    pub fn solve(&self, mode: PackMode) -> PackingResult {
        self.solve_with_cancel(mode, &AtomicBool::new(false))
    }

    /// Like [`Solver::solve`], stopping early once `cancel` is raised. Parts not
    /// yet placed at that point are reported as unplaced.
    pub fn solve_with_cancel(&self, mode: PackMode, cancel: &AtomicBool) -> PackingResult {
        let parts = expand_requests(&self.requests);
        let result = if !self.is_usable() {
            tracing::warn!(
                board = %self.board,
                kerf = self.kerf,
                "board or kerf out of range, nothing placed"
            );
            let tag = match mode {
                PackMode::Horizontal => StrategyTag::Horizontal,
                PackMode::Auto => StrategyTag::Banded,
            };
            PackingResult::new(Vec::new(), parts, tag)
        } else {
            match mode {
                PackMode::Horizontal => self.width_strip(parts, StrategyTag::Horizontal, cancel),
                PackMode::Auto => self.auto(parts, cancel),
            }
        };
        tracing::info!(
            strategy = %result.mode,
            sheets = result.sheet_count(),
            placed = result.placed_count(),
            unplaced = result.unplaced.len(),
            efficiency = result.total_efficiency,
            cancelled = result.cancelled,
            "packing finished"
        );
        result
    }

    /// Kerf must be finite and non-negative and the board finite and positive.
    fn is_usable(&self) -> bool {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        self.kerf.is_finite()
            && self.kerf >= 0.0
            && positive(self.board.width)
            && positive(self.board.height)
    }

    /// Banded layout first, then cheaper and safer fallbacks while the result
    /// stays unacceptable.
    fn auto(&self, parts: Vec<UnitPart>, cancel: &AtomicBool) -> PackingResult {
        let base = self.config;
        let best = self.banded(&parts, base, StrategyTag::Banded, cancel);
        if best.cancelled || self.is_acceptable(&best) {
            return best;
        }

        let mut best = best;
        for lookahead in PackingConfig::LOOKAHEAD_SWEEP {
            let attempt = self.banded(
                &parts,
                base.with_lookahead(lookahead),
                StrategyTag::BandedSweep,
                cancel,
            );
            best = pick(best, attempt);
            if best.cancelled {
                return best;
            }
        }
        if self.is_acceptable(&best) {
            return best;
        }

        let attempt = self.banded(&parts, base.conservative(), StrategyTag::Conservative, cancel);
        best = pick(best, attempt);
        if best.cancelled || self.is_acceptable(&best) {
            return best;
        }

        let attempt = self.width_strip(parts, StrategyTag::WidthStrip, cancel);
        pick(best, attempt)
    }

    /// A result is final when nothing left over could ever fit the board and it
    /// either places everything or reaches the target efficiency.
    fn is_acceptable(&self, result: &PackingResult) -> bool {
        let settled = result
            .unplaced
            .iter()
            .all(|p| !self.board.accepts(p.width, p.height, p.rotatable));
        settled
            && (result.unplaced.is_empty()
                || result.total_efficiency >= self.config.accept_efficiency)
    }

    fn banded(
        &self,
        parts: &[UnitPart],
        config: PackingConfig,
        tag: StrategyTag,
        cancel: &AtomicBool,
    ) -> PackingResult {
        let builder = SheetBuilder::new(self.board, self.kerf, config).with_cancel(cancel);
        let mut remaining = parts.to_vec();
        let mut bins = Vec::new();
        let mut cancelled = false;

        while !remaining.is_empty() {
            if cancel.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
            let out = builder.build(remaining);
            remaining = out.remaining;
            let progressed = out.sheet.is_some();
            bins.extend(out.sheet);
            if out.cancelled {
                cancelled = true;
                break;
            }
            if !progressed {
                break;
            }
        }

        let mut result = PackingResult::new(bins, remaining, tag);
        result.cancelled = cancelled;
        log_attempt(&result, Some(&config));
        result
    }

    fn width_strip(
        &self,
        parts: Vec<UnitPart>,
        tag: StrategyTag,
        cancel: &AtomicBool,
    ) -> PackingResult {
        let packer = WidthStripPacker::new(self.board, self.kerf);
        let (bins, remaining, cancelled) = packer.pack_all(parts, cancel);
        let mut result = PackingResult::new(bins, remaining, tag);
        result.cancelled = cancelled;
        log_attempt(&result, None);
        result
    }
}

fn log_attempt(result: &PackingResult, config: Option<&PackingConfig>) {
    tracing::debug!(
        strategy = %result.mode,
        top_k = config.map(|c| c.top_k),
        lookahead = config.map(|c| c.lookahead),
        sheets = result.sheet_count(),
        unplaced = result.unplaced.len(),
        efficiency = result.total_efficiency,
        "attempt finished"
    );
}

/// More placed parts, then higher efficiency, then fewer sheets. The earlier
/// result wins ties. A cancelled attempt marks the pick as cancelled.
fn pick(current: PackingResult, attempt: PackingResult) -> PackingResult {
    let cancelled = current.cancelled || attempt.cancelled;
    let better = {
        let (a, b) = (attempt.placed_count(), current.placed_count());
        a > b
            || (a == b && attempt.total_efficiency > current.total_efficiency + 1e-9)
            || (a == b
                && (attempt.total_efficiency - current.total_efficiency).abs() <= 1e-9
                && attempt.sheet_count() < current.sheet_count())
    };
    let mut chosen = if better { attempt } else { current };
    chosen.cancelled = cancelled;
    chosen
}
