//! Width-strip layout: full-height columns of equal-width parts.
//!
//! Used directly in horizontal mode and as the last fallback in auto mode. It
//! places every part that fits the board in some allowed orientation, so a
//! fresh sheet always makes progress.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::sheet::record_cuts;
use crate::types::{Board, CutLines, EPS, PlacedPart, Sheet, UnitPart, dim_key};

#[derive(Debug, Clone, Copy, PartialEq)]
struct FreeRect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl FreeRect {
    fn area(&self) -> f64 {
        self.w * self.h
    }

    fn right(&self) -> f64 {
        self.x + self.w
    }

    fn bottom(&self) -> f64 {
        self.y + self.h
    }
}

/// Placements of the sheet under construction, plus which input parts are done.
struct Layout {
    placed: Vec<PlacedPart>,
    cuts: CutLines,
    done: Vec<bool>,
}

impl Layout {
    fn put(&mut self, idx: usize, part: &UnitPart, x: f64, y: f64, board: &Board) {
        let p = part.place_at(x, y);
        record_cuts(&mut self.cuts, &p, board);
        self.placed.push(p);
        self.done[idx] = true;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WidthStripPacker {
    board: Board,
    kerf: f64,
}

impl WidthStripPacker {
    pub fn new(board: Board, kerf: f64) -> Self {
        Self { board, kerf }
    }

    /// Keeps the part as given unless only the turned orientation fits.
    fn orient(&self, part: &UnitPart) -> Option<UnitPart> {
        fit_within(part, self.board.width, self.board.height)
    }

    /// Packs sheets until everything is placed or a sheet makes no progress.
    /// Returns the sheets, the parts left over and whether `cancel` stopped the run.
    pub fn pack_all(
        &self,
        mut parts: Vec<UnitPart>,
        cancel: &AtomicBool,
    ) -> (Vec<Sheet>, Vec<UnitPart>, bool) {
        let mut sheets = Vec::new();
        while !parts.is_empty() {
            if cancel.load(Ordering::Relaxed) {
                return (sheets, parts, true);
            }
            let (sheet, rest) = self.pack_sheet(parts);
            parts = rest;
            match sheet {
                Some(sheet) => sheets.push(sheet),
                None => break,
            }
        }
        (sheets, parts, false)
    }

    /// Lays out one sheet. Returns `None` if no part fits at all.
    pub fn pack_sheet(&self, parts: Vec<UnitPart>) -> (Option<Sheet>, Vec<UnitPart>) {
        let mut layout = Layout {
            placed: Vec::new(),
            cuts: CutLines::default(),
            done: vec![false; parts.len()],
        };

        let mut free = self.place_strips(&parts, &mut layout);
        free.sort_by(|a, b| a.area().total_cmp(&b.area()));

        let mut order: Vec<usize> = (0..parts.len()).filter(|i| !layout.done[*i]).collect();
        order.sort_by(|a, b| parts[*b].area().total_cmp(&parts[*a].area()));
        for rect in free {
            self.fill_rect(rect, &parts, &order, &mut layout);
        }

        if layout.placed.is_empty() {
            return (None, parts);
        }
        let sheet = Sheet::finalize(self.board, layout.placed, &layout.cuts);
        let rest = parts
            .into_iter()
            .zip(layout.done)
            .filter(|(_, done)| !done)
            .map(|(p, _)| p)
            .collect();
        (Some(sheet), rest)
    }

    /// Places the width groups as strips from the left edge and returns the
    /// free rectangles left below the strips and to their right.
    fn place_strips(&self, parts: &[UnitPart], layout: &mut Layout) -> Vec<FreeRect> {
        let mut by_width: BTreeMap<i64, Vec<(usize, UnitPart)>> = BTreeMap::new();
        for (idx, part) in parts.iter().enumerate() {
            if let Some(oriented) = self.orient(part) {
                by_width
                    .entry(dim_key(oriented.width))
                    .or_default()
                    .push((idx, oriented));
            }
        }
        let mut groups: Vec<Vec<(usize, UnitPart)>> = by_width.into_values().collect();
        groups.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then(b[0].1.width.total_cmp(&a[0].1.width))
        });

        let mut free = Vec::new();
        let mut right_edge: Option<f64> = None;

        for mut group in groups {
            let strip_w = group[0].1.width;
            group.sort_by(|a, b| b.1.height.total_cmp(&a.1.height));

            while !group.is_empty() {
                let strip_x = right_edge.map_or(0.0, |r| r + self.kerf);
                if strip_x + strip_w > self.board.width + EPS {
                    break;
                }

                // Shortest parts go in first
                let mut bottom: Option<f64> = None;
                let mut taken = Vec::new();
                for i in (0..group.len()).rev() {
                    let (idx, part) = &group[i];
                    let y = bottom.map_or(0.0, |b| b + self.kerf);
                    if y + part.height <= self.board.height + EPS {
                        layout.put(*idx, part, strip_x, y, &self.board);
                        bottom = Some(y + part.height);
                        taken.push(i);
                    }
                }
                let Some(bottom) = bottom else {
                    break;
                };
                // `taken` is in descending index order
                for i in taken {
                    group.remove(i);
                }

                let below = bottom + self.kerf;
                if self.board.height - below > EPS {
                    free.push(FreeRect {
                        x: strip_x,
                        y: below,
                        w: strip_w,
                        h: self.board.height - below,
                    });
                }
                right_edge = Some(strip_x + strip_w);
            }
        }

        let rx = right_edge.map_or(0.0, |r| r + self.kerf);
        if self.board.width - rx > EPS {
            free.push(FreeRect {
                x: rx,
                y: 0.0,
                w: self.board.width - rx,
                h: self.board.height,
            });
        }
        free
    }

    /// Simple row packing of leftover parts into one free rectangle.
    fn fill_rect(
        &self,
        rect: FreeRect,
        parts: &[UnitPart],
        order: &[usize],
        layout: &mut Layout,
    ) {
        let mut last_bottom: Option<f64> = None;
        loop {
            let y = last_bottom.map_or(rect.y, |b| b + self.kerf);
            let space_h = rect.bottom() - y;
            if space_h <= EPS {
                break;
            }

            let mut row_h: Option<f64> = None;
            let mut cursor: Option<f64> = None;
            for &idx in order {
                if layout.done[idx] {
                    continue;
                }
                let x = cursor.map_or(rect.x, |c| c + self.kerf);
                let limit_h = row_h.unwrap_or(space_h);
                if let Some(part) = fit_within(&parts[idx], rect.right() - x, limit_h) {
                    layout.put(idx, &part, x, y, &self.board);
                    cursor = Some(x + part.width);
                    row_h.get_or_insert(part.height);
                }
            }

            match row_h {
                Some(h) => last_bottom = Some(y + h),
                None => break,
            }
        }
    }
}

/// Orientation of `part` that fits a `w` x `h` space, preferring the current one.
fn fit_within(part: &UnitPart, w: f64, h: f64) -> Option<UnitPart> {
    if part.width <= 0.0 || part.height <= 0.0 {
        return None;
    }
    if part.width <= w + EPS && part.height <= h + EPS {
        return Some(part.clone());
    }
    if part.rotatable && part.height <= w + EPS && part.width <= h + EPS {
        return Some(part.turned());
    }
    None
}
