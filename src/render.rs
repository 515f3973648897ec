use std::collections::BTreeMap;

use crate::types::{PlacedPart, Sheet};

const MAX_COLS: f64 = 80.0;
const MAX_ROWS: f64 = 40.0;
const OFFCUT: char = '.';
const GLYPHS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Letter for a request index, `#` once the alphabet runs out.
fn glyph(request: usize) -> char {
    GLYPHS.get(request).map_or('#', |&b| b as char)
}

fn covers(p: &PlacedPart, x: f64, y: f64) -> bool {
    x >= p.x && x < p.right() && y >= p.y && y < p.bottom()
}

/// Character map of one sheet, scaled to at most 80x40 cells.
///
/// Each cell shows the part covering its centre, lettered by request, or `.`
/// for offcut. Kerf gaps narrower than a cell do not show. A legend with the
/// requested size and count of each letter follows the map.
pub fn render_sheet(sheet: &Sheet) -> String {
    if !(sheet.width > 0.0 && sheet.height > 0.0) {
        return String::new();
    }
    let scale = f64::min(MAX_COLS / sheet.width, MAX_ROWS / sheet.height);
    let cols = (sheet.width * scale).round() as usize;
    let rows = (sheet.height * scale).round() as usize;
    if cols == 0 || rows == 0 {
        return String::new();
    }

    let mut out = String::with_capacity((cols + 1) * rows);
    for r in 0..rows {
        let y = (r as f64 + 0.5) / scale;
        for c in 0..cols {
            let x = (c as f64 + 0.5) / scale;
            let cell = sheet
                .placed
                .iter()
                .find(|p| covers(p, x, y))
                .map_or(OFFCUT, |p| glyph(p.request));
            out.push(cell);
        }
        out.push('\n');
    }

    let mut legend: BTreeMap<usize, (f64, f64, usize)> = BTreeMap::new();
    for p in &sheet.placed {
        legend
            .entry(p.request)
            .or_insert((p.original_width, p.original_height, 0))
            .2 += 1;
    }
    for (request, (w, h, count)) in legend {
        out.push_str(&format!("{} {}x{} x{}\n", glyph(request), w, h, count));
    }
    out
}
