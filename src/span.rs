use crate::types::{EPS, UnitPart, approx_eq};

/// Free horizontal interval inside a band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub x: f64,
    pub width: f64,
}

/// A part assigned to a band, already oriented to the band height.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSlot {
    /// Index into the parts slice handed to [`SpanAllocator::fill`].
    pub index: usize,
    pub x: f64,
    pub part: UnitPart,
}

/// Result of packing one band. Returned by value so callers can keep or drop it.
#[derive(Debug, Clone, PartialEq)]
pub struct BandFill {
    pub height: f64,
    pub slots: Vec<BandSlot>,
    pub spans: Vec<Span>,
    pub used_area: f64,
}

impl BandFill {
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Used fraction of the band's area.
    pub fn utilization(&self, band_width: f64) -> f64 {
        let area = band_width * self.height;
        if area <= 0.0 {
            return 0.0;
        }
        self.used_area / area
    }

    pub fn sliver_count(&self, sliver_threshold: f64) -> usize {
        self.spans
            .iter()
            .filter(|s| is_sliver(s.width, sliver_threshold))
            .count()
    }

    /// A band that still holds a sliver span must never reach a sheet.
    pub fn is_valid(&self, sliver_threshold: f64) -> bool {
        self.sliver_count(sliver_threshold) == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        self.slots.iter().any(|s| s.index == index)
    }
}

pub fn is_sliver(width: f64, sliver_threshold: f64) -> bool {
    width > EPS && width < sliver_threshold - EPS
}

#[derive(Debug, Clone, Copy)]
struct ScoredSpan {
    span_idx: usize,
    leftover: f64,
}

/// First-fit packer for a single full-width band.
#[derive(Debug, Clone, Copy)]
pub struct SpanAllocator {
    band_width: f64,
    kerf: f64,
    sliver_threshold: f64,
}

impl SpanAllocator {
    pub fn new(band_width: f64, kerf: f64, sliver_threshold: f64) -> Self {
        Self {
            band_width,
            kerf,
            sliver_threshold,
        }
    }

    pub fn band_width(&self) -> f64 {
        self.band_width
    }

    pub fn sliver_threshold(&self) -> f64 {
        self.sliver_threshold
    }

    /// Orients `part` so its height is `height`, if it can be.
    fn orient(part: &UnitPart, height: f64) -> Option<UnitPart> {
        if part.width <= 0.0 || part.height <= 0.0 {
            return None;
        }
        if approx_eq(part.height, height) {
            Some(part.clone())
        } else if part.rotatable && approx_eq(part.width, height) {
            Some(part.turned())
        } else {
            None
        }
    }

    /// Leftover width after putting a `width`-wide part at the start of `span`.
    ///
    /// `Some(0.0)` is an exact fit. `None` means the part plus kerf does not fit.
    fn leftover(&self, span: Span, width: f64) -> Option<f64> {
        let slack = span.width - width;
        if slack.abs() <= EPS {
            return Some(0.0);
        }
        let rest = slack - self.kerf;
        if rest < -EPS {
            return None;
        }
        Some(rest.max(0.0))
    }

    fn find_best(&self, spans: &[Span], width: f64) -> Option<ScoredSpan> {
        let mut best: Option<ScoredSpan> = None;
        for (idx, span) in spans.iter().enumerate() {
            let Some(leftover) = self.leftover(*span, width) else {
                continue;
            };
            if is_sliver(leftover, self.sliver_threshold) {
                continue;
            }
            if best.is_none_or(|b| leftover < b.leftover - EPS) {
                best = Some(ScoredSpan {
                    span_idx: idx,
                    leftover,
                });
            }
        }
        best
    }

    fn place(&self, spans: &mut Vec<Span>, scored: ScoredSpan, width: f64) -> f64 {
        let span = spans[scored.span_idx];
        if scored.leftover <= EPS {
            spans.remove(scored.span_idx);
        } else {
            spans[scored.span_idx] = Span {
                x: span.x + width + self.kerf,
                width: scored.leftover,
            };
        }
        span.x
    }

    /// Packs every part orientable to `height` into the band, largest first.
    pub fn fill(&self, height: f64, parts: &[UnitPart]) -> BandFill {
        let mut candidates: Vec<(usize, UnitPart)> = parts
            .iter()
            .enumerate()
            .filter_map(|(i, p)| Self::orient(p, height).map(|o| (i, o)))
            .collect();
        candidates.sort_by(|a, b| {
            b.1.area()
                .total_cmp(&a.1.area())
                .then(b.1.longest_side().total_cmp(&a.1.longest_side()))
        });

        let mut spans = vec![Span {
            x: 0.0,
            width: self.band_width,
        }];
        let mut slots = Vec::new();
        let mut used_area = 0.0;

        for (index, part) in candidates {
            if spans.is_empty() {
                break;
            }
            let Some(scored) = self.find_best(&spans, part.width) else {
                continue;
            };
            let x = self.place(&mut spans, scored, part.width);
            used_area += part.area();
            slots.push(BandSlot { index, x, part });
        }

        BandFill {
            height,
            slots,
            spans,
            used_area,
        }
    }
}
