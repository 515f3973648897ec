use serde::{Deserialize, Deserializer, Serialize};

/// Tolerance for comparing dimensions and coordinates.
pub const EPS: f64 = 1e-6;

/// Resolution of [`dim_key`]: values closer than 1/1000 share a key.
const KEY_SCALE: f64 = 1000.0;

/// Quantizes a dimension so it can be used as a map key.
pub fn dim_key(v: f64) -> i64 {
    (v * KEY_SCALE).round() as i64
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPS
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub width: f64,
    pub height: f64,
}

impl Board {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Whether a `w` x `h` rectangle fits, optionally after a 90° turn.
    pub fn accepts(&self, w: f64, h: f64, allow_rotate: bool) -> bool {
        if w <= 0.0 || h <= 0.0 {
            return false;
        }
        let fits = w <= self.width + EPS && h <= self.height + EPS;
        let fits_rotated = allow_rotate && h <= self.width + EPS && w <= self.height + EPS;
        fits || fits_rotated
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRequest {
    pub width: f64,
    pub height: f64,
    #[serde(deserialize_with = "deserialize_qty")]
    pub qty: u32,
    #[serde(default = "default_true")]
    pub rotatable: bool,
}

impl PartRequest {
    pub fn new(width: f64, height: f64, qty: u32) -> Self {
        Self {
            width,
            height,
            qty,
            rotatable: true,
        }
    }

    pub fn fixed(width: f64, height: f64, qty: u32) -> Self {
        Self {
            rotatable: false,
            ..Self::new(width, height, qty)
        }
    }
}

/// One physical part, tracked individually from expansion until it is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPart {
    pub id: usize,
    /// Index of the request this unit was expanded from.
    pub request: usize,
    pub original_width: f64,
    pub original_height: f64,
    pub width: f64,
    pub height: f64,
    pub rotatable: bool,
    pub rotated: bool,
}

impl UnitPart {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn longest_side(&self) -> f64 {
        self.width.max(self.height)
    }

    pub fn shortest_side(&self) -> f64 {
        self.width.min(self.height)
    }

    /// Returns a copy turned by 90°.
    pub fn turned(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
            rotated: !self.rotated,
            ..self.clone()
        }
    }

    pub fn place_at(&self, x: f64, y: f64) -> PlacedPart {
        PlacedPart {
            id: self.id,
            request: self.request,
            x,
            y,
            width: self.width,
            height: self.height,
            rotated: self.rotated,
            original_width: self.original_width,
            original_height: self.original_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedPart {
    pub id: usize,
    pub request: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotated: bool,
    pub original_width: f64,
    pub original_height: f64,
}

impl PlacedPart {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// True when the interiors intersect; shared edges do not count.
    pub fn overlaps(&self, other: &PlacedPart) -> bool {
        self.x < other.right() - EPS
            && other.x < self.right() - EPS
            && self.y < other.bottom() - EPS
            && other.y < self.bottom() - EPS
    }
}

/// Distinct cut coordinates of one sheet, deduplicated by [`dim_key`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CutLines {
    xs: std::collections::BTreeMap<i64, f64>,
    ys: std::collections::BTreeMap<i64, f64>,
}

impl CutLines {
    pub fn add_x(&mut self, x: f64) {
        self.xs.entry(dim_key(x)).or_insert(x);
    }

    pub fn add_y(&mut self, y: f64) {
        self.ys.entry(dim_key(y)).or_insert(y);
    }

    pub fn count(&self) -> usize {
        self.xs.len() + self.ys.len()
    }

    pub fn xs(&self) -> Vec<f64> {
        self.xs.values().copied().collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.ys.values().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub width: f64,
    pub height: f64,
    pub placed: Vec<PlacedPart>,
    pub cuts_x: Vec<f64>,
    pub cuts_y: Vec<f64>,
    pub used_area: f64,
    pub total_area: f64,
    pub efficiency: f64,
    pub cutting_count: usize,
}

impl Sheet {
    /// Freezes a finished layout and derives its metrics.
    pub fn finalize(board: Board, placed: Vec<PlacedPart>, cuts: &CutLines) -> Self {
        let used_area: f64 = placed.iter().map(|p| p.area()).sum();
        let total_area = board.area();
        let efficiency = if total_area > 0.0 {
            used_area / total_area * 100.0
        } else {
            0.0
        };
        Self {
            width: board.width,
            height: board.height,
            placed,
            cuts_x: cuts.xs(),
            cuts_y: cuts.ys(),
            used_area,
            total_area,
            efficiency,
            cutting_count: cuts.count(),
        }
    }
}

/// Which strategy produced a [`PackingResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyTag {
    Banded,
    BandedSweep,
    Conservative,
    WidthStrip,
    Horizontal,
}

impl std::fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StrategyTag::Banded => "banded",
            StrategyTag::BandedSweep => "banded-sweep",
            StrategyTag::Conservative => "conservative",
            StrategyTag::WidthStrip => "width-strip",
            StrategyTag::Horizontal => "horizontal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackMode {
    #[default]
    Auto,
    Horizontal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackingResult {
    pub bins: Vec<Sheet>,
    pub unplaced: Vec<UnitPart>,
    pub total_efficiency: f64,
    pub mode: StrategyTag,
    #[serde(default)]
    pub cancelled: bool,
}

impl PackingResult {
    pub fn new(bins: Vec<Sheet>, unplaced: Vec<UnitPart>, mode: StrategyTag) -> Self {
        let total_efficiency = total_efficiency(&bins);
        Self {
            bins,
            unplaced,
            total_efficiency,
            mode,
            cancelled: false,
        }
    }

    pub fn sheet_count(&self) -> usize {
        self.bins.len()
    }

    pub fn placed_count(&self) -> usize {
        self.bins.iter().map(|s| s.placed.len()).sum()
    }

    pub fn total_cuts(&self) -> usize {
        self.bins.iter().map(|s| s.cutting_count).sum()
    }
}

/// Area-weighted mean efficiency over all sheets, in percent.
pub fn total_efficiency(bins: &[Sheet]) -> f64 {
    let total: f64 = bins.iter().map(|s| s.total_area).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let used: f64 = bins.iter().map(|s| s.used_area).sum();
    used / total * 100.0
}

/// Accepts quantities sent as JSON integers or integral floats (`3` or `3.0`).
pub fn deserialize_qty<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let v = f64::deserialize(deserializer)?;
    if v < 0.0 || v.fract() != 0.0 || v > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative whole number, got {v}"
        )));
    }
    Ok(v as u32)
}
