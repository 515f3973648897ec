//! Parsing and validation for the CLI and HTTP surfaces.
//!
//! The packing engine itself accepts anything; these checks only exist so
//! users get a clear message instead of a layout with everything unplaced.

use crate::error::InputError;
use crate::types::{Board, PackMode, PartRequest};

pub const MAX_QTY: u32 = 999;
/// Part lists must stay below this many entries.
pub const MAX_PART_ENTRIES: usize = 500;
/// Cap on the expanded unit count.
pub const MAX_TOTAL_UNITS: u64 = 10_000;
pub const MAX_KERF: f64 = 10.0;

fn parse_number(input: &str, value: &str) -> Result<f64, InputError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| InputError::InvalidNumber {
            input: input.to_string(),
            value: value.to_string(),
        })
}

fn ensure_positive(what: &'static str, value: f64) -> Result<f64, InputError> {
    if value.is_nan() || value <= 0.0 {
        return Err(InputError::NonPositive { what, value });
    }
    Ok(value)
}

/// Parses `WxH` (either `x` or `X`) into a width and height.
pub fn parse_dimensions(s: &str) -> Result<(f64, f64), InputError> {
    let parts: Vec<&str> = s.split(['x', 'X']).collect();
    if parts.len() != 2 {
        return Err(InputError::InvalidDimensions(s.to_string()));
    }
    let width = ensure_positive("width", parse_number(s, parts[0])?)?;
    let height = ensure_positive("height", parse_number(s, parts[1])?)?;
    Ok((width, height))
}

pub fn parse_board(s: &str) -> Result<Board, InputError> {
    let (width, height) = parse_dimensions(s)?;
    Ok(Board::new(width, height))
}

/// Parses `WxH:qty`, optionally suffixed with `:fixed` to forbid rotation.
pub fn parse_part(s: &str, default_rotatable: bool) -> Result<PartRequest, InputError> {
    let fields: Vec<&str> = s.split(':').collect();
    let (dims, qty, rotatable) = match fields.as_slice() {
        [dims, qty] => (*dims, *qty, default_rotatable),
        [dims, qty, flag] if flag.eq_ignore_ascii_case("fixed") => (*dims, *qty, false),
        _ => return Err(InputError::InvalidPart(s.to_string())),
    };
    let (width, height) = parse_dimensions(dims)?;
    let qty = qty
        .trim()
        .parse::<u64>()
        .map_err(|_| InputError::InvalidQuantity(s.to_string()))?;
    let qty = u32::try_from(qty)
        .ok()
        .filter(|q| (1..=MAX_QTY).contains(q))
        .ok_or_else(|| InputError::QuantityOutOfRange(s.to_string()))?;
    Ok(PartRequest {
        width,
        height,
        qty,
        rotatable,
    })
}

pub fn parse_mode(s: &str) -> Result<PackMode, InputError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "auto" => Ok(PackMode::Auto),
        "horizontal" => Ok(PackMode::Horizontal),
        _ => Err(InputError::UnknownMode(s.to_string())),
    }
}

pub fn parse_kerf(s: &str) -> Result<f64, InputError> {
    validate_kerf(parse_number(s, s)?)
}

pub fn validate_kerf(kerf: f64) -> Result<f64, InputError> {
    if !(0.0..=MAX_KERF).contains(&kerf) {
        return Err(InputError::KerfOutOfRange(kerf));
    }
    Ok(kerf)
}

pub fn validate_board(board: &Board) -> Result<(), InputError> {
    ensure_positive("board width", board.width)?;
    ensure_positive("board height", board.height)?;
    Ok(())
}

/// Rejects degenerate or oversized requests. Parts larger than the board are
/// allowed and end up unplaced.
pub fn validate_requests(requests: &[PartRequest]) -> Result<(), InputError> {
    if requests.len() >= MAX_PART_ENTRIES {
        return Err(InputError::TooManyParts(requests.len()));
    }
    for r in requests {
        ensure_positive("part width", r.width)?;
        ensure_positive("part height", r.height)?;
        if !(1..=MAX_QTY).contains(&r.qty) {
            return Err(InputError::QuantityOutOfRange(format!(
                "{}x{}:{}",
                r.width, r.height, r.qty
            )));
        }
    }
    let units: u64 = requests.iter().map(|r| u64::from(r.qty)).sum();
    if units > MAX_TOTAL_UNITS {
        return Err(InputError::TooManyUnits(units));
    }
    Ok(())
}
