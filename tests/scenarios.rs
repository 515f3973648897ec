use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;

use sheet_cutter::solver::Solver;
use sheet_cutter::types::{Board, EPS, PackMode, PackingResult, PartRequest, StrategyTag};

fn plywood() -> Board {
    Board::new(2440.0, 1220.0)
}

fn baseline_parts() -> Vec<PartRequest> {
    vec![
        PartRequest::new(1000.0, 500.0, 10),
        PartRequest::new(700.0, 500.0, 10),
        PartRequest::new(500.0, 400.0, 35),
    ]
}

/// Checks every property a layout must hold regardless of strategy.
fn assert_layout_valid(result: &PackingResult, board: Board, requests: &[PartRequest]) {
    // Conservation per request
    let mut seen: BTreeMap<usize, u32> = BTreeMap::new();
    for p in result.bins.iter().flat_map(|s| &s.placed) {
        *seen.entry(p.request).or_default() += 1;
    }
    for p in &result.unplaced {
        *seen.entry(p.request).or_default() += 1;
    }
    for (i, r) in requests.iter().enumerate() {
        assert_eq!(seen.get(&i).copied().unwrap_or(0), r.qty, "request {i} not conserved");
    }

    let mut used_total = 0.0;
    let mut area_total = 0.0;
    for (si, sheet) in result.bins.iter().enumerate() {
        for p in &sheet.placed {
            assert!(p.x >= -EPS && p.y >= -EPS, "sheet {si}: {p:?} starts outside");
            assert!(p.right() <= board.width + EPS, "sheet {si}: {p:?} too wide");
            assert!(p.bottom() <= board.height + EPS, "sheet {si}: {p:?} too tall");

            let r = &requests[p.request];
            if p.rotated {
                assert!(r.rotatable, "sheet {si}: fixed part rotated {p:?}");
                assert_eq!((p.width, p.height), (r.height, r.width));
            } else {
                assert_eq!((p.width, p.height), (r.width, r.height));
            }
        }
        for (i, a) in sheet.placed.iter().enumerate() {
            for b in &sheet.placed[i + 1..] {
                assert!(!a.overlaps(b), "sheet {si}: {a:?} overlaps {b:?}");
            }
        }

        assert_eq!(sheet.cutting_count, sheet.cuts_x.len() + sheet.cuts_y.len());
        assert!(sheet.cuts_x.windows(2).all(|w| w[0] < w[1]));
        assert!(sheet.cuts_y.windows(2).all(|w| w[0] < w[1]));
        assert!(sheet.efficiency >= 0.0 && sheet.efficiency <= 100.0 + 1e-9);

        used_total += sheet.used_area;
        area_total += sheet.total_area;
    }

    let total_cuts: usize = result.bins.iter().map(|s| s.cutting_count).sum();
    assert_eq!(result.total_cuts(), total_cuts);
    if area_total > 0.0 {
        let expected = used_total / area_total * 100.0;
        assert!((result.total_efficiency - expected).abs() < 1e-9);
    } else {
        assert_eq!(result.total_efficiency, 0.0);
    }
}

#[test]
fn baseline_places_everything() {
    let requests = baseline_parts();
    let result = Solver::new(plywood(), 4.2, requests.clone()).solve(PackMode::Auto);
    assert_layout_valid(&result, plywood(), &requests);
    assert!(result.unplaced.is_empty());
    assert!(!result.cancelled);

    // 10 x 1000x500 + 10 x 700x500 + 35 x 500x400 needs at least 5.5 boards
    assert!(result.sheet_count() >= 6);
}

/// Figures the banded baseline settles on for this batch. The first two
/// sheets each hold a single 1000-high band of four turned 1000x500 parts.
#[test]
fn baseline_reference_figures() {
    let result = Solver::new(plywood(), 4.2, baseline_parts()).solve(PackMode::Auto);
    assert_eq!(result.mode, StrategyTag::Banded);
    assert_eq!(result.sheet_count(), 8);
    assert_eq!(result.total_cuts(), 53);
    assert!(result.unplaced.is_empty());

    let expected = 15_500_000.0 / (8.0 * 2440.0 * 1220.0) * 100.0;
    assert!((result.total_efficiency - expected).abs() < 1e-9);

    for sheet in &result.bins[..2] {
        assert_eq!(sheet.placed.len(), 4);
        assert!(sheet.placed.iter().all(|p| p.rotated && p.height == 1000.0));
        assert_eq!(sheet.cutting_count, 5);
    }
}

/// Every width in the batch is a multiple of 100, so with a 4.2 kerf no band
/// ever ends exactly at 2440. Each band then has to keep a trailing offcut of
/// at least the 404.2 sliver threshold, which caps its used width at 2000.
#[test]
fn baseline_bands_keep_a_full_offcut() {
    let result = Solver::new(plywood(), 4.2, baseline_parts()).solve(PackMode::Auto);
    for (si, sheet) in result.bins.iter().enumerate() {
        let mut widths: BTreeMap<i64, f64> = BTreeMap::new();
        let mut ends: BTreeMap<i64, f64> = BTreeMap::new();
        for p in &sheet.placed {
            let key = (p.y * 1000.0).round() as i64;
            *widths.entry(key).or_default() += p.width;
            let end = ends.entry(key).or_default();
            *end = end.max(p.right());
        }
        for (y, end) in &ends {
            let offcut = 2440.0 - end - 4.2;
            assert!(offcut >= 404.2 - EPS, "sheet {si}, band {y}: offcut {offcut}");
            assert!(widths[y] <= 2000.0 + EPS);
        }
    }
}

#[test]
fn infeasible_parts_end_up_unplaced() {
    let requests = vec![
        PartRequest::new(3000.0, 100.0, 2),
        PartRequest::fixed(100.0, 1500.0, 1),
        PartRequest::new(500.0, 400.0, 5),
        // Fits only when turned
        PartRequest::new(100.0, 1500.0, 1),
    ];
    let result = Solver::new(plywood(), 4.2, requests.clone()).solve(PackMode::Auto);
    assert_layout_valid(&result, plywood(), &requests);

    assert_eq!(result.unplaced.len(), 3);
    assert!(result.unplaced.iter().all(|p| p.request < 2));
    let placed = result.bins.iter().flat_map(|s| &s.placed);
    assert!(placed.clone().all(|p| p.request >= 2));
    assert_eq!(placed.count(), 6);
}

#[test]
fn horizontal_mode_matches_area_ratio() {
    let board = Board::new(1220.0, 2440.0);
    let requests = vec![PartRequest::new(400.0, 300.0, 35)];
    let result = Solver::new(board, 4.2, requests.clone()).solve(PackMode::Horizontal);
    assert_layout_valid(&result, board, &requests);

    assert_eq!(result.mode, StrategyTag::Horizontal);
    assert!(result.unplaced.is_empty());
    assert_eq!(result.placed_count(), 35);
    // Three columns of eight fit a board
    assert_eq!(result.sheet_count(), 2);

    let expected =
        35.0 * 400.0 * 300.0 / (result.sheet_count() as f64 * 1220.0 * 2440.0) * 100.0;
    assert!((result.total_efficiency - expected).abs() < 1e-9);
}

#[test]
fn long_parts_fall_back_and_place_everything() {
    let requests = vec![
        PartRequest::new(2300.0, 280.0, 10),
        PartRequest::new(2100.0, 300.0, 8),
        PartRequest::new(1800.0, 420.0, 6),
    ];
    let result = Solver::new(plywood(), 4.2, requests.clone()).solve(PackMode::Auto);
    assert_layout_valid(&result, plywood(), &requests);
    assert!(result.unplaced.is_empty());
}

#[test]
fn many_small_parts() {
    let requests = vec![
        PartRequest::new(120.0, 80.0, 120),
        PartRequest::new(95.0, 60.0, 160),
        PartRequest::new(70.0, 50.0, 220),
    ];
    let result = Solver::new(plywood(), 4.2, requests.clone()).solve(PackMode::Auto);
    assert_layout_valid(&result, plywood(), &requests);
    assert!(result.unplaced.is_empty());
    assert!(result.sheet_count() >= 2);
}

#[test]
fn fixed_parts_never_rotate() {
    let requests = vec![
        PartRequest::fixed(900.0, 350.0, 20),
        PartRequest::fixed(600.0, 450.0, 15),
        PartRequest::fixed(300.0, 700.0, 10),
    ];
    for mode in [PackMode::Auto, PackMode::Horizontal] {
        let result = Solver::new(plywood(), 4.2, requests.clone()).solve(mode);
        assert_layout_valid(&result, plywood(), &requests);
        assert!(result.unplaced.is_empty());
        assert!(result.bins.iter().flat_map(|s| &s.placed).all(|p| !p.rotated));
    }
}

#[test]
fn repeated_runs_are_identical() {
    let solver = Solver::new(plywood(), 4.2, baseline_parts());
    for mode in [PackMode::Auto, PackMode::Horizontal] {
        let first = solver.solve(mode);
        let second = solver.solve(mode);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn cancelled_run_keeps_every_part() {
    let requests = baseline_parts();
    let solver = Solver::new(plywood(), 4.2, requests.clone());
    let result = solver.solve_with_cancel(PackMode::Auto, &AtomicBool::new(true));
    assert!(result.cancelled);
    assert_layout_valid(&result, plywood(), &requests);
    assert_eq!(result.unplaced.len(), 55);
}

#[test]
fn result_serializes_with_expected_fields() {
    let result = Solver::new(
        Board::new(100.0, 100.0),
        0.0,
        vec![PartRequest::fixed(50.0, 50.0, 4)],
    )
    .solve(PackMode::Auto);
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["mode"], "banded");
    assert_eq!(json["cancelled"], false);
    let sheet = &json["bins"][0];
    for key in [
        "placed",
        "cuts_x",
        "cuts_y",
        "used_area",
        "total_area",
        "efficiency",
        "cutting_count",
    ] {
        assert!(sheet.get(key).is_some(), "missing {key}");
    }
    let part = &sheet["placed"][0];
    for key in ["x", "y", "width", "height", "rotated", "original_width", "original_height"] {
        assert!(part.get(key).is_some(), "missing {key}");
    }
}
