use std::time::Duration;

use clap::Parser;
use sheet_cutter::input::{parse_board, parse_kerf, parse_mode, parse_part, validate_requests};
use sheet_cutter::job::PackJob;
use sheet_cutter::render;
use sheet_cutter::solver::Solver;
use sheet_cutter::types::{Board, PackMode, PackingResult, PartRequest};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "sheet_cutter",
    about = "Guillotine sheet cutting layout optimizer"
)]
struct Cli {
    /// Board dimensions (WxH, e.g. 2440x1220)
    #[arg(long, value_parser = parse_board)]
    board: Board,

    /// Parts as WxH:qty, optionally WxH:qty:fixed (e.g. 800x600:3 400x300:5:fixed)
    #[arg(long, num_args = 1.., required = true)]
    parts: Vec<String>,

    /// Blade kerf width (default: 0)
    #[arg(long, default_value = "0", value_parser = parse_kerf)]
    kerf: f64,

    /// Packing mode: auto or horizontal
    #[arg(long, default_value = "auto", value_parser = parse_mode)]
    mode: PackMode,

    /// Disable rotation for every part
    #[arg(long)]
    no_rotate: bool,

    /// Show ASCII layout of each sheet
    #[arg(long)]
    layout: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Stop after this many milliseconds and print the partial layout
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log progress to stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", msg);
    std::process::exit(1);
}

fn print_text(result: &PackingResult, layout: bool) {
    for (i, sheet) in result.bins.iter().enumerate() {
        println!(
            "Sheet {}: {:.1}% used, {} cuts",
            i + 1,
            sheet.efficiency,
            sheet.cutting_count
        );
        for p in &sheet.placed {
            let rot = if p.rotated { " [rotated]" } else { "" };
            println!("  {}x{} @ ({}, {}){}", p.width, p.height, p.x, p.y, rot);
        }
        if layout {
            print!("{}", render::render_sheet(sheet));
        }
        println!();
    }

    if !result.unplaced.is_empty() {
        println!("Unplaced:");
        for p in &result.unplaced {
            println!("  {}x{}", p.original_width, p.original_height);
        }
        println!();
    }

    println!(
        "Summary: {} sheet{} used, {:.1}% efficiency, {} cuts, strategy {}{}",
        result.sheet_count(),
        if result.sheet_count() == 1 { "" } else { "s" },
        result.total_efficiency,
        result.total_cuts(),
        result.mode,
        if result.cancelled { " (cancelled)" } else { "" },
    );
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(level)
        .init();

    let requests: Vec<PartRequest> = cli
        .parts
        .iter()
        .map(|p| parse_part(p, !cli.no_rotate))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| fail(e));
    validate_requests(&requests).unwrap_or_else(|e| fail(e));

    let solver = Solver::new(cli.board, cli.kerf, requests);
    let result = match cli.timeout_ms {
        Some(ms) => PackJob::spawn(solver, cli.mode)
            .wait_timeout(Duration::from_millis(ms))
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
        None => solver.solve(cli.mode),
    };

    if cli.json {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => fail(e),
        }
    } else {
        print_text(&result, cli.layout);
    }
}
