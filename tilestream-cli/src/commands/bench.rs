//! Tile builder benchmark.
//!
//! Loads one synthetic tile, then parses and builds it repeatedly against the
//! demo scene and reports build times.

use std::time::{Duration, Instant};

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tilestream::{TileBuilder, TileId, TileSource, TileTask, MAX_ZOOM};

use super::common::{demo_scene, demo_source, DEMO_SOURCE};
use crate::error::CliError;

/// Arguments for `tilestream bench`.
#[derive(Debug, Args)]
pub struct BenchArgs {
    /// Number of builds to time
    #[arg(long, default_value = "100")]
    pub iterations: u32,

    /// Synthetic grid size (buildings per row)
    #[arg(long, default_value = "8")]
    pub grid: u32,

    /// Zoom level of the benchmark tile
    #[arg(long, default_value = "14")]
    pub zoom: u8,

    /// Also build the debug tile outline
    #[arg(long)]
    pub tile_bounds: bool,
}

/// Timing summary of a benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchReport {
    pub iterations: u32,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
    pub meshes: usize,
    pub vertices: usize,
    pub bytes: usize,
}

/// Run the bench command.
pub fn run(args: BenchArgs) -> Result<(), CliError> {
    if args.iterations == 0 {
        return Err(CliError::InvalidArgument(
            "--iterations must be at least 1".to_string(),
        ));
    }
    if args.zoom > MAX_ZOOM {
        return Err(CliError::InvalidArgument(format!(
            "--zoom must be at most {}",
            MAX_ZOOM
        )));
    }

    println!(
        "Building tile at zoom {} ({}x{} grid) {} times",
        args.zoom, args.grid, args.grid, args.iterations
    );

    let progress = ProgressBar::new(args.iterations as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let report = bench(&args, || progress.inc(1))?;
    progress.finish_and_clear();

    println!("Built {} times", report.iterations);
    println!("  Mean: {:.3} ms", ms(report.mean));
    println!("  Min:  {:.3} ms", ms(report.min));
    println!("  Max:  {:.3} ms", ms(report.max));
    println!(
        "  Tile: {} meshes, {} vertices, {} bytes",
        report.meshes, report.vertices, report.bytes
    );
    Ok(())
}

/// Times `args.iterations` parse + build passes, calling `tick` after each.
pub fn bench(args: &BenchArgs, mut tick: impl FnMut()) -> Result<BenchReport, CliError> {
    let source = demo_source(args.grid, Duration::ZERO);
    let scene = demo_scene(source.clone());
    let builder = TileBuilder::new(scene).with_tile_bounds(args.tile_bounds);

    let n = 1u32 << args.zoom;
    let id = TileId::new(n / 2, n / 2, args.zoom, DEMO_SOURCE);
    let mut task = TileTask::new(id);
    source.load(&mut task)?;

    let mut total = Duration::ZERO;
    let mut min = Duration::MAX;
    let mut max = Duration::ZERO;
    let mut last = None;

    for _ in 0..args.iterations {
        let start = Instant::now();
        let data = source.parse(&task)?;
        let tile = builder.build(id, &data, &source)?;
        let elapsed = start.elapsed();

        total += elapsed;
        min = min.min(elapsed);
        max = max.max(elapsed);
        last = Some(tile);
        tick();
    }

    let (meshes, vertices, bytes) = last
        .map(|tile| {
            let vertices = tile.meshes().map(|(_, mesh)| mesh.vertex_count()).sum();
            (tile.meshes().count(), vertices, tile.memory_usage())
        })
        .unwrap_or_default();

    Ok(BenchReport {
        iterations: args.iterations,
        mean: total / args.iterations,
        min,
        max,
        meshes,
        vertices,
        bytes,
    })
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
