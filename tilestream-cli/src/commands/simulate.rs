//! Headless camera simulation.
//!
//! Drives a [`Map`] with a virtual camera that pans eastward while its zoom
//! drifts up and down, printing pipeline statistics as it goes. Stops after
//! the requested number of frames or on Ctrl-C.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Args;
use tilestream::view::{HALF_CIRCUMFERENCE, TILE_SIZE_PIXELS};
use tilestream::{DebugFlag, Map, ViewState};
use tracing::info;

use super::common::{demo_scene, demo_source, load_config};
use crate::error::CliError;

/// Arguments for `tilestream simulate`.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Frames to run (0 runs until Ctrl-C)
    #[arg(long, default_value = "600")]
    pub frames: u32,

    /// Target frames per second
    #[arg(long, default_value = "60")]
    pub fps: u32,

    /// Start longitude in decimal degrees
    #[arg(long, default_value = "-74.006", allow_hyphen_values = true)]
    pub lon: f64,

    /// Start latitude in decimal degrees
    #[arg(long, default_value = "40.7128", allow_hyphen_values = true)]
    pub lat: f64,

    /// Base zoom level
    #[arg(long, default_value = "12")]
    pub zoom: f32,

    /// How far the zoom drifts above and below the base
    #[arg(long, default_value = "1.5")]
    pub zoom_swing: f32,

    /// Pan speed in screen pixels per second
    #[arg(long, default_value = "300")]
    pub pan_speed: f64,

    /// Viewport width in pixels
    #[arg(long, default_value = "1280")]
    pub width: f32,

    /// Viewport height in pixels
    #[arg(long, default_value = "720")]
    pub height: f32,

    /// Synthetic grid size (buildings per row)
    #[arg(long, default_value = "8")]
    pub grid: u32,

    /// Artificial load latency per tile in milliseconds
    #[arg(long, default_value = "20")]
    pub latency_ms: u64,

    /// Print statistics every N frames
    #[arg(long, default_value = "60")]
    pub report_every: u32,
}

/// Scripted camera path.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    base_zoom: f32,
    zoom_swing: f32,
    pan_speed: f64,
}

impl Camera {
    pub fn new(base_zoom: f32, zoom_swing: f32, pan_speed: f64) -> Self {
        Self {
            base_zoom,
            zoom_swing,
            pan_speed,
        }
    }

    /// Moves the view to where the camera is `elapsed` seconds in, having
    /// advanced `dt` seconds since the last call.
    pub fn advance(&self, view: &mut ViewState, elapsed: f64, dt: f64) {
        let meters_per_pixel =
            view.projection().tile_size_meters(view.zoom() as f64) / TILE_SIZE_PIXELS;
        view.translate(self.pan_speed * dt * meters_per_pixel, 0.0);
        // Wrap around the antimeridian
        let [x, y] = view.center();
        if x > HALF_CIRCUMFERENCE {
            view.set_center([x - 2.0 * HALF_CIRCUMFERENCE, y]);
        }
        view.set_zoom(self.base_zoom + self.zoom_swing * (elapsed * 0.25).sin() as f32);
    }
}

/// Run the simulate command.
pub fn run(args: SimulateArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    if args.fps == 0 {
        return Err(CliError::InvalidArgument("--fps must be at least 1".to_string()));
    }

    let config = load_config(config_path)?;
    let map = Map::new(config)?;
    map.set_debug_flag(DebugFlag::Infos, true);

    let source = demo_source(args.grid, Duration::from_millis(args.latency_ms));
    map.load_scene(demo_scene(source));

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Signal(e.to_string()))?;

    let camera = Camera::new(args.zoom, args.zoom_swing, args.pan_speed);
    let mut view = ViewState::from_lon_lat(args.lon, args.lat, args.zoom, [args.width, args.height]);
    let frame_duration = Duration::from_secs_f64(1.0 / args.fps as f64);
    let report_every = args.report_every.max(1);

    println!(
        "Simulating {} at {:.4}, {:.4} zoom {} (Ctrl-C to stop)",
        if args.frames == 0 {
            "until interrupted".to_string()
        } else {
            format!("{} frames", args.frames)
        },
        args.lat,
        args.lon,
        args.zoom
    );

    let started = Instant::now();
    let mut last = started;
    let mut frame = 0u32;
    while !shutdown.load(Ordering::SeqCst) && (args.frames == 0 || frame < args.frames) {
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64();
        last = now;

        camera.advance(&mut view, now.duration_since(started).as_secs_f64(), dt);
        map.update_view(dt as f32, &mut view);
        frame += 1;

        if frame % report_every == 0 {
            println!("--- frame {} ---", frame);
            println!("{}", map.stats());
        }

        let spent = now.elapsed();
        if spent < frame_duration {
            thread::sleep(frame_duration - spent);
        }
    }

    info!(frames = frame, "Simulation finished");
    println!();
    println!("Final statistics after {} frames:", frame);
    println!("{}", map.stats());
    Ok(())
}
