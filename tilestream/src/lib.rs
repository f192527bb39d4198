//! Tilestream - asynchronous tile acquisition and caching for map renderers
//!
//! This library keeps the set of renderable map tiles in step with a moving
//! camera. Tiles are fetched, parsed and built into geometry on a small pool
//! of worker threads, installed on the main thread, and parked in a
//! byte-bounded LRU cache when they scroll out of view.
//!
//! # Architecture
//!
//! ```text
//!  host frame loop
//!         │ update(view, visible)
//!         ▼
//!  ┌─────────────┐   enqueue    ┌────────────┐  load / parse  ┌────────────┐
//!  │ TileManager │─────────────►│ TileWorker │───────────────►│ TileSource │
//!  │  TileSets   │◄─────────────│  threads   │                └────────────┘
//!  └──────┬──────┘  completions └─────┬──────┘
//!         │ evict / reinstate         │ build
//!         ▼                           ▼
//!  ┌─────────────┐              ┌─────────────┐
//!  │  TileCache  │              │ TileBuilder │
//!  └─────────────┘              └─────────────┘
//! ```
//!
//! [`Map`] is the entry point for hosts; [`TileManager`], [`TileWorker`],
//! [`TileCache`] and [`TileBuilder`] are usable on their own.

pub mod builder;
pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod main_loop;
pub mod manager;
pub mod map;
pub mod stats;
pub mod style;
pub mod task;
pub mod tile;
pub mod view;
pub mod worker;

pub use builder::TileBuilder;
pub use cache::{CacheStats, TileCache};
pub use config::{ConfigError, PipelineConfig, ProxyConfig};
pub use data::{Feature, Geometry, Layer, MemorySource, SyntheticSource, TileData, TileSource};
pub use error::{PipelineError, StyleError, TileError};
pub use main_loop::MainThreadQueue;
pub use manager::{ManagerStats, TileLocation, TileManager};
pub use map::{DebugFlag, Map};
pub use stats::PipelineStats;
pub use style::{Scene, Style};
pub use task::{Priority, TaskHandle, TaskId, TaskOutcome, TaskResult, TileTask};
pub use tile::{Mesh, SourceId, Tile, TileCoord, TileId, TileState, Vertex, MAX_ZOOM};
pub use view::{MercatorProjection, ViewState};
pub use worker::{TileWorker, WorkerStats};
