#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Terrain
//!
//! A procedural voxel terrain pipeline: seeded noise fills region grids with
//! terrain, caves and structures, grids are meshed into exterior-face geometry,
//! and a background streamer keeps the regions around an observer loaded.
//!
//! ## Key Modules
//!
//! * `config` - The immutable world configuration
//! * `core` - Concurrency primitives used throughout the crate
//! * `engine_state` - Generation, meshing, task management and streaming
//! * `error` - Error types for every fallible operation
//!
//! ## Architecture
//!
//! The pipeline has clear separation between:
//! * Deterministic generation (noise, grids, caves, structures)
//! * Geometry construction (incremental meshing with boundary culling)
//! * Scheduling (a streaming thread plus a generation worker pool)
//! * Presentation, which the consumer supplies through a trait
//!
//! ## Usage
//!
//! ```no_run
//! fn main() {
//!     if let Err(error) = voxel_terrain::run() {
//!         eprintln!("{}", error);
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cgmath::{Point2, Point3};
use log::{debug, info};

pub mod config;
pub mod core;
pub mod engine_state;
pub mod error;

use config::WorldConfig;
use engine_state::meshing::Mesh;
use engine_state::observer::SharedObserver;
use engine_state::streaming::{Presentation, Streamer};
use error::StreamingError;

/// Interval between ticks of the headless driver.
const TICK_INTERVAL: Duration = Duration::from_millis(16);
/// Columns the headless observer walks along +X after the world is ready.
const WALK_STEPS: i32 = 4;
/// Ticks spent on each column of the walk.
const TICKS_PER_STEP: usize = 120;

/// Configures `env_logger` to write to stdout, filtered by `RUST_LOG`.
///
/// Calling it more than once is harmless.
pub fn init_logger() {
    let mut log_builder = env_logger::Builder::new();
    let initialized = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init()
        .is_ok();
    if initialized {
        info!("Logger initialized");
    }
}

/// Keeps track of attached meshes and logs every change.
#[derive(Default)]
struct LoggingPresentation {
    faces: HashMap<Point3<i32>, usize>,
}

impl LoggingPresentation {
    fn total_faces(&self) -> usize {
        self.faces.values().sum()
    }
}

impl Presentation for LoggingPresentation {
    fn attach(&mut self, region: Point3<i32>, origin: Point3<i32>, mesh: &Mesh) {
        debug!(
            "Attached region {:?} at {:?}: {} faces",
            region,
            origin,
            mesh.face_count()
        );
        self.faces.insert(region, mesh.face_count());
    }

    fn detach(&mut self, region: Point3<i32>) {
        debug!("Detached region {:?}", region);
        self.faces.remove(&region);
    }
}

/// Runs the headless driver.
///
/// Loads the JSON configuration named by the first command-line argument (or
/// the defaults), streams until the world is ready, walks the observer along
/// +X and shuts down.
///
/// # Errors
/// Configuration and streaming failures.
pub fn run() -> Result<(), StreamingError> {
    init_logger();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            WorldConfig::from_json_file(path)?
        }
        None => WorldConfig::default(),
    };

    let observer = SharedObserver::new(Point2::new(0, 0));
    let mut streamer = Streamer::new(config, Arc::new(observer.clone()))?;
    streamer.init()?;

    let mut presentation = LoggingPresentation::default();
    let started = Instant::now();
    while !streamer.is_world_ready() {
        streamer.tick(&mut presentation)?;
        thread::sleep(TICK_INTERVAL);
    }
    info!(
        "World ready after {:.2?}: {} regions attached, {} faces",
        started.elapsed(),
        presentation.faces.len(),
        presentation.total_faces()
    );

    for step in 1..=WALK_STEPS {
        observer.set_column(Point2::new(step, 0));
        let mut attached = 0;
        let mut detached = 0;
        for _ in 0..TICKS_PER_STEP {
            let report = streamer.tick(&mut presentation)?;
            attached += report.attached;
            detached += report.detached;
            thread::sleep(TICK_INTERVAL);
        }
        info!(
            "Column ({}, 0): {} attached, {} detached, {} loaded regions",
            step,
            attached,
            detached,
            streamer.loaded_region_count()
        );
    }

    streamer.shutdown()
}
