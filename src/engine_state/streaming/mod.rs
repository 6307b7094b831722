//! # Streaming
//!
//! Keeps the regions around an observer generated and meshed.
//!
//! ## Architecture
//! - [`Streamer`]: The consumer-facing handle. `init()` starts the streaming
//!   thread, `tick()` publishes finished meshes, `shutdown()` stops everything
//! - [`worker::StreamingWorker`]: The loop on the streaming thread that owns
//!   scheduling, eviction and the cooperative mesh builds
//! - The generation pool in [`task_management`](crate::engine_state::task_management)
//!
//! The streaming thread and `tick()` share the region store. `tick()` never
//! generates or meshes; it only drains [`StreamEvent`]s and hands meshes to a
//! [`Presentation`].
//!
//! ## Usage
//! ```no_run
//! use std::sync::Arc;
//! use cgmath::{Point2, Point3};
//! use voxel_terrain::config::WorldConfig;
//! use voxel_terrain::engine_state::meshing::Mesh;
//! use voxel_terrain::engine_state::observer::SharedObserver;
//! use voxel_terrain::engine_state::streaming::{Presentation, Streamer};
//!
//! struct Scene;
//!
//! impl Presentation for Scene {
//!     fn attach(&mut self, _region: Point3<i32>, _origin: Point3<i32>, _mesh: &Mesh) {}
//!     fn detach(&mut self, _region: Point3<i32>) {}
//! }
//!
//! # fn main() -> Result<(), voxel_terrain::error::StreamingError> {
//! let observer = SharedObserver::new(Point2::new(0, 0));
//! let mut streamer = Streamer::new(WorldConfig::default(), Arc::new(observer.clone()))?;
//! streamer.init()?;
//!
//! let mut scene = Scene;
//! while !streamer.is_world_ready() {
//!     streamer.tick(&mut scene)?;
//! }
//! observer.set_column(Point2::new(4, 0));
//! streamer.tick(&mut scene)?;
//! streamer.shutdown()
//! # }
//! ```

pub mod presentation;
pub mod worker;

pub use presentation::{Presentation, TickReport};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cgmath::Point3;
use log::{error, info};

use crate::config::WorldConfig;
use crate::core::MtResource;
use crate::engine_state::observer::ObserverPosition;
use crate::engine_state::task_management::TaskManager;
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::chunk::chunk_creation::ChunkGenerator;
use crate::engine_state::voxels::chunk::region_origin;
use crate::engine_state::voxels::noise_field::NoiseField;
use crate::engine_state::voxels::structure_buffer::StructureBuffer;
use crate::engine_state::voxels::world::World;
use crate::error::{panic_message, StreamingError};

use worker::{StreamingState, StreamingWorker};

/// Notifications from the streaming thread to `tick()`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// A build finished and its mesh is stored in the region's entry.
    MeshReady {
        position: Point3<i32>,
        build_id: u64,
    },
    /// The region left the desired set and was removed from the store.
    Evicted(Point3<i32>),
}

/// Streams terrain around an observer.
pub struct Streamer {
    config: Arc<WorldConfig>,
    world: MtResource<World>,
    generator: Arc<ChunkGenerator>,
    observer: Arc<dyn ObserverPosition>,
    stop: Arc<AtomicBool>,
    world_ready: Arc<AtomicBool>,
    events: Option<Receiver<StreamEvent>>,
    worker: Option<JoinHandle<Result<(), StreamingError>>>,
    published: HashSet<Point3<i32>>,
    started: bool,
}

impl Streamer {
    /// Validates the configuration and builds the generation pipeline.
    ///
    /// Nothing runs until [`Streamer::init`].
    ///
    /// # Errors
    /// [`StreamingError::Config`] if the configuration is invalid.
    pub fn new(
        config: WorldConfig,
        observer: Arc<dyn ObserverPosition>,
    ) -> Result<Self, StreamingError> {
        config.validate()?;
        let config = Arc::new(config);
        let noise = Arc::new(NoiseField::new(&config));
        let generator = Arc::new(ChunkGenerator::new(
            config.clone(),
            noise,
            StructureBuffer::new(),
        ));

        Ok(Streamer {
            world: MtResource::new(World::new(config.region)),
            config,
            generator,
            observer,
            stop: Arc::new(AtomicBool::new(false)),
            world_ready: Arc::new(AtomicBool::new(false)),
            events: None,
            worker: None,
            published: HashSet::new(),
            started: false,
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Starts the generation pool and the streaming thread.
    ///
    /// # Errors
    /// - [`StreamingError::AlreadyRunning`] if called twice
    /// - [`StreamingError::Spawn`] if a thread cannot be created
    pub fn init(&mut self) -> Result<(), StreamingError> {
        if self.started {
            return Err(StreamingError::AlreadyRunning);
        }

        let task_manager = TaskManager::new(self.config.streaming.worker_threads)?;
        let (events_tx, events_rx) = channel();
        let state = StreamingState::new(
            self.config.clone(),
            self.world.clone(),
            self.generator.clone(),
            events_tx,
        );
        let worker = StreamingWorker::new(
            state,
            task_manager,
            self.observer.clone(),
            self.stop.clone(),
            self.world_ready.clone(),
        );

        let handle = thread::Builder::new()
            .name("terrain-streamer".to_string())
            .spawn(move || worker.run())
            .map_err(StreamingError::Spawn)?;

        self.events = Some(events_rx);
        self.worker = Some(handle);
        self.started = true;
        info!(
            "Streaming started (seed {}, active radius {}, starting radius {})",
            self.config.seed,
            self.config.streaming.active_radius,
            self.config.streaming.starting_radius
        );
        Ok(())
    }

    /// Publishes meshes finished since the last tick and detaches evicted ones.
    ///
    /// Cheap enough to call every frame: it performs no generation or meshing.
    ///
    /// # Errors
    /// A [`StreamingError`] if the streaming thread has died.
    pub fn tick<P>(&mut self, presentation: &mut P) -> Result<TickReport, StreamingError>
    where
        P: Presentation + ?Sized,
    {
        let mut report = TickReport::default();

        if let Some(events) = &self.events {
            let world = self.world.get();
            for event in events.try_iter() {
                match event {
                    StreamEvent::MeshReady { position, build_id } => {
                        let Some(entry) = world.get_region_at(position) else {
                            continue;
                        };
                        // A newer build replaced this mesh; its own event follows.
                        if entry.build_id != build_id {
                            continue;
                        }
                        let Some(mesh) = entry.mesh.as_ref() else {
                            continue;
                        };
                        presentation.attach(
                            position,
                            region_origin(position, world.dimensions()),
                            mesh,
                        );
                        self.published.insert(position);
                        report.attached += 1;
                    }
                    StreamEvent::Evicted(position) => {
                        if self.published.remove(&position) {
                            presentation.detach(position);
                            report.detached += 1;
                        }
                    }
                }
            }
        }

        self.check_worker()?;
        Ok(report)
    }

    fn check_worker(&mut self) -> Result<(), StreamingError> {
        if !self.started || self.stop.load(Ordering::Acquire) {
            return Ok(());
        }
        match self.worker.take() {
            Some(handle) if handle.is_finished() => Self::join_worker(handle, false),
            Some(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            // Already joined and reported.
            None => Err(StreamingError::WorkerExited),
        }
    }

    fn join_worker(
        handle: JoinHandle<Result<(), StreamingError>>,
        stopping: bool,
    ) -> Result<(), StreamingError> {
        match handle.join() {
            Ok(Ok(())) if stopping => Ok(()),
            Ok(Ok(())) => Err(StreamingError::WorkerExited),
            Ok(Err(error)) => {
                error!("Streaming loop failed: {}", error);
                Err(error)
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!("Streaming loop panicked: {}", reason);
                Err(StreamingError::WorkerPanicked(reason))
            }
        }
    }

    /// Stops the streaming thread and the generation pool, waiting for both.
    ///
    /// No generation or meshing runs once this returns.
    ///
    /// # Errors
    /// The failure of the streaming thread, if it failed before being stopped.
    pub fn shutdown(mut self) -> Result<(), StreamingError> {
        self.stop.store(true, Ordering::Release);
        let result = match self.worker.take() {
            Some(handle) => Self::join_worker(handle, true),
            None => Ok(()),
        };
        info!("Streaming shut down");
        result
    }

    /// Reads a world cell.
    ///
    /// # Returns
    /// The block type, or `AIR` for any cell outside the loaded regions.
    pub fn query_voxel(&self, x: i32, y: i32, z: i32) -> BlockType {
        self.world.get().get_block_at(Point3::new(x, y, z))
    }

    /// Whether every region within the starting radius has been meshed once.
    pub fn is_world_ready(&self) -> bool {
        self.world_ready.load(Ordering::Acquire)
    }

    /// Number of regions in the store that have a grid.
    pub fn loaded_region_count(&self) -> usize {
        let world = self.world.get();
        world
            .positions()
            .into_iter()
            .filter(|position| {
                world
                    .get_region_at(*position)
                    .is_some_and(|entry| entry.is_grid_ready())
            })
            .count()
    }

    /// Regions whose mesh is currently attached to the presentation.
    pub fn published_regions(&self) -> &HashSet<Point3<i32>> {
        &self.published
    }
}

impl Drop for Streamer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            if let Err(error) = Self::join_worker(handle, true) {
                error!("Streaming stopped with an error: {}", error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::observer::SharedObserver;
    use cgmath::Point2;

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = WorldConfig::default();
        config.region.x = 0;
        let observer = Arc::new(SharedObserver::new(Point2::new(0, 0)));
        assert!(matches!(
            Streamer::new(config, observer),
            Err(StreamingError::Config(_))
        ));
    }

    #[test]
    fn test_unloaded_cells_read_as_air() {
        let observer = Arc::new(SharedObserver::new(Point2::new(0, 0)));
        let streamer = Streamer::new(WorldConfig::default(), observer).unwrap();
        assert_eq!(streamer.query_voxel(0, 64, 0), BlockType::AIR);
        assert_eq!(streamer.query_voxel(0, -5, 0), BlockType::AIR);
        assert_eq!(streamer.loaded_region_count(), 0);
    }
}
