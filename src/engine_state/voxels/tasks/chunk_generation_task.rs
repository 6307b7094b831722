//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask`, which fills one region's
//! voxel grid on a worker thread. Tasks are published by the streaming loop
//! for every region it starts tracking; the finished grid is handed back to
//! the loop's [`StreamingState`] on the streaming thread.

use std::sync::Arc;

use cgmath::Point3;
use log::trace;

use crate::core::CancellationToken;
use crate::engine_state::streaming::worker::StreamingState;
use crate::engine_state::task_management::task::{Task, TaskResult};
use crate::engine_state::voxels::chunk::chunk_creation::ChunkGenerator;
use crate::engine_state::voxels::chunk::Chunk;
use crate::error::GenerationError;

/// A task that generates a region grid asynchronously.
///
/// This task is responsible for:
/// 1. Skipping the work if the region was evicted while the task waited
/// 2. Generating the grid with its structures and caves; buffered overrides
///    are applied on the streaming thread once the grid is kept
/// 3. Returning the grid so the streaming loop can store and mesh it
pub struct ChunkGenerationTask {
    generator: Arc<ChunkGenerator>,
    /// The region to generate (in region coordinates)
    position: Point3<i32>,
    /// The token of the store entry the task was scheduled for
    cancel: CancellationToken,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `generator` - The shared generator
    /// * `position` - The region coordinates to generate
    /// * `cancel` - The token of the region's store entry
    pub fn new(
        generator: Arc<ChunkGenerator>,
        position: Point3<i32>,
        cancel: CancellationToken,
    ) -> Self {
        ChunkGenerationTask {
            generator,
            position,
            cancel,
        }
    }

    pub fn position(&self) -> Point3<i32> {
        self.position
    }
}

impl Task<StreamingState> for ChunkGenerationTask {
    fn process(&self) -> Box<dyn TaskResult<StreamingState>> {
        let outcome = if self.cancel.is_cancelled() {
            trace!("Skipping generation of evicted region {:?}", self.position);
            None
        } else {
            Some(Ok(self.generator.generate_unmerged(self.position)))
        };

        Box::new(ChunkGenerationTaskResult {
            position: self.position,
            cancel: self.cancel.clone(),
            outcome,
        })
    }

    fn on_panic(&self, reason: String) -> Box<dyn TaskResult<StreamingState>> {
        Box::new(ChunkGenerationTaskResult {
            position: self.position,
            cancel: self.cancel.clone(),
            outcome: Some(Err(GenerationError::Panicked {
                region: self.position,
                reason,
            })),
        })
    }
}

/// The result of a chunk generation task.
///
/// `outcome` is `None` when the task was skipped because its region had
/// already been evicted.
pub struct ChunkGenerationTaskResult {
    position: Point3<i32>,
    cancel: CancellationToken,
    outcome: Option<Result<Chunk, GenerationError>>,
}

impl TaskResult<StreamingState> for ChunkGenerationTaskResult {
    /// Stores the grid and schedules its mesh build on the streaming thread.
    fn handle_result(
        self: Box<Self>,
        state: &mut StreamingState,
    ) -> Vec<Box<dyn Task<StreamingState>>> {
        let ChunkGenerationTaskResult {
            position,
            cancel,
            outcome,
        } = *self;
        state.region_generated(position, &cancel, outcome);
        Vec::new()
    }
}
