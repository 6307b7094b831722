//! # Streaming Worker
//!
//! The loop that runs on the streaming thread. Each pass it:
//! 1. Recomputes the desired region set when the observer's column or the
//!    radius changed, evicting regions that left it
//! 2. Adds missing regions to the world and publishes their generation tasks,
//!    nearest first
//! 3. Applies finished grids from the worker pool and schedules mesh builds
//! 4. Advances every in-flight mesh build by one bounded slice, round-robin
//! 5. Raises the world-ready flag once the starting area is meshed
//!
//! Only this thread mutates the world, so grid and mesh replacement never
//! race each other. The consumer learns about published and evicted meshes
//! through [`StreamEvent`]s.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cgmath::{Point2, Point3};
use log::{debug, error, info, trace, warn};

use crate::config::{RegionDimensions, WorldConfig};
use crate::core::{CancellationToken, MtResource};
use crate::engine_state::meshing::{BoundaryPlanes, BuildProgress, MeshBuilder};
use crate::engine_state::observer::ObserverPosition;
use crate::engine_state::task_management::TaskManager;
use crate::engine_state::voxels::block::block_side::BlockSide;
use crate::engine_state::voxels::chunk::chunk_creation::ChunkGenerator;
use crate::engine_state::voxels::chunk::Chunk;
use crate::engine_state::voxels::structure_buffer::{PendingOverride, StructureBuffer};
use crate::engine_state::voxels::tasks::ChunkGenerationTask;
use crate::engine_state::voxels::world::{RegionState, World};
use crate::error::{GenerationError, MeshError, StreamingError};

use super::StreamEvent;

/// Every region within `radius` of `column`, nearest first.
///
/// A column belongs to the set when `|dx| < radius` and `|dz| < radius`;
/// each column contributes its `regions_per_column` stacked regions.
///
/// # Examples
/// ```
/// use cgmath::{Point2, Point3};
/// use voxel_terrain::engine_state::streaming::worker::desired_regions;
///
/// let regions = desired_regions(Point2::new(4, -2), 2, 1);
/// assert_eq!(regions.len(), 9);
/// assert_eq!(regions[0], Point3::new(4, 0, -2));
/// ```
pub fn desired_regions(
    column: Point2<i32>,
    radius: i32,
    regions_per_column: i32,
) -> Vec<Point3<i32>> {
    let reach = (radius - 1).max(0);
    let mut regions = Vec::new();
    for dz in -reach..=reach {
        for dx in -reach..=reach {
            for y in 0..regions_per_column.max(0) {
                regions.push(Point3::new(column.x + dx, y, column.y + dz));
            }
        }
    }
    regions.sort_by_key(|region| {
        let (dx, dz) = (region.x - column.x, region.z - column.y);
        (dx * dx + dz * dz, region.y)
    });
    regions
}

/// Chebyshev distance between a region's column and `column`.
fn column_distance(region: Point3<i32>, column: Point2<i32>) -> i32 {
    (region.x - column.x).abs().max((region.z - column.y).abs())
}

/// Face mask of the region sides touched by `overrides`.
fn boundary_sides(overrides: &[PendingOverride], dimensions: RegionDimensions) -> u8 {
    overrides.iter().fold(0, |mut mask, pending| {
        let offset = pending.offset;
        let faces = [
            (offset.x == 0, BlockSide::LEFT),
            (offset.x + 1 == dimensions.x, BlockSide::RIGHT),
            (offset.y == 0, BlockSide::BOTTOM),
            (offset.y + 1 == dimensions.y, BlockSide::TOP),
            (offset.z == 0, BlockSide::FRONT),
            (offset.z + 1 == dimensions.z, BlockSide::BACK),
        ];
        for (touched, side) in faces {
            if touched {
                mask |= side.mask();
            }
        }
        mask
    })
}

fn apply_overrides(chunk: &mut Chunk, overrides: &[PendingOverride]) {
    for pending in overrides {
        if let Err(error) = chunk.apply_override(pending) {
            warn!("Skipping buffered write: {}", error);
        }
    }
}

struct ActiveBuild {
    build_id: u64,
    builder: MeshBuilder,
}

/// State mutated by generation results on the streaming thread.
///
/// Grid generation results are applied through
/// [`ChunkGenerationTask`](crate::engine_state::voxels::tasks::ChunkGenerationTask)'s
/// result, which receives this state from the task manager.
pub struct StreamingState {
    config: Arc<WorldConfig>,
    world: MtResource<World>,
    generator: Arc<ChunkGenerator>,
    structure_buffer: StructureBuffer,
    builders: VecDeque<ActiveBuild>,
    events: Sender<StreamEvent>,
    next_build_id: u64,
}

impl StreamingState {
    pub fn new(
        config: Arc<WorldConfig>,
        world: MtResource<World>,
        generator: Arc<ChunkGenerator>,
        events: Sender<StreamEvent>,
    ) -> Self {
        let structure_buffer = generator.structure_buffer().clone();
        StreamingState {
            config,
            world,
            generator,
            structure_buffer,
            builders: VecDeque::new(),
            events,
            next_build_id: 0,
        }
    }

    /// Number of mesh builds in progress.
    pub fn active_builds(&self) -> usize {
        self.builders.len()
    }

    /// Applies a generation result.
    ///
    /// A grid is stored only if the entry it was generated for is still in the
    /// world, and only then are the writes buffered for it drained onto it. A
    /// failed generation drops the entry so the next pass retries it.
    ///
    /// # Arguments
    /// * `position` - The generated region
    /// * `cancel` - The token the task was scheduled with
    /// * `outcome` - `None` if the task skipped an already evicted region
    pub(crate) fn region_generated(
        &mut self,
        position: Point3<i32>,
        cancel: &CancellationToken,
        outcome: Option<Result<Chunk, GenerationError>>,
    ) {
        if self.store_generated(position, cancel, outcome) {
            trace!("Region {:?} grid ready", position);
            self.schedule_build(position);
            self.rebuild_waiting_neighbours(position);
        }
        // The generation may have spilled into loaded neighbours even when
        // its own grid was not kept.
        self.apply_late_overrides();
    }

    /// Stores a generated grid with its buffered writes applied.
    ///
    /// # Returns
    /// `true` if the grid was stored.
    fn store_generated(
        &mut self,
        position: Point3<i32>,
        cancel: &CancellationToken,
        outcome: Option<Result<Chunk, GenerationError>>,
    ) -> bool {
        if cancel.is_cancelled() {
            trace!("Discarding result for evicted region {:?}", position);
            return false;
        }
        let Some(outcome) = outcome else {
            return false;
        };

        let mut world = self.world.get_mut();
        let current = world
            .get_region_at(position)
            .is_some_and(|entry| entry.cancel.same_as(cancel));
        if !current {
            return false;
        }

        match outcome {
            Ok(mut chunk) => {
                let pending = self.structure_buffer.take_all(position);
                if !pending.is_empty() {
                    trace!("Applying {} buffered writes to region {:?}", pending.len(), position);
                }
                apply_overrides(&mut chunk, &pending);
                world.set_chunk_at(position, Arc::new(chunk))
            }
            Err(error) => {
                warn!("Generation of region {:?} failed, will retry: {}", position, error);
                world.remove_region_at(position);
                false
            }
        }
    }

    /// Re-meshes every grid-ready neighbour whose current mesh was built
    /// while `position` had no grid.
    fn rebuild_waiting_neighbours(&mut self, position: Point3<i32>) {
        let waiting: Vec<Point3<i32>> = {
            let world = self.world.get();
            BlockSide::all()
                .into_iter()
                .filter_map(|side| {
                    let neighbour = position + side.offset();
                    let entry = world.get_region_at(neighbour)?;
                    let missed = entry.built_without & side.opposite().mask() != 0;
                    (entry.is_grid_ready() && missed).then_some(neighbour)
                })
                .collect()
        };
        for neighbour in waiting {
            trace!("Region {:?} re-meshes for new neighbour {:?}", neighbour, position);
            self.schedule_build(neighbour);
        }
    }

    /// Applies buffered writes whose destination grid already exists.
    ///
    /// The destination grid is replaced by an updated copy and re-meshed, as
    /// are neighbours sharing a face the writes touched.
    fn apply_late_overrides(&mut self) {
        for destination in self.structure_buffer.pending_regions() {
            let Some(current) = self.world.get().get_chunk_at(destination) else {
                continue;
            };
            let overrides = self.structure_buffer.take_all(destination);
            if overrides.is_empty() {
                continue;
            }

            let mut updated = Chunk::clone(&current);
            apply_overrides(&mut updated, &overrides);
            let touched = boundary_sides(&overrides, updated.dimensions());
            if !self
                .world
                .get_mut()
                .set_chunk_at(destination, Arc::new(updated))
            {
                continue;
            }
            debug!(
                "Applied {} late writes to region {:?}",
                overrides.len(),
                destination
            );

            self.schedule_build(destination);
            for side in BlockSide::all() {
                if touched & side.mask() == 0 {
                    continue;
                }
                let neighbour = destination + side.offset();
                if self
                    .world
                    .get()
                    .get_region_at(neighbour)
                    .is_some_and(|entry| entry.is_grid_ready())
                {
                    self.schedule_build(neighbour);
                }
            }
        }
    }

    /// Starts a mesh build for `position`, superseding any build in progress.
    ///
    /// The previous mesh stays published until the new build completes.
    fn schedule_build(&mut self, position: Point3<i32>) {
        let (chunk, boundaries, cancel) = {
            let world = self.world.get();
            let Some(entry) = world.get_region_at(position) else {
                return;
            };
            let Some(chunk) = entry.chunk.clone() else {
                return;
            };
            (
                chunk,
                BoundaryPlanes::capture(&world, position),
                entry.cancel.clone(),
            )
        };

        let mut builder = MeshBuilder::new(
            chunk,
            boundaries,
            cancel,
            self.config.streaming.cells_per_advance,
        );
        builder.begin();
        let missing = builder.missing_neighbours();

        if let Some(entry) = self.world.get_mut().get_region_at_mut(position) {
            entry.state = RegionState::Meshing;
            entry.built_without = missing;
        }

        self.next_build_id += 1;
        let build_id = self.next_build_id;
        self.builders
            .retain(|active| active.builder.position() != position);
        self.builders.push_back(ActiveBuild { build_id, builder });
        trace!("Scheduled build {} for region {:?}", build_id, position);
    }

    /// Advances every in-flight build by one slice and publishes the finished ones.
    ///
    /// # Returns
    /// `true` if any build was advanced.
    pub(crate) fn advance_builds(&mut self) -> bool {
        if self.builders.is_empty() {
            return false;
        }

        let builders = std::mem::take(&mut self.builders);
        for mut active in builders {
            match active.builder.advance() {
                Ok(BuildProgress::InProgress) => self.builders.push_back(active),
                Ok(BuildProgress::Complete) => self.finish_build(active),
                Err(MeshError::Cancelled(position)) => {
                    trace!("Build {} for region {:?} cancelled", active.build_id, position);
                }
                Err(error) => warn!("Dropping build {}: {}", active.build_id, error),
            }
        }
        true
    }

    fn finish_build(&mut self, active: ActiveBuild) {
        let ActiveBuild { build_id, builder } = active;
        let position = builder.position();
        let Some(mesh) = builder.into_mesh() else {
            return;
        };

        let published = match self.world.get_mut().get_region_at_mut(position) {
            Some(entry) if !entry.cancel.is_cancelled() => {
                entry.mesh = Some(Arc::new(mesh));
                entry.build_id = build_id;
                entry.state = RegionState::Ready;
                true
            }
            _ => false,
        };

        if published {
            debug!("Region {:?} meshed (build {})", position, build_id);
            // The consumer may already be gone during shutdown.
            let _ = self.events.send(StreamEvent::MeshReady { position, build_id });
        }
    }

    /// Forgets the builds of an evicted region and tells the consumer.
    fn region_evicted(&mut self, position: Point3<i32>) {
        self.builders
            .retain(|active| active.builder.position() != position);
        trace!("Region {:?} evicted", position);
        let _ = self.events.send(StreamEvent::Evicted(position));
    }
}

/// Owns the streaming thread's scheduling state and the generation pool.
pub struct StreamingWorker {
    state: StreamingState,
    task_manager: TaskManager<StreamingState>,
    observer: Arc<dyn ObserverPosition>,
    stop: Arc<AtomicBool>,
    world_ready: Arc<AtomicBool>,
    desired: Vec<Point3<i32>>,
    last_target: Option<(Point2<i32>, i32)>,
}

impl StreamingWorker {
    pub fn new(
        state: StreamingState,
        task_manager: TaskManager<StreamingState>,
        observer: Arc<dyn ObserverPosition>,
        stop: Arc<AtomicBool>,
        world_ready: Arc<AtomicBool>,
    ) -> Self {
        StreamingWorker {
            state,
            task_manager,
            observer,
            stop,
            world_ready,
            desired: Vec::new(),
            last_target: None,
        }
    }

    /// Runs passes until the stop flag is raised, then joins the pool.
    ///
    /// # Errors
    /// [`StreamingError::WorkersDisconnected`] if every generation worker died.
    pub fn run(mut self) -> Result<(), StreamingError> {
        info!("Streaming loop started");
        let idle = Duration::from_millis(self.state.config.streaming.idle_sleep_ms);

        while !self.stop.load(Ordering::Acquire) {
            let mut busy = self.refresh_desired();
            busy |= self.enqueue_missing() > 0;
            busy |= self.task_manager.process_completed_tasks(&mut self.state) > 0;
            busy |= self.task_manager.process_queued_tasks() > 0;
            busy |= self.state.advance_builds();
            self.check_world_ready();

            if self.task_manager.is_disconnected() {
                error!("Every generation worker has exited; stopping the streaming loop");
                return Err(StreamingError::WorkersDisconnected);
            }
            if !busy {
                thread::sleep(idle);
            }
        }

        self.task_manager.shutdown();
        info!("Streaming loop stopped");
        Ok(())
    }

    /// Recomputes the desired set if the target changed and evicts regions outside it.
    fn refresh_desired(&mut self) -> bool {
        let column = self.observer.current_column();
        let streaming = &self.state.config.streaming;
        let radius = if self.world_ready.load(Ordering::Acquire) {
            streaming.active_radius
        } else {
            streaming.starting_radius
        };
        let regions_per_column = streaming.regions_per_column;
        let spill_reach = self.state.config.caves.max_region_distance.max(0) + 1;

        if self.last_target == Some((column, radius)) {
            return false;
        }
        self.last_target = Some((column, radius));
        self.desired = desired_regions(column, radius, regions_per_column);
        debug!(
            "Observer at column {:?}: {} regions within radius {}",
            column,
            self.desired.len(),
            radius
        );

        let keep: HashSet<Point3<i32>> = self.desired.iter().copied().collect();
        let evicted: Vec<Point3<i32>> = {
            let mut world = self.state.world.get_mut();
            let stale: Vec<Point3<i32>> = world
                .positions()
                .into_iter()
                .filter(|position| !keep.contains(position))
                .collect();
            for position in &stale {
                world.remove_region_at(*position);
            }
            stale
        };
        if !evicted.is_empty() {
            debug!("Evicting {} regions", evicted.len());
        }
        for position in evicted {
            self.state.region_evicted(position);
        }

        // No loaded region can write further than this, and producers that
        // come back regenerate their writes.
        let dropped = self.state.structure_buffer.retain_regions(|destination| {
            column_distance(destination, column) < radius + spill_reach
        });
        if dropped > 0 {
            debug!("Dropped buffered writes for {} distant regions", dropped);
        }
        true
    }

    /// Adds desired regions missing from the world and publishes their generation.
    fn enqueue_missing(&mut self) -> usize {
        let missing: Vec<Point3<i32>> = {
            let world = self.state.world.get();
            self.desired
                .iter()
                .copied()
                .filter(|position| !world.contains(*position))
                .collect()
        };
        if missing.is_empty() {
            return 0;
        }

        let mut tasks = Vec::with_capacity(missing.len());
        {
            let mut world = self.state.world.get_mut();
            for position in missing {
                if !world.add_region_at(position) {
                    continue;
                }
                if let Some(entry) = world.get_region_at(position) {
                    tasks.push(ChunkGenerationTask::new(
                        self.state.generator.clone(),
                        position,
                        entry.cancel.clone(),
                    ));
                }
            }
        }

        let count = tasks.len();
        debug!("Enqueued {} regions for generation", count);
        for task in tasks {
            trace!("Queueing generation of region {:?}", task.position());
            self.task_manager.publish_task(Box::new(task));
        }
        count
    }

    fn check_world_ready(&mut self) {
        if self.world_ready.load(Ordering::Acquire) || self.desired.is_empty() {
            return;
        }
        let complete = {
            let world = self.state.world.get();
            self.desired.iter().all(|position| {
                world
                    .get_region_at(*position)
                    .is_some_and(|entry| entry.mesh.is_some())
            })
        };
        if complete {
            info!(
                "World ready: {} regions meshed around the observer",
                self.desired.len()
            );
            self.world_ready.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use crate::engine_state::voxels::noise_field::NoiseField;
    use std::sync::mpsc::{channel, Receiver};

    fn small_config() -> WorldConfig {
        let mut config = WorldConfig::default();
        config.region = RegionDimensions { x: 4, y: 8, z: 4 };
        config.streaming.cells_per_advance = 32;
        config
    }

    fn state() -> (StreamingState, Receiver<StreamEvent>) {
        state_with(small_config())
    }

    fn state_with(config: WorldConfig) -> (StreamingState, Receiver<StreamEvent>) {
        let config = Arc::new(config);
        let noise = Arc::new(NoiseField::new(&config));
        let generator = Arc::new(ChunkGenerator::new(
            config.clone(),
            noise,
            StructureBuffer::new(),
        ));
        let world = MtResource::new(World::new(config.region));
        let (events, receiver) = channel();
        (StreamingState::new(config, world, generator, events), receiver)
    }

    fn stone(position: Point3<i32>, dimensions: RegionDimensions) -> Chunk {
        let mut chunk = Chunk::empty(position, dimensions);
        chunk.set_block_at(0, 0, 0, BlockType::STONE);
        chunk
    }

    fn add(state: &StreamingState, position: Point3<i32>) -> CancellationToken {
        let mut world = state.world.get_mut();
        world.add_region_at(position);
        world.get_region_at(position).unwrap().cancel.clone()
    }

    fn drain_builds(state: &mut StreamingState) {
        while state.advance_builds() {}
    }

    /// Generates `position` the way the generation pool does and hands the result back.
    fn generate(state: &mut StreamingState, position: Point3<i32>) {
        let cancel = add(state, position);
        let chunk = state.generator.generate_unmerged(position);
        state.region_generated(position, &cancel, Some(Ok(chunk)));
    }

    #[test]
    fn test_desired_regions_cover_the_square_nearest_first() {
        let regions = desired_regions(Point2::new(0, 0), 3, 2);
        assert_eq!(regions.len(), 5 * 5 * 2);
        assert_eq!(regions[0], Point3::new(0, 0, 0));
        assert_eq!(regions[1], Point3::new(0, 1, 0));
        assert!(regions.iter().all(|r| r.x.abs() < 3 && r.z.abs() < 3));

        let distances: Vec<i32> = regions.iter().map(|r| r.x * r.x + r.z * r.z).collect();
        assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_boundary_sides_mask() {
        let dimensions = RegionDimensions { x: 4, y: 8, z: 4 };
        let writes = [
            PendingOverride {
                offset: Point3::new(0, 3, 2),
                block_type: BlockType::WOOD,
            },
            PendingOverride {
                offset: Point3::new(2, 7, 3),
                block_type: BlockType::WOOD,
            },
        ];
        assert_eq!(
            boundary_sides(&writes, dimensions),
            BlockSide::LEFT.mask() | BlockSide::TOP.mask() | BlockSide::BACK.mask()
        );
    }

    #[test]
    fn test_generated_region_is_meshed_and_announced() {
        let (mut state, events) = state();
        let position = Point3::new(0, 0, 0);
        let cancel = add(&state, position);
        let chunk = stone(position, state.world.get().dimensions());

        state.region_generated(position, &cancel, Some(Ok(chunk)));
        assert_eq!(state.active_builds(), 1);
        drain_builds(&mut state);

        let world = state.world.get();
        let entry = world.get_region_at(position).unwrap();
        assert_eq!(entry.state, RegionState::Ready);
        assert_eq!(entry.mesh.as_ref().unwrap().face_count(), 6);
        assert_eq!(entry.built_without, 0b11_1111);
        assert!(matches!(
            events.try_recv(),
            Ok(StreamEvent::MeshReady { position: p, build_id }) if p == position && build_id == entry.build_id
        ));
    }

    #[test]
    fn test_evicted_result_is_discarded() {
        let (mut state, events) = state();
        let position = Point3::new(1, 0, 0);
        let cancel = add(&state, position);
        state.world.get_mut().remove_region_at(position);

        let chunk = stone(position, state.world.get().dimensions());
        state.region_generated(position, &cancel, Some(Ok(chunk)));

        assert_eq!(state.active_builds(), 0);
        assert!(!state.world.get().contains(position));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_failed_generation_drops_the_entry() {
        let (mut state, _events) = state();
        let position = Point3::new(0, 0, 2);
        let cancel = add(&state, position);

        let failure = GenerationError::Panicked {
            region: position,
            reason: "boom".to_string(),
        };
        state.region_generated(position, &cancel, Some(Err(failure)));

        assert!(!state.world.get().contains(position));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_discarded_generation_keeps_buffered_writes() {
        let (mut state, _events) = state();
        let position = Point3::new(1, 0, 0);
        let write = PendingOverride {
            offset: Point3::new(1, 7, 1),
            block_type: BlockType::WOOD,
        };
        state.structure_buffer.append(position, [write]);

        // Evicted while the pool was generating it.
        let cancel = add(&state, position);
        let chunk = state.generator.generate_unmerged(position);
        state.world.get_mut().remove_region_at(position);
        state.region_generated(position, &cancel, Some(Ok(chunk)));
        assert_eq!(state.structure_buffer.peek(position), vec![write]);

        // Failed generation.
        let cancel = add(&state, position);
        let failure = GenerationError::Panicked {
            region: position,
            reason: "boom".to_string(),
        };
        state.region_generated(position, &cancel, Some(Err(failure)));
        assert_eq!(state.structure_buffer.peek(position), vec![write]);

        generate(&mut state, position);
        assert_eq!(
            state.world.get().get_block_at(Point3::new(5, 7, 1)),
            BlockType::WOOD
        );
        assert_eq!(state.structure_buffer.pending_count(position), 0);
    }

    #[test]
    fn test_late_writes_apply_when_producer_is_discarded() {
        let (mut state, _events) = state();
        let dimensions = state.world.get().dimensions();
        let target = Point3::new(0, 0, 0);
        let cancel = add(&state, target);
        state.region_generated(target, &cancel, Some(Ok(Chunk::empty(target, dimensions))));
        drain_builds(&mut state);

        // The producer spilled into the target, then was evicted.
        let producer = Point3::new(1, 0, 0);
        let cancel = add(&state, producer);
        state.structure_buffer.append(
            target,
            [PendingOverride {
                offset: Point3::new(3, 2, 1),
                block_type: BlockType::WOOD,
            }],
        );
        state.world.get_mut().remove_region_at(producer);
        state.region_generated(producer, &cancel, None);

        assert_eq!(
            state.world.get().get_block_at(Point3::new(3, 2, 1)),
            BlockType::WOOD
        );
        assert!(state.structure_buffer.is_empty());
    }

    #[test]
    fn test_grids_do_not_depend_on_generation_order() {
        let mut config = small_config();
        // Narrower than a carved sphere, so every worm reaches both x neighbours.
        config.region = RegionDimensions { x: 2, y: 256, z: 2 };
        config.structures.spawn_chance = 1.0;
        config.caves.min_worms = 2;
        config.caves.max_worms = 2;
        config.caves.radius = 3;
        config.caves.max_region_distance = 1;

        let a = Point3::new(0, 0, 0);
        let b = Point3::new(1, 0, 0);

        let (mut forward, _events) = state_with(config.clone());
        generate(&mut forward, a);
        assert!(!forward.structure_buffer.peek(b).is_empty());
        assert!(forward
            .structure_buffer
            .peek(b)
            .iter()
            .any(|write| write.block_type == BlockType::AIR));
        generate(&mut forward, b);

        let (mut backward, _events) = state_with(config);
        generate(&mut backward, b);
        generate(&mut backward, a);

        let forward_world = forward.world.get();
        let backward_world = backward.world.get();
        for position in [a, b] {
            let first = forward_world.get_chunk_at(position).unwrap();
            let second = backward_world.get_chunk_at(position).unwrap();
            let dims = first.dimensions();
            for z in 0..dims.z {
                for y in 0..dims.y {
                    for x in 0..dims.x {
                        assert_eq!(
                            first.block_type_at(x, y, z),
                            second.block_type_at(x, y, z),
                            "region {:?} cell {:?}",
                            position,
                            (x, y, z)
                        );
                    }
                }
            }
        }
        assert_eq!(forward.structure_buffer.pending_count(a), 0);
        assert_eq!(backward.structure_buffer.pending_count(b), 0);
    }

    #[test]
    fn test_new_neighbour_triggers_rebuild() {
        let (mut state, events) = state();
        let dimensions = state.world.get().dimensions();
        let left = Point3::new(0, 0, 0);
        let right = Point3::new(1, 0, 0);

        let mut wall = Chunk::empty(left, dimensions);
        wall.set_block_at(3, 0, 0, BlockType::STONE);
        let cancel = add(&state, left);
        state.region_generated(left, &cancel, Some(Ok(wall)));
        drain_builds(&mut state);
        let first = state.world.get().get_region_at(left).unwrap().build_id;

        let mut neighbour = Chunk::empty(right, dimensions);
        neighbour.set_block_at(0, 0, 0, BlockType::STONE);
        let cancel = add(&state, right);
        state.region_generated(right, &cancel, Some(Ok(neighbour)));
        assert_eq!(state.active_builds(), 2);
        drain_builds(&mut state);

        let world = state.world.get();
        let entry = world.get_region_at(left).unwrap();
        assert!(entry.build_id > first);
        assert_eq!(entry.built_without & BlockSide::RIGHT.mask(), 0);
        assert_eq!(entry.mesh.as_ref().unwrap().face_count(), 5);
        assert_eq!(events.try_iter().count(), 3);
    }

    #[test]
    fn test_late_writes_update_loaded_grid() {
        let (mut state, _events) = state();
        let dimensions = state.world.get().dimensions();
        let target = Point3::new(0, 0, 0);
        let cancel = add(&state, target);
        state.region_generated(target, &cancel, Some(Ok(Chunk::empty(target, dimensions))));
        drain_builds(&mut state);

        state.structure_buffer.append(
            target,
            [PendingOverride {
                offset: Point3::new(1, 1, 1),
                block_type: BlockType::WOOD,
            }],
        );
        let other = Point3::new(5, 0, 5);
        let cancel = add(&state, other);
        state.region_generated(other, &cancel, Some(Ok(Chunk::empty(other, dimensions))));
        drain_builds(&mut state);

        let world = state.world.get();
        assert_eq!(world.get_block_at(Point3::new(1, 1, 1)), BlockType::WOOD);
        assert_eq!(
            world.get_region_at(target).unwrap().mesh.as_ref().unwrap().face_count(),
            6
        );
        assert!(state.structure_buffer.is_empty());
    }

    #[test]
    fn test_eviction_cancels_build() {
        let (mut state, events) = state();
        let position = Point3::new(0, 0, 0);
        let cancel = add(&state, position);
        let chunk = stone(position, state.world.get().dimensions());
        state.region_generated(position, &cancel, Some(Ok(chunk)));

        state.world.get_mut().remove_region_at(position);
        state.region_evicted(position);

        assert_eq!(state.active_builds(), 0);
        assert!(matches!(events.try_recv(), Ok(StreamEvent::Evicted(p)) if p == position));
    }
}
