//! # World Module
//!
//! This module provides the `World` struct: the region store. It maps region
//! coordinates to the lifecycle state, grid and published geometry of every
//! region the streamer currently tracks.
//!
//! ## Architecture
//!
//! The world uses a sparse storage approach: only regions around the observer
//! are present. Grids and meshes are held behind `Arc`s, so readers can keep a
//! snapshot while the streamer replaces either one.
//!
//! ## Region Lifecycle
//!
//! ```text
//! Queued ──grid──► GridReady ──build──► Meshing ──done──► Ready
//!                                          ▲                │
//!                                          └────re-mesh─────┘
//! ```
//!
//! Removing an entry cancels its token, which stops any queued or in-flight
//! work for that coordinate.

use std::collections::HashMap;
use std::sync::Arc;

use cgmath::Point3;

use crate::config::RegionDimensions;
use crate::core::CancellationToken;
use crate::engine_state::meshing::mesh::Mesh;
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::chunk::{split_world_position, Chunk};

/// Where a region is in its lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegionState {
    /// Waiting for or undergoing grid generation.
    Queued,
    /// The grid exists; no mesh build has started.
    GridReady,
    /// A mesh build is in progress. A previous mesh may still be published.
    Meshing,
    /// The latest mesh build finished.
    Ready,
}

/// Everything the store knows about one region.
#[derive(Debug)]
pub struct RegionEntry {
    pub state: RegionState,
    /// The voxel grid, once generated.
    pub chunk: Option<Arc<Chunk>>,
    /// The most recently completed mesh.
    pub mesh: Option<Arc<Mesh>>,
    /// Identifier of the build that produced `mesh`.
    pub build_id: u64,
    /// Cancels work scheduled for this region.
    pub cancel: CancellationToken,
    /// Face mask of the neighbours that had no grid when the current build began.
    pub built_without: u8,
}

impl RegionEntry {
    fn queued() -> Self {
        RegionEntry {
            state: RegionState::Queued,
            chunk: None,
            mesh: None,
            build_id: 0,
            cancel: CancellationToken::new(),
            built_without: 0,
        }
    }

    /// Whether the grid is available to neighbours.
    pub fn is_grid_ready(&self) -> bool {
        self.chunk.is_some()
    }
}

/// The set of regions tracked around the observer.
///
/// # Examples
///
/// ```
/// use cgmath::Point3;
/// use voxel_terrain::config::RegionDimensions;
/// use voxel_terrain::engine_state::voxels::world::{RegionState, World};
///
/// let mut world = World::new(RegionDimensions::default());
/// assert!(world.add_region_at(Point3::new(0, 0, 0)));
/// assert!(!world.add_region_at(Point3::new(0, 0, 0)));
/// assert_eq!(world.get_region_at(Point3::new(0, 0, 0)).unwrap().state, RegionState::Queued);
/// ```
pub struct World {
    dimensions: RegionDimensions,
    regions: HashMap<Point3<i32>, RegionEntry>,
}

impl World {
    /// Creates a new, empty world.
    pub fn new(dimensions: RegionDimensions) -> Self {
        World {
            dimensions,
            regions: HashMap::new(),
        }
    }

    pub fn dimensions(&self) -> RegionDimensions {
        self.dimensions
    }

    /// Starts tracking a region in the `Queued` state.
    ///
    /// # Returns
    /// `false` if the region is already tracked; it is left untouched.
    pub fn add_region_at(&mut self, position: Point3<i32>) -> bool {
        if self.regions.contains_key(&position) {
            return false;
        }
        self.regions.insert(position, RegionEntry::queued());
        true
    }

    pub fn contains(&self, position: Point3<i32>) -> bool {
        self.regions.contains_key(&position)
    }

    pub fn get_region_at(&self, position: Point3<i32>) -> Option<&RegionEntry> {
        self.regions.get(&position)
    }

    pub fn get_region_at_mut(&mut self, position: Point3<i32>) -> Option<&mut RegionEntry> {
        self.regions.get_mut(&position)
    }

    /// The grid of a region, if it has one.
    pub fn get_chunk_at(&self, position: Point3<i32>) -> Option<Arc<Chunk>> {
        self.regions
            .get(&position)
            .and_then(|entry| entry.chunk.clone())
    }

    /// Stores a grid. Regions still `Queued` move to `GridReady`.
    ///
    /// # Returns
    /// `false` if the region is no longer tracked.
    pub fn set_chunk_at(&mut self, position: Point3<i32>, chunk: Arc<Chunk>) -> bool {
        match self.regions.get_mut(&position) {
            Some(entry) => {
                entry.chunk = Some(chunk);
                if entry.state == RegionState::Queued {
                    entry.state = RegionState::GridReady;
                }
                true
            }
            None => false,
        }
    }

    /// Stops tracking a region and cancels its outstanding work.
    pub fn remove_region_at(&mut self, position: Point3<i32>) -> Option<RegionEntry> {
        let entry = self.regions.remove(&position)?;
        entry.cancel.cancel();
        Some(entry)
    }

    /// Coordinates of every tracked region.
    pub fn positions(&self) -> Vec<Point3<i32>> {
        self.regions.keys().copied().collect()
    }

    /// Number of tracked regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Reads a world cell.
    ///
    /// # Returns
    /// The block type, or `AIR` when the region holding the cell has no grid.
    pub fn get_block_at(&self, world: Point3<i32>) -> BlockType {
        let (region, local) = split_world_position(world, self.dimensions);
        self.regions
            .get(&region)
            .and_then(|entry| entry.chunk.as_ref())
            .map(|chunk| chunk.block_type_at(local.x, local.y, local.z))
            .unwrap_or(BlockType::AIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> RegionDimensions {
        RegionDimensions { x: 4, y: 4, z: 4 }
    }

    #[test]
    fn test_grid_moves_region_to_grid_ready() {
        let mut world = World::new(dims());
        let position = Point3::new(1, 0, 1);
        world.add_region_at(position);

        assert!(world.set_chunk_at(position, Arc::new(Chunk::empty(position, dims()))));
        let entry = world.get_region_at(position).unwrap();
        assert_eq!(entry.state, RegionState::GridReady);
        assert!(entry.is_grid_ready());
    }

    #[test]
    fn test_untracked_region_rejects_grid() {
        let mut world = World::new(dims());
        let position = Point3::new(0, 0, 0);
        assert!(!world.set_chunk_at(position, Arc::new(Chunk::empty(position, dims()))));
        assert!(world.is_empty());
    }

    #[test]
    fn test_remove_cancels_token() {
        let mut world = World::new(dims());
        let position = Point3::new(0, 0, 0);
        world.add_region_at(position);
        let token = world.get_region_at(position).unwrap().cancel.clone();

        world.remove_region_at(position);
        assert!(token.is_cancelled());
        assert!(!world.contains(position));
    }

    #[test]
    fn test_block_lookup_crosses_regions() {
        let mut world = World::new(dims());
        let position = Point3::new(-1, 0, 0);
        let mut chunk = Chunk::empty(position, dims());
        chunk.set_block_at(3, 2, 1, BlockType::WOOD);
        world.add_region_at(position);
        world.set_chunk_at(position, Arc::new(chunk));

        assert_eq!(world.get_block_at(Point3::new(-1, 2, 1)), BlockType::WOOD);
        assert_eq!(world.get_block_at(Point3::new(0, 2, 1)), BlockType::AIR);
        assert_eq!(world.get_block_at(Point3::new(-1, 2, 2)), BlockType::AIR);
    }
}
