//! Incremental mesh generation for region grids.
//!
//! This module converts a region's voxel grid into renderable geometry: one
//! quad for every face of a solid cell that borders a non-solid cell.
//!
//! # Architecture
//! - [`MeshBuilder`]: Builds a [`Mesh`] in bounded slices so that no single
//!   call takes more than `cells_per_advance` cells of work
//! - [`BoundaryPlanes`]: Neighbour solidity copied when the build begins,
//!   used to cull faces on the region boundary
//! - [`Mesh`], [`Face`], [`Vertex`]: The produced geometry
//!
//! # Boundary Faces
//! A face on the region boundary is compared with the neighbour's facing
//! layer. If the neighbour had no grid when the build began the face is
//! emitted; the streamer rebuilds the region once that neighbour's grid
//! arrives, so the optimistic faces are eventually culled.
//!
//! # Usage
//! ```
//! use std::sync::Arc;
//! use cgmath::Point3;
//! use voxel_terrain::config::RegionDimensions;
//! use voxel_terrain::core::CancellationToken;
//! use voxel_terrain::engine_state::meshing::{BoundaryPlanes, BuildProgress, MeshBuilder};
//! use voxel_terrain::engine_state::voxels::block::block_type::BlockType;
//! use voxel_terrain::engine_state::voxels::chunk::Chunk;
//!
//! let mut chunk = Chunk::empty(Point3::new(0, 0, 0), RegionDimensions { x: 2, y: 2, z: 2 });
//! chunk.set_block_at(0, 0, 0, BlockType::STONE);
//!
//! let mut builder = MeshBuilder::new(
//!     Arc::new(chunk),
//!     BoundaryPlanes::none(),
//!     CancellationToken::new(),
//!     4,
//! );
//! builder.begin();
//! while builder.advance().unwrap() == BuildProgress::InProgress {}
//! assert_eq!(builder.into_mesh().unwrap().face_count(), 6);
//! ```

use std::sync::Arc;

use cgmath::Point3;

use crate::core::CancellationToken;
use crate::engine_state::voxels::block::block_side::BlockSide;
use crate::engine_state::voxels::chunk::chunk_iteration::ChunkBlockIterator;
use crate::engine_state::voxels::chunk::Chunk;
use crate::error::MeshError;

pub mod boundary;
pub mod face;
pub mod mesh;
pub mod vertex;

pub use boundary::BoundaryPlanes;
pub use face::Face;
pub use mesh::Mesh;
pub use vertex::Vertex;

/// What an `advance()` call left behind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuildProgress {
    /// Cells remain to be examined.
    InProgress,
    /// Every cell has been examined; the mesh is final.
    Complete,
}

/// Builds the geometry of one region in bounded slices.
///
/// The builder owns a shared snapshot of the grid and copies of the
/// neighbours' boundary layers, so it never reads another region's grid and
/// is unaffected by grids replaced while it runs.
pub struct MeshBuilder {
    chunk: Arc<Chunk>,
    boundaries: BoundaryPlanes,
    cancel: CancellationToken,
    cells_per_advance: usize,
    /// Next storage index to examine; `None` until `begin()`.
    cursor: Option<usize>,
    mesh: Mesh,
}

impl MeshBuilder {
    /// Creates a builder.
    ///
    /// # Arguments
    /// * `chunk` - The grid to mesh
    /// * `boundaries` - Neighbour layers captured for this build
    /// * `cancel` - The owning region's token
    /// * `cells_per_advance` - Cells examined per `advance()`; zero is treated as one
    pub fn new(
        chunk: Arc<Chunk>,
        boundaries: BoundaryPlanes,
        cancel: CancellationToken,
        cells_per_advance: usize,
    ) -> Self {
        MeshBuilder {
            chunk,
            boundaries,
            cancel,
            cells_per_advance: cells_per_advance.max(1),
            cursor: None,
            mesh: Mesh::default(),
        }
    }

    /// The region being meshed.
    pub fn position(&self) -> Point3<i32> {
        self.chunk.position
    }

    /// Face mask of the neighbours with no captured layer.
    pub fn missing_neighbours(&self) -> u8 {
        self.boundaries.missing_mask()
    }

    /// Starts (or restarts) the build from the first cell.
    pub fn begin(&mut self) {
        self.cursor = Some(0);
        self.mesh = Mesh::new(self.chunk.volume());
    }

    /// Whether the last `advance()` finished the build.
    pub fn is_complete(&self) -> bool {
        self.cursor
            .is_some_and(|cursor| cursor >= self.chunk.volume())
    }

    /// Examines the next `cells_per_advance` cells.
    ///
    /// # Errors
    /// - [`MeshError::Cancelled`] if the region's token was cancelled
    /// - [`MeshError::NotStarted`] if `begin()` was never called
    pub fn advance(&mut self) -> Result<BuildProgress, MeshError> {
        if self.cancel.is_cancelled() {
            return Err(MeshError::Cancelled(self.chunk.position));
        }
        let start = self
            .cursor
            .ok_or(MeshError::NotStarted(self.chunk.position))?;

        let end = start
            .saturating_add(self.cells_per_advance)
            .min(self.chunk.volume());
        let mut cells = ChunkBlockIterator::window(&self.chunk, start, end);
        while let Some((cell, block)) = cells.get_next_block() {
            for side in BlockSide::all() {
                if self.face_exposed(cell, side) {
                    let face = Face::new(cell.x, cell.y, cell.z, block, side);
                    self.mesh
                        .add_face(self.chunk.index(cell.x, cell.y, cell.z), &face);
                }
            }
        }
        self.cursor = Some(end);

        if end >= self.chunk.volume() {
            Ok(BuildProgress::Complete)
        } else {
            Ok(BuildProgress::InProgress)
        }
    }

    fn face_exposed(&self, cell: Point3<usize>, side: BlockSide) -> bool {
        match self.chunk.neighbour_of(cell, side) {
            Some(neighbour) => !self
                .chunk
                .is_block_solid(neighbour.x, neighbour.y, neighbour.z),
            None => !self
                .boundaries
                .neighbour_solid(side, cell.x, cell.y, cell.z)
                .unwrap_or(false),
        }
    }

    /// Takes the finished mesh.
    ///
    /// # Returns
    /// `None` if the build has not completed.
    pub fn into_mesh(self) -> Option<Mesh> {
        self.is_complete().then_some(self.mesh)
    }

    /// Runs a whole build in one call.
    ///
    /// # Errors
    /// [`MeshError::Cancelled`] if the token is cancelled before the build finishes.
    pub fn build(mut self) -> Result<Mesh, MeshError> {
        self.begin();
        while self.advance()? == BuildProgress::InProgress {}
        Ok(self.mesh)
    }
}
