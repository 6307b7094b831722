//! # Chunk Module
//!
//! This module provides the `Chunk` struct: the voxel grid of one region of the
//! world, addressed by its integer region coordinate. It also carries the
//! conversions between world cells, region coordinates and local offsets.
//!
//! ## Storage
//!
//! Chunks keep two parallel, densely indexed arrays:
//! - `solid_array`: A bit vector (1 bit per cell) indicating which cells are solid
//! - `blocks`: One compact `Block` per cell
//!
//! Both are laid out x-fastest, then y, then z. Generation rewrites cells in
//! place (structures, cave carving, pending overrides), so every cell needs a
//! constant-time slot. The bit vector keeps the hot path of meshing, the
//! solidity test, to one bit read and lets iteration skip air in whole words.
//!
//! ### Performance Characteristics
//! - **Solidity Check**: O(1)
//! - **Block Lookup**: O(1)
//! - **Skipping Air**: word-at-a-time scan of `solid_array`

use bitvec::prelude::BitVec;
use cgmath::{Point3, Vector3};

use crate::config::RegionDimensions;
use crate::error::GenerationError;

use super::block::block_side::BlockSide;
use super::block::block_type::BlockType;
use super::block::Block;
use super::structure_buffer::PendingOverride;

pub mod boundary;
pub mod caves;
pub mod chunk_creation;
pub mod chunk_iteration;
pub mod structures;

use boundary::{layer_width, BoundaryLayer};

/// Splits a world cell into the coordinate of the region holding it and the
/// cell's offset inside that region.
///
/// # Arguments
/// * `world` - A world-space cell
/// * `dimensions` - The region dimensions
///
/// # Returns
/// `(region, local)`, where `region * dimensions + local == world`.
pub fn split_world_position(
    world: Point3<i32>,
    dimensions: RegionDimensions,
) -> (Point3<i32>, Point3<usize>) {
    let (dx, dy, dz) = (
        dimensions.x as i32,
        dimensions.y as i32,
        dimensions.z as i32,
    );
    let region = Point3::new(
        world.x.div_euclid(dx),
        world.y.div_euclid(dy),
        world.z.div_euclid(dz),
    );
    let local = Point3::new(
        world.x.rem_euclid(dx) as usize,
        world.y.rem_euclid(dy) as usize,
        world.z.rem_euclid(dz) as usize,
    );
    (region, local)
}

/// The world-space cell at local offset zero of a region.
pub fn region_origin(region: Point3<i32>, dimensions: RegionDimensions) -> Point3<i32> {
    Point3::new(
        region.x * dimensions.x as i32,
        region.y * dimensions.y as i32,
        region.z * dimensions.z as i32,
    )
}

/// The voxel grid of a single region.
///
/// Chunks are the fundamental unit of world data. Once a chunk is handed to
/// the region store it is shared immutably behind an `Arc`; later edits go
/// through a clone.
#[derive(Clone, Debug)]
pub struct Chunk {
    /// The position of this chunk in region coordinates (not block coordinates).
    pub position: Point3<i32>,

    /// Size of the grid.
    dimensions: RegionDimensions,

    /// A bit vector where each bit represents whether the corresponding cell is solid (1) or air (0).
    solid_array: BitVec,

    /// The block stored in every cell, air included.
    blocks: Vec<Block>,
}

impl Chunk {
    /// Creates a new, completely empty chunk (all cells are air).
    ///
    /// # Arguments
    /// * `position` - The region coordinates of the new chunk
    /// * `dimensions` - The grid size
    pub fn empty(position: Point3<i32>, dimensions: RegionDimensions) -> Self {
        let volume = dimensions.volume();
        Chunk {
            position,
            dimensions,
            solid_array: BitVec::repeat(false, volume),
            blocks: vec![Block::AIR; volume],
        }
    }

    /// Assembles a chunk from already consistent storage.
    pub(crate) fn from_parts(
        position: Point3<i32>,
        dimensions: RegionDimensions,
        solid_array: BitVec,
        blocks: Vec<Block>,
    ) -> Self {
        debug_assert_eq!(solid_array.len(), dimensions.volume());
        debug_assert_eq!(blocks.len(), dimensions.volume());
        Chunk {
            position,
            dimensions,
            solid_array,
            blocks,
        }
    }

    /// The grid size.
    pub fn dimensions(&self) -> RegionDimensions {
        self.dimensions
    }

    /// The world-space cell at local offset zero.
    pub fn origin(&self) -> Point3<i32> {
        region_origin(self.position, self.dimensions)
    }

    /// The number of cells in the grid.
    pub fn volume(&self) -> usize {
        self.blocks.len()
    }

    /// The number of solid cells.
    pub fn solid_count(&self) -> usize {
        self.solid_array.count_ones()
    }

    /// The storage index of a local offset.
    ///
    /// # Panics
    /// Debug builds panic if the offset is out of bounds.
    pub fn index(&self, cx: usize, cy: usize, cz: usize) -> usize {
        debug_assert!(self.contains(cx, cy, cz));
        cx + self.dimensions.x * (cy + self.dimensions.y * cz)
    }

    /// The local offset stored at a storage index.
    pub fn position_of_index(&self, index: usize) -> Point3<usize> {
        let x = index % self.dimensions.x;
        let rest = index / self.dimensions.x;
        Point3::new(x, rest % self.dimensions.y, rest / self.dimensions.y)
    }

    /// Whether a local offset lies inside the grid.
    pub fn contains(&self, cx: usize, cy: usize, cz: usize) -> bool {
        cx < self.dimensions.x && cy < self.dimensions.y && cz < self.dimensions.z
    }

    /// Converts a world cell to a local offset if the cell belongs to this chunk.
    pub fn local_position(&self, world: Point3<i32>) -> Option<Point3<usize>> {
        let (region, local) = split_world_position(world, self.dimensions);
        (region == self.position).then_some(local)
    }

    /// Steps from a local offset to its neighbour on `side`.
    ///
    /// # Returns
    /// `None` when the neighbour lies in another region.
    pub fn neighbour_of(&self, cell: Point3<usize>, side: BlockSide) -> Option<Point3<usize>> {
        let step: Vector3<i32> = side.offset();
        let x = cell.x as i64 + step.x as i64;
        let y = cell.y as i64 + step.y as i64;
        let z = cell.z as i64 + step.z as i64;
        if x < 0 || y < 0 || z < 0 {
            return None;
        }
        let (x, y, z) = (x as usize, y as usize, z as usize);
        self.contains(x, y, z).then(|| Point3::new(x, y, z))
    }

    /// Gets the block at the specified chunk-relative coordinates.
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    pub fn get_block_at(&self, cx: usize, cy: usize, cz: usize) -> Block {
        self.blocks[self.index(cx, cy, cz)]
    }

    /// Gets the block stored at a storage index.
    pub fn block_at_index(&self, index: usize) -> Block {
        self.blocks[index]
    }

    /// Gets the type of the block at the specified chunk-relative coordinates.
    pub fn block_type_at(&self, cx: usize, cy: usize, cz: usize) -> BlockType {
        self.get_block_at(cx, cy, cz).block_type()
    }

    /// Writes a cell, keeping `solid_array` in step with `blocks`.
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    pub fn set_block_at(&mut self, cx: usize, cy: usize, cz: usize, block_type: BlockType) {
        let index = self.index(cx, cy, cz);
        self.blocks[index] = Block::new(block_type);
        self.solid_array.set(index, block_type.is_solid());
    }

    /// Checks if the block at the specified chunk-relative coordinates is solid.
    ///
    /// # Returns
    /// `true` if the block is solid, `false` if it's air.
    pub fn is_block_solid(&self, cx: usize, cy: usize, cz: usize) -> bool {
        self.solid_array[self.index(cx, cy, cz)]
    }

    /// The solidity bits of every cell, in storage order.
    pub fn solid_array(&self) -> &BitVec {
        &self.solid_array
    }

    /// Reads a world cell.
    ///
    /// # Returns
    /// The cell's type, or `AIR` if the cell belongs to another region.
    pub fn block_at_world(&self, world: Point3<i32>) -> BlockType {
        self.local_position(world)
            .map(|local| self.block_type_at(local.x, local.y, local.z))
            .unwrap_or(BlockType::AIR)
    }

    /// Applies one buffered cross-region write.
    ///
    /// # Errors
    /// Returns [`GenerationError::OverrideOutOfBounds`] if the offset does not
    /// address a cell of this chunk.
    pub fn apply_override(&mut self, pending: &PendingOverride) -> Result<(), GenerationError> {
        let offset = pending.offset;
        if !self.contains(offset.x, offset.y, offset.z) {
            return Err(GenerationError::OverrideOutOfBounds {
                region: self.position,
                offset,
            });
        }
        self.set_block_at(offset.x, offset.y, offset.z, pending.block_type);
        Ok(())
    }

    /// Copies the solidity of the outermost layer of cells on one side.
    ///
    /// A neighbour meshing against this chunk reads the layer on the side
    /// facing it, so it never has to touch this chunk's grid.
    pub fn boundary_layer(&self, side: BlockSide) -> BoundaryLayer {
        let width = layer_width(side, self.dimensions);
        let height = layer_height(side, self.dimensions);
        let mut solid = BitVec::repeat(false, width * height);

        for v in 0..height {
            for u in 0..width {
                let cell = cell_on_layer(side, u, v, self.dimensions);
                if self.is_block_solid(cell.x, cell.y, cell.z) {
                    solid.set(u + width * v, true);
                }
            }
        }

        BoundaryLayer::new(side, width, solid)
    }
}

/// Inverse of [`boundary::layer_coordinates`] for the outermost layer on `side`.
fn cell_on_layer(side: BlockSide, u: usize, v: usize, dimensions: RegionDimensions) -> Point3<usize> {
    match side {
        BlockSide::LEFT => Point3::new(0, v, u),
        BlockSide::RIGHT => Point3::new(dimensions.x - 1, v, u),
        BlockSide::BOTTOM => Point3::new(u, 0, v),
        BlockSide::TOP => Point3::new(u, dimensions.y - 1, v),
        BlockSide::FRONT => Point3::new(u, v, 0),
        BlockSide::BACK => Point3::new(u, v, dimensions.z - 1),
    }
}

fn layer_height(side: BlockSide, dimensions: RegionDimensions) -> usize {
    match side {
        BlockSide::LEFT | BlockSide::RIGHT | BlockSide::FRONT | BlockSide::BACK => dimensions.y,
        BlockSide::BOTTOM | BlockSide::TOP => dimensions.z,
    }
}
