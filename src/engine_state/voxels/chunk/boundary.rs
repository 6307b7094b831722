//! # Boundary Layers
//!
//! A boundary layer is a copy of the solidity of one outer face of a chunk.
//! Meshing a region consults its neighbours' facing layers to cull faces on
//! the shared plane without reading the neighbours' grids.

use bitvec::prelude::BitVec;

use crate::config::RegionDimensions;
use crate::engine_state::voxels::block::block_side::BlockSide;

/// Projects a local cell onto the 2D plane perpendicular to `side`'s axis.
///
/// Cells on opposite faces of two adjacent regions that touch each other
/// project to the same `(u, v)`.
pub fn layer_coordinates(side: BlockSide, cx: usize, cy: usize, cz: usize) -> (usize, usize) {
    match side {
        BlockSide::LEFT | BlockSide::RIGHT => (cz, cy),
        BlockSide::BOTTOM | BlockSide::TOP => (cx, cz),
        BlockSide::FRONT | BlockSide::BACK => (cx, cy),
    }
}

/// Width (`u` extent) of the layer on `side`.
pub fn layer_width(side: BlockSide, dimensions: RegionDimensions) -> usize {
    match side {
        BlockSide::LEFT | BlockSide::RIGHT => dimensions.z,
        BlockSide::BOTTOM | BlockSide::TOP | BlockSide::FRONT | BlockSide::BACK => dimensions.x,
    }
}

/// Solidity of the outermost cells of one chunk face.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundaryLayer {
    side: BlockSide,
    width: usize,
    solid: BitVec,
}

impl BoundaryLayer {
    pub(crate) fn new(side: BlockSide, width: usize, solid: BitVec) -> Self {
        BoundaryLayer { side, width, solid }
    }

    /// The chunk face this layer was copied from.
    pub fn side(&self) -> BlockSide {
        self.side
    }

    /// Whether the cell at plane position `(u, v)` is solid.
    ///
    /// Positions outside the layer read as air.
    pub fn is_solid(&self, u: usize, v: usize) -> bool {
        if u >= self.width {
            return false;
        }
        self.solid
            .get(u + self.width * v)
            .map(|bit| *bit)
            .unwrap_or(false)
    }

    pub fn solid_count(&self) -> usize {
        self.solid.count_ones()
    }
}
