//! Neighbour solidity captured for one mesh build.

use cgmath::Point3;

use crate::engine_state::voxels::block::block_side::BlockSide;
use crate::engine_state::voxels::chunk::boundary::{layer_coordinates, BoundaryLayer};
use crate::engine_state::voxels::world::World;

/// The facing boundary layer of each of a region's six neighbours.
///
/// A missing layer means the neighbour had no grid when the build began;
/// faces toward it are treated as exposed.
#[derive(Clone, Debug, Default)]
pub struct BoundaryPlanes {
    layers: [Option<BoundaryLayer>; 6],
}

impl BoundaryPlanes {
    /// Planes with no neighbour known on any side.
    pub fn none() -> Self {
        Self::default()
    }

    /// Copies the facing layers of every grid-ready neighbour of `position`.
    pub fn capture(world: &World, position: Point3<i32>) -> Self {
        let mut planes = Self::none();
        for side in BlockSide::all() {
            if let Some(chunk) = world.get_chunk_at(position + side.offset()) {
                planes.set(side, chunk.boundary_layer(side.opposite()));
            }
        }
        planes
    }

    /// Records the layer of the neighbour on `side`.
    pub fn set(&mut self, side: BlockSide, layer: BoundaryLayer) {
        self.layers[side as usize] = Some(layer);
    }

    pub fn get(&self, side: BlockSide) -> Option<&BoundaryLayer> {
        self.layers[side as usize].as_ref()
    }

    /// Whether the cell across the boundary on `side` of local cell `(cx, cy, cz)` is solid.
    ///
    /// # Returns
    /// `None` when no layer was captured for that side.
    pub fn neighbour_solid(&self, side: BlockSide, cx: usize, cy: usize, cz: usize) -> Option<bool> {
        let (u, v) = layer_coordinates(side, cx, cy, cz);
        self.get(side).map(|layer| layer.is_solid(u, v))
    }

    /// Face mask of the sides with no captured layer.
    pub fn missing_mask(&self) -> u8 {
        BlockSide::all()
            .into_iter()
            .filter(|side| self.get(*side).is_none())
            .fold(0, |mask, side| mask | side.mask())
    }
}
