//! # Block Type Module
//!
//! This module defines the different types of voxels in the world and their
//! conversion to and from the compact storage integer.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use super::BlockTypeSize;

/// Enumerates all possible block types in the voxel world.
///
/// `AIR` is the zero value and doubles as the universal "absent" sentinel: any
/// lookup that falls outside loaded data resolves to it. The `FromPrimitive`
/// derive allows conversion from the compact integer stored in a chunk.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// Empty space. Non-solid and never meshed.
    #[default]
    AIR = 0,

    /// The top cell of a terrain column.
    GRASS = 1,

    /// The few cells just below the surface.
    DIRT = 2,

    /// Everything deeper than the dirt layer.
    STONE = 3,

    /// Structure material.
    WOOD = 4,
}

impl BlockType {
    /// Converts a `BlockTypeSize` to a `BlockType`.
    ///
    /// Unknown values decode as `AIR`, matching the absent-is-air rule.
    pub fn from_int(btype: BlockTypeSize) -> Self {
        BlockType::from_u8(btype).unwrap_or_default()
    }

    /// Whether this block occludes its neighbours.
    pub fn is_solid(self) -> bool {
        self != BlockType::AIR
    }
}
