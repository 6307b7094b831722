//! # Block Module
//!
//! This module provides the core block-related functionality for the voxel engine.
//! It includes block type definitions, block face handling, and the compact
//! per-cell storage value.

use block_side::BlockSide;
use block_type::BlockType;

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block types in memory.
pub type BlockTypeSize = u8;

/// Maps a block type to its atlas texture index for each face.
///
/// The array is indexed by `BlockSide` in the order
/// [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT].
pub fn texture_indices(block_type: BlockType) -> [u32; 6] {
    match block_type {
        BlockType::AIR => [0; 6],
        BlockType::GRASS => [2, 2, 1, 3, 2, 2],
        BlockType::DIRT => [1; 6],
        BlockType::STONE => [4; 6],
        BlockType::WOOD => [0; 6],
    }
}

/// Represents a single voxel cell in a chunk.
///
/// # Memory Layout
/// The `#[repr(C)]` attribute and the `Pod` derive let a whole chunk be viewed
/// as raw bytes; the block type is stored as a compact `BlockTypeSize`.
#[repr(C)]
#[derive(Copy, Clone, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable, Debug)]
pub struct Block {
    /// The type of this block, encoded as a `BlockTypeSize` for compact storage.
    pub block_type: BlockTypeSize,
}

impl Block {
    /// An air cell.
    pub const AIR: Block = Block { block_type: 0 };

    /// Creates a new block of the specified type.
    pub fn new(block_type: BlockType) -> Self {
        Block {
            block_type: block_type as BlockTypeSize,
        }
    }

    /// Decodes the stored block type.
    pub fn block_type(self) -> BlockType {
        BlockType::from_int(self.block_type)
    }

    /// Gets the atlas texture index of one face of this block.
    pub fn texture_index(self, side: BlockSide) -> u32 {
        texture_indices(self.block_type())[side as usize]
    }
}

impl From<BlockType> for Block {
    fn from(block_type: BlockType) -> Self {
        Block::new(block_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_block_is_air() {
        let block: Block = bytemuck::Zeroable::zeroed();
        assert_eq!(block, Block::AIR);
        assert_eq!(block.block_type(), BlockType::AIR);
    }

    #[test]
    fn test_grass_top_differs_from_sides() {
        let grass = Block::new(BlockType::GRASS);
        assert_ne!(
            grass.texture_index(BlockSide::TOP),
            grass.texture_index(BlockSide::LEFT)
        );
        assert_eq!(
            grass.texture_index(BlockSide::BOTTOM),
            Block::new(BlockType::DIRT).texture_index(BlockSide::BOTTOM)
        );
    }
}
