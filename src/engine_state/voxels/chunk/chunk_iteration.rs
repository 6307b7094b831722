//! # Chunk Iteration Module
//!
//! This module provides an iterator for traversing the solid cells of a chunk.
//!
//! ## Resumable Iteration
//!
//! The `ChunkBlockIterator` walks a window of storage indices, so a long
//! traversal can be split into bounded slices: iterate `[0, n)`, remember `n`,
//! later iterate `[n, 2n)`, and so on. Air is skipped by scanning the
//! `solid_array` bit vector for the next set bit.

use cgmath::Point3;

use crate::engine_state::voxels::block::Block;

use super::Chunk;

/// An iterator over the solid cells of a chunk within a storage index window.
pub struct ChunkBlockIterator<'a> {
    /// Reference to the chunk being iterated over
    chunk_ref: &'a Chunk,
    /// Next storage index to examine
    current_solid_offset: usize,
    /// First storage index past the window
    end: usize,
}

impl<'a> ChunkBlockIterator<'a> {
    /// Creates an iterator over every solid cell of the chunk.
    pub fn new(chunk_ref: &'a Chunk) -> Self {
        Self::window(chunk_ref, 0, chunk_ref.volume())
    }

    /// Creates an iterator over the solid cells with storage index in `[start, end)`.
    ///
    /// The window is clamped to the chunk.
    pub fn window(chunk_ref: &'a Chunk, start: usize, end: usize) -> Self {
        let end = end.min(chunk_ref.volume());
        ChunkBlockIterator {
            chunk_ref,
            current_solid_offset: start.min(end),
            end,
        }
    }

    /// The storage index the iterator will examine next.
    pub fn offset(&self) -> usize {
        self.current_solid_offset
    }

    /// Gets the next solid cell in the window along with its position.
    ///
    /// # Returns
    /// - `Some((position, block))` if another solid cell is found
    /// - `None` once the window is exhausted
    pub fn get_next_block(&mut self) -> Option<(Point3<usize>, Block)> {
        let remaining = &self.chunk_ref.solid_array()[self.current_solid_offset..self.end];
        match remaining.first_one() {
            Some(skip) => {
                let index = self.current_solid_offset + skip;
                self.current_solid_offset = index + 1;
                Some((
                    self.chunk_ref.position_of_index(index),
                    self.chunk_ref.block_at_index(index),
                ))
            }
            None => {
                self.current_solid_offset = self.end;
                None
            }
        }
    }
}

impl Iterator for ChunkBlockIterator<'_> {
    type Item = (Point3<usize>, Block);

    fn next(&mut self) -> Option<Self::Item> {
        self.get_next_block()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegionDimensions;
    use crate::engine_state::voxels::block::block_type::BlockType;

    fn sample_chunk() -> Chunk {
        let mut chunk = Chunk::empty(Point3::new(0, 0, 0), RegionDimensions { x: 4, y: 4, z: 4 });
        chunk.set_block_at(0, 0, 0, BlockType::STONE);
        chunk.set_block_at(3, 1, 0, BlockType::DIRT);
        chunk.set_block_at(2, 3, 3, BlockType::GRASS);
        chunk
    }

    #[test]
    fn test_visits_solid_cells_in_storage_order() {
        let chunk = sample_chunk();
        let visited: Vec<_> = ChunkBlockIterator::new(&chunk)
            .map(|(position, block)| (position, block.block_type()))
            .collect();

        assert_eq!(
            visited,
            vec![
                (Point3::new(0, 0, 0), BlockType::STONE),
                (Point3::new(3, 1, 0), BlockType::DIRT),
                (Point3::new(2, 3, 3), BlockType::GRASS),
            ]
        );
    }

    #[test]
    fn test_windows_partition_the_chunk() {
        let chunk = sample_chunk();
        let mut total = 0;
        let mut start = 0;
        while start < chunk.volume() {
            let mut iterator = ChunkBlockIterator::window(&chunk, start, start + 5);
            total += iterator.by_ref().count();
            assert_eq!(iterator.offset(), (start + 5).min(chunk.volume()));
            start += 5;
        }
        assert_eq!(total, 3);
    }
}
