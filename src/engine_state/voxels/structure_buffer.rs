//! # Structure Buffer
//!
//! Cross-region writes that could not be applied where they were produced.
//!
//! Generating one region may write cells belonging to another: a platform
//! overhanging the edge, a cave tunnel crossing the boundary. Those writes are
//! parked here, keyed by the destination region, until that region's grid
//! exists. Within one destination the writes keep the order they were appended
//! in, so applying them replays the producers' intent with last-write-wins.
//!
//! The buffer is a cloneable handle; every clone sees the same storage.

use std::collections::HashMap;

use cgmath::Point3;

use crate::core::MtResource;
use crate::engine_state::voxels::block::block_type::BlockType;

/// A write to one cell of a region that did not produce it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PendingOverride {
    /// Offset of the cell inside the destination region.
    pub offset: Point3<usize>,
    /// The block to write.
    pub block_type: BlockType,
}

/// Thread-safe multimap from region coordinate to pending writes.
#[derive(Clone, Default)]
pub struct StructureBuffer {
    pending: MtResource<HashMap<Point3<i32>, Vec<PendingOverride>>>,
}

impl StructureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends writes for `destination`, after any already buffered for it.
    pub fn append<I>(&self, destination: Point3<i32>, overrides: I)
    where
        I: IntoIterator<Item = PendingOverride>,
    {
        let mut pending = self.pending.get_mut();
        let entry = pending.entry(destination).or_default();
        let before = entry.len();
        entry.extend(overrides);
        if entry.is_empty() {
            pending.remove(&destination);
        } else {
            log::trace!(
                "Buffered {} overrides for region {:?}",
                entry.len() - before,
                destination
            );
        }
    }

    /// Removes and returns every write buffered for `destination`.
    ///
    /// # Returns
    /// The writes in the order they were appended, or an empty vector.
    pub fn take_all(&self, destination: Point3<i32>) -> Vec<PendingOverride> {
        self.pending
            .get_mut()
            .remove(&destination)
            .unwrap_or_default()
    }

    /// Copies the writes buffered for `destination` without removing them.
    pub fn peek(&self, destination: Point3<i32>) -> Vec<PendingOverride> {
        self.pending
            .get()
            .get(&destination)
            .cloned()
            .unwrap_or_default()
    }

    /// Every region that has at least one buffered write.
    pub fn pending_regions(&self) -> Vec<Point3<i32>> {
        self.pending.get().keys().copied().collect()
    }

    /// Number of writes buffered for `destination`.
    pub fn pending_count(&self, destination: Point3<i32>) -> usize {
        self.pending.get().get(&destination).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.get().is_empty()
    }

    /// Drops every destination for which `keep` returns `false`.
    ///
    /// # Returns
    /// The number of destinations dropped.
    pub fn retain_regions<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(Point3<i32>) -> bool,
    {
        let mut pending = self.pending.get_mut();
        let before = pending.len();
        pending.retain(|destination, _| keep(*destination));
        before - pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(x: usize, block_type: BlockType) -> PendingOverride {
        PendingOverride {
            offset: Point3::new(x, 0, 0),
            block_type,
        }
    }

    #[test]
    fn test_append_merges_in_order() {
        let buffer = StructureBuffer::new();
        let region = Point3::new(1, 0, -1);

        buffer.append(region, [write(0, BlockType::WOOD)]);
        buffer.append(region, [write(0, BlockType::AIR), write(1, BlockType::WOOD)]);

        assert_eq!(
            buffer.take_all(region),
            vec![
                write(0, BlockType::WOOD),
                write(0, BlockType::AIR),
                write(1, BlockType::WOOD)
            ]
        );
    }

    #[test]
    fn test_take_all_drains_exactly_once() {
        let buffer = StructureBuffer::new();
        let region = Point3::new(0, 0, 0);
        buffer.append(region, [write(2, BlockType::STONE)]);

        assert_eq!(buffer.take_all(region).len(), 1);
        assert!(buffer.take_all(region).is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clones_share_storage() {
        let buffer = StructureBuffer::new();
        let producer = buffer.clone();
        producer.append(Point3::new(5, 0, 5), [write(1, BlockType::WOOD)]);

        assert_eq!(buffer.pending_regions(), vec![Point3::new(5, 0, 5)]);
        assert_eq!(buffer.peek(Point3::new(5, 0, 5)).len(), 1);
        assert_eq!(buffer.pending_count(Point3::new(5, 0, 5)), 1);
    }

    #[test]
    fn test_retain_regions_drops_rejected_destinations() {
        let buffer = StructureBuffer::new();
        buffer.append(Point3::new(0, 0, 0), [write(0, BlockType::WOOD)]);
        buffer.append(Point3::new(9, 0, 0), [write(0, BlockType::WOOD)]);

        assert_eq!(buffer.retain_regions(|region| region.x < 5), 1);
        assert_eq!(buffer.pending_regions(), vec![Point3::new(0, 0, 0)]);
    }

    #[test]
    fn test_concurrent_appends_and_takes_lose_nothing() {
        use std::collections::HashSet;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;

        const PRODUCERS: usize = 4;
        const BATCHES: usize = 250;
        let buffer = StructureBuffer::new();
        let destinations = [Point3::new(0, 0, 0), Point3::new(1, 0, 0), Point3::new(0, 0, -1)];
        let done = AtomicBool::new(false);

        let mut drained: Vec<Vec<PendingOverride>> = thread::scope(|scope| {
            let taker = scope.spawn(|| {
                let mut drained = Vec::new();
                while !done.load(Ordering::Acquire) {
                    for destination in destinations {
                        let writes = buffer.take_all(destination);
                        if !writes.is_empty() {
                            drained.push(writes);
                        }
                    }
                }
                drained
            });

            let producers: Vec<_> = (0..PRODUCERS)
                .map(|producer| {
                    let buffer = buffer.clone();
                    scope.spawn(move || {
                        for batch in 0..BATCHES {
                            let pair = [2 * batch, 2 * batch + 1].map(|y| PendingOverride {
                                offset: Point3::new(producer, y, 0),
                                block_type: BlockType::WOOD,
                            });
                            buffer.append(destinations[batch % destinations.len()], pair);
                        }
                    })
                })
                .collect();
            for producer in producers {
                producer.join().unwrap();
            }
            done.store(true, Ordering::Release);
            taker.join().unwrap()
        });
        for destination in destinations {
            drained.push(buffer.take_all(destination));
        }

        let mut seen = HashSet::new();
        for writes in &drained {
            // Each append lands as one contiguous run.
            for (index, write) in writes.iter().enumerate() {
                if write.offset.y % 2 == 0 {
                    assert_eq!(writes[index + 1].offset, write.offset + cgmath::Vector3::new(0, 1, 0));
                }
                assert!(seen.insert(write.offset), "{:?} drained twice", write.offset);
            }
        }
        assert_eq!(seen.len(), PRODUCERS * BATCHES * 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_empty_append_leaves_no_entry() {
        let buffer = StructureBuffer::new();
        buffer.append(Point3::new(0, 0, 0), Vec::new());
        assert!(buffer.is_empty());
    }
}
