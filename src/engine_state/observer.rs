//! # Observer Position
//!
//! The streamer never owns the observer. It reads the observer's current
//! region column through [`ObserverPosition`] once per streaming pass.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use cgmath::{Point2, Point3};

use crate::config::RegionDimensions;
use crate::engine_state::voxels::chunk::split_world_position;

/// Yields the region column the observer currently stands in.
pub trait ObserverPosition: Send + Sync {
    /// The observer's column as `(region x, region z)`.
    fn current_column(&self) -> Point2<i32>;
}

/// An observer position that can be moved from any thread.
///
/// # Examples
/// ```
/// use cgmath::{Point2, Point3};
/// use voxel_terrain::config::RegionDimensions;
/// use voxel_terrain::engine_state::observer::{ObserverPosition, SharedObserver};
///
/// let observer = SharedObserver::new(Point2::new(0, 0));
/// observer.set_world_position(Point3::new(-1, 70, 33), RegionDimensions::default());
/// assert_eq!(observer.current_column(), Point2::new(-1, 2));
/// ```
#[derive(Clone, Debug)]
pub struct SharedObserver {
    column: Arc<(AtomicI32, AtomicI32)>,
}

impl SharedObserver {
    pub fn new(column: Point2<i32>) -> Self {
        SharedObserver {
            column: Arc::new((AtomicI32::new(column.x), AtomicI32::new(column.y))),
        }
    }

    /// Moves the observer to a region column.
    pub fn set_column(&self, column: Point2<i32>) {
        self.column.0.store(column.x, Ordering::Release);
        self.column.1.store(column.y, Ordering::Release);
    }

    /// Moves the observer to the column holding a world cell.
    pub fn set_world_position(&self, world: Point3<i32>, dimensions: RegionDimensions) {
        let (region, _) = split_world_position(world, dimensions);
        self.set_column(Point2::new(region.x, region.z));
    }
}

impl ObserverPosition for SharedObserver {
    fn current_column(&self) -> Point2<i32> {
        Point2::new(
            self.column.0.load(Ordering::Acquire),
            self.column.1.load(Ordering::Acquire),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_see_moves() {
        let observer = SharedObserver::new(Point2::new(3, -4));
        let reader: Arc<dyn ObserverPosition> = Arc::new(observer.clone());
        assert_eq!(reader.current_column(), Point2::new(3, -4));

        observer.set_column(Point2::new(5, 6));
        assert_eq!(reader.current_column(), Point2::new(5, 6));
    }
}
