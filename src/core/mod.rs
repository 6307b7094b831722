//! # Core Module
//!
//! Concurrency primitives shared across the engine.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking
//! - `CancellationToken`: Cooperative cancellation flag shared between a region and its work
//!
//! ## Usage
//! ```rust
//! use voxel_terrain::core::{CancellationToken, MtResource};
//!
//! let counter = MtResource::new(0);
//! *counter.get_mut() += 1;
//! assert_eq!(*counter.get(), 1);
//!
//! let token = CancellationToken::new();
//! let observer = token.clone();
//! token.cancel();
//! assert!(observer.is_cancelled());
//! ```

pub mod mt_resource;

pub use mt_resource::MtResource;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A cloneable flag used to ask in-flight work to stop.
///
/// Cancellation is one-way: once set it stays set for every clone.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether both tokens are clones of the same flag.
    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}
