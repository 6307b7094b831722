//! # Engine State Module
//!
//! The terrain pipeline: everything between a seed and published region meshes.
//!
//! ## Key Components
//!
//! * `voxels` - Voxel data, noise, region grids and their generation
//! * `meshing` - Incremental exterior-face meshing of region grids
//! * `task_management` - The worker pool that generates grids
//! * `streaming` - Keeps the regions around the observer loaded and meshed
//! * `observer` - How the streamer learns where the observer is
//!
//! ## Architecture
//!
//! Each subsystem depends only on the ones listed before it, with `streaming`
//! tying them together. Configuration is passed in explicitly; nothing here
//! reads global state.

pub mod meshing;
pub mod observer;
pub mod streaming;
pub mod task_management;
pub mod voxels;
