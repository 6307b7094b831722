//! # Voxel Terrain Core
//!
//! This module contains the voxel data model and the procedural generation
//! pipeline that fills it.
//!
//! ## Architecture
//!
//! The voxel system is organized into several key components:
//!
//! * **Block**: Voxel types and the six cell sides
//! * **NoiseField**: Seeded, deterministic noise sampling
//! * **Chunk**: A region's voxel grid, and the generator that fills it with
//!   terrain, structures and caves
//! * **StructureBuffer**: Writes that crossed into regions not generated yet
//! * **World**: The region store shared between the streaming loop and the consumer
//! * **Tasks**: Grid generation on the worker pool
//!
//! ## Data Flow
//!
//! 1. The streaming loop adds a region to the world and publishes a generation task
//! 2. The generator fills the grid, pushing writes for neighbours into the buffer
//!    and applying the writes buffered for this region last
//! 3. The grid is stored in the world and handed to a mesh build
//!
//! ## Thread Safety
//!
//! * Grids are immutable once stored and shared through `Arc`
//! * The world is only reached through an `MtResource`
//! * The structure buffer appends and drains atomically

pub mod block;
pub mod chunk;
pub mod noise_field;
pub mod structure_buffer;
pub mod tasks;
pub mod world;
