//! Background tasks operating on region grids.

pub mod chunk_generation_task;

pub use chunk_generation_task::ChunkGenerationTask;
