//! # Error Types
//!
//! All errors that can occur while configuring, generating, meshing and
//! streaming the voxel world.

use cgmath::Point3;
use thiserror::Error;

/// Errors raised while loading or validating a [`crate::config::WorldConfig`].
///
/// Any of these is fatal at startup: no generation work is started with an
/// invalid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A region dimension was zero.
    #[error("region dimensions must be non-zero, got {x}x{y}x{z}")]
    ZeroRegionDimension {
        /// Width in voxels.
        x: usize,
        /// Height in voxels.
        y: usize,
        /// Depth in voxels.
        z: usize,
    },

    /// A streaming radius was below one region.
    #[error("{name} must be at least 1, got {value}")]
    RadiusTooSmall {
        /// Which radius was rejected.
        name: &'static str,
        /// The configured value.
        value: i32,
    },

    /// The eagerly generated area would be smaller than the streamed one.
    #[error("starting radius {starting} is smaller than active radius {active}")]
    StartingRadiusTooSmall {
        /// Configured starting radius.
        starting: i32,
        /// Configured active radius.
        active: i32,
    },

    /// The cave worm count range is empty.
    #[error("minimum cave worms {min} exceeds maximum {max}")]
    InvalidWormRange {
        /// Lower bound.
        min: u32,
        /// Upper bound.
        max: u32,
    },

    /// A scalar setting was outside its valid range.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue {
        /// The setting name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration document was malformed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while filling a region's voxel grid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// A pending override addressed a cell outside the destination region.
    #[error("override at local offset {offset:?} lies outside region {region:?}")]
    OverrideOutOfBounds {
        /// Destination region.
        region: Point3<i32>,
        /// The rejected local offset.
        offset: Point3<usize>,
    },

    /// The generation task panicked on its worker thread.
    #[error("generation of region {region:?} panicked: {reason}")]
    Panicked {
        /// The region being generated.
        region: Point3<i32>,
        /// Panic payload, when it was a string.
        reason: String,
    },
}

/// Errors raised by an incremental [`crate::engine_state::meshing::MeshBuilder`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// The owning region was evicted while its geometry was being built.
    #[error("geometry build for region {0:?} was cancelled")]
    Cancelled(Point3<i32>),

    /// `advance()` was called before `begin()`.
    #[error("geometry build for region {0:?} advanced before it began")]
    NotStarted(Point3<i32>),
}

/// Errors surfaced by the [`crate::engine_state::streaming::Streamer`].
#[derive(Error, Debug)]
pub enum StreamingError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `init()` was called twice.
    #[error("streaming worker is already running")]
    AlreadyRunning,

    /// The background streaming thread could not be spawned.
    #[error("failed to spawn streaming worker: {0}")]
    Spawn(std::io::Error),

    /// The background streaming thread panicked.
    #[error("streaming worker panicked: {0}")]
    WorkerPanicked(String),

    /// The background streaming thread stopped without being asked to.
    #[error("streaming worker exited unexpectedly")]
    WorkerExited,

    /// Every generation worker has disconnected, so no region can be produced.
    #[error("all generation workers have disconnected")]
    WorkersDisconnected,
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
