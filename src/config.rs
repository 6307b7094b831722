//! # World Configuration
//!
//! The immutable value set every component is constructed from. It is built
//! once at startup (in code, or from a JSON document), validated, and then
//! shared by reference. Nothing reads configuration from global state.
//!
//! ## Loading
//!
//! ```no_run
//! use voxel_terrain::config::WorldConfig;
//!
//! let config = WorldConfig::from_json_str(r#"{ "seed": 42 }"#).unwrap();
//! assert_eq!(config.seed, 42);
//! ```
//!
//! Every field has a default, so a document only needs to name what it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Dimensions of a region in voxels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionDimensions {
    /// Width along the X axis.
    pub x: usize,
    /// Height along the Y axis.
    pub y: usize,
    /// Depth along the Z axis.
    pub z: usize,
}

impl Default for RegionDimensions {
    fn default() -> Self {
        RegionDimensions { x: 16, y: 256, z: 16 }
    }
}

impl RegionDimensions {
    /// Number of cells in a region of these dimensions.
    pub fn volume(&self) -> usize {
        self.x * self.y * self.z
    }
}

/// Basis noise algorithm for a noise channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseType {
    /// OpenSimplex gradient noise.
    OpenSimplex,
    /// Classic Perlin gradient noise.
    Perlin,
    /// Value noise (interpolated lattice values).
    Value,
    /// SuperSimplex gradient noise.
    SuperSimplex,
}

/// How octaves of a channel are layered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FractalType {
    /// A single octave scaled by the channel frequency.
    None,
    /// Fractal Brownian motion.
    Fbm,
    /// Ridged multifractal.
    Ridged,
    /// Billowy (absolute value) fractal.
    Billow,
}

/// How the base and ridged channels are folded into one height sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseCombination {
    /// The lower of the two samples.
    Min,
    /// The higher of the two samples.
    Max,
    /// The mean of the two samples.
    Average,
    /// Only the base channel.
    UseBaseOnly,
    /// Only the ridged channel.
    UseRidgedOnly,
}

/// Parameters of one coherent-noise channel.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseChannelConfig {
    /// Basis noise algorithm.
    pub noise_type: NoiseType,
    /// Octave layering.
    pub fractal_type: FractalType,
    /// Frequency of the first octave.
    pub frequency: f64,
    /// Number of octaves (ignored for [`FractalType::None`]).
    pub octaves: usize,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves (gain).
    pub persistence: f64,
    /// Negate the sampled value.
    pub invert: bool,
}

impl Default for NoiseChannelConfig {
    fn default() -> Self {
        NoiseChannelConfig {
            noise_type: NoiseType::OpenSimplex,
            fractal_type: FractalType::Fbm,
            frequency: 0.0015,
            octaves: 4,
            lacunarity: 3.0,
            persistence: 0.8,
            invert: true,
        }
    }
}

impl NoiseChannelConfig {
    /// Default settings for the ridged channel.
    pub fn ridged() -> Self {
        NoiseChannelConfig {
            noise_type: NoiseType::OpenSimplex,
            fractal_type: FractalType::Ridged,
            frequency: 0.002,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            invert: true,
        }
    }
}

/// Settings for the two height channels and the density threshold.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// The base channel.
    pub base: NoiseChannelConfig,
    /// The ridged channel.
    pub ridged: NoiseChannelConfig,
    /// Combination policy.
    pub combination: NoiseCombination,
    /// Vertical scale applied to the world Y coordinate.
    pub y_multiplier: f64,
    /// Density above which a cell is solid.
    pub cutoff: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig {
            base: NoiseChannelConfig::default(),
            ridged: NoiseChannelConfig::ridged(),
            combination: NoiseCombination::Average,
            y_multiplier: 0.008,
            cutoff: 0.5,
        }
    }
}

/// Which rule decides the surface height of a column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceMode {
    /// The fixed multi-octave terrain signature.
    Signature,
    /// The highest cell whose combined-channel density exceeds the cutoff.
    Density,
}

/// Column fill settings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Surface height rule.
    pub surface_mode: SurfaceMode,
    /// Cells below the surface down to (exclusive) `surface - dirt_depth` are dirt.
    pub dirt_depth: i32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        TerrainConfig {
            surface_mode: SurfaceMode::Signature,
            dirt_depth: 3,
        }
    }
}

/// Cave worm settings.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaveConfig {
    /// Noise used to place worm heads.
    pub position_noise_type: NoiseType,
    /// Frequency of the position noise.
    pub position_frequency: f64,
    /// Noise used to steer worms.
    pub direction_noise_type: NoiseType,
    /// Frequency of the direction noise.
    pub direction_frequency: f64,
    /// Fewest worms started per region.
    pub min_worms: u32,
    /// Most worms started per region.
    pub max_worms: u32,
    /// How many regions away from its origin a worm may wander.
    pub max_region_distance: i32,
    /// Maximum number of steps per worm.
    pub max_steps: u32,
    /// Radius of the carved tunnel, in voxels.
    pub radius: i32,
}

impl Default for CaveConfig {
    fn default() -> Self {
        CaveConfig {
            position_noise_type: NoiseType::Value,
            position_frequency: 1.0,
            direction_noise_type: NoiseType::Perlin,
            direction_frequency: 0.1,
            min_worms: 0,
            max_worms: 2,
            max_region_distance: 3,
            max_steps: 50,
            radius: 3,
        }
    }
}

/// Structure placement settings.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Probability that a column spawns a structure.
    pub spawn_chance: f64,
    /// How far above the local surface a structure's deck sits.
    pub height_offset: i32,
}

impl Default for StructureConfig {
    fn default() -> Self {
        StructureConfig {
            spawn_chance: 1.0 / 487.0,
            height_offset: 7,
        }
    }
}

/// Streaming and scheduling settings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Radius in regions kept loaded around the observer's column.
    pub active_radius: i32,
    /// Radius in regions generated before the world is reported ready.
    pub starting_radius: i32,
    /// Number of vertically stacked regions per column.
    pub regions_per_column: i32,
    /// Number of grid generation worker threads.
    pub worker_threads: usize,
    /// Cells examined per `MeshBuilder::advance()` call.
    pub cells_per_advance: usize,
    /// Sleep of the streaming loop when it has nothing to do, in milliseconds.
    pub idle_sleep_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        StreamingConfig {
            active_radius: 9,
            starting_radius: 11,
            regions_per_column: 1,
            worker_threads: 2,
            cells_per_advance: 4096,
            idle_sleep_ms: 2,
        }
    }
}

/// The complete configuration of a world.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Seed shared by every noise channel and random roll.
    pub seed: u32,
    /// Region dimensions.
    pub region: RegionDimensions,
    /// Column fill.
    pub terrain: TerrainConfig,
    /// Height channels.
    pub noise: NoiseConfig,
    /// Cave worms.
    pub caves: CaveConfig,
    /// Structures.
    pub structures: StructureConfig,
    /// Streaming.
    pub streaming: StreamingConfig,
}

impl WorldConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed JSON and any validation error
    /// reported by [`WorldConfig::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`WorldConfig::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks every setting that would make generation or streaming meaningless.
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let RegionDimensions { x, y, z } = self.region;
        if x == 0 || y == 0 || z == 0 {
            return Err(ConfigError::ZeroRegionDimension { x, y, z });
        }

        let streaming = &self.streaming;
        for (name, value) in [
            ("active radius", streaming.active_radius),
            ("starting radius", streaming.starting_radius),
            ("regions per column", streaming.regions_per_column),
        ] {
            if value < 1 {
                return Err(ConfigError::RadiusTooSmall { name, value });
            }
        }
        if streaming.starting_radius < streaming.active_radius {
            return Err(ConfigError::StartingRadiusTooSmall {
                starting: streaming.starting_radius,
                active: streaming.active_radius,
            });
        }
        if streaming.worker_threads == 0 {
            return Err(invalid("worker threads", "at least one worker is required"));
        }
        if streaming.cells_per_advance == 0 {
            return Err(invalid("cells per advance", "must be non-zero"));
        }

        for (name, channel) in [("base channel", &self.noise.base), ("ridged channel", &self.noise.ridged)] {
            check_frequency(name, channel.frequency)?;
            if channel.fractal_type != FractalType::None && channel.octaves == 0 {
                return Err(invalid(name, "fractal channels need at least one octave"));
            }
            if !channel.lacunarity.is_finite() || !channel.persistence.is_finite() {
                return Err(invalid(name, "lacunarity and persistence must be finite"));
            }
        }
        if !self.noise.y_multiplier.is_finite() || self.noise.y_multiplier <= 0.0 {
            return Err(invalid("y multiplier", "must be finite and positive"));
        }
        if !self.noise.cutoff.is_finite() {
            return Err(invalid("cutoff", "must be finite"));
        }
        if self.terrain.dirt_depth < 1 {
            return Err(invalid("dirt depth", "must be at least 1"));
        }

        let caves = &self.caves;
        check_frequency("cave position frequency", caves.position_frequency)?;
        check_frequency("cave direction frequency", caves.direction_frequency)?;
        if caves.min_worms > caves.max_worms {
            return Err(ConfigError::InvalidWormRange {
                min: caves.min_worms,
                max: caves.max_worms,
            });
        }
        if caves.radius < 0 {
            return Err(invalid("cave radius", "must not be negative"));
        }
        if caves.max_region_distance < 0 {
            return Err(invalid("cave region distance", "must not be negative"));
        }

        if !(0.0..=1.0).contains(&self.structures.spawn_chance) {
            return Err(invalid("structure spawn chance", "must lie in [0, 1]"));
        }

        Ok(())
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        reason: reason.to_string(),
    }
}

fn check_frequency(name: &'static str, frequency: f64) -> Result<(), ConfigError> {
    if frequency.is_finite() && frequency > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, "frequency must be finite and positive"))
    }
}
