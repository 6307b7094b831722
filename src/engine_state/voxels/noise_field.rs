//! # Noise Field
//!
//! Deterministic multi-channel coherent noise used by terrain generation.
//!
//! ## Channels
//!
//! * **base** and **ridged**: two independently configured 2D channels folded
//!   into one height sample by a [`NoiseCombination`] policy
//! * **position**: 3D noise that places cave worm heads
//! * **direction**: 3D noise that steers cave worms
//! * **signature**: the 2D Perlin primitive behind the fixed terrain signature
//!
//! Every sample is a pure function of the world coordinate and the seed. The
//! field holds no mutable state, so it is shared freely between generation
//! workers and regions can be generated in any order.

use noise::{
    Billow, Fbm, MultiFractal, NoiseFn, OpenSimplex, Perlin, RidgedMulti, Seedable, SuperSimplex,
    Value,
};

use crate::config::{FractalType, NoiseChannelConfig, NoiseCombination, NoiseType, WorldConfig};

type Noise2 = Box<dyn NoiseFn<f64, 2> + Send + Sync>;
type Noise3 = Box<dyn NoiseFn<f64, 3> + Send + Sync>;

/// One configured 2D channel.
struct NoiseChannel {
    source: Noise2,
    /// Coordinate scale applied before sampling. Fractal sources carry their
    /// own frequency, so this is `1.0` for them.
    scale: f64,
    invert: bool,
}

impl NoiseChannel {
    fn new(config: &NoiseChannelConfig, seed: u32) -> Self {
        let source = match config.noise_type {
            NoiseType::OpenSimplex => fractal_source::<OpenSimplex>(config, seed),
            NoiseType::Perlin => fractal_source::<Perlin>(config, seed),
            NoiseType::Value => fractal_source::<Value>(config, seed),
            NoiseType::SuperSimplex => fractal_source::<SuperSimplex>(config, seed),
        };
        let scale = match config.fractal_type {
            FractalType::None => config.frequency,
            _ => 1.0,
        };

        NoiseChannel {
            source,
            scale,
            invert: config.invert,
        }
    }

    fn sample(&self, x: f64, z: f64) -> f64 {
        let value = self.source.get([x * self.scale, z * self.scale]);
        if self.invert {
            -value
        } else {
            value
        }
    }
}

fn fractal_source<T>(config: &NoiseChannelConfig, seed: u32) -> Noise2
where
    T: Default + Seedable + NoiseFn<f64, 2> + Send + Sync + 'static,
{
    match config.fractal_type {
        FractalType::None => Box::new(T::default().set_seed(seed)),
        FractalType::Fbm => Box::new(layered(Fbm::<T>::new(seed), config)),
        FractalType::Ridged => Box::new(layered(RidgedMulti::<T>::new(seed), config)),
        FractalType::Billow => Box::new(layered(Billow::<T>::new(seed), config)),
    }
}

fn layered<F: MultiFractal>(fractal: F, config: &NoiseChannelConfig) -> F {
    fractal
        .set_octaves(config.octaves)
        .set_frequency(config.frequency)
        .set_lacunarity(config.lacunarity)
        .set_persistence(config.persistence)
}

fn basis_3d(noise_type: NoiseType, seed: u32) -> Noise3 {
    match noise_type {
        NoiseType::OpenSimplex => Box::new(OpenSimplex::new(seed)),
        NoiseType::Perlin => Box::new(Perlin::new(seed)),
        NoiseType::Value => Box::new(Value::new(seed)),
        NoiseType::SuperSimplex => Box::new(SuperSimplex::new(seed)),
    }
}

/// Deterministic sampler for every noise-driven decision in generation.
pub struct NoiseField {
    seed: u32,
    base: NoiseChannel,
    ridged: NoiseChannel,
    combination: NoiseCombination,
    y_multiplier: f64,
    cutoff: f64,
    position: Noise3,
    position_frequency: f64,
    direction: Noise3,
    direction_frequency: f64,
    signature: Perlin,
}

impl NoiseField {
    /// Builds every channel from the world configuration.
    pub fn new(config: &WorldConfig) -> Self {
        let seed = config.seed;
        NoiseField {
            seed,
            base: NoiseChannel::new(&config.noise.base, seed),
            ridged: NoiseChannel::new(&config.noise.ridged, seed),
            combination: config.noise.combination,
            y_multiplier: config.noise.y_multiplier,
            cutoff: config.noise.cutoff,
            position: basis_3d(config.caves.position_noise_type, seed),
            position_frequency: config.caves.position_frequency,
            direction: basis_3d(config.caves.direction_noise_type, seed),
            direction_frequency: config.caves.direction_frequency,
            signature: Perlin::new(seed),
        }
    }

    /// The world seed every channel was built from.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Samples the base channel alone.
    pub fn sample_base(&self, x: f64, z: f64) -> f64 {
        self.base.sample(x, z)
    }

    /// Samples the ridged channel alone.
    pub fn sample_ridged(&self, x: f64, z: f64) -> f64 {
        self.ridged.sample(x, z)
    }

    /// Combines the base and ridged channels under the configured policy.
    pub fn sample_height(&self, x: f64, z: f64) -> f64 {
        match self.combination {
            NoiseCombination::Min => self.sample_base(x, z).min(self.sample_ridged(x, z)),
            NoiseCombination::Max => self.sample_base(x, z).max(self.sample_ridged(x, z)),
            NoiseCombination::Average => {
                (self.sample_base(x, z) + self.sample_ridged(x, z)) * 0.5
            }
            NoiseCombination::UseBaseOnly => self.sample_base(x, z),
            NoiseCombination::UseRidgedOnly => self.sample_ridged(x, z),
        }
    }

    /// Density at a world cell: the height sample minus the scaled elevation.
    pub fn density(&self, x: f64, y: f64, z: f64) -> f64 {
        self.sample_height(x, z) - y * self.y_multiplier
    }

    /// Whether the density at a world cell clears the cutoff.
    pub fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        self.density(x as f64, y as f64, z as f64) > self.cutoff
    }

    /// The highest world Y whose cell is solid under [`NoiseField::is_solid`].
    ///
    /// Density falls monotonically with Y, so the boundary is found in closed
    /// form. Columns that are air everywhere report a negative height.
    pub fn density_surface(&self, x: i32, z: i32) -> i32 {
        let height = self.sample_height(x as f64, z as f64);
        let limit = (height - self.cutoff) / self.y_multiplier;
        // Solid iff y < limit.
        (limit.ceil() as i32).saturating_sub(1)
    }

    /// Samples the terrain signature primitive, remapped to `[0, 1]`.
    pub fn signature_sample(&self, x: f64, z: f64) -> f64 {
        ((self.signature.get([x, z]) + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Samples the worm position channel, remapped to `[0, 1)`.
    pub fn position_sample(&self, x: f64, y: f64, z: f64) -> f64 {
        let f = self.position_frequency;
        let value = self.position.get([x * f, y * f, z * f]);
        ((value + 1.0) * 0.5).clamp(0.0, 1.0 - f64::EPSILON)
    }

    /// Samples the worm direction channel, in `[-1, 1]`.
    pub fn direction_sample(&self, x: f64, y: f64, z: f64) -> f64 {
        let f = self.direction_frequency;
        self.direction.get([x * f, y * f, z * f]).clamp(-1.0, 1.0)
    }

    /// A random generator seeded from the world seed, a purpose salt and a coordinate.
    ///
    /// The same inputs always yield the same sequence, so random rolls stay
    /// reproducible regardless of generation order or thread.
    pub fn seeded_rng(&self, salt: u64, coordinates: [i32; 3]) -> fastrand::Rng {
        let mut state = (self.seed as u64) ^ salt.rotate_left(32);
        for value in coordinates {
            state = split_mix(state ^ (value as u32 as u64));
        }
        fastrand::Rng::with_seed(state)
    }
}

fn split_mix(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(config: &WorldConfig) -> NoiseField {
        NoiseField::new(config)
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let config = WorldConfig {
            seed: 1234,
            ..WorldConfig::default()
        };
        let a = field(&config);
        let b = field(&config);

        for i in -20..20 {
            let (x, z) = (i as f64 * 37.5, i as f64 * -11.25);
            assert_eq!(a.sample_height(x, z), b.sample_height(x, z));
            assert_eq!(
                a.direction_sample(x, 3.0, z),
                b.direction_sample(x, 3.0, z)
            );
            assert_eq!(a.position_sample(x, 3.0, z), b.position_sample(x, 3.0, z));
        }
    }

    #[test]
    fn test_combination_policies() {
        let mut config = WorldConfig::default();
        let (x, z) = (311.0, -97.0);

        config.noise.combination = NoiseCombination::UseBaseOnly;
        let base = field(&config).sample_height(x, z);
        config.noise.combination = NoiseCombination::UseRidgedOnly;
        let ridged = field(&config).sample_height(x, z);

        config.noise.combination = NoiseCombination::Min;
        assert_eq!(field(&config).sample_height(x, z), base.min(ridged));
        config.noise.combination = NoiseCombination::Max;
        assert_eq!(field(&config).sample_height(x, z), base.max(ridged));
        config.noise.combination = NoiseCombination::Average;
        assert_eq!(field(&config).sample_height(x, z), (base + ridged) * 0.5);
    }

    #[test]
    fn test_invert_negates_channel() {
        let mut config = WorldConfig::default();
        config.noise.base.invert = false;
        let plain = field(&config).sample_base(40.0, 80.0);
        config.noise.base.invert = true;
        let inverted = field(&config).sample_base(40.0, 80.0);

        assert_eq!(plain, -inverted);
    }

    #[test]
    fn test_density_surface_matches_is_solid() {
        let config = WorldConfig {
            seed: 99,
            ..WorldConfig::default()
        };
        let noise = field(&config);

        for (x, z) in [(0, 0), (150, -40), (-999, 512)] {
            let surface = noise.density_surface(x, z);
            assert!(!noise.is_solid(x, surface + 1, z));
            if surface >= 0 {
                assert!(noise.is_solid(x, surface, z));
            }
        }
    }

    #[test]
    fn test_signature_sample_is_half_on_lattice_points() {
        let noise = field(&WorldConfig::default());
        assert_eq!(noise.signature_sample(3.0, -7.0), 0.5);
    }

    #[test]
    fn test_seeded_rng_depends_on_every_input() {
        let noise = field(&WorldConfig::default());
        let roll = |salt, coords| noise.seeded_rng(salt, coords).u64(..);

        assert_eq!(roll(1, [1, 2, 3]), roll(1, [1, 2, 3]));
        assert_ne!(roll(1, [1, 2, 3]), roll(2, [1, 2, 3]));
        assert_ne!(roll(1, [1, 2, 3]), roll(1, [1, 2, 4]));
        assert_ne!(roll(1, [1, 2, 3]), roll(1, [3, 2, 1]));
    }
}
