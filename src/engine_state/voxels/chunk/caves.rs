//! # Caves
//!
//! Cave worms: agents that start inside a region, wander under the steering of
//! the direction noise and carve a sphere of air at every step.
//!
//! A worm's whole path is a pure function of the seed and its starting region,
//! so the tunnel it digs through a neighbouring region is the same no matter
//! which of the two regions is generated first. Carving outside the starting
//! region goes through the `RegionWriter` and ends up in the structure buffer.

use std::f64::consts::{FRAC_PI_4, FRAC_PI_8, TAU};

use cgmath::{InnerSpace, Point3, Vector3};

use crate::config::{CaveConfig, RegionDimensions};
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::noise_field::NoiseField;

use super::chunk_creation::RegionWriter;
use super::{region_origin, split_world_position};

/// Salt separating worm counts from other seeded randomness.
pub const CAVE_SALT: u64 = 0x4341_5645;

/// Lowest world Y a worm may carve.
pub const CAVE_FLOOR: i32 = 1;

/// Steepest climb or dive of a worm, in radians.
pub const MAX_PITCH: f64 = FRAC_PI_4;

/// Sample offset that decorrelates the pitch channel from the yaw channel.
const PITCH_SAMPLE_OFFSET: f64 = 1031.5;

/// A tunnel-carving agent.
#[derive(Clone, Debug, PartialEq)]
pub struct CaveWorm {
    /// The region the worm started in.
    pub origin_region: Point3<i32>,
    /// Current centre of the worm, in world space.
    pub head: Point3<f64>,
    /// Heading around the Y axis.
    pub yaw: f64,
    /// Heading above the horizontal plane.
    pub pitch: f64,
}

impl CaveWorm {
    /// Places worm number `index` of a region.
    ///
    /// The start cell is read from the position noise. Worms start in the lower
    /// quarter of the region, at least one radius above its floor.
    pub fn spawn(
        noise: &NoiseField,
        region: Point3<i32>,
        dimensions: RegionDimensions,
        index: u32,
        radius: i32,
    ) -> Self {
        let origin = region_origin(region, dimensions);
        let sample = |channel: i32| {
            noise.position_sample(
                (origin.x + index as i32) as f64,
                (origin.y + channel * 7919) as f64,
                origin.z as f64,
            )
        };

        let lowest = (radius + 1).min(dimensions.y as i32 - 1);
        let span = (dimensions.y as i32 / 4 - lowest).max(1);
        let local_x = (sample(0) * dimensions.x as f64) as i32;
        let local_y = (lowest + (sample(1) * span as f64) as i32).min(dimensions.y as i32 - 1);
        let local_z = (sample(2) * dimensions.z as f64) as i32;

        CaveWorm {
            origin_region: region,
            head: Point3::new(
                (origin.x + local_x) as f64 + 0.5,
                (origin.y + local_y) as f64 + 0.5,
                (origin.z + local_z) as f64 + 0.5,
            ),
            yaw: sample(3) * TAU,
            pitch: 0.0,
        }
    }

    /// The unit vector the worm is heading along.
    pub fn heading(&self) -> Vector3<f64> {
        Vector3::new(
            self.pitch.cos() * self.yaw.cos(),
            self.pitch.sin(),
            self.pitch.cos() * self.yaw.sin(),
        )
    }

    /// Moves the worm one step, turning it by the direction noise at its head.
    pub fn step(&mut self, noise: &NoiseField, length: f64) {
        let Point3 { x, y, z } = self.head;
        let turn = noise.direction_sample(x, y, z);
        let climb = noise.direction_sample(x + PITCH_SAMPLE_OFFSET, y, z);

        self.yaw = (self.yaw + turn * FRAC_PI_4).rem_euclid(TAU);
        self.pitch = (self.pitch + climb * FRAC_PI_8).clamp(-MAX_PITCH, MAX_PITCH);
        self.head += self.heading().normalize() * length;
    }

    /// The region the head is currently in.
    pub fn current_region(&self, dimensions: RegionDimensions) -> Point3<i32> {
        split_world_position(cell_of(self.head), dimensions).0
    }

    /// Every head position of the worm's walk, starting with the spawn point.
    ///
    /// The walk ends after `max_steps` steps or as soon as the head leaves the
    /// cube of regions within `max_region_distance` of the origin region.
    pub fn path(
        mut self,
        noise: &NoiseField,
        config: &CaveConfig,
        dimensions: RegionDimensions,
    ) -> Vec<Point3<f64>> {
        let length = config.radius.max(1) as f64;
        let mut points = vec![self.head];

        for _ in 0..config.max_steps {
            self.step(noise, length);
            if region_distance(self.current_region(dimensions), self.origin_region)
                > config.max_region_distance
            {
                break;
            }
            points.push(self.head);
        }

        points
    }
}

/// Chebyshev distance between two region coordinates.
pub fn region_distance(a: Point3<i32>, b: Point3<i32>) -> i32 {
    (a.x - b.x)
        .abs()
        .max((a.y - b.y).abs())
        .max((a.z - b.z).abs())
}

fn cell_of(point: Point3<f64>) -> Point3<i32> {
    Point3::new(
        point.x.floor() as i32,
        point.y.floor() as i32,
        point.z.floor() as i32,
    )
}

/// Carves a ball of air of `radius` cells around `center`.
pub fn carve_sphere(writer: &mut RegionWriter, center: Point3<f64>, radius: i32) {
    let middle = cell_of(center);
    let reach = radius * radius;
    for dy in -radius..=radius {
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy + dz * dz > reach {
                    continue;
                }
                let cell = Point3::new(middle.x + dx, middle.y + dy, middle.z + dz);
                if cell.y >= CAVE_FLOOR {
                    writer.write(cell, BlockType::AIR);
                }
            }
        }
    }
}

/// Spawns this region's worms and carves their tunnels.
pub fn carve_caves(writer: &mut RegionWriter, noise: &NoiseField, config: &CaveConfig) {
    let region = writer.chunk().position;
    let dimensions = writer.chunk().dimensions();
    let mut rng = noise.seeded_rng(CAVE_SALT, [region.x, region.y, region.z]);
    let count = rng.u32(config.min_worms..=config.max_worms);

    for index in 0..count {
        let worm = CaveWorm::spawn(noise, region, dimensions, index, config.radius);
        let path = worm.path(noise, config, dimensions);
        log::trace!(
            "Worm {} of region {:?} walked {} steps",
            index,
            region,
            path.len()
        );
        for point in path {
            carve_sphere(writer, point, config.radius);
        }
    }
}
