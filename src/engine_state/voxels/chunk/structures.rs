//! # Structures
//!
//! Small fixed shapes stamped onto the terrain after the column fill.
//!
//! Whether a column spawns a structure is a seeded roll on the column alone,
//! so every region stacked on that column agrees on it. Only the region that
//! holds the structure's anchor cell stamps it; cells that fall outside that
//! region are routed to their owners through the `RegionWriter`.

use cgmath::Point3;

use crate::config::StructureConfig;
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::noise_field::NoiseField;

use super::chunk_creation::RegionWriter;

/// Salt separating structure rolls from other seeded randomness.
pub const STRUCTURE_SALT: u64 = 0x5354_5255_4354;

/// Cells from the centre of a platform deck to its edge.
pub const PLATFORM_HALF_WIDTH: i32 = 2;

/// Corner columns of a platform, relative to its anchor.
pub const POST_CORNERS: [(i32, i32); 4] = [
    (-PLATFORM_HALF_WIDTH, -PLATFORM_HALF_WIDTH),
    (PLATFORM_HALF_WIDTH, -PLATFORM_HALF_WIDTH),
    (-PLATFORM_HALF_WIDTH, PLATFORM_HALF_WIDTH),
    (PLATFORM_HALF_WIDTH, PLATFORM_HALF_WIDTH),
];

/// A square wooden deck on four corner posts.
///
/// The deck is centred on the spawning column `height_offset` cells above its
/// surface. Each post rises from just above the surface of its own column to
/// the deck; a corner whose surface reaches the deck gets no post.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WoodenPlatform {
    /// World cell at the centre of the deck.
    pub anchor: Point3<i32>,
    /// Surface height under each corner, in [`POST_CORNERS`] order.
    pub post_surfaces: [i32; 4],
}

impl WoodenPlatform {
    /// Lays out a platform.
    ///
    /// # Arguments
    /// * `world_x`, `world_z` - The spawning column
    /// * `surface` - Surface height of the spawning column
    /// * `height_offset` - Cells from that surface to the deck
    /// * `surface_at` - Surface height of any world column
    pub fn new<F>(world_x: i32, world_z: i32, surface: i32, height_offset: i32, surface_at: F) -> Self
    where
        F: Fn(i32, i32) -> i32,
    {
        WoodenPlatform {
            anchor: Point3::new(world_x, surface + height_offset, world_z),
            post_surfaces: POST_CORNERS.map(|(dx, dz)| surface_at(world_x + dx, world_z + dz)),
        }
    }

    /// Every world cell the platform writes, in stamping order.
    pub fn cells(&self) -> Vec<(Point3<i32>, BlockType)> {
        let Point3 { x, y: deck_y, z } = self.anchor;
        let mut cells = Vec::new();

        for dz in -PLATFORM_HALF_WIDTH..=PLATFORM_HALF_WIDTH {
            for dx in -PLATFORM_HALF_WIDTH..=PLATFORM_HALF_WIDTH {
                cells.push((Point3::new(x + dx, deck_y, z + dz), BlockType::WOOD));
            }
        }

        for ((dx, dz), surface) in POST_CORNERS.into_iter().zip(self.post_surfaces) {
            for post_y in surface + 1..deck_y {
                cells.push((Point3::new(x + dx, post_y, z + dz), BlockType::WOOD));
            }
        }

        cells
    }
}

/// Whether the column at `(world_x, world_z)` spawns a structure.
pub fn spawns_at(noise: &NoiseField, config: &StructureConfig, world_x: i32, world_z: i32) -> bool {
    config.spawn_chance > 0.0
        && noise.seeded_rng(STRUCTURE_SALT, [world_x, 0, world_z]).f64() < config.spawn_chance
}

/// Stamps every structure anchored in the region being written.
///
/// # Arguments
/// * `writer` - The region's writer
/// * `noise` - Source of the spawn rolls
/// * `config` - Spawn chance and deck height
/// * `heights` - Surface height of each column of the region, x-fastest
/// * `surface_at` - Surface height of any world column, for posts outside the region
pub fn place_structures<F>(
    writer: &mut RegionWriter,
    noise: &NoiseField,
    config: &StructureConfig,
    heights: &[i32],
    surface_at: F,
) where
    F: Fn(i32, i32) -> i32,
{
    let dimensions = writer.chunk().dimensions();
    let origin = writer.chunk().origin();
    let floor = origin.y;
    let ceiling = origin.y + dimensions.y as i32;
    let column_surface = |x: i32, z: i32| {
        let (cx, cz) = (x - origin.x, z - origin.z);
        if (0..dimensions.x as i32).contains(&cx) && (0..dimensions.z as i32).contains(&cz) {
            heights[cx as usize + dimensions.x * cz as usize]
        } else {
            surface_at(x, z)
        }
    };

    for cz in 0..dimensions.z {
        for cx in 0..dimensions.x {
            let (world_x, world_z) = (origin.x + cx as i32, origin.z + cz as i32);
            if !spawns_at(noise, config, world_x, world_z) {
                continue;
            }

            let surface = heights[cx + dimensions.x * cz];
            let platform = WoodenPlatform::new(
                world_x,
                world_z,
                surface,
                config.height_offset,
                &column_surface,
            );
            if !(floor..ceiling).contains(&platform.anchor.y) {
                continue;
            }

            log::trace!("Placing platform at {:?}", platform.anchor);
            for (cell, block_type) in platform.cells() {
                writer.write(cell, block_type);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RegionDimensions, WorldConfig};
    use crate::engine_state::voxels::chunk::Chunk;

    #[test]
    fn test_platform_shape() {
        let platform = WoodenPlatform::new(10, -4, 70, 7, |_, _| 70);
        let cells = platform.cells();

        let deck: Vec<_> = cells.iter().filter(|(p, _)| p.y == 77).collect();
        assert_eq!(deck.len(), 25);
        // Posts span y = 71..=76 at four corners.
        assert_eq!(cells.len(), 25 + 4 * 6);
        assert!(cells.iter().all(|(_, block)| *block == BlockType::WOOD));
        assert!(cells.contains(&(Point3::new(8, 71, -6), BlockType::WOOD)));
        assert!(cells.contains(&(Point3::new(12, 76, -2), BlockType::WOOD)));
    }

    #[test]
    fn test_posts_follow_their_own_columns() {
        // Ground rises towards +x.
        let platform = WoodenPlatform::new(10, -4, 70, 7, |x, _| if x > 10 { 74 } else { 68 });
        let cells = platform.cells();
        let post = |x: i32, z: i32| -> Vec<i32> {
            cells
                .iter()
                .filter(|(p, _)| p.x == x && p.z == z && p.y != 77)
                .map(|(p, _)| p.y)
                .collect()
        };

        assert_eq!(post(8, -6), (69..77).collect::<Vec<_>>());
        assert_eq!(post(12, -2), (75..77).collect::<Vec<_>>());
        assert_eq!(cells.len(), 25 + 2 * 8 + 2 * 2);
    }

    #[test]
    fn test_buried_corner_gets_no_post() {
        let platform = WoodenPlatform::new(0, 0, 40, 3, |x, _| if x < 0 { 50 } else { 40 });
        let cells = platform.cells();
        assert!(cells.iter().all(|(p, _)| p.x >= 0 || p.y == 43));
        assert_eq!(cells.len(), 25 + 2 * 2);
    }

    #[test]
    fn test_zero_chance_never_spawns() {
        let noise = NoiseField::new(&WorldConfig::default());
        let config = StructureConfig {
            spawn_chance: 0.0,
            height_offset: 7,
        };
        assert!((-50..50).all(|x| !spawns_at(&noise, &config, x, x * 3)));
    }

    #[test]
    fn test_full_chance_spills_into_neighbours() {
        let noise = NoiseField::new(&WorldConfig::default());
        let config = StructureConfig {
            spawn_chance: 1.0,
            height_offset: 7,
        };
        let dims = RegionDimensions { x: 4, y: 64, z: 4 };
        let mut writer = RegionWriter::new(Chunk::empty(Point3::new(0, 0, 0), dims));

        place_structures(&mut writer, &noise, &config, &[20; 16], |_, _| 20);

        assert_eq!(writer.chunk().block_type_at(0, 27, 0), BlockType::WOOD);
        assert!(writer.spilled_count() > 0);
    }
}
