//! # Chunk Creation Module
//!
//! This module turns a region coordinate into a finished voxel grid.
//!
//! ## Pipeline
//!
//! `ChunkGenerator::generate` runs four passes over a fresh chunk:
//! 1. **Terrain**: every column is filled from its surface height
//!    (grass on top, a few cells of dirt, stone below, air above)
//! 2. **Structures**: platforms are stamped around spawning columns
//! 3. **Caves**: noise-steered worms carve tunnels of air
//! 4. **Overrides**: writes other regions left for this one are applied last
//!
//! Passes 2 and 3 write through a `RegionWriter`, which keeps in-region cells
//! on the chunk and routes every other cell to the structure buffer under the
//! neighbouring region's coordinate.
//!
//! `ChunkGenerator::generate_unmerged` stops after step 3. The streamer uses it
//! on worker threads and drains step 4 itself once it knows the grid is kept,
//! so buffered writes are never consumed by a grid that gets thrown away.
//!
//! Given the same seed and configuration the grid of a coordinate is always
//! the same, whatever order regions are generated in. The only exception is
//! deliberate: overrides from neighbours generated *later* arrive through the
//! streamer's late-override pass instead of step 4.

use std::collections::HashMap;
use std::sync::Arc;

use bitvec::vec::BitVec;
use cgmath::Point3;

use crate::config::{RegionDimensions, SurfaceMode, WorldConfig};
use crate::engine_state::voxels::block::{block_type::BlockType, Block};
use crate::engine_state::voxels::noise_field::NoiseField;
use crate::engine_state::voxels::structure_buffer::{PendingOverride, StructureBuffer};
use crate::error::GenerationError;

use super::{caves, region_origin, split_world_position, structures, Chunk};

/// One octave of the fixed terrain signature.
///
/// The octave samples `signature((x + x_offset) / divisor, (z + z_offset) / divisor + z_shift)`
/// and contributes `weight` times that sample to the surface height.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SignatureOctave {
    pub x_offset: f64,
    pub z_offset: f64,
    pub divisor: f64,
    pub z_shift: f64,
    pub weight: f64,
}

const fn octave(x_offset: f64, z_offset: f64, divisor: f64, z_shift: f64, weight: f64) -> SignatureOctave {
    SignatureOctave {
        x_offset,
        z_offset,
        divisor,
        z_shift,
        weight,
    }
}

/// Octaves of the terrain signature, summed on top of [`TERRAIN_BASE_HEIGHT`].
///
/// Changing any value here changes every world generated from an existing seed.
pub const TERRAIN_SIGNATURE: [SignatureOctave; 7] = [
    octave(84.0, 0.0, 32.0, 0.0, 15.0),
    octave(0.0, 84.0, 64.0, 0.0, 27.0),
    octave(-612.0, 0.0, 16.0, 0.0, 5.0),
    octave(0.0, 0.0, 4.0, 64.0, 1.0),
    octave(8.0, 0.0, 24.0, -8.0, 12.0),
    octave(80.0, 0.0, 64.0, -80.0, 40.0),
    octave(8.0, 0.0, 128.0, -12.0, 80.0),
];

/// Constant lifted into every signature height.
pub const TERRAIN_BASE_HEIGHT: f64 = 64.0;

/// A builder that fills a chunk cell by cell in storage order.
///
/// Cells are pushed x-fastest, then y, then z, matching the chunk's layout,
/// so the solidity bits and the blocks are appended side by side.
pub struct ChunkCreationIterator {
    /// The region coordinate of the chunk being created
    position: Point3<i32>,
    dimensions: RegionDimensions,
    /// Bit vector where each bit represents whether a cell is solid (1) or air (0)
    solid_array: BitVec,
    blocks: Vec<Block>,
}

impl ChunkCreationIterator {
    /// Creates a new `ChunkCreationIterator` for building a chunk at the given position.
    ///
    /// # Arguments
    /// * `position` - The region coordinate of the chunk to create
    /// * `dimensions` - The grid size
    pub fn new(position: Point3<i32>, dimensions: RegionDimensions) -> Self {
        let volume = dimensions.volume();
        ChunkCreationIterator {
            position,
            dimensions,
            solid_array: BitVec::with_capacity(volume),
            blocks: Vec::with_capacity(volume),
        }
    }

    /// Adds a block at the current position and advances the position.
    ///
    /// Pushes past the end of the grid are ignored.
    pub fn push_block_type(&mut self, block_type: BlockType) {
        if self.is_full() {
            return;
        }
        self.solid_array.push(block_type.is_solid());
        self.blocks.push(Block::new(block_type));
    }

    /// Whether every cell has been pushed.
    pub fn is_full(&self) -> bool {
        self.blocks.len() == self.dimensions.volume()
    }

    /// Finalizes the chunk creation and returns the constructed `Chunk`.
    ///
    /// Cells that were never pushed are air.
    pub fn return_chunk(mut self) -> Chunk {
        while !self.is_full() {
            self.push_block_type(BlockType::AIR);
        }
        Chunk::from_parts(self.position, self.dimensions, self.solid_array, self.blocks)
    }
}

/// Pending writes for one destination, deduplicated by cell.
#[derive(Default)]
struct SpilledWrites {
    writes: Vec<PendingOverride>,
    slots: HashMap<Point3<usize>, usize>,
}

impl SpilledWrites {
    fn push(&mut self, offset: Point3<usize>, block_type: BlockType) {
        match self.slots.get(&offset) {
            Some(&slot) => self.writes[slot].block_type = block_type,
            None => {
                self.slots.insert(offset, self.writes.len());
                self.writes.push(PendingOverride { offset, block_type });
            }
        }
    }
}

/// Writes world cells during generation of one region.
///
/// Cells inside the region land on the chunk; the rest are collected per
/// destination region. Repeated writes to one outside cell keep only the last
/// value, which is what replaying them in order would produce.
pub struct RegionWriter {
    chunk: Chunk,
    spilled: HashMap<Point3<i32>, SpilledWrites>,
}

impl RegionWriter {
    pub fn new(chunk: Chunk) -> Self {
        RegionWriter {
            chunk,
            spilled: HashMap::new(),
        }
    }

    /// The chunk as written so far.
    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    /// Writes one world cell, wherever it lives.
    pub fn write(&mut self, world: Point3<i32>, block_type: BlockType) {
        let (region, local) = split_world_position(world, self.chunk.dimensions());
        if region == self.chunk.position {
            self.chunk.set_block_at(local.x, local.y, local.z, block_type);
        } else {
            self.spilled.entry(region).or_default().push(local, block_type);
        }
    }

    /// Number of distinct outside cells written so far.
    pub fn spilled_count(&self) -> usize {
        self.spilled.values().map(|spilled| spilled.writes.len()).sum()
    }

    /// Splits the writer into the chunk and the writes for other regions.
    pub fn finish(self) -> (Chunk, Vec<(Point3<i32>, Vec<PendingOverride>)>) {
        let spilled = self
            .spilled
            .into_iter()
            .map(|(region, spilled)| (region, spilled.writes))
            .collect();
        (self.chunk, spilled)
    }
}

/// Produces the voxel grid of any region coordinate.
///
/// The generator is immutable and shared between generation workers; all of
/// its randomness is derived from the world seed and the region coordinate.
pub struct ChunkGenerator {
    config: Arc<WorldConfig>,
    noise: Arc<NoiseField>,
    structure_buffer: StructureBuffer,
}

impl ChunkGenerator {
    /// Creates a generator.
    ///
    /// # Arguments
    /// * `config` - The validated world configuration
    /// * `noise` - The noise field built from the same configuration
    /// * `structure_buffer` - Where cross-region writes are exchanged
    pub fn new(
        config: Arc<WorldConfig>,
        noise: Arc<NoiseField>,
        structure_buffer: StructureBuffer,
    ) -> Self {
        ChunkGenerator {
            config,
            noise,
            structure_buffer,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn noise(&self) -> &NoiseField {
        &self.noise
    }

    pub fn structure_buffer(&self) -> &StructureBuffer {
        &self.structure_buffer
    }

    /// The world Y of the topmost solid cell of a column.
    pub fn surface_height(&self, world_x: i32, world_z: i32) -> i32 {
        match self.config.terrain.surface_mode {
            SurfaceMode::Signature => signature_height(&self.noise, world_x, world_z),
            SurfaceMode::Density => self.noise.density_surface(world_x, world_z),
        }
    }

    /// The block a column with surface `surface` holds at world height `world_y`.
    pub fn column_block(&self, world_y: i32, surface: i32) -> BlockType {
        let dirt_floor = surface - self.config.terrain.dirt_depth;
        if world_y > surface {
            BlockType::AIR
        } else if world_y == surface {
            BlockType::GRASS
        } else if world_y > dirt_floor {
            BlockType::DIRT
        } else {
            BlockType::STONE
        }
    }

    /// Generates the grid of a region.
    ///
    /// Writes this region makes into its neighbours are appended to the
    /// structure buffer; writes its neighbours left for it are drained from
    /// the buffer and applied last, overriding everything else.
    ///
    /// # Errors
    /// Returns [`GenerationError::OverrideOutOfBounds`] if a buffered write does
    /// not address a cell of this region.
    pub fn generate(&self, position: Point3<i32>) -> Result<Chunk, GenerationError> {
        let mut chunk = self.generate_unmerged(position);

        let pending = self.structure_buffer.take_all(position);
        if !pending.is_empty() {
            log::trace!("Applying {} overrides to region {:?}", pending.len(), position);
        }
        for pending_override in &pending {
            chunk.apply_override(pending_override)?;
        }

        Ok(chunk)
    }

    /// Generates a region's own content: terrain, structures and caves.
    ///
    /// Writes into neighbours are appended to the structure buffer, but
    /// writes pending for this region stay there for the caller to drain once
    /// it knows the grid will be kept.
    pub fn generate_unmerged(&self, position: Point3<i32>) -> Chunk {
        let dimensions = self.config.region;
        let origin = region_origin(position, dimensions);

        let heights: Vec<i32> = (0..dimensions.z)
            .flat_map(|cz| (0..dimensions.x).map(move |cx| (cx, cz)))
            .map(|(cx, cz)| self.surface_height(origin.x + cx as i32, origin.z + cz as i32))
            .collect();

        let mut cci = ChunkCreationIterator::new(position, dimensions);
        for cz in 0..dimensions.z {
            for cy in 0..dimensions.y {
                for cx in 0..dimensions.x {
                    let surface = heights[cx + dimensions.x * cz];
                    cci.push_block_type(self.column_block(origin.y + cy as i32, surface));
                }
            }
        }

        let mut writer = RegionWriter::new(cci.return_chunk());
        structures::place_structures(
            &mut writer,
            &self.noise,
            &self.config.structures,
            &heights,
            |x, z| self.surface_height(x, z),
        );
        caves::carve_caves(&mut writer, &self.noise, &self.config.caves);

        let (chunk, spilled) = writer.finish();
        for (destination, overrides) in spilled {
            self.structure_buffer.append(destination, overrides);
        }
        chunk
    }
}

/// Surface height of a column under the fixed terrain signature.
pub fn signature_height(noise: &NoiseField, world_x: i32, world_z: i32) -> i32 {
    let (x, z) = (world_x as f64, world_z as f64);
    let sum: f64 = TERRAIN_SIGNATURE
        .iter()
        .map(|o| {
            o.weight
                * noise.signature_sample(
                    (x + o.x_offset) / o.divisor,
                    (z + o.z_offset) / o.divisor + o.z_shift,
                )
        })
        .sum();
    (sum + TERRAIN_BASE_HEIGHT).ceil() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(config: WorldConfig) -> ChunkGenerator {
        let noise = Arc::new(NoiseField::new(&config));
        ChunkGenerator::new(Arc::new(config), noise, StructureBuffer::new())
    }

    fn flat_config() -> WorldConfig {
        let mut config = WorldConfig::default();
        config.region = RegionDimensions { x: 8, y: 256, z: 8 };
        config.caves.min_worms = 0;
        config.caves.max_worms = 0;
        config.structures.spawn_chance = 0.0;
        config
    }

    #[test]
    fn test_signature_height_golden_values() {
        let generator = generator(WorldConfig::default());
        assert_eq!(generator.surface_height(0, 0), 146);
        assert_eq!(generator.surface_height(5, 7), 154);
        assert_eq!(generator.surface_height(37, -21), 163);
    }

    #[test]
    fn test_signature_height_depends_on_seed() {
        let mut config = WorldConfig::default();
        config.seed = 1;
        let reseeded = generator(config);
        assert_eq!(reseeded.surface_height(0, 0), 158);
        assert_ne!(
            reseeded.surface_height(0, 0),
            generator(WorldConfig::default()).surface_height(0, 0)
        );
    }

    #[test]
    fn test_column_fill_layers() {
        let generator = generator(flat_config());
        let surface = 100;
        assert_eq!(generator.column_block(101, surface), BlockType::AIR);
        assert_eq!(generator.column_block(100, surface), BlockType::GRASS);
        assert_eq!(generator.column_block(99, surface), BlockType::DIRT);
        assert_eq!(generator.column_block(98, surface), BlockType::DIRT);
        assert_eq!(generator.column_block(97, surface), BlockType::STONE);
        assert_eq!(generator.column_block(0, surface), BlockType::STONE);
    }

    #[test]
    fn test_generated_columns_follow_surface() {
        let generator = generator(flat_config());
        let chunk = generator.generate(Point3::new(0, 0, 0)).unwrap();

        for cz in 0..8 {
            for cx in 0..8 {
                let surface = generator.surface_height(cx as i32, cz as i32);
                assert!(surface > 0 && (surface as usize) < 255);
                let top = surface as usize;
                assert_eq!(chunk.block_type_at(cx, top, cz), BlockType::GRASS);
                assert_eq!(chunk.block_type_at(cx, top + 1, cz), BlockType::AIR);
                assert_eq!(chunk.block_type_at(cx, 0, cz), BlockType::STONE);
            }
        }
    }

    #[test]
    fn test_pending_overrides_win() {
        let generator = generator(flat_config());
        let position = Point3::new(0, 0, 0);
        generator.structure_buffer().append(
            position,
            [
                PendingOverride {
                    offset: Point3::new(1, 0, 1),
                    block_type: BlockType::WOOD,
                },
                PendingOverride {
                    offset: Point3::new(1, 250, 1),
                    block_type: BlockType::STONE,
                },
            ],
        );

        let chunk = generator.generate(position).unwrap();
        assert_eq!(chunk.block_type_at(1, 0, 1), BlockType::WOOD);
        assert_eq!(chunk.block_type_at(1, 250, 1), BlockType::STONE);
        assert!(generator.structure_buffer().is_empty());
    }

    #[test]
    fn test_unmerged_generation_leaves_pending_writes() {
        let generator = generator(flat_config());
        let position = Point3::new(0, 0, 0);
        let write = PendingOverride {
            offset: Point3::new(2, 3, 2),
            block_type: BlockType::WOOD,
        };
        generator.structure_buffer().append(position, [write]);

        let chunk = generator.generate_unmerged(position);
        assert_eq!(chunk.block_type_at(2, 3, 2), BlockType::STONE);
        assert_eq!(generator.structure_buffer().peek(position), vec![write]);
    }

    #[test]
    fn test_region_writer_routes_outside_cells() {
        let dims = RegionDimensions { x: 4, y: 4, z: 4 };
        let mut writer = RegionWriter::new(Chunk::empty(Point3::new(0, 0, 0), dims));

        writer.write(Point3::new(1, 1, 1), BlockType::WOOD);
        writer.write(Point3::new(-1, 1, 1), BlockType::WOOD);
        writer.write(Point3::new(-1, 1, 1), BlockType::AIR);

        assert_eq!(writer.spilled_count(), 1);
        let (chunk, spilled) = writer.finish();
        assert_eq!(chunk.block_type_at(1, 1, 1), BlockType::WOOD);
        assert_eq!(
            spilled,
            vec![(
                Point3::new(-1, 0, 0),
                vec![PendingOverride {
                    offset: Point3::new(3, 1, 1),
                    block_type: BlockType::AIR
                }]
            )]
        );
    }

    #[test]
    fn test_creation_iterator_pads_with_air() {
        let dims = RegionDimensions { x: 2, y: 2, z: 2 };
        let mut cci = ChunkCreationIterator::new(Point3::new(0, 0, 0), dims);
        cci.push_block_type(BlockType::STONE);
        let chunk = cci.return_chunk();

        assert_eq!(chunk.volume(), 8);
        assert_eq!(chunk.solid_count(), 1);
        assert!(chunk.is_block_solid(0, 0, 0));
    }
}
