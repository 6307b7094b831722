//! Mesh data structures for region geometry.
//!
//! A `Mesh` is what the streamer publishes for a region: vertex and index
//! buffers of the exposed faces, plus one face-mask byte per cell.

use crate::engine_state::voxels::block::block_side::BlockSide;

use super::face::Face;
use super::vertex::Vertex;

/// The finished geometry of one region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Four vertices per face, in ll, lr, ul, ur order
    pub vertices: Vec<Vertex>,
    /// Six indices per face forming two counter-clockwise triangles
    pub indices: Vec<u32>,
    /// One byte per cell in storage order; bit `side as u8` is set when that face was emitted
    pub faces: Vec<u8>,
}

impl Mesh {
    /// Creates an empty mesh for a region of `cell_count` cells.
    pub fn new(cell_count: usize) -> Self {
        Mesh {
            vertices: Vec::new(),
            indices: Vec::new(),
            faces: vec![0; cell_count],
        }
    }

    /// Appends one face of the cell at storage index `cell_index`.
    pub fn add_face(&mut self, cell_index: usize, face: &Face) {
        let base = self.face_count() as u32;
        self.vertices
            .extend_from_slice(&Self::generate_face_vertices(face));
        self.indices
            .extend_from_slice(&Self::generate_face_indices(base));
        if let Some(mask) = self.faces.get_mut(cell_index) {
            *mask |= face.block_side.mask();
        }
    }

    /// Generates vertex data for a single face of a block.
    ///
    /// # Returns
    /// The four corners in ll, lr, ul, ur order, matching the indices from
    /// `generate_face_indices`.
    pub fn generate_face_vertices(face: &Face) -> [Vertex; 4] {
        let normal = face.block_side.normal();
        let texture_index = face.block.texture_index(face.block_side);
        [
            Vertex::new(face.ll, normal, texture_index, 0.0, 1.0),
            Vertex::new(face.lr, normal, texture_index, 1.0, 1.0),
            Vertex::new(face.ul, normal, texture_index, 0.0, 0.0),
            Vertex::new(face.ur, normal, texture_index, 1.0, 0.0),
        ]
    }

    /// Generates index data for a face, adjusted by the number of previously generated faces.
    ///
    /// # Arguments
    /// * `num_faces_generated` - The number of faces that have been generated so far
    pub fn generate_face_indices(num_faces_generated: u32) -> [u32; 6] {
        let base = num_faces_generated * 4;
        [base, base + 1, base + 3, base, base + 3, base + 2]
    }

    /// Number of faces emitted.
    pub fn face_count(&self) -> usize {
        self.vertices.len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Whether the face on `side` of the cell at storage index `cell_index` was emitted.
    pub fn has_face(&self, cell_index: usize, side: BlockSide) -> bool {
        self.faces
            .get(cell_index)
            .is_some_and(|mask| mask & side.mask() != 0)
    }
}
