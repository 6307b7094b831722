//! Vertex data structures for region geometry.
//!
//! This module defines the vertex format emitted by meshing. The layout is
//! plain old data, so a consumer can upload `Mesh::vertices` as raw bytes.

use cgmath::Point3;

/// A vertex of region geometry.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes), region-local
/// - Normal: [f32; 3] (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Texture Index: u32 (4 bytes)
///
/// Total size: 36 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position relative to the region origin
    pub position: [f32; 3],
    /// Outward unit normal of the face
    pub normal: [f32; 3],
    /// UV texture coordinates (normalized 0.0-1.0)
    pub tex_coords: [f32; 2],
    /// Index of the texture in the texture atlas
    pub texture_index: u32,
}

impl Vertex {
    /// Creates a new vertex with the given parameters.
    ///
    /// # Arguments
    /// * `pos` - The corner position in region-local cells
    /// * `normal` - The outward normal of the face
    /// * `texture_index` - Index of the texture in the atlas
    /// * `u`, `v` - Texture coordinates
    pub fn new(pos: Point3<usize>, normal: [f32; 3], texture_index: u32, u: f32, v: f32) -> Self {
        Vertex {
            position: [pos.x as f32, pos.y as f32, pos.z as f32],
            normal,
            tex_coords: [u, v],
            texture_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 36);
        let vertex = Vertex::new(Point3::new(1, 2, 3), [0.0, 1.0, 0.0], 4, 1.0, 0.0);
        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), 36);
    }
}
