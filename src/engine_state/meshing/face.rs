use cgmath::Point3;

use crate::engine_state::voxels::block::{block_side::BlockSide, Block};

/// Represents a single quad face of a voxel in the mesh.
///
/// A face is defined by four corner points (lower-left, lower-right, upper-right, upper-left)
/// and contains information about the block and which side of the block it represents.
/// Walking ll → lr → ur → ul goes counter-clockwise when viewed from outside the cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Lower-left corner of the face in region coordinates
    pub ll: Point3<usize>,
    /// Lower-right corner of the face in region coordinates
    pub lr: Point3<usize>,
    /// Upper-right corner of the face in region coordinates
    pub ur: Point3<usize>,
    /// Upper-left corner of the face in region coordinates
    pub ul: Point3<usize>,
    /// The block this face belongs to, used for texture mapping
    pub block: Block,
    /// Which side of the block this face represents
    pub block_side: BlockSide,
}

impl Face {
    /// Creates a new face for a voxel at the given coordinates.
    ///
    /// # Arguments
    /// * `i`, `j`, `k` - The coordinates of the voxel in region space
    /// * `block` - The block, used for texture mapping
    /// * `block_side` - Which side of the block this face represents
    pub fn new(i: usize, j: usize, k: usize, block: Block, block_side: BlockSide) -> Self {
        let (ll, lr, ur, ul) = match block_side {
            BlockSide::TOP => (
                Point3::new(i, j + 1, k + 1),
                Point3::new(i + 1, j + 1, k + 1),
                Point3::new(i + 1, j + 1, k),
                Point3::new(i, j + 1, k),
            ),
            BlockSide::BOTTOM => (
                Point3::new(i, j, k),
                Point3::new(i + 1, j, k),
                Point3::new(i + 1, j, k + 1),
                Point3::new(i, j, k + 1),
            ),
            BlockSide::RIGHT => (
                Point3::new(i + 1, j, k + 1),
                Point3::new(i + 1, j, k),
                Point3::new(i + 1, j + 1, k),
                Point3::new(i + 1, j + 1, k + 1),
            ),
            BlockSide::LEFT => (
                Point3::new(i, j, k),
                Point3::new(i, j, k + 1),
                Point3::new(i, j + 1, k + 1),
                Point3::new(i, j + 1, k),
            ),
            BlockSide::BACK => (
                Point3::new(i, j, k + 1),
                Point3::new(i + 1, j, k + 1),
                Point3::new(i + 1, j + 1, k + 1),
                Point3::new(i, j + 1, k + 1),
            ),
            BlockSide::FRONT => (
                Point3::new(i + 1, j, k),
                Point3::new(i, j, k),
                Point3::new(i, j + 1, k),
                Point3::new(i + 1, j + 1, k),
            ),
        };

        Face {
            ll,
            lr,
            ur,
            ul,
            block,
            block_side,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use cgmath::{InnerSpace, Vector3};

    fn as_f64(p: Point3<usize>) -> Vector3<f64> {
        Vector3::new(p.x as f64, p.y as f64, p.z as f64)
    }

    #[test]
    fn test_winding_matches_outward_normal() {
        for side in BlockSide::all() {
            let face = Face::new(2, 3, 4, Block::new(BlockType::STONE), side);
            let (ll, lr, ur, ul) = (as_f64(face.ll), as_f64(face.lr), as_f64(face.ur), as_f64(face.ul));
            let n = side.normal();
            let normal = Vector3::new(n[0] as f64, n[1] as f64, n[2] as f64);

            assert!((lr - ll).cross(ur - ll).dot(normal) > 0.0, "{:?}", side);
            assert!((ur - ll).cross(ul - ll).dot(normal) > 0.0, "{:?}", side);
        }
    }

    #[test]
    fn test_face_lies_on_its_side_of_the_cell() {
        let face = Face::new(0, 0, 0, Block::new(BlockType::DIRT), BlockSide::RIGHT);
        assert!([face.ll, face.lr, face.ur, face.ul].iter().all(|p| p.x == 1));
        let face = Face::new(0, 0, 0, Block::new(BlockType::DIRT), BlockSide::FRONT);
        assert!([face.ll, face.lr, face.ur, face.ul].iter().all(|p| p.z == 0));
    }
}
