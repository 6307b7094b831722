//! The consumer side of mesh publication.

use cgmath::Point3;

use crate::engine_state::meshing::Mesh;

/// Receives finished region geometry from [`Streamer::tick`](super::Streamer::tick).
///
/// Both calls happen on the thread calling `tick()`, while the region store
/// is read-locked, so they must not call back into the streamer.
pub trait Presentation {
    /// Shows the mesh of `region`, replacing any mesh attached for it before.
    ///
    /// # Arguments
    /// * `region` - The region coordinate
    /// * `origin` - World position of the region's cell `(0, 0, 0)`; vertex
    ///   positions are relative to it
    /// * `mesh` - The finished geometry
    fn attach(&mut self, region: Point3<i32>, origin: Point3<i32>, mesh: &Mesh);

    /// Removes the mesh of an evicted region.
    fn detach(&mut self, region: Point3<i32>);
}

/// What one `tick()` published.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Meshes attached, including replacements.
    pub attached: usize,
    /// Meshes detached.
    pub detached: usize,
}
