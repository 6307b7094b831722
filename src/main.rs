//! # Voxel Terrain Headless Driver
//!
//! Streams a world around an observer walking along +X and logs what gets
//! published. Pass a JSON configuration file to override the defaults.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- world.json
//! ```

fn main() {
    if let Err(error) = voxel_terrain::run() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}
