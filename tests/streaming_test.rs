use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cgmath::{Point2, Point3};
use voxel_terrain::config::{RegionDimensions, WorldConfig};
use voxel_terrain::engine_state::meshing::Mesh;
use voxel_terrain::engine_state::observer::SharedObserver;
use voxel_terrain::engine_state::streaming::worker::desired_regions;
use voxel_terrain::engine_state::streaming::{Presentation, Streamer};
use voxel_terrain::engine_state::voxels::block::block_type::BlockType;
use voxel_terrain::error::StreamingError;

const DEADLINE: Duration = Duration::from_secs(120);

#[derive(Default)]
struct RecordingPresentation {
    attached: HashMap<Point3<i32>, (Point3<i32>, usize)>,
    attach_calls: usize,
    detach_calls: usize,
}

impl Presentation for RecordingPresentation {
    fn attach(&mut self, region: Point3<i32>, origin: Point3<i32>, mesh: &Mesh) {
        self.attach_calls += 1;
        self.attached.insert(region, (origin, mesh.face_count()));
    }

    fn detach(&mut self, region: Point3<i32>) {
        self.detach_calls += 1;
        self.attached.remove(&region);
    }
}

impl RecordingPresentation {
    fn regions(&self) -> HashSet<Point3<i32>> {
        self.attached.keys().copied().collect()
    }
}

fn small_config() -> WorldConfig {
    let mut config = WorldConfig::default();
    config.region = RegionDimensions { x: 8, y: 256, z: 8 };
    config.streaming.active_radius = 2;
    config.streaming.starting_radius = 3;
    config.streaming.worker_threads = 2;
    config.streaming.cells_per_advance = 2048;
    config
}

fn expected(column: Point2<i32>, config: &WorldConfig) -> HashSet<Point3<i32>> {
    desired_regions(
        column,
        config.streaming.active_radius,
        config.streaming.regions_per_column,
    )
    .into_iter()
    .collect()
}

/// Ticks until the presentation shows exactly `target`.
fn converge(
    streamer: &mut Streamer,
    presentation: &mut RecordingPresentation,
    target: &HashSet<Point3<i32>>,
) {
    let started = Instant::now();
    loop {
        streamer.tick(presentation).unwrap();
        if streamer.is_world_ready() && presentation.regions() == *target {
            assert_eq!(streamer.published_regions(), target);
            return;
        }
        assert!(
            started.elapsed() < DEADLINE,
            "did not converge: {} of {} regions attached",
            presentation.attached.len(),
            target.len()
        );
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_streaming_converges_and_follows_the_observer() {
    let config = small_config();
    let observer = SharedObserver::new(Point2::new(0, 0));
    let mut streamer = Streamer::new(config.clone(), Arc::new(observer.clone())).unwrap();
    streamer.init().unwrap();
    let mut presentation = RecordingPresentation::default();

    let first = expected(Point2::new(0, 0), &config);
    converge(&mut streamer, &mut presentation, &first);
    assert_eq!(first.len(), 9);
    assert!(presentation.attach_calls >= 9);

    let (origin, faces) = presentation.attached[&Point3::new(-1, 0, 1)];
    assert_eq!(origin, Point3::new(-8, 0, 8));
    assert!(faces > 0);

    assert_eq!(streamer.query_voxel(0, 0, 0), BlockType::STONE);
    assert_eq!(streamer.query_voxel(0, 300, 0), BlockType::AIR);
    assert_eq!(streamer.query_voxel(0, -1, 0), BlockType::AIR);
    assert_eq!(streamer.query_voxel(1000, 100, 1000), BlockType::AIR);

    observer.set_column(Point2::new(5, -1));
    let second = expected(Point2::new(5, -1), &config);
    converge(&mut streamer, &mut presentation, &second);
    assert!(presentation.regions().is_disjoint(&first));
    assert!(presentation.detach_calls >= 9);
    assert_eq!(streamer.query_voxel(0, 0, 0), BlockType::AIR);
    assert_eq!(streamer.query_voxel(40, 0, -4), BlockType::STONE);

    streamer.shutdown().unwrap();
}

#[test]
fn test_init_twice_is_rejected() {
    let observer = Arc::new(SharedObserver::new(Point2::new(0, 0)));
    let mut streamer = Streamer::new(small_config(), observer).unwrap();
    streamer.init().unwrap();

    assert!(matches!(streamer.init(), Err(StreamingError::AlreadyRunning)));
    streamer.shutdown().unwrap();
}

#[test]
fn test_shutdown_before_init_is_clean() {
    let observer = Arc::new(SharedObserver::new(Point2::new(2, 2)));
    let streamer = Streamer::new(small_config(), observer).unwrap();
    assert!(!streamer.is_world_ready());
    streamer.shutdown().unwrap();
}
