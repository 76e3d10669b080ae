//! Benchmarks for the host path: load callbacks through the instance table
//! and per-camera draw refresh.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use geobridge_core::DrawCategory;
use geobridge_host::{Camera, Map};
use geobridge_render::{Draws, Texture};
use geobridge_sim::{MeshSpec, SceneTask, SimEngine, TextureSpec};

const CONFIG: &str = "bench://mapConfig.json";

fn ready_map(sim: &Arc<SimEngine>) -> Map {
    let mut map = Map::new(sim.clone(), "").expect("map");
    map.set_config_paths(CONFIG, "", "").expect("config");
    map.data_initialize().expect("data initialize");
    map.data_tick().expect("config tick");
    map
}

fn bench_load_textures(c: &mut Criterion) {
    let sim = Arc::new(SimEngine::new());
    let mut group = c.benchmark_group("load_textures");
    for &count in &[1usize, 16, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let map = ready_map(&sim);
                    map.on_load_texture(|texture: Texture| Ok::<_, String>(texture.data));
                    for i in 0..count {
                        let spec = TextureSpec::rgba(64, 64, 0x7f);
                        sim.queue_texture(map.handle(), &format!("t{i}"), spec);
                    }
                    map
                },
                |map| {
                    map.data_tick().expect("load tick");
                    black_box(map.registry().len());
                    map
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_camera_refresh(c: &mut Criterion) {
    let sim = Arc::new(SimEngine::new());
    let mut group = c.benchmark_group("camera_refresh");
    for &count in &[10usize, 100, 1_000] {
        let mut map = ready_map(&sim);
        sim.queue_mesh(map.handle(), "quad", MeshSpec::quad());
        sim.queue_texture(map.handle(), "tex", TextureSpec::rgba(4, 4, 0));
        map.data_tick().expect("load tick");
        let tasks = (0..count)
            .map(|_| SceneTask::new("quad").with_color_texture("tex"))
            .collect();
        sim.set_scene(map.handle(), DrawCategory::Opaque, tasks);
        map.render_initialize().expect("render initialize");
        let camera = Camera::new(&map).expect("camera");
        map.render_tick_prepare(0.0).expect("prepare");

        let mut draws = Draws::new();
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                camera.refresh_draws(&mut draws).expect("refresh");
                black_box(draws.total());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_load_textures, bench_camera_refresh);
criterion_main!(benches);
