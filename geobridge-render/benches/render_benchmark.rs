//! Benchmarks for draw-list extraction and index widening.

use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geobridge_core::engine::{DrawCategory, EngineApi, ResourceKind};
use geobridge_core::{Boundary, HandleRegistry, NativeHandle};
use geobridge_render::draws::Draws;
use geobridge_render::resources::widen_indices;
use geobridge_sim::{MeshSpec, SceneTask, SimEngine};

static ENGINE: OnceLock<Arc<SimEngine>> = OnceLock::new();
static TOKEN: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn ignore_delete(_user_data: *mut c_void) {}

unsafe extern "C" fn attach_token(_map: *mut c_void, resource: *mut c_void) {
    if let (Some(sim), Some(resource)) = (ENGINE.get(), NativeHandle::from_raw(resource)) {
        let token = TOKEN.load(Ordering::Relaxed) as *mut c_void;
        sim.resource_set_user_data(resource, token, ignore_delete);
    }
}

struct Scene {
    boundary: Boundary,
    registry: HandleRegistry,
    map: NativeHandle,
    camera: NativeHandle,
}

/// One map with a loaded quad mesh and a camera.
fn scene() -> Scene {
    let sim = Arc::clone(ENGINE.get_or_init(|| Arc::new(SimEngine::new())));
    let boundary = Boundary::new(sim.clone());
    let registry = HandleRegistry::new();
    TOKEN.store(registry.register(Arc::new(MeshSpec::quad())).get(), Ordering::Relaxed);

    let map = sim.map_create("").expect("map");
    sim.map_set_config_paths(map, "bench://config", "", "");
    sim.map_data_initialize(map);
    sim.map_render_initialize(map);
    sim.callbacks_load(map, ResourceKind::Mesh, Some(attach_token));
    let camera = sim.camera_create(map).expect("camera");
    sim.queue_mesh(map, "quad", MeshSpec::quad()).expect("mesh");
    sim.map_data_tick(map);
    sim.map_render_tick_prepare(map, 0.0);
    Scene {
        boundary,
        registry,
        map,
        camera,
    }
}

fn bench_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("draws_refresh");
    for &count in &[10, 100, 1_000] {
        let scene = scene();
        let sim = ENGINE.get().expect("engine");
        let tasks = (0..count).map(|_| SceneTask::new("quad")).collect();
        sim.set_scene(scene.map, DrawCategory::Opaque, tasks);
        let mut draws = Draws::new();
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                draws
                    .refresh(&scene.boundary, &scene.registry, scene.map, scene.camera)
                    .expect("refresh");
                black_box(draws.total());
            });
        });
    }
    group.finish();
}

fn bench_widen_indices(c: &mut Criterion) {
    let mut group = c.benchmark_group("widen_indices");
    for &width in &[1usize, 2, 4] {
        let count = 65_536 / width as u32 * 2;
        let bytes = vec![1u8; count as usize * width];
        group.bench_with_input(BenchmarkId::from_parameter(width), &bytes, |b, bytes| {
            b.iter(|| black_box(widen_indices(black_box(bytes), count)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_refresh, bench_widen_indices);
criterion_main!(benches);
