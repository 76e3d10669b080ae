//! Integration tests for resource loading through the engine callbacks.
//!
//! Each test drives a `SimEngine` map through real data ticks, so textures
//! and meshes arrive through the same load → register → deleter path the
//! native engine uses.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use geobridge_core::{BridgeError, ResourceToken};
use geobridge_host::Map;
use geobridge_render::{Mesh, Texture};
use geobridge_sim::{MeshSpec, SimEngine, TextureSpec};

const CONFIG: &str = "https://maps.example/mapConfig.json";

/// Host-side texture object with a drop counter.
struct HostTexture {
    bytes: Vec<u8>,
    drops: Arc<AtomicUsize>,
}

impl Drop for HostTexture {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn data_map(sim: &Arc<SimEngine>) -> Map {
    let mut map = Map::new(sim.clone(), "").unwrap();
    map.set_config_paths(CONFIG, "", "").unwrap();
    map.data_initialize().unwrap();
    map
}

fn token_of(sim: &SimEngine, map: &Map, name: &str) -> ResourceToken {
    let user_data = sim.resource_user_data(map.handle(), name).expect("user data");
    ResourceToken::new(user_data).unwrap()
}

#[test]
fn test_texture_h1_scenario() {
    let sim = Arc::new(SimEngine::new());
    let map = data_map(&sim);
    let drops = Arc::new(AtomicUsize::new(0));
    let handler_drops = drops.clone();
    map.on_load_texture(move |texture: Texture| {
        Ok::<_, String>(HostTexture {
            bytes: texture.data,
            drops: handler_drops.clone(),
        })
    });

    sim.queue_texture(map.handle(), "H1", TextureSpec::rgba(2, 2, 0xFF));
    map.data_tick().unwrap();

    // K1 resolves to O1, which holds the 16 decoded bytes.
    let k1 = token_of(&sim, &map, "H1");
    let o1 = map
        .registry()
        .resolve(k1)
        .and_then(|o| o.downcast::<HostTexture>().ok())
        .expect("O1");
    assert_eq!(o1.bytes, vec![0xFF; 16]);
    assert_eq!(sim.resource_memory_cost(map.handle(), "H1"), Some((0, 16)));
    drop(o1);

    // Unloading K1 releases the host object exactly once.
    assert!(sim.evict(map.handle(), "H1"));
    assert!(map.registry().resolve(k1).is_none());
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_texture_decodes_exact_byte_count() {
    let sim = Arc::new(SimEngine::new());
    let map = data_map(&sim);
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let seen = sizes.clone();
    map.on_load_texture(move |texture: Texture| {
        seen.lock().unwrap().push((
            texture.width * texture.height * texture.components,
            texture.data.len(),
        ));
        Ok::<_, String>(texture)
    });

    sim.queue_texture(map.handle(), "a", TextureSpec::rgba(3, 5, 1));
    let gray = TextureSpec::new(7, 3, 1, geobridge_core::GpuType::UnsignedByte, vec![9; 21]);
    sim.queue_texture(map.handle(), "b", gray);
    map.data_tick().unwrap();

    let sizes = sizes.lock().unwrap();
    assert_eq!(sizes.len(), 2);
    for &(expected, actual) in sizes.iter() {
        assert_eq!(expected as usize, actual);
    }
}

#[test]
fn test_mesh_without_indices_loads() {
    let sim = Arc::new(SimEngine::new());
    let map = data_map(&sim);
    sim.queue_mesh(map.handle(), "strip", MeshSpec::quad().without_indices());
    map.data_tick().unwrap();

    let token = token_of(&sim, &map, "strip");
    let mesh = map
        .registry()
        .resolve(token)
        .and_then(|o| o.downcast::<Mesh>().ok())
        .expect("mesh");
    assert!(mesh.indices.is_empty());
    assert_eq!(mesh.index_count, 0);
    assert_eq!(mesh.vertex_count, 4);
}

#[test]
fn test_narrow_indices_widened() {
    let sim = Arc::new(SimEngine::new());
    let map = data_map(&sim);
    sim.queue_mesh(
        map.handle(),
        "u8",
        MeshSpec::quad().with_indices_u8(&[0, 1, 2, 0, 2, 3]),
    );
    map.data_tick().unwrap();

    let mesh = map
        .registry()
        .resolve(token_of(&sim, &map, "u8"))
        .and_then(|o| o.downcast::<Mesh>().ok())
        .expect("mesh");
    assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    assert_eq!(
        sim.resource_memory_cost(map.handle(), "u8"),
        Some((0, mesh.memory_cost() as u32))
    );
}

#[test]
fn test_second_release_is_lifecycle_error() {
    let sim = Arc::new(SimEngine::new());
    let map = data_map(&sim);
    sim.queue_texture(map.handle(), "t", TextureSpec::rgba(1, 1, 0));
    map.data_tick().unwrap();
    let token = token_of(&sim, &map, "t");

    assert!(sim.evict(map.handle(), "t"));
    assert_eq!(map.registry().release(token), Err(BridgeError::Lifecycle(token.get())));
    let stats = map.registry_stats();
    assert_eq!(stats.live, 0);
    assert_eq!(stats.released, 1);
    assert_eq!(stats.rejected, 1);
}

#[test]
fn test_handler_error_is_callback_fault() {
    let sim = Arc::new(SimEngine::new());
    let map = data_map(&sim);
    map.on_load_texture(|_texture: Texture| Err::<Texture, _>("unsupported format"));
    sim.queue_texture(map.handle(), "bad", TextureSpec::rgba(1, 1, 0));

    let err = map.data_tick().unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(
        err,
        BridgeError::CallbackFault {
            callback: "load_texture",
            reason: "unsupported format".into()
        }
    );
    assert!(map.registry().is_empty());
    assert!(sim.resource_user_data(map.handle(), "bad").is_none());

    // The fault is reported once; the next tick is clean.
    map.data_tick().unwrap();
}

#[test]
fn test_cost_reported_before_handler_runs() {
    let sim = Arc::new(SimEngine::new());
    let map = data_map(&sim);
    map.on_load_texture(|_texture: Texture| Err::<Texture, _>("out of texture units"));
    map.on_load_mesh(|_mesh: Mesh| -> Result<Mesh, String> { panic!("decoder crashed") });
    sim.queue_texture(map.handle(), "rejected", TextureSpec::rgba(2, 2, 0x10));
    sim.queue_mesh(map.handle(), "crashed", MeshSpec::quad());

    assert!(map.data_tick().is_err());
    assert_eq!(sim.resource_memory_cost(map.handle(), "rejected"), Some((0, 16)));
    let (ram, gpu) = sim.resource_memory_cost(map.handle(), "crashed").unwrap();
    assert_eq!(ram, 0);
    assert!(gpu > 0);
    assert!(map.registry().is_empty());
}

#[test]
fn test_handler_panic_does_not_unwind_into_engine() {
    let sim = Arc::new(SimEngine::new());
    let map = data_map(&sim);
    map.on_load_mesh(|_mesh: Mesh| -> Result<Mesh, String> { panic!("decoder crashed") });
    sim.queue_mesh(map.handle(), "m", MeshSpec::quad());

    let err = map.data_tick().unwrap_err();
    match err {
        BridgeError::CallbackFault { callback, reason } => {
            assert_eq!(callback, "load_mesh");
            assert!(reason.contains("decoder crashed"), "{reason}");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(map.registry().is_empty());
}

#[test]
fn test_unknown_sample_type_faults_the_load() {
    let sim = Arc::new(SimEngine::new());
    let map = data_map(&sim);
    sim.queue_texture(
        map.handle(),
        "odd",
        TextureSpec::rgba(1, 1, 0).with_raw_type(0x9999),
    );
    let err = map.data_tick().unwrap_err();
    assert!(matches!(err, BridgeError::CallbackFault { callback: "load_texture", .. }));
}
