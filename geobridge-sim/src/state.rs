//! Object tables of the simulated engine.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use geobridge_core::engine::{
    CameraOverrideCallback, CollidersCenterCallback, CollidersDistanceCallback,
    CollidersLodCallback, DrawCategory, LogSink, ResourceCallback, ResourceDeleter, StateCallback,
};
use geobridge_core::types::{LogMask, RawCameraBase, RawDrawBase};
use geobridge_core::NativeHandle;
use serde_json::{json, Value};

use crate::math::{Position, Vec3};
use crate::scene::{MeshSpec, SceneTask, TextureSpec};

pub(crate) const ERR_INVALID_ARGUMENT: i32 = -20;
pub(crate) const ERR_OUT_OF_RANGE: i32 = -17;

/// Failure recorded into the error channel.
#[derive(Debug)]
pub(crate) struct Fault(pub i32, pub String);

impl Fault {
    pub fn invalid(what: &str) -> Self {
        Fault(ERR_INVALID_ARGUMENT, format!("invalid {what} handle"))
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Fault(ERR_INVALID_ARGUMENT, message.into())
    }

    pub fn range(what: &str, index: u32, len: usize) -> Self {
        Fault(ERR_OUT_OF_RANGE, format!("{what} index {index} out of range ({len})"))
    }
}

pub(crate) type SimResult<T> = std::result::Result<T, Fault>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoadStatus {
    Pending,
    Loaded,
    /// The load callback returned without attaching user data.
    Rejected,
    Evicted,
}

pub(crate) enum Payload {
    Texture(TextureSpec),
    Mesh(MeshSpec),
}

pub(crate) struct SimResource {
    pub map: usize,
    pub name: String,
    pub payload: Payload,
    pub user_data: usize,
    pub deleter: Option<ResourceDeleter>,
    pub memory: (u32, u32),
    pub status: LoadStatus,
}

impl SimResource {
    pub fn texture(&self) -> SimResult<&TextureSpec> {
        match &self.payload {
            Payload::Texture(spec) => Ok(spec),
            Payload::Mesh(_) => Err(Fault::argument("resource is not a texture")),
        }
    }

    pub fn mesh(&self) -> SimResult<&MeshSpec> {
        match &self.payload {
            Payload::Mesh(spec) => Ok(spec),
            Payload::Texture(_) => Err(Fault::argument("resource is not a mesh")),
        }
    }

    /// Take the user data and deleter for a release.
    pub fn take_deleter(&mut self) -> Option<(ResourceDeleter, usize)> {
        let deleter = self.deleter.take()?;
        let data = std::mem::take(&mut self.user_data);
        Some((deleter, data))
    }
}

#[derive(Default, Clone, Copy)]
pub(crate) struct ColliderCallbacks {
    pub center: Option<CollidersCenterCallback>,
    pub distance: Option<CollidersDistanceCallback>,
    pub lod: Option<CollidersLodCallback>,
}

/// Focus, distance and level of detail of the last collider traversal,
/// after the host overrides ran.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderTraversal {
    pub center: Vec3,
    pub distance: f64,
    pub lod: u32,
}

pub(crate) struct SimMap {
    pub config_path: String,
    pub auth_path: String,
    pub sri_path: String,
    pub config_available: bool,
    pub config_ready: bool,
    pub data_initialized: bool,
    pub render_initialized: bool,
    pub window: (u32, u32),
    pub options: Value,
    pub state_callbacks: [Option<StateCallback>; 2],
    pub override_callbacks: [Option<CameraOverrideCallback>; 6],
    pub collider_callbacks: ColliderCallbacks,
    pub load_callbacks: [Option<ResourceCallback>; 2],
    pub pending: VecDeque<usize>,
    pub names: HashMap<String, usize>,
    pub scenes: HashMap<DrawCategory, Vec<SceneTask>>,
    pub density_texture: Option<String>,
    pub position: Position,
    pub cameras: Vec<usize>,
    pub data_ticks: u64,
    pub render_ticks: u64,
    pub colliders: Option<ColliderTraversal>,
}

impl SimMap {
    pub fn new(create_options: Value) -> Self {
        let mut options = json!({
            "maxResourcesMemory": 512_000_000u64,
            "renderTilesScale": 1.0,
            "debugDetachedCamera": false,
            "cameraNormalization": true,
            "fixedTraversalDistance": 10_000.0,
            "fixedTraversalLod": 15,
        });
        merge(&mut options, create_options);
        Self {
            config_path: String::new(),
            auth_path: String::new(),
            sri_path: String::new(),
            config_available: false,
            config_ready: false,
            data_initialized: false,
            render_initialized: false,
            window: (800, 600),
            options,
            state_callbacks: [None; 2],
            override_callbacks: [None; 6],
            collider_callbacks: ColliderCallbacks::default(),
            load_callbacks: [None; 2],
            pending: VecDeque::new(),
            names: HashMap::new(),
            scenes: HashMap::new(),
            density_texture: None,
            position: Position::default(),
            cameras: Vec::new(),
            data_ticks: 0,
            render_ticks: 0,
            colliders: None,
        }
    }
}

pub(crate) struct SimCamera {
    pub map: usize,
    pub viewport: (u32, u32),
    pub view: Option<(Vec3, Vec3, Vec3)>,
    pub view_matrix: Option<[f64; 16]>,
    pub proj: Option<(f64, f64, f64)>,
    pub proj_matrix: Option<[f64; 16]>,
    pub options: Value,
    pub navigation: Option<usize>,
    pub last_view: (Vec3, Vec3, Vec3),
    pub render_updates: u64,
    /// Stable address handed out by `draws_camera`.
    pub snapshot: Box<RawCameraBase>,
}

impl SimCamera {
    pub fn new(map: usize) -> Self {
        Self {
            map,
            viewport: (0, 0),
            view: None,
            view_matrix: None,
            proj: None,
            proj_matrix: None,
            options: json!({ "lodBlending": 2, "traverseModeSurfaces": "stable" }),
            navigation: None,
            last_view: ([0.0; 3], [0.0; 3], [0.0, 0.0, 1.0]),
            render_updates: 0,
            snapshot: Box::new(bytemuck::Zeroable::zeroed()),
        }
    }
}

pub(crate) struct SimNavigation {
    pub camera: usize,
    pub position: Position,
    pub auto_rotation: f64,
    pub options: Value,
}

#[derive(Debug, Clone)]
pub(crate) struct SearchHit {
    pub title: String,
    pub position: Vec3,
    pub distance: f64,
}

pub(crate) struct SimSearch {
    pub map: usize,
    pub query: String,
    pub origin: Option<Vec3>,
    pub ticks_left: u32,
    pub done: bool,
    pub results: Vec<SearchHit>,
}

/// A draw list handed out by `draws_group`. The boxed slice keeps every
/// detail block at a fixed address until the group is destroyed.
pub(crate) struct SimGroup {
    pub details: Box<[RawDrawBase]>,
    pub handles: Vec<[usize; 3]>,
}

/// Handle values are unique across every engine in the process, like the
/// addresses a native engine hands out.
static NEXT_HANDLE: AtomicUsize = AtomicUsize::new(0x10_000);

pub(crate) struct SimState {
    pub maps: HashMap<usize, SimMap>,
    pub cameras: HashMap<usize, SimCamera>,
    pub navigations: HashMap<usize, SimNavigation>,
    pub searches: HashMap<usize, SimSearch>,
    pub resources: HashMap<usize, SimResource>,
    pub groups: HashMap<usize, SimGroup>,
    pub injected: HashMap<String, Fault>,
    pub log_mask: u32,
    pub sinks: Vec<(u32, LogSink)>,
    pub search_latency: u32,
    pub search_result_count: u32,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            maps: HashMap::new(),
            cameras: HashMap::new(),
            navigations: HashMap::new(),
            searches: HashMap::new(),
            resources: HashMap::new(),
            groups: HashMap::new(),
            injected: HashMap::new(),
            log_mask: LogMask::DEFAULT.0,
            sinks: Vec::new(),
            search_latency: 2,
            search_result_count: 3,
        }
    }
}

impl SimState {
    /// Address-like handle values, never reused.
    pub fn alloc(&mut self) -> usize {
        NEXT_HANDLE.fetch_add(0x10, Ordering::Relaxed)
    }

    pub fn map(&mut self, h: NativeHandle) -> SimResult<&mut SimMap> {
        self.maps.get_mut(&h.addr()).ok_or_else(|| Fault::invalid("map"))
    }

    pub fn camera(&mut self, h: NativeHandle) -> SimResult<&mut SimCamera> {
        self.cameras.get_mut(&h.addr()).ok_or_else(|| Fault::invalid("camera"))
    }

    pub fn navigation(&mut self, h: NativeHandle) -> SimResult<&mut SimNavigation> {
        self.navigations
            .get_mut(&h.addr())
            .ok_or_else(|| Fault::invalid("navigation"))
    }

    pub fn search(&mut self, h: NativeHandle) -> SimResult<&mut SimSearch> {
        self.searches.get_mut(&h.addr()).ok_or_else(|| Fault::invalid("search"))
    }

    pub fn resource(&mut self, h: NativeHandle) -> SimResult<&mut SimResource> {
        self.resources
            .get_mut(&h.addr())
            .ok_or_else(|| Fault::invalid("resource"))
    }

    pub fn group(&mut self, h: NativeHandle) -> SimResult<&mut SimGroup> {
        self.groups.get_mut(&h.addr()).ok_or_else(|| Fault::invalid("draws group"))
    }

    /// User data of the loaded resource queued under `name`, 0 otherwise.
    pub fn user_data_by_name(&self, map: usize, name: &str) -> usize {
        self.maps
            .get(&map)
            .and_then(|m| m.names.get(name))
            .and_then(|h| self.resources.get(h))
            .filter(|r| r.status == LoadStatus::Loaded)
            .map_or(0, |r| r.user_data)
    }

    /// Fixed traversal distance and lod from the map options.
    pub fn fixed_traversal(&self, map: usize) -> (f64, u32) {
        let options = self.maps.get(&map).map(|m| &m.options);
        let option = |key: &str| options.and_then(|o| o.get(key));
        let distance = option("fixedTraversalDistance")
            .and_then(Value::as_f64)
            .unwrap_or(10_000.0);
        let lod = option("fixedTraversalLod")
            .and_then(Value::as_u64)
            .and_then(|l| u32::try_from(l).ok())
            .unwrap_or(15);
        (distance, lod)
    }

    /// Whether rotation normalization is on for this map.
    pub fn camera_normalization(&self, map: usize) -> bool {
        self.maps
            .get(&map)
            .and_then(|m| m.options.get("cameraNormalization"))
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    pub fn count_status(&self, map: usize, status: LoadStatus) -> usize {
        self.resources
            .values()
            .filter(|r| r.map == map && r.status == status)
            .count()
    }
}

/// Shallow merge of a JSON object into another.
pub(crate) fn merge(target: &mut Value, patch: Value) {
    match (target.as_object_mut(), patch) {
        (Some(target), Value::Object(patch)) => {
            for (key, value) in patch {
                target.insert(key, value);
            }
        }
        (_, Value::Null) => {}
        (_, patch) => *target = patch,
    }
}

/// Parse an options string. Empty means "no change".
pub(crate) fn parse_options(text: &str) -> SimResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let value: Value =
        serde_json::from_str(text).map_err(|e| Fault::argument(format!("invalid options: {e}")))?;
    if !value.is_object() {
        return Err(Fault::argument("options must be a JSON object"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overrides_keys() {
        let mut base = json!({ "a": 1, "b": 2 });
        merge(&mut base, json!({ "b": 3, "c": 4 }));
        assert_eq!(base, json!({ "a": 1, "b": 3, "c": 4 }));
        merge(&mut base, Value::Null);
        assert_eq!(base["a"], 1);
    }

    #[test]
    fn test_parse_options_rejects_garbage() {
        assert!(parse_options("").unwrap().is_null());
        assert!(parse_options("{\"x\": 1}").is_ok());
        assert!(parse_options("{x").is_err());
        assert!(parse_options("[1, 2]").is_err());
    }

    #[test]
    fn test_handles_are_never_reused() {
        let mut state = SimState::default();
        let mut other = SimState::default();
        let a = state.alloc();
        let b = other.alloc();
        assert_ne!(a, b);
        assert_ne!(a, 0);
    }
}
