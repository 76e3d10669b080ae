//! Process-wide instance table.
//!
//! Engine callbacks carry only the map handle. Each trampoline looks the
//! live [`Instance`] up here by that handle, so several maps (and several
//! engines) can be driven from one process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;

use geobridge_core::engine::{CameraOverride, StateEvent};
use geobridge_core::{
    BridgeError, Boundary, HandleRegistry, HostObject, NativeHandle, ResourceToken,
};
use geobridge_render::{Mesh, Texture};

pub type NotifyHandler = Arc<dyn Fn() + Send + Sync>;
/// Receives a copy of the override block; may rewrite it. The length must
/// be unchanged when the handler returns.
pub type OverrideHandler = Arc<dyn Fn(&mut Vec<f64>) + Send + Sync>;
pub type DistanceHandler = Arc<dyn Fn(&mut f64) + Send + Sync>;
pub type LodHandler = Arc<dyn Fn(&mut u32) + Send + Sync>;
pub type TextureHandler = Arc<dyn Fn(Texture) -> Result<HostObject, String> + Send + Sync>;
pub type MeshHandler = Arc<dyn Fn(Mesh) -> Result<HostObject, String> + Send + Sync>;

/// Host handlers of one map. Cloned out of the lock before they run.
#[derive(Default, Clone)]
pub(crate) struct Handlers {
    pub state: [Option<NotifyHandler>; 2],
    pub overrides: [Option<OverrideHandler>; 6],
    pub colliders_center: Option<OverrideHandler>,
    pub colliders_distance: Option<DistanceHandler>,
    pub colliders_lod: Option<LodHandler>,
    pub texture: Option<TextureHandler>,
    pub mesh: Option<MeshHandler>,
}

/// Everything the callbacks of one map need.
pub(crate) struct Instance {
    pub boundary: Boundary,
    pub map: NativeHandle,
    pub registry: HandleRegistry,
    handlers: Mutex<Handlers>,
    fault: Mutex<Option<BridgeError>>,
    destroyed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Instance {
    pub fn new(boundary: Boundary, map: NativeHandle) -> Self {
        Self {
            boundary,
            map,
            registry: HandleRegistry::new(),
            handlers: Mutex::new(Handlers::default()),
            fault: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn state_handler(&self, event: StateEvent) -> Option<NotifyHandler> {
        lock(&self.handlers).state[event as usize].clone()
    }

    pub fn override_handler(&self, kind: CameraOverride) -> Option<OverrideHandler> {
        lock(&self.handlers).overrides[kind as usize].clone()
    }

    pub fn colliders_center_handler(&self) -> Option<OverrideHandler> {
        lock(&self.handlers).colliders_center.clone()
    }

    pub fn colliders_distance_handler(&self) -> Option<DistanceHandler> {
        lock(&self.handlers).colliders_distance.clone()
    }

    pub fn colliders_lod_handler(&self) -> Option<LodHandler> {
        lock(&self.handlers).colliders_lod.clone()
    }

    pub fn texture_handler(&self) -> Option<TextureHandler> {
        lock(&self.handlers).texture.clone()
    }

    pub fn mesh_handler(&self) -> Option<MeshHandler> {
        lock(&self.handlers).mesh.clone()
    }

    pub fn update_handlers(&self, f: impl FnOnce(&mut Handlers)) {
        f(&mut lock(&self.handlers));
    }

    /// Keep the first fault of a tick; later ones are only logged.
    pub fn record_fault(&self, fault: BridgeError) {
        log::error!("fatal: {fault}");
        let mut slot = lock(&self.fault);
        if slot.is_none() {
            *slot = Some(fault);
        }
    }

    pub fn take_fault(&self) -> Option<BridgeError> {
        lock(&self.fault).take()
    }

    pub fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::Release);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

static INSTANCES: Lazy<Mutex<HashMap<usize, Arc<Instance>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub(crate) fn insert(instance: Arc<Instance>) {
    lock(&INSTANCES).insert(instance.map.addr(), instance);
}

pub(crate) fn lookup(map: usize) -> Option<Arc<Instance>> {
    lock(&INSTANCES).get(&map).cloned()
}

pub(crate) fn remove(map: usize) -> Option<Arc<Instance>> {
    lock(&INSTANCES).remove(&map)
}

/// Number of maps with live callbacks.
pub fn live_instances() -> usize {
    lock(&INSTANCES).len()
}

/// Release a resource token for whichever instance owns it.
///
/// Tokens are unique process-wide, so at most one registry can hold it.
pub(crate) fn release_token(token: ResourceToken) -> geobridge_core::Result<()> {
    let candidates: Vec<Arc<Instance>> = lock(&INSTANCES).values().cloned().collect();
    match candidates.iter().find(|i| i.registry.contains(token)) {
        Some(instance) => instance.registry.release(token),
        None => Err(BridgeError::Lifecycle(token.get())),
    }
}
