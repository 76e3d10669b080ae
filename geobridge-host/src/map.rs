//! `Map`: the host side of one engine map instance.
//!
//! Creating a map registers it in the instance table and binds every
//! callback. Dropping it finalizes whatever is still initialized, removes
//! the instance, clears its registry and finally destroys the engine map.

use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

use geobridge_core::engine::{
    CameraOverride, ColliderOverride, CreditsFormat, EngineApi, StateEvent,
};
use geobridge_core::error::{check_c_string, to_array};
use geobridge_core::{
    Boundary, HandleRegistry, HostObject, NativeHandle, RegistryStats, Result, Srs,
};
use geobridge_render::{Celestial, Mesh, Texture};

use crate::callbacks;
use crate::instances::{self, Instance};
use crate::search::SearchTask;

pub struct Map {
    instance: Arc<Instance>,
    data_active: bool,
    render_active: bool,
}

impl Map {
    /// `create_options` is an opaque JSON object; empty means defaults.
    pub fn new(engine: Arc<dyn EngineApi>, create_options: &str) -> Result<Self> {
        check_c_string(create_options)?;
        let boundary = Boundary::new(engine);
        let handle = boundary.call_handle("map", |e| e.map_create(create_options))?;
        let instance = Arc::new(Instance::new(boundary, handle));
        instances::insert(Arc::clone(&instance));
        let map = Self {
            instance,
            data_active: false,
            render_active: false,
        };
        // On failure `map` drops and tears the half-bound instance down.
        callbacks::bind(map.boundary(), handle)?;
        log::debug!("map {handle:?} created");
        Ok(map)
    }

    pub fn handle(&self) -> NativeHandle {
        self.instance.map
    }

    pub fn boundary(&self) -> &Boundary {
        &self.instance.boundary
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.instance.registry
    }

    pub(crate) fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    pub fn registry_stats(&self) -> RegistryStats {
        self.instance.registry.stats()
    }

    fn call<T>(&self, f: impl FnOnce(&dyn EngineApi, NativeHandle) -> T) -> Result<T> {
        let map = self.instance.map;
        self.instance.boundary.call(|e| f(e, map))
    }

    /// A call that may fire callbacks. A fault raised by a handler takes
    /// precedence over the channel result.
    fn tick(&self, f: impl FnOnce(&dyn EngineApi, NativeHandle)) -> Result<()> {
        let result = self.call(f);
        match self.instance.take_fault() {
            Some(fault) => Err(fault),
            None => result,
        }
    }

    // ── handlers ────────────────────────────────────────────────

    pub fn on_config_available(&self, f: impl Fn() + Send + Sync + 'static) {
        self.instance
            .update_handlers(|h| h.state[StateEvent::ConfigAvailable as usize] = Some(Arc::new(f)));
    }

    pub fn on_config_ready(&self, f: impl Fn() + Send + Sync + 'static) {
        self.instance
            .update_handlers(|h| h.state[StateEvent::ConfigReady as usize] = Some(Arc::new(f)));
    }

    /// Install an override for one camera value block. The handler gets a
    /// copy of [`CameraOverride::len`] values and may rewrite them; changing
    /// the length is a fault.
    pub fn on_camera_override(
        &self,
        kind: CameraOverride,
        f: impl Fn(&mut Vec<f64>) + Send + Sync + 'static,
    ) {
        self.instance
            .update_handlers(|h| h.overrides[kind as usize] = Some(Arc::new(f)));
    }

    pub fn clear_camera_override(&self, kind: CameraOverride) {
        self.instance.update_handlers(|h| h.overrides[kind as usize] = None);
    }

    /// Move the collider traversal focus. The handler gets a copy of the
    /// three physical coordinates; changing the length is a fault.
    pub fn on_colliders_center(&self, f: impl Fn(&mut Vec<f64>) + Send + Sync + 'static) {
        self.instance
            .update_handlers(|h| h.colliders_center = Some(Arc::new(f)));
    }

    pub fn on_colliders_distance(&self, f: impl Fn(&mut f64) + Send + Sync + 'static) {
        self.instance
            .update_handlers(|h| h.colliders_distance = Some(Arc::new(f)));
    }

    pub fn on_colliders_lod(&self, f: impl Fn(&mut u32) + Send + Sync + 'static) {
        self.instance.update_handlers(|h| h.colliders_lod = Some(Arc::new(f)));
    }

    pub fn clear_collider_override(&self, kind: ColliderOverride) {
        self.instance.update_handlers(|h| match kind {
            ColliderOverride::Center => h.colliders_center = None,
            ColliderOverride::Distance => h.colliders_distance = None,
            ColliderOverride::Lod => h.colliders_lod = None,
        });
    }

    /// Convert each decoded texture into the host object the engine will
    /// reference. Without a handler the [`Texture`] itself is kept.
    pub fn on_load_texture<T, E, F>(&self, f: F)
    where
        T: Any + Send + Sync,
        E: Display,
        F: Fn(Texture) -> std::result::Result<T, E> + Send + Sync + 'static,
    {
        let handler = move |texture: Texture| -> std::result::Result<HostObject, String> {
            f(texture).map(|o| Arc::new(o) as HostObject).map_err(|e| e.to_string())
        };
        self.instance.update_handlers(|h| h.texture = Some(Arc::new(handler)));
    }

    pub fn on_load_mesh<T, E, F>(&self, f: F)
    where
        T: Any + Send + Sync,
        E: Display,
        F: Fn(Mesh) -> std::result::Result<T, E> + Send + Sync + 'static,
    {
        let handler = move |mesh: Mesh| -> std::result::Result<HostObject, String> {
            f(mesh).map(|o| Arc::new(o) as HostObject).map_err(|e| e.to_string())
        };
        self.instance.update_handlers(|h| h.mesh = Some(Arc::new(handler)));
    }

    // ── configuration ───────────────────────────────────────────

    pub fn set_config_paths(&self, config: &str, auth: &str, sri: &str) -> Result<()> {
        for value in [config, auth, sri] {
            check_c_string(value)?;
        }
        self.call(|e, m| e.map_set_config_paths(m, config, auth, sri))
    }

    pub fn config_path(&self) -> Result<String> {
        self.call(|e, m| e.map_get_config_path(m))
    }

    pub fn config_available(&self) -> Result<bool> {
        self.call(|e, m| e.map_get_config_available(m))
    }

    pub fn config_ready(&self) -> Result<bool> {
        self.call(|e, m| e.map_get_config_ready(m))
    }

    pub fn render_complete(&self) -> Result<bool> {
        self.call(|e, m| e.map_get_render_complete(m))
    }

    /// Loading progress in `0.0..=1.0`.
    pub fn render_progress(&self) -> Result<f64> {
        self.call(|e, m| e.map_get_render_progress(m))
    }

    // ── frame surface ───────────────────────────────────────────

    pub fn data_initialize(&mut self) -> Result<()> {
        self.tick(|e, m| e.map_data_initialize(m))?;
        self.data_active = true;
        Ok(())
    }

    pub fn data_tick(&self) -> Result<()> {
        self.tick(|e, m| e.map_data_tick(m))
    }

    pub fn data_finalize(&mut self) -> Result<()> {
        self.data_active = false;
        self.tick(|e, m| e.map_data_finalize(m))
    }

    pub fn render_initialize(&mut self) -> Result<()> {
        self.tick(|e, m| e.map_render_initialize(m))?;
        self.render_active = true;
        Ok(())
    }

    pub fn render_tick_prepare(&self, elapsed_seconds: f64) -> Result<()> {
        self.tick(|e, m| e.map_render_tick_prepare(m, elapsed_seconds))
    }

    pub fn render_tick_render(&self) -> Result<()> {
        self.tick(|e, m| e.map_render_tick_render(m))
    }

    /// Traverse collision geometry around the collider focus. The collider
    /// overrides fire from inside this call; nothing happens until the map
    /// config is ready.
    pub fn render_tick_colliders(&self) -> Result<()> {
        self.tick(|e, m| e.map_render_tick_colliders(m))
    }

    /// The engine releases its resources here; their deleters run before
    /// this returns.
    pub fn render_finalize(&mut self) -> Result<()> {
        self.render_active = false;
        self.tick(|e, m| e.map_render_finalize(m))
    }

    pub fn is_data_initialized(&self) -> bool {
        self.data_active
    }

    pub fn is_render_initialized(&self) -> bool {
        self.render_active
    }

    pub fn set_window_size(&self, width: u32, height: u32) -> Result<()> {
        self.call(|e, m| e.map_set_window_size(m, width, height))
    }

    // ── options, statistics, credits ────────────────────────────

    pub fn options(&self) -> Result<String> {
        self.call(|e, m| e.map_get_options(m))
    }

    pub fn set_options(&self, options: &str) -> Result<()> {
        check_c_string(options)?;
        self.call(|e, m| e.map_set_options(m, options))
    }

    pub fn statistics(&self) -> Result<String> {
        self.call(|e, m| e.map_get_statistics(m))
    }

    pub fn credits(&self, format: CreditsFormat) -> Result<String> {
        self.call(|e, m| e.map_get_credits(m, format))
    }

    // ── position ────────────────────────────────────────────────

    pub fn set_position_json(&self, position: &str) -> Result<()> {
        check_c_string(position)?;
        self.call(|e, m| e.map_set_position_json(m, position))
    }

    pub fn set_position_url(&self, position: &str) -> Result<()> {
        check_c_string(position)?;
        self.call(|e, m| e.map_set_position_url(m, position))
    }

    pub fn position_json(&self) -> Result<String> {
        self.call(|e, m| e.map_get_position_json(m))
    }

    pub fn position_url(&self) -> Result<String> {
        self.call(|e, m| e.map_get_position_url(m))
    }

    /// Yaw, pitch, roll of the position after camera rotation
    /// normalization. Zeros until the map config is available.
    pub fn position_rotation_limited(&self) -> Result<[f64; 3]> {
        self.call(|e, m| e.map_get_position_rotation_limited(m))
    }

    pub fn convert(&self, point: &[f64], from: Srs, to: Srs) -> Result<[f64; 3]> {
        let point = to_array::<3>("point", point)?;
        self.call(|e, m| e.map_convert(m, &point, from.into(), to.into()))
    }

    // ── search and celestial body ───────────────────────────────

    pub fn searchable(&self) -> Result<bool> {
        self.call(|e, m| e.map_get_searchable(m))
    }

    /// Start a search; completion is observed with [`SearchTask::poll`].
    pub fn search(&self, query: &str) -> Result<SearchTask> {
        check_c_string(query)?;
        let handle = self
            .boundary()
            .call_handle("search", |e| e.map_search(self.handle(), query))?;
        Ok(SearchTask::new(Arc::clone(&self.instance), handle, query))
    }

    /// Like [`search`](Self::search), with distances measured from `point`
    /// (navigation coordinates).
    pub fn search_at(&self, query: &str, point: &[f64]) -> Result<SearchTask> {
        check_c_string(query)?;
        let point = to_array::<3>("point", point)?;
        let handle = self
            .boundary()
            .call_handle("search", |e| e.map_search_at(self.handle(), query, &point))?;
        Ok(SearchTask::new(Arc::clone(&self.instance), handle, query))
    }

    pub fn celestial(&self) -> Result<Celestial> {
        Celestial::query(self.boundary(), self.registry(), self.handle())
    }
}

impl Drop for Map {
    fn drop(&mut self) {
        let handle = self.handle();
        if self.render_active {
            if let Err(e) = self.render_finalize() {
                log::warn!("render finalize of map {handle:?} failed: {e}");
            }
        }
        if self.data_active {
            if let Err(e) = self.data_finalize() {
                log::warn!("data finalize of map {handle:?} failed: {e}");
            }
        }
        callbacks::unbind(self.boundary(), handle);
        instances::remove(handle.addr());
        self.instance.mark_destroyed();
        let released = self.instance.registry.clear();
        if released > 0 {
            log::debug!("map {handle:?}: released {released} resources still held at teardown");
        }
        if let Err(e) = self.call(|e, m| e.map_destroy(m)) {
            log::warn!("failed to destroy map {handle:?}: {e}");
        }
        log::debug!("map {handle:?} destroyed");
    }
}

impl std::fmt::Debug for Map {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Map")
            .field("handle", &self.handle())
            .field("data_active", &self.data_active)
            .field("render_active", &self.render_active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geobridge_core::BridgeError;
    use geobridge_sim::SimEngine;

    #[test]
    fn test_create_registers_instance() {
        let map = Map::new(Arc::new(SimEngine::new()), "").unwrap();
        assert!(instances::lookup(map.handle().addr()).is_some());
        let addr = map.handle().addr();
        drop(map);
        assert!(instances::lookup(addr).is_none());
    }

    #[test]
    fn test_create_failure_is_boundary_error() {
        let sim = Arc::new(SimEngine::new());
        sim.inject_error("map_create", -101, "map config unavailable");
        let err = Map::new(sim, "").unwrap_err();
        assert_eq!(
            err,
            BridgeError::Boundary {
                code: -101,
                message: "map config unavailable".into()
            }
        );
    }

    #[test]
    fn test_tick_before_initialize_fails() {
        let map = Map::new(Arc::new(SimEngine::new()), "").unwrap();
        assert!(matches!(map.data_tick(), Err(BridgeError::Boundary { code: -20, .. })));
    }

    #[test]
    fn test_convert_checks_shape_first() {
        let map = Map::new(Arc::new(SimEngine::new()), "").unwrap();
        let err = map.convert(&[1.0, 2.0], Srs::Navigation, Srs::Physical).unwrap_err();
        assert!(matches!(err, BridgeError::Shape { expected: 3, actual: 2, .. }));
    }

    #[test]
    fn test_interior_nul_rejected_before_call() {
        let map = Map::new(Arc::new(SimEngine::new()), "").unwrap();
        assert_eq!(map.set_options("{\0}"), Err(BridgeError::InvalidString));
    }

    #[test]
    fn test_drop_destroys_engine_map() {
        let sim = Arc::new(SimEngine::new());
        let mut map = Map::new(sim.clone(), "").unwrap();
        map.data_initialize().unwrap();
        map.render_initialize().unwrap();
        assert_eq!(sim.live_maps(), 1);
        drop(map);
        assert_eq!(sim.live_maps(), 0);
    }
}
