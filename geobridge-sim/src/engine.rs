//! `SimEngine`: an in-process implementation of the engine boundary.
//!
//! All state sits behind one mutex. Callbacks are never invoked while that
//! mutex is held: tick calls collect the due work under the lock, release
//! it, and only then call into the host, so handlers may call back into the
//! engine (resource queries, user data, memory cost).

use std::ffi::{c_void, CString};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use geobridge_core::engine::{
    CameraOverride, CameraOverrideCallback, CollidersCenterCallback, CollidersDistanceCallback,
    CollidersLodCallback, CreditsFormat, DrawCategory, EngineApi, LogSink, ResourceCallback,
    ResourceDeleter, ResourceKind, StateCallback, StateEvent,
};
use geobridge_core::types::{
    DrawRecord, LogMask, RawAttribute, RawBuffer, RawCameraBase, RawDrawBase, Srs,
};
use geobridge_core::NativeHandle;
use serde_json::json;

use crate::math::{
    add, eye_from_view, length, look_at, nav_to_phys, normalize, perspective, phys_to_nav, scale,
    sub, Mat4, Position, Vec3,
};
use crate::scene::{MeshSpec, SceneTask, TextureSpec};
use crate::state::{
    merge, parse_options, ColliderTraversal, Fault, LoadStatus, Payload, SearchHit, SimCamera,
    SimGroup, SimMap, SimNavigation, SimResource, SimResult, SimSearch, SimState,
};

pub const EARTH_MAJOR_RADIUS: f64 = 6_378_137.0;
pub const EARTH_MINOR_RADIUS: f64 = 6_356_752.314_245;

/// Work collected by a data tick, run after the state lock is released.
#[derive(Default)]
struct DataTickWork {
    logs: Vec<(LogMask, String)>,
    events: Vec<StateCallback>,
    loads: Vec<(ResourceCallback, usize)>,
}

/// Camera values computed before the override callbacks run.
struct CameraJob {
    camera: usize,
    eye: Vec3,
    target: Vec3,
    up: Vec3,
    view_matrix: Option<Mat4>,
    fov_aspect_near_far: [f64; 4],
    proj_matrix: Option<Mat4>,
}

/// In-process engine with scripted content.
pub struct SimEngine {
    state: Mutex<SimState>,
    channel: Mutex<(i32, String)>,
    deleter_calls: AtomicUsize,
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            channel: Mutex::new((0, String::new())),
            deleter_calls: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self, fault: Fault) {
        let mut channel = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
        *channel = (fault.0, fault.1);
    }

    /// Run `f` under the state lock. An injected error for `op`, or a fault
    /// returned by `f`, is written to the error channel and yields `None`.
    fn run<T>(&self, op: &str, f: impl FnOnce(&mut SimState) -> SimResult<T>) -> Option<T> {
        let outcome = {
            let mut state = self.state();
            match state.injected.remove(op) {
                Some(fault) => Err(fault),
                None => f(&mut state),
            }
        };
        match outcome {
            Ok(value) => Some(value),
            Err(fault) => {
                log::debug!("sim: {op} failed with {}: {}", fault.0, fault.1);
                self.fail(fault);
                None
            }
        }
    }

    /// Deliver one line to every matching log sink.
    fn emit(&self, level: LogMask, message: &str) {
        let sinks: Vec<LogSink> = {
            let state = self.state();
            if state.log_mask & level.0 == 0 {
                return;
            }
            state
                .sinks
                .iter()
                .filter(|(mask, _)| mask & level.0 != 0)
                .map(|(_, sink)| *sink)
                .collect()
        };
        let Ok(line) = CString::new(message) else {
            return;
        };
        for sink in sinks {
            unsafe { sink(line.as_ptr()) };
        }
    }

    fn call_deleter(&self, (deleter, data): (ResourceDeleter, usize)) {
        self.deleter_calls.fetch_add(1, Ordering::Relaxed);
        unsafe { deleter(data as *mut c_void) };
    }

    // ── scripting ───────────────────────────────────────────────

    /// Make the next call of `op` fail with the given code and message.
    pub fn inject_error(&self, op: &str, code: i32, message: &str) {
        self.state()
            .injected
            .insert(op.to_string(), Fault(code, message.to_string()));
    }

    /// Data ticks a search stays pending.
    pub fn set_search_latency(&self, ticks: u32) {
        self.state().search_latency = ticks;
    }

    pub fn set_search_result_count(&self, count: u32) {
        self.state().search_result_count = count;
    }

    fn queue(&self, map: NativeHandle, name: &str, payload: Payload) -> Option<NativeHandle> {
        let mut state = self.state();
        if !state.maps.contains_key(&map.addr()) {
            return None;
        }
        let handle = state.alloc();
        state.resources.insert(
            handle,
            SimResource {
                map: map.addr(),
                name: name.to_string(),
                payload,
                user_data: 0,
                deleter: None,
                memory: (0, 0),
                status: LoadStatus::Pending,
            },
        );
        let m = state.maps.get_mut(&map.addr())?;
        m.pending.push_back(handle);
        m.names.insert(name.to_string(), handle);
        NativeHandle::from_addr(handle)
    }

    /// Queue a texture; it is offered to the load callback on the next data
    /// tick after the map config is ready.
    pub fn queue_texture(
        &self,
        map: NativeHandle,
        name: &str,
        spec: TextureSpec,
    ) -> Option<NativeHandle> {
        self.queue(map, name, Payload::Texture(spec))
    }

    pub fn queue_mesh(
        &self,
        map: NativeHandle,
        name: &str,
        spec: MeshSpec,
    ) -> Option<NativeHandle> {
        self.queue(map, name, Payload::Mesh(spec))
    }

    /// Drop a loaded resource the way the engine's cache would: the host
    /// deleter runs with the resource's user data.
    pub fn evict(&self, map: NativeHandle, name: &str) -> bool {
        let released = {
            let mut state = self.state();
            let handle = state
                .maps
                .get(&map.addr())
                .and_then(|m| m.names.get(name))
                .copied();
            handle
                .and_then(|h| state.resources.get_mut(&h))
                .filter(|r| r.status == LoadStatus::Loaded)
                .and_then(|r| {
                    r.status = LoadStatus::Evicted;
                    r.take_deleter()
                })
        };
        match released {
            Some(release) => {
                self.call_deleter(release);
                true
            }
            None => false,
        }
    }

    /// Replace the scripted draw list of one category.
    pub fn set_scene(&self, map: NativeHandle, category: DrawCategory, tasks: Vec<SceneTask>) {
        if let Some(m) = self.state().maps.get_mut(&map.addr()) {
            m.scenes.insert(category, tasks);
        }
    }

    pub fn set_density_texture(&self, map: NativeHandle, name: Option<&str>) {
        if let Some(m) = self.state().maps.get_mut(&map.addr()) {
            m.density_texture = name.map(str::to_string);
        }
    }

    /// Draw groups handed out and not yet destroyed.
    pub fn live_groups(&self) -> usize {
        self.state().groups.len()
    }

    pub fn live_searches(&self) -> usize {
        self.state().searches.len()
    }

    pub fn live_maps(&self) -> usize {
        self.state().maps.len()
    }

    /// User data attached to a resource, `None` when nothing is attached.
    pub fn resource_user_data(&self, map: NativeHandle, name: &str) -> Option<usize> {
        let state = self.state();
        let handle = state.maps.get(&map.addr())?.names.get(name)?;
        let data = state.resources.get(handle)?.user_data;
        (data != 0).then_some(data)
    }

    /// `(ram, gpu)` reported for a resource.
    pub fn resource_memory_cost(&self, map: NativeHandle, name: &str) -> Option<(u32, u32)> {
        let state = self.state();
        let handle = state.maps.get(&map.addr())?.names.get(name)?;
        state.resources.get(handle).map(|r| r.memory)
    }

    /// The last collider traversal; `None` before the first one, or when
    /// the last tick ran before the map config was ready.
    pub fn collider_traversal(&self, map: NativeHandle) -> Option<ColliderTraversal> {
        self.state().maps.get(&map.addr()).and_then(|m| m.colliders)
    }

    pub fn pending_resources(&self, map: NativeHandle) -> usize {
        self.state().count_status(map.addr(), LoadStatus::Pending)
    }

    pub fn loaded_resources(&self, map: NativeHandle) -> usize {
        self.state().count_status(map.addr(), LoadStatus::Loaded)
    }

    pub fn deleter_calls(&self) -> usize {
        self.deleter_calls.load(Ordering::Relaxed)
    }

    // ── tick internals ──────────────────────────────────────────

    fn collect_data_tick(state: &mut SimState, map: NativeHandle) -> SimResult<DataTickWork> {
        let result_count = state.search_result_count;
        let m = state.map(map)?;
        if !m.data_initialized {
            return Err(Fault::argument("data tick before data initialize"));
        }
        m.data_ticks += 1;
        let mut work = DataTickWork::default();

        if !m.config_available && !m.config_path.is_empty() {
            m.config_available = true;
            work.events.extend(m.state_callbacks[StateEvent::ConfigAvailable as usize]);
            m.config_ready = true;
            work.events.extend(m.state_callbacks[StateEvent::ConfigReady as usize]);
            work.logs
                .push((LogMask::INFO3, format!("map config ready: {}", m.config_path)));
        }

        let origin = m.position.point;
        let pending: Vec<usize> = if m.config_ready {
            m.pending.drain(..).collect()
        } else {
            Vec::new()
        };
        let load_callbacks = m.load_callbacks;

        let mut kept = Vec::new();
        for handle in pending {
            let Some(resource) = state.resources.get(&handle) else {
                continue;
            };
            let kind = match resource.payload {
                Payload::Texture(_) => ResourceKind::Texture,
                Payload::Mesh(_) => ResourceKind::Mesh,
            };
            match load_callbacks[kind as usize] {
                Some(callback) => work.loads.push((callback, handle)),
                None => kept.push(handle),
            }
        }
        if let Some(m) = state.maps.get_mut(&map.addr()) {
            m.pending.extend(kept);
        }

        for search in state.searches.values_mut() {
            if search.map != map.addr() || search.done {
                continue;
            }
            search.ticks_left = search.ticks_left.saturating_sub(1);
            if search.ticks_left == 0 {
                search.done = true;
                search.results = search_hits(&search.query, origin, search.origin, result_count);
                work.logs.push((
                    LogMask::INFO4,
                    format!(
                        "search '{}' finished with {} results",
                        search.query,
                        search.results.len()
                    ),
                ));
            }
        }
        Ok(work)
    }

    fn finish_load(&self, resource: usize) {
        let line = {
            let mut state = self.state();
            let Some(r) = state.resources.get_mut(&resource) else {
                return;
            };
            if r.status != LoadStatus::Pending {
                return;
            }
            if r.user_data != 0 && r.deleter.is_some() {
                r.status = LoadStatus::Loaded;
                (LogMask::DEBUG, format!("resource {} loaded", r.name))
            } else {
                r.status = LoadStatus::Rejected;
                (LogMask::WARN2, format!("resource {} was not accepted by the host", r.name))
            }
        };
        self.emit(line.0, &line.1);
    }

    fn collect_cameras(
        state: &mut SimState,
        map: NativeHandle,
        elapsed: f64,
    ) -> SimResult<Vec<CameraJob>> {
        let m = state.map(map)?;
        if !m.render_initialized {
            return Err(Fault::argument("render tick before render initialize"));
        }
        let (cameras, map_position, window) = (m.cameras.clone(), m.position, m.window);

        let mut jobs = Vec::with_capacity(cameras.len());
        for id in cameras {
            let nav_id = state.cameras.get(&id).and_then(|c| c.navigation);
            let position = match nav_id.and_then(|n| state.navigations.get_mut(&n)) {
                Some(nav) => {
                    let yaw = nav.position.rotation[0] + nav.auto_rotation * elapsed;
                    nav.position.rotation[0] = yaw % 360.0;
                    nav.position
                }
                None => map_position,
            };
            let Some(camera) = state.cameras.get(&id) else {
                continue;
            };
            let (eye, target, up) = camera
                .view
                .unwrap_or_else(|| position.camera(EARTH_MAJOR_RADIUS));
            let (w, h) = match camera.viewport {
                (0, _) | (_, 0) => window,
                size => size,
            };
            let aspect = if w == 0 || h == 0 { 1.0 } else { w as f64 / h as f64 };
            let (fov, near, far) = camera.proj.unwrap_or_else(|| {
                let (near, far) = suggested_near_far(eye, target);
                (position.fov, near, far)
            });
            jobs.push(CameraJob {
                camera: id,
                eye,
                target,
                up,
                view_matrix: camera.view_matrix,
                fov_aspect_near_far: [fov, aspect, near, far],
                proj_matrix: camera.proj_matrix,
            });
        }
        Ok(jobs)
    }

    /// Apply the override callbacks to one camera, in engine order: eye,
    /// target, up, view, fov/aspect/near/far, projection.
    fn run_overrides(
        map: NativeHandle,
        callbacks: &[Option<CameraOverrideCallback>; 6],
        job: CameraJob,
    ) -> (usize, (Vec3, Vec3, Vec3), RawCameraBase) {
        let invoke = |kind: CameraOverride, values: &mut [f64]| {
            if let Some(callback) = callbacks[kind as usize] {
                debug_assert_eq!(values.len(), kind.len());
                unsafe { callback(map.as_ptr(), values.as_mut_ptr()) };
            }
        };
        let CameraJob {
            camera,
            mut eye,
            mut target,
            mut up,
            view_matrix,
            mut fov_aspect_near_far,
            proj_matrix,
        } = job;

        invoke(CameraOverride::Eye, &mut eye);
        invoke(CameraOverride::Target, &mut target);
        invoke(CameraOverride::Up, &mut up);

        let mut view = match view_matrix {
            Some(view) => {
                eye = eye_from_view(&view);
                view
            }
            None => look_at(eye, target, up),
        };
        let before = view;
        invoke(CameraOverride::View, &mut view);
        if view != before {
            eye = eye_from_view(&view);
        }

        invoke(CameraOverride::FovAspectNearFar, &mut fov_aspect_near_far);
        let [fov, aspect, near, far] = fov_aspect_near_far;
        let mut proj = proj_matrix.unwrap_or_else(|| perspective(fov, aspect, near, far));
        invoke(CameraOverride::Proj, &mut proj);

        let snapshot = RawCameraBase {
            view,
            proj,
            eye,
            near,
            far,
            aspect,
            fov,
            map_projected: 0,
            _pad: [0; 7],
        };
        (camera, (eye, target, up), snapshot)
    }

    fn release_loaded(state: &mut SimState, map: usize) -> Vec<(ResourceDeleter, usize)> {
        let mut released = Vec::new();
        for r in state.resources.values_mut() {
            if r.map == map && r.status == LoadStatus::Loaded {
                if let Some(release) = r.take_deleter() {
                    released.push(release);
                }
                r.status = LoadStatus::Evicted;
            }
        }
        released
    }
}

fn suggested_near_far(eye: Vec3, target: Vec3) -> (f64, f64) {
    let distance = length(sub(target, eye));
    let near = (distance * 0.05).max(1.0);
    let far = distance * 10.0 + EARTH_MAJOR_RADIUS * 0.1;
    (near, far)
}

fn search_hits(query: &str, around: Vec3, origin: Option<Vec3>, count: u32) -> Vec<SearchHit> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    (0..count)
        .map(|i| {
            let offset = 0.01 * i as f64;
            let position = [around[0] + offset, around[1] + offset, 0.0];
            SearchHit {
                title: format!("{query} #{}", i + 1),
                position,
                distance: distance_between(position, origin),
            }
        })
        .collect()
}

fn distance_between(position: Vec3, origin: Option<Vec3>) -> f64 {
    origin.map_or(0.0, |o| {
        length(sub(
            nav_to_phys(position, EARTH_MAJOR_RADIUS),
            nav_to_phys(o, EARTH_MAJOR_RADIUS),
        ))
    })
}

fn to_phys(point: Vec3, srs: Srs) -> Vec3 {
    match srs {
        Srs::Physical | Srs::Custom1 | Srs::Custom2 => point,
        Srs::Navigation | Srs::Public | Srs::Search => nav_to_phys(point, EARTH_MAJOR_RADIUS),
    }
}

fn from_phys(point: Vec3, srs: Srs) -> Vec3 {
    match srs {
        Srs::Physical | Srs::Custom1 | Srs::Custom2 => point,
        Srs::Navigation | Srs::Public | Srs::Search => phys_to_nav(point, EARTH_MAJOR_RADIUS),
    }
}

fn credits(format: CreditsFormat) -> String {
    match format {
        CreditsFormat::Plain => "© SimEngine".to_string(),
        CreditsFormat::Short => "SimEngine".to_string(),
        CreditsFormat::Full => "© SimEngine contributors, simulated terrain".to_string(),
    }
}

fn check_fov(fov: f64) -> SimResult<()> {
    if fov > 1e-3 && fov < 180.0 - 1e-3 {
        Ok(())
    } else {
        Err(Fault::argument(format!("fov {fov} out of range")))
    }
}

impl EngineApi for SimEngine {
    fn err_code(&self) -> i32 {
        self.channel.lock().unwrap_or_else(PoisonError::into_inner).0
    }

    fn err_msg(&self) -> String {
        self.channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .1
            .clone()
    }

    fn err_clear(&self) {
        *self.channel.lock().unwrap_or_else(PoisonError::into_inner) = (0, String::new());
    }

    fn log_set_mask(&self, mask: u32) {
        self.state().log_mask = mask;
    }

    fn log_add_sink(&self, mask: u32, sink: LogSink) {
        self.state().sinks.push((mask, sink));
    }

    fn log_clear_sinks(&self) {
        self.state().sinks.clear();
    }

    fn log(&self, level: u32, message: &str) {
        self.emit(LogMask(level), message);
    }

    // ── map ─────────────────────────────────────────────────────

    fn map_create(&self, create_options: &str) -> Option<NativeHandle> {
        self.run("map_create", |s| {
            let options = parse_options(create_options)?;
            let handle = s.alloc();
            s.maps.insert(handle, SimMap::new(options));
            Ok(handle)
        })
        .and_then(NativeHandle::from_addr)
    }

    fn map_destroy(&self, map: NativeHandle) {
        let released = self.run("map_destroy", |s| {
            let m = s.maps.remove(&map.addr()).ok_or_else(|| Fault::invalid("map"))?;
            for id in &m.cameras {
                if let Some(nav) = s.cameras.remove(id).and_then(|c| c.navigation) {
                    s.navigations.remove(&nav);
                }
            }
            s.searches.retain(|_, search| search.map != map.addr());
            let owned: Vec<usize> = s
                .resources
                .iter()
                .filter(|(_, r)| r.map == map.addr())
                .map(|(h, _)| *h)
                .collect();
            let mut released = Vec::new();
            for handle in owned {
                let removed = s.resources.remove(&handle);
                if let Some(release) = removed.and_then(|mut r| r.take_deleter()) {
                    released.push(release);
                }
            }
            Ok(released)
        });
        for release in released.unwrap_or_default() {
            self.call_deleter(release);
        }
    }

    fn map_set_config_paths(&self, map: NativeHandle, config: &str, auth: &str, sri: &str) {
        self.run("map_set_config_paths", |s| {
            let m = s.map(map)?;
            m.config_path = config.to_string();
            m.auth_path = auth.to_string();
            m.sri_path = sri.to_string();
            m.config_available = false;
            m.config_ready = false;
            Ok(())
        });
    }

    fn map_get_config_path(&self, map: NativeHandle) -> String {
        self.run("map_get_config_path", |s| Ok(s.map(map)?.config_path.clone()))
            .unwrap_or_default()
    }

    fn map_get_config_available(&self, map: NativeHandle) -> bool {
        self.run("map_get_config_available", |s| Ok(s.map(map)?.config_available))
            .unwrap_or_default()
    }

    fn map_get_config_ready(&self, map: NativeHandle) -> bool {
        self.run("map_get_config_ready", |s| Ok(s.map(map)?.config_ready))
            .unwrap_or_default()
    }

    fn map_get_render_complete(&self, map: NativeHandle) -> bool {
        self.run("map_get_render_complete", |s| {
            let m = s.map(map)?;
            Ok(m.config_ready && m.pending.is_empty() && m.render_ticks > 0)
        })
        .unwrap_or_default()
    }

    fn map_get_render_progress(&self, map: NativeHandle) -> f64 {
        self.run("map_get_render_progress", |s| {
            let ready = s.map(map)?.config_ready;
            let loaded = s.count_status(map.addr(), LoadStatus::Loaded);
            let pending = s.count_status(map.addr(), LoadStatus::Pending);
            Ok(match (ready, loaded + pending) {
                (false, _) => 0.0,
                (true, 0) => 1.0,
                (true, total) => loaded as f64 / total as f64,
            })
        })
        .unwrap_or_default()
    }

    fn map_data_initialize(&self, map: NativeHandle) {
        self.run("map_data_initialize", |s| {
            s.map(map)?.data_initialized = true;
            Ok(())
        });
    }

    fn map_data_tick(&self, map: NativeHandle) {
        let Some(work) = self.run("map_data_tick", |s| Self::collect_data_tick(s, map)) else {
            return;
        };
        for (level, line) in &work.logs {
            self.emit(*level, line);
        }
        for callback in work.events {
            unsafe { callback(map.as_ptr()) };
        }
        for (callback, resource) in work.loads {
            unsafe { callback(map.as_ptr(), resource as *mut c_void) };
            self.finish_load(resource);
        }
    }

    fn map_data_finalize(&self, map: NativeHandle) {
        self.run("map_data_finalize", |s| {
            s.map(map)?.data_initialized = false;
            Ok(())
        });
    }

    fn map_render_initialize(&self, map: NativeHandle) {
        self.run("map_render_initialize", |s| {
            s.map(map)?.render_initialized = true;
            Ok(())
        });
    }

    fn map_render_tick_prepare(&self, map: NativeHandle, elapsed_seconds: f64) {
        let Some((jobs, callbacks)) = self.run("map_render_tick_prepare", |s| {
            let jobs = Self::collect_cameras(s, map, elapsed_seconds)?;
            Ok((jobs, s.map(map)?.override_callbacks))
        }) else {
            return;
        };
        for job in jobs {
            let (camera, last_view, snapshot) = Self::run_overrides(map, &callbacks, job);
            if let Some(c) = self.state().cameras.get_mut(&camera) {
                c.last_view = last_view;
                *c.snapshot = snapshot;
            }
        }
    }

    fn map_render_tick_render(&self, map: NativeHandle) {
        self.run("map_render_tick_render", |s| {
            let m = s.map(map)?;
            if !m.render_initialized {
                return Err(Fault::argument("render tick before render initialize"));
            }
            m.render_ticks += 1;
            Ok(())
        });
    }

    fn map_render_tick_colliders(&self, map: NativeHandle) {
        let due = self.run("map_render_tick_colliders", |s| {
            let m = s.map(map)?;
            if !m.config_ready {
                m.colliders = None;
                return Ok(None);
            }
            let callbacks = m.collider_callbacks;
            Ok(Some((callbacks, s.fixed_traversal(map.addr()))))
        });
        let Some(Some((callbacks, (mut distance, mut lod)))) = due else {
            return;
        };
        // Focus at the origin, then center, distance and lod overrides.
        let mut center = [0.0; 3];
        if let Some(callback) = callbacks.center {
            unsafe { callback(map.as_ptr(), center.as_mut_ptr()) };
        }
        if let Some(callback) = callbacks.distance {
            unsafe { callback(map.as_ptr(), &mut distance) };
        }
        if let Some(callback) = callbacks.lod {
            unsafe { callback(map.as_ptr(), &mut lod) };
        }
        if let Some(m) = self.state().maps.get_mut(&map.addr()) {
            m.colliders = Some(ColliderTraversal {
                center,
                distance,
                lod,
            });
        }
    }

    fn map_render_finalize(&self, map: NativeHandle) {
        let released = self.run("map_render_finalize", |s| {
            s.map(map)?.render_initialized = false;
            Ok(Self::release_loaded(s, map.addr()))
        });
        for release in released.unwrap_or_default() {
            self.call_deleter(release);
        }
    }

    fn map_set_window_size(&self, map: NativeHandle, width: u32, height: u32) {
        self.run("map_set_window_size", |s| {
            s.map(map)?.window = (width, height);
            Ok(())
        });
    }

    fn map_get_options(&self, map: NativeHandle) -> String {
        self.run("map_get_options", |s| Ok(s.map(map)?.options.to_string()))
            .unwrap_or_default()
    }

    fn map_set_options(&self, map: NativeHandle, options: &str) {
        self.run("map_set_options", |s| {
            let patch = parse_options(options)?;
            merge(&mut s.map(map)?.options, patch);
            Ok(())
        });
    }

    fn map_get_statistics(&self, map: NativeHandle) -> String {
        self.run("map_get_statistics", |s| {
            let (data_ticks, render_ticks) = {
                let m = s.map(map)?;
                (m.data_ticks, m.render_ticks)
            };
            Ok(json!({
                "dataTicks": data_ticks,
                "renderTicks": render_ticks,
                "resourcesPending": s.count_status(map.addr(), LoadStatus::Pending),
                "resourcesLoaded": s.count_status(map.addr(), LoadStatus::Loaded),
                "resourcesEvicted": s.count_status(map.addr(), LoadStatus::Evicted),
            })
            .to_string())
        })
        .unwrap_or_default()
    }

    fn map_get_credits(&self, map: NativeHandle, format: CreditsFormat) -> String {
        self.run("map_get_credits", |s| {
            s.map(map)?;
            Ok(credits(format))
        })
        .unwrap_or_default()
    }

    fn map_set_position_json(&self, map: NativeHandle, position: &str) {
        self.run("map_set_position_json", |s| {
            let parsed: Position = serde_json::from_str(position)
                .map_err(|e| Fault::argument(format!("invalid position: {e}")))?;
            s.map(map)?.position = parsed;
            Ok(())
        });
    }

    fn map_set_position_url(&self, map: NativeHandle, position: &str) {
        self.run("map_set_position_url", |s| {
            let parsed = Position::from_url(position)
                .ok_or_else(|| Fault::argument(format!("invalid position url '{position}'")))?;
            s.map(map)?.position = parsed;
            Ok(())
        });
    }

    fn map_get_position_json(&self, map: NativeHandle) -> String {
        self.run("map_get_position_json", |s| {
            serde_json::to_string(&s.map(map)?.position).map_err(|e| Fault::argument(e.to_string()))
        })
        .unwrap_or_default()
    }

    fn map_get_position_url(&self, map: NativeHandle) -> String {
        self.run("map_get_position_url", |s| Ok(s.map(map)?.position.to_url()))
            .unwrap_or_default()
    }

    fn map_get_position_rotation_limited(&self, map: NativeHandle) -> [f64; 3] {
        self.run("map_get_position_rotation_limited", |s| {
            let normalization = s.camera_normalization(map.addr());
            let m = s.map(map)?;
            Ok(match (m.config_available, normalization) {
                (false, _) => [0.0; 3],
                (true, true) => m.position.rotation_limited(EARTH_MAJOR_RADIUS),
                (true, false) => m.position.rotation,
            })
        })
        .unwrap_or_default()
    }

    fn map_convert(
        &self,
        map: NativeHandle,
        point: &[f64; 3],
        srs_from: u32,
        srs_to: u32,
    ) -> [f64; 3] {
        self.run("map_convert", |s| {
            s.map(map)?;
            let from = Srs::try_from(srs_from).map_err(|e| Fault::argument(e.to_string()))?;
            let to = Srs::try_from(srs_to).map_err(|e| Fault::argument(e.to_string()))?;
            Ok(from_phys(to_phys(*point, from), to))
        })
        .unwrap_or_default()
    }

    fn map_get_searchable(&self, map: NativeHandle) -> bool {
        self.run("map_get_searchable", |s| Ok(s.map(map)?.config_ready))
            .unwrap_or_default()
    }

    fn map_search(&self, map: NativeHandle, query: &str) -> Option<NativeHandle> {
        self.run("map_search", |s| start_search(s, map, query, None))
            .and_then(NativeHandle::from_addr)
    }

    fn map_search_at(
        &self,
        map: NativeHandle,
        query: &str,
        point: &[f64; 3],
    ) -> Option<NativeHandle> {
        self.run("map_search_at", |s| start_search(s, map, query, Some(*point)))
            .and_then(NativeHandle::from_addr)
    }

    // ── celestial ───────────────────────────────────────────────

    fn celestial_name(&self, map: NativeHandle) -> String {
        self.run("celestial_name", |s| {
            s.map(map)?;
            Ok("Earth".to_string())
        })
        .unwrap_or_default()
    }

    fn celestial_major_radius(&self, map: NativeHandle) -> f64 {
        self.run("celestial_major_radius", |s| {
            s.map(map)?;
            Ok(EARTH_MAJOR_RADIUS)
        })
        .unwrap_or_default()
    }

    fn celestial_minor_radius(&self, map: NativeHandle) -> f64 {
        self.run("celestial_minor_radius", |s| {
            s.map(map)?;
            Ok(EARTH_MINOR_RADIUS)
        })
        .unwrap_or_default()
    }

    fn celestial_atmosphere(
        &self,
        map: NativeHandle,
        colors: &mut [f32; 8],
        parameters: &mut [f64; 5],
    ) {
        let ok = self.run("celestial_atmosphere", |s| {
            s.map(map)?;
            Ok(())
        });
        if ok.is_some() {
            *colors = [0.62, 0.79, 1.0, 1.0, 0.16, 0.36, 0.82, 1.0];
            *parameters = [0.3, 100_000.0, 1e-4, 200_000.0, 1e-2];
        }
    }

    fn draws_atmosphere_density_texture(&self, map: NativeHandle) -> *mut c_void {
        self.run("draws_atmosphere_density_texture", |s| {
            let name = s.map(map)?.density_texture.clone();
            Ok(name.map_or(0, |n| s.user_data_by_name(map.addr(), &n)))
        })
        .unwrap_or_default() as *mut c_void
    }

    // ── callbacks ───────────────────────────────────────────────

    fn callbacks_state(
        &self,
        map: NativeHandle,
        event: StateEvent,
        callback: Option<StateCallback>,
    ) {
        self.run("callbacks_state", |s| {
            s.map(map)?.state_callbacks[event as usize] = callback;
            Ok(())
        });
    }

    fn callbacks_camera_override(
        &self,
        map: NativeHandle,
        kind: CameraOverride,
        callback: Option<CameraOverrideCallback>,
    ) {
        self.run("callbacks_camera_override", |s| {
            s.map(map)?.override_callbacks[kind as usize] = callback;
            Ok(())
        });
    }

    fn callbacks_colliders_center(
        &self,
        map: NativeHandle,
        callback: Option<CollidersCenterCallback>,
    ) {
        self.run("callbacks_colliders_center", |s| {
            s.map(map)?.collider_callbacks.center = callback;
            Ok(())
        });
    }

    fn callbacks_colliders_distance(
        &self,
        map: NativeHandle,
        callback: Option<CollidersDistanceCallback>,
    ) {
        self.run("callbacks_colliders_distance", |s| {
            s.map(map)?.collider_callbacks.distance = callback;
            Ok(())
        });
    }

    fn callbacks_colliders_lod(&self, map: NativeHandle, callback: Option<CollidersLodCallback>) {
        self.run("callbacks_colliders_lod", |s| {
            s.map(map)?.collider_callbacks.lod = callback;
            Ok(())
        });
    }

    fn callbacks_load(
        &self,
        map: NativeHandle,
        kind: ResourceKind,
        callback: Option<ResourceCallback>,
    ) {
        self.run("callbacks_load", |s| {
            s.map(map)?.load_callbacks[kind as usize] = callback;
            Ok(())
        });
    }

    // ── resources ───────────────────────────────────────────────

    fn resource_set_user_data(
        &self,
        resource: NativeHandle,
        data: *mut c_void,
        deleter: ResourceDeleter,
    ) {
        self.run("resource_set_user_data", |s| {
            let r = s.resource(resource)?;
            if r.status != LoadStatus::Pending {
                return Err(Fault::argument("user data can only be set while loading"));
            }
            r.user_data = data as usize;
            r.deleter = Some(deleter);
            Ok(())
        });
    }

    fn resource_set_memory_cost(&self, resource: NativeHandle, ram: u32, gpu: u32) {
        self.run("resource_set_memory_cost", |s| {
            s.resource(resource)?.memory = (ram, gpu);
            Ok(())
        });
    }

    fn texture_get_resolution(&self, resource: NativeHandle) -> (u32, u32, u32) {
        self.run("texture_get_resolution", |s| {
            let t = s.resource(resource)?.texture()?;
            Ok((t.width, t.height, t.components))
        })
        .unwrap_or_default()
    }

    fn texture_get_type(&self, resource: NativeHandle) -> u32 {
        self.run("texture_get_type", |s| Ok(s.resource(resource)?.texture()?.gpu_type))
            .unwrap_or_default()
    }

    fn texture_get_filter_mode(&self, resource: NativeHandle) -> u32 {
        self.run("texture_get_filter_mode", |s| Ok(s.resource(resource)?.texture()?.filter_mode))
            .unwrap_or_default()
    }

    fn texture_get_wrap_mode(&self, resource: NativeHandle) -> u32 {
        self.run("texture_get_wrap_mode", |s| Ok(s.resource(resource)?.texture()?.wrap_mode))
            .unwrap_or_default()
    }

    fn texture_get_buffer(&self, resource: NativeHandle) -> RawBuffer {
        self.run("texture_get_buffer", |s| {
            let t = s.resource(resource)?.texture()?;
            Ok(if t.null_buffer {
                RawBuffer {
                    data: ptr::null(),
                    size: t.width * t.height * t.components,
                    count: 0,
                }
            } else {
                RawBuffer {
                    data: t.data.as_ptr(),
                    size: t.data.len() as u32,
                    count: 0,
                }
            })
        })
        .unwrap_or(RawBuffer::empty())
    }

    fn mesh_get_face_mode(&self, resource: NativeHandle) -> u32 {
        self.run("mesh_get_face_mode", |s| Ok(s.resource(resource)?.mesh()?.face_mode))
            .unwrap_or_default()
    }

    fn mesh_get_vertices(&self, resource: NativeHandle) -> RawBuffer {
        self.run("mesh_get_vertices", |s| {
            let m = s.resource(resource)?.mesh()?;
            Ok(RawBuffer {
                data: m.vertices.as_ptr(),
                size: m.vertices.len() as u32,
                count: m.vertex_count,
            })
        })
        .unwrap_or(RawBuffer::empty())
    }

    fn mesh_get_indices(&self, resource: NativeHandle) -> RawBuffer {
        self.run("mesh_get_indices", |s| {
            let m = s.resource(resource)?.mesh()?;
            Ok(RawBuffer {
                data: m.indices.as_ptr(),
                size: m.indices.len() as u32,
                count: m.index_count,
            })
        })
        .unwrap_or(RawBuffer::empty())
    }

    fn mesh_get_attribute(&self, resource: NativeHandle, index: u32) -> RawAttribute {
        self.run("mesh_get_attribute", |s| {
            let m = s.resource(resource)?.mesh()?;
            m.attributes
                .get(index as usize)
                .copied()
                .ok_or_else(|| Fault::range("attribute", index, m.attributes.len()))
        })
        .unwrap_or_default()
    }

    // ── camera ──────────────────────────────────────────────────

    fn camera_create(&self, map: NativeHandle) -> Option<NativeHandle> {
        self.run("camera_create", |s| {
            s.map(map)?;
            let handle = s.alloc();
            s.cameras.insert(handle, SimCamera::new(map.addr()));
            s.map(map)?.cameras.push(handle);
            Ok(handle)
        })
        .and_then(NativeHandle::from_addr)
    }

    fn camera_destroy(&self, camera: NativeHandle) {
        self.run("camera_destroy", |s| {
            let c = s
                .cameras
                .remove(&camera.addr())
                .ok_or_else(|| Fault::invalid("camera"))?;
            if let Some(nav) = c.navigation {
                s.navigations.remove(&nav);
            }
            if let Some(m) = s.maps.get_mut(&c.map) {
                m.cameras.retain(|&id| id != camera.addr());
            }
            Ok(())
        });
    }

    fn camera_set_viewport_size(&self, camera: NativeHandle, width: u32, height: u32) {
        self.run("camera_set_viewport_size", |s| {
            s.camera(camera)?.viewport = (width, height);
            Ok(())
        });
    }

    fn camera_get_viewport_size(&self, camera: NativeHandle) -> (u32, u32) {
        self.run("camera_get_viewport_size", |s| Ok(s.camera(camera)?.viewport))
            .unwrap_or_default()
    }

    fn camera_set_view(
        &self,
        camera: NativeHandle,
        eye: &[f64; 3],
        target: &[f64; 3],
        up: &[f64; 3],
    ) {
        self.run("camera_set_view", |s| {
            if length(sub(*target, *eye)) < 1e-7 || length(*up) < 1e-7 {
                return Err(Fault::argument("degenerate view"));
            }
            let c = s.camera(camera)?;
            c.view = Some((*eye, *target, *up));
            c.view_matrix = None;
            Ok(())
        });
    }

    fn camera_set_view_matrix(&self, camera: NativeHandle, view: &[f64; 16]) {
        self.run("camera_set_view_matrix", |s| {
            let c = s.camera(camera)?;
            c.view_matrix = Some(*view);
            c.view = None;
            Ok(())
        });
    }

    fn camera_set_proj(&self, camera: NativeHandle, fovy_degrees: f64, near: f64, far: f64) {
        self.run("camera_set_proj", |s| {
            check_fov(fovy_degrees)?;
            if !(near > 0.0 && far > near) {
                return Err(Fault::argument(format!("invalid near/far {near}/{far}")));
            }
            let c = s.camera(camera)?;
            c.proj = Some((fovy_degrees, near, far));
            c.proj_matrix = None;
            Ok(())
        });
    }

    fn camera_set_proj_matrix(&self, camera: NativeHandle, proj: &[f64; 16]) {
        self.run("camera_set_proj_matrix", |s| {
            let c = s.camera(camera)?;
            c.proj_matrix = Some(*proj);
            Ok(())
        });
    }

    fn camera_get_view(&self, camera: NativeHandle) -> [[f64; 3]; 3] {
        self.run("camera_get_view", |s| {
            let (eye, target, up) = s.camera(camera)?.last_view;
            Ok([eye, target, up])
        })
        .unwrap_or_default()
    }

    fn camera_get_view_matrix(&self, camera: NativeHandle) -> [f64; 16] {
        self.run("camera_get_view_matrix", |s| Ok(s.camera(camera)?.snapshot.view))
            .unwrap_or([0.0; 16])
    }

    fn camera_get_proj_matrix(&self, camera: NativeHandle) -> [f64; 16] {
        self.run("camera_get_proj_matrix", |s| Ok(s.camera(camera)?.snapshot.proj))
            .unwrap_or([0.0; 16])
    }

    fn camera_suggested_near_far(&self, camera: NativeHandle) -> (f64, f64) {
        self.run("camera_suggested_near_far", |s| {
            let (eye, target, _) = s.camera(camera)?.last_view;
            Ok(suggested_near_far(eye, target))
        })
        .unwrap_or_default()
    }

    fn camera_render_update(&self, camera: NativeHandle) {
        self.run("camera_render_update", |s| {
            s.camera(camera)?.render_updates += 1;
            Ok(())
        });
    }

    fn camera_get_options(&self, camera: NativeHandle) -> String {
        self.run("camera_get_options", |s| Ok(s.camera(camera)?.options.to_string()))
            .unwrap_or_default()
    }

    fn camera_set_options(&self, camera: NativeHandle, options: &str) {
        self.run("camera_set_options", |s| {
            let patch = parse_options(options)?;
            merge(&mut s.camera(camera)?.options, patch);
            Ok(())
        });
    }

    fn camera_get_statistics(&self, camera: NativeHandle) -> String {
        self.run("camera_get_statistics", |s| {
            let c = s.camera(camera)?;
            Ok(json!({
                "renderUpdates": c.render_updates,
                "viewport": [c.viewport.0, c.viewport.1],
            })
            .to_string())
        })
        .unwrap_or_default()
    }

    fn camera_get_credits(&self, camera: NativeHandle, format: CreditsFormat) -> String {
        self.run("camera_get_credits", |s| {
            s.camera(camera)?;
            Ok(credits(format))
        })
        .unwrap_or_default()
    }

    // ── draws ───────────────────────────────────────────────────

    fn draws_camera(&self, camera: NativeHandle) -> *const RawCameraBase {
        self.run("draws_camera", |s| {
            let c = s.camera(camera)?;
            Ok(&*c.snapshot as *const RawCameraBase)
        })
        .unwrap_or(ptr::null())
    }

    fn draws_group(&self, camera: NativeHandle, category: DrawCategory) -> Option<NativeHandle> {
        self.run("draws_group", |s| {
            let map = s.camera(camera)?.map;
            let tasks = s
                .maps
                .get(&map)
                .and_then(|m| m.scenes.get(&category))
                .cloned()
                .unwrap_or_default();
            let details: Box<[RawDrawBase]> = tasks.iter().map(|t| t.detail).collect();
            let by_name = |name: Option<&String>| name.map_or(0, |n| s.user_data_by_name(map, n));
            let handles = tasks
                .iter()
                .map(|t| {
                    [
                        by_name(Some(&t.mesh)),
                        by_name(t.tex_color.as_ref()),
                        by_name(t.tex_mask.as_ref()),
                    ]
                })
                .collect();
            let handle = s.alloc();
            s.groups.insert(handle, SimGroup { details, handles });
            Ok(handle)
        })
        .and_then(NativeHandle::from_addr)
    }

    fn draws_count(&self, group: NativeHandle) -> u32 {
        self.run("draws_count", |s| Ok(s.group(group)?.handles.len() as u32))
            .unwrap_or_default()
    }

    fn draws_all_in_one(&self, group: NativeHandle, index: u32) -> DrawRecord {
        self.run("draws_all_in_one", |s| {
            let g = s.group(group)?;
            let i = index as usize;
            let (Some(detail), Some(handles)) = (g.details.get(i), g.handles.get(i)) else {
                return Err(Fault::range("draw", index, g.handles.len()));
            };
            Ok(DrawRecord {
                detail: detail as *const RawDrawBase,
                mesh: handles[0] as *mut c_void,
                tex_color: handles[1] as *mut c_void,
                tex_mask: handles[2] as *mut c_void,
            })
        })
        .unwrap_or(DrawRecord {
            detail: ptr::null(),
            mesh: ptr::null_mut(),
            tex_color: ptr::null_mut(),
            tex_mask: ptr::null_mut(),
        })
    }

    fn draws_destroy(&self, group: NativeHandle) {
        self.run("draws_destroy", |s| {
            s.groups
                .remove(&group.addr())
                .map(drop)
                .ok_or_else(|| Fault::invalid("draws group"))
        });
    }

    // ── navigation ──────────────────────────────────────────────

    fn navigation_create(&self, camera: NativeHandle) -> Option<NativeHandle> {
        self.run("navigation_create", |s| {
            let map = s.camera(camera)?.map;
            let position = s.maps.get(&map).map(|m| m.position).unwrap_or_default();
            let handle = s.alloc();
            s.navigations.insert(
                handle,
                SimNavigation {
                    camera: camera.addr(),
                    position,
                    auto_rotation: 0.0,
                    options: json!({ "navigationType": "quick", "inertiaPan": 0.8 }),
                },
            );
            s.camera(camera)?.navigation = Some(handle);
            Ok(handle)
        })
        .and_then(NativeHandle::from_addr)
    }

    fn navigation_destroy(&self, nav: NativeHandle) {
        self.run("navigation_destroy", |s| {
            let n = s
                .navigations
                .remove(&nav.addr())
                .ok_or_else(|| Fault::invalid("navigation"))?;
            if let Some(c) = s.cameras.get_mut(&n.camera) {
                if c.navigation == Some(nav.addr()) {
                    c.navigation = None;
                }
            }
            Ok(())
        });
    }

    fn navigation_pan(&self, nav: NativeHandle, value: &[f64; 3]) {
        self.run("navigation_pan", |s| {
            let p = &mut s.navigation(nav)?.position;
            let step = p.view_extent / EARTH_MAJOR_RADIUS;
            p.point[0] += value[0] * step;
            p.point[1] = (p.point[1] + value[1] * step).clamp(-90.0, 90.0);
            p.point[2] += value[2];
            Ok(())
        });
    }

    fn navigation_rotate(&self, nav: NativeHandle, value: &[f64; 3]) {
        self.run("navigation_rotate", |s| {
            let p = &mut s.navigation(nav)?.position;
            p.rotation[0] = (p.rotation[0] + value[0]) % 360.0;
            p.rotation[1] = (p.rotation[1] + value[1]).clamp(-90.0, 0.0);
            p.rotation[2] += value[2];
            Ok(())
        });
    }

    fn navigation_zoom(&self, nav: NativeHandle, value: f64) {
        self.run("navigation_zoom", |s| {
            let p = &mut s.navigation(nav)?.position;
            p.view_extent = (p.view_extent * 1.1f64.powf(-value)).max(1.0);
            Ok(())
        });
    }

    fn navigation_reset_altitude(&self, nav: NativeHandle) {
        self.run("navigation_reset_altitude", |s| {
            s.navigation(nav)?.position.point[2] = 0.0;
            Ok(())
        });
    }

    fn navigation_reset_navigation_mode(&self, nav: NativeHandle) {
        self.run("navigation_reset_navigation_mode", |s| {
            let n = s.navigation(nav)?;
            n.position.rotation[2] = 0.0;
            merge(&mut n.options, json!({ "navigationMode": "seamless" }));
            Ok(())
        });
    }

    fn navigation_set_subjective(&self, nav: NativeHandle, subjective: bool, convert: bool) {
        self.run("navigation_set_subjective", |s| {
            let p = &mut s.navigation(nav)?.position;
            if p.subjective != subjective && convert {
                let (eye, target, _) = p.camera(EARTH_MAJOR_RADIUS);
                p.point = if subjective {
                    phys_to_nav(eye, EARTH_MAJOR_RADIUS)
                } else {
                    let forward = normalize(sub(target, eye));
                    phys_to_nav(add(eye, scale(forward, p.view_extent)), EARTH_MAJOR_RADIUS)
                };
            }
            p.subjective = subjective;
            Ok(())
        });
    }

    fn navigation_get_subjective(&self, nav: NativeHandle) -> bool {
        self.run("navigation_get_subjective", |s| Ok(s.navigation(nav)?.position.subjective))
            .unwrap_or_default()
    }

    fn navigation_set_point(&self, nav: NativeHandle, point: &[f64; 3]) {
        self.run("navigation_set_point", |s| {
            s.navigation(nav)?.position.point = *point;
            Ok(())
        });
    }

    fn navigation_get_point(&self, nav: NativeHandle) -> [f64; 3] {
        self.run("navigation_get_point", |s| Ok(s.navigation(nav)?.position.point))
            .unwrap_or_default()
    }

    fn navigation_set_rotation(&self, nav: NativeHandle, rotation: &[f64; 3]) {
        self.run("navigation_set_rotation", |s| {
            s.navigation(nav)?.position.rotation = *rotation;
            Ok(())
        });
    }

    fn navigation_get_rotation(&self, nav: NativeHandle) -> [f64; 3] {
        self.run("navigation_get_rotation", |s| Ok(s.navigation(nav)?.position.rotation))
            .unwrap_or_default()
    }

    fn navigation_get_rotation_limited(&self, nav: NativeHandle) -> [f64; 3] {
        self.run("navigation_get_rotation_limited", |s| {
            let (camera, position) = {
                let n = s.navigation(nav)?;
                (n.camera, n.position)
            };
            let map = s.cameras.get(&camera).map_or(0, |c| c.map);
            Ok(if s.camera_normalization(map) {
                position.rotation_limited(EARTH_MAJOR_RADIUS)
            } else {
                position.rotation
            })
        })
        .unwrap_or_default()
    }

    fn navigation_set_view_extent(&self, nav: NativeHandle, extent: f64) {
        self.run("navigation_set_view_extent", |s| {
            if !(extent > 0.0) {
                return Err(Fault::argument(format!("view extent {extent} must be positive")));
            }
            s.navigation(nav)?.position.view_extent = extent;
            Ok(())
        });
    }

    fn navigation_get_view_extent(&self, nav: NativeHandle) -> f64 {
        self.run("navigation_get_view_extent", |s| Ok(s.navigation(nav)?.position.view_extent))
            .unwrap_or_default()
    }

    fn navigation_set_fov(&self, nav: NativeHandle, fov: f64) {
        self.run("navigation_set_fov", |s| {
            check_fov(fov)?;
            s.navigation(nav)?.position.fov = fov;
            Ok(())
        });
    }

    fn navigation_get_fov(&self, nav: NativeHandle) -> f64 {
        self.run("navigation_get_fov", |s| Ok(s.navigation(nav)?.position.fov))
            .unwrap_or_default()
    }

    fn navigation_set_auto_rotation(&self, nav: NativeHandle, value: f64) {
        self.run("navigation_set_auto_rotation", |s| {
            s.navigation(nav)?.auto_rotation = value;
            Ok(())
        });
    }

    fn navigation_get_auto_rotation(&self, nav: NativeHandle) -> f64 {
        self.run("navigation_get_auto_rotation", |s| Ok(s.navigation(nav)?.auto_rotation))
            .unwrap_or_default()
    }

    fn navigation_set_position_json(&self, nav: NativeHandle, position: &str) {
        self.run("navigation_set_position_json", |s| {
            let parsed: Position = serde_json::from_str(position)
                .map_err(|e| Fault::argument(format!("invalid position: {e}")))?;
            s.navigation(nav)?.position = parsed;
            Ok(())
        });
    }

    fn navigation_set_position_url(&self, nav: NativeHandle, position: &str) {
        self.run("navigation_set_position_url", |s| {
            let parsed = Position::from_url(position)
                .ok_or_else(|| Fault::argument(format!("invalid position url '{position}'")))?;
            s.navigation(nav)?.position = parsed;
            Ok(())
        });
    }

    fn navigation_get_position_json(&self, nav: NativeHandle) -> String {
        self.run("navigation_get_position_json", |s| {
            serde_json::to_string(&s.navigation(nav)?.position)
                .map_err(|e| Fault::argument(e.to_string()))
        })
        .unwrap_or_default()
    }

    fn navigation_get_position_url(&self, nav: NativeHandle) -> String {
        self.run("navigation_get_position_url", |s| Ok(s.navigation(nav)?.position.to_url()))
            .unwrap_or_default()
    }

    fn navigation_get_options(&self, nav: NativeHandle) -> String {
        self.run("navigation_get_options", |s| Ok(s.navigation(nav)?.options.to_string()))
            .unwrap_or_default()
    }

    fn navigation_set_options(&self, nav: NativeHandle, options: &str) {
        self.run("navigation_set_options", |s| {
            let patch = parse_options(options)?;
            merge(&mut s.navigation(nav)?.options, patch);
            Ok(())
        });
    }

    // ── search ──────────────────────────────────────────────────

    fn search_destroy(&self, search: NativeHandle) {
        self.run("search_destroy", |s| {
            s.searches
                .remove(&search.addr())
                .map(drop)
                .ok_or_else(|| Fault::invalid("search"))
        });
    }

    fn search_get_done(&self, search: NativeHandle) -> bool {
        self.run("search_get_done", |s| Ok(s.search(search)?.done))
            .unwrap_or_default()
    }

    fn search_get_results_count(&self, search: NativeHandle) -> u32 {
        self.run("search_get_results_count", |s| {
            let q = s.search(search)?;
            Ok(if q.done { q.results.len() as u32 } else { 0 })
        })
        .unwrap_or_default()
    }

    fn search_get_result_data(&self, search: NativeHandle, index: u32) -> String {
        self.run("search_get_result_data", |s| {
            let q = s.search(search)?;
            let hit = q
                .results
                .get(index as usize)
                .ok_or_else(|| Fault::range("search result", index, q.results.len()))?;
            Ok(json!({
                "title": hit.title,
                "position": hit.position,
                "distance": hit.distance,
            })
            .to_string())
        })
        .unwrap_or_default()
    }

    fn search_update_distances(&self, search: NativeHandle, point: &[f64; 3]) {
        self.run("search_update_distances", |s| {
            let q = s.search(search)?;
            q.origin = Some(*point);
            for hit in &mut q.results {
                hit.distance = distance_between(hit.position, q.origin);
            }
            Ok(())
        });
    }
}

fn start_search(
    s: &mut SimState,
    map: NativeHandle,
    query: &str,
    origin: Option<Vec3>,
) -> SimResult<usize> {
    if !s.map(map)?.config_ready {
        return Err(Fault::argument("map is not searchable yet"));
    }
    let handle = s.alloc();
    let latency = s.search_latency;
    s.searches.insert(
        handle,
        SimSearch {
            map: map.addr(),
            query: query.to_string(),
            origin,
            ticks_left: latency.max(1),
            done: false,
            results: Vec::new(),
        },
    );
    Ok(handle)
}
