//! `EngineApi` over the engine's shared library.
//!
//! Only compiled with the `native` feature. Every method is a thin
//! forwarding call; strings returned by the engine live in an engine-side
//! buffer that is overwritten by the next call, so they are copied out
//! immediately.

use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr;

use crate::engine::{
    CameraOverride, CameraOverrideCallback, CollidersCenterCallback, CollidersDistanceCallback,
    CollidersLodCallback, CreditsFormat, DrawCategory, EngineApi, LogSink, ResourceCallback,
    ResourceDeleter, ResourceKind, StateCallback, StateEvent,
};
use crate::handle::NativeHandle;
use crate::types::{DrawRecord, RawAttribute, RawBuffer, RawCameraBase, RawDrawBase};

type H = *mut c_void;

#[link(name = "geoengine")]
extern "C" {
    fn geo_err_code() -> i32;
    fn geo_err_msg() -> *const c_char;
    fn geo_err_clear();

    fn geo_log_set_mask_global(mask: u32);
    fn geo_log_add_sink(mask: u32, sink: LogSink);
    fn geo_log_clear_sinks();
    fn geo_log(level: u32, message: *const c_char);

    fn geo_map_create(create_options: *const c_char, fetcher: H) -> H;
    fn geo_map_destroy(map: H);
    fn geo_map_set_config_paths(
        map: H,
        config: *const c_char,
        auth: *const c_char,
        sri: *const c_char,
    );
    fn geo_map_get_config_path(map: H) -> *const c_char;
    fn geo_map_get_config_available(map: H) -> bool;
    fn geo_map_get_config_ready(map: H) -> bool;
    fn geo_map_get_render_complete(map: H) -> bool;
    fn geo_map_get_render_progress(map: H) -> f64;
    fn geo_map_data_initialize(map: H);
    fn geo_map_data_tick(map: H);
    fn geo_map_data_finalize(map: H);
    fn geo_map_render_initialize(map: H);
    fn geo_map_render_tick_prepare(map: H, elapsed: f64);
    fn geo_map_render_tick_render(map: H);
    fn geo_map_render_tick_colliders(map: H);
    fn geo_map_render_finalize(map: H);
    fn geo_map_set_window_size(map: H, width: u32, height: u32);
    fn geo_map_get_options(map: H) -> *const c_char;
    fn geo_map_set_options(map: H, options: *const c_char);
    fn geo_map_get_statistics(map: H) -> *const c_char;
    fn geo_map_get_credits(map: H) -> *const c_char;
    fn geo_map_get_credits_short(map: H) -> *const c_char;
    fn geo_map_get_credits_full(map: H) -> *const c_char;
    fn geo_map_set_position_json(map: H, position: *const c_char);
    fn geo_map_set_position_url(map: H, position: *const c_char);
    fn geo_map_get_position_json(map: H) -> *const c_char;
    fn geo_map_get_position_url(map: H) -> *const c_char;
    fn geo_map_get_position_rotation_limited(map: H, rotation: *mut f64);
    fn geo_map_convert(
        map: H,
        point_from: *const f64,
        point_to: *mut f64,
        srs_from: u32,
        srs_to: u32,
    );
    fn geo_map_get_searchable(map: H) -> bool;
    fn geo_map_search(map: H, query: *const c_char) -> H;
    fn geo_map_search_at(map: H, query: *const c_char, point: *const f64) -> H;

    fn geo_celestial_name(map: H) -> *const c_char;
    fn geo_celestial_major_radius(map: H) -> f64;
    fn geo_celestial_minor_radius(map: H) -> f64;
    fn geo_celestial_atmosphere(map: H, colors: *mut f32, parameters: *mut f64);
    fn geo_draws_atmosphere_density_texture(map: H) -> H;

    fn geo_callbacks_config_available(map: H, callback: Option<StateCallback>);
    fn geo_callbacks_config_ready(map: H, callback: Option<StateCallback>);
    fn geo_callbacks_camera_eye(map: H, callback: Option<CameraOverrideCallback>);
    fn geo_callbacks_camera_target(map: H, callback: Option<CameraOverrideCallback>);
    fn geo_callbacks_camera_up(map: H, callback: Option<CameraOverrideCallback>);
    fn geo_callbacks_camera_fov_aspect_near_far(map: H, callback: Option<CameraOverrideCallback>);
    fn geo_callbacks_camera_view(map: H, callback: Option<CameraOverrideCallback>);
    fn geo_callbacks_camera_proj(map: H, callback: Option<CameraOverrideCallback>);
    fn geo_callbacks_colliders_center(map: H, callback: Option<CollidersCenterCallback>);
    fn geo_callbacks_colliders_distance(map: H, callback: Option<CollidersDistanceCallback>);
    fn geo_callbacks_colliders_lod(map: H, callback: Option<CollidersLodCallback>);
    fn geo_callbacks_load_texture(map: H, callback: Option<ResourceCallback>);
    fn geo_callbacks_load_mesh(map: H, callback: Option<ResourceCallback>);

    fn geo_resource_set_user_data(resource: H, data: *mut c_void, deleter: ResourceDeleter);
    fn geo_resource_set_memory_cost(resource: H, ram: u32, gpu: u32);
    fn geo_texture_get_resolution(
        resource: H,
        width: *mut u32,
        height: *mut u32,
        components: *mut u32,
    );
    fn geo_texture_get_type(resource: H) -> u32;
    fn geo_texture_get_filter_mode(resource: H) -> u32;
    fn geo_texture_get_wrap_mode(resource: H) -> u32;
    fn geo_texture_get_buffer(resource: H, data: *mut *const u8, size: *mut u32);
    fn geo_mesh_get_face_mode(resource: H) -> u32;
    fn geo_mesh_get_vertices(resource: H, data: *mut *const u8, size: *mut u32, count: *mut u32);
    fn geo_mesh_get_indices(resource: H, data: *mut *const u8, size: *mut u32, count: *mut u32);
    fn geo_mesh_get_attribute(
        resource: H,
        index: u32,
        offset: *mut u32,
        stride: *mut u32,
        components: *mut u32,
        gpu_type: *mut u32,
        enable: *mut bool,
        normalized: *mut bool,
    );

    fn geo_camera_create(map: H) -> H;
    fn geo_camera_destroy(camera: H);
    fn geo_camera_set_viewport_size(camera: H, width: u32, height: u32);
    fn geo_camera_get_viewport_size(camera: H, width: *mut u32, height: *mut u32);
    fn geo_camera_set_view(camera: H, eye: *const f64, target: *const f64, up: *const f64);
    fn geo_camera_set_view_matrix(camera: H, view: *const f64);
    fn geo_camera_set_proj(camera: H, fovy: f64, near: f64, far: f64);
    fn geo_camera_set_proj_matrix(camera: H, proj: *const f64);
    fn geo_camera_get_view(camera: H, eye: *mut f64, target: *mut f64, up: *mut f64);
    fn geo_camera_get_view_matrix(camera: H, view: *mut f64);
    fn geo_camera_get_proj_matrix(camera: H, proj: *mut f64);
    fn geo_camera_suggested_near_far(camera: H, near: *mut f64, far: *mut f64);
    fn geo_camera_render_update(camera: H);
    fn geo_camera_get_options(camera: H) -> *const c_char;
    fn geo_camera_set_options(camera: H, options: *const c_char);
    fn geo_camera_get_statistics(camera: H) -> *const c_char;
    fn geo_camera_get_credits(camera: H) -> *const c_char;
    fn geo_camera_get_credits_short(camera: H) -> *const c_char;
    fn geo_camera_get_credits_full(camera: H) -> *const c_char;

    fn geo_draws_camera(camera: H) -> *const RawCameraBase;
    fn geo_draws_opaque(camera: H) -> H;
    fn geo_draws_transparent(camera: H) -> H;
    fn geo_draws_geodata(camera: H) -> H;
    fn geo_draws_infographics(camera: H) -> H;
    fn geo_draws_colliders(camera: H) -> H;
    fn geo_draws_count(group: H) -> u32;
    fn geo_draws_all_in_one(
        group: H,
        index: u32,
        mesh: *mut *mut c_void,
        tex_color: *mut *mut c_void,
        tex_mask: *mut *mut c_void,
    ) -> *const RawDrawBase;
    fn geo_draws_destroy(group: H);

    fn geo_navigation_create(camera: H) -> H;
    fn geo_navigation_destroy(nav: H);
    fn geo_navigation_pan(nav: H, value: *const f64);
    fn geo_navigation_rotate(nav: H, value: *const f64);
    fn geo_navigation_zoom(nav: H, value: f64);
    fn geo_navigation_reset_altitude(nav: H);
    fn geo_navigation_reset_navigation_mode(nav: H);
    fn geo_navigation_set_subjective(nav: H, subjective: bool, convert: bool);
    fn geo_navigation_get_subjective(nav: H) -> bool;
    fn geo_navigation_set_point(nav: H, point: *const f64);
    fn geo_navigation_get_point(nav: H, point: *mut f64);
    fn geo_navigation_set_rotation(nav: H, rotation: *const f64);
    fn geo_navigation_get_rotation(nav: H, rotation: *mut f64);
    fn geo_navigation_get_rotation_limited(nav: H, rotation: *mut f64);
    fn geo_navigation_set_view_extent(nav: H, extent: f64);
    fn geo_navigation_get_view_extent(nav: H) -> f64;
    fn geo_navigation_set_fov(nav: H, fov: f64);
    fn geo_navigation_get_fov(nav: H) -> f64;
    fn geo_navigation_set_auto_rotation(nav: H, value: f64);
    fn geo_navigation_get_auto_rotation(nav: H) -> f64;
    fn geo_navigation_set_position_json(nav: H, position: *const c_char);
    fn geo_navigation_set_position_url(nav: H, position: *const c_char);
    fn geo_navigation_get_position_json(nav: H) -> *const c_char;
    fn geo_navigation_get_position_url(nav: H) -> *const c_char;
    fn geo_navigation_get_options(nav: H) -> *const c_char;
    fn geo_navigation_set_options(nav: H, options: *const c_char);

    fn geo_search_destroy(search: H);
    fn geo_search_get_done(search: H) -> bool;
    fn geo_search_get_results_count(search: H) -> u32;
    fn geo_search_get_result_data(search: H, index: u32) -> *const c_char;
    fn geo_search_update_distances(search: H, point: *const f64);
}

/// Copy an engine-owned C string. Null reads as empty.
///
/// SAFETY: `ptr` is null or points to a nul-terminated string that stays
/// valid until the next engine call.
unsafe fn owned(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

/// Host wrappers reject interior nul bytes before calling in.
fn c_string(value: &str) -> CString {
    CString::new(value).unwrap_or_else(|_| {
        log::warn!("interior nul byte in string passed to the engine, sending empty string");
        CString::default()
    })
}

/// Handle to the engine linked into this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        NativeEngine
    }
}

// SAFETY (whole impl): every handle passed in was produced by the engine
// and is still live (host wrappers own them until drop); out-pointers point
// to stack arrays of the size the engine writes.
impl EngineApi for NativeEngine {
    fn err_code(&self) -> i32 {
        unsafe { geo_err_code() }
    }

    fn err_msg(&self) -> String {
        unsafe { owned(geo_err_msg()) }
    }

    fn err_clear(&self) {
        unsafe { geo_err_clear() }
    }

    fn log_set_mask(&self, mask: u32) {
        unsafe { geo_log_set_mask_global(mask) }
    }

    fn log_add_sink(&self, mask: u32, sink: LogSink) {
        unsafe { geo_log_add_sink(mask, sink) }
    }

    fn log_clear_sinks(&self) {
        unsafe { geo_log_clear_sinks() }
    }

    fn log(&self, level: u32, message: &str) {
        let message = c_string(message);
        unsafe { geo_log(level, message.as_ptr()) }
    }

    // ── map ─────────────────────────────────────────────────────

    fn map_create(&self, create_options: &str) -> Option<NativeHandle> {
        let options = c_string(create_options);
        NativeHandle::from_raw(unsafe { geo_map_create(options.as_ptr(), ptr::null_mut()) })
    }

    fn map_destroy(&self, map: NativeHandle) {
        unsafe { geo_map_destroy(map.as_ptr()) }
    }

    fn map_set_config_paths(&self, map: NativeHandle, config: &str, auth: &str, sri: &str) {
        let (config, auth, sri) = (c_string(config), c_string(auth), c_string(sri));
        unsafe {
            geo_map_set_config_paths(map.as_ptr(), config.as_ptr(), auth.as_ptr(), sri.as_ptr())
        }
    }

    fn map_get_config_path(&self, map: NativeHandle) -> String {
        unsafe { owned(geo_map_get_config_path(map.as_ptr())) }
    }

    fn map_get_config_available(&self, map: NativeHandle) -> bool {
        unsafe { geo_map_get_config_available(map.as_ptr()) }
    }

    fn map_get_config_ready(&self, map: NativeHandle) -> bool {
        unsafe { geo_map_get_config_ready(map.as_ptr()) }
    }

    fn map_get_render_complete(&self, map: NativeHandle) -> bool {
        unsafe { geo_map_get_render_complete(map.as_ptr()) }
    }

    fn map_get_render_progress(&self, map: NativeHandle) -> f64 {
        unsafe { geo_map_get_render_progress(map.as_ptr()) }
    }

    fn map_data_initialize(&self, map: NativeHandle) {
        unsafe { geo_map_data_initialize(map.as_ptr()) }
    }

    fn map_data_tick(&self, map: NativeHandle) {
        unsafe { geo_map_data_tick(map.as_ptr()) }
    }

    fn map_data_finalize(&self, map: NativeHandle) {
        unsafe { geo_map_data_finalize(map.as_ptr()) }
    }

    fn map_render_initialize(&self, map: NativeHandle) {
        unsafe { geo_map_render_initialize(map.as_ptr()) }
    }

    fn map_render_tick_prepare(&self, map: NativeHandle, elapsed_seconds: f64) {
        unsafe { geo_map_render_tick_prepare(map.as_ptr(), elapsed_seconds) }
    }

    fn map_render_tick_render(&self, map: NativeHandle) {
        unsafe { geo_map_render_tick_render(map.as_ptr()) }
    }

    fn map_render_tick_colliders(&self, map: NativeHandle) {
        unsafe { geo_map_render_tick_colliders(map.as_ptr()) }
    }

    fn map_render_finalize(&self, map: NativeHandle) {
        unsafe { geo_map_render_finalize(map.as_ptr()) }
    }

    fn map_set_window_size(&self, map: NativeHandle, width: u32, height: u32) {
        unsafe { geo_map_set_window_size(map.as_ptr(), width, height) }
    }

    fn map_get_options(&self, map: NativeHandle) -> String {
        unsafe { owned(geo_map_get_options(map.as_ptr())) }
    }

    fn map_set_options(&self, map: NativeHandle, options: &str) {
        let options = c_string(options);
        unsafe { geo_map_set_options(map.as_ptr(), options.as_ptr()) }
    }

    fn map_get_statistics(&self, map: NativeHandle) -> String {
        unsafe { owned(geo_map_get_statistics(map.as_ptr())) }
    }

    fn map_get_credits(&self, map: NativeHandle, format: CreditsFormat) -> String {
        let h = map.as_ptr();
        unsafe {
            owned(match format {
                CreditsFormat::Plain => geo_map_get_credits(h),
                CreditsFormat::Short => geo_map_get_credits_short(h),
                CreditsFormat::Full => geo_map_get_credits_full(h),
            })
        }
    }

    fn map_set_position_json(&self, map: NativeHandle, position: &str) {
        let position = c_string(position);
        unsafe { geo_map_set_position_json(map.as_ptr(), position.as_ptr()) }
    }

    fn map_set_position_url(&self, map: NativeHandle, position: &str) {
        let position = c_string(position);
        unsafe { geo_map_set_position_url(map.as_ptr(), position.as_ptr()) }
    }

    fn map_get_position_json(&self, map: NativeHandle) -> String {
        unsafe { owned(geo_map_get_position_json(map.as_ptr())) }
    }

    fn map_get_position_url(&self, map: NativeHandle) -> String {
        unsafe { owned(geo_map_get_position_url(map.as_ptr())) }
    }

    fn map_get_position_rotation_limited(&self, map: NativeHandle) -> [f64; 3] {
        let mut out = [0.0; 3];
        unsafe { geo_map_get_position_rotation_limited(map.as_ptr(), out.as_mut_ptr()) };
        out
    }

    fn map_convert(
        &self,
        map: NativeHandle,
        point: &[f64; 3],
        srs_from: u32,
        srs_to: u32,
    ) -> [f64; 3] {
        let mut out = [0.0; 3];
        let h = map.as_ptr();
        unsafe { geo_map_convert(h, point.as_ptr(), out.as_mut_ptr(), srs_from, srs_to) };
        out
    }

    fn map_get_searchable(&self, map: NativeHandle) -> bool {
        unsafe { geo_map_get_searchable(map.as_ptr()) }
    }

    fn map_search(&self, map: NativeHandle, query: &str) -> Option<NativeHandle> {
        let query = c_string(query);
        NativeHandle::from_raw(unsafe { geo_map_search(map.as_ptr(), query.as_ptr()) })
    }

    fn map_search_at(
        &self,
        map: NativeHandle,
        query: &str,
        point: &[f64; 3],
    ) -> Option<NativeHandle> {
        let query = c_string(query);
        let search = unsafe { geo_map_search_at(map.as_ptr(), query.as_ptr(), point.as_ptr()) };
        NativeHandle::from_raw(search)
    }

    // ── celestial ───────────────────────────────────────────────

    fn celestial_name(&self, map: NativeHandle) -> String {
        unsafe { owned(geo_celestial_name(map.as_ptr())) }
    }

    fn celestial_major_radius(&self, map: NativeHandle) -> f64 {
        unsafe { geo_celestial_major_radius(map.as_ptr()) }
    }

    fn celestial_minor_radius(&self, map: NativeHandle) -> f64 {
        unsafe { geo_celestial_minor_radius(map.as_ptr()) }
    }

    fn celestial_atmosphere(
        &self,
        map: NativeHandle,
        colors: &mut [f32; 8],
        parameters: &mut [f64; 5],
    ) {
        let (colors, parameters) = (colors.as_mut_ptr(), parameters.as_mut_ptr());
        unsafe { geo_celestial_atmosphere(map.as_ptr(), colors, parameters) }
    }

    fn draws_atmosphere_density_texture(&self, map: NativeHandle) -> *mut c_void {
        unsafe { geo_draws_atmosphere_density_texture(map.as_ptr()) }
    }

    // ── callbacks ───────────────────────────────────────────────

    fn callbacks_state(
        &self,
        map: NativeHandle,
        event: StateEvent,
        callback: Option<StateCallback>,
    ) {
        let h = map.as_ptr();
        unsafe {
            match event {
                StateEvent::ConfigAvailable => geo_callbacks_config_available(h, callback),
                StateEvent::ConfigReady => geo_callbacks_config_ready(h, callback),
            }
        }
    }

    fn callbacks_camera_override(
        &self,
        map: NativeHandle,
        kind: CameraOverride,
        callback: Option<CameraOverrideCallback>,
    ) {
        let h = map.as_ptr();
        unsafe {
            match kind {
                CameraOverride::Eye => geo_callbacks_camera_eye(h, callback),
                CameraOverride::Target => geo_callbacks_camera_target(h, callback),
                CameraOverride::Up => geo_callbacks_camera_up(h, callback),
                CameraOverride::FovAspectNearFar => {
                    geo_callbacks_camera_fov_aspect_near_far(h, callback)
                }
                CameraOverride::View => geo_callbacks_camera_view(h, callback),
                CameraOverride::Proj => geo_callbacks_camera_proj(h, callback),
            }
        }
    }

    fn callbacks_colliders_center(
        &self,
        map: NativeHandle,
        callback: Option<CollidersCenterCallback>,
    ) {
        unsafe { geo_callbacks_colliders_center(map.as_ptr(), callback) }
    }

    fn callbacks_colliders_distance(
        &self,
        map: NativeHandle,
        callback: Option<CollidersDistanceCallback>,
    ) {
        unsafe { geo_callbacks_colliders_distance(map.as_ptr(), callback) }
    }

    fn callbacks_colliders_lod(&self, map: NativeHandle, callback: Option<CollidersLodCallback>) {
        unsafe { geo_callbacks_colliders_lod(map.as_ptr(), callback) }
    }

    fn callbacks_load(
        &self,
        map: NativeHandle,
        kind: ResourceKind,
        callback: Option<ResourceCallback>,
    ) {
        let h = map.as_ptr();
        unsafe {
            match kind {
                ResourceKind::Texture => geo_callbacks_load_texture(h, callback),
                ResourceKind::Mesh => geo_callbacks_load_mesh(h, callback),
            }
        }
    }

    // ── resources ───────────────────────────────────────────────

    fn resource_set_user_data(
        &self,
        resource: NativeHandle,
        data: *mut c_void,
        deleter: ResourceDeleter,
    ) {
        unsafe { geo_resource_set_user_data(resource.as_ptr(), data, deleter) }
    }

    fn resource_set_memory_cost(&self, resource: NativeHandle, ram: u32, gpu: u32) {
        unsafe { geo_resource_set_memory_cost(resource.as_ptr(), ram, gpu) }
    }

    fn texture_get_resolution(&self, resource: NativeHandle) -> (u32, u32, u32) {
        let (mut w, mut h, mut c) = (0, 0, 0);
        unsafe { geo_texture_get_resolution(resource.as_ptr(), &mut w, &mut h, &mut c) };
        (w, h, c)
    }

    fn texture_get_type(&self, resource: NativeHandle) -> u32 {
        unsafe { geo_texture_get_type(resource.as_ptr()) }
    }

    fn texture_get_filter_mode(&self, resource: NativeHandle) -> u32 {
        unsafe { geo_texture_get_filter_mode(resource.as_ptr()) }
    }

    fn texture_get_wrap_mode(&self, resource: NativeHandle) -> u32 {
        unsafe { geo_texture_get_wrap_mode(resource.as_ptr()) }
    }

    fn texture_get_buffer(&self, resource: NativeHandle) -> RawBuffer {
        let mut buffer = RawBuffer::empty();
        unsafe { geo_texture_get_buffer(resource.as_ptr(), &mut buffer.data, &mut buffer.size) };
        buffer
    }

    fn mesh_get_face_mode(&self, resource: NativeHandle) -> u32 {
        unsafe { geo_mesh_get_face_mode(resource.as_ptr()) }
    }

    fn mesh_get_vertices(&self, resource: NativeHandle) -> RawBuffer {
        let mut b = RawBuffer::empty();
        unsafe { geo_mesh_get_vertices(resource.as_ptr(), &mut b.data, &mut b.size, &mut b.count) };
        b
    }

    fn mesh_get_indices(&self, resource: NativeHandle) -> RawBuffer {
        let mut b = RawBuffer::empty();
        unsafe { geo_mesh_get_indices(resource.as_ptr(), &mut b.data, &mut b.size, &mut b.count) };
        b
    }

    fn mesh_get_attribute(&self, resource: NativeHandle, index: u32) -> RawAttribute {
        let mut a = RawAttribute::default();
        unsafe {
            geo_mesh_get_attribute(
                resource.as_ptr(),
                index,
                &mut a.offset,
                &mut a.stride,
                &mut a.components,
                &mut a.gpu_type,
                &mut a.enable,
                &mut a.normalized,
            )
        };
        a
    }

    // ── camera ──────────────────────────────────────────────────

    fn camera_create(&self, map: NativeHandle) -> Option<NativeHandle> {
        NativeHandle::from_raw(unsafe { geo_camera_create(map.as_ptr()) })
    }

    fn camera_destroy(&self, camera: NativeHandle) {
        unsafe { geo_camera_destroy(camera.as_ptr()) }
    }

    fn camera_set_viewport_size(&self, camera: NativeHandle, width: u32, height: u32) {
        unsafe { geo_camera_set_viewport_size(camera.as_ptr(), width, height) }
    }

    fn camera_get_viewport_size(&self, camera: NativeHandle) -> (u32, u32) {
        let (mut w, mut h) = (0, 0);
        unsafe { geo_camera_get_viewport_size(camera.as_ptr(), &mut w, &mut h) };
        (w, h)
    }

    fn camera_set_view(
        &self,
        camera: NativeHandle,
        eye: &[f64; 3],
        target: &[f64; 3],
        up: &[f64; 3],
    ) {
        unsafe { geo_camera_set_view(camera.as_ptr(), eye.as_ptr(), target.as_ptr(), up.as_ptr()) }
    }

    fn camera_set_view_matrix(&self, camera: NativeHandle, view: &[f64; 16]) {
        unsafe { geo_camera_set_view_matrix(camera.as_ptr(), view.as_ptr()) }
    }

    fn camera_set_proj(&self, camera: NativeHandle, fovy_degrees: f64, near: f64, far: f64) {
        unsafe { geo_camera_set_proj(camera.as_ptr(), fovy_degrees, near, far) }
    }

    fn camera_set_proj_matrix(&self, camera: NativeHandle, proj: &[f64; 16]) {
        unsafe { geo_camera_set_proj_matrix(camera.as_ptr(), proj.as_ptr()) }
    }

    fn camera_get_view(&self, camera: NativeHandle) -> [[f64; 3]; 3] {
        let mut out = [[0.0; 3]; 3];
        let [eye, target, up] = &mut out;
        let (eye, target, up) = (eye.as_mut_ptr(), target.as_mut_ptr(), up.as_mut_ptr());
        unsafe { geo_camera_get_view(camera.as_ptr(), eye, target, up) };
        out
    }

    fn camera_get_view_matrix(&self, camera: NativeHandle) -> [f64; 16] {
        let mut out = [0.0; 16];
        unsafe { geo_camera_get_view_matrix(camera.as_ptr(), out.as_mut_ptr()) };
        out
    }

    fn camera_get_proj_matrix(&self, camera: NativeHandle) -> [f64; 16] {
        let mut out = [0.0; 16];
        unsafe { geo_camera_get_proj_matrix(camera.as_ptr(), out.as_mut_ptr()) };
        out
    }

    fn camera_suggested_near_far(&self, camera: NativeHandle) -> (f64, f64) {
        let (mut near, mut far) = (0.0, 0.0);
        unsafe { geo_camera_suggested_near_far(camera.as_ptr(), &mut near, &mut far) };
        (near, far)
    }

    fn camera_render_update(&self, camera: NativeHandle) {
        unsafe { geo_camera_render_update(camera.as_ptr()) }
    }

    fn camera_get_options(&self, camera: NativeHandle) -> String {
        unsafe { owned(geo_camera_get_options(camera.as_ptr())) }
    }

    fn camera_set_options(&self, camera: NativeHandle, options: &str) {
        let options = c_string(options);
        unsafe { geo_camera_set_options(camera.as_ptr(), options.as_ptr()) }
    }

    fn camera_get_statistics(&self, camera: NativeHandle) -> String {
        unsafe { owned(geo_camera_get_statistics(camera.as_ptr())) }
    }

    fn camera_get_credits(&self, camera: NativeHandle, format: CreditsFormat) -> String {
        let h = camera.as_ptr();
        unsafe {
            owned(match format {
                CreditsFormat::Plain => geo_camera_get_credits(h),
                CreditsFormat::Short => geo_camera_get_credits_short(h),
                CreditsFormat::Full => geo_camera_get_credits_full(h),
            })
        }
    }

    // ── draws ───────────────────────────────────────────────────

    fn draws_camera(&self, camera: NativeHandle) -> *const RawCameraBase {
        unsafe { geo_draws_camera(camera.as_ptr()) }
    }

    fn draws_group(&self, camera: NativeHandle, category: DrawCategory) -> Option<NativeHandle> {
        let h = camera.as_ptr();
        let group = unsafe {
            match category {
                DrawCategory::Opaque => geo_draws_opaque(h),
                DrawCategory::Transparent => geo_draws_transparent(h),
                DrawCategory::Geodata => geo_draws_geodata(h),
                DrawCategory::Infographics => geo_draws_infographics(h),
                DrawCategory::Colliders => geo_draws_colliders(h),
            }
        };
        NativeHandle::from_raw(group)
    }

    fn draws_count(&self, group: NativeHandle) -> u32 {
        unsafe { geo_draws_count(group.as_ptr()) }
    }

    fn draws_all_in_one(&self, group: NativeHandle, index: u32) -> DrawRecord {
        let mut record = DrawRecord {
            detail: ptr::null(),
            mesh: ptr::null_mut(),
            tex_color: ptr::null_mut(),
            tex_mask: ptr::null_mut(),
        };
        record.detail = unsafe {
            geo_draws_all_in_one(
                group.as_ptr(),
                index,
                &mut record.mesh,
                &mut record.tex_color,
                &mut record.tex_mask,
            )
        };
        record
    }

    fn draws_destroy(&self, group: NativeHandle) {
        unsafe { geo_draws_destroy(group.as_ptr()) }
    }

    // ── navigation ──────────────────────────────────────────────

    fn navigation_create(&self, camera: NativeHandle) -> Option<NativeHandle> {
        NativeHandle::from_raw(unsafe { geo_navigation_create(camera.as_ptr()) })
    }

    fn navigation_destroy(&self, nav: NativeHandle) {
        unsafe { geo_navigation_destroy(nav.as_ptr()) }
    }

    fn navigation_pan(&self, nav: NativeHandle, value: &[f64; 3]) {
        unsafe { geo_navigation_pan(nav.as_ptr(), value.as_ptr()) }
    }

    fn navigation_rotate(&self, nav: NativeHandle, value: &[f64; 3]) {
        unsafe { geo_navigation_rotate(nav.as_ptr(), value.as_ptr()) }
    }

    fn navigation_zoom(&self, nav: NativeHandle, value: f64) {
        unsafe { geo_navigation_zoom(nav.as_ptr(), value) }
    }

    fn navigation_reset_altitude(&self, nav: NativeHandle) {
        unsafe { geo_navigation_reset_altitude(nav.as_ptr()) }
    }

    fn navigation_reset_navigation_mode(&self, nav: NativeHandle) {
        unsafe { geo_navigation_reset_navigation_mode(nav.as_ptr()) }
    }

    fn navigation_set_subjective(&self, nav: NativeHandle, subjective: bool, convert: bool) {
        unsafe { geo_navigation_set_subjective(nav.as_ptr(), subjective, convert) }
    }

    fn navigation_get_subjective(&self, nav: NativeHandle) -> bool {
        unsafe { geo_navigation_get_subjective(nav.as_ptr()) }
    }

    fn navigation_set_point(&self, nav: NativeHandle, point: &[f64; 3]) {
        unsafe { geo_navigation_set_point(nav.as_ptr(), point.as_ptr()) }
    }

    fn navigation_get_point(&self, nav: NativeHandle) -> [f64; 3] {
        let mut out = [0.0; 3];
        unsafe { geo_navigation_get_point(nav.as_ptr(), out.as_mut_ptr()) };
        out
    }

    fn navigation_set_rotation(&self, nav: NativeHandle, rotation: &[f64; 3]) {
        unsafe { geo_navigation_set_rotation(nav.as_ptr(), rotation.as_ptr()) }
    }

    fn navigation_get_rotation(&self, nav: NativeHandle) -> [f64; 3] {
        let mut out = [0.0; 3];
        unsafe { geo_navigation_get_rotation(nav.as_ptr(), out.as_mut_ptr()) };
        out
    }

    fn navigation_get_rotation_limited(&self, nav: NativeHandle) -> [f64; 3] {
        let mut out = [0.0; 3];
        unsafe { geo_navigation_get_rotation_limited(nav.as_ptr(), out.as_mut_ptr()) };
        out
    }

    fn navigation_set_view_extent(&self, nav: NativeHandle, extent: f64) {
        unsafe { geo_navigation_set_view_extent(nav.as_ptr(), extent) }
    }

    fn navigation_get_view_extent(&self, nav: NativeHandle) -> f64 {
        unsafe { geo_navigation_get_view_extent(nav.as_ptr()) }
    }

    fn navigation_set_fov(&self, nav: NativeHandle, fov: f64) {
        unsafe { geo_navigation_set_fov(nav.as_ptr(), fov) }
    }

    fn navigation_get_fov(&self, nav: NativeHandle) -> f64 {
        unsafe { geo_navigation_get_fov(nav.as_ptr()) }
    }

    fn navigation_set_auto_rotation(&self, nav: NativeHandle, value: f64) {
        unsafe { geo_navigation_set_auto_rotation(nav.as_ptr(), value) }
    }

    fn navigation_get_auto_rotation(&self, nav: NativeHandle) -> f64 {
        unsafe { geo_navigation_get_auto_rotation(nav.as_ptr()) }
    }

    fn navigation_set_position_json(&self, nav: NativeHandle, position: &str) {
        let position = c_string(position);
        unsafe { geo_navigation_set_position_json(nav.as_ptr(), position.as_ptr()) }
    }

    fn navigation_set_position_url(&self, nav: NativeHandle, position: &str) {
        let position = c_string(position);
        unsafe { geo_navigation_set_position_url(nav.as_ptr(), position.as_ptr()) }
    }

    fn navigation_get_position_json(&self, nav: NativeHandle) -> String {
        unsafe { owned(geo_navigation_get_position_json(nav.as_ptr())) }
    }

    fn navigation_get_position_url(&self, nav: NativeHandle) -> String {
        unsafe { owned(geo_navigation_get_position_url(nav.as_ptr())) }
    }

    fn navigation_get_options(&self, nav: NativeHandle) -> String {
        unsafe { owned(geo_navigation_get_options(nav.as_ptr())) }
    }

    fn navigation_set_options(&self, nav: NativeHandle, options: &str) {
        let options = c_string(options);
        unsafe { geo_navigation_set_options(nav.as_ptr(), options.as_ptr()) }
    }

    // ── search ──────────────────────────────────────────────────

    fn search_destroy(&self, search: NativeHandle) {
        unsafe { geo_search_destroy(search.as_ptr()) }
    }

    fn search_get_done(&self, search: NativeHandle) -> bool {
        unsafe { geo_search_get_done(search.as_ptr()) }
    }

    fn search_get_results_count(&self, search: NativeHandle) -> u32 {
        unsafe { geo_search_get_results_count(search.as_ptr()) }
    }

    fn search_get_result_data(&self, search: NativeHandle, index: u32) -> String {
        unsafe { owned(geo_search_get_result_data(search.as_ptr(), index)) }
    }

    fn search_update_distances(&self, search: NativeHandle, point: &[f64; 3]) {
        unsafe { geo_search_update_distances(search.as_ptr(), point.as_ptr()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_null_is_empty() {
        assert_eq!(unsafe { owned(ptr::null()) }, "");
    }

    #[test]
    fn test_owned_copies_string() {
        let s = CString::new("earth").unwrap();
        assert_eq!(unsafe { owned(s.as_ptr()) }, "earth");
    }

    #[test]
    fn test_c_string_interior_nul_becomes_empty() {
        assert_eq!(c_string("a\0b").as_bytes(), b"");
        assert_eq!(c_string("abc").as_bytes(), b"abc");
    }
}
