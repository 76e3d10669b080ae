//! The engine boundary.
//!
//! [`EngineApi`] mirrors the engine's flat, handle-based C interface one
//! call per method. Every call may set the engine's error channel; callers
//! go through [`Boundary`](crate::channel::Boundary), which reads and clears
//! it right after each call.
//!
//! Callbacks are plain `extern "C"` function pointers. The engine invokes
//! them synchronously from inside the tick calls, passing the map handle as
//! the correlation token.

use std::ffi::{c_char, c_void};

use crate::handle::NativeHandle;
use crate::types::{DrawRecord, RawAttribute, RawBuffer, RawCameraBase};

/// `ConfigAvailable` / `ConfigReady` notifications.
pub type StateCallback = unsafe extern "C" fn(map: *mut c_void);
/// Camera value override; `values` points to a block of
/// [`CameraOverride::len`] doubles that may be rewritten in place.
pub type CameraOverrideCallback = unsafe extern "C" fn(map: *mut c_void, values: *mut f64);
/// Collider traversal focus; `center` points to three physical doubles.
pub type CollidersCenterCallback = unsafe extern "C" fn(map: *mut c_void, center: *mut f64);
/// Collider traversal distance; one double.
pub type CollidersDistanceCallback = unsafe extern "C" fn(map: *mut c_void, distance: *mut f64);
/// Collider traversal level of detail.
pub type CollidersLodCallback = unsafe extern "C" fn(map: *mut c_void, lod: *mut u32);
/// Texture or mesh load; `resource` is valid only during the call.
pub type ResourceCallback = unsafe extern "C" fn(map: *mut c_void, resource: *mut c_void);
/// Deletion hook for one loaded resource, receives its user data.
pub type ResourceDeleter = unsafe extern "C" fn(user_data: *mut c_void);
/// Engine log sink, receives one nul-terminated line.
pub type LogSink = unsafe extern "C" fn(message: *const c_char);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateEvent {
    ConfigAvailable,
    ConfigReady,
}

impl StateEvent {
    pub const ALL: [StateEvent; 2] = [StateEvent::ConfigAvailable, StateEvent::ConfigReady];

    pub const fn name(self) -> &'static str {
        match self {
            StateEvent::ConfigAvailable => "config_available",
            StateEvent::ConfigReady => "config_ready",
        }
    }
}

/// Camera values the host may override every tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CameraOverride {
    Eye,
    Target,
    Up,
    FovAspectNearFar,
    View,
    Proj,
}

impl CameraOverride {
    pub const ALL: [CameraOverride; 6] = [
        CameraOverride::Eye,
        CameraOverride::Target,
        CameraOverride::Up,
        CameraOverride::FovAspectNearFar,
        CameraOverride::View,
        CameraOverride::Proj,
    ];

    /// Number of doubles in the block.
    pub const fn len(self) -> usize {
        match self {
            CameraOverride::Eye | CameraOverride::Target | CameraOverride::Up => 3,
            CameraOverride::FovAspectNearFar => 4,
            CameraOverride::View | CameraOverride::Proj => 16,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            CameraOverride::Eye => "camera_eye",
            CameraOverride::Target => "camera_target",
            CameraOverride::Up => "camera_up",
            CameraOverride::FovAspectNearFar => "camera_fov_aspect_near_far",
            CameraOverride::View => "camera_view",
            CameraOverride::Proj => "camera_proj",
        }
    }
}

/// Values the host may override before each collider traversal, fired in
/// this order from `map_render_tick_colliders`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColliderOverride {
    Center,
    Distance,
    Lod,
}

impl ColliderOverride {
    pub const ALL: [ColliderOverride; 3] = [
        ColliderOverride::Center,
        ColliderOverride::Distance,
        ColliderOverride::Lod,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ColliderOverride::Center => "colliders_center",
            ColliderOverride::Distance => "colliders_distance",
            ColliderOverride::Lod => "colliders_lod",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    Mesh,
}

impl ResourceKind {
    pub const fn name(self) -> &'static str {
        match self {
            ResourceKind::Texture => "load_texture",
            ResourceKind::Mesh => "load_mesh",
        }
    }
}

/// Draw-task lists produced per camera and frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawCategory {
    /// No blending, any order.
    Opaque,
    /// Blended, must keep the given order.
    Transparent,
    Geodata,
    /// Debug visualisation.
    Infographics,
    /// Collision meshes, never drawn.
    Colliders,
}

impl DrawCategory {
    pub const ALL: [DrawCategory; 5] = [
        DrawCategory::Opaque,
        DrawCategory::Transparent,
        DrawCategory::Geodata,
        DrawCategory::Infographics,
        DrawCategory::Colliders,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            DrawCategory::Opaque => "opaque",
            DrawCategory::Transparent => "transparent",
            DrawCategory::Geodata => "geodata",
            DrawCategory::Infographics => "infographics",
            DrawCategory::Colliders => "colliders",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CreditsFormat {
    #[default]
    Plain,
    Short,
    Full,
}

/// The engine's flat function interface.
///
/// Implementations must tolerate reentrant calls: callbacks fired from
/// `map_data_tick` or `map_render_tick_prepare` call back into the same
/// engine (resource queries, memory cost, user data) before the tick returns.
pub trait EngineApi: Send + Sync {
    // ── error channel ───────────────────────────────────────────
    fn err_code(&self) -> i32;
    fn err_msg(&self) -> String;
    fn err_clear(&self);

    // ── logging ─────────────────────────────────────────────────
    fn log_set_mask(&self, mask: u32);
    fn log_add_sink(&self, mask: u32, sink: LogSink);
    fn log_clear_sinks(&self);
    /// Never sets an error.
    fn log(&self, level: u32, message: &str);

    // ── map ─────────────────────────────────────────────────────
    fn map_create(&self, create_options: &str) -> Option<NativeHandle>;
    fn map_destroy(&self, map: NativeHandle);
    fn map_set_config_paths(&self, map: NativeHandle, config: &str, auth: &str, sri: &str);
    fn map_get_config_path(&self, map: NativeHandle) -> String;
    fn map_get_config_available(&self, map: NativeHandle) -> bool;
    fn map_get_config_ready(&self, map: NativeHandle) -> bool;
    fn map_get_render_complete(&self, map: NativeHandle) -> bool;
    fn map_get_render_progress(&self, map: NativeHandle) -> f64;
    fn map_data_initialize(&self, map: NativeHandle);
    fn map_data_tick(&self, map: NativeHandle);
    fn map_data_finalize(&self, map: NativeHandle);
    fn map_render_initialize(&self, map: NativeHandle);
    fn map_render_tick_prepare(&self, map: NativeHandle, elapsed_seconds: f64);
    fn map_render_tick_render(&self, map: NativeHandle);
    /// Fixed-distance traversal around a focus point for collision
    /// geometry. Fires the collider overrides; a no-op until the map config
    /// is ready.
    fn map_render_tick_colliders(&self, map: NativeHandle);
    fn map_render_finalize(&self, map: NativeHandle);
    fn map_set_window_size(&self, map: NativeHandle, width: u32, height: u32);
    fn map_get_options(&self, map: NativeHandle) -> String;
    fn map_set_options(&self, map: NativeHandle, options: &str);
    fn map_get_statistics(&self, map: NativeHandle) -> String;
    fn map_get_credits(&self, map: NativeHandle, format: CreditsFormat) -> String;
    fn map_set_position_json(&self, map: NativeHandle, position: &str);
    fn map_set_position_url(&self, map: NativeHandle, position: &str);
    fn map_get_position_json(&self, map: NativeHandle) -> String;
    fn map_get_position_url(&self, map: NativeHandle) -> String;
    /// Position orientation after camera rotation normalization; zeros
    /// until the map config is available.
    fn map_get_position_rotation_limited(&self, map: NativeHandle) -> [f64; 3];
    fn map_convert(
        &self,
        map: NativeHandle,
        point: &[f64; 3],
        srs_from: u32,
        srs_to: u32,
    ) -> [f64; 3];
    fn map_get_searchable(&self, map: NativeHandle) -> bool;
    fn map_search(&self, map: NativeHandle, query: &str) -> Option<NativeHandle>;
    fn map_search_at(&self, map: NativeHandle, query: &str, point: &[f64; 3])
        -> Option<NativeHandle>;

    // ── celestial body ──────────────────────────────────────────
    fn celestial_name(&self, map: NativeHandle) -> String;
    fn celestial_major_radius(&self, map: NativeHandle) -> f64;
    fn celestial_minor_radius(&self, map: NativeHandle) -> f64;
    /// Colors: horizon rgba, zenith rgba. Parameters: color gradient
    /// exponent, thickness, thickness quantile, visibility, visibility
    /// quantile.
    fn celestial_atmosphere(
        &self,
        map: NativeHandle,
        colors: &mut [f32; 8],
        parameters: &mut [f64; 5],
    );
    /// User data of the atmosphere density texture, null when absent.
    fn draws_atmosphere_density_texture(&self, map: NativeHandle) -> *mut c_void;

    // ── callback registration ───────────────────────────────────
    fn callbacks_state(
        &self,
        map: NativeHandle,
        event: StateEvent,
        callback: Option<StateCallback>,
    );
    fn callbacks_camera_override(
        &self,
        map: NativeHandle,
        kind: CameraOverride,
        callback: Option<CameraOverrideCallback>,
    );
    fn callbacks_colliders_center(
        &self,
        map: NativeHandle,
        callback: Option<CollidersCenterCallback>,
    );
    fn callbacks_colliders_distance(
        &self,
        map: NativeHandle,
        callback: Option<CollidersDistanceCallback>,
    );
    fn callbacks_colliders_lod(&self, map: NativeHandle, callback: Option<CollidersLodCallback>);
    fn callbacks_load(
        &self,
        map: NativeHandle,
        kind: ResourceKind,
        callback: Option<ResourceCallback>,
    );

    // ── resources (valid only inside load callbacks) ────────────
    fn resource_set_user_data(
        &self,
        resource: NativeHandle,
        data: *mut c_void,
        deleter: ResourceDeleter,
    );
    fn resource_set_memory_cost(&self, resource: NativeHandle, ram: u32, gpu: u32);
    /// Width, height, components.
    fn texture_get_resolution(&self, resource: NativeHandle) -> (u32, u32, u32);
    fn texture_get_type(&self, resource: NativeHandle) -> u32;
    fn texture_get_filter_mode(&self, resource: NativeHandle) -> u32;
    fn texture_get_wrap_mode(&self, resource: NativeHandle) -> u32;
    fn texture_get_buffer(&self, resource: NativeHandle) -> RawBuffer;
    fn mesh_get_face_mode(&self, resource: NativeHandle) -> u32;
    fn mesh_get_vertices(&self, resource: NativeHandle) -> RawBuffer;
    fn mesh_get_indices(&self, resource: NativeHandle) -> RawBuffer;
    fn mesh_get_attribute(&self, resource: NativeHandle, index: u32) -> RawAttribute;

    // ── camera ──────────────────────────────────────────────────
    fn camera_create(&self, map: NativeHandle) -> Option<NativeHandle>;
    fn camera_destroy(&self, camera: NativeHandle);
    fn camera_set_viewport_size(&self, camera: NativeHandle, width: u32, height: u32);
    fn camera_get_viewport_size(&self, camera: NativeHandle) -> (u32, u32);
    fn camera_set_view(
        &self,
        camera: NativeHandle,
        eye: &[f64; 3],
        target: &[f64; 3],
        up: &[f64; 3],
    );
    fn camera_set_view_matrix(&self, camera: NativeHandle, view: &[f64; 16]);
    fn camera_set_proj(&self, camera: NativeHandle, fovy_degrees: f64, near: f64, far: f64);
    fn camera_set_proj_matrix(&self, camera: NativeHandle, proj: &[f64; 16]);
    /// Eye, target, up.
    fn camera_get_view(&self, camera: NativeHandle) -> [[f64; 3]; 3];
    fn camera_get_view_matrix(&self, camera: NativeHandle) -> [f64; 16];
    fn camera_get_proj_matrix(&self, camera: NativeHandle) -> [f64; 16];
    fn camera_suggested_near_far(&self, camera: NativeHandle) -> (f64, f64);
    fn camera_render_update(&self, camera: NativeHandle);
    fn camera_get_options(&self, camera: NativeHandle) -> String;
    fn camera_set_options(&self, camera: NativeHandle, options: &str);
    fn camera_get_statistics(&self, camera: NativeHandle) -> String;
    fn camera_get_credits(&self, camera: NativeHandle, format: CreditsFormat) -> String;

    // ── draws ───────────────────────────────────────────────────
    /// Camera block of the last render tick; owned by the engine.
    fn draws_camera(&self, camera: NativeHandle) -> *const RawCameraBase;
    /// Temporary list for one category; `None` when the list is empty.
    /// A returned group must be released with `draws_destroy`.
    fn draws_group(&self, camera: NativeHandle, category: DrawCategory) -> Option<NativeHandle>;
    fn draws_count(&self, group: NativeHandle) -> u32;
    fn draws_all_in_one(&self, group: NativeHandle, index: u32) -> DrawRecord;
    fn draws_destroy(&self, group: NativeHandle);

    // ── navigation ──────────────────────────────────────────────
    fn navigation_create(&self, camera: NativeHandle) -> Option<NativeHandle>;
    fn navigation_destroy(&self, nav: NativeHandle);
    fn navigation_pan(&self, nav: NativeHandle, value: &[f64; 3]);
    fn navigation_rotate(&self, nav: NativeHandle, value: &[f64; 3]);
    fn navigation_zoom(&self, nav: NativeHandle, value: f64);
    fn navigation_reset_altitude(&self, nav: NativeHandle);
    fn navigation_reset_navigation_mode(&self, nav: NativeHandle);
    fn navigation_set_subjective(&self, nav: NativeHandle, subjective: bool, convert: bool);
    fn navigation_get_subjective(&self, nav: NativeHandle) -> bool;
    fn navigation_set_point(&self, nav: NativeHandle, point: &[f64; 3]);
    fn navigation_get_point(&self, nav: NativeHandle) -> [f64; 3];
    fn navigation_set_rotation(&self, nav: NativeHandle, rotation: &[f64; 3]);
    fn navigation_get_rotation(&self, nav: NativeHandle) -> [f64; 3];
    /// Rotation after camera rotation normalization.
    fn navigation_get_rotation_limited(&self, nav: NativeHandle) -> [f64; 3];
    fn navigation_set_view_extent(&self, nav: NativeHandle, extent: f64);
    fn navigation_get_view_extent(&self, nav: NativeHandle) -> f64;
    fn navigation_set_fov(&self, nav: NativeHandle, fov: f64);
    fn navigation_get_fov(&self, nav: NativeHandle) -> f64;
    fn navigation_set_auto_rotation(&self, nav: NativeHandle, value: f64);
    fn navigation_get_auto_rotation(&self, nav: NativeHandle) -> f64;
    fn navigation_set_position_json(&self, nav: NativeHandle, position: &str);
    fn navigation_set_position_url(&self, nav: NativeHandle, position: &str);
    fn navigation_get_position_json(&self, nav: NativeHandle) -> String;
    fn navigation_get_position_url(&self, nav: NativeHandle) -> String;
    fn navigation_get_options(&self, nav: NativeHandle) -> String;
    fn navigation_set_options(&self, nav: NativeHandle, options: &str);

    // ── search ──────────────────────────────────────────────────
    fn search_destroy(&self, search: NativeHandle);
    fn search_get_done(&self, search: NativeHandle) -> bool;
    fn search_get_results_count(&self, search: NativeHandle) -> u32;
    fn search_get_result_data(&self, search: NativeHandle, index: u32) -> String;
    fn search_update_distances(&self, search: NativeHandle, point: &[f64; 3]);
}
