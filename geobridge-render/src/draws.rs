//! Draw-list extraction.
//!
//! Once per frame and camera, the engine's draw groups are copied into
//! host-owned [`Draws`]:
//!
//! ```text
//!  draws_camera ──▸ CameraSnapshot
//!  celestial_*  ──▸ Celestial (+ density texture via registry)
//!  for category in opaque, transparent, geodata, infographics, colliders:
//!      draws_group ──▸ GroupGuard ──count / all_in_one(i)──▸ DrawTask
//!                          └── draws_destroy on drop
//! ```
//!
//! Every native handle in a record is a registry token. A record whose mesh
//! token is null or no longer registered is skipped, so a task never refers
//! to a released mesh.

use std::any::Any;
use std::ptr;
use std::sync::Arc;

use geobridge_core::engine::DrawCategory;
use geobridge_core::error::{BridgeError, Result};
use geobridge_core::types::RawCameraBase;
use geobridge_core::{Boundary, HandleRegistry, HostObject, NativeHandle};

/// Camera parameters the engine used for the last render tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSnapshot {
    pub view: [f64; 16],
    pub proj: [f64; 16],
    pub eye: [f64; 3],
    pub near: f64,
    pub far: f64,
    pub aspect: f64,
    pub fov: f64,
    pub map_projected: bool,
}

impl Default for CameraSnapshot {
    fn default() -> Self {
        let raw: RawCameraBase = bytemuck::Zeroable::zeroed();
        Self::from(&raw)
    }
}

impl From<&RawCameraBase> for CameraSnapshot {
    fn from(raw: &RawCameraBase) -> Self {
        Self {
            view: raw.view,
            proj: raw.proj,
            eye: raw.eye,
            near: raw.near,
            far: raw.far,
            aspect: raw.aspect,
            fov: raw.fov,
            map_projected: raw.map_projected != 0,
        }
    }
}

#[derive(Clone, Default)]
pub struct Atmosphere {
    pub horizon_color: [f32; 4],
    pub zenith_color: [f32; 4],
    pub color_gradient_exponent: f64,
    pub thickness: f64,
    pub thickness_quantile: f64,
    pub visibility: f64,
    pub visibility_quantile: f64,
    pub density_texture: Option<HostObject>,
}

#[derive(Clone, Default)]
pub struct Celestial {
    pub name: String,
    pub major_radius: f64,
    pub minor_radius: f64,
    pub atmosphere: Atmosphere,
}

impl Celestial {
    /// Body and atmosphere parameters of the map's reference frame. The
    /// density texture resolves through `registry` like draw textures.
    pub fn query(
        boundary: &Boundary,
        registry: &HandleRegistry,
        map: NativeHandle,
    ) -> Result<Celestial> {
        let name = boundary.call(|e| e.celestial_name(map))?;
        let major_radius = boundary.call(|e| e.celestial_major_radius(map))?;
        let minor_radius = boundary.call(|e| e.celestial_minor_radius(map))?;
        let mut colors = [0.0f32; 8];
        let mut parameters = [0.0f64; 5];
        boundary.call(|e| e.celestial_atmosphere(map, &mut colors, &mut parameters))?;
        let density = boundary.call(|e| e.draws_atmosphere_density_texture(map))?;

        let [hr, hg, hb, ha, zr, zg, zb, za] = colors;
        let [
            color_gradient_exponent,
            thickness,
            thickness_quantile,
            visibility,
            visibility_quantile,
        ] = parameters;
        Ok(Celestial {
            name,
            major_radius,
            minor_radius,
            atmosphere: Atmosphere {
                horizon_color: [hr, hg, hb, ha],
                zenith_color: [zr, zg, zb, za],
                color_gradient_exponent,
                thickness,
                thickness_quantile,
                visibility,
                visibility_quantile,
                density_texture: registry.resolve_raw(density),
            },
        })
    }
}

/// One draw task with its resources resolved to host objects.
#[derive(Clone)]
pub struct DrawTask {
    pub mv: [f32; 16],
    pub uvm: [f32; 9],
    pub color: [f32; 4],
    pub uv_clip: [f32; 4],
    pub center: [f32; 3],
    pub external_uv: bool,
    pub flat_shading: bool,
    pub mesh: HostObject,
    pub tex_color: Option<HostObject>,
    pub tex_mask: Option<HostObject>,
}

impl DrawTask {
    /// The mesh as the concrete type the load handler produced.
    pub fn mesh_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.mesh).downcast::<T>().ok()
    }

    pub fn tex_color_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.tex_color.clone()?.downcast::<T>().ok()
    }

    pub fn tex_mask_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.tex_mask.clone()?.downcast::<T>().ok()
    }
}

impl std::fmt::Debug for DrawTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawTask")
            .field("center", &self.center)
            .field("color", &self.color)
            .field("tex_color", &self.tex_color.is_some())
            .field("tex_mask", &self.tex_mask.is_some())
            .finish()
    }
}

/// Releases a draw group exactly once, on success or on error.
struct GroupGuard<'a> {
    boundary: &'a Boundary,
    group: NativeHandle,
}

impl Drop for GroupGuard<'_> {
    fn drop(&mut self) {
        let group = self.group;
        if let Err(e) = self.boundary.call(|engine| engine.draws_destroy(group)) {
            log::warn!("failed to release draw group {group:?}: {e}");
        }
    }
}

/// Everything one camera needs to draw one frame.
#[derive(Clone, Default)]
pub struct Draws {
    pub camera: CameraSnapshot,
    pub celestial: Celestial,
    pub opaque: Vec<DrawTask>,
    pub transparent: Vec<DrawTask>,
    pub geodata: Vec<DrawTask>,
    pub infographics: Vec<DrawTask>,
    pub colliders: Vec<DrawTask>,
}

impl Draws {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, category: DrawCategory) -> &[DrawTask] {
        match category {
            DrawCategory::Opaque => &self.opaque,
            DrawCategory::Transparent => &self.transparent,
            DrawCategory::Geodata => &self.geodata,
            DrawCategory::Infographics => &self.infographics,
            DrawCategory::Colliders => &self.colliders,
        }
    }

    fn list_mut(&mut self, category: DrawCategory) -> &mut Vec<DrawTask> {
        match category {
            DrawCategory::Opaque => &mut self.opaque,
            DrawCategory::Transparent => &mut self.transparent,
            DrawCategory::Geodata => &mut self.geodata,
            DrawCategory::Infographics => &mut self.infographics,
            DrawCategory::Colliders => &mut self.colliders,
        }
    }

    /// Tasks across all categories.
    pub fn total(&self) -> usize {
        DrawCategory::ALL.iter().map(|&c| self.list(c).len()).sum()
    }

    /// Pull a fresh frame from the engine, replacing every list.
    ///
    /// On error `self` is left untouched.
    pub fn refresh(
        &mut self,
        boundary: &Boundary,
        registry: &HandleRegistry,
        map: NativeHandle,
        camera: NativeHandle,
    ) -> Result<()> {
        let mut fresh = Draws {
            camera: extract_camera(boundary, camera)?,
            celestial: Celestial::query(boundary, registry, map)?,
            ..Draws::default()
        };
        for category in DrawCategory::ALL {
            *fresh.list_mut(category) = extract_group(boundary, registry, camera, category)?;
        }
        *self = fresh;
        Ok(())
    }
}

impl std::fmt::Debug for Draws {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Draws")
            .field("camera", &self.camera)
            .field("opaque", &self.opaque.len())
            .field("transparent", &self.transparent.len())
            .field("geodata", &self.geodata.len())
            .field("infographics", &self.infographics.len())
            .field("colliders", &self.colliders.len())
            .finish()
    }
}

fn extract_camera(boundary: &Boundary, camera: NativeHandle) -> Result<CameraSnapshot> {
    let raw = boundary.call(|e| e.draws_camera(camera))?;
    if raw.is_null() {
        return Err(BridgeError::NullHandle("camera snapshot"));
    }
    // SAFETY: the block is owned by the camera and valid until its next
    // render tick; it is copied out before returning. The engine makes no
    // alignment promise for it.
    let raw: RawCameraBase = unsafe { ptr::read_unaligned(raw) };
    Ok(CameraSnapshot::from(&raw))
}

fn extract_group(
    boundary: &Boundary,
    registry: &HandleRegistry,
    camera: NativeHandle,
    category: DrawCategory,
) -> Result<Vec<DrawTask>> {
    let Some(group) = boundary.call(|e| e.draws_group(camera, category))? else {
        return Ok(Vec::new());
    };
    let guard = GroupGuard { boundary, group };

    let count = boundary.call(|e| e.draws_count(guard.group))?;
    let mut tasks = Vec::with_capacity(count as usize);
    let mut skipped = 0usize;
    for index in 0..count {
        let record = boundary.call(|e| e.draws_all_in_one(guard.group, index))?;
        if record.detail.is_null() {
            return Err(BridgeError::NullHandle("draw detail"));
        }
        let Some(mesh) = registry.resolve_raw(record.mesh) else {
            skipped += 1;
            continue;
        };
        // SAFETY: detail blocks live until the group is destroyed, which
        // the guard does only after this loop.
        let detail = unsafe { ptr::read_unaligned(record.detail) };
        tasks.push(DrawTask {
            mv: detail.mv,
            uvm: detail.uvm,
            color: detail.color,
            uv_clip: detail.uv_clip,
            center: detail.center,
            external_uv: detail.external_uv != 0,
            flat_shading: detail.flat_shading != 0,
            mesh,
            tex_color: registry.resolve_raw(record.tex_color),
            tex_mask: registry.resolve_raw(record.tex_mask),
        });
    }
    if skipped > 0 {
        log::debug!("{}: skipped {skipped} draws without a loaded mesh", category.name());
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    use geobridge_core::engine::EngineApi;
    use geobridge_sim::{SceneTask, SimEngine};

    struct Fixture {
        sim: Arc<SimEngine>,
        boundary: Boundary,
        registry: HandleRegistry,
        map: NativeHandle,
        camera: NativeHandle,
    }

    fn fixture() -> Fixture {
        let sim = Arc::new(SimEngine::new());
        let boundary = Boundary::new(sim.clone());
        let map = boundary.call_handle("map", |e| e.map_create("")).unwrap();
        let camera = boundary.call_handle("camera", |e| e.camera_create(map)).unwrap();
        Fixture {
            sim,
            boundary,
            registry: HandleRegistry::new(),
            map,
            camera,
        }
    }

    #[test]
    fn test_empty_scene_yields_empty_lists() {
        let f = fixture();
        let mut draws = Draws::new();
        draws.refresh(&f.boundary, &f.registry, f.map, f.camera).unwrap();
        assert_eq!(draws.total(), 0);
        assert_eq!(draws.celestial.name, "Earth");
        assert!(draws.celestial.major_radius > draws.celestial.minor_radius);
        assert!(draws.celestial.atmosphere.density_texture.is_none());
        assert_eq!(f.sim.live_groups(), 0);
    }

    #[test]
    fn test_unloaded_mesh_is_skipped() {
        let f = fixture();
        f.sim.set_scene(
            f.map,
            DrawCategory::Opaque,
            vec![SceneTask::new("never-loaded"), SceneTask::new("also-missing")],
        );
        let mut draws = Draws::new();
        draws.refresh(&f.boundary, &f.registry, f.map, f.camera).unwrap();
        assert!(draws.opaque.is_empty());
        assert_eq!(f.sim.live_groups(), 0);
    }

    #[test]
    fn test_group_released_when_extraction_fails() {
        let f = fixture();
        f.sim
            .set_scene(f.map, DrawCategory::Opaque, vec![SceneTask::new("m")]);
        f.sim.inject_error("draws_all_in_one", -17, "out of range");
        let mut draws = Draws::new();
        let err = draws
            .refresh(&f.boundary, &f.registry, f.map, f.camera)
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::Boundary {
                code: -17,
                message: "out of range".into()
            }
        );
        assert_eq!(f.sim.live_groups(), 0);
    }

    #[test]
    fn test_failed_refresh_keeps_previous_frame() {
        let f = fixture();
        let mut draws = Draws::new();
        draws.camera.fov = 33.0;
        f.sim.inject_error("celestial_name", -1, "boom");
        assert!(draws
            .refresh(&f.boundary, &f.registry, f.map, f.camera)
            .is_err());
        assert_eq!(draws.camera.fov, 33.0);
    }

    #[test]
    fn test_camera_snapshot_copied() {
        let f = fixture();
        f.sim.map_render_initialize(f.map);
        f.sim.map_render_tick_prepare(f.map, 0.0);
        let mut draws = Draws::new();
        draws.refresh(&f.boundary, &f.registry, f.map, f.camera).unwrap();
        let raw = unsafe { ptr::read_unaligned(f.sim.draws_camera(f.camera)) };
        assert_eq!(draws.camera, CameraSnapshot::from(&raw));
        assert!(draws.camera.near > 0.0);
    }

    #[test]
    fn test_snapshot_from_raw() {
        let mut raw: RawCameraBase = bytemuck::Zeroable::zeroed();
        raw.map_projected = 1;
        raw.fov = 60.0;
        let snapshot = CameraSnapshot::from(&raw);
        assert!(snapshot.map_projected);
        assert_eq!(snapshot.fov, 60.0);
    }
}
