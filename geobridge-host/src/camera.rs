//! `Camera`: one view of a map, and the source of its draw lists.

use std::sync::Arc;

use geobridge_core::engine::{CreditsFormat, EngineApi};
use geobridge_core::error::{check_c_string, to_array};
use geobridge_core::{NativeHandle, Result};
use geobridge_render::Draws;

use crate::instances::Instance;
use crate::map::Map;

/// Eye, target and up of the last render tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub eye: [f64; 3],
    pub target: [f64; 3],
    pub up: [f64; 3],
}

pub struct Camera {
    instance: Arc<Instance>,
    handle: NativeHandle,
}

impl Camera {
    pub fn new(map: &Map) -> Result<Self> {
        let handle = map
            .boundary()
            .call_handle("camera", |e| e.camera_create(map.handle()))?;
        Ok(Self {
            instance: Arc::clone(map.instance()),
            handle,
        })
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub(crate) fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    fn call<T>(&self, f: impl FnOnce(&dyn EngineApi, NativeHandle) -> T) -> Result<T> {
        let camera = self.handle;
        self.instance.boundary.call(|e| f(e, camera))
    }

    pub fn set_viewport_size(&self, width: u32, height: u32) -> Result<()> {
        self.call(|e, c| e.camera_set_viewport_size(c, width, height))
    }

    pub fn viewport_size(&self) -> Result<(u32, u32)> {
        self.call(|e, c| e.camera_get_viewport_size(c))
    }

    /// Pin the view; the engine stops following navigation until the
    /// camera is recreated.
    pub fn set_view(&self, eye: &[f64], target: &[f64], up: &[f64]) -> Result<()> {
        let eye = to_array::<3>("eye", eye)?;
        let target = to_array::<3>("target", target)?;
        let up = to_array::<3>("up", up)?;
        self.call(|e, c| e.camera_set_view(c, &eye, &target, &up))
    }

    pub fn set_view_matrix(&self, view: &[f64]) -> Result<()> {
        let view = to_array::<16>("view", view)?;
        self.call(|e, c| e.camera_set_view_matrix(c, &view))
    }

    pub fn set_proj(&self, fovy_degrees: f64, near: f64, far: f64) -> Result<()> {
        self.call(|e, c| e.camera_set_proj(c, fovy_degrees, near, far))
    }

    pub fn set_proj_matrix(&self, proj: &[f64]) -> Result<()> {
        let proj = to_array::<16>("proj", proj)?;
        self.call(|e, c| e.camera_set_proj_matrix(c, &proj))
    }

    pub fn view(&self) -> Result<CameraView> {
        let [eye, target, up] = self.call(|e, c| e.camera_get_view(c))?;
        Ok(CameraView { eye, target, up })
    }

    pub fn view_matrix(&self) -> Result<[f64; 16]> {
        self.call(|e, c| e.camera_get_view_matrix(c))
    }

    pub fn proj_matrix(&self) -> Result<[f64; 16]> {
        self.call(|e, c| e.camera_get_proj_matrix(c))
    }

    pub fn suggested_near_far(&self) -> Result<(f64, f64)> {
        self.call(|e, c| e.camera_suggested_near_far(c))
    }

    pub fn render_update(&self) -> Result<()> {
        self.call(|e, c| e.camera_render_update(c))
    }

    pub fn options(&self) -> Result<String> {
        self.call(|e, c| e.camera_get_options(c))
    }

    pub fn set_options(&self, options: &str) -> Result<()> {
        check_c_string(options)?;
        self.call(|e, c| e.camera_set_options(c, options))
    }

    pub fn statistics(&self) -> Result<String> {
        self.call(|e, c| e.camera_get_statistics(c))
    }

    pub fn credits(&self, format: CreditsFormat) -> Result<String> {
        self.call(|e, c| e.camera_get_credits(c, format))
    }

    /// Extract this frame's draw lists.
    pub fn draws(&self) -> Result<Draws> {
        let mut draws = Draws::new();
        self.refresh_draws(&mut draws)?;
        Ok(draws)
    }

    /// Replace every list in `draws`; `draws` is untouched on error.
    pub fn refresh_draws(&self, draws: &mut Draws) -> Result<()> {
        draws.refresh(
            &self.instance.boundary,
            &self.instance.registry,
            self.instance.map,
            self.handle,
        )
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        // The engine destroyed every camera together with its map.
        if self.instance.is_destroyed() {
            return;
        }
        if let Err(e) = self.call(|e, c| e.camera_destroy(c)) {
            log::warn!("failed to destroy camera {:?}: {e}", self.handle);
        }
    }
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera").field("handle", &self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geobridge_core::BridgeError;
    use geobridge_sim::SimEngine;

    #[test]
    fn test_set_view_shape_checked() {
        let map = Map::new(Arc::new(SimEngine::new()), "").unwrap();
        let camera = Camera::new(&map).unwrap();
        let err = camera.set_view(&[0.0; 3], &[1.0; 2], &[0.0, 0.0, 1.0]).unwrap_err();
        assert_eq!(
            err,
            BridgeError::Shape {
                what: "target",
                expected: 3,
                actual: 2
            }
        );
        assert!(camera.set_view_matrix(&[0.0; 12]).is_err());
    }

    #[test]
    fn test_degenerate_view_is_boundary_error() {
        let map = Map::new(Arc::new(SimEngine::new()), "").unwrap();
        let camera = Camera::new(&map).unwrap();
        let err = camera.set_view(&[1.0; 3], &[1.0; 3], &[0.0, 0.0, 1.0]).unwrap_err();
        assert!(matches!(err, BridgeError::Boundary { code: -20, .. }));
    }

    #[test]
    fn test_camera_outliving_map_is_harmless() {
        let map = Map::new(Arc::new(SimEngine::new()), "").unwrap();
        let camera = Camera::new(&map).unwrap();
        drop(map);
        drop(camera);
    }

    #[test]
    fn test_viewport_round_trip() {
        let map = Map::new(Arc::new(SimEngine::new()), "").unwrap();
        let camera = Camera::new(&map).unwrap();
        camera.set_viewport_size(640, 480).unwrap();
        assert_eq!(camera.viewport_size().unwrap(), (640, 480));
    }
}
