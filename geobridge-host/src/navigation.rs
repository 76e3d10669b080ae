//! `Navigation`: interactive controller attached to a camera.

use std::sync::Arc;

use geobridge_core::engine::EngineApi;
use geobridge_core::error::{check_c_string, to_array};
use geobridge_core::{NativeHandle, Result};

use crate::camera::Camera;
use crate::instances::Instance;

pub struct Navigation {
    instance: Arc<Instance>,
    handle: NativeHandle,
}

impl Navigation {
    pub fn new(camera: &Camera) -> Result<Self> {
        let instance = Arc::clone(camera.instance());
        let handle = instance
            .boundary
            .call_handle("navigation", |e| e.navigation_create(camera.handle()))?;
        Ok(Self { instance, handle })
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    fn call<T>(&self, f: impl FnOnce(&dyn EngineApi, NativeHandle) -> T) -> Result<T> {
        let nav = self.handle;
        self.instance.boundary.call(|e| f(e, nav))
    }

    // ── input ───────────────────────────────────────────────────

    pub fn pan(&self, value: &[f64]) -> Result<()> {
        let value = to_array::<3>("pan", value)?;
        self.call(|e, n| e.navigation_pan(n, &value))
    }

    pub fn rotate(&self, value: &[f64]) -> Result<()> {
        let value = to_array::<3>("rotate", value)?;
        self.call(|e, n| e.navigation_rotate(n, &value))
    }

    pub fn zoom(&self, value: f64) -> Result<()> {
        self.call(|e, n| e.navigation_zoom(n, value))
    }

    pub fn reset_altitude(&self) -> Result<()> {
        self.call(|e, n| e.navigation_reset_altitude(n))
    }

    pub fn reset_navigation_mode(&self) -> Result<()> {
        self.call(|e, n| e.navigation_reset_navigation_mode(n))
    }

    // ── position ────────────────────────────────────────────────

    /// With `convert`, the camera stays where it is and the point moves.
    pub fn set_subjective(&self, subjective: bool, convert: bool) -> Result<()> {
        self.call(|e, n| e.navigation_set_subjective(n, subjective, convert))
    }

    pub fn subjective(&self) -> Result<bool> {
        self.call(|e, n| e.navigation_get_subjective(n))
    }

    pub fn set_point(&self, point: &[f64]) -> Result<()> {
        let point = to_array::<3>("point", point)?;
        self.call(|e, n| e.navigation_set_point(n, &point))
    }

    pub fn point(&self) -> Result<[f64; 3]> {
        self.call(|e, n| e.navigation_get_point(n))
    }

    pub fn set_rotation(&self, rotation: &[f64]) -> Result<()> {
        let rotation = to_array::<3>("rotation", rotation)?;
        self.call(|e, n| e.navigation_set_rotation(n, &rotation))
    }

    pub fn rotation(&self) -> Result<[f64; 3]> {
        self.call(|e, n| e.navigation_get_rotation(n))
    }

    /// The rotation the camera is actually limited to: wide views are
    /// pulled towards looking straight down, north up.
    pub fn rotation_limited(&self) -> Result<[f64; 3]> {
        self.call(|e, n| e.navigation_get_rotation_limited(n))
    }

    pub fn set_view_extent(&self, extent: f64) -> Result<()> {
        self.call(|e, n| e.navigation_set_view_extent(n, extent))
    }

    pub fn view_extent(&self) -> Result<f64> {
        self.call(|e, n| e.navigation_get_view_extent(n))
    }

    pub fn set_fov(&self, fov: f64) -> Result<()> {
        self.call(|e, n| e.navigation_set_fov(n, fov))
    }

    pub fn fov(&self) -> Result<f64> {
        self.call(|e, n| e.navigation_get_fov(n))
    }

    /// Degrees per second around the vertical axis.
    pub fn set_auto_rotation(&self, value: f64) -> Result<()> {
        self.call(|e, n| e.navigation_set_auto_rotation(n, value))
    }

    pub fn auto_rotation(&self) -> Result<f64> {
        self.call(|e, n| e.navigation_get_auto_rotation(n))
    }

    pub fn set_position_json(&self, position: &str) -> Result<()> {
        check_c_string(position)?;
        self.call(|e, n| e.navigation_set_position_json(n, position))
    }

    pub fn set_position_url(&self, position: &str) -> Result<()> {
        check_c_string(position)?;
        self.call(|e, n| e.navigation_set_position_url(n, position))
    }

    pub fn position_json(&self) -> Result<String> {
        self.call(|e, n| e.navigation_get_position_json(n))
    }

    pub fn position_url(&self) -> Result<String> {
        self.call(|e, n| e.navigation_get_position_url(n))
    }

    pub fn options(&self) -> Result<String> {
        self.call(|e, n| e.navigation_get_options(n))
    }

    pub fn set_options(&self, options: &str) -> Result<()> {
        check_c_string(options)?;
        self.call(|e, n| e.navigation_set_options(n, options))
    }
}

impl Drop for Navigation {
    fn drop(&mut self) {
        if self.instance.is_destroyed() {
            return;
        }
        if let Err(e) = self.call(|e, n| e.navigation_destroy(n)) {
            log::warn!("failed to destroy navigation {:?}: {e}", self.handle);
        }
    }
}

impl std::fmt::Debug for Navigation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigation").field("handle", &self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Map;
    use geobridge_core::BridgeError;
    use geobridge_sim::SimEngine;

    fn setup() -> (Map, Camera) {
        let map = Map::new(Arc::new(SimEngine::new()), "").unwrap();
        let camera = Camera::new(&map).unwrap();
        (map, camera)
    }

    #[test]
    fn test_zoom_in_shrinks_extent() {
        let (_map, camera) = setup();
        let nav = Navigation::new(&camera).unwrap();
        let before = nav.view_extent().unwrap();
        nav.zoom(3.0).unwrap();
        assert!(nav.view_extent().unwrap() < before);
    }

    #[test]
    fn test_point_round_trip_and_shape() {
        let (_map, camera) = setup();
        let nav = Navigation::new(&camera).unwrap();
        nav.set_point(&[2.35, 48.85, 120.0]).unwrap();
        assert_eq!(nav.point().unwrap(), [2.35, 48.85, 120.0]);
        nav.reset_altitude().unwrap();
        assert_eq!(nav.point().unwrap()[2], 0.0);
        assert!(matches!(nav.pan(&[1.0]), Err(BridgeError::Shape { .. })));
    }

    #[test]
    fn test_invalid_fov_rejected_by_engine() {
        let (_map, camera) = setup();
        let nav = Navigation::new(&camera).unwrap();
        assert!(matches!(nav.set_fov(0.0), Err(BridgeError::Boundary { code: -20, .. })));
        nav.set_fov(60.0).unwrap();
        assert_eq!(nav.fov().unwrap(), 60.0);
    }

    #[test]
    fn test_position_url_round_trip() {
        let (_map, camera) = setup();
        let nav = Navigation::new(&camera).unwrap();
        let url = "obj,14.5,50.1,fix,0,10,-45,0,5000,50";
        nav.set_position_url(url).unwrap();
        assert_eq!(nav.view_extent().unwrap(), 5000.0);
        assert_eq!(nav.rotation().unwrap(), [10.0, -45.0, 0.0]);
        assert!(nav.set_position_url("not a position").is_err());
    }

    #[test]
    fn test_rotation_limited_by_view_extent() {
        let (_map, camera) = setup();
        let nav = Navigation::new(&camera).unwrap();
        nav.set_position_url("obj,14.5,50.1,fix,0,10,-45,0,5000,50").unwrap();
        assert_eq!(nav.rotation_limited().unwrap(), [10.0, -45.0, 0.0]);
        nav.set_view_extent(4_000_000.0).unwrap();
        assert_eq!(nav.rotation_limited().unwrap(), [0.0, -90.0, 0.0]);
        assert_eq!(nav.rotation().unwrap(), [10.0, -45.0, 0.0]);
    }

    #[test]
    fn test_subjective_switch() {
        let (_map, camera) = setup();
        let nav = Navigation::new(&camera).unwrap();
        assert!(!nav.subjective().unwrap());
        let before = nav.point().unwrap();
        nav.set_subjective(true, true).unwrap();
        assert!(nav.subjective().unwrap());
        assert_ne!(nav.point().unwrap(), before);
    }
}
