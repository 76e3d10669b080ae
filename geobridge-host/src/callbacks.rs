//! Callback dispatch: the `extern "C"` entry points handed to the engine.
//!
//! ```text
//!  engine tick ──▸ trampoline(map, ..)
//!                    │ catch_unwind
//!                    ▼
//!                  instances::lookup(map) ──▸ Instance
//!                    │ handlers cloned out of the lock
//!                    ▼
//!                  host handler
//!                    │ Err / panic
//!                    ▼
//!                  Instance::record_fault ──▸ returned by the tick call
//! ```
//!
//! Nothing unwinds across the boundary. Every trampoline returns normally
//! whatever the handler does.

use std::any::Any;
use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use geobridge_core::engine::{CameraOverride, ColliderOverride, ResourceKind, StateEvent};
use geobridge_core::error::check_shape;
use geobridge_core::{
    BridgeError, Boundary, EngineApi, HostObject, NativeHandle, ResourceToken, Result,
};
use geobridge_render::{Mesh, Texture};

use crate::instances::{self, Instance, OverrideHandler};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run `f` for the instance behind `map`, turning errors and panics into a
/// recorded fault.
fn dispatch(callback: &'static str, map: *mut c_void, f: impl FnOnce(&Instance) -> Result<()>) {
    let Some(instance) = instances::lookup(map as usize) else {
        log::warn!("{callback}: no live instance for map {map:p}");
        return;
    };
    let outcome = catch_unwind(AssertUnwindSafe(|| f(&instance)));
    let reason = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(fault @ BridgeError::CallbackFault { .. })) => return instance.record_fault(fault),
        Ok(Err(e)) => e.to_string(),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };
    instance.record_fault(BridgeError::CallbackFault { callback, reason });
}

// ── state events ────────────────────────────────────────────────

fn notify(instance: &Instance, event: StateEvent) -> Result<()> {
    if let Some(handler) = instance.state_handler(event) {
        handler();
    }
    Ok(())
}

unsafe extern "C" fn config_available(map: *mut c_void) {
    dispatch(StateEvent::ConfigAvailable.name(), map, |i| {
        notify(i, StateEvent::ConfigAvailable)
    });
}

unsafe extern "C" fn config_ready(map: *mut c_void) {
    dispatch(StateEvent::ConfigReady.name(), map, |i| {
        notify(i, StateEvent::ConfigReady)
    });
}

// ── camera overrides ────────────────────────────────────────────

/// Copy the block out, let the handler rewrite it, copy it back. The
/// engine's block is untouched when the handler changes its length.
///
/// # Safety
///
/// `values` is null or points to `len` writable doubles.
unsafe fn rewrite_block(
    what: &'static str,
    handler: &OverrideHandler,
    values: *mut f64,
    len: usize,
) -> Result<()> {
    if values.is_null() {
        return Err(BridgeError::NullHandle("override block"));
    }
    let block = std::slice::from_raw_parts_mut(values, len);
    let mut copy = block.to_vec();
    handler(&mut copy);
    check_shape(what, &copy, len)?;
    block.copy_from_slice(&copy);
    Ok(())
}

/// # Safety
///
/// `values` is null or points to `kind.len()` writable doubles.
unsafe fn apply_override(
    instance: &Instance,
    kind: CameraOverride,
    values: *mut f64,
) -> Result<()> {
    match instance.override_handler(kind) {
        Some(handler) => rewrite_block(kind.name(), &handler, values, kind.len()),
        None => Ok(()),
    }
}

macro_rules! override_trampoline {
    ($($name:ident => $kind:expr,)+) => {
        $(
            unsafe extern "C" fn $name(map: *mut c_void, values: *mut f64) {
                dispatch($kind.name(), map, |i| apply_override(i, $kind, values));
            }
        )+
    };
}

override_trampoline! {
    camera_eye => CameraOverride::Eye,
    camera_target => CameraOverride::Target,
    camera_up => CameraOverride::Up,
    camera_fov_aspect_near_far => CameraOverride::FovAspectNearFar,
    camera_view => CameraOverride::View,
    camera_proj => CameraOverride::Proj,
}

fn override_entry(kind: CameraOverride) -> geobridge_core::CameraOverrideCallback {
    match kind {
        CameraOverride::Eye => camera_eye,
        CameraOverride::Target => camera_target,
        CameraOverride::Up => camera_up,
        CameraOverride::FovAspectNearFar => camera_fov_aspect_near_far,
        CameraOverride::View => camera_view,
        CameraOverride::Proj => camera_proj,
    }
}

// ── collider overrides ──────────────────────────────────────────

/// Let the handler rewrite one engine-owned scalar.
///
/// # Safety
///
/// `value` is null or points to a writable `T`.
unsafe fn rewrite_value<T: Copy>(value: *mut T, handler: impl Fn(&mut T)) -> Result<()> {
    let Some(value) = value.as_mut() else {
        return Err(BridgeError::NullHandle("override value"));
    };
    let mut copy = *value;
    handler(&mut copy);
    *value = copy;
    Ok(())
}

unsafe extern "C" fn colliders_center(map: *mut c_void, center: *mut f64) {
    let kind = ColliderOverride::Center;
    dispatch(kind.name(), map, |i| match i.colliders_center_handler() {
        Some(handler) => rewrite_block(kind.name(), &handler, center, 3),
        None => Ok(()),
    });
}

unsafe extern "C" fn colliders_distance(map: *mut c_void, distance: *mut f64) {
    dispatch(ColliderOverride::Distance.name(), map, |i| {
        match i.colliders_distance_handler() {
            Some(handler) => rewrite_value(distance, |d: &mut f64| handler(d)),
            None => Ok(()),
        }
    });
}

unsafe extern "C" fn colliders_lod(map: *mut c_void, lod: *mut u32) {
    dispatch(ColliderOverride::Lod.name(), map, |i| match i.colliders_lod_handler() {
        Some(handler) => rewrite_value(lod, |l: &mut u32| handler(l)),
        None => Ok(()),
    });
}

// ── resources ───────────────────────────────────────────────────

/// Report the decoded size before any host handler runs, so the engine
/// sees the cost even when the handler rejects the resource.
fn report_cost(instance: &Instance, resource: NativeHandle, cost: usize) -> Result<()> {
    let gpu = u32::try_from(cost).unwrap_or(u32::MAX);
    instance
        .boundary
        .call(|e| e.resource_set_memory_cost(resource, 0, gpu))
}

/// Register the host object and hand its token to the engine together with
/// the unload entry point.
fn adopt(instance: &Instance, resource: NativeHandle, object: HostObject) -> Result<()> {
    let token = instance.registry.register(object);
    let attached = instance
        .boundary
        .call(|e| e.resource_set_user_data(resource, token.as_user_data(), unload_resource));
    if attached.is_err() {
        // The engine will never call the deleter for this token.
        let _ = instance.registry.release(token);
    }
    attached
}

fn load_texture_resource(instance: &Instance, resource: NativeHandle) -> Result<()> {
    let texture = Texture::load(&instance.boundary, resource)?;
    report_cost(instance, resource, texture.memory_cost())?;
    let object: HostObject = match instance.texture_handler() {
        Some(handler) => handler(texture).map_err(|reason| BridgeError::CallbackFault {
            callback: ResourceKind::Texture.name(),
            reason,
        })?,
        None => Arc::new(texture),
    };
    adopt(instance, resource, object)
}

fn load_mesh_resource(instance: &Instance, resource: NativeHandle) -> Result<()> {
    let mesh = Mesh::load(&instance.boundary, resource)?;
    report_cost(instance, resource, mesh.memory_cost())?;
    let object: HostObject = match instance.mesh_handler() {
        Some(handler) => handler(mesh).map_err(|reason| BridgeError::CallbackFault {
            callback: ResourceKind::Mesh.name(),
            reason,
        })?,
        None => Arc::new(mesh),
    };
    adopt(instance, resource, object)
}

unsafe extern "C" fn load_texture(map: *mut c_void, resource: *mut c_void) {
    dispatch(ResourceKind::Texture.name(), map, |i| {
        let resource = NativeHandle::from_raw(resource).ok_or(BridgeError::NullHandle("resource"))?;
        load_texture_resource(i, resource)
    });
}

unsafe extern "C" fn load_mesh(map: *mut c_void, resource: *mut c_void) {
    dispatch(ResourceKind::Mesh.name(), map, |i| {
        let resource = NativeHandle::from_raw(resource).ok_or(BridgeError::NullHandle("resource"))?;
        load_mesh_resource(i, resource)
    });
}

/// Deleter handed to the engine with every token. A token that is unknown
/// or already released is logged and ignored.
unsafe extern "C" fn unload_resource(user_data: *mut c_void) {
    let outcome = catch_unwind(AssertUnwindSafe(|| match ResourceToken::from_user_data(user_data) {
        Some(token) => instances::release_token(token),
        None => Err(BridgeError::Lifecycle(0)),
    }));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("unload_resource: {e}"),
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            log::error!("fatal: unload_resource panicked: {reason}");
        }
    }
}

// ── binding ─────────────────────────────────────────────────────

/// Install every entry point for one map.
pub(crate) fn bind(boundary: &Boundary, map: NativeHandle) -> Result<()> {
    boundary.call(|e| e.callbacks_state(map, StateEvent::ConfigAvailable, Some(config_available)))?;
    boundary.call(|e| e.callbacks_state(map, StateEvent::ConfigReady, Some(config_ready)))?;
    for kind in CameraOverride::ALL {
        let entry = override_entry(kind);
        boundary.call(|e| e.callbacks_camera_override(map, kind, Some(entry)))?;
    }
    boundary.call(|e| e.callbacks_colliders_center(map, Some(colliders_center)))?;
    boundary.call(|e| e.callbacks_colliders_distance(map, Some(colliders_distance)))?;
    boundary.call(|e| e.callbacks_colliders_lod(map, Some(colliders_lod)))?;
    boundary.call(|e| e.callbacks_load(map, ResourceKind::Texture, Some(load_texture)))?;
    boundary.call(|e| e.callbacks_load(map, ResourceKind::Mesh, Some(load_mesh)))?;
    Ok(())
}

fn detach(boundary: &Boundary, map: NativeHandle, what: &str, f: impl FnOnce(&dyn EngineApi)) {
    if let Err(e) = boundary.call(f) {
        log::warn!("failed to detach {what} callback of map {map:?}: {e}");
    }
}

/// Detach every entry point, one checked call each, so a failure is
/// attributed to its callback and does not stop the rest. Used during
/// teardown; errors are logged.
pub(crate) fn unbind(boundary: &Boundary, map: NativeHandle) {
    for event in StateEvent::ALL {
        detach(boundary, map, event.name(), |e| e.callbacks_state(map, event, None));
    }
    for kind in CameraOverride::ALL {
        detach(boundary, map, kind.name(), |e| {
            e.callbacks_camera_override(map, kind, None)
        });
    }
    detach(boundary, map, ColliderOverride::Center.name(), |e| {
        e.callbacks_colliders_center(map, None)
    });
    detach(boundary, map, ColliderOverride::Distance.name(), |e| {
        e.callbacks_colliders_distance(map, None)
    });
    detach(boundary, map, ColliderOverride::Lod.name(), |e| {
        e.callbacks_colliders_lod(map, None)
    });
    for kind in [ResourceKind::Texture, ResourceKind::Mesh] {
        detach(boundary, map, kind.name(), |e| e.callbacks_load(map, kind, None));
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use geobridge_sim::{SimEngine, TextureSpec};

    #[test]
    fn test_panic_message_variants() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(3u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_unknown_token_unload_is_ignored() {
        unsafe { unload_resource(0xfff_fff0 as *mut c_void) };
        unsafe { unload_resource(std::ptr::null_mut()) };
    }

    #[test]
    fn test_override_entries_are_distinct() {
        let entries: Vec<usize> = CameraOverride::ALL
            .iter()
            .map(|&k| override_entry(k) as usize)
            .collect();
        for (i, a) in entries.iter().enumerate() {
            assert!(entries[i + 1..].iter().all(|b| b != a));
        }
    }

    #[test]
    fn test_unbind_continues_past_failed_detach() {
        let sim = Arc::new(SimEngine::new());
        let boundary = Boundary::new(sim.clone());
        let map = sim.map_create("").unwrap();
        bind(&boundary, map).unwrap();

        sim.inject_error("callbacks_state", -1, "busy");
        unbind(&boundary, map);
        assert!(boundary.check().is_ok());

        // The load callback is gone, so a ready resource is never offered.
        sim.map_set_config_paths(map, "https://maps.example/config.json", "", "");
        sim.map_data_initialize(map);
        sim.queue_texture(map, "late", TextureSpec::rgba(1, 1, 0));
        sim.map_data_tick(map);
        assert_eq!(sim.pending_resources(map), 1);
        sim.map_destroy(map);
    }
}
