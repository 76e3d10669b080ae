//! # geobridge-core
//!
//! Boundary primitives shared by every geobridge crate.
//!
//! ## Architecture
//!
//! ```text
//!  host wrappers (geobridge-host)
//!       │
//!       ▼
//!  Boundary::call(..)          ◀─── reads + clears the engine error channel
//!       │
//!       ▼
//!  dyn EngineApi               ◀─── NativeEngine (feature `native`) or SimEngine
//!       │ callbacks
//!       ▼
//!  HandleRegistry              ◀─── token ↔ host object, released once
//! ```
//!
//! ## Crate modules
//!
//! - [`handle`]: opaque engine handles and registry tokens
//! - [`error`]: `BridgeError` and slice/string checks
//! - [`types`]: GL-compatible enums and C-layout blocks
//! - [`engine`]: the `EngineApi` trait and callback signatures
//! - [`channel`]: checked calls through the error channel
//! - [`registry`]: the handle registry

pub mod channel;
pub mod engine;
pub mod error;
pub mod handle;
pub mod registry;
pub mod types;

#[cfg(feature = "native")]
pub mod ffi;

pub use channel::Boundary;
pub use engine::{
    CameraOverride, CameraOverrideCallback, ColliderOverride, CollidersCenterCallback,
    CollidersDistanceCallback, CollidersLodCallback, CreditsFormat, DrawCategory, EngineApi,
    LogSink, ResourceCallback, ResourceDeleter, ResourceKind, StateCallback, StateEvent,
};
pub use error::{BridgeError, Result};
pub use handle::{NativeHandle, ResourceToken};
pub use registry::{HandleRegistry, HostObject, RegistryStats};
pub use types::{
    DrawRecord, FaceMode, FilterMode, GpuType, LogMask, RawAttribute, RawBuffer, RawCameraBase,
    RawDrawBase, Srs, WrapMode,
};

#[cfg(feature = "native")]
pub use ffi::NativeEngine;
