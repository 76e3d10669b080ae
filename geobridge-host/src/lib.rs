//! # geobridge-host
//!
//! Host-facing wrappers around one or more engine map instances.
//!
//! ## Architecture
//!
//! ```text
//!  FrameDriver                     ◀─── Created → Running → Finalized
//!       │
//!       ▼
//!  Map / Camera / Navigation / SearchTask
//!       │ Boundary::call                      ▲ tick result (or fault)
//!       ▼                                     │
//!  engine ──callback(map handle)──▸ instances::lookup ──▸ host handlers
//!                                     │
//!                                     ▼
//!                               HandleRegistry (per map)
//! ```
//!
//! ## Crate modules
//!
//! - [`map`]: map lifecycle, frame surface, handlers, search, positions
//! - [`camera`]: cameras and draw extraction
//! - [`navigation`]: navigation controllers
//! - [`search`]: search tasks
//! - [`logging`]: engine log forwarding
//! - [`driver`]: the frame driver
//!
//! Callback trampolines and the instance table are internal.

mod callbacks;
mod instances;

pub mod camera;
pub mod driver;
pub mod logging;
pub mod map;
pub mod navigation;
pub mod search;

pub use camera::{Camera, CameraView};
pub use driver::{FrameDriver, Phase};
pub use instances::{
    live_instances, DistanceHandler, LodHandler, MeshHandler, NotifyHandler, OverrideHandler,
    TextureHandler,
};
pub use logging::{engine_log, install_log_forwarding};
pub use map::Map;
pub use navigation::Navigation;
pub use search::SearchTask;
