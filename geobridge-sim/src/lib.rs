//! # geobridge-sim
//!
//! An in-process engine behind the same `EngineApi` boundary the native
//! library implements. Used by tests, benchmarks and the headless demo.
//!
//! ```text
//!  test / demo ──queue_texture / set_scene──▸ SimEngine
//!                                                │ map_data_tick
//!                                                ▼
//!                     host load callback ◂── pending resources
//!                                                │ map_render_tick_prepare
//!                                                ▼
//!                  camera override callbacks ◂── per-camera view/proj
//!                                                │ map_render_tick_colliders
//!                                                ▼
//!                collider override callbacks ◂── fixed traversal focus
//! ```
//!
//! Beyond the boundary calls it exposes scripting (`queue_*`, `set_scene`,
//! `evict`, `inject_error`) and inspection (`live_groups`,
//! `resource_user_data`, `collider_traversal`, `deleter_calls`) for
//! assertions.

pub mod engine;
pub mod math;
pub mod scene;
mod state;

pub use engine::{SimEngine, EARTH_MAJOR_RADIUS, EARTH_MINOR_RADIUS};
pub use math::Position;
pub use scene::{MeshSpec, SceneTask, TextureSpec};
pub use state::ColliderTraversal;
