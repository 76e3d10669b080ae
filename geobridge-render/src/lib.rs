//! # geobridge-render
//!
//! Host-side data the engine produces for drawing: decoded resources and
//! per-frame draw lists.
//!
//! ## Architecture
//!
//! ```text
//!  load callback (geobridge-host)
//!       │
//!       ▼
//!  Texture::load / Mesh::load      ◀─── copies engine buffers into host memory
//!       │
//!       ▼
//!  HandleRegistry (geobridge-core) ◀─── token handed back to the engine
//!       │
//!       ▼
//!  Draws::refresh()                ◀─── camera, celestial, five task lists
//!       │
//!       ▼
//!  Renderer.render(&draws)         ◀─── DrawSubmitter backend
//! ```
//!
//! ## Crate modules
//!
//! - [`resources`]: texture and mesh decoding
//! - [`draws`]: draw-list extraction
//! - [`renderer`]: submission seam and frame statistics

pub mod draws;
pub mod renderer;
pub mod resources;

pub use draws::{Atmosphere, CameraSnapshot, Celestial, DrawTask, Draws};
pub use renderer::{
    DrawSubmitter, FrameStats, RecordingSubmitter, RenderError, Renderer, Submission,
    DRAWN_CATEGORIES,
};
pub use resources::{Mesh, Texture, VertexAttribute};
