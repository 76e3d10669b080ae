//! Frame submission: hands extracted draw lists to a graphics backend.
//!
//! The backend itself lives outside the bridge; it plugs in through
//! [`DrawSubmitter`].

use thiserror::Error;

use geobridge_core::engine::DrawCategory;
use geobridge_core::BridgeError;

use crate::draws::{CameraSnapshot, DrawTask, Draws};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("submitting {category} draws failed: {reason}")]
    Submit {
        category: &'static str,
        reason: String,
    },
}

/// Categories drawn each frame, in submission order. Colliders are
/// extracted but never drawn.
pub const DRAWN_CATEGORIES: [DrawCategory; 4] = [
    DrawCategory::Opaque,
    DrawCategory::Transparent,
    DrawCategory::Geodata,
    DrawCategory::Infographics,
];

/// A graphics backend.
pub trait DrawSubmitter {
    fn begin_frame(&mut self, _camera: &CameraSnapshot) {}

    /// Submit one category; returns the number of draw calls issued.
    fn submit(
        &mut self,
        category: DrawCategory,
        camera: &CameraSnapshot,
        tasks: &[DrawTask],
    ) -> Result<u32, RenderError>;

    fn end_frame(&mut self) {}
}

/// Frame statistics returned after each render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub opaque: u32,
    pub transparent: u32,
    pub geodata: u32,
    pub infographics: u32,
    /// Extracted, not drawn.
    pub colliders: u32,
    pub draw_calls: u32,
}

impl FrameStats {
    pub fn tasks(&self) -> u32 {
        self.opaque + self.transparent + self.geodata + self.infographics
    }

    pub fn count(&self, category: DrawCategory) -> u32 {
        match category {
            DrawCategory::Opaque => self.opaque,
            DrawCategory::Transparent => self.transparent,
            DrawCategory::Geodata => self.geodata,
            DrawCategory::Infographics => self.infographics,
            DrawCategory::Colliders => self.colliders,
        }
    }

    fn count_mut(&mut self, category: DrawCategory) -> &mut u32 {
        match category {
            DrawCategory::Opaque => &mut self.opaque,
            DrawCategory::Transparent => &mut self.transparent,
            DrawCategory::Geodata => &mut self.geodata,
            DrawCategory::Infographics => &mut self.infographics,
            DrawCategory::Colliders => &mut self.colliders,
        }
    }

    /// Accumulate another frame (several cameras in one frame).
    pub fn merge(&mut self, other: &FrameStats) {
        for category in DrawCategory::ALL {
            *self.count_mut(category) += other.count(category);
        }
        self.draw_calls += other.draw_calls;
    }
}

/// Submits extracted draws to a backend.
///
/// ```ignore
/// let mut renderer = Renderer::new(RecordingSubmitter::default());
/// let stats = renderer.render(&draws)?;
/// ```
pub struct Renderer<S: DrawSubmitter> {
    submitter: S,
    frames: u64,
}

impl<S: DrawSubmitter> Renderer<S> {
    pub fn new(submitter: S) -> Self {
        Self {
            submitter,
            frames: 0,
        }
    }

    pub fn render(&mut self, draws: &Draws) -> Result<FrameStats, RenderError> {
        let mut stats = FrameStats {
            colliders: draws.colliders.len() as u32,
            ..FrameStats::default()
        };
        self.submitter.begin_frame(&draws.camera);
        for category in DRAWN_CATEGORIES {
            let tasks = draws.list(category);
            *stats.count_mut(category) = tasks.len() as u32;
            if tasks.is_empty() {
                continue;
            }
            let calls = match self.submitter.submit(category, &draws.camera, tasks) {
                Ok(calls) => calls,
                Err(e) => {
                    self.submitter.end_frame();
                    return Err(e);
                }
            };
            stats.draw_calls += calls;
        }
        self.submitter.end_frame();
        self.frames += 1;
        log::trace!("frame {}: {stats:?}", self.frames);
        Ok(stats)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    pub fn submitter_mut(&mut self) -> &mut S {
        &mut self.submitter
    }
}

/// One recorded submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub category: DrawCategory,
    pub camera: CameraSnapshot,
    pub tasks: Vec<DrawTask>,
}

/// Backend that keeps the last frame's submissions. One draw call per task.
#[derive(Debug, Default)]
pub struct RecordingSubmitter {
    current: Vec<Submission>,
    last_frame: Vec<Submission>,
    fail_on: Option<DrawCategory>,
}

impl RecordingSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every submission of `category`.
    pub fn fail_on(mut self, category: DrawCategory) -> Self {
        self.fail_on = Some(category);
        self
    }

    pub fn last_frame(&self) -> &[Submission] {
        &self.last_frame
    }
}

impl DrawSubmitter for RecordingSubmitter {
    fn begin_frame(&mut self, _camera: &CameraSnapshot) {
        self.current.clear();
    }

    fn submit(
        &mut self,
        category: DrawCategory,
        camera: &CameraSnapshot,
        tasks: &[DrawTask],
    ) -> Result<u32, RenderError> {
        if self.fail_on == Some(category) {
            return Err(RenderError::Submit {
                category: category.name(),
                reason: "rejected by recording backend".into(),
            });
        }
        self.current.push(Submission {
            category,
            camera: *camera,
            tasks: tasks.to_vec(),
        });
        Ok(tasks.len() as u32)
    }

    fn end_frame(&mut self) {
        self.last_frame = std::mem::take(&mut self.current);
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn task(marker: u32) -> DrawTask {
        let mut mv = [0.0; 16];
        mv[0] = marker as f32;
        DrawTask {
            mv,
            uvm: [0.0; 9],
            color: [1.0; 4],
            uv_clip: [0.0, 0.0, 1.0, 1.0],
            center: [0.0; 3],
            external_uv: false,
            flat_shading: false,
            mesh: Arc::new(marker),
            tex_color: None,
            tex_mask: None,
        }
    }

    fn draws() -> Draws {
        Draws {
            opaque: vec![task(1), task(2)],
            transparent: vec![task(3)],
            colliders: vec![task(9)],
            ..Draws::default()
        }
    }

    #[test]
    fn test_frame_stats_default() {
        let stats = FrameStats::default();
        assert_eq!(stats.tasks(), 0);
        assert_eq!(stats.draw_calls, 0);
    }

    #[test]
    fn test_colliders_never_submitted() {
        let mut renderer = Renderer::new(RecordingSubmitter::new());
        let stats = renderer.render(&draws()).unwrap();
        assert_eq!(stats.opaque, 2);
        assert_eq!(stats.transparent, 1);
        assert_eq!(stats.colliders, 1);
        assert_eq!(stats.draw_calls, 3);

        let categories: Vec<DrawCategory> = renderer
            .submitter()
            .last_frame()
            .iter()
            .map(|s| s.category)
            .collect();
        assert_eq!(categories, vec![DrawCategory::Opaque, DrawCategory::Transparent]);
    }

    #[test]
    fn test_submission_keeps_task_order() {
        let mut renderer = Renderer::new(RecordingSubmitter::new());
        renderer.render(&draws()).unwrap();
        let opaque = &renderer.submitter().last_frame()[0];
        let markers: Vec<u32> = opaque
            .tasks
            .iter()
            .filter_map(|t| t.mesh_as::<u32>())
            .map(|m| *m)
            .collect();
        assert_eq!(markers, vec![1, 2]);
    }

    #[test]
    fn test_submit_failure_aborts_frame() {
        let mut renderer =
            Renderer::new(RecordingSubmitter::new().fail_on(DrawCategory::Transparent));
        let err = renderer.render(&draws()).unwrap_err();
        assert!(matches!(err, RenderError::Submit { category: "transparent", .. }));
        assert_eq!(renderer.frames(), 0);
    }

    #[test]
    fn test_stats_merge() {
        let mut total = FrameStats::default();
        let frame = FrameStats {
            opaque: 2,
            colliders: 1,
            draw_calls: 2,
            ..FrameStats::default()
        };
        total.merge(&frame);
        total.merge(&frame);
        assert_eq!(total.opaque, 4);
        assert_eq!(total.colliders, 2);
        assert_eq!(total.draw_calls, 4);
    }
}
