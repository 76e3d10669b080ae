//! `FrameDriver`: the frame surface contract as a state machine.
//!
//! ```text
//!  Created ──start()──▸ Running ──shutdown()──▸ Finalized
//!                         │  ▲
//!                         └──┘ frame(elapsed):
//!                              data tick → render prepare → render
//!                              → per camera: draws refresh → Renderer
//! ```
//!
//! Calls in any other order fail with `OutOfOrder` without touching the
//! engine.

use geobridge_core::{BridgeError, Result};
use geobridge_render::{DrawSubmitter, Draws, FrameStats, RenderError, Renderer};

use crate::camera::Camera;
use crate::map::Map;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Created,
    Running,
    Finalized,
}

impl Phase {
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Running => "running",
            Phase::Finalized => "finalized",
        }
    }
}

pub struct FrameDriver<S: DrawSubmitter> {
    // Cameras drop before the map they belong to.
    views: Vec<(Camera, Draws)>,
    map: Map,
    renderer: Renderer<S>,
    phase: Phase,
    frames: u64,
}

impl<S: DrawSubmitter> FrameDriver<S> {
    pub fn new(map: Map, renderer: Renderer<S>) -> Self {
        Self {
            views: Vec::new(),
            map,
            renderer,
            phase: Phase::Created,
            frames: 0,
        }
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn renderer(&self) -> &Renderer<S> {
        &self.renderer
    }

    /// Drive `camera` every frame; returns its index.
    pub fn add_camera(&mut self, camera: Camera) -> usize {
        self.views.push((camera, Draws::new()));
        self.views.len() - 1
    }

    pub fn camera(&self, index: usize) -> Option<&Camera> {
        self.views.get(index).map(|(camera, _)| camera)
    }

    /// Draw lists of the last completed frame.
    pub fn draws(&self, index: usize) -> Option<&Draws> {
        self.views.get(index).map(|(_, draws)| draws)
    }

    fn expect_phase(&self, operation: &'static str, expected: Phase) -> Result<()> {
        if self.phase != expected {
            return Err(BridgeError::OutOfOrder {
                operation,
                phase: self.phase.name(),
            });
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.expect_phase("start", Phase::Created)?;
        self.map.data_initialize()?;
        self.map.render_initialize()?;
        self.phase = Phase::Running;
        log::info!("frame driver started for map {:?}", self.map.handle());
        Ok(())
    }

    /// Run one frame. A callback fault aborts the frame and is returned;
    /// the driver stays running.
    pub fn frame(&mut self, elapsed_seconds: f64) -> std::result::Result<FrameStats, RenderError> {
        self.expect_phase("frame", Phase::Running)?;
        self.map.data_tick()?;
        self.map.render_tick_prepare(elapsed_seconds)?;
        self.map.render_tick_render()?;

        let mut stats = FrameStats::default();
        for (camera, draws) in &mut self.views {
            camera.refresh_draws(draws)?;
            stats.merge(&self.renderer.render(draws)?);
        }
        self.frames += 1;
        Ok(stats)
    }

    /// Render finalize, then data finalize. Both run even if the first fails.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.phase {
            Phase::Finalized => {
                return Err(BridgeError::OutOfOrder {
                    operation: "shutdown",
                    phase: self.phase.name(),
                })
            }
            Phase::Created => {
                self.phase = Phase::Finalized;
                return Ok(());
            }
            Phase::Running => {}
        }
        self.phase = Phase::Finalized;
        let render = self.map.render_finalize();
        let data = self.map.data_finalize();
        log::info!(
            "frame driver for map {:?} finalized after {} frames",
            self.map.handle(),
            self.frames
        );
        render.and(data)
    }
}

impl<S: DrawSubmitter> Drop for FrameDriver<S> {
    fn drop(&mut self) {
        if self.phase == Phase::Running {
            if let Err(e) = self.shutdown() {
                log::warn!("frame driver shutdown failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use geobridge_render::RecordingSubmitter;
    use geobridge_sim::SimEngine;

    fn driver() -> FrameDriver<RecordingSubmitter> {
        let map = Map::new(Arc::new(SimEngine::new()), "").unwrap();
        map.set_config_paths("https://maps.example/config.json", "", "")
            .unwrap();
        FrameDriver::new(map, Renderer::new(RecordingSubmitter::new()))
    }

    #[test]
    fn test_frame_before_start_is_out_of_order() {
        let mut driver = driver();
        let err = driver.frame(0.016).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Bridge(BridgeError::OutOfOrder {
                operation: "frame",
                phase: "created"
            })
        ));
    }

    #[test]
    fn test_start_twice_is_out_of_order() {
        let mut driver = driver();
        driver.start().unwrap();
        assert_eq!(
            driver.start(),
            Err(BridgeError::OutOfOrder {
                operation: "start",
                phase: "running"
            })
        );
    }

    #[test]
    fn test_lifecycle_runs_to_finalized() {
        let mut driver = driver();
        let camera = Camera::new(driver.map()).unwrap();
        let index = driver.add_camera(camera);
        driver.start().unwrap();
        for _ in 0..3 {
            driver.frame(1.0 / 60.0).unwrap();
        }
        assert_eq!(driver.frames(), 3);
        assert_eq!(driver.draws(index).unwrap().celestial.name, "Earth");
        driver.shutdown().unwrap();
        assert_eq!(driver.phase(), Phase::Finalized);
        assert!(driver.frame(0.0).is_err());
        assert!(driver.shutdown().is_err());
    }
}
