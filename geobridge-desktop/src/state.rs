//! Application state: one simulated map, its camera and navigation, and the
//! frame driver that ticks them.

use std::sync::Arc;

use geobridge_core::{DrawCategory, LogMask};
use geobridge_host::{install_log_forwarding, Camera, FrameDriver, Map, Navigation, SearchTask};
use geobridge_render::{FrameStats, RecordingSubmitter, RenderError, Renderer};
use geobridge_sim::{MeshSpec, SceneTask, SimEngine, TextureSpec};
use log::info;

use crate::config::DriverConfig;

/// Tiles in the demo scene, per side.
const GRID: usize = 4;

enum SearchState {
    Idle,
    Pending(SearchTask),
    Done(usize),
}

/// Totals over a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub faults: u64,
    pub last: FrameStats,
    pub search_results: Option<usize>,
}

pub struct AppState {
    // Dropped before the driver, which owns the map.
    navigation: Navigation,
    search: SearchState,
    driver: FrameDriver<RecordingSubmitter>,
    sim: Arc<SimEngine>,
    config: DriverConfig,
    faults: u64,
}

impl AppState {
    pub fn new(config: DriverConfig) -> Result<Self, RenderError> {
        let sim = Arc::new(SimEngine::new());
        let map = Map::new(sim.clone(), &config.create_options)?;
        install_log_forwarding(map.boundary(), LogMask::ALL)?;
        map.set_config_paths(&config.map_config, &config.auth, "")?;
        map.set_window_size(config.window_width, config.window_height)?;
        map.on_config_ready(|| info!("map config ready"));

        let camera = Camera::new(&map)?;
        camera.set_viewport_size(config.window_width, config.window_height)?;
        let navigation = Navigation::new(&camera)?;
        navigation.set_auto_rotation(config.auto_rotation)?;

        let mut driver = FrameDriver::new(map, Renderer::new(RecordingSubmitter::new()));
        driver.add_camera(camera);
        Ok(Self {
            navigation,
            search: SearchState::Idle,
            driver,
            sim,
            config,
            faults: 0,
        })
    }

    pub fn map(&self) -> &Map {
        self.driver.map()
    }

    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    /// Queue a small textured grid plus a collider and a density texture.
    pub fn load_demo_scene(&self) {
        let map = self.map().handle();
        self.sim.queue_mesh(map, "tile", MeshSpec::quad());
        self.sim
            .queue_texture(map, "tile-color", TextureSpec::rgba(16, 16, 0x80));
        self.sim
            .queue_texture(map, "atmosphere", TextureSpec::rgba(8, 8, 0xff));

        let tiles = (0..GRID * GRID)
            .map(|i| {
                let (x, y) = ((i % GRID) as f32, (i / GRID) as f32);
                SceneTask::new("tile")
                    .with_color_texture("tile-color")
                    .with_center([x, y, 0.0])
            })
            .collect();
        self.sim.set_scene(map, DrawCategory::Opaque, tiles);
        self.sim.set_scene(
            map,
            DrawCategory::Transparent,
            vec![SceneTask::new("tile").with_color([1.0, 1.0, 1.0, 0.5])],
        );
        self.sim
            .set_scene(map, DrawCategory::Colliders, vec![SceneTask::new("tile")]);
        self.sim.set_density_texture(map, Some("atmosphere"));
    }

    pub fn start(&mut self) -> Result<(), RenderError> {
        self.driver.start()?;
        Ok(())
    }

    /// One frame plus the search bookkeeping. A callback fault is logged and
    /// counted; the run continues with the next frame.
    pub fn frame(&mut self) -> Result<FrameStats, RenderError> {
        let stats = match self.driver.frame(self.config.frame_interval()) {
            Ok(stats) => stats,
            Err(RenderError::Bridge(e)) if e.is_fatal() => {
                self.faults += 1;
                log::error!("frame {} aborted: {e}", self.driver.frames() + 1);
                return Ok(FrameStats::default());
            }
            Err(e) => return Err(e),
        };
        self.poll_search()?;
        Ok(stats)
    }

    fn poll_search(&mut self) -> Result<(), RenderError> {
        match &mut self.search {
            SearchState::Idle => {
                let query = &self.config.search_query;
                if !query.is_empty() && self.driver.map().searchable()? {
                    info!("searching for '{query}'");
                    self.search = SearchState::Pending(self.driver.map().search(query)?);
                }
            }
            SearchState::Pending(task) => {
                if task.poll()? {
                    for result in task.results() {
                        info!("search '{}': {result}", task.query());
                    }
                    let count = task.results().len();
                    self.search = SearchState::Done(count);
                }
            }
            SearchState::Done(_) => {}
        }
        Ok(())
    }

    /// Run the configured number of frames, pacing to the frame rate.
    pub fn run(&mut self) -> Result<RunSummary, RenderError> {
        self.start()?;
        let interval = std::time::Duration::from_secs_f64(self.config.frame_interval());
        let mut last = FrameStats::default();
        for frame in 0..self.config.frame_count {
            let started = std::time::Instant::now();
            last = self.frame()?;
            if frame % 60 == 0 {
                info!(
                    "frame {frame}: {} task(s), {} draw call(s), {} collider(s)",
                    last.tasks(),
                    last.draw_calls,
                    last.colliders
                );
            }
            if self.config.frame_rate > 0 {
                if let Some(rest) = interval.checked_sub(started.elapsed()) {
                    std::thread::sleep(rest);
                }
            }
        }
        info!("registry: {:?}", self.map().registry_stats());
        info!("statistics: {}", self.map().statistics()?);
        self.driver.shutdown()?;
        Ok(RunSummary {
            frames: self.driver.frames(),
            faults: self.faults,
            last,
            search_results: match self.search {
                SearchState::Done(count) => Some(count),
                _ => None,
            },
        })
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_run_draws_scene() {
        let mut state = AppState::new(DriverConfig::for_testing()).unwrap();
        state.load_demo_scene();
        let summary = state.run().unwrap();
        assert_eq!(summary.frames, 8);
        assert_eq!(summary.faults, 0);
        assert_eq!(summary.last.count(DrawCategory::Opaque), (GRID * GRID) as u32);
        assert_eq!(summary.last.count(DrawCategory::Transparent), 1);
        assert_eq!(summary.last.colliders, 1);
        assert_eq!(summary.search_results, Some(3));
    }

    #[test]
    fn test_empty_query_skips_search() {
        let config = DriverConfig {
            search_query: String::new(),
            frame_count: 4,
            ..DriverConfig::for_testing()
        };
        let mut state = AppState::new(config).unwrap();
        let summary = state.run().unwrap();
        assert_eq!(summary.search_results, None);
        assert_eq!(summary.last.tasks(), 0);
    }

    #[test]
    fn test_auto_rotation_applied() {
        let state = AppState::new(DriverConfig::for_testing()).unwrap();
        let expected = DriverConfig::for_testing().auto_rotation;
        assert_eq!(state.navigation().auto_rotation().unwrap(), expected);
    }

    #[test]
    fn test_handler_fault_counted_not_fatal() {
        let mut state = AppState::new(DriverConfig::for_testing()).unwrap();
        state
            .map()
            .on_load_texture(|_t: geobridge_render::Texture| Err::<(), _>("no decoder"));
        state.load_demo_scene();
        let summary = state.run().unwrap();
        assert!(summary.faults >= 1);
        assert_eq!(summary.frames, 8 - summary.faults);
    }
}
