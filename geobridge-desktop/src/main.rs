//! GeoBridge Desktop: headless driver for a simulated map.
//!
//! Loads a [`DriverConfig`] (first CLI argument, optional), builds a demo
//! scene on a `SimEngine` map and ticks it through the frame driver at the
//! configured rate, logging frame statistics along the way.

mod config;
mod state;

use std::process::ExitCode;

use log::info;

use config::DriverConfig;
use state::AppState;

fn main() -> ExitCode {
    env_logger::init();

    let config = match DriverConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Starting GeoBridge Desktop: {}x{}, {} frames at {} fps",
        config.window_width, config.window_height, config.frame_count, config.frame_rate
    );

    let mut state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            log::error!("failed to create map: {e}");
            return ExitCode::FAILURE;
        }
    };
    state.load_demo_scene();

    match state.run() {
        Ok(summary) => {
            info!(
                "Finished after {} frames ({} aborted), last frame {:?}",
                summary.frames, summary.faults, summary.last
            );
            if let Some(count) = summary.search_results {
                info!("search returned {count} result(s)");
            }
            match state.navigation().position_url() {
                Ok(position) => info!("final position {position}"),
                Err(e) => log::warn!("position unavailable: {e}"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("run failed: {e}");
            ExitCode::FAILURE
        }
    }
}
