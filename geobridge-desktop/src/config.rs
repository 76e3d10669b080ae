//! Driver configuration, read from an optional JSON file.
//!
//! Every field has a default, so a file only needs the keys it changes:
//!
//! ```json
//! { "map_config": "https://maps.example/mapConfig.json", "frame_count": 600 }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid driver config: {0}")]
    Invalid(String),
}

/// Headless driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Opaque JSON handed to map creation.
    pub create_options: String,
    pub map_config: String,
    pub auth: String,
    pub window_width: u32,
    pub window_height: u32,
    /// Frames per second; 0 runs unpaced.
    pub frame_rate: u32,
    pub frame_count: u64,
    /// Issued once the map config is ready. Empty disables the search.
    pub search_query: String,
    /// Degrees per second around the navigation point.
    pub auto_rotation: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            create_options: String::new(),
            map_config: "https://maps.example/mapConfig.json".to_string(),
            auth: String::new(),
            window_width: 1280,
            window_height: 800,
            frame_rate: 60,
            frame_count: 300,
            search_query: String::new(),
            auto_rotation: 5.0,
        }
    }
}

impl DriverConfig {
    /// Small window, unpaced, a handful of frames and a search.
    pub fn for_testing() -> Self {
        Self {
            window_width: 320,
            window_height: 240,
            frame_rate: 0,
            frame_count: 8,
            search_query: "Paris".to_string(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The first argument, when present, names a config file.
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self, ConfigError> {
        match args.next() {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_config.is_empty() {
            return Err(ConfigError::Invalid("map_config is empty".into()));
        }
        if self.window_width == 0 || self.window_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size {}x{}",
                self.window_width, self.window_height
            )));
        }
        if [&self.create_options, &self.map_config, &self.auth, &self.search_query]
            .iter()
            .any(|s| s.contains('\0'))
        {
            return Err(ConfigError::Invalid("strings must not contain nul bytes".into()));
        }
        Ok(())
    }

    /// Seconds per frame handed to the render tick.
    pub fn frame_interval(&self) -> f64 {
        match self.frame_rate {
            0 => 1.0 / 60.0,
            rate => 1.0 / f64::from(rate),
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
