//! `SearchTask`: a non-blocking geocoding query.
//!
//! The engine completes searches during data ticks. [`SearchTask::poll`]
//! fetches the result strings once, on the first poll that sees the task
//! done, and serves the cached copy afterwards. The only call that replaces
//! the cache is [`SearchTask::update_distances`].

use std::sync::Arc;

use geobridge_core::error::to_array;
use geobridge_core::{NativeHandle, Result};

use crate::instances::Instance;

pub struct SearchTask {
    instance: Arc<Instance>,
    handle: NativeHandle,
    query: String,
    results: Option<Vec<String>>,
}

impl SearchTask {
    pub(crate) fn new(instance: Arc<Instance>, handle: NativeHandle, query: &str) -> Self {
        Self {
            instance,
            handle,
            query: query.to_string(),
            results: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_done(&self) -> bool {
        self.results.is_some()
    }

    /// `true` once the engine has finished; results are available from then on.
    pub fn poll(&mut self) -> Result<bool> {
        if self.results.is_some() {
            return Ok(true);
        }
        let boundary = &self.instance.boundary;
        if !boundary.call(|e| e.search_get_done(self.handle))? {
            return Ok(false);
        }
        self.results = Some(self.fetch()?);
        log::debug!(
            "search '{}' done with {} results",
            self.query,
            self.results.as_ref().map_or(0, Vec::len)
        );
        Ok(true)
    }

    fn fetch(&self) -> Result<Vec<String>> {
        let boundary = &self.instance.boundary;
        let count = boundary.call(|e| e.search_get_results_count(self.handle))?;
        (0..count)
            .map(|i| boundary.call(|e| e.search_get_result_data(self.handle, i)))
            .collect()
    }

    /// Result strings (opaque JSON), empty while pending.
    pub fn results(&self) -> &[String] {
        self.results.as_deref().unwrap_or_default()
    }

    /// Recompute result distances from `point`.
    ///
    /// On a finished task this deliberately replaces the cached results with
    /// a fresh read, since the distances live inside the result strings.
    /// Order and count stay the same. If the re-read fails the previous
    /// results are kept and the error is returned.
    pub fn update_distances(&mut self, point: &[f64]) -> Result<()> {
        let point = to_array::<3>("point", point)?;
        self.instance
            .boundary
            .call(|e| e.search_update_distances(self.handle, &point))?;
        if self.results.is_some() {
            self.results = Some(self.fetch()?);
        }
        Ok(())
    }
}

impl Drop for SearchTask {
    fn drop(&mut self) {
        if self.instance.is_destroyed() {
            return;
        }
        if let Err(e) = self.instance.boundary.call(|e| e.search_destroy(self.handle)) {
            log::warn!("failed to destroy search '{}': {e}", self.query);
        }
    }
}

impl std::fmt::Debug for SearchTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchTask")
            .field("query", &self.query)
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Map;
    use geobridge_core::BridgeError;
    use geobridge_sim::SimEngine;

    fn ready_map(sim: &Arc<SimEngine>) -> Map {
        let mut map = Map::new(sim.clone(), "").unwrap();
        map.set_config_paths("https://maps.example/config.json", "", "").unwrap();
        map.data_initialize().unwrap();
        map.data_tick().unwrap();
        map
    }

    #[test]
    fn test_search_before_config_ready_fails() {
        let map = Map::new(Arc::new(SimEngine::new()), "").unwrap();
        assert!(!map.searchable().unwrap());
        assert!(matches!(map.search("Paris"), Err(BridgeError::Boundary { code: -20, .. })));
    }

    #[test]
    fn test_results_empty_while_pending() {
        let sim = Arc::new(SimEngine::new());
        let map = ready_map(&sim);
        let mut task = map.search("Paris").unwrap();
        assert!(!task.poll().unwrap());
        assert!(task.results().is_empty());
        assert_eq!(task.query(), "Paris");
    }

    #[test]
    fn test_drop_while_pending_destroys_task() {
        let sim = Arc::new(SimEngine::new());
        let map = ready_map(&sim);
        let task = map.search("Paris").unwrap();
        assert_eq!(sim.live_searches(), 1);
        drop(task);
        assert_eq!(sim.live_searches(), 0);
    }

    #[test]
    fn test_update_distances_refreshes_results() {
        let sim = Arc::new(SimEngine::new());
        sim.set_search_latency(1);
        let map = ready_map(&sim);
        let mut task = map.search("Prague").unwrap();
        map.data_tick().unwrap();
        assert!(task.poll().unwrap());
        let before = task.results().to_vec();
        task.update_distances(&[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(task.results().len(), before.len());
        assert_ne!(task.results(), before.as_slice());
        assert!(task.update_distances(&[0.0]).is_err());
    }

    #[test]
    fn test_poll_after_done_serves_cache() {
        let sim = Arc::new(SimEngine::new());
        let map = ready_map(&sim);
        let mut task = map.search("Paris").unwrap();
        while !task.poll().unwrap() {
            map.data_tick().unwrap();
        }
        let results = task.results().to_vec();
        assert_eq!(results.len(), 3);

        // Neither call is made again once the task is done.
        sim.inject_error("search_get_results_count", -5, "search backend gone");
        sim.inject_error("search_get_done", -5, "search backend gone");
        assert!(task.poll().unwrap());
        assert_eq!(task.results(), results.as_slice());
        assert!(task.is_done());
    }

    #[test]
    fn test_failed_distance_refresh_keeps_results() {
        let sim = Arc::new(SimEngine::new());
        sim.set_search_latency(1);
        let map = ready_map(&sim);
        let mut task = map.search("Prague").unwrap();
        map.data_tick().unwrap();
        assert!(task.poll().unwrap());
        let before = task.results().to_vec();

        sim.inject_error("search_get_results_count", -5, "search backend gone");
        let err = task.update_distances(&[0.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, BridgeError::Boundary { code: -5, .. }));
        assert_eq!(task.results(), before.as_slice());
    }
}
