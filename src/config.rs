use std::path::PathBuf;
use std::time::Duration;

/// Engine-wide configuration, loaded from environment variables or built in code.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding one snapshot directory per index. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Capacity of each per-index task queue.
    pub queue_capacity: usize,
    /// Finished tasks retained per index before the oldest are evicted.
    pub max_tasks_per_index: usize,
    /// Largest document batch accepted by a single write.
    pub max_batch_documents: usize,
    /// Poll interval used by [`crate::IndexManager::wait_for_task`].
    pub task_poll_interval: Duration,
    /// Default timeout used by [`crate::IndexManager::wait_for_task`].
    pub task_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            queue_capacity: 1000,
            max_tasks_per_index: 1000,
            max_batch_documents: 100_000,
            task_poll_interval: Duration::from_millis(10),
            task_timeout: Duration::from_millis(5000),
        }
    }
}

impl EngineConfig {
    /// Load config from `GRIDDLE_*` environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("GRIDDLE_DATA_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            queue_capacity: env_parse("GRIDDLE_QUEUE_CAPACITY", defaults.queue_capacity).max(1),
            max_tasks_per_index: env_parse(
                "GRIDDLE_MAX_TASKS_PER_INDEX",
                defaults.max_tasks_per_index,
            )
            .max(1),
            max_batch_documents: env_parse(
                "GRIDDLE_MAX_BATCH_DOCUMENTS",
                defaults.max_batch_documents,
            )
            .max(1),
            task_poll_interval: Duration::from_millis(env_parse(
                "GRIDDLE_TASK_POLL_INTERVAL_MS",
                10u64,
            )),
            task_timeout: Duration::from_millis(env_parse("GRIDDLE_TASK_TIMEOUT_MS", 5000u64)),
        }
    }

    /// Config without persistence (for embedding and tests).
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_max_tasks_per_index(mut self, max: usize) -> Self {
        self.max_tasks_per_index = max.max(1);
        self
    }

    pub fn with_max_batch_documents(mut self, max: usize) -> Self {
        self.max_batch_documents = max.max(1);
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "GRIDDLE_DATA_DIR",
            "GRIDDLE_QUEUE_CAPACITY",
            "GRIDDLE_MAX_TASKS_PER_INDEX",
            "GRIDDLE_MAX_BATCH_DOCUMENTS",
            "GRIDDLE_TASK_POLL_INTERVAL_MS",
            "GRIDDLE_TASK_TIMEOUT_MS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = EngineConfig::from_env();
        assert!(config.data_dir.is_none());
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.max_tasks_per_index, 1000);
        assert_eq!(config.max_batch_documents, 100_000);
        assert_eq!(config.task_poll_interval, Duration::from_millis(10));
        assert_eq!(config.task_timeout, Duration::from_millis(5000));
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("GRIDDLE_DATA_DIR", "/tmp/griddle-data");
        std::env::set_var("GRIDDLE_QUEUE_CAPACITY", "16");
        std::env::set_var("GRIDDLE_TASK_TIMEOUT_MS", "250");
        std::env::set_var("GRIDDLE_MAX_TASKS_PER_INDEX", "not-a-number");

        let config = EngineConfig::from_env();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/griddle-data")));
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.task_timeout, Duration::from_millis(250));
        assert_eq!(config.max_tasks_per_index, 1000);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_capacity_is_clamped() {
        clear_env();
        std::env::set_var("GRIDDLE_QUEUE_CAPACITY", "0");
        assert_eq!(EngineConfig::from_env().queue_capacity, 1);
        clear_env();
    }
}
