use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

pub const MIN_INTERVAL_SECS: u64 = 10;
pub const MAX_INTERVAL_SECS: u64 = 120;
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

/// Auto-refresh settings for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSettings {
    interval_secs: u64,
    enabled: bool,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            enabled: false,
        }
    }
}

impl RefreshSettings {
    pub fn new(interval_secs: u64, enabled: bool) -> Self {
        Self {
            interval_secs: clamp_interval(interval_secs),
            enabled,
        }
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_interval(&mut self, interval_secs: u64) {
        self.interval_secs = clamp_interval(interval_secs);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// What the render surface needs to draw the slider and toggle
    pub fn controls(&self) -> RefreshControls {
        RefreshControls {
            interval_secs: self.interval_secs,
            min_interval_secs: MIN_INTERVAL_SECS,
            max_interval_secs: MAX_INTERVAL_SECS,
            auto_refresh: self.enabled,
        }
    }
}

pub fn clamp_interval(interval_secs: u64) -> u64 {
    interval_secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshControls {
    pub interval_secs: u64,
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
    pub auto_refresh: bool,
}

/// Handle to a running auto-refresh loop; the loop is aborted when this is dropped
#[derive(Debug)]
pub struct RefreshTask {
    handle: JoinHandle<()>,
}

impl RefreshTask {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let settings = RefreshSettings::default();
        assert_eq!(settings.interval_secs(), 30);
        assert!(!settings.enabled());
    }

    #[test]
    fn test_interval_is_clamped() {
        assert_eq!(RefreshSettings::new(1, true).interval_secs(), 10);
        assert_eq!(RefreshSettings::new(500, true).interval_secs(), 120);
        assert_eq!(RefreshSettings::new(45, true).interval_secs(), 45);

        let mut settings = RefreshSettings::default();
        settings.set_interval(0);
        assert_eq!(settings.interval_secs(), 10);
    }

    #[test]
    fn test_controls() {
        let controls = RefreshSettings::new(60, true).controls();
        assert_eq!(
            controls,
            RefreshControls {
                interval_secs: 60,
                min_interval_secs: 10,
                max_interval_secs: 120,
                auto_refresh: true,
            }
        );
    }

    #[tokio::test]
    async fn test_dropping_task_aborts_loop() {
        let handle = tokio::spawn(async {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });
        let task = RefreshTask::new(handle);
        assert!(!task.is_finished());

        let abort = task.handle.abort_handle();
        drop(task);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(abort.is_finished());
    }
}
