use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use latmc_core::{ErrorInfo, McError};

/// Wall clock for one run; all clocktimes are seconds since construction.
#[derive(Debug, Clone)]
pub struct RunClock {
    start: Instant,
}

impl RunClock {
    /// Starts the clock.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed wall-clock seconds.
    pub fn elapsed_s(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for RunClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodically writes a self-describing JSON status snapshot during a run.
#[derive(Debug, Clone)]
pub struct MethodLog {
    /// Status file path; `None` disables writing.
    pub path: Option<PathBuf>,
    /// Minimum wall-clock seconds between writes.
    pub log_frequency_s: f64,
    last_write_s: Option<f64>,
}

impl MethodLog {
    /// Creates a log writing to `path` at most every `log_frequency_s`
    /// seconds.
    pub fn new(path: Option<PathBuf>, log_frequency_s: f64) -> Self {
        Self {
            path,
            log_frequency_s,
            last_write_s: None,
        }
    }

    /// Writes `status` if the path is set and enough wall-clock time has
    /// passed since the last write. Returns whether a write happened.
    pub fn write_status_if_due(
        &mut self,
        clocktime_s: f64,
        status: &serde_json::Value,
    ) -> Result<bool, McError> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(false),
        };
        if let Some(last) = self.last_write_s {
            if clocktime_s - last < self.log_frequency_s {
                return Ok(false);
            }
        }
        let text = serde_json::to_string_pretty(status).map_err(|err| {
            McError::Serde(
                ErrorInfo::new("status-encode", "failed to encode status snapshot")
                    .with_hint(err.to_string()),
            )
        })?;
        fs::write(path, text).map_err(|err| {
            McError::Serde(
                ErrorInfo::new("status-write", "failed to write status snapshot")
                    .with_context("path", path.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?;
        self.last_write_s = Some(clocktime_s);
        Ok(true)
    }
}
