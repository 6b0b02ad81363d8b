//! Wall-clock reporting for long-running tool steps.

use std::time::{Duration, Instant};
use tracing::info;

/// Started when a step begins; prints `[3.2s] step` when finished.
pub struct Timer {
    step: String,
    start: Instant,
}

impl Timer {
    pub fn start(step: &str) -> Self {
        Self {
            step: step.to_string(),
            start: Instant::now(),
        }
    }

    /// Report the step's duration on stdout and in the log.
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        info!(step = %self.step, elapsed_ms = elapsed.as_millis() as u64, "step finished");
        println!("  {}", format_elapsed(&self.step, elapsed));
        elapsed
    }
}

/// Seconds below a minute, minutes above, one decimal either way.
fn format_elapsed(step: &str, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    match secs {
        s if s >= 60.0 => format!("[{:.1}m] {step}", s / 60.0),
        s => format!("[{s:.1}s] {step}"),
    }
}
