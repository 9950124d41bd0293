//! CPU and resident memory of the exporter itself, sampled with `sysinfo`.

use super::{PROCESS_CPU, PROCESS_MEMORY};
use std::time::Duration;
use sysinfo::{Pid, System};
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error};

const SAMPLE_INTERVAL: Duration = Duration::from_secs(15);

pub struct ProcessStats {
    system: System,
    interval: Duration,
}

impl Default for ProcessStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessStats {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            interval: SAMPLE_INTERVAL,
        }
    }

    /// Refreshes the process entry and publishes both gauges. Returns false
    /// once the process can no longer be found.
    fn sample(&mut self, pid: Pid) -> bool {
        if !self.system.refresh_process(pid) {
            return false;
        }
        if let Some(process) = self.system.process(pid) {
            metrics::gauge!(PROCESS_CPU).set(f64::from(process.cpu_usage()));
            metrics::gauge!(PROCESS_MEMORY).set(process.memory() as f64);
        }
        true
    }

    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => pid,
            Err(e) => {
                error!(error = %e, "Failed to get current PID, process stats disabled");
                return;
            }
        };

        let mut interval = time::interval(self.interval);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = interval.tick() => {
                    if !self.sample(pid) {
                        error!(%pid, "Exporter process no longer found, stopping process stats");
                        break;
                    }
                }
            }
        }
        debug!("Process stats task finished.");
    }
}
