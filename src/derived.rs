//! Derived metrics: rates, ratios and estimates computed from raw counters.
//!
//! Every function here returns `None` instead of a non-finite number. A `None`
//! means "do not publish this value for this cycle"; the previous value (if
//! any) stays visible to scrapers.

/// Per-second rate for a counter accumulated over `elapsed_minutes`.
///
/// Used for object replication, where the recon files report elapsed time
/// in minutes.
pub fn per_second_over_minutes(counter: f64, elapsed_minutes: f64) -> Option<f64> {
    per_second(counter, elapsed_minutes * 60.0)
}

/// Per-second rate for a counter accumulated over `elapsed_seconds`.
pub fn per_second(counter: f64, elapsed_seconds: f64) -> Option<f64> {
    if !elapsed_seconds.is_finite() || elapsed_seconds <= 0.0 {
        return None;
    }
    finite(counter / elapsed_seconds)
}

/// Converts an elapsed time in minutes to seconds.
pub fn minutes_to_seconds(minutes: f64) -> Option<f64> {
    finite(minutes * 60.0)
}

/// `part / whole`, omitted when `whole` is zero.
pub fn ratio(part: f64, whole: f64) -> Option<f64> {
    if whole == 0.0 {
        return None;
    }
    finite(part / whole)
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Cumulative CPU time counters for one CPU, in clock ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl CpuTimes {
    fn components(&self) -> [(&'static str, u64); 10] {
        [
            ("usr", self.user),
            ("sys", self.system),
            ("idle", self.idle),
            ("nice", self.nice),
            ("iowait", self.iowait),
            ("irq", self.irq),
            ("softirq", self.softirq),
            ("steal", self.steal),
            ("guest", self.guest),
            ("guestnice", self.guest_nice),
        ]
    }
}

/// Splits CPU time into per-component fractions (1.0 = 100%).
///
/// With a previous sample the fractions cover the interval between the two
/// samples. Without one they cover the time since boot. Counters that went
/// backwards (CPU hotplug, counter reset) are treated as a fresh start.
/// Returns `None` when no time elapsed.
pub fn cpu_breakdown(previous: Option<&CpuTimes>, current: &CpuTimes) -> Option<Vec<(&'static str, f64)>> {
    let current = current.components();
    let deltas: Vec<(&'static str, u64)> = match previous {
        Some(previous) => {
            let previous = previous.components();
            let went_backwards = current.iter().zip(&previous).any(|(c, p)| c.1 < p.1);
            if went_backwards {
                current.to_vec()
            } else {
                current
                    .iter()
                    .zip(&previous)
                    .map(|(c, p)| (c.0, c.1 - p.1))
                    .collect()
            }
        }
        None => current.to_vec(),
    };

    let total: u64 = deltas.iter().map(|(_, ticks)| ticks).sum();
    if total == 0 {
        return None;
    }
    Some(
        deltas
            .into_iter()
            .map(|(name, ticks)| (name, ticks as f64 / total as f64))
            .collect(),
    )
}
