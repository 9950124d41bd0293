//! The five repeating collection tasks.
//!
//! Each collector belongs to exactly one cadence, decided by the module that
//! gates it. A task runs its collectors back-to-back, then sleeps for its
//! period. Tasks are independent: a slow collector only delays the task it
//! belongs to.
//!
//! A single collector run may take up to one period of its task. External
//! calls inside a run carry their own, shorter bound.

use crate::collectors::{self, Collector, CollectorContext, Outcome};
use crate::config::{CollectionIntervals, Module};
use crate::internal_metrics;
use crate::task_manager::TaskManager;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cadence {
    OneMinute,
    FiveMinutes,
    OneHour,
    ThreeHours,
    SixHours,
}

impl Cadence {
    pub const ALL: [Cadence; 5] = [
        Cadence::OneMinute,
        Cadence::FiveMinutes,
        Cadence::OneHour,
        Cadence::ThreeHours,
        Cadence::SixHours,
    ];

    /// Name used for the task and in log fields.
    pub fn task_name(&self) -> &'static str {
        match self {
            Cadence::OneMinute => "collect_1m",
            Cadence::FiveMinutes => "collect_5m",
            Cadence::OneHour => "collect_1h",
            Cadence::ThreeHours => "collect_3h",
            Cadence::SixHours => "collect_6h",
        }
    }

    pub fn period(&self, intervals: &CollectionIntervals) -> Duration {
        let seconds = match self {
            Cadence::OneMinute => intervals.one_minute,
            Cadence::FiveMinutes => intervals.five_minutes,
            Cadence::OneHour => intervals.one_hour,
            Cadence::ThreeHours => intervals.three_hours,
            Cadence::SixHours => intervals.six_hours,
        };
        Duration::from_secs(seconds)
    }

    /// The task a module's collector runs in.
    pub fn of(module: Module) -> Cadence {
        match module {
            Module::ReadReconFile
            | Module::GatherReplicationEstimate
            | Module::GrabSwiftPartition
            | Module::SwiftDiskUsage
            | Module::SwiftDriveIO
            | Module::CheckObjectServerConnection
            | Module::ExposePerCPUUsage
            | Module::ExposePerNICMetric
            | Module::GrabNICMTU => Cadence::OneMinute,
            Module::CheckSwiftService => Cadence::FiveMinutes,
            Module::RunSMARTCTL => Cadence::OneHour,
            Module::SwiftLogSize | Module::CountFilesPerSwiftDrive => Cadence::ThreeHours,
            Module::GatherStoragePolicyUtilization => Cadence::SixHours,
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.task_name())
    }
}

/// One repeating task and the collectors it owns.
pub struct CollectionTask {
    cadence: Cadence,
    period: Duration,
    collectors: Vec<Arc<dyn Collector>>,
    ctx: CollectorContext,
}

impl CollectionTask {
    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    /// Runs every collector once, in order. Failures are logged and do not
    /// stop the rest of the cycle.
    pub async fn run_cycle(&self) -> Vec<(&'static str, Outcome)> {
        let task = self.cadence.task_name();
        let mut outcomes = Vec::with_capacity(self.collectors.len());

        for collector in &self.collectors {
            let name = collector.name();
            let start = Instant::now();
            let outcome =
                match tokio::time::timeout(self.period, collectors::run_once(collector.as_ref(), &self.ctx)).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => {
                        warn!(task, collector = name, error = %e, "Collector failed, keeping previous values");
                        Outcome::Failure
                    }
                    Err(_) => {
                        warn!(
                            task,
                            collector = name,
                            timeout_secs = self.period.as_secs(),
                            "Collector timed out"
                        );
                        Outcome::Timeout
                    }
                };
            if outcome != Outcome::Disabled {
                internal_metrics::record_collector_run(name, outcome, start.elapsed());
            }
            outcomes.push((name, outcome));
        }

        debug!(task, collectors = outcomes.len(), "Collection cycle finished");
        outcomes
    }

    /// Runs cycles until the shutdown signal flips. The first cycle starts
    /// immediately.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let task = self.cadence.task_name();
        info!(task, period_secs = self.period.as_secs(), collectors = ?self.collector_names(), "Collection task started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = self.run_cycle() => {}
            }
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(self.period) => {}
            }
        }

        info!(task, "Collection task stopped");
    }
}

/// Groups collectors into their cadence tasks.
pub struct Scheduler {
    tasks: Vec<CollectionTask>,
}

impl Scheduler {
    pub fn new(ctx: CollectorContext, collectors: Vec<Arc<dyn Collector>>) -> Self {
        let intervals = ctx.config.collection_intervals;

        let tasks = Cadence::ALL
            .into_iter()
            .map(|cadence| CollectionTask {
                cadence,
                period: cadence.period(&intervals),
                collectors: collectors
                    .iter()
                    .filter(|c| Cadence::of(c.module()) == cadence)
                    .cloned()
                    .collect(),
                ctx: ctx.clone(),
            })
            .collect();

        Self { tasks }
    }

    pub fn tasks(&self) -> &[CollectionTask] {
        &self.tasks
    }

    /// Hands every task to the task manager. Tasks with no collectors are
    /// still spawned so the five-task layout is fixed.
    pub fn spawn(self, task_manager: &TaskManager) {
        for task in self.tasks {
            let shutdown_rx = task_manager.get_shutdown_rx();
            task_manager.spawn(task.cadence.task_name(), task.run(shutdown_rx));
        }
    }
}
