//! Collect/flush cadence.
//!
//! Every tick either appends one snapshot to the batch or, once
//! `report_every` snapshots have been collected, hands the batch to the
//! reporter and clears it. The decision is taken before the counter moves, so
//! the first tick always collects. Ticks are woken on wall-clock second
//! boundaries rather than by a fixed-period timer.

use crate::cache::BatchCache;
use crate::collectors::MetricSampler;
use crate::logging::{trace, Status};
use crate::metrics::Metrics;
use crate::reporter::Reporter;
use crate::snapshot::Snapshot;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    collect_interval: Duration,
    report_every: u64,
}

impl ScheduleConfig {
    /// `None` if either value is zero.
    pub fn new(collect_interval_secs: u64, report_every_n_collections: u64) -> Option<Self> {
        if collect_interval_secs == 0 || report_every_n_collections == 0 {
            return None;
        }
        Some(Self {
            collect_interval: Duration::from_secs(collect_interval_secs),
            report_every: report_every_n_collections,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    Collect,
    Flush,
}

/// Flush once `counter` collections have accumulated; collect otherwise.
pub fn decide(counter: u64, report_every: u64) -> TickKind {
    if counter > 0 && counter % report_every == 0 {
        TickKind::Flush
    } else {
        TickKind::Collect
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Collected {
        batch_len: usize,
        failed_families: usize,
    },
    Flushed {
        snapshots: usize,
        delivered: bool,
    },
}

/// `now + interval`, truncated to the top of that second.
pub fn next_wake(now: SystemTime, interval: Duration) -> SystemTime {
    let target = now + interval;
    match target.duration_since(UNIX_EPOCH) {
        Ok(since_epoch) => UNIX_EPOCH + Duration::from_secs(since_epoch.as_secs()),
        Err(_) => target,
    }
}

/// `next_wake`, kept at least one second past `previous`. A clock that has
/// stepped back by a full interval or more is followed instead.
pub fn following_wake(
    now: SystemTime,
    previous: Option<SystemTime>,
    interval: Duration,
) -> SystemTime {
    let wake = next_wake(now, interval);
    match previous {
        Some(prev) if wake <= prev => {
            let behind = prev.duration_since(wake).unwrap_or(Duration::ZERO);
            if behind < interval {
                prev + Duration::from_secs(1)
            } else {
                wake
            }
        }
        _ => wake,
    }
}

async fn sleep_until_wall(wake: SystemTime) {
    let delay = wake
        .duration_since(SystemTime::now())
        .unwrap_or(Duration::ZERO);
    tokio::time::sleep_until(Instant::now() + delay).await;
}

pub struct Scheduler<S, R> {
    schedule: ScheduleConfig,
    cache: BatchCache,
    counter: u64,
    sampler: S,
    reporter: R,
    metrics: Arc<Metrics>,
}

impl<S: MetricSampler, R: Reporter> Scheduler<S, R> {
    pub fn new(
        schedule: ScheduleConfig,
        cache: BatchCache,
        sampler: S,
        reporter: R,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            schedule,
            cache,
            counter: 0,
            sampler,
            reporter,
            metrics,
        }
    }

    /// Runs until `shutdown` changes or its sender is dropped. Shutdown is only
    /// observed while waiting for the next tick; the pending batch is dropped.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval = %humantime::format_duration(self.schedule.collect_interval),
            report_every = self.schedule.report_every,
            "{}",
            trace("Scheduler started.", Status::Ok)
        );

        let mut previous = None;
        loop {
            let wake = following_wake(
                SystemTime::now(),
                previous,
                self.schedule.collect_interval,
            );
            previous = Some(wake);
            tokio::select! {
                _ = shutdown.changed() => {
                    if !self.cache.is_empty() {
                        warn!(
                            dropped_snapshots = self.cache.len(),
                            "{}",
                            trace("Pending batch dropped on shutdown.", Status::Error)
                        );
                    }
                    info!("{}", trace("Scheduler stopped.", Status::Ok));
                    break;
                }
                _ = sleep_until_wall(wake) => {}
            }
            self.tick().await;
        }
    }

    pub async fn tick(&mut self) -> TickOutcome {
        match decide(self.counter, self.schedule.report_every) {
            TickKind::Flush => self.flush().await,
            TickKind::Collect => self.collect(SystemTime::now()),
        }
    }

    fn collect(&mut self, now: SystemTime) -> TickOutcome {
        let (snapshot, failures) = Snapshot::build(&mut self.sampler, now);
        for err in &failures {
            warn!(
                family = err.family(),
                error = %err,
                "{}",
                trace("Metric sample failed.", Status::Error)
            );
            self.metrics.inc_sample_error(err.family());
        }

        self.cache.append(snapshot);
        self.counter += 1;
        let batch_len = self.cache.len();
        self.metrics.record_collect(batch_len);
        debug!(
            batch_len,
            counter = self.counter,
            "{}",
            trace("Snapshot collected.", Status::Ok)
        );

        TickOutcome::Collected {
            batch_len,
            failed_families: failures.len(),
        }
    }

    /// The batch is cleared and the counter reset whatever the send outcome.
    async fn flush(&mut self) -> TickOutcome {
        let snapshots = self.cache.len();
        let delivered = match self.reporter.send(self.cache.snapshot_view()).await {
            Ok(()) => {
                debug!(snapshots, "{}", trace("Batch reported.", Status::Ok));
                true
            }
            Err(err) => {
                warn!(
                    snapshots,
                    error = %err,
                    "{}",
                    trace("Batch report failed.", Status::Error)
                );
                false
            }
        };

        self.cache.reset();
        self.counter = 0;
        self.metrics.record_flush(snapshots, delivered);

        TickOutcome::Flushed {
            snapshots,
            delivered,
        }
    }
}
