use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, Registry, TextEncoder};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Agent self-metrics. Counters only; the batch itself never leaves the
/// scheduler.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    started_at_unix: i64,
    pub agent_ticks_total: CounterVec,
    pub agent_sample_errors_total: CounterVec,
    pub agent_flushes_total: CounterVec,
    pub agent_flushed_snapshots_total: Counter,
    pub agent_batch_snapshots: Gauge,
    pub agent_last_collect_timestamp_seconds: Gauge,
    pub agent_last_flush_timestamp_seconds: Gauge,
    pub agent_uptime_seconds: Gauge,
    pub agent_scrape_count_total: Counter,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let agent_ticks_total = CounterVec::new(
            opts!("agent_ticks_total", "Scheduler ticks by kind"),
            &["kind"],
        )?;
        let agent_sample_errors_total = CounterVec::new(
            opts!(
                "agent_sample_errors_total",
                "Failed metric samples by family"
            ),
            &["family"],
        )?;
        let agent_flushes_total = CounterVec::new(
            opts!("agent_flushes_total", "Batch flushes by outcome"),
            &["outcome"],
        )?;
        let agent_flushed_snapshots_total = Counter::with_opts(opts!(
            "agent_flushed_snapshots_total",
            "Snapshots handed to the reporter, delivered or not"
        ))?;
        let agent_batch_snapshots = Gauge::with_opts(opts!(
            "agent_batch_snapshots",
            "Snapshots currently waiting in the batch"
        ))?;
        let agent_last_collect_timestamp_seconds = Gauge::with_opts(opts!(
            "agent_last_collect_timestamp_seconds",
            "Unix time of the last collected snapshot"
        ))?;
        let agent_last_flush_timestamp_seconds = Gauge::with_opts(opts!(
            "agent_last_flush_timestamp_seconds",
            "Unix time of the last flush attempt"
        ))?;
        let agent_uptime_seconds =
            Gauge::with_opts(opts!("agent_uptime_seconds", "Agent uptime in seconds"))?;
        let agent_scrape_count_total = Counter::with_opts(opts!(
            "agent_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;

        register(&registry, &agent_ticks_total)?;
        register(&registry, &agent_sample_errors_total)?;
        register(&registry, &agent_flushes_total)?;
        register(&registry, &agent_flushed_snapshots_total)?;
        register(&registry, &agent_batch_snapshots)?;
        register(&registry, &agent_last_collect_timestamp_seconds)?;
        register(&registry, &agent_last_flush_timestamp_seconds)?;
        register(&registry, &agent_uptime_seconds)?;
        register(&registry, &agent_scrape_count_total)?;

        Ok(Arc::new(Self {
            registry,
            started_at_unix: now_unix(),
            agent_ticks_total,
            agent_sample_errors_total,
            agent_flushes_total,
            agent_flushed_snapshots_total,
            agent_batch_snapshots,
            agent_last_collect_timestamp_seconds,
            agent_last_flush_timestamp_seconds,
            agent_uptime_seconds,
            agent_scrape_count_total,
        }))
    }

    pub fn record_collect(&self, batch_len: usize) {
        self.agent_ticks_total.with_label_values(&["collect"]).inc();
        self.agent_batch_snapshots.set(batch_len as f64);
        self.agent_last_collect_timestamp_seconds
            .set(now_unix() as f64);
    }

    pub fn record_flush(&self, flushed: usize, delivered: bool) {
        let outcome = if delivered { "ok" } else { "error" };
        self.agent_ticks_total.with_label_values(&["flush"]).inc();
        self.agent_flushes_total.with_label_values(&[outcome]).inc();
        self.agent_flushed_snapshots_total.inc_by(flushed as f64);
        self.agent_batch_snapshots.set(0.0);
        self.agent_last_flush_timestamp_seconds
            .set(now_unix() as f64);
    }

    pub fn inc_sample_error(&self, family: &str) {
        self.agent_sample_errors_total
            .with_label_values(&[family])
            .inc();
    }

    pub fn inc_scrape_count(&self) {
        self.agent_scrape_count_total.inc();
    }

    pub fn uptime_seconds(&self) -> i64 {
        now_unix().saturating_sub(self.started_at_unix)
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        self.agent_uptime_seconds.set(self.uptime_seconds() as f64);
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
