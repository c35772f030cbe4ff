use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static CACHE_LOOKUP_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("cache_lookup_total", "Response cache lookups by result");
    let vec = IntCounterVec::new(opts, &["result"]).expect("create counter vec");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register cache_lookup_total");
    vec
});

static CACHE_STORE_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new("cache_store_total", "Responses written to the cache")
        .expect("create counter");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register cache_store_total");
    counter
});

static CACHE_STORE_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "cache_store_errors_total",
        "Cache writes dropped because the store failed",
    )
    .expect("create counter");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register cache_store_errors_total");
    counter
});

static BATCH_KEYS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("batch_keys_total", "Batch lookup keys by outcome");
    let vec = IntCounterVec::new(opts, &["outcome"]).expect("create counter vec");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register batch_keys_total");
    vec
});

static WRITEBACK_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "writeback_errors_total",
        "Best-effort batch write-backs that failed",
    )
    .expect("create counter");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register writeback_errors_total");
    counter
});

static STORE_READY: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new("store_ready", "Remote store readiness (1 = ready)")
        .expect("create gauge");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("register store_ready");
    gauge
});

pub fn record_cache_lookup(hit: bool) {
    let label = if hit { "hit" } else { "miss" };
    CACHE_LOOKUP_TOTAL.with_label_values(&[label]).inc();
}

pub fn record_cache_store() {
    CACHE_STORE_TOTAL.inc();
}

pub fn record_cache_store_error() {
    CACHE_STORE_ERRORS_TOTAL.inc();
}

pub fn record_batch_keys(outcome: &str, count: u64) {
    if count > 0 {
        BATCH_KEYS_TOTAL.with_label_values(&[outcome]).inc_by(count);
    }
}

pub fn record_writeback_error() {
    WRITEBACK_ERRORS_TOTAL.inc();
}

pub fn set_store_ready(ready: bool) {
    STORE_READY.set(i64::from(ready));
}

/// Text exposition of every registered metric, for the host application to
/// serve from its own metrics endpoint.
pub fn render() -> Result<String> {
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("failed to encode metrics")?;
    String::from_utf8(buffer).context("metrics exposition was not valid UTF-8")
}
