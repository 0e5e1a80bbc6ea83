//! Prometheus metrics for the feed ranking pipeline.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Histogram, HistogramVec,
    IntCounterVec,
};
use std::time::Duration;

static COMPONENT_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "feed_component_duration_seconds",
        "Duration of individual pipeline component calls",
        &["stage", "name"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register component duration metric")
});

static COMPONENT_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_component_failures_total",
        "Degraded pipeline component calls (timeout/error)",
        &["stage", "name", "kind"]
    )
    .expect("Failed to register component failures metric")
});

static PIPELINE_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "feed_pipeline_duration_seconds",
        "End-to-end pipeline execution time",
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register pipeline duration metric")
});

static PIPELINE_CANDIDATES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_pipeline_candidates_total",
        "Candidate counts per pipeline checkpoint",
        &["checkpoint"]
    )
    .expect("Failed to register pipeline candidates metric")
});

static FEED_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_requests_total",
        "Feed requests by outcome",
        &["status"]
    )
    .expect("Failed to register feed requests metric")
});

static FEED_IN_NETWORK_RATIO: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "feed_in_network_ratio",
        "Share of in-network candidates in served pages",
        vec![0.0, 0.1, 0.25, 0.5, 0.75, 0.9, 1.0]
    )
    .expect("Failed to register in-network ratio metric")
});

static FEED_AUTHOR_DIVERSITY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "feed_author_diversity",
        "Unique authors divided by page size in served pages",
        vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]
    )
    .expect("Failed to register author diversity metric")
});

static FEED_AVG_SCORE: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "feed_avg_score",
        "Average final score of served pages",
        vec![0.0, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]
    )
    .expect("Failed to register average score metric")
});

/// Record one component call. `failure` is `None` for a clean call, or the
/// failure kind ("timeout" / "error") for a degraded one.
pub fn record_component(stage: &str, name: &str, duration: Duration, failure: Option<&str>) {
    COMPONENT_DURATION_SECONDS
        .with_label_values(&[stage, name])
        .observe(duration.as_secs_f64());
    if let Some(kind) = failure {
        COMPONENT_FAILURES_TOTAL
            .with_label_values(&[stage, name, kind])
            .inc();
    }
}

pub fn record_pipeline_duration(duration: Duration) {
    PIPELINE_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_candidate_count(checkpoint: &str, count: u64) {
    PIPELINE_CANDIDATES_TOTAL
        .with_label_values(&[checkpoint])
        .inc_by(count);
}

pub fn record_feed_request(status: &str) {
    FEED_REQUESTS_TOTAL.with_label_values(&[status]).inc();
}

/// Per-page feed quality snapshot from the metrics side effect.
pub fn record_feed_quality(in_network_ratio: f64, author_diversity: f64, avg_score: f64) {
    FEED_IN_NETWORK_RATIO.observe(in_network_ratio);
    FEED_AUTHOR_DIVERSITY.observe(author_diversity);
    FEED_AVG_SCORE.observe(avg_score);
}
