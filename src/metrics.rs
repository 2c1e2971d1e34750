//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry};
use std::sync::Once;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("chirpstream_cache_hits_total", "Total number of cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("chirpstream_cache_misses_total", "Total number of cache misses"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("chirpstream_cache_size", "Current number of items in cache"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_EVICTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("chirpstream_cache_evictions_total", "Total number of evicted cache entries"),
        &["cache_name"]
    ).expect("metric can be created");

    // Streaming Metrics
    pub static ref STREAM_MESSAGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("chirpstream_stream_messages_total", "Total number of inbound stream messages"),
        &["kind"]
    ).expect("metric can be created");
    pub static ref STREAM_CONNECT_ATTEMPTS_TOTAL: IntCounter = IntCounter::new(
        "chirpstream_stream_connect_attempts_total",
        "Total number of streaming connection attempts"
    ).expect("metric can be created");
    pub static ref STREAM_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("chirpstream_stream_errors_total", "Total number of streaming errors"),
        &["class"]
    ).expect("metric can be created");

    // Event Bus Metrics
    pub static ref EVENTS_PUBLISHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("chirpstream_events_published_total", "Total number of published events"),
        &["kind"]
    ).expect("metric can be created");

    // Polling Metrics
    pub static ref POLLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("chirpstream_polls_total", "Total number of remote polls"),
        &["direction", "status"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration happens on the first call.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(CACHE_HITS_TOTAL.clone()))
            .expect("CACHE_HITS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_MISSES_TOTAL.clone()))
            .expect("CACHE_MISSES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_SIZE.clone()))
            .expect("CACHE_SIZE can be registered");
        REGISTRY
            .register(Box::new(CACHE_EVICTIONS_TOTAL.clone()))
            .expect("CACHE_EVICTIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(STREAM_MESSAGES_TOTAL.clone()))
            .expect("STREAM_MESSAGES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(STREAM_CONNECT_ATTEMPTS_TOTAL.clone()))
            .expect("STREAM_CONNECT_ATTEMPTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(STREAM_ERRORS_TOTAL.clone()))
            .expect("STREAM_ERRORS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(EVENTS_PUBLISHED_TOTAL.clone()))
            .expect("EVENTS_PUBLISHED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(POLLS_TOTAL.clone()))
            .expect("POLLS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
