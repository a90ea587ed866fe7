//! Metrics and observability utilities.
//!
//! Prometheus metrics with SLO-aligned histograms and a shared naming prefix, scraped via the
//! query-api's `/metrics` endpoint.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

pub const METRICS_PREFIX: &str = "docexplorer";

/// SLO-aligned histogram buckets for request latency (in seconds).
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.075, 0.100, 0.150, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00,
];

/// Buckets for embedding-service latency, which runs slower than the main query path.
pub const EMBEDDING_BUCKETS: &[f64] = &[0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.00, 30.00];

/// Register all metric descriptions once at startup.
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );
    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search queries, labeled by strategy"
    );
    describe_histogram!(
        format!("{}_main_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Main query execution latency in seconds"
    );
    describe_histogram!(
        format!("{}_count_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Adaptive count query latency in seconds"
    );
    describe_gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of results returned from the most recent search"
    );

    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding service requests"
    );
    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );
    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding service errors"
    );
    describe_gauge!(
        format!("{}_embedding_cache_size", METRICS_PREFIX),
        Unit::Count,
        "Entries currently held in the embedding cache"
    );
    describe_counter!(
        format!("{}_embedding_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding cache hits"
    );
    describe_counter!(
        format!("{}_embedding_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding cache misses"
    );

    describe_histogram!(
        format!("{}_db_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Database query latency in seconds"
    );

    describe_counter!(
        format!("{}_ingestion_records_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Total ingestion records processed, labeled by source"
    );
    describe_counter!(
        format!("{}_ingestion_records_rejected_total", METRICS_PREFIX),
        Unit::Count,
        "Total ingestion records rejected during validation, labeled by source"
    );
    describe_counter!(
        format!("{}_ingestion_batch_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total ingestion batch upsert failures, labeled by source"
    );

    tracing::info!("metrics registered");
}

/// Timer for a single HTTP request, recorded on drop-adjacent completion.
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a completed search, labeled by the strategy the Planner selected (S1/S2/S3).
pub fn record_search(main_query_secs: f64, strategy: &str, result_count: usize) {
    counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        "strategy" => strategy.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_main_query_duration_seconds", METRICS_PREFIX),
        "strategy" => strategy.to_string()
    )
    .record(main_query_secs);

    gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        "strategy" => strategy.to_string()
    )
    .set(result_count as f64);
}

/// Record the adaptive count query's latency, labeled by which tier ran (§4.4.3).
pub fn record_count_query(duration_secs: f64, tier: &str) {
    histogram!(
        format!("{}_count_query_duration_seconds", METRICS_PREFIX),
        "tier" => tier.to_string()
    )
    .record(duration_secs);
}

/// Record an embedding service call.
pub fn record_embedding(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Record an embedding cache lookup and refresh the size gauge.
pub fn record_embedding_cache(hit: bool, current_size: usize) {
    if hit {
        counter!(format!("{}_embedding_cache_hits_total", METRICS_PREFIX)).increment(1);
    } else {
        counter!(format!("{}_embedding_cache_misses_total", METRICS_PREFIX)).increment(1);
    }
    gauge!(format!("{}_embedding_cache_size", METRICS_PREFIX)).set(current_size as f64);
}

/// Record one ingestion batch's outcome, labeled by source.
pub fn record_ingestion(source: &str, processed: usize, rejected: usize, batch_errors: usize) {
    counter!(
        format!("{}_ingestion_records_processed_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(processed as u64);

    counter!(
        format!("{}_ingestion_records_rejected_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(rejected as u64);

    if batch_errors > 0 {
        counter!(
            format!("{}_ingestion_batch_errors_total", METRICS_PREFIX),
            "source" => source.to_string()
        )
        .increment(batch_errors as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_buckets_are_sorted_and_cover_slo_targets() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
        assert!(LATENCY_BUCKETS.contains(&0.050));
        assert!(LATENCY_BUCKETS.contains(&0.150));
    }

    #[test]
    fn request_metrics_runs_without_panic() {
        let metrics = RequestMetrics::start("GET", "/v1/papers");
        std::thread::sleep(std::time::Duration::from_millis(5));
        metrics.finish(200);
    }
}
