//! Metrics for remote calls, dropped records and catalog fallbacks.
//!
//! Recorded through the `metrics` facade; the application decides which
//! recorder (if any) to install. Without one, recording is a no-op.
//!
//! | Metric | Kind | Labels |
//! |---|---|---|
//! | `planner_remote_calls_total` | counter | `store`, `operation`, `outcome` |
//! | `planner_remote_call_duration_seconds` | histogram | `store`, `operation` |
//! | `planner_records_dropped_total` | counter | `collection` |
//! | `planner_catalog_fallbacks_total` | counter | `reason` |
//! | `planner_read_retries_total` | counter | `store` |

use event_planner_core::document::DocumentStoreError;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::future::Future;
use std::sync::Once;
use std::time::Instant;

static DESCRIBE: Once = Once::new();

/// Register all metric descriptions. Idempotent.
pub fn describe() {
    DESCRIBE.call_once(|| {
        describe_counter!(
            "planner_remote_calls_total",
            "Total number of document store calls, by store, operation and outcome"
        );
        describe_histogram!(
            "planner_remote_call_duration_seconds",
            "Time taken by document store calls"
        );
        describe_counter!(
            "planner_records_dropped_total",
            "Total number of remote records dropped because they failed coercion"
        );
        describe_counter!(
            "planner_catalog_fallbacks_total",
            "Total number of times the built-in vendor catalog was substituted"
        );
        describe_counter!(
            "planner_read_retries_total",
            "Total number of retried document store reads"
        );
    });
}

/// Remote call metrics recorder.
pub struct RemoteCallMetrics;

impl RemoteCallMetrics {
    /// Await `call`, recording its outcome and duration.
    pub async fn observe<T>(
        store: &'static str,
        operation: &'static str,
        call: impl Future<Output = Result<T, DocumentStoreError>>,
    ) -> Result<T, DocumentStoreError> {
        let start = Instant::now();
        let result = call.await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) if err.is_transient() => "unavailable",
            Err(_) => "error",
        };
        counter!(
            "planner_remote_calls_total",
            "store" => store,
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
        histogram!(
            "planner_remote_call_duration_seconds",
            "store" => store,
            "operation" => operation
        )
        .record(start.elapsed().as_secs_f64());
        result
    }

    /// Record a retried read.
    pub fn record_retry(store: &'static str) {
        counter!("planner_read_retries_total", "store" => store).increment(1);
    }
}

/// Record a remote record dropped during coercion.
pub fn record_dropped(collection: &'static str) {
    counter!("planner_records_dropped_total", "collection" => collection).increment(1);
}

/// Record a substitution of the built-in vendor catalog.
pub fn record_fallback(reason: &'static str) {
    counter!("planner_catalog_fallbacks_total", "reason" => reason).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn observe_passes_results_through() {
        describe();
        describe();
        let ok = RemoteCallMetrics::observe("events", "query", async { Ok::<_, DocumentStoreError>(3) }).await;
        assert_eq!(ok, Ok(3));

        let err = RemoteCallMetrics::observe("events", "query", async {
            Err::<(), _>(DocumentStoreError::Unavailable("offline".into()))
        })
        .await;
        assert!(err.is_err());

        record_dropped("events");
        record_fallback("empty");
        RemoteCallMetrics::record_retry("events");
    }
}
