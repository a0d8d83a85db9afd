//! Prometheus metrics for the PodSvc operator
//!
//! # Exported metrics
//! The `/metrics` endpoint (when built with `--features metrics`) exports the following metrics:
//! - `podsvc_reconcile_duration_seconds` (histogram): reconcile duration labeled by controller.
//! - `podsvc_reconcile_errors_total` (counter): reconcile errors labeled by controller and kind.
//! - `podsvc_service_operations_total` (counter): Service writes labeled by operation.
//! - `podsvc_matched_pods` (gauge): selected Pods labeled by namespace/name.

use std::sync::atomic::{AtomicI64, AtomicU64};

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Labels for operator reconcile metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReconcileLabels {
    /// Controller name, e.g. "podsvc"
    pub controller: String,
}

/// Labels for operator error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub controller: String,
    /// Pass step or error category, e.g. "sync", "reclaim", "kube"
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabels {
    /// "created", "updated" or "deleted"
    pub operation: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PodSvcLabels {
    pub namespace: String,
    pub name: String,
}

/// Histogram tracking reconcile duration (seconds)
pub static RECONCILE_DURATION_SECONDS: Lazy<Family<ReconcileLabels, Histogram>> = Lazy::new(|| {
    fn reconcile_histogram() -> Histogram {
        // 1ms .. ~32s across 16 buckets.
        Histogram::new(exponential_buckets(0.001, 2.0, 16))
    }

    Family::new_with_constructor(reconcile_histogram)
});

/// Counter tracking reconcile errors
pub static RECONCILE_ERRORS_TOTAL: Lazy<Family<ErrorLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Counter tracking Service create/update/delete calls
pub static SERVICE_OPERATIONS_TOTAL: Lazy<Family<OperationLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Gauge tracking how many Pods each PodSvc selected on its last pass
pub static MATCHED_PODS: Lazy<Family<PodSvcLabels, Gauge<i64, AtomicI64>>> =
    Lazy::new(Family::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "podsvc_reconcile_duration_seconds",
        "Duration of reconcile loops in seconds",
        RECONCILE_DURATION_SECONDS.clone(),
    );
    registry.register(
        "podsvc_reconcile_errors",
        "Total number of reconcile errors",
        RECONCILE_ERRORS_TOTAL.clone(),
    );
    registry.register(
        "podsvc_service_operations",
        "Total number of derived Service writes",
        SERVICE_OPERATIONS_TOTAL.clone(),
    );
    registry.register(
        "podsvc_matched_pods",
        "Pods selected by a PodSvc on its last successful pass",
        MATCHED_PODS.clone(),
    );

    registry
});

/// Observe a reconcile duration in seconds.
pub fn observe_reconcile_duration_seconds(controller: &str, seconds: f64) {
    let labels = ReconcileLabels {
        controller: controller.to_string(),
    };
    RECONCILE_DURATION_SECONDS
        .get_or_create(&labels)
        .observe(seconds);
}

/// Increment the reconcile error counter.
pub fn inc_reconcile_error(controller: &str, kind: &str) {
    let labels = ErrorLabels {
        controller: controller.to_string(),
        kind: kind.to_string(),
    };
    RECONCILE_ERRORS_TOTAL.get_or_create(&labels).inc();
}

/// Add `count` Service writes of the given kind.
pub fn inc_service_operations(operation: &str, count: usize) {
    if count == 0 {
        return;
    }
    let labels = OperationLabels {
        operation: operation.to_string(),
    };
    SERVICE_OPERATIONS_TOTAL
        .get_or_create(&labels)
        .inc_by(count as u64);
}

/// Record how many Pods a PodSvc currently selects.
pub fn set_matched_pods(namespace: &str, name: &str, count: usize) {
    let labels = PodSvcLabels {
        namespace: namespace.to_string(),
        name: name.to_string(),
    };
    MATCHED_PODS.get_or_create(&labels).set(count as i64);
}

/// Drop the gauge of a PodSvc that no longer exists.
pub fn clear_matched_pods(namespace: &str, name: &str) {
    let labels = PodSvcLabels {
        namespace: namespace.to_string(),
        name: name.to_string(),
    };
    MATCHED_PODS.remove(&labels);
}
