//! Controller module for PodSvc reconciliation
//! This module contains the reconciliation pass, the store it runs against
//! and the controller loop hosting it.

#[cfg(feature = "metrics")]
pub mod metrics;
pub mod ownership;
pub mod ports;
mod reconciler;
pub mod services;
pub mod status;
pub mod store;
#[cfg(test)]
mod test_store;

pub use ports::{match_ports, PortMatch, UNMATCHED_REASON};
pub use reconciler::{
    reconcile_pod_svc, requeue_after, run_controller, ControllerState, PassSummary,
    ReconcileOutcome, CONTROLLER_NAME,
};
pub use services::{service_name, OperationResult};
pub use store::{ClusterStore, KubeStore};
