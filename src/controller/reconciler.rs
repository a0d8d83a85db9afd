//! Main reconciler for PodSvc resources
//!
//! A pass runs fetch → sync → reclaim → status against an explicit store.
//! Every pass recomputes the desired state from the live Pods and Services,
//! so a pass interrupted by an error is repaired by simply running again.
//! `run_controller` hosts the pass inside the kube-rs controller runtime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::{
    api::Api,
    client::Client,
    runtime::{
        controller::{Action, Controller},
        reflector::ObjectRef,
        watcher::Config,
    },
    ResourceExt,
};
use tracing::{debug, error, info, instrument, warn};

use crate::crd::{PodSvc, PodSvcStatus};
use crate::error::{Error, Phase, Result};

#[cfg(feature = "metrics")]
use super::metrics;
use super::services::{reclaim_orphans, sync_services};
use super::status::{build_status, publish_status};
use super::store::{ClusterStore, KubeStore};

/// Controller name used in logs and metrics
pub const CONTROLLER_NAME: &str = "podsvc";

/// Shared state for the controller
pub struct ControllerState {
    pub client: Client,
    /// Restrict the controller to one namespace; `None` watches all of them
    pub watch_namespace: Option<String>,
}

/// What a successful pass did
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PassSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Orphaned Services removed by this pass
    pub deleted: Vec<String>,
    /// Status published at the end of the pass
    pub status: PodSvcStatus,
}

impl PassSummary {
    /// Number of create, update and delete calls issued
    pub fn mutations(&self) -> usize {
        self.created + self.updated + self.deleted.len()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReconcileOutcome {
    /// The PodSvc is gone or being deleted; nothing was done
    Absent,
    Converged(PassSummary),
}

/// Run one reconciliation pass for the PodSvc `namespace/name`
///
/// Any store failure aborts the pass with `Error::PassAborted` naming the
/// step that failed. Writes made before the failure are kept. The status is
/// only replaced when every Service write and delete succeeded.
#[instrument(skip(store))]
pub async fn reconcile_pod_svc<S>(store: &S, namespace: &str, name: &str) -> Result<ReconcileOutcome>
where
    S: ClusterStore + ?Sized,
{
    let pod_svc = match store
        .get_pod_svc(namespace, name)
        .await
        .map_err(Error::during(Phase::Fetch))?
    {
        Some(ps) => ps,
        None => {
            debug!("PodSvc {}/{} not found, nothing to do", namespace, name);
            return Ok(ReconcileOutcome::Absent);
        }
    };

    if pod_svc.metadata.deletion_timestamp.is_some() {
        // Owner references let the garbage collector remove the Services
        debug!("PodSvc {}/{} is being deleted, skipping", namespace, name);
        return Ok(ReconcileOutcome::Absent);
    }

    let pods = store
        .list_pods(
            namespace,
            &pod_svc.spec.label_name,
            &pod_svc.spec.label_value,
        )
        .await
        .map_err(Error::during(Phase::Fetch))?;

    debug!(
        "PodSvc {}/{} selects {} Pods with {}={}",
        namespace,
        name,
        pods.len(),
        pod_svc.spec.label_name,
        pod_svc.spec.label_value
    );

    let synced = sync_services(store, &pod_svc, &pods)
        .await
        .map_err(Error::during(Phase::Sync))?;

    let deleted = reclaim_orphans(store, &pod_svc, &synced.expected)
        .await
        .map_err(Error::during(Phase::Reclaim))?;

    let status = build_status(synced.entries);
    publish_status(store, &pod_svc, &status)
        .await
        .map_err(Error::during(Phase::Status))?;

    Ok(ReconcileOutcome::Converged(PassSummary {
        created: synced.created,
        updated: synced.updated,
        unchanged: synced.unchanged,
        deleted,
        status,
    }))
}

/// Main entry point to start the controller
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let client = state.client.clone();
    let (pod_svcs, services, pods): (Api<PodSvc>, Api<Service>, Api<Pod>) =
        match &state.watch_namespace {
            Some(ns) => (
                Api::namespaced(client.clone(), ns),
                Api::namespaced(client.clone(), ns),
                Api::namespaced(client.clone(), ns),
            ),
            None => (
                Api::all(client.clone()),
                Api::all(client.clone()),
                Api::all(client.clone()),
            ),
        };

    info!(
        "Starting PodSvc controller (namespace: {})",
        state.watch_namespace.as_deref().unwrap_or("all")
    );

    // Verify CRD exists
    match pod_svcs.list(&Default::default()).await {
        Ok(_) => info!("PodSvc CRD is available"),
        Err(e) => {
            error!("PodSvc CRD not found. Please install the CRD first: {:?}", e);
            return Err(Error::ConfigError("PodSvc CRD not installed".to_string()));
        }
    }

    let controller = Controller::new(pod_svcs, Config::default());
    let cache = controller.store();

    controller
        // Services we created report back to their owner
        .owns::<Service>(services, Config::default())
        // Pods are not owned; map them to every PodSvc that selects them now
        // or listed them on its last pass, so removals and relabels are seen
        .watches(pods, Config::default(), move |pod: Pod| {
            let pod_name = pod.name_any();
            cache
                .state()
                .into_iter()
                .filter(|ps| {
                    ps.selects(&pod)
                        || (ps.namespace() == pod.namespace() && ps.reports_pod(&pod_name))
                })
                .map(|ps| ObjectRef::from_obj(&*ps))
                .collect::<Vec<_>>()
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled: {}", obj),
                Err(e) => warn!("Reconcile error: {:?}", e),
            }
        })
        .await;

    info!("PodSvc controller stopped");
    Ok(())
}

/// The reconciliation function handed to the controller runtime
///
/// Called whenever a PodSvc changes, one of its Services changes, or a Pod
/// it selects (or used to select) changes.
#[instrument(skip(obj, ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<PodSvc>, ctx: Arc<ControllerState>) -> Result<Action> {
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let name = obj.name_any();
    let store = KubeStore::new(ctx.client.clone());

    let started = Instant::now();
    let outcome = reconcile_pod_svc(&store, &namespace, &name).await;
    let elapsed = started.elapsed();

    #[cfg(feature = "metrics")]
    metrics::observe_reconcile_duration_seconds(CONTROLLER_NAME, elapsed.as_secs_f64());

    match outcome? {
        ReconcileOutcome::Absent => {
            #[cfg(feature = "metrics")]
            metrics::clear_matched_pods(&namespace, &name);
        }
        ReconcileOutcome::Converged(summary) => {
            #[cfg(feature = "metrics")]
            {
                metrics::inc_service_operations("created", summary.created);
                metrics::inc_service_operations("updated", summary.updated);
                metrics::inc_service_operations("deleted", summary.deleted.len());
                metrics::set_matched_pods(&namespace, &name, summary.status.entries.len());
            }

            info!(
                "PodSvc {}/{} converged in {:?}: {} pods, {} created, {} updated, {} deleted",
                namespace,
                name,
                elapsed,
                summary.status.entries.len(),
                summary.created,
                summary.updated,
                summary.deleted.len()
            );
        }
    }

    Ok(Action::await_change())
}

/// Error policy determines how to handle reconciliation errors
fn error_policy(pod_svc: Arc<PodSvc>, error: &Error, _ctx: Arc<ControllerState>) -> Action {
    error!(
        "Reconciliation error for {}: {:?}",
        pod_svc.name_any(),
        error
    );

    #[cfg(feature = "metrics")]
    metrics::inc_reconcile_error(CONTROLLER_NAME, error.metric_label());

    requeue_after(error)
}

/// Delay before an errored PodSvc is tried again
pub fn requeue_after(error: &Error) -> Action {
    // Use shorter retry for retriable errors
    let retry_duration = if error.is_retriable() {
        Duration::from_secs(15)
    } else {
        Duration::from_secs(60)
    };

    Action::requeue(retry_duration)
}
