//! Derived Service management for PodSvc
//!
//! Each selected Pod gets one ClusterIP Service named `<podsvc>-<pod>` whose
//! selector is the Pod's full label set and whose ports are the declared ports
//! the Pod exposes. Services owned by the PodSvc that no longer correspond to
//! a selected Pod are deleted.
//!
//! A Pod exposing none of the declared ports still gets a Service with an
//! empty port list. The API server rejects a ClusterIP Service without ports,
//! so such a Pod fails the sync step on every pass until its ports change.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::core::v1::{Pod, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use tracing::{debug, info, instrument};

use crate::crd::{DeclaredPort, PodSvc, PodSvcStatusEntry};
use crate::error::{Error, Result};

use super::ownership::{is_owned_by, set_controller_reference};
use super::ports::match_ports;
use super::store::ClusterStore;

pub const SERVICE_TYPE: &str = "ClusterIP";
pub const DEFAULT_PROTOCOL: &str = "TCP";

/// Label recording which PodSvc a Service was created for
pub const PODSVC_LABEL: &str = "operatorpoc.my.domain/podsvc";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "podsvc-operator";

/// Name of the Service derived for `pod_name`.
///
/// Pod and resource names are DNS labels, so joining them with `-` never
/// maps two Pods of the same resource to one Service.
pub fn service_name(resource_name: &str, pod_name: &str) -> String {
    format!("{}-{}", resource_name, pod_name)
}

/// Labels put on a Service when it is first created
pub fn standard_labels(pod_svc: &PodSvc) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
    labels.insert(PODSVC_LABEL.to_string(), pod_svc.name_any());
    labels
}

/// Convert a declared port into the form the API server stores
///
/// Filling in the server-side defaults keeps an unchanged Service from
/// looking different on every pass.
pub fn service_port(port: &DeclaredPort) -> ServicePort {
    ServicePort {
        port: port.port,
        name: port.name.clone(),
        protocol: Some(
            port.protocol
                .clone()
                .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
        ),
        target_port: Some(
            port.target_port
                .clone()
                .unwrap_or(IntOrString::Int(port.port)),
        ),
        ..Default::default()
    }
}

/// Outcome of a create-or-update call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    Created,
    Updated,
    Unchanged,
}

/// Create the Service `name` or bring the existing one in line with `mutate`
///
/// `mutate` runs against a fresh object when the Service is missing and
/// against a copy of the live object otherwise. Only fields it touches
/// change; an update is sent only when the copy differs from the live object.
pub async fn create_or_update_service<S, F>(
    store: &S,
    namespace: &str,
    name: &str,
    mutate: F,
) -> Result<OperationResult>
where
    S: ClusterStore + ?Sized,
    F: FnOnce(&mut Service) -> Result<()>,
{
    match store.get_service(namespace, name).await? {
        None => {
            let mut service = Service {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            };
            mutate(&mut service)?;
            store.create_service(namespace, &service).await?;
            Ok(OperationResult::Created)
        }
        Some(existing) => {
            let mut service = existing.clone();
            mutate(&mut service)?;
            if service == existing {
                return Ok(OperationResult::Unchanged);
            }
            store.replace_service(namespace, &service).await?;
            Ok(OperationResult::Updated)
        }
    }
}

/// Services touched by one sync step
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncResult {
    /// One status entry per Pod, in Pod name order
    pub entries: Vec<PodSvcStatusEntry>,
    /// Names of every Service that should exist after this pass
    pub expected: BTreeSet<String>,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Create or update the Service of every selected Pod
///
/// Stops at the first failure. Services already written earlier in the loop
/// stay as they are; the next pass converges them.
#[instrument(skip(store, pod_svc, pods), fields(name = %pod_svc.name_any(), pods = pods.len()))]
pub async fn sync_services<S>(store: &S, pod_svc: &PodSvc, pods: &[Pod]) -> Result<SyncResult>
where
    S: ClusterStore + ?Sized,
{
    let namespace = pod_svc.namespace().unwrap_or_else(|| "default".to_string());
    let mut result = SyncResult::default();

    let mut pods: Vec<&Pod> = pods.iter().collect();
    pods.sort_by_key(|p| p.name_any());

    for pod in pods {
        let pod_name = pod.name_any();
        let name = service_name(&pod_svc.name_any(), &pod_name);
        let ports = match_ports(&pod_svc.spec.ports, pod);

        let selector = pod.labels().clone();
        let service_ports: Vec<ServicePort> = ports.matched.iter().map(service_port).collect();

        let op = create_or_update_service(store, &namespace, &name, |svc| {
            // Labels are only stamped on new objects
            if svc.metadata.resource_version.is_none() {
                svc.metadata.labels = Some(standard_labels(pod_svc));
            }
            let spec = svc.spec.get_or_insert_with(ServiceSpec::default);
            spec.selector = Some(selector);
            spec.ports = Some(service_ports);
            spec.type_ = Some(SERVICE_TYPE.to_string());
            set_controller_reference(svc, pod_svc)
        })
        .await?;

        match op {
            OperationResult::Created => {
                info!("Created Service {}/{} for Pod {}", namespace, name, pod_name);
                result.created += 1;
            }
            OperationResult::Updated => {
                info!("Updated Service {}/{} for Pod {}", namespace, name, pod_name);
                result.updated += 1;
            }
            OperationResult::Unchanged => {
                debug!("Service {}/{} already up to date", namespace, name);
                result.unchanged += 1;
            }
        }

        result.expected.insert(name.clone());
        result.entries.push(PodSvcStatusEntry {
            pod_name,
            service_name: name,
            matched_ports: ports.matched,
            unmatched_ports: ports.unmatched,
        });
    }

    Ok(result)
}

/// Delete every Service owned by `pod_svc` whose name is not in `expected`
///
/// Returns the names of the deleted Services.
#[instrument(skip(store, pod_svc, expected), fields(name = %pod_svc.name_any()))]
pub async fn reclaim_orphans<S>(
    store: &S,
    pod_svc: &PodSvc,
    expected: &BTreeSet<String>,
) -> Result<Vec<String>>
where
    S: ClusterStore + ?Sized,
{
    let namespace = pod_svc.namespace().unwrap_or_else(|| "default".to_string());
    let uid = pod_svc
        .uid()
        .ok_or_else(|| Error::MissingUid(format!("{}/{}", namespace, pod_svc.name_any())))?;

    let mut deleted = Vec::new();
    for svc in store.list_services(&namespace).await? {
        if !is_owned_by(&svc, &uid) {
            continue;
        }
        let name = svc.name_any();
        if expected.contains(&name) {
            continue;
        }
        info!("Deleting orphaned Service {}/{}", namespace, name);
        store.delete_service(&namespace, &name).await?;
        deleted.push(name);
    }

    Ok(deleted)
}
