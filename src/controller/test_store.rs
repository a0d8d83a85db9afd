//! In-memory `ClusterStore` used by the controller tests
//!
//! Mimics the API server closely enough for convergence tests: objects get a
//! resourceVersion, replaces with a stale version conflict, creates of an
//! existing name fail, and deletes of a missing name succeed. Individual
//! operations can be made to fail to exercise the abort paths.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, ContainerPort, Pod, PodSpec, Service};
use kube::api::ObjectMeta;
use kube::error::ErrorResponse;
use kube::ResourceExt;

use crate::crd::{DeclaredPort, PodSvc, PodSvcSpec, PodSvcStatus};
use crate::error::{Error, Result};

use super::store::ClusterStore;

pub const NAMESPACE: &str = "default";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    GetPodSvc,
    ListPods,
    ListServices,
    GetService,
    Create,
    Replace,
    Delete,
    PatchStatus,
}

/// Write calls that reached the store
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Calls {
    pub creates: usize,
    pub replaces: usize,
    pub deletes: usize,
    pub status_patches: usize,
}

impl Calls {
    pub fn mutations(&self) -> usize {
        self.creates + self.replaces + self.deletes
    }
}

type Key = (String, String);

#[derive(Default)]
struct Inner {
    pod_svcs: BTreeMap<Key, PodSvc>,
    pods: Vec<Pod>,
    services: BTreeMap<Key, Service>,
    failures: Vec<(Op, Option<String>)>,
    /// Services modified by another writer right after their next read
    touch_after_read: Vec<String>,
    calls: Calls,
    version: u64,
}

impl Inner {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn check(&self, op: Op, name: Option<&str>) -> Result<()> {
        let hit = self.failures.iter().any(|(o, n)| {
            *o == op && (n.is_none() || n.as_deref() == name)
        });
        if hit {
            return Err(api_error(500, "InternalError", &format!("injected {:?} failure", op)));
        }
        Ok(())
    }
}

fn api_error(code: u16, reason: &str, message: &str) -> Error {
    Error::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: reason.to_string(),
        code,
    }))
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a PodSvc named `name` in the test namespace
    pub fn add_pod_svc(&self, name: &str, label: (&str, &str), ports: Vec<DeclaredPort>) {
        let mut ps = PodSvc::new(
            name,
            PodSvcSpec {
                label_name: label.0.to_string(),
                label_value: label.1.to_string(),
                ports,
            },
        );
        ps.metadata.namespace = Some(NAMESPACE.to_string());
        ps.metadata.uid = Some(format!("uid-{}", name));
        self.put_pod_svc(ps);
    }

    pub fn put_pod_svc(&self, pod_svc: PodSvc) {
        let mut inner = self.inner.lock().unwrap();
        let k = key(&pod_svc.namespace().unwrap(), &pod_svc.name_any());
        inner.pod_svcs.insert(k, pod_svc);
    }

    pub fn remove_pod_svc(&self, name: &str) {
        self.inner.lock().unwrap().pod_svcs.remove(&key(NAMESPACE, name));
    }

    pub fn set_ports(&self, name: &str, ports: Vec<DeclaredPort>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .pod_svcs
            .get_mut(&key(NAMESPACE, name))
            .unwrap()
            .spec
            .ports = ports;
    }

    pub fn pod_svc(&self, name: &str) -> Option<PodSvc> {
        self.inner.lock().unwrap().pod_svcs.get(&key(NAMESPACE, name)).cloned()
    }

    pub fn status(&self, name: &str) -> Option<PodSvcStatus> {
        self.pod_svc(name).and_then(|ps| ps.status)
    }

    /// Add a Pod with the given labels and one container exposing `ports`
    pub fn add_pod(&self, name: &str, labels: &[(&str, &str)], ports: &[i32]) {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(NAMESPACE.to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "main".to_string(),
                    ports: Some(
                        ports
                            .iter()
                            .map(|p| ContainerPort {
                                container_port: *p,
                                ..Default::default()
                            })
                            .collect(),
                    ),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut inner = self.inner.lock().unwrap();
        inner.pods.retain(|p| p.name_any() != name);
        inner.pods.push(pod);
    }

    pub fn remove_pod(&self, name: &str) {
        self.inner.lock().unwrap().pods.retain(|p| p.name_any() != name);
    }

    /// Insert a Service directly, bypassing call counting
    pub fn put_service(&self, mut service: Service) {
        let mut inner = self.inner.lock().unwrap();
        service.metadata.resource_version = Some(inner.next_version());
        let k = key(
            service.metadata.namespace.as_deref().unwrap_or(NAMESPACE),
            &service.name_any(),
        );
        inner.services.insert(k, service);
    }

    pub fn service(&self, name: &str) -> Option<Service> {
        self.inner.lock().unwrap().services.get(&key(NAMESPACE, name)).cloned()
    }

    pub fn service_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .services
            .keys()
            .filter(|(ns, _)| ns == NAMESPACE)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn calls(&self) -> Calls {
        self.inner.lock().unwrap().calls
    }

    pub fn reset_calls(&self) {
        self.inner.lock().unwrap().calls = Calls::default();
    }

    /// Make `op` fail, for every object or only for `name`
    pub fn fail(&self, op: Op, name: Option<&str>) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .push((op, name.map(str::to_string)));
    }

    /// Bump the resourceVersion of Service `name` right after it is next
    /// read, as a concurrent writer would
    pub fn touch_after_read(&self, name: &str) {
        self.inner
            .lock()
            .unwrap()
            .touch_after_read
            .push(name.to_string());
    }

    pub fn heal(&self) {
        self.inner.lock().unwrap().failures.clear();
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn get_pod_svc(&self, namespace: &str, name: &str) -> Result<Option<PodSvc>> {
        let inner = self.inner.lock().unwrap();
        inner.check(Op::GetPodSvc, Some(name))?;
        Ok(inner.pod_svcs.get(&key(namespace, name)).cloned())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_key: &str,
        label_value: &str,
    ) -> Result<Vec<Pod>> {
        let inner = self.inner.lock().unwrap();
        inner.check(Op::ListPods, None)?;
        Ok(inner
            .pods
            .iter()
            .filter(|p| p.namespace().as_deref() == Some(namespace))
            .filter(|p| p.labels().get(label_key).map(String::as_str) == Some(label_value))
            .cloned()
            .collect())
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>> {
        let inner = self.inner.lock().unwrap();
        inner.check(Op::ListServices, None)?;
        Ok(inner
            .services
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, svc)| svc.clone())
            .collect())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        let mut inner = self.inner.lock().unwrap();
        inner.check(Op::GetService, Some(name))?;
        let k = key(namespace, name);
        let found = inner.services.get(&k).cloned();

        if let Some(pos) = inner.touch_after_read.iter().position(|n| n == name) {
            inner.touch_after_read.remove(pos);
            let version = inner.next_version();
            if let Some(svc) = inner.services.get_mut(&k) {
                svc.metadata.resource_version = Some(version);
            }
        }
        Ok(found)
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        let mut inner = self.inner.lock().unwrap();
        let name = service.name_any();
        inner.check(Op::Create, Some(&name))?;
        inner.calls.creates += 1;

        let k = key(namespace, &name);
        if inner.services.contains_key(&k) {
            return Err(api_error(409, "AlreadyExists", "service already exists"));
        }
        let mut stored = service.clone();
        stored.metadata.namespace = Some(namespace.to_string());
        stored.metadata.resource_version = Some(inner.next_version());
        inner.services.insert(k, stored.clone());
        Ok(stored)
    }

    async fn replace_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        let mut inner = self.inner.lock().unwrap();
        let name = service.name_any();
        inner.check(Op::Replace, Some(&name))?;
        inner.calls.replaces += 1;

        let k = key(namespace, &name);
        let current = match inner.services.get(&k) {
            Some(svc) => svc.metadata.resource_version.clone(),
            None => return Err(api_error(404, "NotFound", "service not found")),
        };
        if current != service.metadata.resource_version {
            return Err(api_error(409, "Conflict", "the object has been modified"));
        }
        let mut stored = service.clone();
        stored.metadata.resource_version = Some(inner.next_version());
        inner.services.insert(k, stored.clone());
        Ok(stored)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.check(Op::Delete, Some(name))?;
        inner.calls.deletes += 1;
        inner.services.remove(&key(namespace, name));
        Ok(())
    }

    async fn patch_status(&self, pod_svc: &PodSvc, status: &PodSvcStatus) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.check(Op::PatchStatus, Some(&pod_svc.name_any()))?;
        inner.calls.status_patches += 1;

        let k = key(&pod_svc.namespace().unwrap_or_default(), &pod_svc.name_any());
        match inner.pod_svcs.get_mut(&k) {
            Some(stored) => {
                stored.status = Some(status.clone());
                Ok(())
            }
            None => Err(api_error(404, "NotFound", "podsvc not found")),
        }
    }
}
