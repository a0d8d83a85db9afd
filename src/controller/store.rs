//! Cluster state access for the reconciler
//!
//! Every component receives the store handle explicitly. `KubeStore` talks to
//! the API server; tests use an in-memory implementation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

use crate::crd::{PodSvc, PodSvcStatus};
use crate::error::{Error, Result};

/// Field manager recorded on every write
pub const FIELD_MANAGER: &str = "podsvc-operator";

/// Read and write access to the objects a reconciliation pass touches
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Fetch a PodSvc, `None` when it no longer exists
    async fn get_pod_svc(&self, namespace: &str, name: &str) -> Result<Option<PodSvc>>;

    /// List Pods in `namespace` carrying `label_key=label_value`
    async fn list_pods(&self, namespace: &str, label_key: &str, label_value: &str)
        -> Result<Vec<Pod>>;

    /// List every Service in `namespace`
    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>>;

    /// Fetch a Service, `None` when it does not exist
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service>;

    /// Replace a Service. The object carries the resourceVersion it was read
    /// at, so a concurrent modification fails with a conflict.
    async fn replace_service(&self, namespace: &str, service: &Service) -> Result<Service>;

    /// Delete a Service. Deleting a missing Service succeeds.
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()>;

    /// Publish a new status, replacing all previous entries
    async fn patch_status(&self, pod_svc: &PodSvc, status: &PodSvcStatus) -> Result<()>;
}

/// `ClusterStore` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(e) if e.code == 404)
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_pod_svc(&self, namespace: &str, name: &str) -> Result<Option<PodSvc>> {
        let api: Api<PodSvc> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(ps) => Ok(Some(ps)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(Error::KubeError(e)),
        }
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_key: &str,
        label_value: &str,
    ) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&format!("{}={}", label_key, label_value));
        match api.list(&params).await {
            Ok(list) => Ok(list.items),
            Err(e) if is_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(Error::KubeError(e)),
        }
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        match api.list(&ListParams::default()).await {
            Ok(list) => Ok(list.items),
            Err(e) if is_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(Error::KubeError(e)),
        }
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(svc) => Ok(Some(svc)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(Error::KubeError(e)),
        }
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        Ok(api.create(&params, service).await?)
    }

    async fn replace_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        Ok(api.replace(&service.name_any(), &params, service).await?)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!("Service {}/{} already gone", namespace, name);
                Ok(())
            }
            Err(e) => Err(Error::KubeError(e)),
        }
    }

    async fn patch_status(&self, pod_svc: &PodSvc, status: &PodSvcStatus) -> Result<()> {
        let namespace = pod_svc.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<PodSvc> = Api::namespaced(self.client.clone(), &namespace);

        let patch = serde_json::json!({ "status": status });
        api.patch_status(
            &pod_svc.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;

        Ok(())
    }
}
