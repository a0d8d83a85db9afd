//! Status reporting for PodSvc

use kube::ResourceExt;
use tracing::{debug, instrument};

use crate::crd::{PodSvc, PodSvcStatus, PodSvcStatusEntry};
use crate::error::Result;

use super::store::ClusterStore;

/// Build the status published at the end of a pass
///
/// Entries are ordered by Pod name so the reported status does not depend
/// on the order the API server listed the Pods in.
pub fn build_status(mut entries: Vec<PodSvcStatusEntry>) -> PodSvcStatus {
    entries.sort_by(|a, b| a.pod_name.cmp(&b.pod_name));
    PodSvcStatus { entries }
}

/// Replace the published status of `pod_svc` with `status`
#[instrument(skip(store, pod_svc, status), fields(name = %pod_svc.name_any(), entries = status.entries.len()))]
pub async fn publish_status<S>(store: &S, pod_svc: &PodSvc, status: &PodSvcStatus) -> Result<()>
where
    S: ClusterStore + ?Sized,
{
    store.patch_status(pod_svc, status).await?;
    debug!(
        "Published status for {}/{} with {} entries",
        pod_svc.namespace().unwrap_or_default(),
        pod_svc.name_any(),
        status.entries.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pod: &str) -> PodSvcStatusEntry {
        PodSvcStatusEntry {
            pod_name: pod.to_string(),
            service_name: format!("web-{}", pod),
            ..Default::default()
        }
    }

    #[test]
    fn test_entries_sorted_by_pod_name() {
        let status = build_status(vec![entry("c"), entry("a"), entry("b")]);
        let pods: Vec<&str> = status.entries.iter().map(|e| e.pod_name.as_str()).collect();
        assert_eq!(pods, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_no_pods_gives_empty_status() {
        assert_eq!(build_status(Vec::new()), PodSvcStatus::default());
    }
}
