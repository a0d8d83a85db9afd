//! Ownership markers linking derived Services to their PodSvc
//!
//! A Service belongs to a PodSvc when one of its owner references carries the
//! PodSvc's uid. The same reference lets the garbage collector remove the
//! Services once the PodSvc is deleted.

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::crd::PodSvc;
use crate::error::{Error, Result};

/// Create the controller OwnerReference for a PodSvc
pub fn owner_reference(pod_svc: &PodSvc) -> Result<OwnerReference> {
    let uid = pod_svc.uid().ok_or_else(|| Error::MissingUid(qualified_name(pod_svc)))?;
    Ok(OwnerReference {
        api_version: PodSvc::api_version(&()).to_string(),
        kind: PodSvc::kind(&()).to_string(),
        name: pod_svc.name_any(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

/// Mark `pod_svc` as the controller of `service`
///
/// Refreshes an existing reference with the same uid in place. Fails when
/// another object already controls the Service.
pub fn set_controller_reference(service: &mut Service, pod_svc: &PodSvc) -> Result<()> {
    let owner = owner_reference(pod_svc)?;
    let refs = service.metadata.owner_references.get_or_insert_with(Vec::new);

    if let Some(other) = refs
        .iter()
        .find(|r| r.controller == Some(true) && r.uid != owner.uid)
    {
        return Err(Error::AlreadyOwned {
            service: service.metadata.name.clone().unwrap_or_default(),
            owner: format!("{}/{}", other.kind, other.name),
        });
    }

    match refs.iter_mut().find(|r| r.uid == owner.uid) {
        Some(existing) => *existing = owner,
        None => refs.push(owner),
    }
    Ok(())
}

/// Whether any owner reference on `service` points at `uid`
pub fn is_owned_by(service: &Service, uid: &str) -> bool {
    service
        .owner_references()
        .iter()
        .any(|r| r.uid == uid)
}

fn qualified_name(pod_svc: &PodSvc) -> String {
    format!(
        "{}/{}",
        pod_svc.namespace().unwrap_or_default(),
        pod_svc.name_any()
    )
}
