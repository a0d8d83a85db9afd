//! Matching declared ports against a Pod's container ports

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::Pod;

use crate::crd::{DeclaredPort, UnmatchedPort};

/// Reason reported for every declared port the Pod does not expose
pub const UNMATCHED_REASON: &str = "no matching container port";

/// Declared ports split by whether the Pod exposes them
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PortMatch {
    pub matched: Vec<DeclaredPort>,
    pub unmatched: Vec<UnmatchedPort>,
}

/// Container port numbers exposed by the Pod's containers
pub fn container_ports(pod: &Pod) -> BTreeSet<i32> {
    pod.spec
        .iter()
        .flat_map(|spec| spec.containers.iter())
        .flat_map(|c| c.ports.iter().flatten())
        .map(|p| p.container_port)
        .collect()
}

/// Partition `declared` into ports the Pod exposes and ports it does not.
///
/// Only the port number is compared; name and protocol are carried through
/// untouched. Both halves keep the declared order.
pub fn match_ports(declared: &[DeclaredPort], pod: &Pod) -> PortMatch {
    let exposed = container_ports(pod);

    let (matched, unmatched): (Vec<&DeclaredPort>, Vec<&DeclaredPort>) =
        declared.iter().partition(|p| exposed.contains(&p.port));

    PortMatch {
        matched: matched.into_iter().cloned().collect(),
        unmatched: unmatched
            .into_iter()
            .map(|p| UnmatchedPort {
                port: p.port,
                name: p.name.clone(),
                protocol: p.protocol.clone(),
                reason: UNMATCHED_REASON.to_string(),
            })
            .collect(),
    }
}
