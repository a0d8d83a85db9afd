//! PodSvc Custom Resource Definition
//!
//! A PodSvc selects Pods by a single label equality and asks the operator to
//! expose each selected Pod through its own Service, using the subset of the
//! declared ports that the Pod actually listens on.

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "operatorpoc.my.domain",
    version = "v1alpha1",
    kind = "PodSvc",
    namespaced,
    status = "PodSvcStatus",
    shortname = "psvc",
    printcolumn = r#"{"name":"Label","type":"string","jsonPath":".spec.labelName"}"#,
    printcolumn = r#"{"name":"Value","type":"string","jsonPath":".spec.labelValue"}"#,
    printcolumn = r#"{"name":"Pods","type":"integer","jsonPath":".status.entries[*].podName","description":"Number of matching Pods"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PodSvcSpec {
    /// Key of the label used to select Pods
    pub label_name: String,

    /// Value the label must carry for a Pod to be selected
    pub label_value: String,

    /// Desired service ports, matched against the Pod's container ports
    #[schemars(length(min = 1))]
    pub ports: Vec<DeclaredPort>,
}

/// A port the user wants exposed on every selected Pod's Service
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredPort {
    pub port: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// TCP, UDP or SCTP. The API server defaults to TCP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Port on the Pod that traffic is forwarded to. Defaults to `port`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "int_or_string_schema")]
    pub target_port: Option<IntOrString>,
}

/// Structural schema for an `IntOrString` field
fn int_or_string_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
    let mut schema = schemars::schema::SchemaObject::default();
    schema
        .extensions
        .insert("x-kubernetes-int-or-string".to_string(), serde_json::Value::Bool(true));
    schemars::schema::Schema::Object(schema)
}

impl DeclaredPort {
    pub fn new(port: i32) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn named(port: i32, name: &str) -> Self {
        Self {
            port,
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

/// Observed state, rebuilt from scratch on every successful pass
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSvcStatus {
    /// One entry per Pod that matches the selector
    #[serde(default)]
    pub entries: Vec<PodSvcStatusEntry>,
}

/// State of a single selected Pod
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSvcStatusEntry {
    pub pod_name: String,

    /// Name of the Service created for this Pod
    pub service_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_ports: Vec<DeclaredPort>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmatched_ports: Vec<UnmatchedPort>,
}

/// A declared port that no container in the Pod exposes
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedPort {
    pub port: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    pub reason: String,
}

impl PodSvc {
    /// Whether `pod` lives next to this resource and carries the selector label.
    pub fn selects(&self, pod: &Pod) -> bool {
        pod.namespace() == self.namespace()
            && pod.labels().get(&self.spec.label_name) == Some(&self.spec.label_value)
    }

    /// Whether the last published status mentions `pod_name`.
    pub fn reports_pod(&self, pod_name: &str) -> bool {
        self.status
            .as_ref()
            .map(|s| s.entries.iter().any(|e| e.pod_name == pod_name))
            .unwrap_or(false)
    }
}
