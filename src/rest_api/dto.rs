//! Response bodies served by the REST API

use serde::{Deserialize, Serialize};

use crate::crd::{DeclaredPort, PodSvcStatus};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSvcSummary {
    pub name: String,
    pub namespace: String,
    /// `labelName=labelValue` selector
    pub selector: String,
    pub declared_ports: usize,
    /// Pods reported on the last published status
    pub pods: usize,
    /// Pods with at least one declared port they do not expose
    pub pods_with_unmatched_ports: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PodSvcListResponse {
    pub items: Vec<PodSvcSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSvcDetailResponse {
    pub name: String,
    pub namespace: String,
    pub label_name: String,
    pub label_value: String,
    pub ports: Vec<DeclaredPort>,
    pub status: PodSvcStatus,
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}
