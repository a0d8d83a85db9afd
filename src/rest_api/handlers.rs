//! HTTP handlers for the REST API

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use kube::{api::Api, ResourceExt};
use tracing::{error, instrument};

use crate::controller::ControllerState;
use crate::crd::PodSvc;

use super::dto::{
    ErrorResponse, HealthResponse, PodSvcDetailResponse, PodSvcListResponse, PodSvcSummary,
};

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Health check endpoint
#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Prometheus text exposition of the operator registry
pub async fn metrics() -> Result<String, ApiError> {
    use prometheus_client::encoding::text::encode;

    let mut buffer = String::new();
    encode(&mut buffer, &crate::controller::metrics::REGISTRY).map_err(|e| {
        error!("Failed to encode metrics: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("encode_failed", &e.to_string())),
        )
    })?;
    Ok(buffer)
}

pub(super) fn summarize(ps: &PodSvc) -> PodSvcSummary {
    let entries = ps
        .status
        .as_ref()
        .map(|s| s.entries.as_slice())
        .unwrap_or_default();

    PodSvcSummary {
        name: ps.name_any(),
        namespace: ps.namespace().unwrap_or_default(),
        selector: format!("{}={}", ps.spec.label_name, ps.spec.label_value),
        declared_ports: ps.spec.ports.len(),
        pods: entries.len(),
        pods_with_unmatched_ports: entries
            .iter()
            .filter(|e| !e.unmatched_ports.is_empty())
            .count(),
    }
}

/// List PodSvcs within the watched scope
#[instrument(skip(state))]
pub async fn list_pod_svcs(
    State(state): State<Arc<ControllerState>>,
) -> Result<Json<PodSvcListResponse>, ApiError> {
    let api: Api<PodSvc> = match &state.watch_namespace {
        Some(ns) => Api::namespaced(state.client.clone(), ns),
        None => Api::all(state.client.clone()),
    };

    match api.list(&Default::default()).await {
        Ok(list) => {
            let items: Vec<PodSvcSummary> = list.items.iter().map(summarize).collect();
            let total = items.len();
            Ok(Json(PodSvcListResponse { items, total }))
        }
        Err(e) => {
            error!("Failed to list PodSvcs: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("list_failed", &e.to_string())),
            ))
        }
    }
}

/// Get a specific PodSvc with its full status
#[instrument(skip(state), fields(name = %name, namespace = %namespace))]
pub async fn get_pod_svc(
    State(state): State<Arc<ControllerState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<PodSvcDetailResponse>, ApiError> {
    let api: Api<PodSvc> = Api::namespaced(state.client.clone(), &namespace);

    match api.get(&name).await {
        Ok(ps) => Ok(Json(PodSvcDetailResponse {
            name: ps.name_any(),
            namespace: ps.namespace().unwrap_or_default(),
            label_name: ps.spec.label_name.clone(),
            label_value: ps.spec.label_value.clone(),
            ports: ps.spec.ports.clone(),
            status: ps.status.clone().unwrap_or_default(),
            created_at: ps.metadata.creation_timestamp.map(|t| t.0.to_rfc3339()),
        })),
        Err(kube::Error::Api(e)) if e.code == 404 => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "not_found",
                &format!("PodSvc {}/{} not found", namespace, name),
            )),
        )),
        Err(e) => {
            error!("Failed to get PodSvc {}/{}: {:?}", namespace, name, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("get_failed", &e.to_string())),
            ))
        }
    }
}
