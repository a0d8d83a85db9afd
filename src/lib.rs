//! PodSvc operator: per-Pod Services for label-selected Pods
//!
//! This crate provides a Kubernetes operator that watches `PodSvc` resources
//! and keeps one Service per selected Pod, exposing the declared ports the
//! Pod actually listens on, and reports per-Pod match results in the status.

pub mod controller;
pub mod crd;
pub mod error;
pub mod telemetry;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
