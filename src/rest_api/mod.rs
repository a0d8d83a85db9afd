//! REST API module for external integrations
//!
//! Provides an HTTP API for health checks, metrics scraping and querying PodSvcs.

mod dto;
mod handlers;
mod server;

pub use server::{router, run_server};
