//! Custom Resource Definitions for the PodSvc operator

mod pod_svc;


pub use pod_svc::{
    DeclaredPort, PodSvc, PodSvcSpec, PodSvcStatus, PodSvcStatusEntry, UnmatchedPort,
};
