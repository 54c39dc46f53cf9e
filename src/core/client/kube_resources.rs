/// Re-export the Kubernetes resource types the cleanup path touches.
pub use k8s_openapi::api::core::v1::{Pod, PodStatus, Service};

pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
