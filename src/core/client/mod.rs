// Kube-rs based Kubernetes client
pub mod kube_client;
pub mod kube_resources;
pub mod pods;
pub mod services;

// Seam used by the cleanup path
pub mod cluster_api;
pub mod cluster_api_trait;
