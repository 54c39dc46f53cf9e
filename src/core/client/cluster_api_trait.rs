use anyhow::Result;
use async_trait::async_trait;

use crate::core::client::kube_resources::{Pod, Service};

/// The slice of the Kubernetes API the cleanup path needs.
#[async_trait]
pub trait ClusterApiTrait: Send + Sync {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>>;

    /// `Ok(None)` when the pod does not exist.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;

    /// `Ok(None)` when the service does not exist.
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()>;
}
