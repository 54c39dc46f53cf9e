use anyhow::Result;
use kube::Client;

use crate::core::client::cluster_api_trait::ClusterApiTrait;
use crate::core::client::kube_resources::{Pod, Service};
use crate::core::client::{pods, services};

/// [`ClusterApiTrait`] backed by a live kube client.
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ClusterApiTrait for KubeClusterApi {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        pods::fetch_pods_by_namespace(&self.client, namespace).await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        pods::fetch_pod_by_name_and_namespace(&self.client, namespace, name).await
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        pods::delete_pod(&self.client, namespace, name).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        services::fetch_service_by_name_and_namespace(&self.client, namespace, name).await
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        services::delete_service(&self.client, namespace, name).await
    }
}
