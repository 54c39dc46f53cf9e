use anyhow::Result;
use kube::api::{DeleteParams, ListParams};
use kube::{Api, Client};
use tracing::debug;

use crate::core::client::kube_resources::Pod;

/// Fetch pods in a specific namespace
pub async fn fetch_pods_by_namespace(client: &Client, namespace: &str) -> Result<Vec<Pod>> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let pod_list = pods.list(&ListParams::default()).await?;

    debug!("Discovered {} pod(s) in namespace '{}'", pod_list.items.len(), namespace);
    Ok(pod_list.items)
}

/// Fetch a single pod by name and namespace; `None` when it does not exist
pub async fn fetch_pod_by_name_and_namespace(
    client: &Client,
    namespace: &str,
    pod_name: &str,
) -> Result<Option<Pod>> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let pod = pods.get_opt(pod_name).await?;

    debug!("Fetched pod {}/{}: found={}", namespace, pod_name, pod.is_some());
    Ok(pod)
}

/// Delete a pod by name and namespace
pub async fn delete_pod(client: &Client, namespace: &str, pod_name: &str) -> Result<()> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    pods.delete(pod_name, &DeleteParams::default()).await?;

    debug!("Requested deletion of pod {}/{}", namespace, pod_name);
    Ok(())
}
