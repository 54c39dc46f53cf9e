use anyhow::Result;
use kube::api::DeleteParams;
use kube::{Api, Client};
use tracing::debug;

use crate::core::client::kube_resources::Service;

/// Fetch a single service by name and namespace; `None` when it does not exist
pub async fn fetch_service_by_name_and_namespace(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<Option<Service>> {
    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    let svc = services.get_opt(name).await?;

    debug!("Fetched service {}/{}: found={}", namespace, name, svc.is_some());
    Ok(svc)
}

/// Delete a service by name and namespace
pub async fn delete_service(client: &Client, namespace: &str, name: &str) -> Result<()> {
    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    services.delete(name, &DeleteParams::default()).await?;

    debug!("Requested deletion of service {}/{}", namespace, name);
    Ok(())
}
