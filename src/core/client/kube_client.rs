use std::path::Path;

use anyhow::Result;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

/// Creates a Kubernetes client from an explicit kubeconfig file, or from the
/// inferred configuration (`KUBECONFIG`, in-cluster) when none is given.
pub async fn build_kube_client(kubeconfig: Option<&Path>) -> Result<Client> {
    let client = if let Some(path) = kubeconfig {
        debug!("Using kubeconfig from {}", path.display());
        let kubeconfig = Kubeconfig::read_from(path)?;
        let config =
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
        Client::try_from(config)?
    } else {
        debug!("Using inferred configuration");
        Client::try_default().await?
    };

    debug!("Kubernetes client initialized successfully");
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_kubeconfig_is_an_error() {
        let result = build_kube_client(Some(Path::new("/nonexistent/tele/kubeconfig"))).await;
        assert!(result.is_err());
    }
}
