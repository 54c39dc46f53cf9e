use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::core::client::cluster_api_trait::ClusterApiTrait;
use crate::domain::cleanup::model::PodPhase;
use crate::domain::session::model::ClusterResourceRef;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_RUNNING_GRACE_POLLS: u32 = 3;
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct ReconcileSettings {
    pub poll_interval: Duration,
    /// Consecutive `Running` polls tolerated before the pod is deleted.
    pub running_grace_polls: u32,
    /// Upper bound on the whole pod polling loop.
    pub max_wait: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            running_grace_polls: DEFAULT_RUNNING_GRACE_POLLS,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

/// Best-effort removal of the Pod and Service left behind by a proxy session.
///
/// Nothing here returns an error: failures are logged so that the session's
/// own exit status is never masked by cleanup.
pub struct ResourceReconciler<A: ClusterApiTrait> {
    api: A,
    settings: ReconcileSettings,
}

impl<A: ClusterApiTrait> ResourceReconciler<A> {
    pub fn new(api: A, settings: ReconcileSettings) -> Self {
        Self { api, settings }
    }

    /// Pod first, then Service.
    pub async fn reconcile(&self, target: &ClusterResourceRef) {
        if target.name.is_empty() {
            warn!("Deployment name is empty; skipping cleanup");
            return;
        }

        info!("{}", self.cleaning_notice());
        self.clean_pod(target).await;
        self.clean_service(target).await;
    }

    /// Cleanup is not interruptible; the notice tells the user how long it may take.
    fn cleaning_notice(&self) -> String {
        format!(
            "tele resource cleaning (up to {}s; Ctrl-C is ignored until it finishes)",
            self.settings.max_wait.as_secs()
        )
    }

    pub async fn clean_service(&self, target: &ClusterResourceRef) {
        let namespace = target.namespace.as_str();
        let name = target.name.as_str();

        match self.api.get_service(namespace, name).await {
            Ok(None) => debug!("Service {}/{} not found; nothing to clean", namespace, name),
            Ok(Some(_)) => match self.api.delete_service(namespace, name).await {
                Ok(()) => info!("service has been deleted"),
                Err(e) => error!(?e, "Failed to delete service {}/{}", namespace, name),
            },
            Err(e) => error!(?e, "Failed to look up service {}/{}", namespace, name),
        }
    }

    pub async fn clean_pod(&self, target: &ClusterResourceRef) {
        let namespace = target.namespace.as_str();
        let name = target.name.as_str();

        // Give the proxy tool a moment to start its own teardown.
        sleep(self.settings.poll_interval).await;

        let pods = match self.api.list_pods(namespace).await {
            Ok(pods) => pods,
            Err(e) => {
                error!(?e, "Failed to list pods in namespace '{}'", namespace);
                return;
            }
        };
        if !pods.iter().any(|p| p.metadata.name.as_deref() == Some(name)) {
            debug!("Pod {}/{} not found; nothing to clean", namespace, name);
            return;
        }

        let deadline = Instant::now() + self.settings.max_wait;
        let mut running_polls = 0u32;
        let mut terminating_logged = false;
        let mut delete_issued = false;

        loop {
            if Instant::now() >= deadline {
                warn!(
                    "Gave up waiting for pod {}/{} after {:?}",
                    namespace, name, self.settings.max_wait
                );
                return;
            }

            sleep(self.settings.poll_interval).await;

            let phase = match self.api.get_pod(namespace, name).await {
                Ok(pod) => pod.as_ref().map(PodPhase::of),
                Err(e) => {
                    error!(?e, "Failed to read pod {}/{}", namespace, name);
                    return;
                }
            };

            match phase {
                None => {
                    info!("pod has been terminated");
                    return;
                }
                Some(PodPhase::Terminating) => {
                    running_polls = 0;
                    if !terminating_logged {
                        info!("waiting for pod {} to terminate...", name);
                        terminating_logged = true;
                    }
                }
                Some(PodPhase::Pending) => {
                    self.delete_pod(namespace, name).await;
                    return;
                }
                Some(PodPhase::Running) => {
                    running_polls += 1;
                    if running_polls > self.settings.running_grace_polls && !delete_issued {
                        self.delete_pod(namespace, name).await;
                        delete_issued = true;
                    }
                }
                Some(other) => {
                    debug!("Pod {}/{} is {:?}; leaving it", namespace, name, other);
                    return;
                }
            }
        }
    }

    async fn delete_pod(&self, namespace: &str, name: &str) {
        match self.api.delete_pod(namespace, name).await {
            Ok(()) => info!("Deleting pod {}/{}", namespace, name),
            Err(e) => error!(?e, "Failed to delete pod {}/{}", namespace, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use serde_json::json;

    use crate::core::client::kube_resources::{ObjectMeta, Pod, PodStatus, Service};
    use crate::domain::session::model::DeploymentName;

    const NAME: &str = "alice-repo-main";

    fn target() -> ClusterResourceRef {
        ClusterResourceRef {
            namespace: "default".into(),
            name: DeploymentName::new(NAME),
        }
    }

    fn pod_in(phase: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(NAME.into()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn terminating_pod() -> Pod {
        serde_json::from_value(json!({
            "metadata": { "name": NAME, "deletionTimestamp": "2025-01-01T00:00:00Z" },
            "status": { "phase": "Running" }
        }))
        .unwrap()
    }

    /// Plays back a fixed sequence of pod observations; once exhausted the pod
    /// is reported as gone. Every call is recorded in order.
    #[derive(Default)]
    struct ScriptedClusterApi {
        listed: Vec<Pod>,
        fail_list: bool,
        observations: Mutex<VecDeque<Option<Pod>>>,
        repeat_last: bool,
        service: Option<Service>,
        fail_service_lookup: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedClusterApi {
        fn with_pod(observations: Vec<Option<Pod>>) -> Self {
            Self {
                listed: vec![pod_in("Running")],
                observations: Mutex::new(observations.into()),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, call: &str) -> usize {
            self.calls().iter().filter(|c| **c == call).count()
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl ClusterApiTrait for ScriptedClusterApi {
        async fn list_pods(&self, _namespace: &str) -> Result<Vec<Pod>> {
            self.record("list_pods");
            if self.fail_list {
                return Err(anyhow!("connection refused"));
            }
            Ok(self.listed.clone())
        }

        async fn get_pod(&self, _namespace: &str, _name: &str) -> Result<Option<Pod>> {
            self.record("get_pod");
            let mut observations = self.observations.lock().unwrap();
            if self.repeat_last && observations.len() == 1 {
                return Ok(observations.front().cloned().flatten());
            }
            Ok(observations.pop_front().flatten())
        }

        async fn delete_pod(&self, _namespace: &str, _name: &str) -> Result<()> {
            self.record("delete_pod");
            Ok(())
        }

        async fn get_service(&self, _namespace: &str, _name: &str) -> Result<Option<Service>> {
            self.record("get_service");
            if self.fail_service_lookup {
                return Err(anyhow!("forbidden"));
            }
            Ok(self.service.clone())
        }

        async fn delete_service(&self, _namespace: &str, _name: &str) -> Result<()> {
            self.record("delete_service");
            Err(anyhow!("delete failed"))
        }
    }

    fn reconciler(api: ScriptedClusterApi) -> ResourceReconciler<ScriptedClusterApi> {
        ResourceReconciler::new(api, ReconcileSettings::default())
    }

    #[test]
    fn test_cleaning_notice_states_bound_and_uninterruptible() {
        let r = ResourceReconciler::new(
            ScriptedClusterApi::default(),
            ReconcileSettings {
                max_wait: Duration::from_secs(5),
                ..Default::default()
            },
        );
        assert_eq!(
            r.cleaning_notice(),
            "tele resource cleaning (up to 5s; Ctrl-C is ignored until it finishes)"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pod_not_listed_is_a_no_op() {
        let r = reconciler(ScriptedClusterApi::default());
        r.clean_pod(&target()).await;
        assert_eq!(r.api.calls(), vec!["list_pods"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pod_not_found_on_poll_stops_without_delete() {
        let r = reconciler(ScriptedClusterApi::with_pod(vec![None]));
        r.clean_pod(&target()).await;
        assert_eq!(r.api.calls(), vec!["list_pods", "get_pod"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_pod_is_deleted_once_after_grace_polls() {
        let running = Some(pod_in("Running"));
        let r = reconciler(ScriptedClusterApi::with_pod(vec![
            running.clone(),
            running.clone(),
            running.clone(),
            running,
        ]));

        r.clean_pod(&target()).await;

        assert_eq!(
            r.api.calls(),
            vec![
                "list_pods",
                "get_pod",
                "get_pod",
                "get_pod",
                "get_pod",
                "delete_pod",
                "get_pod",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_pod_is_not_deleted_twice() {
        let mut observations = vec![Some(pod_in("Running")); 8];
        observations.push(Some(terminating_pod()));
        let r = reconciler(ScriptedClusterApi::with_pod(observations));

        r.clean_pod(&target()).await;

        assert_eq!(r.api.count("delete_pod"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_pod_is_deleted_immediately() {
        let r = reconciler(ScriptedClusterApi::with_pod(vec![Some(pod_in("Pending"))]));
        r.clean_pod(&target()).await;
        assert_eq!(r.api.calls(), vec!["list_pods", "get_pod", "delete_pod"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminating_pod_is_awaited() {
        let r = reconciler(ScriptedClusterApi::with_pod(vec![
            Some(terminating_pod()),
            Some(terminating_pod()),
            None,
        ]));
        r.clean_pod(&target()).await;
        assert_eq!(r.api.count("get_pod"), 3);
        assert_eq!(r.api.count("delete_pod"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_pod_is_left_alone() {
        for phase in ["Succeeded", "Failed", "Unknown"] {
            let r = reconciler(ScriptedClusterApi::with_pod(vec![Some(pod_in(phase))]));
            r.clean_pod(&target()).await;
            assert_eq!(r.api.calls(), vec!["list_pods", "get_pod"], "{phase}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_at_max_wait() {
        let api = ScriptedClusterApi {
            repeat_last: true,
            ..ScriptedClusterApi::with_pod(vec![Some(terminating_pod())])
        };
        let settings = ReconcileSettings {
            max_wait: Duration::from_secs(5),
            ..Default::default()
        };
        let r = ResourceReconciler::new(api, settings);

        r.clean_pod(&target()).await;

        assert_eq!(r.api.count("get_pod"), 5);
        assert_eq!(r.api.count("delete_pod"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_failure_is_swallowed() {
        let r = reconciler(ScriptedClusterApi {
            fail_list: true,
            ..Default::default()
        });
        r.clean_pod(&target()).await;
        assert_eq!(r.api.calls(), vec!["list_pods"]);
    }

    #[tokio::test]
    async fn test_absent_service_is_not_deleted() {
        let r = reconciler(ScriptedClusterApi::default());
        r.clean_service(&target()).await;
        assert_eq!(r.api.calls(), vec!["get_service"]);
    }

    #[tokio::test]
    async fn test_present_service_is_deleted_and_errors_swallowed() {
        let r = reconciler(ScriptedClusterApi {
            service: Some(Service::default()),
            ..Default::default()
        });
        r.clean_service(&target()).await;
        assert_eq!(r.api.calls(), vec!["get_service", "delete_service"]);
    }

    #[tokio::test]
    async fn test_service_lookup_failure_is_swallowed() {
        let r = reconciler(ScriptedClusterApi {
            service: Some(Service::default()),
            fail_service_lookup: true,
            ..Default::default()
        });
        r.clean_service(&target()).await;
        assert_eq!(r.api.calls(), vec!["get_service"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_cleans_pod_then_service() {
        let r = reconciler(ScriptedClusterApi {
            service: Some(Service::default()),
            ..ScriptedClusterApi::with_pod(vec![Some(pod_in("Pending"))])
        });
        r.reconcile(&target()).await;
        assert_eq!(
            r.api.calls(),
            vec!["list_pods", "get_pod", "delete_pod", "get_service", "delete_service"]
        );
    }

    #[tokio::test]
    async fn test_reconcile_skips_empty_name() {
        let r = reconciler(ScriptedClusterApi::default());
        let empty = ClusterResourceRef {
            namespace: "default".into(),
            name: DeploymentName::new("___"),
        };
        r.reconcile(&empty).await;
        assert!(r.api.calls().is_empty());
    }
}
