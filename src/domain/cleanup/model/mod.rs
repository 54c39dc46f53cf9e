use crate::core::client::kube_resources::Pod;

/// Pod lifecycle phase as seen by the cleanup loop.
///
/// `Terminating` is not a real Kubernetes phase; it stands for any pod that
/// has a deletion timestamp set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
    Terminating,
}

impl PodPhase {
    pub fn of(pod: &Pod) -> Self {
        if pod.metadata.deletion_timestamp.is_some() {
            return PodPhase::Terminating;
        }

        match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod(value: serde_json::Value) -> Pod {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_phase_from_status() {
        let running = pod(json!({ "metadata": { "name": "p" }, "status": { "phase": "Running" } }));
        let pending = pod(json!({ "metadata": { "name": "p" }, "status": { "phase": "Pending" } }));
        let failed = pod(json!({ "metadata": { "name": "p" }, "status": { "phase": "Failed" } }));
        assert_eq!(PodPhase::of(&running), PodPhase::Running);
        assert_eq!(PodPhase::of(&pending), PodPhase::Pending);
        assert_eq!(PodPhase::of(&failed), PodPhase::Failed);
    }

    #[test]
    fn test_deletion_timestamp_means_terminating() {
        let p = pod(json!({
            "metadata": { "name": "p", "deletionTimestamp": "2025-01-01T00:00:00Z" },
            "status": { "phase": "Running" }
        }));
        assert_eq!(PodPhase::of(&p), PodPhase::Terminating);
    }

    #[test]
    fn test_missing_status_is_unknown() {
        let p = pod(json!({ "metadata": { "name": "p" } }));
        assert_eq!(PodPhase::of(&p), PodPhase::Unknown);
    }
}
