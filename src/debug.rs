use tracing::info;

use crate::domain::session::model::ClusterResourceRef;

/// Runs only with `--dry-run`: reports what a session would do and touches nothing.
pub fn run_debug(proxy_command: &str, target: &ClusterResourceRef) {
    for line in dry_run_report(proxy_command, target) {
        info!("{}", line);
    }
}

fn dry_run_report(proxy_command: &str, target: &ClusterResourceRef) -> Vec<String> {
    vec![
        "🔧 Dry run: nothing will be executed".to_string(),
        format!("Would run: {}", proxy_command),
        format!(
            "Cleanup would target pod and service {}/{}",
            target.namespace, target.name
        ),
    ]
}
