use std::future::Future;
use std::path::PathBuf;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::core::client::cluster_api::KubeClusterApi;
use crate::core::client::kube_client::build_kube_client;
use crate::core::process::command_runner::{
    CommandRunner, OutputLine, RunReport, SessionStatus, StreamKind,
};
use crate::core::process::git;
use crate::core::shutdown::spawn_signal_listener;
use crate::domain::cleanup::service::resource_reconciler::{ReconcileSettings, ResourceReconciler};
use crate::domain::session::model::{ClusterResourceRef, DeploymentName, SessionRequest};
use crate::errors::{internal_error, AppError};

/// Inputs that come from the command line rather than from git.
#[derive(Debug, Clone)]
pub struct SessionInputs {
    pub user: String,
    pub namespace: String,
    pub port: String,
    pub shell_command: String,
    pub sudo: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub kubeconfig: Option<PathBuf>,
    pub reconcile: ReconcileSettings,
    pub dry_run: bool,
}

/// Completes a [`SessionRequest`] with the repository and branch from git.
/// Fails before anything is started when git cannot answer.
pub async fn resolve_request(
    runner: &CommandRunner,
    inputs: SessionInputs,
) -> Result<SessionRequest, AppError> {
    let repository_name = git::repository_name(runner).await?;
    let branch_name = git::branch_name(runner).await?;

    Ok(SessionRequest {
        user: inputs.user,
        repository_name,
        branch_name,
        namespace: inputs.namespace,
        exposed_port: Some(inputs.port).filter(|p| !p.is_empty()),
        shell_command: inputs.shell_command,
        run_as_superuser: inputs.sudo,
    })
}

/// The telepresence invocation for `request`. The format is what the
/// telepresence CLI expects and must not drift.
pub fn compose_proxy_command(request: &SessionRequest, deployment: &DeploymentName) -> String {
    let mut command = format!(
        "telepresence --namespace {} --method inject-tcp --new-deployment {}",
        request.namespace, deployment
    );
    if let Some(port) = &request.exposed_port {
        command.push_str(&format!(" --expose {}", port));
    }
    command.push_str(&format!(" --run bash -c \"{}\"", request.shell_command));

    if request.run_as_superuser {
        command = format!("sudo {}", command);
    }
    command
}

fn print_section(title: &str, value: &str) {
    println!("[{}]:\n {}", title, value);
}

/// Runs one proxy session end to end and returns how the command ended.
///
/// Cleanup runs exactly once after the command has finished, whether it
/// completed, failed or was interrupted.
pub async fn run_session(
    runner: &CommandRunner,
    request: &SessionRequest,
    options: &SessionOptions,
) -> Result<SessionStatus, AppError> {
    print_section("repository", &request.repository_name);
    print_section("branch", &request.branch_name);
    print_section("user", &request.user);
    print_section("namespace", &request.namespace);
    print_section("port", request.exposed_port.as_deref().unwrap_or(""));

    let target = request.resource_ref();
    print_section("deployment", target.name.as_str());
    if target.name.is_empty() {
        return Err(AppError::InputError(
            "user, repository and branch produce an empty deployment name".into(),
        ));
    }

    print_section("request command", &request.shell_command);
    let proxy_command = compose_proxy_command(request, &target.name);
    print_section("Telepresence command", &proxy_command);

    if options.dry_run {
        crate::debug::run_debug(&proxy_command, &target);
        return Ok(SessionStatus::ExitedOk);
    }

    let cancel = CancellationToken::new();
    let listener = spawn_signal_listener(cancel.clone()).map_err(|e| {
        AppError::InternalError(format!("failed to install signal handlers: {}", e))
    })?;

    println!("[result]:");

    let outcome = run_and_cleanup(runner, &proxy_command, cancel, || {
        cleanup_cluster(target.clone(), options.clone())
    })
    .await;
    listener.abort();

    let report = outcome?;
    match &report.status {
        SessionStatus::ExitedOk => println!("\n[tele]: complete"),
        SessionStatus::ExitedWithError(msg) => println!("\n[tele]: command failed: {}", msg),
        SessionStatus::Killed => println!("\n[tele]: command killed"),
    }
    Ok(report.status)
}

/// Runs `command_line` to completion, then calls `cleanup` once whatever the
/// outcome was, and only then reports the outcome.
pub async fn run_and_cleanup<F, Fut>(
    runner: &CommandRunner,
    command_line: &str,
    cancel: CancellationToken,
    cleanup: F,
) -> Result<RunReport, AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let printer = spawn_output_printer(rx);

    let outcome = runner.run(command_line, cancel, tx).await;

    // The runner has dropped every sender by now, so the printer drains and ends.
    if let Err(e) = printer.await.map_err(internal_error) {
        warn!("Output printer failed: {}", e);
    }

    cleanup().await;
    outcome
}

fn spawn_output_printer(mut rx: UnboundedReceiver<OutputLine>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            match line.stream {
                StreamKind::Stdout => println!("{}", line.text),
                StreamKind::Stderr => eprintln!("{}", line.text),
            }
        }
    })
}

async fn cleanup_cluster(target: ClusterResourceRef, options: SessionOptions) {
    match build_kube_client(options.kubeconfig.as_deref()).await {
        Ok(client) => {
            let reconciler = ResourceReconciler::new(KubeClusterApi::new(client), options.reconcile);
            reconciler.reconcile(&target).await;
        }
        Err(e) => {
            let err = AppError::K8sApiError(e.to_string());
            error!("{}; skipping cleanup of {}/{}", err, target.namespace, target.name);
        }
    }
    debug!("Cleanup finished for {}/{}", target.namespace, target.name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn request() -> SessionRequest {
        SessionRequest {
            user: "alice".into(),
            repository_name: "tele".into(),
            branch_name: "main".into(),
            namespace: "dev".into(),
            exposed_port: None,
            shell_command: "go run 'main.go'".into(),
            run_as_superuser: false,
        }
    }

    #[test]
    fn test_compose_without_port() {
        let req = request();
        assert_eq!(
            compose_proxy_command(&req, &req.deployment_name()),
            "telepresence --namespace dev --method inject-tcp --new-deployment alice-tele-main --run bash -c \"go run 'main.go'\""
        );
    }

    #[test]
    fn test_compose_with_port_and_sudo() {
        let req = SessionRequest {
            exposed_port: Some("8080:8080".into()),
            run_as_superuser: true,
            ..request()
        };
        assert_eq!(
            compose_proxy_command(&req, &req.deployment_name()),
            "sudo telepresence --namespace dev --method inject-tcp --new-deployment alice-tele-main --expose 8080:8080 --run bash -c \"go run 'main.go'\""
        );
    }

    #[tokio::test]
    async fn test_dry_run_does_not_spawn() {
        let options = SessionOptions {
            dry_run: true,
            ..Default::default()
        };
        let status = run_session(&CommandRunner::new(), &request(), &options)
            .await
            .unwrap();
        assert_eq!(status, SessionStatus::ExitedOk);
    }

    #[tokio::test]
    async fn test_empty_deployment_name_is_rejected() {
        let req = SessionRequest {
            user: "_".into(),
            repository_name: "_".into(),
            branch_name: "_".into(),
            ..request()
        };
        let err = run_session(&CommandRunner::new(), &req, &SessionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InputError(_)));
    }

    #[tokio::test]
    async fn test_cleanup_runs_once_after_completion() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let counter = cleanups.clone();

        let report = run_and_cleanup(
            &CommandRunner::new(),
            "exit 1",
            CancellationToken::new(),
            || async move {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await
        .unwrap();

        assert!(matches!(report.status, SessionStatus::ExitedWithError(_)));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cleanup_runs_once_after_repeated_cancellation() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let counter = cleanups.clone();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let report = run_and_cleanup(&CommandRunner::new(), "sleep 30", cancel, || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

        assert_eq!(report.status, SessionStatus::Killed);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }
}
