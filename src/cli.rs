use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::core::util::name_util::special_str;
use crate::domain::cleanup::service::resource_reconciler::ReconcileSettings;
use crate::domain::session::service::session_service::{SessionInputs, SessionOptions};
use crate::errors::AppError;

const MISSING_COMMAND: &str = "requires a command string. example: tele go run main.go";

#[derive(Debug, Parser)]
#[command(
    name = "tele",
    version,
    about = "simple Telepresence wrapper tool for development microservices",
    long_about = "A simple Telepresence wrapper tool for microservice development.\n\n\
                  Runs <shell command> inside a telepresence session named after the\n\
                  current user, repository and branch, then removes what the session\n\
                  left behind in the cluster.",
    after_help = "Example: tele --port 8080:8080 go run main.go"
)]
pub struct Cli {
    /// expose http server port
    #[arg(long, env = "TELE_PORT", default_value = "")]
    pub port: String,

    /// user name for prefix of deployment name. default is home directory name
    #[arg(long, env = "TELE_USER")]
    pub user: Option<String>,

    /// name space of kubernetes
    #[arg(long, env = "TELE_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// execute commands as a super user
    #[arg(long)]
    pub sudo: bool,

    /// shell command passed to bash verbatim, instead of positional tokens
    #[arg(long, value_name = "COMMAND", conflicts_with = "command")]
    pub run: Option<String>,

    /// kubeconfig used for cleanup. Without it kube infers the config
    /// (KUBECONFIG, which may list several files, then ~/.kube/config)
    #[arg(long, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// seconds to wait for the session pod to go away during cleanup
    #[arg(long, env = "TELE_CLEANUP_TIMEOUT", default_value_t = 60)]
    pub cleanup_timeout: u64,

    /// print the deployment name and telepresence command without running them
    #[arg(long)]
    pub dry_run: bool,

    #[arg(
        value_name = "SHELL COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

impl Cli {
    /// The command line handed to `bash -c` inside the session.
    pub fn shell_command(&self) -> Result<String, AppError> {
        if let Some(run) = self.run.as_deref().filter(|r| !r.trim().is_empty()) {
            return Ok(run.to_string());
        }
        if self.command.is_empty() {
            return Err(AppError::InputError(MISSING_COMMAND.into()));
        }

        Ok(self
            .command
            .iter()
            .map(|token| special_str(token))
            .collect::<Vec<_>>()
            .join(" "))
    }

    pub fn session_inputs(&self) -> Result<SessionInputs, AppError> {
        Ok(SessionInputs {
            user: self
                .user
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(default_user),
            namespace: self.namespace.clone(),
            port: self.port.clone(),
            shell_command: self.shell_command()?,
            sudo: self.sudo,
        })
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            kubeconfig: self.kubeconfig.clone(),
            reconcile: ReconcileSettings {
                max_wait: Duration::from_secs(self.cleanup_timeout),
                ..Default::default()
            },
            dry_run: self.dry_run,
        }
    }
}

/// Basename of the home directory.
fn default_user() -> String {
    dirs::home_dir()
        .and_then(|home| home.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "tele".to_string())
}

#[derive(Debug, Parser)]
#[command(
    name = "telename",
    about = "This command converts a string into a string that can be used as a telepresence deployment name."
)]
pub struct TelenameCli {
    /// deployment name to convert
    #[arg(value_name = "DEPLOYMENT NAME", allow_hyphen_values = true)]
    pub name: String,
}
