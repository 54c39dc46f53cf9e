use std::path::Path;

use tracing::debug;

use crate::core::process::command_runner::CommandRunner;
use crate::errors::AppError;

/// Basename of the repository the current directory belongs to.
pub async fn repository_name(runner: &CommandRunner) -> Result<String, AppError> {
    let toplevel = runner.capture("git rev-parse --show-toplevel").await?;
    let name = Path::new(&toplevel)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| AppError::DiscoveryError(format!("unexpected repository path: {}", toplevel)))?;

    debug!("Discovered repository '{}' at {}", name, toplevel);
    Ok(name)
}

/// Name of the checked-out branch (`HEAD` when detached).
pub async fn branch_name(runner: &CommandRunner) -> Result<String, AppError> {
    let branch = runner.capture("git rev-parse --abbrev-ref @").await?;
    debug!("Discovered branch '{}'", branch);
    Ok(branch)
}
