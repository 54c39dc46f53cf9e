use std::fmt;

use crate::core::util::name_util::to_valid_name;

/// Everything needed to start one proxy session. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub user: String,
    pub repository_name: String,
    pub branch_name: String,
    pub namespace: String,
    pub exposed_port: Option<String>,
    pub shell_command: String,
    pub run_as_superuser: bool,
}

impl SessionRequest {
    /// `user-repository-branch`, sanitized.
    pub fn deployment_name(&self) -> DeploymentName {
        DeploymentName::from_parts(&self.user, &self.repository_name, &self.branch_name)
    }

    pub fn resource_ref(&self) -> ClusterResourceRef {
        ClusterResourceRef {
            namespace: self.namespace.clone(),
            name: self.deployment_name(),
        }
    }
}

/// A name that already satisfies the cluster label grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentName(String);

impl DeploymentName {
    pub fn new(raw: &str) -> Self {
        Self(to_valid_name(raw))
    }

    pub fn from_parts(user: &str, repository: &str, branch: &str) -> Self {
        Self::new(&[user, repository, branch].join("-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lookup key for the Pod and Service a session may leave behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterResourceRef {
    pub namespace: String,
    pub name: DeploymentName,
}
