//! Provisioning context shared across integrations.

use std::path::PathBuf;

use crate::config::{DefaultBranch, ProjectConfig};

/// Everything downstream integrations need to know about the provisioned
/// repository.
///
/// Built by the source-control provisioner, immutable afterwards, and
/// passed by reference into every integration — never ambient state.
#[derive(Debug, Clone)]
pub struct ProvisioningContext {
    pub repo_name: String,
    pub remote_url: String,
    pub default_branch: DefaultBranch,
    pub organization: String,
    pub project: String,
    pub dir: PathBuf,
}

impl ProvisioningContext {
    pub fn default_branch_name(&self) -> &'static str {
        self.default_branch.as_str()
    }
}

/// Ordered branch names to create beyond the default.
///
/// Invariants: no duplicates, never contains the default branch, order as
/// configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSet {
    branches: Vec<String>,
}

impl BranchSet {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            branches: config.extra_branches(),
        }
    }

    pub fn new(default: DefaultBranch, candidates: &[&str]) -> Self {
        let mut seen = std::collections::HashSet::new();
        Self {
            branches: candidates
                .iter()
                .copied()
                .filter(|b| *b != default.as_str())
                .filter(|b| seen.insert(b.to_string()))
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.branches.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Full branch list with the default branch first.
    pub fn with_default(&self, default: DefaultBranch) -> Vec<String> {
        let mut all = vec![default.as_str().to_string()];
        all.extend(self.branches.iter().cloned());
        all
    }
}
