//! Project configuration.
//!
//! `wireup.json` lives in the project directory and is written by the
//! project template; this module only reads it. Everything that the source
//! variants hardcoded — branch convention, environment count, retry
//! bounds, role names — is a field here with the observed value as its
//! default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const CONFIG_FILE: &str = "wireup.json";

/// Which branch the provisioner leaves checked out and treats as primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DefaultBranch {
    #[default]
    Main,
    Dev,
}

impl DefaultBranch {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefaultBranch::Main => "main",
            DefaultBranch::Dev => "dev",
        }
    }
}

/// Which environments get eager warehouse schemas and workspace mirrors.
///
/// `DevOnly` defers PROD/STAGE provisioning to the deployment pipeline —
/// an environment-promotion policy, not an omission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum EnvironmentPolicy {
    #[default]
    DevOnly,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentTarget {
    /// Environment label (DEV, STAGE, PROD).
    pub name: String,
    /// Warehouse database backing this environment.
    pub database: String,
    /// Branch whose artifacts deploy into this environment.
    pub branch: String,
    /// Workspace CLI profile for this environment, when the workspace
    /// integration is in use.
    #[serde(default)]
    pub workspace_profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseSettings {
    /// Named connection profile (service principal); validated, not created.
    pub connection: String,
    /// Database holding registered git-repository objects.
    pub utility_database: String,
    /// Schema within the utility database for git-repository objects.
    pub git_schema: String,
    /// API integration the git-repository object is created with.
    pub api_integration: String,
    #[serde(default = "default_engineering_role")]
    pub engineering_role: String,
    /// Warehouse used when registering notebooks and apps.
    #[serde(default)]
    pub query_warehouse: Option<String>,
    #[serde(default = "default_external_access_integration")]
    pub external_access_integration: String,
}

fn default_engineering_role() -> String {
    "GR_AI_ENGINEER".to_string()
}

fn default_external_access_integration() -> String {
    "EXT_XS_INT_PYPI".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Host organization URL (e.g. https://dev.azure.com/acme).
    pub organization: String,
    /// Host project the repository is created under.
    pub project: String,
    #[serde(default)]
    pub default_branch: DefaultBranch,
    #[serde(default = "default_branches")]
    pub branches: Vec<String>,
    #[serde(default)]
    pub environment_policy: EnvironmentPolicy,
    #[serde(default)]
    pub environments: Vec<EnvironmentTarget>,
    #[serde(default)]
    pub warehouse: Option<WarehouseSettings>,
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,
    /// When set, the artifact publisher refuses to run unless the working
    /// tree is on this branch.
    #[serde(default)]
    pub require_working_branch: Option<String>,
    #[serde(default = "default_push_attempts")]
    pub push_attempts: u32,
    #[serde(default = "default_push_retry_delay_secs")]
    pub push_retry_delay_secs: u64,
    #[serde(default = "default_secret_attempts")]
    pub secret_attempts: u32,
    #[serde(default = "default_name_attempts")]
    pub name_attempts: u32,
}

fn default_branches() -> Vec<String> {
    vec!["main".to_string(), "stage".to_string(), "dev".to_string()]
}

fn default_workspace_root() -> String {
    "/Repos".to_string()
}

fn default_push_attempts() -> u32 {
    3
}

fn default_push_retry_delay_secs() -> u64 {
    5
}

fn default_secret_attempts() -> u32 {
    3
}

fn default_name_attempts() -> u32 {
    5
}

impl ProjectConfig {
    /// Load configuration from `wireup.json` in the given directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Err(Error::config_missing_key(
                CONFIG_FILE,
                Some(path.to_string_lossy().to_string()),
            )
            .with_hint(format!(
                "Create {} with at least organization and project set",
                CONFIG_FILE
            )));
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::internal_io(e.to_string(), Some("read wireup.json".to_string())))?;
        let config: ProjectConfig = serde_json::from_str(&content)
            .map_err(|e| Error::config_invalid_json(path.to_string_lossy().to_string(), e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.organization.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "organization",
                None,
                "organization cannot be empty",
            ));
        }
        if self.project.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "project",
                None,
                "project cannot be empty",
            ));
        }
        if self.push_attempts == 0 || self.secret_attempts == 0 {
            return Err(Error::config_invalid_value(
                "pushAttempts/secretAttempts",
                None,
                "retry bounds must be at least 1",
            ));
        }
        Ok(())
    }

    /// Branches to create beyond the default, order preserved, deduplicated.
    pub fn extra_branches(&self) -> Vec<String> {
        let default = self.default_branch.as_str();
        let mut seen = std::collections::HashSet::new();
        self.branches
            .iter()
            .filter(|b| b.as_str() != default)
            .filter(|b| seen.insert(b.as_str().to_string()))
            .cloned()
            .collect()
    }

    /// Environments the optional integrations provision eagerly.
    pub fn eager_environments(&self) -> Vec<&EnvironmentTarget> {
        match self.environment_policy {
            EnvironmentPolicy::All => self.environments.iter().collect(),
            EnvironmentPolicy::DevOnly => self
                .environments
                .iter()
                .filter(|e| e.name.eq_ignore_ascii_case("dev"))
                .collect(),
        }
    }

    /// Environment a branch deploys into (for artifact registration).
    pub fn environment_for_branch(&self, branch: &str) -> Option<&EnvironmentTarget> {
        self.environments.iter().find(|e| e.branch == branch)
    }

    pub fn warehouse(&self) -> Result<&WarehouseSettings> {
        self.warehouse.as_ref().ok_or_else(|| {
            Error::config_missing_key("warehouse", None)
                .with_hint("Add a \"warehouse\" section to wireup.json to enable this integration")
        })
    }
}

/// Expand `~` in a user-supplied directory argument.
pub fn resolve_dir(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, body: &str) {
        fs::write(dir.join(CONFIG_FILE), body).unwrap();
    }

    fn minimal() -> &'static str {
        r#"{"organization": "https://dev.azure.com/acme", "project": "data-platform"}"#
    }

    #[test]
    fn load_fails_without_config_file() {
        let dir = TempDir::new().unwrap();
        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
    }

    #[test]
    fn minimal_config_gets_observed_defaults() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), minimal());
        let config = ProjectConfig::load(dir.path()).unwrap();

        assert_eq!(config.default_branch, DefaultBranch::Main);
        assert_eq!(config.branches, vec!["main", "stage", "dev"]);
        assert_eq!(config.push_attempts, 3);
        assert_eq!(config.push_retry_delay_secs, 5);
        assert_eq!(config.secret_attempts, 3);
        assert_eq!(config.environment_policy, EnvironmentPolicy::DevOnly);
    }

    #[test]
    fn extra_branches_excludes_default_and_duplicates() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            r#"{
                "organization": "https://dev.azure.com/acme",
                "project": "p",
                "defaultBranch": "dev",
                "branches": ["main", "stage", "dev", "stage"]
            }"#,
        );
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.extra_branches(), vec!["main", "stage"]);
    }

    #[test]
    fn dev_only_policy_selects_dev_environment() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            r#"{
                "organization": "https://dev.azure.com/acme",
                "project": "p",
                "environments": [
                    {"name": "PROD", "database": "ANALYTICS_PROD", "branch": "main"},
                    {"name": "STAGE", "database": "ANALYTICS_STAGE", "branch": "stage"},
                    {"name": "DEV", "database": "ANALYTICS_DEV", "branch": "dev"}
                ]
            }"#,
        );
        let config = ProjectConfig::load(dir.path()).unwrap();
        let eager = config.eager_environments();
        assert_eq!(eager.len(), 1);
        assert_eq!(eager[0].database, "ANALYTICS_DEV");
    }

    #[test]
    fn all_policy_selects_every_environment() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            r#"{
                "organization": "https://dev.azure.com/acme",
                "project": "p",
                "environmentPolicy": "all",
                "environments": [
                    {"name": "PROD", "database": "ANALYTICS_PROD", "branch": "main"},
                    {"name": "DEV", "database": "ANALYTICS_DEV", "branch": "dev"}
                ]
            }"#,
        );
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.eager_environments().len(), 2);
    }

    #[test]
    fn environment_for_branch_maps_by_branch_name() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            r#"{
                "organization": "https://dev.azure.com/acme",
                "project": "p",
                "environments": [
                    {"name": "DEV", "database": "ANALYTICS_DEV", "branch": "dev"}
                ]
            }"#,
        );
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(
            config.environment_for_branch("dev").unwrap().database,
            "ANALYTICS_DEV"
        );
        assert!(config.environment_for_branch("main").is_none());
    }

    #[test]
    fn warehouse_section_defaults_role_and_integration() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            r#"{
                "organization": "https://dev.azure.com/acme",
                "project": "p",
                "warehouse": {
                    "connection": "svc_principal",
                    "utilityDatabase": "UTILITY",
                    "gitSchema": "GIT_REPOS",
                    "apiIntegration": "EXT_GIT_INT"
                }
            }"#,
        );
        let config = ProjectConfig::load(dir.path()).unwrap();
        let warehouse = config.warehouse().unwrap();
        assert_eq!(warehouse.engineering_role, "GR_AI_ENGINEER");
        assert_eq!(warehouse.external_access_integration, "EXT_XS_INT_PYPI");
    }

    #[test]
    fn missing_warehouse_section_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), minimal());
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert!(config.warehouse().is_err());
    }

    #[test]
    fn zero_retry_bound_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            r#"{"organization": "o", "project": "p", "pushAttempts": 0}"#,
        );
        assert!(ProjectConfig::load(dir.path()).is_err());
    }
}
