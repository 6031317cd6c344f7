//! Precondition validation for external tools.
//!
//! A pure gate: every probe is read-only and runs to completion before any
//! mutating step for that tool begins. Failures carry remediation hints
//! (install link or login command) rather than raw tool output alone.

use serde::Serialize;

use crate::config::ProjectConfig;
use crate::error::{Error, Result};
use crate::utils::command::{CmdOutput, CmdRequest, CommandRunner};
use crate::utils::prompt::Prompt;

pub const GIT_INSTALL_HINT: &str = "Install git: https://git-scm.com/downloads";
pub const AZ_INSTALL_HINT: &str = "Install the Azure CLI: https://aka.ms/azure-cli";
pub const AZ_LOGIN_HINT: &str = "Run `az login` to authenticate";
pub const SNOWSQL_INSTALL_HINT: &str =
    "Install snowsql: https://docs.snowflake.com/en/user-guide/snowsql-install-config";
pub const DATABRICKS_INSTALL_HINT: &str =
    "Install the Databricks CLI: https://docs.databricks.com/dev-tools/cli/install.html";
pub const DATABRICKS_CONFIGURE_HINT: &str =
    "Run `databricks configure --profile <name>` for each environment profile";

/// Stderr fragments that indicate missing network reachability rather than
/// a misconfigured tool.
const NETWORK_FAILURE_MARKERS: [&str; 7] = [
    "connection refused",
    "connection timed out",
    "timed out",
    "no such host",
    "could not resolve",
    "network is unreachable",
    "temporary failure in name resolution",
];

/// Check that a tool resolves on the execution path.
pub fn require_tool(program: &str, install_hint: &str) -> Result<()> {
    which::which(program)
        .map(|_| ())
        .map_err(|_| Error::tool_missing(program, install_hint))
}

/// Run a cheap read-only probe to confirm an authenticated session.
pub fn require_authenticated(
    runner: &mut dyn CommandRunner,
    program: &str,
    probe: &CmdRequest,
    login_hint: &str,
) -> Result<()> {
    let output = runner.run(probe);
    if output.success() {
        Ok(())
    } else {
        Err(Error::tool_not_authenticated(program, probe.display(), login_hint))
    }
}

/// Classify probe output: connectivity failure vs. tool misconfiguration.
pub fn is_network_failure(output: &CmdOutput) -> bool {
    NETWORK_FAILURE_MARKERS
        .iter()
        .any(|marker| output.mentions(marker))
}

/// Read-only auth probe for the version-control host CLI.
pub fn host_auth_probe() -> CmdRequest {
    CmdRequest::new("az", &["account", "show", "--output", "none"])
}

/// Read-only probe for a workspace environment profile.
pub fn workspace_profile_probe(profile: &str) -> CmdRequest {
    CmdRequest::new("databricks", &["current-user", "me", "--profile", profile])
}

/// Probe a workspace profile, offering a bounded interactive retry when the
/// failure is missing network reachability rather than misconfiguration.
pub fn require_profile_reachable(
    runner: &mut dyn CommandRunner,
    prompt: &mut dyn Prompt,
    profile: &str,
    max_retries: u32,
) -> Result<()> {
    let probe = workspace_profile_probe(profile);
    let mut retries = 0;

    loop {
        let output = runner.run(&probe);
        if output.success() {
            return Ok(());
        }

        if is_network_failure(&output) {
            let question = format!(
                "Workspace profile '{}' is unreachable (network). Retry",
                profile
            );
            if retries < max_retries && prompt.yes_no(&question, true) {
                retries += 1;
                continue;
            }
            return Err(Error::tool_unreachable("databricks", probe.display()));
        }

        return Err(Error::tool_not_authenticated(
            "databricks",
            probe.display(),
            DATABRICKS_CONFIGURE_HINT,
        ));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Info,
    Warning,
    Error,
}

impl FindingSeverity {
    fn sort_key(&self) -> u8 {
        match self {
            FindingSeverity::Error => 0,
            FindingSeverity::Warning => 1,
            FindingSeverity::Info => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightFinding {
    pub severity: FindingSeverity,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightReport {
    pub findings: Vec<PreflightFinding>,
    pub passed: bool,
}

/// Run every relevant precondition check without mutating anything.
pub fn doctor(
    config: &ProjectConfig,
    include_warehouse: bool,
    include_workspace: bool,
    runner: &mut dyn CommandRunner,
) -> PreflightReport {
    let mut findings = Vec::new();

    check_tool(&mut findings, "git", GIT_INSTALL_HINT);
    if check_tool(&mut findings, "az", AZ_INSTALL_HINT) {
        let output = runner.run(&host_auth_probe());
        if output.success() {
            ready(&mut findings, "az", "Azure CLI session is active");
        } else {
            findings.push(PreflightFinding {
                severity: FindingSeverity::Error,
                code: "tool.not_authenticated".to_string(),
                message: "Azure CLI has no authenticated session".to_string(),
                hint: Some(AZ_LOGIN_HINT.to_string()),
            });
        }
    }

    if include_warehouse {
        check_tool(&mut findings, "snowsql", SNOWSQL_INSTALL_HINT);
    }

    if include_workspace && check_tool(&mut findings, "databricks", DATABRICKS_INSTALL_HINT) {
        for environment in config.eager_environments() {
            let Some(profile) = environment.workspace_profile.as_deref() else {
                findings.push(PreflightFinding {
                    severity: FindingSeverity::Error,
                    code: "config.missing_key".to_string(),
                    message: format!(
                        "Environment {} has no workspaceProfile configured",
                        environment.name
                    ),
                    hint: Some(DATABRICKS_CONFIGURE_HINT.to_string()),
                });
                continue;
            };

            let output = runner.run(&workspace_profile_probe(profile));
            if output.success() {
                ready(
                    &mut findings,
                    "databricks",
                    &format!("Workspace profile '{}' is reachable", profile),
                );
            } else if is_network_failure(&output) {
                findings.push(PreflightFinding {
                    severity: FindingSeverity::Warning,
                    code: "tool.unreachable".to_string(),
                    message: format!("Workspace profile '{}' is unreachable (network)", profile),
                    hint: None,
                });
            } else {
                findings.push(PreflightFinding {
                    severity: FindingSeverity::Error,
                    code: "tool.not_authenticated".to_string(),
                    message: format!("Workspace profile '{}' failed its probe", profile),
                    hint: Some(DATABRICKS_CONFIGURE_HINT.to_string()),
                });
            }
        }
    }

    findings.sort_by_key(|f| f.severity.sort_key());
    let passed = !findings
        .iter()
        .any(|f| f.severity == FindingSeverity::Error);

    PreflightReport { findings, passed }
}

fn check_tool(findings: &mut Vec<PreflightFinding>, program: &str, install_hint: &str) -> bool {
    match require_tool(program, install_hint) {
        Ok(()) => {
            ready(findings, program, &format!("{} is installed", program));
            true
        }
        Err(err) => {
            findings.push(PreflightFinding {
                severity: FindingSeverity::Error,
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                hint: err.hints.first().map(|h| h.message.clone()),
            });
            false
        }
    }
}

fn ready(findings: &mut Vec<PreflightFinding>, _program: &str, message: &str) {
    findings.push(PreflightFinding {
        severity: FindingSeverity::Info,
        code: "tool.ready".to_string(),
        message: message.to_string(),
        hint: None,
    });
}
