//! Provisioning orchestration.
//!
//! Source control is mandatory; its failure terminates the run with a
//! rolled-back working directory. The warehouse and workspace integrations
//! are independent opt-ins: each failure is recorded in the report and
//! never stops the other, and the summary always prints.

use std::path::Path;

use serde::Serialize;

use crate::config::ProjectConfig;
use crate::context::BranchSet;
use crate::error::Result;
use crate::log_status;
use crate::preflight;
use crate::report::{Integration, ProvisioningReport};
use crate::scm::{self, ScmOutcome};
use crate::utils::command::CommandRunner;
use crate::utils::prompt::Prompt;
use crate::{warehouse, workspace};

/// Tool-presence check, injectable so orchestration tests run without the
/// external CLIs installed.
pub type ToolCheckFn = fn(&str, &str) -> Result<()>;

/// Pre-answered prompts for flag-driven runs.
#[derive(Debug, Clone, Default)]
pub struct SetupRequest {
    pub repo_name: Option<String>,
    pub private: Option<bool>,
    pub link_warehouse: Option<bool>,
    pub link_workspace: Option<bool>,
    pub workspace_user: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupOutput {
    pub scm: ScmOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<warehouse::WarehouseOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<workspace::WorkspaceOutcome>,
    pub report: ProvisioningReport,
}

/// Provision a freshly generated project directory.
pub fn run(
    dir: &Path,
    config: &ProjectConfig,
    request: SetupRequest,
    prompt: &mut dyn Prompt,
    runner: &mut dyn CommandRunner,
) -> Result<SetupOutput> {
    run_with(
        dir,
        config,
        request,
        prompt,
        runner,
        preflight::require_tool,
        std::thread::sleep,
    )
}

pub fn run_with(
    dir: &Path,
    config: &ProjectConfig,
    request: SetupRequest,
    prompt: &mut dyn Prompt,
    runner: &mut dyn CommandRunner,
    tools: ToolCheckFn,
    delay: scm::DelayFn,
) -> Result<SetupOutput> {
    tools("git", preflight::GIT_INSTALL_HINT)?;
    tools("az", preflight::AZ_INSTALL_HINT)?;

    let (context, scm_outcome) = scm::provision_with_delay(
        dir,
        config,
        request.repo_name.as_deref(),
        request.private,
        prompt,
        runner,
        delay,
    )?;

    let branches = BranchSet::from_config(config).with_default(config.default_branch);
    let mut report = ProvisioningReport::new(
        context.repo_name.clone(),
        context.remote_url.clone(),
        context.default_branch_name().to_string(),
        branches,
    );
    report.record_success(Integration::SourceControl);

    let link_warehouse = request
        .link_warehouse
        .unwrap_or_else(|| prompt.yes_no("Link the analytics warehouse?", true));
    let warehouse_outcome = if link_warehouse {
        match tools("snowsql", preflight::SNOWSQL_INSTALL_HINT)
            .and_then(|_| warehouse::link(&context, config, prompt, runner))
        {
            Ok(outcome) => {
                report.record_success(Integration::Warehouse);
                Some(outcome)
            }
            Err(err) => {
                log_status!("setup", "Warehouse linking failed: {}", err);
                report.record_failure(Integration::Warehouse, err.to_string());
                None
            }
        }
    } else {
        report.record_skipped(Integration::Warehouse);
        None
    };

    let link_workspace = request
        .link_workspace
        .unwrap_or_else(|| prompt.yes_no("Link the compute workspace?", true));
    let workspace_outcome = if link_workspace {
        match tools("databricks", preflight::DATABRICKS_INSTALL_HINT).and_then(|_| {
            workspace::link(
                &context,
                config,
                request.workspace_user.as_deref(),
                prompt,
                runner,
            )
        }) {
            Ok(outcome) => {
                report.record_success(Integration::Workspace);
                Some(outcome)
            }
            Err(err) => {
                log_status!("setup", "Workspace linking failed: {}", err);
                report.record_failure(Integration::Workspace, err.to_string());
                None
            }
        }
    } else {
        report.record_skipped(Integration::Workspace);
        None
    };

    for result in &report.integrations {
        let status = if !result.attempted {
            "not attempted"
        } else if result.succeeded {
            "ok"
        } else {
            "FAILED"
        };
        log_status!("setup", "{}: {}", result.integration.label(), status);
    }

    Ok(SetupOutput {
        scm: scm_outcome,
        warehouse: warehouse_outcome,
        workspace: workspace_outcome,
        report,
    })
}
