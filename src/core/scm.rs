//! Source-control provisioning.
//!
//! Linear state machine with one loop-back edge (repository naming):
//! name → create remote → init local → commit → rename default branch →
//! add remote → push default (retry) → create extra branches
//! (skip-if-exists) → return to default branch. Every step tolerates the
//! traces of a previous partial run, so the provisioner is safe to re-run
//! against a half-set-up directory.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::config::ProjectConfig;
use crate::context::{BranchSet, ProvisioningContext};
use crate::error::{Error, Result};
use crate::log_status;
use crate::preflight;
use crate::utils::command::{CmdRequest, CommandRunner};
use crate::utils::prompt::Prompt;
use crate::utils::validation;

const INITIAL_COMMIT_MESSAGE: &str = "Initial commit";

/// Injectable pause between push attempts so tests don't sleep.
pub type DelayFn = fn(Duration);

fn sleep_delay(duration: Duration) {
    std::thread::sleep(duration);
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScmOutcome {
    pub repo_name: String,
    pub remote_url: String,
    pub default_branch: String,
    pub visibility: String,
    pub branches_created: Vec<String>,
    pub branches_skipped: Vec<String>,
}

/// Provision the remote repository and local branching model.
pub fn provision(
    dir: &Path,
    config: &ProjectConfig,
    preset_name: Option<&str>,
    private: Option<bool>,
    prompt: &mut dyn Prompt,
    runner: &mut dyn CommandRunner,
) -> Result<(ProvisioningContext, ScmOutcome)> {
    provision_with_delay(dir, config, preset_name, private, prompt, runner, sleep_delay)
}

pub fn provision_with_delay(
    dir: &Path,
    config: &ProjectConfig,
    preset_name: Option<&str>,
    private: Option<bool>,
    prompt: &mut dyn Prompt,
    runner: &mut dyn CommandRunner,
    delay: DelayFn,
) -> Result<(ProvisioningContext, ScmOutcome)> {
    preflight::require_authenticated(
        runner,
        "az",
        &preflight::host_auth_probe(),
        preflight::AZ_LOGIN_HINT,
    )?;

    let private = private.unwrap_or_else(|| {
        prompt.yes_no("Create the repository as private?", true)
    });
    let visibility = if private { "private" } else { "public" };

    let (repo_name, remote_url) = name_and_create(config, preset_name, prompt, runner)?;
    log_status!("scm", "Created remote repository {}", repo_name);

    let context = ProvisioningContext {
        repo_name: repo_name.clone(),
        remote_url: remote_url.clone(),
        default_branch: config.default_branch,
        organization: config.organization.clone(),
        project: config.project.clone(),
        dir: dir.to_path_buf(),
    };

    let branch_set = BranchSet::from_config(config);
    match wire_local(dir, config, &context, &branch_set, runner, delay) {
        Ok((created, skipped)) => Ok((
            context,
            ScmOutcome {
                repo_name,
                remote_url,
                default_branch: config.default_branch.as_str().to_string(),
                visibility: visibility.to_string(),
                branches_created: created,
                branches_skipped: skipped,
            },
        )),
        Err(err) => {
            rollback(dir, runner);
            Err(err)
        }
    }
}

/// The naming loop-back edge: validate locally, probe the host, and either
/// create or offer a different name. Invalid names never reach the host.
fn name_and_create(
    config: &ProjectConfig,
    preset_name: Option<&str>,
    prompt: &mut dyn Prompt,
    runner: &mut dyn CommandRunner,
) -> Result<(String, String)> {
    let mut preset = preset_name.map(str::to_string);

    for _ in 0..config.name_attempts {
        let candidate = match preset.take() {
            Some(name) => name,
            None => prompt.line("Repository name")?,
        };

        let name = match validation::repo_name(&candidate) {
            Ok(name) => name.to_string(),
            Err(err) => {
                if !prompt.is_interactive() {
                    return Err(err);
                }
                prompt.say("  Repository names must be non-empty and contain no whitespace.");
                continue;
            }
        };

        if remote_exists(config, &name, runner) {
            prompt.say(&format!("A repository named '{}' already exists.", name));
            if !prompt.yes_no("Choose a different name?", true) {
                return Err(Error::validation_invalid_argument(
                    "repoName",
                    "Repository already exists and a new name was declined",
                    Some(name),
                ));
            }
            continue;
        }

        let create = CmdRequest::new(
            "az",
            &[
                "repos",
                "create",
                "--name",
                &name,
                "--organization",
                &config.organization,
                "--project",
                &config.project,
                "--output",
                "json",
            ],
        );
        let output = runner.run(&create);
        if !output.success() {
            return Err(Error::scm_create_failed(
                create.display(),
                output.exit_code,
                output.error_text(),
            ));
        }

        let remote_url = parse_remote_url(&output.stdout)?;
        return Ok((name, remote_url));
    }

    Err(Error::validation_invalid_argument(
        "repoName",
        "No acceptable repository name after repeated attempts",
        None,
    ))
}

/// Idempotency probe: does a repository of this name already exist?
fn remote_exists(config: &ProjectConfig, name: &str, runner: &mut dyn CommandRunner) -> bool {
    let probe = CmdRequest::new(
        "az",
        &[
            "repos",
            "show",
            "--repository",
            name,
            "--organization",
            &config.organization,
            "--project",
            &config.project,
            "--output",
            "none",
        ],
    );
    runner.run(&probe).success()
}

fn parse_remote_url(stdout: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(stdout).map_err(|e| {
        Error::internal_json(e.to_string(), Some("parse repository create response".to_string()))
    })?;
    value
        .get("remoteUrl")
        .or_else(|| value.get("webUrl"))
        .and_then(|u| u.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::internal_json(
                "repository create response has no remoteUrl".to_string(),
                None,
            )
        })
}

fn wire_local(
    dir: &Path,
    config: &ProjectConfig,
    context: &ProvisioningContext,
    branch_set: &BranchSet,
    runner: &mut dyn CommandRunner,
    delay: DelayFn,
) -> Result<(Vec<String>, Vec<String>)> {
    let default = context.default_branch_name();

    init_local(dir, runner)?;
    initial_commit(dir, runner)?;
    run_git(dir, &["branch", "-M", default], runner)?;
    add_remote(dir, &context.remote_url, runner)?;
    push_with_retry(dir, default, config, runner, delay)?;

    let mut created = Vec::new();
    let mut skipped = Vec::new();
    for branch in branch_set.iter() {
        if branch_exists(dir, branch, runner) {
            log_status!("scm", "Branch {} already exists, skipping", branch);
            skipped.push(branch.to_string());
            continue;
        }
        run_git(dir, &["branch", branch], runner)?;
        push_with_retry(dir, branch, config, runner, delay)?;
        created.push(branch.to_string());
    }

    run_git(dir, &["checkout", default], runner)?;
    Ok((created, skipped))
}

fn init_local(dir: &Path, runner: &mut dyn CommandRunner) -> Result<()> {
    let probe = CmdRequest::new("git", &["rev-parse", "--git-dir"]).in_dir(dir);
    if runner.run(&probe).success() {
        return Ok(());
    }
    run_git(dir, &["init"], runner)
}

fn initial_commit(dir: &Path, runner: &mut dyn CommandRunner) -> Result<()> {
    run_git(dir, &["add", "."], runner)?;

    let commit = CmdRequest::new("git", &["commit", "-m", INITIAL_COMMIT_MESSAGE]).in_dir(dir);
    let output = runner.run(&commit);
    if output.success() || output.mentions("nothing to commit") {
        Ok(())
    } else {
        Err(Error::git_command_failed(format!(
            "git commit failed: {}",
            output.error_text()
        )))
    }
}

fn add_remote(dir: &Path, remote_url: &str, runner: &mut dyn CommandRunner) -> Result<()> {
    let probe = CmdRequest::new("git", &["remote", "get-url", "origin"]).in_dir(dir);
    let existing = runner.run(&probe);
    if existing.success() {
        if existing.trimmed_stdout() != remote_url {
            log_status!(
                "scm",
                "Remote origin already set to {}, leaving it in place",
                existing.trimmed_stdout()
            );
        }
        return Ok(());
    }
    run_git(dir, &["remote", "add", "origin", remote_url], runner)
}

pub(crate) fn push_with_retry(
    dir: &Path,
    branch: &str,
    config: &ProjectConfig,
    runner: &mut dyn CommandRunner,
    delay: DelayFn,
) -> Result<()> {
    let push = CmdRequest::new("git", &["push", "-u", "origin", branch]).in_dir(dir);
    let mut last_error = String::new();

    for attempt in 1..=config.push_attempts {
        let output = runner.run(&push);
        if output.success() {
            return Ok(());
        }
        last_error = output.error_text();
        if attempt < config.push_attempts {
            log_status!(
                "scm",
                "Push of {} failed (attempt {}/{}), retrying in {}s",
                branch,
                attempt,
                config.push_attempts,
                config.push_retry_delay_secs
            );
            delay(Duration::from_secs(config.push_retry_delay_secs));
        }
    }

    Err(Error::scm_push_failed(branch, config.push_attempts, last_error))
}

fn branch_exists(dir: &Path, branch: &str, runner: &mut dyn CommandRunner) -> bool {
    let probe = CmdRequest::new(
        "git",
        &["rev-parse", "--verify", "--quiet", &format!("refs/heads/{}", branch)],
    )
    .in_dir(dir);
    runner.run(&probe).success()
}

fn run_git(dir: &Path, args: &[&str], runner: &mut dyn CommandRunner) -> Result<()> {
    let request = CmdRequest::new("git", args).in_dir(dir);
    let output = runner.run(&request);
    if output.success() {
        Ok(())
    } else {
        Err(Error::git_command_failed(format!(
            "{} failed: {}",
            request.display(),
            output.error_text()
        )))
    }
}

/// Best-effort rollback after a fatal provisioning failure.
///
/// Removes the remote we may have added and warns about the partially
/// initialized local repository. The remote repository itself is never
/// deleted — that is the operator's call.
fn rollback(dir: &Path, runner: &mut dyn CommandRunner) {
    let _ = runner.run(&CmdRequest::new("git", &["remote", "remove", "origin"]).in_dir(dir));
    log_status!(
        "scm",
        "Provisioning failed; removed remote 'origin'. The local repository in {} may need manual removal.",
        dir.display()
    );
}
