//! Artifact publishing (the create workflow).
//!
//! Assumes the project was already provisioned: a local git repository with
//! the expected remote. Stages and pushes the requested artifacts, then
//! registers each as a first-class warehouse object scoped to the current
//! branch's environment, under the same scoped-secret discipline as the
//! warehouse linker.

use std::path::Path;

use serde::Serialize;

use crate::artifact::{ArtifactDescriptor, ArtifactKind, ArtifactMode};
use crate::config::{ProjectConfig, WarehouseSettings};
use crate::context::ProvisioningContext;
use crate::error::{Error, Result};
use crate::log_status;
use crate::scm;
use crate::utils::command::{CmdRequest, CommandRunner};
use crate::utils::prompt::{self, Prompt};
use crate::warehouse;

const DEFAULT_COMMIT_MESSAGE: &str = "Add project artifacts";
const NAME_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    /// Artifacts named up front (flag-driven runs). Empty means prompt.
    pub artifacts: Vec<(ArtifactKind, String)>,
    pub connect_existing: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedArtifact {
    pub kind: ArtifactKind,
    pub name: String,
    pub path: String,
    pub registered: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub branch: String,
    pub environment: String,
    pub commit_message: String,
    /// False when the best-effort pull was tolerated as a warning.
    pub pulled: bool,
    pub artifacts: Vec<PublishedArtifact>,
}

/// Publish artifacts from an already-provisioned project directory.
pub fn publish(
    dir: &Path,
    config: &ProjectConfig,
    request: PublishRequest,
    prompt: &mut dyn Prompt,
    runner: &mut dyn CommandRunner,
) -> Result<PublishOutcome> {
    publish_with_delay(dir, config, request, prompt, runner, std::thread::sleep)
}

pub fn publish_with_delay(
    dir: &Path,
    config: &ProjectConfig,
    request: PublishRequest,
    prompt: &mut dyn Prompt,
    runner: &mut dyn CommandRunner,
    delay: scm::DelayFn,
) -> Result<PublishOutcome> {
    let settings = config.warehouse()?;
    let query_warehouse = settings.query_warehouse.as_deref().ok_or_else(|| {
        Error::config_missing_key("warehouse.queryWarehouse", None)
            .with_hint("Set warehouse.queryWarehouse in wireup.json to register artifacts")
    })?;
    warehouse::bare_ident("warehouse.queryWarehouse", query_warehouse)?;
    warehouse::bare_ident(
        "warehouse.externalAccessIntegration",
        &settings.external_access_integration,
    )?;

    let (repo_name, remote_url) = expected_repository(dir, runner)?;
    let branch = current_branch(dir, runner)?;

    if let Some(required) = config.require_working_branch.as_deref() {
        if branch != required {
            return Err(Error::validation_invalid_argument(
                "branch",
                format!(
                    "Publishing requires the working branch '{}' but '{}' is checked out",
                    required, branch
                ),
                Some(branch),
            )
            .with_hint(format!("Run `git checkout {}` and retry", required)));
        }
    }

    let environment = config.environment_for_branch(&branch).ok_or_else(|| {
        Error::config_invalid_value(
            "environments",
            Some(branch.clone()),
            "no environment is mapped to the current branch",
        )
    })?;

    let artifacts = collect_artifacts(&request, prompt)?;
    for artifact in &artifacts {
        artifact.realize(dir)?;
    }

    let message = match request.message {
        Some(message) if !message.trim().is_empty() => message,
        Some(_) => DEFAULT_COMMIT_MESSAGE.to_string(),
        None => {
            let entered = prompt
                .line("Commit message")
                .unwrap_or_default();
            if entered.trim().is_empty() {
                DEFAULT_COMMIT_MESSAGE.to_string()
            } else {
                entered
            }
        }
    };

    let pulled = sync_repository(dir, &branch, &message, config, runner, delay)?;

    let context = ProvisioningContext {
        repo_name,
        remote_url,
        default_branch: config.default_branch,
        organization: config.organization.clone(),
        project: config.project.clone(),
        dir: dir.to_path_buf(),
    };

    let secret = warehouse::authenticate(settings, config.secret_attempts, prompt, runner)?;
    let registered = register_artifacts(&context, settings, environment, &branch, &artifacts, runner);
    drop(secret);

    let (published, failures) = registered;
    if !failures.is_empty() {
        return Err(Error::warehouse_statement_failed(
            failures[0].clone(),
            environment.database.clone(),
            "artifact registration failed",
        ));
    }

    Ok(PublishOutcome {
        branch,
        environment: environment.name.clone(),
        commit_message: message,
        pulled,
        artifacts: published,
    })
}

/// The publisher never creates the repository; it requires one with a
/// remote already wired.
fn expected_repository(dir: &Path, runner: &mut dyn CommandRunner) -> Result<(String, String)> {
    let inside = CmdRequest::new("git", &["rev-parse", "--git-dir"]).in_dir(dir);
    if !runner.run(&inside).success() {
        return Err(Error::git_command_failed(
            "Not a git repository; run `wireup setup` first",
        ));
    }

    let origin = CmdRequest::new("git", &["remote", "get-url", "origin"]).in_dir(dir);
    let output = runner.run(&origin);
    if !output.success() {
        return Err(Error::git_command_failed(
            "Repository has no 'origin' remote; run `wireup setup` first",
        ));
    }
    let remote_url = output.trimmed_stdout();

    let repo_name = remote_url
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::git_command_failed("Could not derive repository name from origin"))?;

    Ok((repo_name, remote_url))
}

fn current_branch(dir: &Path, runner: &mut dyn CommandRunner) -> Result<String> {
    let probe = CmdRequest::new("git", &["rev-parse", "--abbrev-ref", "HEAD"]).in_dir(dir);
    let output = runner.run(&probe);
    if output.success() {
        Ok(output.trimmed_stdout())
    } else {
        Err(Error::git_command_failed("Could not resolve current branch"))
    }
}

fn collect_artifacts(
    request: &PublishRequest,
    prompt: &mut dyn Prompt,
) -> Result<Vec<ArtifactDescriptor>> {
    let mode = if request.connect_existing {
        ArtifactMode::ConnectExisting
    } else {
        ArtifactMode::CreateNew
    };

    if !request.artifacts.is_empty() {
        return request
            .artifacts
            .iter()
            .map(|(kind, name)| ArtifactDescriptor::new(*kind, name, mode))
            .collect();
    }

    let mode = if prompt.yes_no("Connect existing artifacts instead of creating new ones?", false)
    {
        ArtifactMode::ConnectExisting
    } else {
        ArtifactMode::CreateNew
    };

    let mut artifacts = Vec::new();
    if prompt.yes_no("Add a notebook?", true) {
        artifacts.push(ask_artifact(prompt, ArtifactKind::Notebook, mode)?);
    }
    if prompt.yes_no("Add an app?", false) {
        artifacts.push(ask_artifact(prompt, ArtifactKind::App, mode)?);
    }

    if artifacts.is_empty() {
        return Err(Error::validation_missing_argument(vec!["artifact".to_string()])
            .with_hint("Nothing to publish; request at least one notebook or app"));
    }
    Ok(artifacts)
}

fn ask_artifact(
    prompt: &mut dyn Prompt,
    kind: ArtifactKind,
    mode: ArtifactMode,
) -> Result<ArtifactDescriptor> {
    prompt::ask_until(
        prompt,
        &format!("Name for the {}", kind.label()),
        NAME_ATTEMPTS,
        |raw| ArtifactDescriptor::new(kind, raw, mode),
    )
}

/// Pull, stage, commit, push. Pull failures are tolerated as a warning —
/// a deliberate best-effort-sync policy for single-operator projects.
fn sync_repository(
    dir: &Path,
    branch: &str,
    message: &str,
    config: &ProjectConfig,
    runner: &mut dyn CommandRunner,
    delay: scm::DelayFn,
) -> Result<bool> {
    let pull = runner.run(&CmdRequest::new("git", &["pull"]).in_dir(dir));
    let pulled = pull.success();
    if !pulled {
        log_status!("publish", "git pull failed, continuing: {}", pull.error_text());
    }

    let add = runner.run(&CmdRequest::new("git", &["add", "."]).in_dir(dir));
    if !add.success() {
        return Err(Error::git_command_failed(format!(
            "git add failed: {}",
            add.error_text()
        )));
    }

    let commit = runner.run(&CmdRequest::new("git", &["commit", "-m", message]).in_dir(dir));
    if !commit.success() && !commit.mentions("nothing to commit") {
        return Err(Error::git_command_failed(format!(
            "git commit failed: {}",
            commit.error_text()
        )));
    }

    scm::push_with_retry(dir, branch, config, runner, delay)?;
    Ok(pulled)
}

fn register_artifacts(
    context: &ProvisioningContext,
    settings: &WarehouseSettings,
    environment: &crate::config::EnvironmentTarget,
    branch: &str,
    artifacts: &[ArtifactDescriptor],
    runner: &mut dyn CommandRunner,
) -> (Vec<PublishedArtifact>, Vec<String>) {
    let mut published = Vec::new();
    let mut failures = Vec::new();

    // Bring the registered repository object up to date with the push.
    let fetch = format!(
        "ALTER GIT REPOSITORY {} FETCH;",
        warehouse::repository_object(context, settings)
    );
    let output = runner.run(&warehouse::sql_request(&settings.connection, &fetch));
    if !output.success() {
        failures.push(fetch);
    }

    for artifact in artifacts {
        let statements = registration_statements(context, settings, environment, branch, artifact);
        let mut registered = !statements.is_empty();
        for statement in &statements {
            let output = runner.run(&warehouse::sql_request(&settings.connection, statement));
            if !output.success() {
                log_status!(
                    "publish",
                    "Registration failed for {} in {}: {}",
                    artifact.display_name,
                    environment.database,
                    output.error_text()
                );
                failures.push(statement.clone());
                registered = false;
                break;
            }
        }

        published.push(PublishedArtifact {
            kind: artifact.kind,
            name: artifact.display_name.clone(),
            path: artifact.local_path.to_string_lossy().to_string(),
            registered,
        });
    }

    (published, failures)
}

fn registration_statements(
    context: &ProvisioningContext,
    settings: &WarehouseSettings,
    environment: &crate::config::EnvironmentTarget,
    branch: &str,
    artifact: &ArtifactDescriptor,
) -> Vec<String> {
    let schema = warehouse::quote_ident(&context.repo_name.to_uppercase());
    let stage_path = format!(
        "@{}/branches/{}/{}/",
        warehouse::repository_object(context, settings),
        branch,
        artifact.stage_directory()
    );
    let query_warehouse = settings.query_warehouse.as_deref().unwrap_or_default();

    match artifact.kind {
        ArtifactKind::Notebook => {
            let object = format!(
                "{}.{}.{}",
                environment.database,
                schema,
                warehouse::quote_ident(&artifact.display_name.to_uppercase())
            );
            vec![
                format!(
                    "CREATE OR REPLACE NOTEBOOK IDENTIFIER('{object}') FROM {stage} \
                     QUERY_WAREHOUSE = {wh} MAIN_FILE = {main};",
                    object = object,
                    stage = warehouse::quote_literal(&stage_path),
                    wh = query_warehouse,
                    main = warehouse::quote_literal(&artifact.main_file()),
                ),
                format!("ALTER NOTEBOOK {} ADD LIVE VERSION FROM LAST;", object),
                format!(
                    "ALTER NOTEBOOK {} SET EXTERNAL_ACCESS_INTEGRATIONS = ({});",
                    object, settings.external_access_integration
                ),
            ]
        }
        ArtifactKind::App => {
            // App objects are branch-qualified so every branch's copy can
            // coexist in the shared database.
            let object_name = format!(
                "{}_{}_{}",
                context.repo_name.to_uppercase(),
                branch.to_uppercase(),
                artifact.display_name.to_uppercase()
            );
            let object = format!(
                "{}.{}.{}",
                environment.database,
                schema,
                warehouse::quote_ident(&object_name)
            );
            vec![format!(
                "CREATE OR REPLACE STREAMLIT {object} ROOT_LOCATION = {root} \
                 MAIN_FILE = 'streamlit_app.py' QUERY_WAREHOUSE = {wh};",
                object = object,
                root = warehouse::quote_literal(stage_path.trim_end_matches('/')),
                wh = query_warehouse,
            )]
        }
    }
}
