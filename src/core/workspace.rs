//! Workspace linking.
//!
//! Mirrors the remote repository into one per-user path per target
//! environment. Environments are independent: one failure never stops the
//! rest, and "already exists" is success.

use serde::Serialize;

use crate::config::ProjectConfig;
use crate::context::ProvisioningContext;
use crate::error::{Error, Result};
use crate::log_status;
use crate::preflight;
use crate::utils::command::{CmdRequest, CommandRunner};
use crate::utils::prompt::{self, Prompt};
use crate::utils::validation;

const PROFILE_RETRIES: u32 = 3;
const USERNAME_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceOutcome {
    pub user: String,
    pub mirrors_created: Vec<String>,
    pub already_present: Vec<String>,
}

/// Mirror the repository into every eager environment's workspace.
pub fn link(
    context: &ProvisioningContext,
    config: &ProjectConfig,
    preset_user: Option<&str>,
    prompt: &mut dyn Prompt,
    runner: &mut dyn CommandRunner,
) -> Result<WorkspaceOutcome> {
    let environments = config.eager_environments();
    if environments.is_empty() {
        return Err(Error::config_missing_key("environments", None)
            .with_hint("List environment targets in wireup.json to enable this integration"));
    }

    let user = match preset_user {
        Some(user) => validation::user_identifier(user)?.to_string(),
        None => prompt::ask_until(prompt, "Workspace username", USERNAME_ATTEMPTS, |raw| {
            validation::user_identifier(raw).map(str::to_string)
        })?,
    };

    let mut outcome = WorkspaceOutcome {
        user: user.clone(),
        mirrors_created: Vec::new(),
        already_present: Vec::new(),
    };
    let mut failures = Vec::new();

    for environment in environments {
        let Some(profile) = environment.workspace_profile.as_deref() else {
            failures.push(format!(
                "{}: no workspaceProfile configured",
                environment.name
            ));
            continue;
        };

        if let Err(err) =
            preflight::require_profile_reachable(runner, prompt, profile, PROFILE_RETRIES)
        {
            failures.push(format!("{}: {}", environment.name, err));
            continue;
        }

        let path = format!(
            "{}/{}/{}_{}",
            config.workspace_root, user, context.repo_name, environment.name
        );
        let create = CmdRequest::new(
            "databricks",
            &[
                "repos",
                "create",
                "--url",
                &context.remote_url,
                "--provider",
                "azureDevOpsServices",
                "--path",
                &path,
                "--profile",
                profile,
            ],
        );

        let output = runner.run(&create);
        if output.success() {
            log_status!("workspace", "Mirrored {} into {}", context.repo_name, path);
            outcome.mirrors_created.push(path);
        } else if output.mentions("already exists") {
            log_status!("workspace", "Mirror {} already present", path);
            outcome.already_present.push(path);
        } else {
            failures.push(format!("{}: {}", environment.name, output.error_text()));
        }
    }

    if failures.is_empty() {
        Ok(outcome)
    } else {
        Err(Error::workspace_mirror_failed(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DefaultBranch;
    use crate::utils::command::testing::{fail, RuleRunner};
    use crate::utils::prompt::ScriptedPrompt;

    fn config(policy: &str) -> ProjectConfig {
        serde_json::from_str(&format!(
            r#"{{
                "organization": "https://dev.azure.com/acme",
                "project": "p",
                "environmentPolicy": "{}",
                "environments": [
                    {{"name": "PROD", "database": "ANALYTICS_PROD", "branch": "main", "workspaceProfile": "prod"}},
                    {{"name": "STAGE", "database": "ANALYTICS_STAGE", "branch": "stage", "workspaceProfile": "stage"}},
                    {{"name": "DEV", "database": "ANALYTICS_DEV", "branch": "dev", "workspaceProfile": "dev"}}
                ]
            }}"#,
            policy
        ))
        .unwrap()
    }

    fn context() -> ProvisioningContext {
        ProvisioningContext {
            repo_name: "proj-x".to_string(),
            remote_url: "https://dev.azure.com/acme/p/_git/proj-x".to_string(),
            default_branch: DefaultBranch::Main,
            organization: "https://dev.azure.com/acme".to_string(),
            project: "p".to_string(),
            dir: "/work/proj-x".into(),
        }
    }

    #[test]
    fn dev_only_policy_mirrors_a_single_path() {
        let mut runner = RuleRunner::new();
        let mut prompt = ScriptedPrompt::with_lines(&["jdoe"]);

        let outcome = link(&context(), &config("devOnly"), None, &mut prompt, &mut runner).unwrap();

        assert_eq!(outcome.mirrors_created, vec!["/Repos/jdoe/proj-x_DEV"]);
        assert_eq!(runner.calls_matching("repos create"), 1);
    }

    #[test]
    fn already_exists_counts_as_success() {
        let mut runner = RuleRunner::new().on(
            "--path /Repos/jdoe/proj-x_DEV",
            vec![fail(1, "Error: path /Repos/jdoe/proj-x_DEV already exists")],
        );
        let mut prompt = ScriptedPrompt::with_lines(&["jdoe"]);

        let outcome = link(&context(), &config("devOnly"), None, &mut prompt, &mut runner).unwrap();

        assert!(outcome.mirrors_created.is_empty());
        assert_eq!(outcome.already_present, vec!["/Repos/jdoe/proj-x_DEV"]);
    }

    #[test]
    fn one_environment_failure_does_not_stop_the_rest() {
        let mut runner = RuleRunner::new().on(
            "--path /Repos/jdoe/proj-x_STAGE",
            vec![fail(1, "permission denied")],
        );
        let mut prompt = ScriptedPrompt::with_lines(&["jdoe"]);

        let err = link(&context(), &config("all"), Some("jdoe"), &mut prompt, &mut runner)
            .unwrap_err();

        assert_eq!(err.code.as_str(), "workspace.mirror_failed");
        assert!(err.message.contains("STAGE"));
        assert!(!err.message.contains("PROD:"));
        // All three environments were still attempted.
        assert_eq!(runner.calls_matching("repos create"), 3);
    }

    #[test]
    fn username_is_re_prompted_until_alphanumeric() {
        let mut runner = RuleRunner::new();
        let mut prompt = ScriptedPrompt::with_lines(&["jane doe", "jdoe"]);

        let outcome = link(&context(), &config("devOnly"), None, &mut prompt, &mut runner).unwrap();
        assert_eq!(outcome.user, "jdoe");
    }

    #[test]
    fn missing_profile_is_that_environments_failure_only() {
        let mut config = config("all");
        config.environments[0].workspace_profile = None;
        let mut runner = RuleRunner::new();
        let mut prompt = ScriptedPrompt::new();

        let err = link(&context(), &config, Some("jdoe"), &mut prompt, &mut runner).unwrap_err();

        assert!(err.message.contains("PROD"));
        assert_eq!(runner.calls_matching("repos create"), 2);
    }

    #[test]
    fn rerunning_treats_already_exists_as_success_both_times() {
        let mut runner = RuleRunner::new().on(
            "repos create",
            vec![fail(1, "already exists"), fail(1, "already exists")],
        );
        let mut prompt = ScriptedPrompt::new();

        for _ in 0..2 {
            let outcome =
                link(&context(), &config("devOnly"), Some("jdoe"), &mut prompt, &mut runner)
                    .unwrap();
            assert_eq!(outcome.already_present.len(), 1);
            assert!(outcome.mirrors_created.is_empty());
        }
    }
}
