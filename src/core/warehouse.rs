//! Warehouse linking.
//!
//! Registers the remote repository as a trackable git-repository object and
//! provisions per-environment schemas and grants. Authentication uses a
//! passphrase scoped per attempt: each entry lives inside a
//! [`ScopedSecret`] guard and is erased before the next attempt and on
//! every exit path.

use serde::Serialize;

use crate::config::{ProjectConfig, WarehouseSettings};
use crate::context::ProvisioningContext;
use crate::error::{Error, Result};
use crate::log_status;
use crate::secret::ScopedSecret;
use crate::utils::command::{CmdRequest, CommandRunner};
use crate::utils::prompt::Prompt;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseOutcome {
    pub connection: String,
    pub repository_registered: bool,
    pub schemas_provisioned: Vec<String>,
}

/// Link the provisioned repository into the warehouse.
pub fn link(
    context: &ProvisioningContext,
    config: &ProjectConfig,
    prompt: &mut dyn Prompt,
    runner: &mut dyn CommandRunner,
) -> Result<WarehouseOutcome> {
    let settings = config.warehouse()?;
    validate_settings(settings)?;
    for environment in config.eager_environments() {
        bare_ident("environments.database", &environment.database)?;
    }

    let secret = authenticate(settings, config.secret_attempts, prompt, runner)?;
    let outcome = provision_objects(context, config, settings, runner);
    drop(secret);
    outcome
}

/// Prompt for the passphrase up to the configured bound. The secret is
/// exported only while its guard lives; a failed connection test drops the
/// guard before the next attempt, and exhausting the bound leaves nothing
/// exported.
pub(crate) fn authenticate(
    settings: &WarehouseSettings,
    attempts: u32,
    prompt: &mut dyn Prompt,
    runner: &mut dyn CommandRunner,
) -> Result<ScopedSecret> {
    let question = format!(
        "Passphrase for warehouse connection '{}'",
        settings.connection
    );

    for attempt in 1..=attempts {
        let passphrase = prompt.secret(&question)?;
        let secret = ScopedSecret::export(passphrase);

        let probe = sql_request(&settings.connection, "select current_role();");
        if runner.run(&probe).success() {
            return Ok(secret);
        }

        drop(secret);
        log_status!(
            "warehouse",
            "Connection test failed (attempt {}/{})",
            attempt,
            attempts
        );
    }

    Err(Error::warehouse_auth_failed(&settings.connection, attempts))
}

fn provision_objects(
    context: &ProvisioningContext,
    config: &ProjectConfig,
    settings: &WarehouseSettings,
    runner: &mut dyn CommandRunner,
) -> Result<WarehouseOutcome> {
    let mut outcome = WarehouseOutcome {
        connection: settings.connection.clone(),
        repository_registered: false,
        schemas_provisioned: Vec::new(),
    };
    let mut first_error: Option<Error> = None;

    let register = register_repository_statement(context, settings);
    match execute(&settings.connection, &register, &settings.utility_database, runner) {
        Ok(()) => outcome.repository_registered = true,
        Err(err) => {
            log_status!("warehouse", "{}", err);
            first_error.get_or_insert(err);
        }
    }

    for environment in config.eager_environments() {
        let statement = schema_statement(context, settings, &environment.database);
        match execute(&settings.connection, &statement, &environment.database, runner) {
            Ok(()) => outcome.schemas_provisioned.push(environment.database.clone()),
            Err(err) => {
                log_status!("warehouse", "{}", err);
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        None => Ok(outcome),
        Some(err) => Err(err),
    }
}

fn execute(
    connection: &str,
    statement: &str,
    target: &str,
    runner: &mut dyn CommandRunner,
) -> Result<()> {
    let output = runner.run(&sql_request(connection, statement));
    if output.success() {
        Ok(())
    } else {
        Err(Error::warehouse_statement_failed(
            statement,
            target,
            output.error_text(),
        ))
    }
}

pub(crate) fn sql_request(connection: &str, statement: &str) -> CmdRequest {
    CmdRequest::new(
        "snowsql",
        &["-c", connection, "-o", "exit_on_error=true", "-q", statement],
    )
}

/// Fully qualified name of the git-repository object for this repository.
pub(crate) fn repository_object(context: &ProvisioningContext, settings: &WarehouseSettings) -> String {
    format!(
        "{}.{}.{}",
        quote_ident(&settings.utility_database),
        quote_ident(&settings.git_schema),
        quote_ident(&context.repo_name.to_uppercase())
    )
}

fn register_repository_statement(
    context: &ProvisioningContext,
    settings: &WarehouseSettings,
) -> String {
    format!(
        "CREATE GIT REPOSITORY IF NOT EXISTS {} API_INTEGRATION = {} ORIGIN = {};",
        repository_object(context, settings),
        settings.api_integration,
        quote_literal(&context.remote_url)
    )
}

fn schema_statement(
    context: &ProvisioningContext,
    settings: &WarehouseSettings,
    database: &str,
) -> String {
    let schema = quote_ident(&context.repo_name.to_uppercase());
    format!(
        "USE DATABASE {db}; CREATE SCHEMA IF NOT EXISTS {schema}; \
         GRANT ALL PRIVILEGES ON SCHEMA {db}.{schema} TO ROLE {role};",
        db = database,
        schema = schema,
        role = settings.engineering_role,
    )
}

/// Quote a SQL identifier, doubling any embedded quote.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQL string literal, doubling any embedded quote.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Bare identifiers from configuration (databases, role, integration) are
/// interpolated unquoted; hold them to a strict rule so no configuration
/// value can smuggle SQL.
fn validate_settings(settings: &WarehouseSettings) -> Result<()> {
    bare_ident("engineeringRole", &settings.engineering_role)?;
    bare_ident("apiIntegration", &settings.api_integration)?;
    Ok(())
}

pub(crate) fn bare_ident(key: &str, value: &str) -> Result<()> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(Error::config_invalid_value(
            key,
            Some(value.to_string()),
            "must contain only letters, digits, and underscore",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DefaultBranch;
    use crate::secret::{self, ScopedSecret};
    use crate::utils::command::testing::{fail, RuleRunner};
    use crate::utils::prompt::ScriptedPrompt;

    fn config(policy: &str) -> ProjectConfig {
        serde_json::from_str(&format!(
            r#"{{
                "organization": "https://dev.azure.com/acme",
                "project": "p",
                "environmentPolicy": "{}",
                "environments": [
                    {{"name": "PROD", "database": "ANALYTICS_PROD", "branch": "main"}},
                    {{"name": "STAGE", "database": "ANALYTICS_STAGE", "branch": "stage"}},
                    {{"name": "DEV", "database": "ANALYTICS_DEV", "branch": "dev"}}
                ],
                "warehouse": {{
                    "connection": "svc_principal",
                    "utilityDatabase": "UTILITY",
                    "gitSchema": "GIT_REPOS",
                    "apiIntegration": "EXT_GIT_INT"
                }}
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

    fn prompt_with_secrets(secrets: &[&str]) -> ScriptedPrompt {
        let mut prompt = ScriptedPrompt::new();
        prompt.secrets = secrets.iter().map(|s| s.to_string()).collect();
        prompt
    }

    #[test]
    fn second_attempt_succeeds_and_provisions_dev_schema() {
        let _env = secret::env_test_lock();

        let mut runner =
            RuleRunner::new().on("select current_role()", vec![fail(1, "authentication failed")]);
        let mut prompt = prompt_with_secrets(&["wrong", "right"]);

        let outcome = link(&context(), &config("devOnly"), &mut prompt, &mut runner).unwrap();

        assert!(outcome.repository_registered);
        assert_eq!(outcome.schemas_provisioned, vec!["ANALYTICS_DEV"]);
        assert_eq!(runner.calls_matching("select current_role()"), 2);
        assert_eq!(runner.calls_matching("USE DATABASE ANALYTICS_DEV"), 1);
        assert_eq!(runner.calls_matching("USE DATABASE ANALYTICS_PROD"), 0);
        assert!(!ScopedSecret::is_exported());
    }

    #[test]
    fn full_policy_provisions_all_three_environments() {
        let _env = secret::env_test_lock();

        let mut runner = RuleRunner::new();
        let mut prompt = prompt_with_secrets(&["right"]);

        let outcome = link(&context(), &config("all"), &mut prompt, &mut runner).unwrap();

        assert_eq!(
            outcome.schemas_provisioned,
            vec!["ANALYTICS_PROD", "ANALYTICS_STAGE", "ANALYTICS_DEV"]
        );
        assert!(!ScopedSecret::is_exported());
    }

    #[test]
    fn exhausted_attempts_abort_with_no_secret_left_and_no_statements_run() {
        let _env = secret::env_test_lock();

        let mut runner = RuleRunner::new().on(
            "select current_role()",
            vec![
                fail(1, "authentication failed"),
                fail(1, "authentication failed"),
                fail(1, "authentication failed"),
            ],
        );
        let mut prompt = prompt_with_secrets(&["a", "b", "c"]);

        let err = link(&context(), &config("devOnly"), &mut prompt, &mut runner).unwrap_err();

        assert_eq!(err.code.as_str(), "warehouse.auth_failed");
        assert!(!ScopedSecret::is_exported());
        assert_eq!(runner.calls_matching("CREATE GIT REPOSITORY"), 0);
        assert_eq!(runner.calls_matching("USE DATABASE"), 0);
    }

    #[test]
    fn statements_use_idempotent_create_forms() {
        let _env = secret::env_test_lock();

        let mut runner = RuleRunner::new();
        let mut prompt = prompt_with_secrets(&["right"]);

        link(&context(), &config("devOnly"), &mut prompt, &mut runner).unwrap();

        assert!(runner
            .calls
            .iter()
            .any(|c| c.contains("CREATE GIT REPOSITORY IF NOT EXISTS")));
        assert!(runner
            .calls
            .iter()
            .any(|c| c.contains("CREATE SCHEMA IF NOT EXISTS \"PROJ-X\"")));
        assert!(runner
            .calls
            .iter()
            .any(|c| c.contains("GRANT ALL PRIVILEGES ON SCHEMA ANALYTICS_DEV.\"PROJ-X\" TO ROLE GR_AI_ENGINEER")));
    }

    #[test]
    fn registration_failure_still_attempts_schemas_then_reports_failure() {
        let _env = secret::env_test_lock();

        let mut runner = RuleRunner::new()
            .on("CREATE GIT REPOSITORY", vec![fail(1, "integration not found")]);
        let mut prompt = prompt_with_secrets(&["right"]);

        let err = link(&context(), &config("devOnly"), &mut prompt, &mut runner).unwrap_err();

        assert_eq!(err.code.as_str(), "warehouse.statement_failed");
        assert_eq!(err.details["target"], "UTILITY");
        assert_eq!(runner.calls_matching("USE DATABASE ANALYTICS_DEV"), 1);
        assert!(!ScopedSecret::is_exported());
    }

    #[test]
    fn malicious_config_identifier_is_rejected_before_authentication() {
        let _env = secret::env_test_lock();

        let mut config = config("devOnly");
        config.warehouse.as_mut().unwrap().engineering_role = "ROLE; DROP TABLE".to_string();

        let mut runner = RuleRunner::new();
        let mut prompt = prompt_with_secrets(&["right"]);

        let err = link(&context(), &config, &mut prompt, &mut runner).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
        assert!(prompt.transcript.is_empty());
    }

    #[test]
    fn remote_url_is_quoted_as_a_literal() {
        let mut context = context();
        context.remote_url = "https://example.com/o'neil/_git/proj".to_string();
        let settings_config = config("devOnly");
        let statement =
            register_repository_statement(&context, settings_config.warehouse().unwrap());
        assert!(statement.contains("'https://example.com/o''neil/_git/proj'"));
    }
}
