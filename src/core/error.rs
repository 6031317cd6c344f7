use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,

    ToolMissing,
    ToolNotAuthenticated,
    ToolUnreachable,

    ScmCreateFailed,
    ScmPushFailed,
    GitCommandFailed,

    WarehouseAuthFailed,
    WarehouseStatementFailed,

    WorkspaceMirrorFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::ToolMissing => "tool.missing",
            ErrorCode::ToolNotAuthenticated => "tool.not_authenticated",
            ErrorCode::ToolUnreachable => "tool.unreachable",

            ErrorCode::ScmCreateFailed => "scm.create_failed",
            ErrorCode::ScmPushFailed => "scm.push_failed",
            ErrorCode::GitCommandFailed => "git.command_failed",

            ErrorCode::WarehouseAuthFailed => "warehouse.auth_failed",
            ErrorCode::WarehouseStatementFailed => "warehouse.statement_failed",

            ErrorCode::WorkspaceMirrorFailed => "workspace.mirror_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDetails {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementFailedDetails {
    pub statement: String,
    pub target: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            serde_json::json!({ "args": args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        let details = serde_json::to_value(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            value,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn tool_missing(tool: impl Into<String>, install_hint: impl Into<String>) -> Self {
        let tool = tool.into();
        let details = serde_json::to_value(ToolDetails {
            tool: tool.clone(),
            probe: None,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ToolMissing,
            format!("Required tool '{}' was not found on PATH", tool),
            details,
        )
        .with_hint(install_hint)
    }

    pub fn tool_not_authenticated(
        tool: impl Into<String>,
        probe: impl Into<String>,
        login_hint: impl Into<String>,
    ) -> Self {
        let tool = tool.into();
        let details = serde_json::to_value(ToolDetails {
            tool: tool.clone(),
            probe: Some(probe.into()),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ToolNotAuthenticated,
            format!("Tool '{}' has no authenticated session", tool),
            details,
        )
        .with_hint(login_hint)
    }

    pub fn tool_unreachable(tool: impl Into<String>, probe: impl Into<String>) -> Self {
        let tool = tool.into();
        let details = serde_json::to_value(ToolDetails {
            tool: tool.clone(),
            probe: Some(probe.into()),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ToolUnreachable,
            format!("Tool '{}' could not reach its service", tool),
            details,
        )
        .with_retryable(true)
    }

    pub fn scm_create_failed(command: impl Into<String>, exit_code: i32, stderr: String) -> Self {
        let details = serde_json::to_value(CommandFailedDetails {
            command: command.into(),
            exit_code,
            stderr,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ScmCreateFailed,
            "Failed to create remote repository",
            details,
        )
    }

    pub fn scm_push_failed(branch: impl Into<String>, attempts: u32, stderr: String) -> Self {
        Self::new(
            ErrorCode::ScmPushFailed,
            format!(
                "Push of branch '{}' failed after {} attempts",
                branch.into(),
                attempts
            ),
            serde_json::json!({ "attempts": attempts, "stderr": stderr }),
        )
        .with_retryable(false)
    }

    pub fn git_command_failed(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GitCommandFailed,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn warehouse_auth_failed(connection: impl Into<String>, attempts: u32) -> Self {
        Self::new(
            ErrorCode::WarehouseAuthFailed,
            format!(
                "Warehouse connection '{}' rejected the passphrase after {} attempts",
                connection.into(),
                attempts
            ),
            serde_json::json!({ "attempts": attempts }),
        )
    }

    pub fn warehouse_statement_failed(
        statement: impl Into<String>,
        target: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let details = serde_json::to_value(StatementFailedDetails {
            statement: statement.into(),
            target: target.into(),
            error: error.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::WarehouseStatementFailed,
            "Warehouse statement failed",
            details,
        )
    }

    pub fn workspace_mirror_failed(failures: Vec<String>) -> Self {
        Self::new(
            ErrorCode::WorkspaceMirrorFailed,
            format!("Repository mirror failed for: {}", failures.join(", ")),
            serde_json::json!({ "environments": failures }),
        )
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        Self::new(
            ErrorCode::ConfigMissingKey,
            "Missing required configuration key",
            serde_json::json!({ "key": key.into(), "path": path }),
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            serde_json::json!({ "path": path.into(), "error": err.to_string() }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            serde_json::json!({ "key": key.into(), "value": value, "problem": problem.into() }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::to_value(InternalIoErrorDetails {
            error: error.into(),
            context,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            serde_json::json!({ "error": error.into(), "context": context }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }
}
