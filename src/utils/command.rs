//! Command execution primitives with consistent error handling.
//!
//! Every external-system call in this crate goes through [`CommandRunner`].
//! Invocations are structured argument arrays; no shell is involved, so a
//! user-supplied repository name or username can never splice into a
//! command line.

use std::path::PathBuf;
use std::process::Command;

use serde::Serialize;

/// A fully described external command invocation.
#[derive(Debug, Clone)]
pub struct CmdRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CmdRequest {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Attach an environment variable for this invocation only.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Loggable form: program and arguments, never environment values.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Captured result of a command invocation.
///
/// Never raises: a process that could not be spawned at all is reported as
/// exit code 127 with the spawn error in stderr. Callers decide success by
/// inspecting `exit_code` and, where a tool embeds errors in a zero-exit
/// response, the output text.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CmdOutput {
    pub exit_code: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Extract error text, preferring stderr and falling back to stdout.
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            stderr.to_string()
        } else {
            self.stdout.trim().to_string()
        }
    }

    /// Case-insensitive search across both streams. External tools disagree
    /// about which stream carries their "already exists" notices.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.stdout.to_lowercase().contains(&needle) || self.stderr.to_lowercase().contains(&needle)
    }

    pub fn trimmed_stdout(&self) -> String {
        self.stdout.trim().to_string()
    }
}

/// Executes command requests. The trait is the seam test doubles implement;
/// production code uses [`SystemRunner`].
pub trait CommandRunner {
    fn run(&mut self, request: &CmdRequest) -> CmdOutput;
}

/// Runs requests against the real system.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, request: &CmdRequest) -> CmdOutput {
        let mut command = Command::new(&request.program);
        command.args(&request.args);
        if let Some(dir) = &request.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &request.env {
            command.env(key, value);
        }

        match command.output() {
            Ok(output) => CmdOutput {
                exit_code: output.status.code().unwrap_or(1),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            },
            Err(e) => CmdOutput {
                exit_code: 127,
                stdout: String::new(),
                stderr: format!("failed to run {}: {}", request.program, e),
            },
        }
    }
}

/// Run a command and capture its output.
pub fn run(request: &CmdRequest) -> CmdOutput {
    SystemRunner.run(request)
}

/// Check that a command succeeds without keeping its output.
pub fn succeeds(request: &CmdRequest) -> bool {
    run(request).success()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_captures_stdout_on_success() {
        let output = run(&CmdRequest::new("echo", &["hello"]));
        assert!(output.success());
        assert_eq!(output.trimmed_stdout(), "hello");
    }

    #[test]
    fn run_reports_spawn_failure_as_exit_127() {
        let output = run(&CmdRequest::new("wireup-no-such-tool-xyz", &[]));
        assert_eq!(output.exit_code, 127);
        assert!(output.stderr.contains("failed to run"));
    }

    #[test]
    fn run_reports_nonzero_exit_without_raising() {
        let output = run(&CmdRequest::new("false", &[]));
        assert!(!output.success());
    }

    #[test]
    fn error_text_prefers_stderr() {
        let output = CmdOutput {
            exit_code: 1,
            stdout: "stdout content".to_string(),
            stderr: "stderr content".to_string(),
        };
        assert_eq!(output.error_text(), "stderr content");
    }

    #[test]
    fn error_text_falls_back_to_stdout() {
        let output = CmdOutput {
            exit_code: 1,
            stdout: "stdout content".to_string(),
            stderr: String::new(),
        };
        assert_eq!(output.error_text(), "stdout content");
    }

    #[test]
    fn mentions_is_case_insensitive_across_streams() {
        let output = CmdOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: "Repository Already Exists at path".to_string(),
        };
        assert!(output.mentions("already exists"));
        assert!(!output.mentions("not found"));
    }

    #[test]
    fn display_omits_environment_values() {
        let request =
            CmdRequest::new("snowsql", &["-c", "profile"]).with_env("SNOWSQL_PWD", "hunter2");
        let shown = request.display();
        assert!(shown.contains("snowsql -c profile"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn in_dir_sets_working_directory() {
        let output = run(&CmdRequest::new("pwd", &[]).in_dir("/tmp"));
        assert!(output.success());
        assert!(output.trimmed_stdout().ends_with("tmp"));
    }
}
