//! Interactive prompting.
//!
//! Prompts write to stderr and read from stdin so stdout stays reserved for
//! the JSON response envelope. Non-interactive runs fall back to defaults
//! where one exists and fail fast where one does not.

use std::io::{self, BufRead, IsTerminal, Write};

use crate::error::{Error, Result};

/// Interactive input source. Production code uses [`PromptEngine`];
/// tests script the conversation.
pub trait Prompt {
    fn is_interactive(&self) -> bool;

    /// Ask a free-text question. Errors when no terminal is attached.
    fn line(&mut self, question: &str) -> Result<String>;

    /// Ask for a secret without echoing input.
    fn secret(&mut self, question: &str) -> Result<String>;

    /// Ask a yes/no question. Returns the default when non-interactive.
    fn yes_no(&mut self, question: &str, default: bool) -> bool;

    /// Display a message as part of the prompt conversation.
    fn say(&mut self, message: &str);
}

/// TTY-backed prompt engine.
pub struct PromptEngine {
    interactive: bool,
}

impl PromptEngine {
    /// Create engine with automatic TTY detection.
    pub fn new() -> Self {
        Self {
            interactive: io::stdin().is_terminal() && io::stderr().is_terminal(),
        }
    }

    /// Create engine with explicit interactive mode.
    pub fn with_interactive(interactive: bool) -> Self {
        Self { interactive }
    }

    /// Force non-interactive mode (useful for flag-driven runs).
    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    fn read_line(&self, question: &str) -> Result<String> {
        eprint!("{}: ", question);
        io::stderr().flush().ok();

        let mut input = String::new();
        io::stdin()
            .lock()
            .read_line(&mut input)
            .map_err(|e| Error::internal_io(e.to_string(), Some("read prompt input".to_string())))?;
        Ok(input.trim().to_string())
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompt for PromptEngine {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn line(&mut self, question: &str) -> Result<String> {
        if !self.interactive {
            return Err(Error::validation_missing_argument(vec![question.to_string()])
                .with_hint("No terminal attached; pass the value as a command-line flag"));
        }
        self.read_line(question)
    }

    fn secret(&mut self, question: &str) -> Result<String> {
        if !self.interactive {
            return Err(Error::validation_missing_argument(vec![question.to_string()])
                .with_hint("Secret entry requires an interactive terminal"));
        }
        eprint!("{}: ", question);
        io::stderr().flush().ok();
        rpassword::read_password()
            .map_err(|e| Error::internal_io(e.to_string(), Some("read secret input".to_string())))
    }

    fn yes_no(&mut self, question: &str, default: bool) -> bool {
        if !self.interactive {
            return default;
        }

        let suffix = if default { "[Y/n]" } else { "[y/N]" };
        let answer = match self.read_line(&format!("{} {}", question, suffix)) {
            Ok(answer) => answer.to_lowercase(),
            Err(_) => return default,
        };

        if answer.is_empty() {
            return default;
        }
        answer.starts_with('y')
    }

    fn say(&mut self, message: &str) {
        if self.interactive {
            eprintln!("{}", message);
        }
    }
}

/// Ask a question until the answer passes validation, bounded by `attempts`.
///
/// Invalid input is re-prompted in place (never recursion); the final
/// validation error is returned once the bound is exhausted.
pub fn ask_until<T>(
    prompt: &mut dyn Prompt,
    question: &str,
    attempts: u32,
    validate: impl Fn(&str) -> Result<T>,
) -> Result<T> {
    let mut last_err = Error::validation_missing_argument(vec![question.to_string()]);
    for _ in 0..attempts {
        let raw = prompt.line(question)?;
        match validate(&raw) {
            Ok(value) => return Ok(value),
            Err(e) => {
                prompt.say(&format!("  {}", problem_text(&e)));
                last_err = e;
            }
        }
    }
    Err(last_err)
}

fn problem_text(err: &Error) -> String {
    err.details
        .get("problem")
        .and_then(|p| p.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| err.message.clone())
}

/// Scripted prompt double for interaction tests.
#[cfg(test)]
pub(crate) struct ScriptedPrompt {
    pub lines: std::collections::VecDeque<String>,
    pub secrets: std::collections::VecDeque<String>,
    pub confirms: std::collections::VecDeque<bool>,
    pub transcript: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompt {
    pub fn new() -> Self {
        Self {
            lines: std::collections::VecDeque::new(),
            secrets: std::collections::VecDeque::new(),
            confirms: std::collections::VecDeque::new(),
            transcript: Vec::new(),
        }
    }

    pub fn with_lines(lines: &[&str]) -> Self {
        let mut prompt = Self::new();
        prompt.lines = lines.iter().map(|l| l.to_string()).collect();
        prompt
    }
}

#[cfg(test)]
impl Prompt for ScriptedPrompt {
    fn is_interactive(&self) -> bool {
        true
    }

    fn line(&mut self, question: &str) -> Result<String> {
        self.transcript.push(question.to_string());
        self.lines
            .pop_front()
            .ok_or_else(|| Error::validation_missing_argument(vec![question.to_string()]))
    }

    fn secret(&mut self, question: &str) -> Result<String> {
        self.transcript.push(question.to_string());
        self.secrets
            .pop_front()
            .ok_or_else(|| Error::validation_missing_argument(vec![question.to_string()]))
    }

    fn yes_no(&mut self, question: &str, default: bool) -> bool {
        self.transcript.push(question.to_string());
        self.confirms.pop_front().unwrap_or(default)
    }

    fn say(&mut self, message: &str) {
        self.transcript.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation;

    #[test]
    fn non_interactive_yes_no_returns_default() {
        let mut engine = PromptEngine::non_interactive();
        assert!(engine.yes_no("Link the warehouse?", true));
        assert!(!engine.yes_no("Link the workspace?", false));
    }

    #[test]
    fn non_interactive_line_fails_with_flag_hint() {
        let mut engine = PromptEngine::non_interactive();
        let err = engine.line("Repository name").unwrap_err();
        assert!(err.hints.iter().any(|h| h.message.contains("flag")));
    }

    #[test]
    fn ask_until_retries_past_invalid_input() {
        let mut prompt = ScriptedPrompt::with_lines(&["bad name", "proj-x"]);
        let name = ask_until(&mut prompt, "Repository name", 3, |raw| {
            validation::repo_name(raw).map(str::to_string)
        })
        .unwrap();
        assert_eq!(name, "proj-x");
    }

    #[test]
    fn ask_until_gives_up_after_bound() {
        let mut prompt = ScriptedPrompt::with_lines(&["a b", "c d", "e f"]);
        let result = ask_until(&mut prompt, "Repository name", 3, |raw| {
            validation::repo_name(raw).map(str::to_string)
        });
        assert!(result.is_err());
        assert_eq!(prompt.lines.len(), 0);
    }
}
