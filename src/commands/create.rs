use clap::Args;

use wireup::artifact::ArtifactKind;
use wireup::config::{self, ProjectConfig};
use wireup::preflight;
use wireup::publish::{self, PublishOutcome, PublishRequest};
use wireup::utils::command::SystemRunner;
use wireup::utils::prompt::PromptEngine;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct CreateArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long, default_value = ".")]
    pub dir: String,

    /// Notebook to publish (repeatable; prompts when no artifact flags given)
    #[arg(long, value_name = "NAME")]
    pub notebook: Vec<String>,

    /// App to publish (repeatable; prompts when no artifact flags given)
    #[arg(long, value_name = "NAME")]
    pub app: Vec<String>,

    /// Publish artifacts that already exist on disk instead of creating them
    #[arg(long)]
    pub connect_existing: bool,

    /// Commit message (falls back to a default when blank)
    #[arg(short, long)]
    pub message: Option<String>,
}

pub fn run_json(args: CreateArgs, _global: &GlobalArgs) -> CmdResult<PublishOutcome> {
    let dir = config::resolve_dir(&args.dir);
    let config = ProjectConfig::load(&dir)?;

    preflight::require_tool("git", preflight::GIT_INSTALL_HINT)?;
    preflight::require_tool("snowsql", preflight::SNOWSQL_INSTALL_HINT)?;

    let mut artifacts = Vec::new();
    artifacts.extend(
        args.notebook
            .into_iter()
            .map(|name| (ArtifactKind::Notebook, name)),
    );
    artifacts.extend(args.app.into_iter().map(|name| (ArtifactKind::App, name)));

    let request = PublishRequest {
        artifacts,
        connect_existing: args.connect_existing,
        message: args.message,
    };

    let mut prompt = PromptEngine::new();
    let mut runner = SystemRunner;
    let output = publish::publish(&dir, &config, request, &mut prompt, &mut runner)?;
    Ok((output, 0))
}
