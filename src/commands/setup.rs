use clap::Args;

use wireup::config::{self, ProjectConfig};
use wireup::setup::{self, SetupOutput, SetupRequest};
use wireup::utils::command::SystemRunner;
use wireup::utils::prompt::PromptEngine;

use super::{flag_pair, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct SetupArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long, default_value = ".")]
    pub dir: String,

    /// Repository name (prompts when omitted)
    #[arg(long)]
    pub name: Option<String>,

    /// Create the repository as private
    #[arg(long, conflicts_with = "public")]
    pub private: bool,

    /// Create the repository as public
    #[arg(long)]
    pub public: bool,

    /// Link the analytics warehouse without asking
    #[arg(long, conflicts_with = "no_warehouse")]
    pub warehouse: bool,

    /// Skip the analytics warehouse without asking
    #[arg(long)]
    pub no_warehouse: bool,

    /// Link the compute workspace without asking
    #[arg(long, conflicts_with = "no_workspace")]
    pub workspace: bool,

    /// Skip the compute workspace without asking
    #[arg(long)]
    pub no_workspace: bool,

    /// Workspace username used to derive per-user mirror paths
    #[arg(long)]
    pub user: Option<String>,
}

pub fn run_json(args: SetupArgs, _global: &GlobalArgs) -> CmdResult<SetupOutput> {
    let dir = config::resolve_dir(&args.dir);
    let config = ProjectConfig::load(&dir)?;

    let request = SetupRequest {
        repo_name: args.name,
        private: flag_pair(args.private, args.public),
        link_warehouse: flag_pair(args.warehouse, args.no_warehouse),
        link_workspace: flag_pair(args.workspace, args.no_workspace),
        workspace_user: args.user,
    };

    let mut prompt = PromptEngine::new();
    let mut runner = SystemRunner;
    let output = setup::run(&dir, &config, request, &mut prompt, &mut runner)?;

    // Partial integration failures are data in the report, not a non-zero
    // exit; only the mandatory phase aborts the command.
    Ok((output, 0))
}
