use clap::Args;

use wireup::config::{self, ProjectConfig};
use wireup::preflight::{self, PreflightReport};
use wireup::utils::command::SystemRunner;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct DoctorArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long, default_value = ".")]
    pub dir: String,

    /// Check only the warehouse integration's tools
    #[arg(long)]
    pub warehouse: bool,

    /// Check only the workspace integration's tools
    #[arg(long)]
    pub workspace: bool,
}

pub fn run_json(args: DoctorArgs, _global: &GlobalArgs) -> CmdResult<PreflightReport> {
    let dir = config::resolve_dir(&args.dir);
    let config = ProjectConfig::load(&dir)?;

    // No scope flag means check everything.
    let all = !args.warehouse && !args.workspace;
    let mut runner = SystemRunner;
    let report = preflight::doctor(
        &config,
        all || args.warehouse,
        all || args.workspace,
        &mut runner,
    );

    let exit_code = if report.passed { 0 } else { 1 };
    Ok((report, exit_code))
}
