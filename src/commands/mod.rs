pub mod create;
pub mod doctor;
pub mod setup;

use crate::output;
use crate::Commands;

pub type CmdResult<T> = wireup::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

/// Resolve true/false flag pairs: `--x` wins, `--no-x` wins, neither means
/// ask interactively.
pub(crate) fn flag_pair(yes: bool, no: bool) -> Option<bool> {
    if yes {
        Some(true)
    } else if no {
        Some(false)
    } else {
        None
    }
}

pub fn run_json(command: Commands, global: &GlobalArgs) -> (wireup::Result<serde_json::Value>, i32) {
    match command {
        Commands::Setup(args) => output::map_cmd_result_to_json(setup::run_json(args, global)),
        Commands::Create(args) => output::map_cmd_result_to_json(create::run_json(args, global)),
        Commands::Doctor(args) => output::map_cmd_result_to_json(doctor::run_json(args, global)),
    }
}
