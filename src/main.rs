use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{create, doctor, setup, GlobalArgs};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "wireup")]
#[command(version = VERSION)]
#[command(about = "Wire a freshly generated data project into source control, warehouse, and workspace")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the repository and optional integrations
    Setup(setup::SetupArgs),
    /// Add notebooks or apps to a provisioned project and publish them
    Create(create::CreateArgs),
    /// Check external tools and profiles without mutating anything
    Doctor(doctor::DoctorArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    output::print_json_result(json_result).ok();

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
