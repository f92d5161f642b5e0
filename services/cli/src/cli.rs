use crate::commands::{run_regions, run_register, run_status, RegionsArgs, RegisterArgs};
use crate::server;
use admissions_wizard::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Admissions Wizard",
    about = "Drive the admissions registration wizard and its sandbox backend from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the in-memory admissions backend (default command)
    Sandbox(SandboxArgs),
    /// List provinces, or the cities of one province
    Regions(RegionsArgs),
    /// Show the registration status and guardian slots
    Status,
    /// Complete all five steps from an answers file and submit
    Register(RegisterArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct SandboxArgs {
    /// Override the configured host for the sandbox server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the sandbox server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Sandbox(SandboxArgs::default()));

    match command {
        Command::Sandbox(args) => server::run(args),
        Command::Regions(args) => run_regions(args),
        Command::Status => run_status(),
        Command::Register(args) => run_register(args),
    }
}
