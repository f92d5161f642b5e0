mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use admissions_wizard::error::AppError;

/// Entry point for the binary. Synchronous because the admissions gateway
/// drives its own runtime; only the sandbox server starts one here.
pub fn run() -> Result<(), AppError> {
    cli::run()
}
