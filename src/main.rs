use anyhow::Result;
use clap::Parser;

use kernelc::cli::args::{Cli, Commands};
use kernelc::commands::{handle_compile_command, handle_resident_command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("kernelc=debug")
            .init();
    }

    match cli.command {
        Commands::Compile(args) => handle_compile_command(args).await,
        Commands::Resident(args) => handle_resident_command(args).await,
    }
}
