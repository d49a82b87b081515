use clap::Parser;
use retrain_pipeline::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => cli::serve::run(args).await,
        Command::Train => cli::train::run().await,
        Command::Seed(args) => cli::seed::run(args).await,
        Command::Submit(args) => cli::submit::run(args).await,
        Command::Probe(args) => cli::probe::run(args).await,
    }
}
