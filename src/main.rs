use anyhow::Context;
use clap::Parser;

use feedwatch::cli::commands;
use feedwatch::cli::{Cli, Commands};
use feedwatch::{Settings, logging};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);

    if let Commands::Init { force } = command {
        return commands::init::run_init(&cli.config, force);
    }

    let settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    logging::init_with_config(&settings.logging);

    match command {
        Commands::Run => {
            settings.validate()?;
            commands::run::run(&settings)
        }
        Commands::Scan => commands::scan::run(&settings),
        Commands::Parse { file } => commands::parse::run(&file, &settings),
        Commands::Config => commands::init::run_config(&settings),
        Commands::Init { .. } => Ok(()),
    }
}
