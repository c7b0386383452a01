use super::ServerOverrides;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use ragkit::services::ConfigService;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a config file with default settings
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration (file, environment and flags combined)
    Show,

    /// Print the config file location
    Path,
}

pub fn execute(
    config_service: &ConfigService,
    overrides: &ServerOverrides,
    args: ConfigArgs,
) -> Result<()> {
    match args.command {
        ConfigCommands::Init { force } => {
            if config_service.exists() && !force {
                return Err(anyhow::anyhow!(
                    "Config already exists at {}. Use --force to overwrite.",
                    config_service.path().display()
                ));
            }
            config_service.init()?;
            println!(
                "Wrote default configuration to {}",
                config_service.path().display()
            );
        },

        ConfigCommands::Show => {
            let config = overrides.load(config_service)?;
            let rendered = toml::to_string_pretty(&config)
                .context("Failed to render configuration")?;
            if !config_service.exists() {
                println!(
                    "# {} not found, showing defaults",
                    config_service.path().display()
                );
            }
            print!("{}", rendered);
        },

        ConfigCommands::Path => {
            println!("{}", config_service.path().display());
        },
    }

    Ok(())
}
