//! Configuration commands.

use std::path::Path;

use anyhow::Result;
use boardsync_core::SyncConfig;
use clap::Subcommand;

use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show {
        /// Print as TOML instead of a summary
        #[arg(long)]
        toml: bool,
    },

    /// Print the default config file path
    Path,
}

pub fn execute(cmd: ConfigCommands, config: &SyncConfig, explicit: Option<&Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show { toml } => {
            if toml {
                let mut shown = config.clone();
                if shown.token.is_some() {
                    shown.token = Some("********".to_string());
                }
                print!("{}", toml::to_string_pretty(&shown)?);
            } else {
                let default_path = SyncConfig::default_path().filter(|p| p.exists());
                output::print_config(config, explicit.or(default_path.as_deref()));
            }
        }

        ConfigCommands::Path => match SyncConfig::default_path() {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("No config directory on this platform"),
        },
    }

    Ok(())
}
