//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", super::resolve_config_path(global).display());
            Ok(())
        }

        ConfigCommand::Show => {
            let path = super::resolve_config_path(global);
            let config = super::load_config(global)?;
            let rendered = config.to_toml().map_err(|e| CliError::config(&path, e))?;
            print!("{rendered}");
            println!();
            println!("# settings document: {}", config.settings_path().display());
            Ok(())
        }
    }
}
