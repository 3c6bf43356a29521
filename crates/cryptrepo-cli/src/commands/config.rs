use cryptrepo_core::RepoError;

use crate::app::{exit_not_found_with_hint, open_repo};
use crate::cli::{Cli, ConfigCommand};
use crate::helpers::parse_config_value;
use crate::output::{config_value, redact_config};

const NOT_INITIALIZED_HINT: &str = "Hint: Run `cryptrepo init` to create the repository config.";

pub fn handle_config(cli: &Cli, command: &ConfigCommand) -> anyhow::Result<()> {
    let repo = open_repo(cli)?;
    let result = match command {
        ConfigCommand::Show { show_secrets } => {
            let Some(config) = repo.config()? else {
                exit_not_found_with_hint("Repository has no config", NOT_INITIALIZED_HINT);
            };
            let mut map = config.to_map()?;
            if !show_secrets {
                redact_config(&mut map);
            }
            println!("{}", serde_json::to_string_pretty(&map)?);
            Ok(())
        }
        ConfigCommand::Get { selector } => match repo.get_config_key(selector) {
            Ok(value) => {
                println!("{}", config_value(&value)?);
                Ok(())
            }
            Err(RepoError::NotFound(_)) => {
                exit_not_found_with_hint("Repository has no config", NOT_INITIALIZED_HINT)
            }
            Err(err) => Err(err.into()),
        },
        ConfigCommand::Set {
            selector,
            value,
            json,
        } => {
            let value = parse_config_value(value, *json)?;
            repo.set_config_key(selector, value)?;
            if !cli.quiet {
                println!("Updated {}", selector);
            }
            Ok(())
        }
    };
    repo.close()?;
    result
}
