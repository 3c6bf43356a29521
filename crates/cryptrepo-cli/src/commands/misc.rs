use std::io::IsTerminal;

use clap::CommandFactory;
use clap_complete::generate;
use dialoguer::Confirm;

use cryptrepo_core::RepoRegistry;

use crate::app::{open_repo, repo_path, salt_path};
use crate::cli::{Cli, KeysCommand};

pub fn handle_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "cryptrepo", &mut std::io::stdout());
    Ok(())
}

pub fn handle_keys(cli: &Cli, command: &KeysCommand) -> anyhow::Result<()> {
    match command {
        KeysCommand::List => {
            let repo = open_repo(cli)?;
            let names = repo.keystore().list()?;
            repo.close()?;
            if names.is_empty() && !cli.quiet {
                println!("No keys stored.");
            }
            for name in names {
                println!("{}", name);
            }
        }
    }
    Ok(())
}

pub fn handle_remove(cli: &Cli, yes: bool) -> anyhow::Result<()> {
    let path = repo_path(cli)?;
    if !yes {
        if !std::io::stdin().is_terminal() {
            return Err(anyhow::anyhow!(
                "Refusing to remove without confirmation. Pass --yes."
            ));
        }
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete the repository at {}?", path.display()))
            .default(false)
            .interact()
            .map_err(|e| anyhow::anyhow!("Failed to read confirmation: {}", e))?;
        if !confirmed {
            if !cli.quiet {
                println!("Aborted.");
            }
            return Ok(());
        }
    }

    RepoRegistry::global().remove(&path)?;
    let salt = salt_path(&path);
    if salt.exists() {
        std::fs::remove_file(&salt)
            .map_err(|e| anyhow::anyhow!("Failed to remove {}: {}", salt.display(), e))?;
    }

    if !cli.quiet {
        println!("Removed repository at {}", path.display());
    }
    Ok(())
}
