use std::path::PathBuf;

use cryptrepo_core::{RepoConfig, RepoRegistry};
use tracing::info;

use crate::app::{salt_path, unlock, unlock_new};
use crate::cli::{Cli, InitArgs};
use crate::helpers::generate_peer_id;

pub fn handle_init(cli: &Cli, args: &InitArgs) -> anyhow::Result<()> {
    let target = args
        .path
        .clone()
        .or_else(|| cli.repo.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("No repository path provided. Use --repo or pass a path.")
        })?;
    let path = PathBuf::from(target);
    let registry = RepoRegistry::global();

    if path.exists() {
        let unlocked = unlock(cli, &path)?;
        if registry.is_initialized(&path, unlocked.key.as_ref(), &unlocked.options)? {
            if !cli.quiet {
                println!("Repository already initialized at {}", path.display());
            }
            return Ok(());
        }
    }

    let had_salt = salt_path(&path).exists();
    let unlocked = unlock_new(cli, &path, !args.no_encryption)?;
    let peer_id = match &args.peer_id {
        Some(id) => id.clone(),
        None => generate_peer_id()?,
    };
    let config = RepoConfig::with_identity(peer_id, None);

    if let Err(err) = registry.init(&path, unlocked.key.as_ref(), &unlocked.options, &config) {
        if !had_salt {
            let _ = std::fs::remove_file(salt_path(&path));
        }
        return Err(err.into());
    }
    info!(path = %path.display(), encrypted = unlocked.key.is_some(), "repository initialized");

    if !cli.quiet {
        let mode = if unlocked.key.is_some() {
            "encrypted"
        } else {
            "unencrypted"
        };
        println!("Initialized new {} repository at {}", mode, path.display());
    }
    Ok(())
}
