use serde::Serialize;

use cryptrepo_core::datastore::sqlite::is_encrypted;
use cryptrepo_core::KeyMode;

use crate::app::{open_repo, repo_path};
use crate::cli::Cli;
use crate::output::{pretty, table};

#[derive(Serialize)]
struct Status {
    path: String,
    encrypted: bool,
    key_mode: String,
    peer_id: String,
    storage_usage: u64,
    keystore_keys: usize,
    api_addr: Option<String>,
}

impl Status {
    fn rows(&self) -> Vec<Vec<String>> {
        vec![
            vec!["path".to_string(), self.path.clone()],
            vec!["encrypted".to_string(), self.encrypted.to_string()],
            vec!["key_mode".to_string(), self.key_mode.clone()],
            vec!["peer_id".to_string(), self.peer_id.clone()],
            vec!["storage_usage".to_string(), self.storage_usage.to_string()],
            vec!["keystore_keys".to_string(), self.keystore_keys.to_string()],
            vec![
                "api_addr".to_string(),
                self.api_addr.clone().unwrap_or_else(|| "-".to_string()),
            ],
        ]
    }
}

pub fn handle_status(cli: &Cli, json: bool) -> anyhow::Result<()> {
    let path = repo_path(cli)?;
    let repo = open_repo(cli)?;

    let encrypted = is_encrypted(&path)?;
    let peer_id = repo
        .config()?
        .map(|config| config.identity.peer_id.clone())
        .unwrap_or_default();
    let usage = repo.storage_usage()?;
    let keys = repo.keystore().list()?.len();
    let api = repo.api_addr()?;
    repo.close()?;

    let key_mode = if cli.store.segmented_keys {
        KeyMode::Segmented
    } else {
        KeyMode::Flat
    };
    let status = Status {
        path: path.display().to_string(),
        encrypted,
        key_mode: format!("{:?}", key_mode).to_lowercase(),
        peer_id,
        storage_usage: usage,
        keystore_keys: keys,
        api_addr: api,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!(
            "{}",
            table(pretty(cli.quiet), &["FIELD", "VALUE"], &status.rows())
        );
    }
    Ok(())
}
