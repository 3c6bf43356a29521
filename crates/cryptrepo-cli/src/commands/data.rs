use std::io::Write;

use cryptrepo_core::{Query, RepoError};

use crate::app::{exit_not_found_with_hint, open_repo};
use crate::cli::{Cli, ListArgs};
use crate::helpers::{parse_key, read_value};
use crate::output::{entries_json, entry_rows, pretty, table};

pub fn handle_put(cli: &Cli, key: &str, value: Option<String>) -> anyhow::Result<()> {
    let key = parse_key(key)?;
    let value = read_value(value)?;
    let repo = open_repo(cli)?;
    repo.datastore().put(&key, &value)?;
    repo.close()?;

    if !cli.quiet {
        println!("Stored {} ({} bytes)", key, value.len());
    }
    Ok(())
}

pub fn handle_get(cli: &Cli, key: &str) -> anyhow::Result<()> {
    let key = parse_key(key)?;
    let repo = open_repo(cli)?;
    let value = match repo.datastore().get(&key) {
        Ok(value) => value,
        Err(RepoError::NotFound(_)) => exit_not_found_with_hint(
            &format!("Key not found: {}", key),
            "Hint: Run `cryptrepo list` to see stored keys.",
        ),
        Err(err) => return Err(err.into()),
    };
    repo.close()?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&value)?;
    stdout.flush()?;
    Ok(())
}

pub fn handle_rm(cli: &Cli, key: &str) -> anyhow::Result<()> {
    let key = parse_key(key)?;
    let repo = open_repo(cli)?;
    let store = repo.datastore();
    if !store.has(&key)? {
        exit_not_found_with_hint(
            &format!("Key not found: {}", key),
            "Hint: Run `cryptrepo list` to see stored keys.",
        );
    }
    store.delete(&key)?;
    repo.close()?;

    if !cli.quiet {
        println!("Deleted {}", key);
    }
    Ok(())
}

pub fn handle_list(cli: &Cli, args: &ListArgs) -> anyhow::Result<()> {
    let mut query = Query::new().keys_only().offset(args.offset);
    if let Some(prefix) = &args.prefix {
        query = query.prefix(parse_key(prefix)?);
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }

    let repo = open_repo(cli)?;
    let mut entries = repo.datastore().query(&query)?.rest()?;
    repo.close()?;
    entries.sort_by(|a, b| a.key.cmp(&b.key));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries_json(&entries))?);
        return Ok(());
    }
    if entries.is_empty() {
        if !cli.quiet {
            println!("No keys found.");
        }
        return Ok(());
    }
    println!(
        "{}",
        table(pretty(cli.quiet), &["KEY", "SIZE"], &entry_rows(&entries))
    );
    Ok(())
}
