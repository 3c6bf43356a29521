//! Input and parsing helper functions for the CLI.

use std::io::{self, IsTerminal, Read};

use dialoguer::Password;
use secrecy::SecretString;
use serde_json::Value;
use zeroize::Zeroizing;

use cryptrepo_core::Key;

fn env_passphrase() -> Option<SecretString> {
    let value = Zeroizing::new(std::env::var("CRYPTREPO_PASSPHRASE").ok()?);
    if value.trim().is_empty() {
        return None;
    }
    Some(SecretString::from(value.to_string()))
}

/// Prompt for passphrase, or read from CRYPTREPO_PASSPHRASE env var.
pub fn prompt_passphrase() -> anyhow::Result<SecretString> {
    if let Some(passphrase) = env_passphrase() {
        return Ok(passphrase);
    }
    if !io::stdin().is_terminal() {
        return Err(anyhow::anyhow!(
            "No passphrase provided and no TTY available. Set CRYPTREPO_PASSPHRASE."
        ));
    }
    let value = Password::new()
        .with_prompt("Passphrase")
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to read passphrase: {}", e))?;
    Ok(SecretString::from(value))
}

/// Prompt for passphrase with confirmation (for init), or read from CRYPTREPO_PASSPHRASE env var.
pub fn prompt_init_passphrase() -> anyhow::Result<SecretString> {
    if let Some(passphrase) = env_passphrase() {
        return Ok(passphrase);
    }
    if !io::stdin().is_terminal() {
        return Err(anyhow::anyhow!(
            "No passphrase provided and no TTY available. Set CRYPTREPO_PASSPHRASE."
        ));
    }
    let value = Password::new()
        .with_prompt("Enter passphrase")
        .with_confirmation("Confirm passphrase", "Passphrases do not match")
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to read passphrase: {}", e))?;
    Ok(SecretString::from(value))
}

/// Parse a user-supplied key, rejecting the root.
pub fn parse_key(value: &str) -> anyhow::Result<Key> {
    let key = Key::new(value);
    if key.is_root() {
        return Err(anyhow::anyhow!("Invalid key: {:?}", value));
    }
    Ok(key)
}

/// Value from the argument, or all of stdin when it is piped.
pub fn read_value(value: Option<String>) -> anyhow::Result<Vec<u8>> {
    if let Some(value) = value {
        return Ok(value.into_bytes());
    }
    if io::stdin().is_terminal() {
        return Err(anyhow::anyhow!("No value given; pass VALUE or pipe it via stdin"));
    }
    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to read stdin: {}", e))?;
    Ok(buffer)
}

/// Parse a config value: JSON when asked for, a plain string otherwise.
pub fn parse_config_value(value: &str, json: bool) -> anyhow::Result<Value> {
    if !json {
        return Ok(Value::String(value.to_string()));
    }
    serde_json::from_str(value).map_err(|e| anyhow::anyhow!("Invalid JSON value: {}", e))
}

/// Random peer ID for a new repository config.
pub fn generate_peer_id() -> anyhow::Result<String> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| anyhow::anyhow!("Failed to generate peer ID: {}", e))?;
    Ok(format!("Qm{}", hex::encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_cleans_and_rejects_root() {
        assert_eq!(parse_key("a//b/").unwrap().as_str(), "/a/b");
        assert!(parse_key("/").is_err());
        assert!(parse_key("").is_err());
    }

    #[test]
    fn test_parse_config_value() {
        assert_eq!(
            parse_config_value("10GB", false).unwrap(),
            Value::String("10GB".into())
        );
        assert_eq!(parse_config_value("90", true).unwrap(), serde_json::json!(90));
        assert!(parse_config_value("{nope", true).is_err());
    }

    #[test]
    fn test_peer_ids_are_unique() {
        let a = generate_peer_id().unwrap();
        let b = generate_peer_id().unwrap();
        assert!(a.starts_with("Qm"));
        assert_eq!(a.len(), 34);
        assert_ne!(a, b);
    }
}
