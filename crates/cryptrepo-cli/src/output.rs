//! Output formatting helpers for the CLI.

use std::io::{self, IsTerminal};

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use serde_json::{Map, Value};

use cryptrepo_core::config::PRIV_KEY_SELECTOR;
use cryptrepo_core::QueryEntry;

/// Whether to draw tables rather than plain lines.
pub fn pretty(quiet: bool) -> bool {
    !quiet && io::stdout().is_terminal()
}

/// Render rows as a bordered table, or as space-separated lines with no
/// header when `pretty` is off.
pub fn table(pretty: bool, headers: &[&str], rows: &[Vec<String>]) -> String {
    if !pretty {
        return rows
            .iter()
            .map(|row| row.join(" "))
            .collect::<Vec<_>>()
            .join("\n");
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.to_vec());
    for row in rows {
        table.add_row(row);
    }
    table.to_string()
}

/// `KEY SIZE` rows for a listing.
pub fn entry_rows(entries: &[QueryEntry]) -> Vec<Vec<String>> {
    entries
        .iter()
        .map(|entry| vec![entry.key.to_string(), entry.size.to_string()])
        .collect()
}

pub fn entries_json(entries: &[QueryEntry]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|entry| serde_json::json!({ "key": entry.key.as_str(), "size": entry.size }))
            .collect(),
    )
}

/// Render a JSON value the way `config get` prints it: strings bare,
/// everything else as JSON.
pub fn config_value(value: &Value) -> anyhow::Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(serde_json::to_string_pretty(other)?),
    }
}

/// Replace the identity private key with a placeholder.
pub fn redact_config(map: &mut Map<String, Value>) {
    let mut parts = PRIV_KEY_SELECTOR.split('.');
    let (Some(section), Some(field)) = (parts.next(), parts.next()) else {
        return;
    };
    if let Some(Value::Object(identity)) = map.get_mut(section) {
        if let Some(value) = identity.get_mut(field) {
            *value = Value::String("[REDACTED]".to_string());
        }
    }
}
