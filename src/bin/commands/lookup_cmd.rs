use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::LoadOptions;

pub fn cmd_lookup(
    options: &LoadOptions,
    prefixes: PathBuf,
    addresses: Vec<String>,
    quiet: bool,
) -> Result<()> {
    let (table, _) = options.load_table(&prefixes)?;

    let mut found = false;
    let mut results = Vec::with_capacity(addresses.len());

    for address in &addresses {
        // Bad addresses are reported per entry rather than aborting the batch
        let entry = match table.lookup_str(address) {
            Ok(value) => {
                found |= value.is_some();
                json!({ "address": address, "value": value })
            }
            Err(e) => json!({ "address": address, "value": null, "error": e.to_string() }),
        };
        results.push(entry);
    }

    if !quiet {
        println!("{}", serde_json::to_string_pretty(&json!(results))?);
    }

    // Exit code mirrors grep: 0 = at least one match, 1 = none
    std::process::exit(if found { 0 } else { 1 });
}
