use anyhow::Result;
use cidrtree::TreeStats;
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{format_bytes, format_number, LoadOptions};

pub fn cmd_inspect(options: &LoadOptions, prefixes: PathBuf, json_output: bool) -> Result<()> {
    let (table, loaded) = options.load_table(&prefixes)?;
    let stats = table.stats();
    let v4_calls = table.v4().allocator().calls();
    let v6_calls = table.v6().allocator().calls();

    if json_output {
        let output = json!({
            "file": prefixes.display().to_string(),
            "lines_loaded": loaded,
            "records": stats.records,
            "v4": stats.v4,
            "v6": stats.v6,
            "allocator_calls": { "v4": v4_calls, "v6": v6_calls },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Prefix list: {}", prefixes.display());
    println!("Loaded:      {} line(s)", format_number(loaded));
    println!("Records:     {}", format_number(stats.records));
    println!();
    print_tree("IPv4 tree", &stats.v4, v4_calls);
    println!();
    print_tree("IPv6 tree", &stats.v6, v6_calls);

    Ok(())
}

fn print_tree(title: &str, stats: &TreeStats, allocator_calls: usize) {
    println!("{}:", title);
    println!("  Values:          {}", format_number(stats.valued_nodes));
    println!("  Reachable nodes: {}", format_number(stats.reachable_nodes));
    println!("  Free-list nodes: {}", format_number(stats.free_nodes));
    println!(
        "  Slabs:           {} x {}",
        format_number(stats.slabs),
        format_bytes(stats.page_size)
    );
    println!("  Allocator calls: {}", format_number(allocator_calls));
}
