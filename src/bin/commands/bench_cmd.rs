use anyhow::{bail, Context, Result};
use cidrtree::{CountingAllocator, RadixError, RadixKey, RadixTree};
use std::hint::black_box;
use std::time::Instant;

use crate::cli_utils::{format_bytes, format_number, format_qps, LoadOptions};

/// Deterministic spread of 32-bit keys (Knuth multiplicative hash)
fn scatter(i: usize) -> u32 {
    (i as u32).wrapping_mul(2_654_435_761)
}

/// Prefix lengths cycle through the common routing-table range /16../32
fn prefix_len(i: usize) -> u32 {
    16 + (i % 17) as u32
}

pub fn cmd_bench(options: &LoadOptions, count: usize, query_count: usize) -> Result<()> {
    let config = options.tree_config()?;
    let mut tree: RadixTree<u32, CountingAllocator> =
        RadixTree::with_config(CountingAllocator::new(), &config)
            .context("Failed to create radix tree")?;

    println!("--- Phase 1: Insert {} IPv4 prefixes ---", format_number(count));
    let start = Instant::now();
    let mut inserted = 0;
    for i in 0..count {
        let len = prefix_len(i);
        let mask = u32::prefix_mask(len);
        match tree.insert(scatter(i) & mask, mask, i) {
            Ok(()) => inserted += 1,
            Err(RadixError::Busy) => {}
            Err(e) => return Err(e).context("Insert failed"),
        }
    }
    let elapsed = start.elapsed();
    let stats = tree.stats();
    println!("  Inserted:    {} (duplicates skipped)", format_number(inserted));
    println!("  Time:        {:.3}s", elapsed.as_secs_f64());
    println!(
        "  Rate:        {} inserts/sec",
        format_qps(count as f64 / elapsed.as_secs_f64())
    );
    println!("  Nodes:       {}", format_number(stats.reachable_nodes));
    println!(
        "  Memory:      {} in {} slab(s)",
        format_bytes(stats.slabs * stats.page_size),
        format_number(stats.slabs)
    );
    println!();

    println!("--- Phase 2: {} lookups ---", format_number(query_count));
    let start = Instant::now();
    let mut hits = 0usize;
    for i in 0..query_count {
        if black_box(tree.find(scatter(i ^ 0x5bd1_e995))).is_some() {
            hits += 1;
        }
    }
    let elapsed = start.elapsed();
    println!("  Hits:        {}", format_number(hits));
    println!("  Time:        {:.3}s", elapsed.as_secs_f64());
    println!(
        "  Rate:        {} lookups/sec",
        format_qps(query_count as f64 / elapsed.as_secs_f64())
    );
    println!();

    println!("--- Phase 3: Delete and re-insert ---");
    let start = Instant::now();
    let mut deleted_count = 0;
    for i in 0..count {
        let mask = u32::prefix_mask(prefix_len(i));
        match tree.delete(scatter(i) & mask, mask) {
            Ok(()) => deleted_count += 1,
            // Prefixes that collided in phase 1 are already gone
            Err(RadixError::NotFound) => {}
            Err(e) => return Err(e).context("Delete failed"),
        }
    }
    let deleted = tree.stats();
    let calls_before = tree.allocator().calls();
    let mut refilled = 0;
    let mut refill_failures = 0;
    for i in 0..count {
        let mask = u32::prefix_mask(prefix_len(i));
        match tree.insert(scatter(i) & mask, mask, i) {
            Ok(()) => refilled += 1,
            Err(RadixError::Busy) => {}
            Err(_) => refill_failures += 1,
        }
    }
    let elapsed = start.elapsed();
    println!("  Deleted:             {}", format_number(deleted_count));
    println!("  Nodes after delete:  {}", format_number(deleted.reachable_nodes));
    println!("  Free-list length:    {}", format_number(deleted.free_nodes));
    println!("  Re-inserted:         {}", format_number(refilled));
    println!("  Refill failures:     {}", format_number(refill_failures));
    println!(
        "  New slabs on refill: {}",
        format_number(tree.allocator().calls() - calls_before)
    );
    println!("  Time:                {:.3}s", elapsed.as_secs_f64());

    if refill_failures > 0 || refilled != inserted {
        bail!(
            "refill stored {} of {} prefixes ({} failure(s))",
            refilled,
            inserted,
            refill_failures
        );
    }

    Ok(())
}
