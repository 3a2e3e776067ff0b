mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cli_utils::LoadOptions;
use commands::{cmd_bench, cmd_inspect, cmd_lookup};

#[derive(Parser)]
#[command(name = "cidrtree")]
#[command(
    about = "Longest-prefix-match lookups over IPv4/IPv6 prefix lists",
    long_about = "cidrtree - Longest-prefix-match radix tree for IP prefixes\n\n\
    Load a prefix list (CIDR + value per line, optionally gzipped) into a \n\
    binary radix tree and resolve addresses to the most specific match.\n\n\
    Examples:\n\
      cidrtree lookup routes.txt 10.1.2.3 2001:db8::1\n\
      cidrtree inspect routes.txt.gz --json\n\
      cidrtree --preallocate off bench --count 1000000"
)]
#[command(version)]
struct Cli {
    /// JSON tree configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Preallocated top levels: auto, off, or a level count
    #[arg(long, global = true, value_name = "LEVELS")]
    preallocate: Option<String>,

    /// Prefix list format: text or csv
    #[arg(long, global = true, default_value = "text")]
    format: String,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve addresses against a prefix list
    Lookup {
        /// Prefix list file, or "-" for stdin
        #[arg(value_name = "PREFIXES")]
        prefixes: PathBuf,

        /// Addresses to resolve
        #[arg(value_name = "ADDR", required = true)]
        addresses: Vec<String>,

        /// Suppress output; only set the exit code
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show tree shape and memory use for a prefix list
    Inspect {
        /// Prefix list file, or "-" for stdin
        #[arg(value_name = "PREFIXES")]
        prefixes: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Benchmark insert, lookup and delete on synthetic prefixes
    Bench {
        /// Number of prefixes to insert
        #[arg(short = 'n', long, default_value = "100000")]
        count: usize,

        /// Number of lookups to run
        #[arg(long, default_value = "1000000")]
        queries: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let options = LoadOptions {
        config: cli.config,
        preallocate: cli.preallocate,
        format: cli.format,
    };

    match cli.command {
        Commands::Lookup {
            prefixes,
            addresses,
            quiet,
        } => cmd_lookup(&options, prefixes, addresses, quiet),
        Commands::Inspect { prefixes, json } => cmd_inspect(&options, prefixes, json),
        Commands::Bench { count, queries } => cmd_bench(&options, count, queries),
    }
}
