use anyhow::{bail, Context, Result};
use cidrtree::{file_reader, CountingAllocator, IpTable, Preallocate, TreeConfig};
use std::path::{Path, PathBuf};

/// Table type the CLI builds; counting lets `inspect` report slab requests
pub type CliTable = IpTable<CountingAllocator>;

/// Prefix list layouts accepted by the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    /// `<cidr> <value>` per line
    Text,
    /// CSV with `prefix` and `value` columns
    Csv,
}

impl ListFormat {
    pub fn parse(format: &str) -> Result<Self> {
        match format.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ListFormat::Text),
            "csv" => Ok(ListFormat::Csv),
            other => bail!("Unknown prefix list format '{}' (expected text or csv)", other),
        }
    }
}

/// Global options shared by every subcommand
pub struct LoadOptions {
    pub config: Option<PathBuf>,
    pub preallocate: Option<String>,
    pub format: String,
}

impl LoadOptions {
    /// Resolve the tree config: file first, then command-line overrides
    pub fn tree_config(&self) -> Result<TreeConfig> {
        let mut config = match &self.config {
            Some(path) => TreeConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => TreeConfig::default(),
        };

        if let Some(preallocate) = &self.preallocate {
            config.preallocate = preallocate
                .parse::<Preallocate>()
                .context("Invalid --preallocate")?;
        }

        Ok(config)
    }

    /// Build a table from a prefix list file (or `-` for stdin)
    pub fn load_table(&self, path: &Path) -> Result<(CliTable, usize)> {
        let config = self.tree_config()?;
        let format = ListFormat::parse(&self.format)?;
        let mut table = IpTable::with_config(CountingAllocator::new(), &config)
            .context("Failed to create radix tree")?;

        let reader = file_reader::open(path)
            .with_context(|| format!("Failed to open prefix list: {}", path.display()))?;

        let loaded = match format {
            ListFormat::Text => table
                .load_text(reader)
                .with_context(|| format!("Failed to load prefix list: {}", path.display()))?,
            ListFormat::Csv => load_csv(&mut table, reader)
                .with_context(|| format!("Failed to load CSV prefix list: {}", path.display()))?,
        };

        log::info!("loaded {} record(s) from {}", loaded, path.display());
        Ok((table, loaded))
    }
}

/// Load `prefix,value` rows; the header names the columns
fn load_csv<R: std::io::Read>(table: &mut CliTable, reader: R) -> Result<usize> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let column = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    };
    let Some(prefix_col) = column(&["prefix", "cidr", "network"]) else {
        bail!("CSV header needs a 'prefix' column, found: {:?}", headers);
    };
    let Some(value_col) = column(&["value"]) else {
        bail!("CSV header needs a 'value' column, found: {:?}", headers);
    };

    let mut loaded = 0;
    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        let line = row + 2;
        let prefix = record
            .get(prefix_col)
            .with_context(|| format!("line {}: missing prefix", line))?;
        let value = record
            .get(value_col)
            .with_context(|| format!("line {}: missing value", line))?;
        let value: usize = value
            .parse()
            .with_context(|| format!("line {}: bad value '{}'", line, value))?;

        table
            .add_record(prefix, value)
            .with_context(|| format!("line {}: cannot add '{}'", line, prefix))?;
        loaded += 1;
    }

    Ok(loaded)
}

pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

pub fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

pub fn format_qps(qps: f64) -> String {
    if qps >= 1_000_000.0 {
        format!("{:.2}M", qps / 1_000_000.0)
    } else if qps >= 1_000.0 {
        format!("{:.2}K", qps / 1_000.0)
    } else {
        format!("{:.2}", qps)
    }
}
