//! Prefix-list reader with transparent gzip support
//!
//! Routing tables and ban lists are often shipped compressed. [`open`]
//! returns a buffered reader over a plain file, a `.gz` file (decompressed on
//! the fly) or stdin (`-`), ready to feed [`crate::IpTable::load_text`].
//!
//! ```rust,no_run
//! use cidrtree::{file_reader, IpTable};
//!
//! let mut table = IpTable::new()?;
//! let loaded = table.load_text(file_reader::open("bogons.txt.gz")?)?;
//! println!("{} prefixes", loaded);
//! # Ok::<(), cidrtree::RadixError>(())
//! ```

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, stdin, BufRead, BufReader};
use std::path::Path;

/// Read buffer size; prefix lists are read once at startup
const BUFFER_SIZE: usize = 64 * 1024;

/// True when `path` names a gzip file by extension
pub fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Open a prefix list, decompressing `.gz` files and mapping `-` to stdin
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();

    if path.to_str() == Some("-") {
        return Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, stdin())));
    }

    let file = File::open(path)?;
    Ok(from_file(file, is_gzip_path(path)))
}

/// Wrap an open file, forcing or skipping gzip decoding
pub fn from_file(file: File, is_gzip: bool) -> Box<dyn BufRead + Send> {
    if is_gzip {
        Box::new(BufReader::with_capacity(BUFFER_SIZE, GzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(BUFFER_SIZE, file))
    }
}
