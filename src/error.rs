/// Error types for the cidrtree library
use std::fmt;

/// Result type alias for radix tree operations
pub type Result<T> = std::result::Result<T, RadixError>;

/// Numeric code for a successful operation
pub const RADIX_OK: i32 = 0;
/// Numeric code for a failed operation (not found, out of memory, bad input)
pub const RADIX_ERROR: i32 = -1;
/// Numeric code for an insert that hit an occupied prefix
pub const RADIX_BUSY: i32 = -3;

/// Main error type for radix tree operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadixError {
    /// The allocator could not supply another slab
    OutOfMemory,

    /// The exact prefix already holds a value
    Busy,

    /// The exact prefix holds no node or no value
    NotFound,

    /// Address or prefix length could not be parsed or is out of range
    InvalidPrefix(String),

    /// Tree configuration is unusable
    Config(String),

    /// I/O errors
    Io(String),
}

impl RadixError {
    /// Map this error onto the three-valued status the C ABI reports
    pub fn status(&self) -> Status {
        match self {
            RadixError::Busy => Status::Busy,
            _ => Status::Error,
        }
    }
}

impl fmt::Display for RadixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadixError::OutOfMemory => write!(f, "Out of memory: allocator refused a node slab"),
            RadixError::Busy => write!(f, "Prefix already holds a value"),
            RadixError::NotFound => write!(f, "Prefix not found"),
            RadixError::InvalidPrefix(msg) => write!(f, "Invalid prefix: {}", msg),
            RadixError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RadixError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for RadixError {}

impl From<std::io::Error> for RadixError {
    fn from(err: std::io::Error) -> Self {
        RadixError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RadixError {
    fn from(err: serde_json::Error) -> Self {
        RadixError::Config(err.to_string())
    }
}

/// Three-valued outcome of an insert or delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The structural change completed
    Ok,
    /// Not found, out of memory, or malformed input
    Error,
    /// A real value already occupies the exact prefix
    Busy,
}

impl Status {
    /// Numeric return code (`RADIX_OK`, `RADIX_ERROR`, `RADIX_BUSY`)
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => RADIX_OK,
            Status::Error => RADIX_ERROR,
            Status::Busy => RADIX_BUSY,
        }
    }
}

impl<T> From<&Result<T>> for Status {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(e) => e.status(),
        }
    }
}
