use thiserror::Error;

#[derive(Error, Debug)]
pub enum TpsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a TopSpeed file: {reason}")]
    NotATpsFile { reason: String },

    #[error("Malformed data at offset {offset:#x}: {reason}")]
    Malformed { offset: u64, reason: String },

    #[error("Read of {wanted} bytes at {position:#x} crosses region of {length:#x} bytes")]
    OutOfRange {
        position: usize,
        wanted: usize,
        length: usize,
    },

    #[error("Unsupported field type {code:#04x} in field '{field}'")]
    Unsupported { code: u8, field: String },

    #[error("Incomplete multi-part set for table {table}: missing part {missing}")]
    Incomplete { table: u32, missing: usize },

    #[error("Key recovery cancelled at index {index}")]
    Cancelled { index: usize },
}

impl TpsError {
    pub fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        TpsError::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TpsError>;
