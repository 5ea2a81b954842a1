//! Reader for Clarion TopSpeed (`.tps`) database files.
//!
//! The format is page oriented: a fixed 512-byte header points at block
//! areas, blocks hold self-addressed pages, pages hold prefix-compressed
//! records. Files protected with an owner password are encrypted with a
//! 64-byte block cipher; [`crypto::Key`] implements it and [`recovery`]
//! reconstructs the key from ciphertext alone.
//!
//! ```no_run
//! use topspeed::codec::TpsEncoding;
//! use topspeed::tps::TpsFile;
//!
//! # fn main() -> topspeed::types::error::Result<()> {
//! let file = TpsFile::open("contacts.tps")?;
//! for (table, definition) in file.table_definitions(TpsEncoding::Latin1, true)? {
//!     for row in file.rows(table, &definition, TpsEncoding::Latin1, true)? {
//!         println!("{:?}", row.values);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod crypto;
pub mod recovery;
pub mod schema;
pub mod tps;
pub mod types;

pub use crypto::Key;
pub use schema::{Row, TableDefinition};
pub use tps::{FileEvent, TpsFile};
pub use types::error::{Result, TpsError};
pub use types::value::Value;
