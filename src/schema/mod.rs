pub mod definition;
pub mod row;

pub use definition::{FieldDefinition, IndexDefinition, MemoDefinition, TableDefinition};
pub use row::Row;
