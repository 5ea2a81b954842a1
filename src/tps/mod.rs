pub mod block;
pub mod file;
pub mod header;
pub mod page;
pub mod record;

pub use block::TpsBlock;
pub use file::{FileEvent, TpsFile};
pub use header::TpsHeader;
pub use page::TpsPage;
pub use record::{RecordHeader, TpsRecord};
