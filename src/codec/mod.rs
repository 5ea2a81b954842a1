pub mod cursor;
pub mod encoding;
pub mod rle;

pub use cursor::ByteCursor;
pub use encoding::TpsEncoding;
