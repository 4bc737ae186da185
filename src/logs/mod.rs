pub mod filter;
pub mod parse;
pub mod reader;
pub mod stats;

pub use filter::select_page;
pub use parse::{decode_all, Decoded, RawEntry};
pub use reader::LogReader;
