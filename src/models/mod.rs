pub mod connection;
pub mod log_entry;

pub use connection::*;
pub use log_entry::*;
