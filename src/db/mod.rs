pub mod redis;
pub mod sqlite;
