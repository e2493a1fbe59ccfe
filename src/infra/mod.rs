pub mod log_sink;
pub mod sheet;
pub mod sqlite;
