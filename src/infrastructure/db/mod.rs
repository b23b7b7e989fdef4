pub mod connection;
pub mod sqlite;

pub use sqlite::SqliteDestination;
