//! attend-store: SQLite persistence for the identity gallery and scan log.

mod codec;
pub mod sqlite;

pub use sqlite::SqliteStore;
