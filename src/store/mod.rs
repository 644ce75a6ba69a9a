//! Persistence layer — SQLite-backed announcement ledger.

pub mod libsql_backend;
pub mod traits;

pub use libsql_backend::LibSqlLedger;
pub use traits::Ledger;
