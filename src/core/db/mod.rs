/// Database Module
///
/// The database layer is split by concern:
/// - **Connection seam** (`connection.rs`): credentials and the
///   driver/connection/transaction traits every backend implements
/// - **Drivers** (`postgres.rs`, `sqlite.rs`): the shipped backends
/// - **Query plumbing** (`query.rs`): dynamic values, named-placeholder
///   binding, and result normalization
/// - **Schema statements** (`schema.rs`): DDL builders for index and
///   constraint creation
pub mod connection;
pub mod postgres;
pub mod query;
pub mod schema;
pub mod sqlite;

pub use connection::*;
pub use query::*;
