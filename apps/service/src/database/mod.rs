/// Snapshot persistence for the registry
///
/// The registry lives in memory; this layer writes it to disk and reads it
/// back through the `Database` trait so other backends can slot in.
pub mod records;
pub mod repository;

pub use records::{PERSISTED_HISTORY_LIMIT, prepare_for_save, sanitize_records};
pub use repository::{Database, JsonFileDatabase};
