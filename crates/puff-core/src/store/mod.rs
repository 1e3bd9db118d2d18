// # Status Store
//
// The in-memory domain status map, its record type, and the JSON snapshot
// export used by out-of-process readers.

pub mod export;
pub mod memory;
pub mod status;

pub use export::{SnapshotFile, read_snapshot, write_snapshot};
pub use memory::{StatusStore, SyncSummary};
pub use status::DomainStatus;
