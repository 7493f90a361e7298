pub mod aggregate;
pub mod item;
pub mod record;
pub mod table;

pub use aggregate::{add_or_merge, sync, Contribution, MergeOutcome};
pub use item::{Item, ItemKind, SourceExtent};
pub use record::ExecutionRecord;
pub use table::BoundedTable;

/// Per-session store of execution records keyed by execution id.
pub type HistoryTable = BoundedTable<i64, ExecutionRecord>;
