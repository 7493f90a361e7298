use crate::item::{Item, SourceExtent};
use crate::record::ExecutionRecord;
use crate::HistoryTable;
use std::collections::HashSet;

/// Output and errors one underlying invocation contributes to an execution id.
#[derive(Debug, Clone, Default)]
pub struct Contribution {
    pub succeeded: Option<bool>,
    pub output: Vec<Item>,
    pub output_count: usize,
    /// One slot per output item; shorter vectors are padded with `None` on merge.
    pub output_sources: Vec<Option<SourceExtent>>,
    pub errors: Vec<Item>,
}

impl Contribution {
    pub fn with_outcome(succeeded: Option<bool>) -> Self {
        Self {
            succeeded,
            ..Default::default()
        }
    }

    pub fn push_output(&mut self, item: Item, source: Option<SourceExtent>) {
        self.output_sources.resize(self.output.len(), None);
        self.output.push(item);
        self.output_sources.push(source);
        self.output_count += 1;
    }

    pub fn push_error(&mut self, error: Item) {
        self.errors.push(error);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A fresh record was created; `evicted` names the id pushed out to make room.
    Inserted { evicted: Option<i64> },
    Merged,
    /// The table has no capacity.
    Rejected,
}

/// Persist `contribution` under `id`: insert a fresh, capped record when `id`
/// is new, otherwise merge into the existing record in place. A merge never
/// moves the record in eviction order.
pub fn add_or_merge(
    table: &mut HistoryTable,
    id: i64,
    contribution: Contribution,
    item_cap: usize,
) -> MergeOutcome {
    if let Some(record) = table.get_mut(&id) {
        record.merge(contribution, item_cap);
        tracing::debug!("merged contribution into execution {}", id);
        return MergeOutcome::Merged;
    }

    let mut record = ExecutionRecord::new(id);
    record.merge(contribution, item_cap);
    match table.put(id, record) {
        Some((evicted_id, _)) if evicted_id == id => MergeOutcome::Rejected,
        Some((evicted_id, _)) => {
            tracing::debug!("execution {} evicted to admit {}", evicted_id, id);
            MergeOutcome::Inserted {
                evicted: Some(evicted_id),
            }
        }
        None => MergeOutcome::Inserted { evicted: None },
    }
}

/// Drop every record whose id the transcript no longer retains. An empty
/// `retained` set clears the table. Returns the number of records removed.
pub fn sync(table: &mut HistoryTable, retained: &[i64]) -> usize {
    if retained.is_empty() {
        let removed = table.len();
        table.clear();
        return removed;
    }
    let keep: HashSet<i64> = retained.iter().copied().collect();
    table.retain(|id, _| keep.contains(id))
}
