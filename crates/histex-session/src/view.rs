use chrono::{DateTime, Utc};
use histex_store::item::{EXTENDED_HISTORY_ENTRY_TYPE, HISTORY_ENTRY_TYPE};
use histex_store::{ExecutionRecord, Item, ItemKind, SourceExtent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    NotStarted,
    Running,
    Stopping,
    Stopped,
    Completed,
    Failed,
}

/// One entry of the host transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: i64,
    pub command_line: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl TranscriptEntry {
    pub fn new(
        id: i64,
        command_line: impl Into<String>,
        status: ExecutionStatus,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            command_line: command_line.into(),
            status,
            started_at,
            ended_at: None,
        }
    }

    pub fn ended(mut self, ended_at: DateTime<Utc>) -> Self {
        self.ended_at = Some(ended_at);
        self
    }
}

/// A transcript entry joined with the execution record captured for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryView {
    pub id: i64,
    pub command_line: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    pub success: bool,
    pub output: Vec<Item>,
    /// Absent when the command produced nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_count: Option<usize>,
    /// Index-aligned with `output`; `None` where an item has no known source.
    pub output_sources: Vec<Option<SourceExtent>>,
    pub output_source_count: usize,
    pub errors: Vec<Item>,
    pub error_count: usize,
}

impl HistoryView {
    pub fn extend(entry: &TranscriptEntry, record: Option<&ExecutionRecord>) -> Self {
        let duration_ms = entry
            .ended_at
            .map(|ended| (ended - entry.started_at).num_milliseconds());

        let success = match (entry.status, record) {
            (ExecutionStatus::Failed, _) => false,
            (_, Some(record)) => record.succeeded.unwrap_or(false),
            (status, None) => status == ExecutionStatus::Completed,
        };

        let (output, output_count, output_sources, errors) = match record {
            Some(record) => (
                record.output.clone(),
                Some(record.output_count).filter(|count| *count > 0),
                record.output_sources.clone(),
                record.errors.clone(),
            ),
            None => (Vec::new(), None, Vec::new(), Vec::new()),
        };

        Self {
            id: entry.id,
            command_line: entry.command_line.clone(),
            status: entry.status,
            started_at: entry.started_at,
            ended_at: entry.ended_at,
            duration_ms,
            success,
            output_count,
            output_source_count: output_sources.iter().flatten().count(),
            error_count: errors.len(),
            output,
            output_sources,
            errors,
        }
    }

    /// Wrap the view as a pipeline object carrying the extended entry type.
    pub fn to_item(&self) -> Item {
        let value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        Item::new(
            ItemKind::HistoryEntry,
            vec![
                EXTENDED_HISTORY_ENTRY_TYPE.to_string(),
                HISTORY_ENTRY_TYPE.to_string(),
            ],
            value,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(succeeded: Option<bool>, outputs: usize) -> ExecutionRecord {
        let mut record = ExecutionRecord::new(3);
        record.succeeded = succeeded;
        record.output = (0..outputs).map(|i| Item::object("Sample", json!(i))).collect();
        record.output_count = outputs;
        record
    }

    #[test]
    fn test_duration_only_when_ended() {
        let entry = TranscriptEntry::new(3, "Get-Date", ExecutionStatus::Running, at(0));
        assert_eq!(HistoryView::extend(&entry, None).duration_ms, None);
        let entry = entry.ended(at(0) + Duration::milliseconds(1500));
        assert_eq!(HistoryView::extend(&entry, None).duration_ms, Some(1500));
    }

    #[test]
    fn test_failed_status_wins() {
        let entry = TranscriptEntry::new(3, "gci", ExecutionStatus::Failed, at(0));
        assert!(!HistoryView::extend(&entry, Some(&record(Some(true), 1))).success);
    }

    #[test]
    fn test_success_from_record() {
        let entry = TranscriptEntry::new(3, "gci", ExecutionStatus::Completed, at(0));
        assert!(HistoryView::extend(&entry, Some(&record(Some(true), 1))).success);
        assert!(!HistoryView::extend(&entry, Some(&record(Some(false), 1))).success);
        assert!(
            !HistoryView::extend(&entry, Some(&record(None, 1))).success,
            "unknown outcome reads as failure"
        );
    }

    #[test]
    fn test_success_without_record_follows_status() {
        let done = TranscriptEntry::new(3, "gci", ExecutionStatus::Completed, at(0));
        let stopped = TranscriptEntry::new(4, "gci", ExecutionStatus::Stopped, at(0));
        assert!(HistoryView::extend(&done, None).success);
        assert!(!HistoryView::extend(&stopped, None).success);
    }

    #[test]
    fn test_counts_and_serialized_shape() {
        let entry = TranscriptEntry::new(3, "gci", ExecutionStatus::Completed, at(0));
        let empty = HistoryView::extend(&entry, Some(&record(Some(true), 0)));
        assert_eq!(empty.output_count, None);
        let value = serde_json::to_value(&empty).unwrap();
        assert!(value.get("output_count").is_none());
        assert!(value.get("duration_ms").is_none());

        let full = HistoryView::extend(&entry, Some(&record(Some(true), 2)));
        assert_eq!(full.output_count, Some(2));
        assert_eq!(full.error_count, 0);
        let item = full.to_item();
        assert!(item.is_history_entry());
        assert_eq!(item.type_names[0], EXTENDED_HISTORY_ENTRY_TYPE);
        assert_eq!(item.value["command_line"], json!("gci"));
        assert_eq!(item.value["status"], json!("completed"));
    }

    #[test]
    fn test_source_count_skips_unknown_sources() {
        let entry = TranscriptEntry::new(3, "gci", ExecutionStatus::Completed, at(0));
        let mut rec = record(Some(true), 2);
        rec.output_sources = vec![None, Some(SourceExtent::new(1, 1, "gci"))];
        let view = HistoryView::extend(&entry, Some(&rec));
        assert_eq!(view.output_sources.len(), view.output.len());
        assert_eq!(view.output_source_count, 1);
    }
}
