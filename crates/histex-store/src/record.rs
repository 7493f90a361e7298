use crate::aggregate::Contribution;
use crate::item::{Item, SourceExtent};
use serde::{Deserialize, Serialize};

/// Captured metadata for one execution id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: i64,
    /// `None` until some contribution reports an outcome.
    pub succeeded: Option<bool>,
    #[serde(default)]
    pub output: Vec<Item>,
    /// Logical output items contributed, including those dropped by the item cap.
    pub output_count: usize,
    /// Index-aligned with `output`; `None` where the item had no known source.
    #[serde(default)]
    pub output_sources: Vec<Option<SourceExtent>>,
    #[serde(default)]
    pub errors: Vec<Item>,
}

impl ExecutionRecord {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            succeeded: None,
            output: Vec::new(),
            output_count: 0,
            output_sources: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Fold one more contribution into this record. Each sequence stays within
    /// `item_cap`; the overflow is dropped but still counted in `output_count`.
    /// Output and sources are kept the same length.
    pub fn merge(&mut self, contribution: Contribution, item_cap: usize) {
        if self.succeeded.is_none() {
            self.succeeded = contribution.succeeded;
        }
        let mut sources = contribution.output_sources;
        sources.resize(contribution.output.len(), None);
        self.output_sources.resize(self.output.len(), None);
        extend_capped(&mut self.output, contribution.output, item_cap);
        extend_capped(&mut self.output_sources, sources, item_cap);
        extend_capped(&mut self.errors, contribution.errors, item_cap);
        self.output_count = self.output_count.saturating_add(contribution.output_count);
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Output items that were contributed but not retained.
    pub fn dropped_output(&self) -> usize {
        self.output_count.saturating_sub(self.output.len())
    }
}

fn extend_capped<T>(dst: &mut Vec<T>, src: Vec<T>, cap: usize) {
    let room = cap.saturating_sub(dst.len());
    dst.extend(src.into_iter().take(room));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(n: usize) -> Vec<Item> {
        (0..n).map(|i| Item::object("Sample", json!(i))).collect()
    }

    #[test]
    fn test_merge_into_empty_caps_each_field() {
        let mut record = ExecutionRecord::new(7);
        let sources = (0..5).map(|i| Some(SourceExtent::new(1, i, "gci"))).collect();
        record.merge(
            Contribution {
                succeeded: Some(true),
                output: items(5),
                output_count: 5,
                output_sources: sources,
                errors: items(1),
            },
            3,
        );
        assert_eq!(record.output.len(), 3);
        assert_eq!(record.output_sources.len(), 3);
        assert_eq!(record.errors.len(), 1);
        assert_eq!(record.output_count, 5);
        assert_eq!(record.dropped_output(), 2);
    }

    #[test]
    fn test_succeeded_is_sticky() {
        let mut record = ExecutionRecord::new(1);
        record.merge(Contribution::default(), 10);
        assert_eq!(record.succeeded, None);
        record.merge(Contribution::with_outcome(Some(false)), 10);
        assert_eq!(record.succeeded, Some(false));
        record.merge(Contribution::with_outcome(Some(true)), 10);
        assert_eq!(record.succeeded, Some(false), "first outcome wins");
        record.merge(Contribution::default(), 10);
        assert_eq!(record.succeeded, Some(false), "absent never erases");
    }

    #[test]
    fn test_record_serializes_with_snake_case_kinds() {
        let mut record = ExecutionRecord::new(3);
        let mut contribution = Contribution::with_outcome(Some(true));
        contribution.push_output(Item::warning("careful"), None);
        record.merge(contribution, 10);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["output"][0]["kind"], "warning");
        assert_eq!(json["output_count"], 1);
        let back: ExecutionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_sources_stay_aligned_when_some_are_missing() {
        let mut record = ExecutionRecord::new(2);
        let mut first = Contribution::with_outcome(Some(true));
        first.push_output(items(1).remove(0), None);
        first.push_output(items(2).remove(1), Some(SourceExtent::new(3, 1, "b-src")));
        record.merge(first, 10);
        assert_eq!(record.output.len(), 2);
        assert_eq!(record.output_sources.len(), 2);
        assert_eq!(record.output_sources[0], None);
        assert_eq!(
            record.output_sources[1].as_ref().map(|s| s.text.as_str()),
            Some("b-src")
        );

        // A contribution built without any sources still pads.
        record.merge(
            Contribution {
                succeeded: None,
                output: items(2),
                output_count: 2,
                output_sources: Vec::new(),
                errors: Vec::new(),
            },
            10,
        );
        let mut tail = Contribution::default();
        tail.push_output(items(1).remove(0), Some(SourceExtent::new(9, 1, "tail")));
        record.merge(tail, 10);
        assert_eq!(record.output.len(), 5);
        assert_eq!(record.output_sources.len(), 5);
        assert_eq!(
            record.output_sources[4].as_ref().map(|s| s.text.as_str()),
            Some("tail")
        );
    }

    #[test]
    fn test_sources_capped_with_output() {
        let mut record = ExecutionRecord::new(4);
        let mut contribution = Contribution::default();
        for i in 0..4 {
            let source = (i % 2 == 1).then(|| SourceExtent::new(1, i, "gci"));
            contribution.push_output(Item::object("Sample", json!(i)), source);
        }
        record.merge(contribution, 3);
        assert_eq!(record.output.len(), 3);
        assert_eq!(record.output_sources.len(), 3);
        assert_eq!(record.output_sources[2], None);
    }
}
