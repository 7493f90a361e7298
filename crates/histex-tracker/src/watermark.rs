use histex_store::Item;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Parser ran out of input; the shell is waiting for a continuation line.
    IncompleteInput,
    /// The user or a preference variable stopped the pipeline.
    StopRequested,
    Runtime,
    Other(String),
}

/// One entry of the session's error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub fingerprint: u64,
    pub category: ErrorCategory,
    pub record: Item,
}

impl ErrorEntry {
    pub fn with_fingerprint(fingerprint: u64, category: ErrorCategory, record: Item) -> Self {
        Self {
            fingerprint,
            category,
            record,
        }
    }

    /// Build an entry fingerprinted from its position in the log and its
    /// content. `occurrence` must be unique within the session's log (a
    /// running count of logged errors), so that repeats of the same error
    /// stay distinct.
    pub fn new(occurrence: u64, category: ErrorCategory, record: Item) -> Self {
        let fingerprint = occurrence_fingerprint(occurrence, &category, &record);
        Self::with_fingerprint(fingerprint, category, record)
    }
}

fn occurrence_fingerprint(occurrence: u64, category: &ErrorCategory, record: &Item) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(occurrence.to_be_bytes());
    hasher.update(serde_json::to_vec(category).unwrap_or_default());
    hasher.update(serde_json::to_vec(record).unwrap_or_default());
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Incomplete-input and stop-request entries are not command failures.
pub fn is_noise(entry: &ErrorEntry) -> bool {
    matches!(
        entry.category,
        ErrorCategory::IncompleteInput | ErrorCategory::StopRequested
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorSlice {
    /// New entries, oldest first.
    pub errors: Vec<ErrorEntry>,
    pub watermark: Option<u64>,
}

/// Collect the error-log entries logged after `watermark`.
///
/// `log` is in chronological order (oldest first). The walk runs newest to
/// oldest, stops at the entry whose fingerprint equals `watermark`, and skips
/// entries `noise` accepts. When anything was collected the new watermark is
/// the fingerprint of the newest collected entry; otherwise it is unchanged.
pub fn slice_new_errors<F>(log: &[ErrorEntry], watermark: Option<u64>, noise: F) -> ErrorSlice
where
    F: Fn(&ErrorEntry) -> bool,
{
    let mut collected = Vec::new();
    for entry in log.iter().rev() {
        if watermark == Some(entry.fingerprint) {
            break;
        }
        if noise(entry) {
            continue;
        }
        collected.push(entry.clone());
    }

    let watermark = collected
        .first()
        .map(|newest| newest.fingerprint)
        .or(watermark);
    collected.reverse();
    ErrorSlice {
        errors: collected,
        watermark,
    }
}

/// Fingerprint of the newest entry, used to seed a session's watermark so
/// errors logged before tracking began are never attributed.
pub fn newest_fingerprint(log: &[ErrorEntry]) -> Option<u64> {
    log.last().map(|entry| entry.fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fp: u64, category: ErrorCategory) -> ErrorEntry {
        ErrorEntry::with_fingerprint(fp, category, Item::error("Sample", format!("e{}", fp)))
    }

    fn runtime(fp: u64) -> ErrorEntry {
        entry(fp, ErrorCategory::Runtime)
    }

    fn fingerprints(slice: &ErrorSlice) -> Vec<u64> {
        slice.errors.iter().map(|e| e.fingerprint).collect()
    }

    #[test]
    fn test_unset_watermark_collects_everything() {
        let log = vec![runtime(1), runtime(2), runtime(3)];
        let slice = slice_new_errors(&log, None, is_noise);
        assert_eq!(fingerprints(&slice), vec![1, 2, 3]);
        assert_eq!(slice.watermark, Some(3));
    }

    #[test]
    fn test_stops_at_watermark() {
        let log = vec![runtime(1), runtime(2), runtime(3), runtime(4)];
        let slice = slice_new_errors(&log, Some(2), is_noise);
        assert_eq!(fingerprints(&slice), vec![3, 4]);
        assert_eq!(slice.watermark, Some(4));
    }

    #[test]
    fn test_noise_skipped_without_stopping() {
        let log = vec![
            runtime(1),
            runtime(2),
            entry(3, ErrorCategory::IncompleteInput),
            runtime(4),
            entry(5, ErrorCategory::StopRequested),
        ];
        let slice = slice_new_errors(&log, Some(1), is_noise);
        assert_eq!(fingerprints(&slice), vec![2, 4]);
        assert_eq!(slice.watermark, Some(4), "watermark is the newest collected entry");
    }

    #[test]
    fn test_repeat_call_is_empty() {
        let log = vec![runtime(1), runtime(2)];
        let first = slice_new_errors(&log, None, is_noise);
        let second = slice_new_errors(&log, first.watermark, is_noise);
        assert!(second.errors.is_empty());
        assert_eq!(second.watermark, first.watermark);
        let third = slice_new_errors(&log, second.watermark, is_noise);
        assert!(third.errors.is_empty());
    }

    #[test]
    fn test_only_noise_leaves_watermark_unchanged() {
        let log = vec![runtime(1), entry(2, ErrorCategory::IncompleteInput)];
        let slice = slice_new_errors(&log, Some(1), is_noise);
        assert!(slice.errors.is_empty());
        assert_eq!(slice.watermark, Some(1));
    }

    #[test]
    fn test_empty_log() {
        let slice = slice_new_errors(&[], Some(9), is_noise);
        assert!(slice.errors.is_empty());
        assert_eq!(slice.watermark, Some(9));
    }

    #[test]
    fn test_custom_noise_predicate() {
        let log = vec![
            runtime(1),
            entry(2, ErrorCategory::Other("Verbose".into())),
        ];
        let slice = slice_new_errors(&log, None, |e| {
            matches!(&e.category, ErrorCategory::Other(tag) if tag == "Verbose")
        });
        assert_eq!(fingerprints(&slice), vec![1]);
    }

    #[test]
    fn test_fingerprint_depends_on_occurrence_and_content() {
        let a = ErrorEntry::new(1, ErrorCategory::Runtime, Item::error("E", "boom"));
        let again = ErrorEntry::new(1, ErrorCategory::Runtime, Item::error("E", "boom"));
        let repeat = ErrorEntry::new(2, ErrorCategory::Runtime, Item::error("E", "boom"));
        let other = ErrorEntry::new(1, ErrorCategory::Runtime, Item::error("E", "bang"));
        assert_eq!(a.fingerprint, again.fingerprint);
        assert_ne!(a.fingerprint, repeat.fingerprint);
        assert_ne!(a.fingerprint, other.fingerprint);
        assert_eq!(
            newest_fingerprint(&[a, repeat.clone()]),
            Some(repeat.fingerprint)
        );
    }

    #[test]
    fn test_identical_consecutive_errors_each_attributed() {
        let not_found = || Item::error("ItemNotFound", "Cannot find path 'nope'");
        let mut log = vec![ErrorEntry::new(1, ErrorCategory::Runtime, not_found())];
        let first = slice_new_errors(&log, None, is_noise);
        assert_eq!(first.errors.len(), 1);

        log.push(ErrorEntry::new(2, ErrorCategory::Runtime, not_found()));
        let second = slice_new_errors(&log, first.watermark, is_noise);
        assert_eq!(second.errors.len(), 1, "repeat of the same error is new");
        assert_eq!(second.errors[0].record, not_found());
        assert_ne!(second.watermark, first.watermark);
    }
}
