use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type name the host attaches to transcript entries.
pub const HISTORY_ENTRY_TYPE: &str = "Microsoft.PowerShell.Commands.HistoryInfo";
/// Type name attached to extended history views.
pub const EXTENDED_HISTORY_ENTRY_TYPE: &str = "Microsoft.PowerShell.Commands.HistoryInfo#Extended";
const WARNING_TYPE: &str = "System.Management.Automation.WarningRecord";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Reference-typed object.
    Object,
    /// Number, boolean, date and other values that are cheap to retype.
    ValueType,
    /// A transcript entry (plain or extended) echoed back to the output stream.
    HistoryEntry,
    Error,
    Warning,
}

/// One captured pipeline object: an opaque payload plus the host's type names,
/// most-derived first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub kind: ItemKind,
    #[serde(default)]
    pub type_names: Vec<String>,
    pub value: Value,
}

impl Item {
    pub fn new(kind: ItemKind, type_names: Vec<String>, value: Value) -> Self {
        Self {
            kind,
            type_names,
            value,
        }
    }

    pub fn object(type_name: &str, value: Value) -> Self {
        Self::new(ItemKind::Object, vec![type_name.to_string()], value)
    }

    pub fn value_type(type_name: &str, value: Value) -> Self {
        Self::new(ItemKind::ValueType, vec![type_name.to_string()], value)
    }

    pub fn history_entry(id: i64) -> Self {
        Self::new(
            ItemKind::HistoryEntry,
            vec![HISTORY_ENTRY_TYPE.to_string()],
            Value::from(id),
        )
    }

    pub fn error(type_name: &str, message: impl Into<String>) -> Self {
        Self::new(
            ItemKind::Error,
            vec![type_name.to_string()],
            Value::String(message.into()),
        )
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(
            ItemKind::Warning,
            vec![WARNING_TYPE.to_string()],
            Value::String(message.into()),
        )
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn is_history_entry(&self) -> bool {
        self.kind == ItemKind::HistoryEntry
    }
}

/// Source location of the statement that produced an output item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceExtent {
    #[serde(default)]
    pub file: Option<String>,
    pub start_line: u32,
    pub start_column: u32,
    pub text: String,
}

impl SourceExtent {
    pub fn new(start_line: u32, start_column: u32, text: impl Into<String>) -> Self {
        Self {
            file: None,
            start_line,
            start_column,
            text: text.into(),
        }
    }
}
