//! In-memory host implementations, for tests and for embedding the engine
//! without a real shell.

use crate::host::{
    ErrorLog, LifecycleHook, LifecycleSource, SessionId, StatementParser, Transcript, VarValue,
    VariableStore, SUCCESS_VARIABLE,
};
use crate::view::{ExecutionStatus, TranscriptEntry};
use chrono::Utc;
use histex_common::error::HostError;
use histex_store::Item;
use histex_tracker::ast::ScriptTree;
use histex_tracker::watermark::{ErrorCategory, ErrorEntry};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Subscribed(SessionId, LifecycleHook),
    Unsubscribed(SessionId, LifecycleHook),
}

/// Lifecycle source that records every (un)subscription.
#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    events: Mutex<Vec<HookEvent>>,
}

impl RecordingLifecycle {
    fn push(&self, event: HookEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<HookEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, event: HookEvent) -> usize {
        self.events().iter().filter(|e| **e == event).count()
    }

    /// Hooks currently subscribed for `session`.
    pub fn active(&self, session: SessionId) -> Vec<LifecycleHook> {
        let mut active = Vec::new();
        for event in self.events() {
            match event {
                HookEvent::Subscribed(id, hook) if id == session => active.push(hook),
                HookEvent::Unsubscribed(id, hook) if id == session => {
                    active.retain(|h| *h != hook)
                }
                _ => {}
            }
        }
        active
    }
}

impl LifecycleSource for RecordingLifecycle {
    fn subscribe(&self, session: SessionId, hook: LifecycleHook) {
        self.push(HookEvent::Subscribed(session, hook));
    }

    fn unsubscribe(&self, session: SessionId, hook: LifecycleHook) {
        self.push(HookEvent::Unsubscribed(session, hook));
    }
}

#[derive(Debug, Default)]
pub struct MemoryTranscript {
    entries: Vec<TranscriptEntry>,
    unavailable: bool,
}

impl MemoryTranscript {
    /// A transcript whose host does not expose one.
    pub fn unavailable() -> Self {
        Self {
            entries: Vec::new(),
            unavailable: true,
        }
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    /// Append a completed entry started now.
    pub fn record(&mut self, id: i64, command_line: &str) {
        let now = Utc::now();
        self.push(TranscriptEntry::new(id, command_line, ExecutionStatus::Completed, now).ended(now));
    }

    /// Host-side pruning, e.g. `Clear-History`.
    pub fn retain_ids(&mut self, ids: &[i64]) {
        self.entries.retain(|entry| ids.contains(&entry.id));
    }
}

impl Transcript for MemoryTranscript {
    fn entries(&self, max_count: usize) -> Result<Vec<TranscriptEntry>, HostError> {
        if self.unavailable {
            return Err(HostError::MissingCapability("transcript"));
        }
        let skip = self.entries.len().saturating_sub(max_count);
        Ok(self.entries[skip..].to_vec())
    }
}

/// Error log that numbers each logged occurrence, so repeats of the same
/// error stay distinguishable.
#[derive(Debug, Default)]
pub struct MemoryErrorLog {
    entries: Vec<ErrorEntry>,
    /// Keeps counting across `clear`.
    occurrences: u64,
}

impl MemoryErrorLog {
    pub fn push(&mut self, category: ErrorCategory, record: Item) -> u64 {
        self.occurrences += 1;
        let entry = ErrorEntry::new(self.occurrences, category, record);
        let fingerprint = entry.fingerprint;
        self.entries.push(entry);
        fingerprint
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl ErrorLog for MemoryErrorLog {
    fn entries(&self) -> Vec<ErrorEntry> {
        self.entries.clone()
    }
}

/// Variable store with the host's case-insensitive names.
#[derive(Debug, Default)]
pub struct MemoryVariables {
    vars: HashMap<String, VarValue>,
}

impl MemoryVariables {
    pub fn set_success(&mut self, succeeded: bool) {
        self.set(SUCCESS_VARIABLE, VarValue::Bool(succeeded));
    }
}

impl VariableStore for MemoryVariables {
    fn get(&self, name: &str) -> Option<VarValue> {
        self.vars.get(&name.to_ascii_lowercase()).cloned()
    }

    fn set(&mut self, name: &str, value: VarValue) {
        self.vars.insert(name.to_ascii_lowercase(), value);
    }

    fn remove(&mut self, name: &str) -> bool {
        self.vars.remove(&name.to_ascii_lowercase()).is_some()
    }
}

/// Parser that answers from a fixed table of source texts.
#[derive(Debug, Default)]
pub struct ScriptedParser {
    trees: HashMap<String, ScriptTree>,
}

impl ScriptedParser {
    pub fn with(mut self, source: &str, tree: ScriptTree) -> Self {
        self.trees.insert(source.to_string(), tree);
        self
    }
}

impl StatementParser for ScriptedParser {
    fn parse(&self, source: &str) -> Option<ScriptTree> {
        self.trees.get(source).cloned()
    }
}
