//! Contracts the shell host fulfils. Everything the engine knows about the
//! host comes through these traits; how the host implements them is its own
//! business.

use crate::view::TranscriptEntry;
use histex_common::error::HostError;
use histex_store::Item;
use histex_tracker::ast::ScriptTree;
use histex_tracker::watermark::ErrorEntry;

pub type SessionId = uuid::Uuid;

/// Name of the host variable holding the success flag of the last execution.
pub const SUCCESS_VARIABLE: &str = "?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    StateChanged,
    AvailabilityChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Opened,
    Closing,
    Closed,
    Broken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    None,
    Available,
    AvailableForNestedCommand,
    Busy,
}

impl Availability {
    /// The session has finished whatever it was running.
    pub fn is_idle(self) -> bool {
        matches!(self, Availability::None | Availability::Available)
    }
}

/// Delivers session state and availability changes for subscribed sessions.
pub trait LifecycleSource: Send + Sync {
    /// Called with the session's lock held; must not call back into the
    /// manager before returning.
    fn subscribe(&self, session: SessionId, hook: LifecycleHook);
    fn unsubscribe(&self, session: SessionId, hook: LifecycleHook);
}

/// The host's own, separately pruned list of past commands for one session.
pub trait Transcript {
    /// Up to `max_count` retained entries, oldest first.
    fn entries(&self, max_count: usize) -> Result<Vec<TranscriptEntry>, HostError>;

    fn retained_ids(&self, max_count: usize) -> Result<Vec<i64>, HostError> {
        Ok(self
            .entries(max_count)?
            .into_iter()
            .map(|entry| entry.id)
            .collect())
    }
}

/// A session's append-only error log, oldest first.
pub trait ErrorLog {
    fn entries(&self) -> Vec<ErrorEntry>;
}

pub trait StatementParser {
    /// `None` when the text does not parse.
    fn parse(&self, source: &str) -> Option<ScriptTree>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    Null,
    Bool(bool),
    Item(Item),
    Items(Vec<Item>),
}

pub trait VariableStore {
    fn get(&self, name: &str) -> Option<VarValue>;
    fn set(&mut self, name: &str, value: VarValue);
    fn remove(&mut self, name: &str) -> bool;

    fn success_flag(&self) -> Option<bool> {
        match self.get(SUCCESS_VARIABLE) {
            Some(VarValue::Bool(flag)) => Some(flag),
            _ => None,
        }
    }
}
