use crate::host::{
    Availability, ErrorLog, LifecycleHook, LifecycleSource, SessionId, SessionState, Transcript,
    VariableStore,
};
use crate::view::{HistoryView, TranscriptEntry};
use chrono::{DateTime, Utc};
use histex_common::config::HistoryConfig;
use histex_common::error::HostError;
use histex_store::{Contribution, ExecutionRecord, HistoryTable, MergeOutcome};
use histex_tracker::watermark::{self, ErrorEntry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    Decommissioning,
    Removed,
}

struct HistoryState {
    table: HistoryTable,
    item_cap: usize,
    watermark: Option<u64>,
    phase: Phase,
    /// Hooks currently subscribed for this session, in subscription order.
    hooks: Vec<LifecycleHook>,
}

struct Session {
    id: SessionId, // immutable after creation
    created_at: DateTime<Utc>,
    state: Mutex<HistoryState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle to one session's history table and watermark.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Session>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.session.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.session.created_at
    }

    fn state(&self) -> MutexGuard<'_, HistoryState> {
        lock(&self.session.state)
    }

    pub fn is_decommissioning(&self) -> bool {
        self.state().phase == Phase::Decommissioning
    }

    /// True once the session has been torn down; the handle is then inert.
    pub fn is_removed(&self) -> bool {
        self.state().phase == Phase::Removed
    }

    /// Cap applied to the output, sources and errors of each record.
    pub fn item_cap(&self) -> usize {
        self.state().item_cap
    }

    /// Fold a contribution into the record for `id`. Returns `None` without
    /// touching the table while the session is being decommissioned or after
    /// it was removed.
    pub fn add_or_merge(&self, id: i64, contribution: Contribution) -> Option<MergeOutcome> {
        let mut state = self.state();
        if state.phase != Phase::Active {
            tracing::debug!(
                "session {} not active, dropping contribution for {}",
                self.session.id,
                id
            );
            return None;
        }
        let item_cap = state.item_cap;
        let outcome = histex_store::add_or_merge(&mut state.table, id, contribution, item_cap);
        if outcome == MergeOutcome::Rejected {
            tracing::debug!("session {} history table has no capacity", self.session.id);
        }
        Some(outcome)
    }

    pub fn record(&self, id: i64) -> Option<ExecutionRecord> {
        self.state().table.get(&id).cloned()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.state().table.contains(&id)
    }

    /// Execution ids in eviction order, oldest first.
    pub fn ids(&self) -> Vec<i64> {
        self.state().table.keys_in_order()
    }

    pub fn len(&self) -> usize {
        self.state().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().table.is_empty()
    }

    pub fn remove(&self, id: i64) -> bool {
        self.state().table.remove(&id)
    }

    pub fn clear(&self) {
        self.state().table.clear();
    }

    pub fn with_table<R>(&self, f: impl FnOnce(&HistoryTable) -> R) -> R {
        f(&self.state().table)
    }

    pub fn watermark(&self) -> Option<u64> {
        self.state().watermark
    }

    pub fn set_watermark(&self, watermark: Option<u64>) {
        self.state().watermark = watermark;
    }

    /// Slice the entries logged since the last call and advance the watermark.
    /// `log` is oldest first.
    pub fn take_new_errors(&self, log: &[ErrorEntry]) -> Vec<ErrorEntry> {
        let mut state = self.state();
        let slice = watermark::slice_new_errors(log, state.watermark, watermark::is_noise);
        state.watermark = slice.watermark;
        slice.errors
    }

    /// Drop every record whose id is not in `retained`.
    pub fn sync(&self, retained: &[i64]) -> usize {
        let removed = histex_store::sync(&mut self.state().table, retained);
        if removed > 0 {
            tracing::debug!(
                "session {} pruned {} records missing from transcript",
                self.session.id,
                removed
            );
        }
        removed
    }

    /// Join transcript entries with their captured records.
    pub fn history_view(&self, entries: &[TranscriptEntry]) -> Vec<HistoryView> {
        let state = self.state();
        entries
            .iter()
            .map(|entry| HistoryView::extend(entry, state.table.get(&entry.id)))
            .collect()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.session.id)
            .field("created_at", &self.session.created_at)
            .finish()
    }
}

/// Process-wide registry of per-session history state.
pub struct SessionManager {
    config: RwLock<HistoryConfig>,
    lifecycle: Arc<dyn LifecycleSource>,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    capability_reported: AtomicBool,
}

impl SessionManager {
    pub fn new(config: HistoryConfig, lifecycle: Arc<dyn LifecycleSource>) -> Self {
        Self {
            config: RwLock::new(config),
            lifecycle,
            sessions: RwLock::new(HashMap::new()),
            capability_reported: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> HistoryConfig {
        read(&self.config).clone()
    }

    /// Look up a session's history, creating it on first access. Creation
    /// subscribes the session's state-changed hook exactly once.
    pub fn get_or_create(&self, session_id: SessionId) -> SessionHandle {
        // Fast path: read lock.
        if let Some(session) = read(&self.sessions).get(&session_id) {
            return SessionHandle {
                session: session.clone(),
            };
        }

        // Slow path: write lock, double-check.
        let config = self.config();
        let (session, created) = {
            let mut sessions = write(&self.sessions);
            match sessions.get(&session_id) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let session = Arc::new(Session {
                        id: session_id,
                        created_at: Utc::now(),
                        state: Mutex::new(HistoryState {
                            table: HistoryTable::new(config.maximum_entry_count),
                            item_cap: config.maximum_item_count_per_entry,
                            watermark: None,
                            phase: Phase::Active,
                            hooks: Vec::new(),
                        }),
                    });
                    sessions.insert(session_id, session.clone());
                    (session, true)
                }
            }
        };

        if created {
            // Subscribing under the session lock orders it before any teardown,
            // which takes the same lock to collect hooks.
            let mut state = lock(&session.state);
            if state.phase == Phase::Active {
                self.lifecycle.subscribe(session_id, LifecycleHook::StateChanged);
                state.hooks.push(LifecycleHook::StateChanged);
                tracing::info!("session {} history created", session_id);
            }
        }
        SessionHandle { session }
    }

    pub fn get(&self, session_id: SessionId) -> Option<SessionHandle> {
        read(&self.sessions)
            .get(&session_id)
            .map(|session| SessionHandle {
                session: session.clone(),
            })
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        read(&self.sessions).contains_key(&session_id)
    }

    pub fn active_sessions(&self) -> Vec<SessionId> {
        read(&self.sessions).keys().copied().collect()
    }

    /// Attach to a session: create its history and seed the watermark with the
    /// newest logged error so earlier errors are never attributed.
    pub fn on_module_imported(&self, session_id: SessionId, errors: &dyn ErrorLog) -> SessionHandle {
        let handle = self.get_or_create(session_id);
        let seed = watermark::newest_fingerprint(&errors.entries());
        handle.set_watermark(seed);
        tracing::debug!("session {} watermark seeded at {:?}", session_id, seed);
        handle
    }

    /// Detach from a session: remove the last-result variable now and tear the
    /// history down on the next idle transition. Returns true when this call
    /// armed decommissioning; repeated requests are no-ops.
    pub fn on_unload_requested(
        &self,
        session_id: SessionId,
        variables: &mut dyn VariableStore,
        capture_variable: &str,
    ) -> bool {
        variables.remove(capture_variable);

        let handle = match self.get(session_id) {
            Some(handle) => handle,
            None => return false,
        };
        {
            let mut state = handle.state();
            if state.phase != Phase::Active {
                return false;
            }
            state.phase = Phase::Decommissioning;
            if !state.hooks.contains(&LifecycleHook::AvailabilityChanged) {
                self.lifecycle
                    .subscribe(session_id, LifecycleHook::AvailabilityChanged);
                state.hooks.push(LifecycleHook::AvailabilityChanged);
            }
        }
        tracing::info!("session {} decommissioning until idle", session_id);
        true
    }

    pub fn handle_state_changed(&self, session_id: SessionId, state: SessionState) {
        if state == SessionState::Closing {
            self.teardown(session_id, "closing");
        }
    }

    pub fn handle_availability_changed(&self, session_id: SessionId, availability: Availability) {
        if !availability.is_idle() {
            return;
        }
        let decommissioning = self
            .get(session_id)
            .map(|handle| handle.is_decommissioning())
            .unwrap_or(false);
        if decommissioning {
            self.teardown(session_id, "unloaded");
        }
    }

    /// Remove the session from the registry, clear its table and unsubscribe
    /// every hook it holds. Only the caller that wins the removal does the work.
    /// Hooks are collected under the session lock, so a subscription still in
    /// flight is either collected here or skipped by its subscriber.
    fn teardown(&self, session_id: SessionId, reason: &str) {
        let session = match write(&self.sessions).remove(&session_id) {
            Some(session) => session,
            None => return,
        };
        let hooks = {
            let mut state = lock(&session.state);
            state.table.clear();
            state.phase = Phase::Removed;
            std::mem::take(&mut state.hooks)
        };
        for hook in hooks {
            self.lifecycle.unsubscribe(session_id, hook);
        }
        tracing::info!("session {} history removed ({})", session_id, reason);
    }

    /// Prune the session's records to the ids the host transcript still retains.
    pub fn sync_with_transcript(
        &self,
        session_id: SessionId,
        transcript: &dyn Transcript,
    ) -> Result<usize, HostError> {
        let handle = match self.get(session_id) {
            Some(handle) => handle,
            None => return Ok(0),
        };
        let max_count = read(&self.config).maximum_entry_count;
        let retained = transcript
            .retained_ids(max_count)
            .map_err(|e| self.report_host_error(e))?;
        Ok(handle.sync(&retained))
    }

    fn report_host_error(&self, error: HostError) -> HostError {
        if error.is_fatal() && !self.capability_reported.swap(true, Ordering::SeqCst) {
            tracing::error!("history capture unavailable: {}", error);
        }
        error
    }

    /// Resize every session's table, evicting the oldest records that no longer fit.
    pub fn set_maximum_entry_count(&self, count: usize) {
        write(&self.config).maximum_entry_count = count;
        for session in read(&self.sessions).values() {
            let evicted = lock(&session.state).table.set_capacity(count);
            if !evicted.is_empty() {
                tracing::debug!(
                    "session {} evicted {} records after resize",
                    session.id,
                    evicted.len()
                );
            }
        }
    }

    /// Applies to contributions merged from now on; stored records keep their items.
    pub fn set_maximum_item_count_per_entry(&self, count: usize) {
        write(&self.config).maximum_item_count_per_entry = count;
        for session in read(&self.sessions).values() {
            lock(&session.state).item_cap = count;
        }
    }
}
