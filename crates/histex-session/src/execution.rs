//! End-of-execution glue: collects what one command wrote to the output
//! stream, then decides the last result and folds a record into the
//! session's history.

use crate::host::{ErrorLog, StatementParser, VarValue, VariableStore};
use crate::session_mgr::SessionHandle;
use histex_common::config::HistexConfig;
use histex_store::{Contribution, Item, ItemKind, MergeOutcome, SourceExtent};
use histex_tracker::ast::ScriptTree;
use histex_tracker::capture::should_overwrite_last_result;
use histex_tracker::exclusion::ExclusionList;

/// Capture settings resolved once from configuration.
#[derive(Debug, Clone)]
pub struct CapturePolicy {
    pub variable_name: String,
    pub maximum_item_count: usize,
    pub exclusions: ExclusionList,
    pub capture_value_types: bool,
    pub capture_null: bool,
}

impl CapturePolicy {
    pub fn from_config(config: &HistexConfig) -> Self {
        Self {
            variable_name: config.capture.variable_name.clone(),
            maximum_item_count: config.capture.maximum_item_count,
            exclusions: ExclusionList::new(config.capture.excluded_types.iter().cloned()),
            capture_value_types: config.capture.capture_value_types,
            capture_null: config.capture.capture_null,
        }
    }
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self::from_config(&HistexConfig::default())
    }
}

/// An error record written to the error stream during the execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutedError {
    /// Transcript id of the invocation that raised it, if it has one.
    pub history_id: Option<i64>,
    /// Raised by a throw or by a failing parent container.
    pub thrown: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub history_id: i64,
    pub succeeded: Option<bool>,
    pub output_count: usize,
    pub error_count: usize,
    pub last_result_updated: bool,
    /// `None` when the session was not accepting contributions.
    pub merge: Option<MergeOutcome>,
}

pub struct ExecutionCapture<'a> {
    policy: &'a CapturePolicy,
    session: SessionHandle,
    /// Per-record item cap of the session, read when the execution begins.
    item_cap: usize,
    history_id: i64,
    decrement_id: bool,
    tree: Option<ScriptTree>,
    output: Vec<Item>,
    output_sources: Vec<Option<SourceExtent>>,
    dropped: usize,
    omitted_history_entries: usize,
    candidates: Vec<Item>,
}

impl<'a> ExecutionCapture<'a> {
    pub fn begin(
        policy: &'a CapturePolicy,
        session: &SessionHandle,
        history_id: i64,
        tree: Option<ScriptTree>,
    ) -> Self {
        Self {
            policy,
            session: session.clone(),
            item_cap: session.item_cap(),
            history_id,
            decrement_id: false,
            tree,
            output: Vec::new(),
            output_sources: Vec::new(),
            dropped: 0,
            omitted_history_entries: 0,
            candidates: Vec::new(),
        }
    }

    pub fn begin_with_source(
        policy: &'a CapturePolicy,
        session: &SessionHandle,
        history_id: i64,
        source: &str,
        parser: &dyn StatementParser,
    ) -> Self {
        Self::begin(policy, session, history_id, parser.parse(source))
    }

    pub fn history_id(&self) -> i64 {
        self.history_id
    }

    pub fn push_output(&mut self, item: Item, source: Option<SourceExtent>) {
        if !self.policy.exclusions.excludes(&item)
            && self.candidates.len() < self.policy.maximum_item_count
        {
            self.candidates.push(item.clone());
        }

        if item.is_history_entry() {
            self.omitted_history_entries += 1;
        } else if self.output.len() < self.item_cap {
            self.output.push(item);
            self.output_sources.push(source);
        } else {
            self.dropped += 1;
        }
    }

    pub fn push_error(&mut self, error: RoutedError) {
        match error.history_id {
            Some(id) if id < self.history_id => {
                tracing::trace!("execution {} reattributed to {}", self.history_id, id);
                self.history_id = id;
            }
            Some(_) => {}
            None if error.thrown => self.decrement_id = true,
            None => {}
        }
    }

    /// Close the execution: update the last-result variable, attribute new
    /// errors and merge the record into the session it began in.
    pub fn finish(
        self,
        variables: &mut dyn VariableStore,
        errors: &dyn ErrorLog,
    ) -> ExecutionSummary {
        let policy = self.policy;
        let session = self.session;
        let mut succeeded = variables.success_flag();
        let history_id = if self.decrement_id {
            self.history_id.saturating_sub(1)
        } else {
            self.history_id
        };

        let mut output = self.output;
        let mut output_sources = self.output_sources;
        let output_count = output.len() + self.omitted_history_entries + self.dropped;
        if self.omitted_history_entries > 0 {
            output.insert(
                0,
                Item::warning(format!(
                    "<Omitting {} history information objects>",
                    self.omitted_history_entries
                )),
            );
            output_sources.insert(0, None);
        }

        let last_result_updated =
            should_overwrite_last_result(self.tree.as_ref(), &policy.variable_name)
                && store_last_result(policy, variables, self.candidates);

        let new_errors: Vec<Item> = session
            .take_new_errors(&errors.entries())
            .into_iter()
            .map(|entry| entry.record)
            .collect();
        if output_count == 0 && new_errors.is_empty() {
            succeeded = Some(true);
        }
        let error_count = new_errors.len();

        let contribution = Contribution {
            succeeded,
            output,
            output_count,
            output_sources,
            errors: new_errors,
        };
        let merge = session.add_or_merge(history_id, contribution);
        tracing::debug!(
            "execution {} captured: {} outputs, {} errors, last result {}",
            history_id,
            output_count,
            error_count,
            if last_result_updated { "updated" } else { "kept" }
        );

        ExecutionSummary {
            history_id,
            succeeded,
            output_count,
            error_count,
            last_result_updated,
            merge,
        }
    }
}

/// Returns true when the variable was written.
fn store_last_result(
    policy: &CapturePolicy,
    variables: &mut dyn VariableStore,
    mut candidates: Vec<Item>,
) -> bool {
    let value = match candidates.len() {
        0 => None,
        1 => candidates.pop(),
        _ => {
            variables.set(&policy.variable_name, VarValue::Items(candidates));
            return true;
        }
    };

    match value {
        Some(item) if !item.is_null() => {
            if item.kind == ItemKind::ValueType && !policy.capture_value_types {
                return false;
            }
            variables.set(&policy.variable_name, VarValue::Item(item));
            true
        }
        _ if policy.capture_null => {
            variables.set(&policy.variable_name, VarValue::Null);
            true
        }
        _ => false,
    }
}
