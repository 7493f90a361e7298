pub mod execution;
pub mod host;
pub mod session_mgr;
/// In-memory hosts; enabled for this crate's tests and by the `testing` feature.
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod view;

pub use execution::{CapturePolicy, ExecutionCapture, ExecutionSummary, RoutedError};
pub use host::{
    Availability, ErrorLog, LifecycleHook, LifecycleSource, SessionId, SessionState,
    StatementParser, Transcript, VarValue, VariableStore,
};
pub use session_mgr::{SessionHandle, SessionManager};
pub use view::{ExecutionStatus, HistoryView, TranscriptEntry};
