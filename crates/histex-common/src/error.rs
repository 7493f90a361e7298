use thiserror::Error;

/// Fatal conditions raised at the boundary between the engine and its host.
///
/// Expected conditions (absent sessions, unknown ids, unparsable input) are
/// never errors; they surface as empty or `None` results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// A host-provided accessor the engine depends on could not be located.
    /// Indicates a host/engine version mismatch; callers must not retry.
    #[error("required host capability unavailable: {0}")]
    MissingCapability(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl HostError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, HostError::MissingCapability(_))
    }
}
