use thiserror::Error;

/// Failure taxonomy for the layout runtime.
///
/// Merge-time problems (`DanglingReference`) are node/edge-local and
/// recoverable; callers drop the offending edge or delta and keep going.
/// Persistence problems never touch the in-memory graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown layout engine tag '{0}'")]
    UnknownEngine(String),

    #[error("{context} references unknown node '{guid}'")]
    DanglingReference { context: String, guid: String },

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("persistence failed: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl GraphError {
    pub(crate) fn dangling(context: impl Into<String>, guid: impl Into<String>) -> Self {
        Self::DanglingReference {
            context: context.into(),
            guid: guid.into(),
        }
    }
}
