//! Error types for the editor engines.

use thiserror::Error;

use crate::renderer::RendererError;
use crate::session::EngineId;

/// Load-time validation failure. Returned as a value so the caller can
/// surface it inline without aborting the edit flow.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("document is not a valid diagram: {0}")]
    Invalid(String),

    #[error("document is an empty diagram")]
    Degenerate,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] easel_graph::GraphError),

    #[error(transparent)]
    Renderer(#[from] RendererError),
}

/// Outcome of a failed engine switch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwitchError {
    #[error("switch already in progress")]
    AlreadySwitching,

    /// The target never signalled readiness. The active-engine pointer
    /// stays at the target: the switch was requested but not
    /// confirmed, and no rollback is attempted.
    #[error("engine {0:?} did not become ready in time")]
    Timeout(EngineId),
}
