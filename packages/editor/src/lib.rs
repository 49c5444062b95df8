//! # Easel Editor
//!
//! Dual-backend document/session engine: one XML node-tree document
//! and one JSON scene-graph document, exactly one of them "live" at a
//! time, each with its own renderer handshake and bounded history.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ session: EditorSession + switch coordinator │
//! │  - single current-document accessor         │
//! │  - two-phase engine switch with timeout     │
//! └─────────────────────────────────────────────┘
//!           ↓                       ↓
//! ┌──────────────────┐   ┌──────────────────────┐
//! │ graph_engine:    │   │ scene_engine:        │
//! │ XML document     │   │ scene-graph document │
//! │  load / patch /  │   │  set / append / edit │
//! │  thumbnail       │   │  select / thumbnail  │
//! └──────────────────┘   └──────────────────────┘
//!           ↓                       ↓
//! ┌─────────────────────────────────────────────┐
//! │ renderer: async surface traits + events     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Nothing here is fatal**: validation errors are values, renderer
//!    timeouts are bounded `None`s, bad history indices are logged no-ops
//! 2. **Renderer confirmation is authoritative**: a materialization
//!    event, not the request that caused it, updates canonical state
//! 3. **Per-engine ownership**: renderer handle and history list belong
//!    to their engine and are never shared across the two

mod errors;
mod graph_engine;
mod history;
mod renderer;
mod scene_engine;
mod session;

pub use errors::{EngineError, LoadError, SwitchError};
pub use graph_engine::{GraphEngine, THUMBNAIL_TIMEOUT};
pub use history::{HistoryEntry, HistoryTracker, AUTOMATIC_HISTORY_LIMIT};
pub use renderer::{DiagramSurface, MaterializedEvent, RendererError, SceneSurface};
pub use scene_engine::{
    AssetBlob, SceneDocument, SceneEngine, SceneOperation, SceneUpdate, SetSceneOptions,
};
pub use session::{EditorSession, EngineHandle, EngineId, SWITCH_TIMEOUT};

// Re-export the document models for convenience
pub use easel_graph::{GraphModel, GraphPatch};
pub use easel_scene::Element;
