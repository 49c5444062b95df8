//! # Renderer Surfaces
//!
//! The third-party rendering widgets are opaque collaborators behind
//! these traits. Each engine owns at most one surface handle, injected
//! at attach time and revocable — there is no ambient renderer state.
//!
//! The handshake is event-driven: the embedding layer forwards the
//! widget's "ready" signal to `on_renderer_ready` and its
//! materialization notifications to `on_materialized`; the engines call
//! back into the surface's imperative entry points.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use easel_scene::{Element, TextMeasurer};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RendererError {
    #[error("no renderer attached")]
    Detached,

    #[error("renderer failure: {0}")]
    Failed(String),
}

/// Materialization notification from the XML renderer, carrying its
/// own serialization of what it drew.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedEvent {
    pub xml: String,
    /// Raster/vector artifact, when the renderer produced one.
    pub artifact: Option<String>,
}

/// Surface for the XML node-tree renderer.
#[async_trait]
pub trait DiagramSurface: Send + Sync {
    /// Push a document into the widget.
    async fn load_xml(&self, xml: &str) -> Result<(), RendererError>;

    /// Materialize `xml` into an exportable artifact.
    async fn export(&self, xml: &str) -> Result<String, RendererError>;
}

/// Surface for the scene-graph renderer.
#[async_trait]
pub trait SceneSurface: Send + Sync {
    /// Push the full element list and view-state. `commit_to_history`
    /// records the push on the widget's own undo stack so a user undo
    /// gesture can reverse it — distinct from the engine's version
    /// history.
    async fn update_scene(
        &self,
        elements: &[Element],
        view_state: &Map<String, Value>,
        commit_to_history: bool,
    ) -> Result<(), RendererError>;

    /// Set the widget's selection and active tool.
    async fn set_selection(&self, ids: &[String]) -> Result<(), RendererError>;

    /// Export elements to a vector snapshot.
    async fn export_svg(&self, elements: &[Element]) -> Result<String, RendererError>;

    /// Pixel-space text measurement, when the widget is mounted.
    fn text_measurer(&self) -> Option<&dyn TextMeasurer> {
        None
    }
}
