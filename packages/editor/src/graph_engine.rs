//! # XML Document Engine
//!
//! Owns the XML tree document: current text, last rendered artifact,
//! and its own bounded history. All mutation flows through validated
//! loads, id-addressed patches, or confirmed renderer round-trips.
//!
//! Renderer confirmation rules: a materialization event is adopted as
//! new canonical text only when no export is in flight (an in-flight
//! export means the event is a thumbnail probe, which may refresh the
//! cached artifact but never `current_text`) and the carried text is
//! not a degenerate empty diagram.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};

use easel_common::timestamp_ms;
use easel_graph::{GraphModel, GraphPatch};

use crate::errors::{EngineError, LoadError};
use crate::history::{HistoryEntry, HistoryTracker};
use crate::renderer::{DiagramSurface, MaterializedEvent};

/// Bound on thumbnail materialization; on expiry the caller gets
/// `None` instead of blocking indefinitely.
pub const THUMBNAIL_TIMEOUT: Duration = Duration::from_millis(3000);

struct GraphEngineState {
    current_text: String,
    last_artifact: Option<String>,
    /// Document waiting for the renderer to become ready.
    pending_restore: Option<String>,
    /// Non-zero while a thumbnail export awaits the renderer, so its
    /// materialization event is not mistaken for an edit confirmation.
    exports_in_flight: usize,
    history: HistoryTracker<String>,
}

/// The XML half of the dual-backend engine.
pub struct GraphEngine {
    renderer: Mutex<Option<Arc<dyn DiagramSurface>>>,
    ready: watch::Sender<bool>,
    state: Mutex<GraphEngineState>,
}

impl Default for GraphEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphEngine {
    /// Create a detached engine holding an explicitly empty document.
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            renderer: Mutex::new(None),
            ready,
            state: Mutex::new(GraphEngineState {
                current_text: String::new(),
                last_artifact: None,
                pending_restore: None,
                exports_in_flight: 0,
                history: HistoryTracker::new(),
            }),
        }
    }

    pub fn attach_renderer(&self, renderer: Arc<dyn DiagramSurface>) {
        *self.renderer.lock().unwrap() = Some(renderer);
    }

    pub fn detach_renderer(&self) {
        *self.renderer.lock().unwrap() = None;
        self.ready.send_replace(false);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub(crate) fn reset_ready(&self) {
        self.ready.send_replace(false);
    }

    pub(crate) fn ready_signal(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    /// The renderer signalled readiness: flush any deferred document.
    pub async fn on_renderer_ready(&self) {
        self.ready.send_replace(true);
        let pending = self.state.lock().unwrap().pending_restore.take();
        if let Some(xml) = pending {
            debug!("renderer ready, applying deferred document");
            self.push_to_renderer(&xml).await;
        }
    }

    /// Validate and adopt `text` as the current document.
    ///
    /// Returns a human-readable validation error as a value; state is
    /// untouched on failure. With no ready renderer attached the
    /// document is deferred, not dropped.
    pub async fn load(&self, text: &str, skip_validation: bool) -> Result<(), LoadError> {
        let canonical = match GraphModel::from_text(text) {
            Ok(model) => {
                if !skip_validation && model.is_degenerate() {
                    return Err(LoadError::Degenerate);
                }
                model.to_xml()
            }
            Err(e) if skip_validation => {
                warn!(error = %e, "loading unparseable text unvalidated");
                text.to_string()
            }
            Err(e) => return Err(LoadError::Invalid(e.to_string())),
        };

        self.state.lock().unwrap().current_text = canonical.clone();

        if self.is_ready() {
            self.push_to_renderer(&canonical).await;
        } else {
            debug!("renderer not ready, deferring load");
            self.state.lock().unwrap().pending_restore = Some(canonical);
        }
        Ok(())
    }

    /// Apply id-addressed patches to the current tree and push the
    /// result to the renderer.
    pub async fn apply_patch(&self, patches: &[GraphPatch]) -> Result<(), EngineError> {
        let xml = {
            let mut state = self.state.lock().unwrap();
            let mut model = if state.current_text.is_empty() {
                GraphModel::empty()
            } else {
                GraphModel::parse(&state.current_text)?
            };
            model.apply_patches(patches)?;
            let xml = model.to_xml();
            state.current_text = xml.clone();
            xml
        };

        if self.is_ready() {
            self.push_to_renderer(&xml).await;
        } else {
            self.state.lock().unwrap().pending_restore = Some(xml);
        }
        Ok(())
    }

    /// Ask the renderer to materialize the current document, racing a
    /// fixed timeout. Returns `None` on timeout, failure or a detached
    /// renderer.
    pub async fn request_thumbnail(&self) -> Option<String> {
        let renderer = self.renderer.lock().unwrap().clone()?;
        let xml = {
            let mut state = self.state.lock().unwrap();
            if state.current_text.is_empty() {
                return None;
            }
            state.exports_in_flight += 1;
            state.current_text.clone()
        };

        let result = timeout(THUMBNAIL_TIMEOUT, renderer.export(&xml)).await;

        let mut state = self.state.lock().unwrap();
        state.exports_in_flight -= 1;
        match result {
            Ok(Ok(artifact)) => {
                state.last_artifact = Some(artifact.clone());
                Some(artifact)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "thumbnail export failed");
                None
            }
            Err(_) => {
                warn!("thumbnail export timed out");
                None
            }
        }
    }

    /// Renderer confirmation of a materialized document.
    pub fn on_materialized(&self, event: MaterializedEvent) {
        let mut state = self.state.lock().unwrap();

        if state.exports_in_flight > 0 {
            // thumbnail probe: refresh the cached artifact only
            if let Some(artifact) = event.artifact {
                state.last_artifact = Some(artifact);
            }
            return;
        }

        match GraphModel::parse(&event.xml) {
            Ok(model) if !model.is_degenerate() => {
                state.current_text = event.xml;
                if let Some(artifact) = event.artifact {
                    state.last_artifact = Some(artifact);
                }
                commit_entry(&mut state, false);
            }
            _ => debug!("ignoring degenerate materialization event"),
        }
    }

    /// Snapshot the current document into history. No-ops on an
    /// empty/degenerate document.
    pub fn commit_version(&self, is_manual: bool) {
        let mut state = self.state.lock().unwrap();
        commit_entry(&mut state, is_manual);
    }

    /// Re-hydrate the snapshot at `index` as the live document.
    /// Returns false (after a diagnostic) on an invalid index.
    pub async fn restore_version(&self, index: usize) -> bool {
        let xml = {
            let mut state = self.state.lock().unwrap();
            match state.history.restore(index) {
                Some(entry) => {
                    let xml = entry.snapshot.clone();
                    let artifact = entry.thumbnail.clone();
                    state.current_text = xml.clone();
                    state.last_artifact = artifact;
                    xml
                }
                None => return false,
            }
        };

        if self.is_ready() {
            self.push_to_renderer(&xml).await;
        } else {
            self.state.lock().unwrap().pending_restore = Some(xml);
        }
        true
    }

    pub fn delete_version(&self, index: usize) -> bool {
        self.state.lock().unwrap().history.delete(index)
    }

    pub fn clear_history(&self) {
        self.state.lock().unwrap().history.clear();
    }

    /// Seed history from persisted entries.
    pub fn initialize_history(&self, entries: Vec<HistoryEntry<String>>) {
        self.state.lock().unwrap().history.initialize_from(entries);
    }

    /// Clone of the history list, for the persistence collaborator.
    pub fn history_entries(&self) -> Vec<HistoryEntry<String>> {
        self.state.lock().unwrap().history.entries().to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().unwrap().history.len()
    }

    pub fn current_text(&self) -> String {
        self.state.lock().unwrap().current_text.clone()
    }

    pub fn last_artifact(&self) -> Option<String> {
        self.state.lock().unwrap().last_artifact.clone()
    }

    async fn push_to_renderer(&self, xml: &str) {
        let renderer = self.renderer.lock().unwrap().clone();
        if let Some(renderer) = renderer {
            if let Err(e) = renderer.load_xml(xml).await {
                warn!(error = %e, "renderer rejected document");
            }
        }
    }
}

fn commit_entry(state: &mut GraphEngineState, is_manual: bool) {
    let degenerate = state.current_text.is_empty()
        || GraphModel::parse(&state.current_text)
            .map(|m| m.is_degenerate())
            .unwrap_or(true);
    if degenerate {
        debug!("skipping history commit for empty document");
        return;
    }

    let entry = HistoryEntry {
        timestamp: timestamp_ms(),
        is_manual,
        snapshot: state.current_text.clone(),
        thumbnail: state.last_artifact.clone(),
        label: None,
    };
    state.history.commit(entry);
}
