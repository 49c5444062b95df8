//! # JSON Scene Engine
//!
//! Owns the scene-graph document: elements (render order significant),
//! view-state, and embedded assets. Every element list that enters the
//! document goes through the normalizer, so the document is
//! structurally valid at all times.
//!
//! Append and edit differ deliberately: append remaps every incoming
//! id to a fresh one (foreign content can never collide with the live
//! scene), while edits target ids the caller already knows are live
//! and are applied verbatim.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};

use easel_common::{fresh_id, timestamp_ms};
use easel_scene::{normalize, refine, reposition_bound_text, Element};

use crate::graph_engine::THUMBNAIL_TIMEOUT;
use crate::history::{HistoryEntry, HistoryTracker};
use crate::renderer::SceneSurface;

/// Embedded binary asset (image payloads), addressed from image
/// elements via `file_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBlob {
    pub mime_type: String,
    pub data_url: String,
    pub created: i64,
}

/// The scene-graph document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    pub elements: Vec<Element>,
    pub view_state: Map<String, Value>,
    pub assets: BTreeMap<String, AssetBlob>,
}

/// Incoming document for [`SceneEngine::set_scene`]: elements still
/// loose, view-state partial.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneUpdate {
    #[serde(default)]
    pub elements: Vec<Value>,
    #[serde(default)]
    pub view_state: Map<String, Value>,
    #[serde(default)]
    pub assets: BTreeMap<String, AssetBlob>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SetSceneOptions {
    /// Update engine state without pushing to the renderer.
    pub skip_apply: bool,
    /// Record the push on the renderer's own undo stack.
    pub commit_to_history: bool,
}

/// One edit operation against live element ids. No id remapping here,
/// unlike append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SceneOperation {
    /// Full overwrite by id.
    ReplaceElements { elements: Vec<Value> },
    /// Shallow-merge by id onto the existing element, or insert if
    /// absent.
    PatchElements { patches: Vec<Value> },
    /// Remove by id set.
    DeleteElements { ids: Vec<String> },
}

struct SceneEngineState {
    doc: SceneDocument,
    selection: Vec<String>,
    history: HistoryTracker<SceneDocument>,
}

/// The scene-graph half of the dual-backend engine.
pub struct SceneEngine {
    renderer: Mutex<Option<Arc<dyn SceneSurface>>>,
    ready: watch::Sender<bool>,
    state: Mutex<SceneEngineState>,
}

impl Default for SceneEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneEngine {
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            renderer: Mutex::new(None),
            ready,
            state: Mutex::new(SceneEngineState {
                doc: SceneDocument {
                    elements: Vec::new(),
                    view_state: default_view_state(),
                    assets: BTreeMap::new(),
                },
                selection: Vec::new(),
                history: HistoryTracker::new(),
            }),
        }
    }

    pub fn attach_renderer(&self, renderer: Arc<dyn SceneSurface>) {
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

    pub fn on_renderer_ready(&self) {
        self.ready.send_replace(true);
    }

    /// Replace the document. Elements are normalized (both passes when
    /// a renderer is attached), caller view-state fields are overlaid
    /// onto engine defaults, and assets are cleared when the resulting
    /// element list is empty.
    pub async fn set_scene(&self, update: SceneUpdate, options: SetSceneOptions) {
        let mut elements = normalize(&update.elements);
        self.run_renderer_pass(&mut elements);

        let mut view_state = default_view_state();
        for (key, value) in update.view_state {
            view_state.insert(key, value);
        }

        {
            let mut state = self.state.lock().unwrap();
            state.doc.elements = elements.clone();
            state.doc.view_state = view_state.clone();
            if elements.is_empty() {
                state.doc.assets.clear();
            } else {
                state.doc.assets.extend(update.assets);
            }
        }

        if !options.skip_apply {
            self.push_to_renderer(&elements, &view_state, options.commit_to_history)
                .await;
        }
    }

    /// Merge foreign elements into the live scene. Every incoming id
    /// is remapped to a fresh one and all internal self-references are
    /// rewritten through the old→new map, so content produced by an
    /// external generator can never collide with live ids. Returns the
    /// newly assigned ids.
    pub async fn append_elements(&self, incoming: &[Value], select: bool) -> Vec<String> {
        let mut fresh = normalize(incoming);

        let id_map: HashMap<String, String> = fresh
            .iter()
            .map(|e| (e.id().to_string(), fresh_id()))
            .collect();
        for element in &mut fresh {
            remap_ids(element, &id_map);
        }
        self.run_renderer_pass(&mut fresh);

        let new_ids: Vec<String> = fresh.iter().map(|e| e.id().to_string()).collect();

        let (elements, view_state) = {
            let mut state = self.state.lock().unwrap();
            state.doc.elements.extend(fresh);
            (state.doc.elements.clone(), state.doc.view_state.clone())
        };

        self.push_to_renderer(&elements, &view_state, true).await;
        if select {
            self.select_elements(Some(new_ids.clone())).await;
        }
        new_ids
    }

    /// Apply edit operations in order against live ids, then
    /// re-normalize so healed references and bound-text positions stay
    /// valid.
    pub async fn edit_by_operations(&self, operations: &[SceneOperation]) {
        let mut values: Vec<Value> = {
            let state = self.state.lock().unwrap();
            state
                .doc
                .elements
                .iter()
                .map(|e| serde_json::to_value(e).expect("element serializes"))
                .collect()
        };

        for operation in operations {
            apply_operation(&mut values, operation);
        }

        let mut elements = normalize(&values);
        self.run_renderer_pass(&mut elements);

        let view_state = {
            let mut state = self.state.lock().unwrap();
            state.doc.elements = elements.clone();
            state.doc.view_state.clone()
        };

        self.push_to_renderer(&elements, &view_state, true).await;
    }

    /// Set renderer selection; a selection identical to the current
    /// one is skipped to avoid redundant renderer churn.
    pub async fn select_elements(&self, ids: Option<Vec<String>>) {
        let ids = ids.unwrap_or_default();
        {
            let mut state = self.state.lock().unwrap();
            if state.selection == ids {
                debug!("selection unchanged, skipping");
                return;
            }
            state.selection = ids.clone();
        }

        let renderer = self.renderer.lock().unwrap().clone();
        if let Some(renderer) = renderer {
            if let Err(e) = renderer.set_selection(&ids).await {
                warn!(error = %e, "selection update failed");
            }
        }
    }

    /// Export the scene (or a caller-supplied subset) to a vector
    /// snapshot. An empty element set yields `None` rather than an
    /// empty artifact.
    pub async fn get_thumbnail_svg(&self, subset: Option<Vec<Element>>) -> Option<String> {
        let elements =
            subset.unwrap_or_else(|| self.state.lock().unwrap().doc.elements.clone());
        if elements.is_empty() {
            return None;
        }

        let renderer = self.renderer.lock().unwrap().clone()?;
        match timeout(THUMBNAIL_TIMEOUT, renderer.export_svg(&elements)).await {
            Ok(Ok(svg)) => Some(svg),
            Ok(Err(e)) => {
                warn!(error = %e, "svg export failed");
                None
            }
            Err(_) => {
                warn!("svg export timed out");
                None
            }
        }
    }

    /// Snapshot the current document into history. No-ops on an empty
    /// scene.
    pub fn commit_version(&self, is_manual: bool) {
        let mut state = self.state.lock().unwrap();
        if state.doc.elements.is_empty() {
            debug!("skipping history commit for empty scene");
            return;
        }
        let entry = HistoryEntry {
            timestamp: timestamp_ms(),
            is_manual,
            snapshot: state.doc.clone(),
            thumbnail: None,
            label: None,
        };
        state.history.commit(entry);
    }

    /// Re-hydrate the snapshot at `index` as the live document.
    pub async fn restore_version(&self, index: usize) -> bool {
        let (elements, view_state) = {
            let mut state = self.state.lock().unwrap();
            match state.history.restore(index) {
                Some(entry) => {
                    let doc = entry.snapshot.clone();
                    state.doc = doc.clone();
                    (doc.elements, doc.view_state)
                }
                None => return false,
            }
        };

        self.push_to_renderer(&elements, &view_state, false).await;
        true
    }

    pub fn delete_version(&self, index: usize) -> bool {
        self.state.lock().unwrap().history.delete(index)
    }

    pub fn clear_history(&self) {
        self.state.lock().unwrap().history.clear();
    }

    pub fn initialize_history(&self, entries: Vec<HistoryEntry<SceneDocument>>) {
        self.state.lock().unwrap().history.initialize_from(entries);
    }

    pub fn history_entries(&self) -> Vec<HistoryEntry<SceneDocument>> {
        self.state.lock().unwrap().history.entries().to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().unwrap().history.len()
    }

    pub fn document(&self) -> SceneDocument {
        self.state.lock().unwrap().doc.clone()
    }

    pub fn selection(&self) -> Vec<String> {
        self.state.lock().unwrap().selection.clone()
    }

    /// The renderer-assisted normalization pass, available only while
    /// a measuring renderer is attached.
    fn run_renderer_pass(&self, elements: &mut [Element]) {
        let renderer = self.renderer.lock().unwrap().clone();
        match renderer.as_ref().and_then(|r| r.text_measurer()) {
            Some(measurer) => refine(elements, measurer),
            None => reposition_bound_text(elements),
        }
    }

    async fn push_to_renderer(
        &self,
        elements: &[Element],
        view_state: &Map<String, Value>,
        commit_to_history: bool,
    ) {
        let renderer = self.renderer.lock().unwrap().clone();
        if let Some(renderer) = renderer {
            if let Err(e) = renderer
                .update_scene(elements, view_state, commit_to_history)
                .await
            {
                warn!(error = %e, "renderer rejected scene update");
            }
        }
    }
}

/// Engine defaults for the view-state; caller-supplied fields overlay
/// these so an absent field never erases a default.
fn default_view_state() -> Map<String, Value> {
    let mut view_state = Map::new();
    view_state.insert("viewBackgroundColor".to_string(), Value::from("#ffffff"));
    view_state.insert("scrollX".to_string(), Value::from(0.0));
    view_state.insert("scrollY".to_string(), Value::from(0.0));
    view_state.insert("zoom".to_string(), serde_json::json!({ "value": 1.0 }));
    view_state.insert("gridSize".to_string(), Value::Null);
    view_state.insert("theme".to_string(), Value::from("light"));
    view_state
}

fn apply_operation(values: &mut Vec<Value>, operation: &SceneOperation) {
    match operation {
        SceneOperation::ReplaceElements { elements } => {
            for element in elements {
                let Some(id) = element.get("id").and_then(Value::as_str) else {
                    warn!("replace operation without id, skipping entry");
                    continue;
                };
                match values
                    .iter_mut()
                    .find(|v| v.get("id").and_then(Value::as_str) == Some(id))
                {
                    Some(existing) => *existing = element.clone(),
                    None => {
                        warn!(id, "replace target not found, inserting as new element");
                        values.push(element.clone());
                    }
                }
            }
        }

        SceneOperation::PatchElements { patches } => {
            for patch in patches {
                let Some(obj) = patch.as_object() else {
                    warn!("patch operation entry is not an object, skipping");
                    continue;
                };
                let Some(id) = obj.get("id").and_then(Value::as_str) else {
                    warn!("patch operation without id, skipping entry");
                    continue;
                };
                match values
                    .iter_mut()
                    .find(|v| v.get("id").and_then(Value::as_str) == Some(id))
                {
                    Some(Value::Object(existing)) => {
                        for (key, value) in obj {
                            existing.insert(key.clone(), value.clone());
                        }
                    }
                    _ => values.push(patch.clone()),
                }
            }
        }

        SceneOperation::DeleteElements { ids } => {
            values.retain(|v| {
                v.get("id")
                    .and_then(Value::as_str)
                    .map(|id| !ids.iter().any(|d| d == id))
                    .unwrap_or(true)
            });
        }
    }
}

/// Rewrite an element's id and every internal self-reference through
/// the old-id→new-id map.
fn remap_ids(element: &mut Element, id_map: &HashMap<String, String>) {
    let base = element.base_mut();
    if let Some(new_id) = id_map.get(&base.id) {
        base.id = new_id.clone();
    }
    if let Some(frame_id) = &base.frame_id {
        if let Some(new_id) = id_map.get(frame_id) {
            base.frame_id = Some(new_id.clone());
        }
    }
    if let Some(bound) = &mut base.bound_elements {
        for entry in bound {
            if let Some(new_id) = id_map.get(&entry.id) {
                entry.id = new_id.clone();
            }
        }
    }

    match element {
        Element::Text(text) => {
            if let Some(container_id) = &text.container_id {
                if let Some(new_id) = id_map.get(container_id) {
                    text.container_id = Some(new_id.clone());
                }
            }
        }
        Element::Arrow(linear) | Element::Line(linear) => {
            for binding in [&mut linear.start_binding, &mut linear.end_binding]
                .into_iter()
                .flatten()
            {
                if let Some(new_id) = id_map.get(&binding.element_id) {
                    binding.element_id = new_id.clone();
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_scene_normalizes_aliases() {
        let engine = SceneEngine::new();
        engine
            .set_scene(
                SceneUpdate {
                    elements: vec![json!({"type": "circle", "x": 0, "y": 0, "width": 50, "height": 50})],
                    ..Default::default()
                },
                SetSceneOptions::default(),
            )
            .await;

        let doc = engine.document();
        assert_eq!(doc.elements.len(), 1);
        assert!(matches!(doc.elements[0], Element::Ellipse(_)));
    }

    #[tokio::test]
    async fn test_view_state_overlays_defaults() {
        let engine = SceneEngine::new();
        let mut view_state = Map::new();
        view_state.insert("viewBackgroundColor".to_string(), Value::from("#000000"));

        engine
            .set_scene(
                SceneUpdate {
                    elements: vec![json!({"type": "rectangle"})],
                    view_state,
                    ..Default::default()
                },
                SetSceneOptions::default(),
            )
            .await;

        let doc = engine.document();
        assert_eq!(doc.view_state["viewBackgroundColor"], "#000000");
        // absent fields keep their defaults
        assert_eq!(doc.view_state["theme"], "light");
    }

    #[tokio::test]
    async fn test_empty_scene_clears_assets() {
        let engine = SceneEngine::new();
        let mut assets = BTreeMap::new();
        assets.insert(
            "f1".to_string(),
            AssetBlob {
                mime_type: "image/png".to_string(),
                data_url: "data:...".to_string(),
                created: 1,
            },
        );
        engine
            .set_scene(
                SceneUpdate {
                    elements: vec![json!({"type": "rectangle"})],
                    assets,
                    ..Default::default()
                },
                SetSceneOptions::default(),
            )
            .await;
        assert_eq!(engine.document().assets.len(), 1);

        engine
            .set_scene(SceneUpdate::default(), SetSceneOptions::default())
            .await;
        assert!(engine.document().assets.is_empty());
    }

    #[tokio::test]
    async fn test_append_remaps_colliding_ids() {
        let engine = SceneEngine::new();
        engine
            .set_scene(
                SceneUpdate {
                    elements: vec![json!({"type": "rectangle", "id": "a"})],
                    ..Default::default()
                },
                SetSceneOptions::default(),
            )
            .await;

        let new_ids = engine
            .append_elements(
                &[
                    json!({"type": "rectangle", "id": "a"}),
                    json!({"type": "text", "id": "t", "text": "hi", "containerId": "a"}),
                ],
                false,
            )
            .await;

        assert_eq!(new_ids.len(), 2);
        let doc = engine.document();
        assert_eq!(doc.elements.len(), 3);

        // all ids unique across the merged result
        let mut ids: Vec<&str> = doc.elements.iter().map(|e| e.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);

        // the self-reference followed the remapping
        let text = doc.elements[2].as_text().unwrap();
        assert_eq!(text.container_id.as_deref(), Some(new_ids[0].as_str()));
        assert_ne!(new_ids[0], "a");
    }

    #[tokio::test]
    async fn test_edit_operations_apply_in_order() {
        let engine = SceneEngine::new();
        engine
            .set_scene(
                SceneUpdate {
                    elements: vec![
                        json!({"type": "rectangle", "id": "a", "x": 0}),
                        json!({"type": "rectangle", "id": "b"}),
                    ],
                    ..Default::default()
                },
                SetSceneOptions::default(),
            )
            .await;

        engine
            .edit_by_operations(&[
                SceneOperation::PatchElements {
                    patches: vec![json!({"id": "a", "x": 42})],
                },
                SceneOperation::DeleteElements {
                    ids: vec!["b".to_string()],
                },
            ])
            .await;

        let doc = engine.document();
        assert_eq!(doc.elements.len(), 1);
        assert_eq!(doc.elements[0].id(), "a");
        assert_eq!(doc.elements[0].base().x, 42.0);
    }

    #[tokio::test]
    async fn test_patch_inserts_when_absent() {
        let engine = SceneEngine::new();
        engine
            .edit_by_operations(&[SceneOperation::PatchElements {
                patches: vec![json!({"id": "new", "type": "ellipse"})],
            }])
            .await;

        let doc = engine.document();
        assert_eq!(doc.elements.len(), 1);
        assert!(matches!(doc.elements[0], Element::Ellipse(_)));
    }

    #[tokio::test]
    async fn test_delete_heals_dangling_references() {
        let engine = SceneEngine::new();
        engine
            .set_scene(
                SceneUpdate {
                    elements: vec![
                        json!({"type": "rectangle", "id": "box"}),
                        json!({"type": "text", "id": "t", "text": "x", "containerId": "box"}),
                    ],
                    ..Default::default()
                },
                SetSceneOptions::default(),
            )
            .await;

        engine
            .edit_by_operations(&[SceneOperation::DeleteElements {
                ids: vec!["box".to_string()],
            }])
            .await;

        let doc = engine.document();
        assert_eq!(doc.elements.len(), 1);
        assert_eq!(doc.elements[0].as_text().unwrap().container_id, None);
    }

    #[tokio::test]
    async fn test_commit_version_skips_empty_scene() {
        let engine = SceneEngine::new();
        engine.commit_version(true);
        assert_eq!(engine.history_len(), 0);
    }

    #[tokio::test]
    async fn test_restore_rehydrates_snapshot() {
        let engine = SceneEngine::new();
        engine
            .set_scene(
                SceneUpdate {
                    elements: vec![json!({"type": "rectangle", "id": "a"})],
                    ..Default::default()
                },
                SetSceneOptions::default(),
            )
            .await;
        engine.commit_version(true);

        engine
            .edit_by_operations(&[SceneOperation::DeleteElements {
                ids: vec!["a".to_string()],
            }])
            .await;
        assert!(engine.document().elements.is_empty());

        assert!(engine.restore_version(0).await);
        assert_eq!(engine.document().elements.len(), 1);
    }

    #[tokio::test]
    async fn test_thumbnail_of_empty_scene_is_none() {
        let engine = SceneEngine::new();
        assert_eq!(engine.get_thumbnail_svg(None).await, None);
        assert_eq!(engine.get_thumbnail_svg(Some(vec![])).await, None);
    }
}
