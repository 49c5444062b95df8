//! End-to-end tests over the public surface: mock renderer surfaces
//! driving both engines and the session switch coordinator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use easel_editor::{
    DiagramSurface, EditorSession, Element, EngineId, GraphEngine, GraphModel, GraphPatch,
    RendererError, SceneEngine, SceneOperation, SceneSurface, SceneUpdate, SetSceneOptions,
    SwitchError, AUTOMATIC_HISTORY_LIMIT,
};
use easel_scene::TextMeasurer;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// ---------------------------------------------------------------------
// Mock surfaces

#[derive(Default)]
struct RecordingDiagramSurface {
    loads: Mutex<Vec<String>>,
    export_delay: Option<Duration>,
    exports: AtomicUsize,
}

#[async_trait]
impl DiagramSurface for RecordingDiagramSurface {
    async fn load_xml(&self, xml: &str) -> Result<(), RendererError> {
        self.loads.lock().unwrap().push(xml.to_string());
        Ok(())
    }

    async fn export(&self, xml: &str) -> Result<String, RendererError> {
        if let Some(delay) = self.export_delay {
            tokio::time::sleep(delay).await;
        }
        self.exports.fetch_add(1, Ordering::SeqCst);
        Ok(format!("artifact-{}", xml.len()))
    }
}

struct CharGridMeasurer;

impl TextMeasurer for CharGridMeasurer {
    fn measure(&self, text: &str, font_size: f64, _font_family: u32) -> (f64, f64) {
        // non-integral width marks the measurement as renderer-made
        (text.len() as f64 * font_size * 0.6 + 0.5, font_size * 1.25)
    }
}

#[derive(Default)]
struct RecordingSceneSurface {
    /// `(element_count, commit_to_history)` per scene push.
    updates: Mutex<Vec<(usize, bool)>>,
    selections: Mutex<Vec<Vec<String>>>,
    measurer: Option<CharGridMeasurer>,
}

#[async_trait]
impl SceneSurface for RecordingSceneSurface {
    async fn update_scene(
        &self,
        elements: &[Element],
        _view_state: &Map<String, Value>,
        commit_to_history: bool,
    ) -> Result<(), RendererError> {
        self.updates
            .lock()
            .unwrap()
            .push((elements.len(), commit_to_history));
        Ok(())
    }

    async fn set_selection(&self, ids: &[String]) -> Result<(), RendererError> {
        self.selections.lock().unwrap().push(ids.to_vec());
        Ok(())
    }

    async fn export_svg(&self, elements: &[Element]) -> Result<String, RendererError> {
        Ok(format!("<svg data-count=\"{}\"/>", elements.len()))
    }

    fn text_measurer(&self) -> Option<&dyn TextMeasurer> {
        self.measurer.as_ref().map(|m| m as &dyn TextMeasurer)
    }
}

const DOC: &str = r#"<mxGraphModel><root><mxCell id="0"/><mxCell id="1" parent="0"/><mxCell id="2" value="A" vertex="1" parent="1"/></root></mxGraphModel>"#;

// ---------------------------------------------------------------------
// Scene engine through the renderer surface

#[tokio::test]
async fn test_alias_types_reach_renderer_normalized() {
    init_tracing();
    let engine = SceneEngine::new();
    let surface = Arc::new(RecordingSceneSurface::default());
    engine.attach_renderer(surface.clone());
    engine.on_renderer_ready();

    engine
        .set_scene(
            SceneUpdate {
                elements: vec![
                    json!({"type": "circle", "width": 40, "height": 40}),
                    json!({"type": "box"}),
                    json!({"type": "label", "text": "hey"}),
                ],
                ..Default::default()
            },
            SetSceneOptions::default(),
        )
        .await;

    let doc = engine.document();
    let kinds: Vec<_> = doc
        .elements
        .iter()
        .map(|e| format!("{:?}", e.kind()))
        .collect();
    assert_eq!(kinds, ["Ellipse", "Rectangle", "Text"]);
    assert_eq!(*surface.updates.lock().unwrap(), vec![(3, false)]);
}

#[tokio::test]
async fn test_skip_apply_never_touches_renderer() {
    let engine = SceneEngine::new();
    let surface = Arc::new(RecordingSceneSurface::default());
    engine.attach_renderer(surface.clone());

    engine
        .set_scene(
            SceneUpdate {
                elements: vec![json!({"type": "rectangle"})],
                ..Default::default()
            },
            SetSceneOptions {
                skip_apply: true,
                commit_to_history: false,
            },
        )
        .await;

    assert_eq!(engine.document().elements.len(), 1);
    assert!(surface.updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_repeated_appends_never_collide() {
    let engine = SceneEngine::new();
    let payload = vec![
        json!({"type": "rectangle", "id": "gen-1"}),
        json!({"type": "arrow", "id": "gen-2"}),
    ];

    let mut all_ids = Vec::new();
    for _ in 0..5 {
        all_ids.extend(engine.append_elements(&payload, false).await);
    }

    assert_eq!(all_ids.len(), 10);
    let mut deduped = all_ids.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), 10, "appended ids must be globally unique");

    let doc = engine.document();
    assert_eq!(doc.elements.len(), 10);
    assert!(doc.elements.iter().all(|e| e.id() != "gen-1"));
}

#[tokio::test]
async fn test_append_commits_to_renderer_history_and_selects() {
    let engine = SceneEngine::new();
    let surface = Arc::new(RecordingSceneSurface::default());
    engine.attach_renderer(surface.clone());

    let ids = engine
        .append_elements(&[json!({"type": "diamond"})], true)
        .await;

    assert_eq!(*surface.updates.lock().unwrap(), vec![(1, true)]);
    assert_eq!(*surface.selections.lock().unwrap(), vec![ids]);
}

#[tokio::test]
async fn test_bound_text_positioned_with_live_measurer() {
    let engine = SceneEngine::new();
    let surface = Arc::new(RecordingSceneSurface {
        measurer: Some(CharGridMeasurer),
        ..Default::default()
    });
    engine.attach_renderer(surface);

    engine
        .set_scene(
            SceneUpdate {
                elements: vec![
                    json!({"type": "rectangle", "id": "box", "x": 10, "y": 10, "width": 100, "height": 40}),
                    json!({"type": "text", "id": "t", "text": "hi", "containerId": "box"}),
                ],
                ..Default::default()
            },
            SetSceneOptions::default(),
        )
        .await;

    let doc = engine.document();
    let text = doc.elements[1].as_text().unwrap();
    // left/top alignment inside the padded container interior
    assert_eq!(doc.elements[1].base().x, 15.0);
    assert_eq!(doc.elements[1].base().y, 15.0);
    // dimensions come from the renderer's measurement
    assert!(doc.elements[1].base().width.fract() != 0.0);
    assert_eq!(text.container_id.as_deref(), Some("box"));
}

#[tokio::test]
async fn test_edit_operations_heal_after_container_delete() {
    let engine = SceneEngine::new();
    engine
        .set_scene(
            SceneUpdate {
                elements: vec![
                    json!({"type": "rectangle", "id": "box"}),
                    json!({"type": "text", "id": "t", "text": "x", "containerId": "box"}),
                    json!({"type": "arrow", "id": "edge", "startBinding": {"elementId": "box", "focus": 0.0, "gap": 0.0}}),
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
    assert_eq!(doc.elements.len(), 2);
    assert_eq!(doc.elements[0].as_text().unwrap().container_id, None);
    match &doc.elements[1] {
        Element::Arrow(arrow) => assert!(arrow.start_binding.is_none()),
        other => panic!("expected arrow, got {:?}", other.kind()),
    }
}

#[tokio::test]
async fn test_identical_selection_skips_renderer() {
    let engine = SceneEngine::new();
    let surface = Arc::new(RecordingSceneSurface::default());
    engine.attach_renderer(surface.clone());

    let ids = vec!["a".to_string(), "b".to_string()];
    engine.select_elements(Some(ids.clone())).await;
    engine.select_elements(Some(ids)).await;

    assert_eq!(surface.selections.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_scene_thumbnail_of_subset() {
    let engine = SceneEngine::new();
    let surface = Arc::new(RecordingSceneSurface::default());
    engine.attach_renderer(surface);

    engine
        .set_scene(
            SceneUpdate {
                elements: vec![
                    json!({"type": "rectangle", "id": "a"}),
                    json!({"type": "rectangle", "id": "b"}),
                ],
                ..Default::default()
            },
            SetSceneOptions::default(),
        )
        .await;

    let full = engine.get_thumbnail_svg(None).await.unwrap();
    assert_eq!(full, "<svg data-count=\"2\"/>");

    let subset = engine.document().elements[..1].to_vec();
    let partial = engine.get_thumbnail_svg(Some(subset)).await.unwrap();
    assert_eq!(partial, "<svg data-count=\"1\"/>");
}

// ---------------------------------------------------------------------
// Graph engine through the renderer surface

#[tokio::test]
async fn test_load_defers_until_renderer_ready() {
    init_tracing();
    let engine = GraphEngine::new();
    let surface = Arc::new(RecordingDiagramSurface::default());
    engine.attach_renderer(surface.clone());

    engine.load(DOC, false).await.unwrap();
    assert!(surface.loads.lock().unwrap().is_empty());

    engine.on_renderer_ready().await;
    let loads = surface.loads.lock().unwrap();
    assert_eq!(loads.len(), 1);
    assert!(loads[0].contains(r#"value="A""#));
}

#[tokio::test]
async fn test_cascade_delete_reaches_renderer() {
    let engine = GraphEngine::new();
    let surface = Arc::new(RecordingDiagramSurface::default());
    engine.attach_renderer(surface.clone());
    engine.on_renderer_ready().await;

    engine.load(DOC, false).await.unwrap();
    engine
        .apply_patch(&[
            GraphPatch::Add {
                id: "3".to_string(),
                fragment: r#"<mxCell vertex="1" parent="2"/>"#.to_string(),
            },
            GraphPatch::Add {
                id: "4".to_string(),
                fragment: r#"<mxCell edge="1" source="3" target="2"/>"#.to_string(),
            },
        ])
        .await
        .unwrap();
    engine
        .apply_patch(&[GraphPatch::Delete { id: "2".to_string() }])
        .await
        .unwrap();

    let final_xml = surface.loads.lock().unwrap().last().unwrap().clone();
    let model = GraphModel::parse(&final_xml).unwrap();
    // node, its descendant, and the edge touching them are all gone
    assert!(!model.contains("2"));
    assert!(!model.contains("3"));
    assert!(!model.contains("4"));
    assert!(model.contains("1"));
}

#[tokio::test]
async fn test_thumbnail_round_trip() {
    let engine = GraphEngine::new();
    let surface = Arc::new(RecordingDiagramSurface::default());
    engine.attach_renderer(surface.clone());
    engine.on_renderer_ready().await;
    engine.load(DOC, false).await.unwrap();

    let artifact = engine.request_thumbnail().await.unwrap();
    assert!(artifact.starts_with("artifact-"));
    assert_eq!(engine.last_artifact(), Some(artifact));
    assert_eq!(surface.exports.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_thumbnail_times_out_against_slow_renderer() {
    let engine = GraphEngine::new();
    let surface = Arc::new(RecordingDiagramSurface {
        export_delay: Some(Duration::from_secs(30)),
        ..Default::default()
    });
    engine.attach_renderer(surface);
    engine.on_renderer_ready().await;
    engine.load(DOC, false).await.unwrap();

    assert_eq!(engine.request_thumbnail().await, None);
}

// ---------------------------------------------------------------------
// History retention across a realistic editing run

#[tokio::test]
async fn test_graph_history_retention_under_churn() {
    let engine = GraphEngine::new();
    engine.load(DOC, false).await.unwrap();

    // genesis snapshot, then heavy automatic churn
    engine.commit_version(false);
    let genesis = engine.history_entries()[0].timestamp;
    for i in 0..24 {
        engine
            .apply_patch(&[GraphPatch::Update {
                id: "2".to_string(),
                fragment: format!(r#"<mxCell value="rev-{i}" vertex="1"/>"#),
            }])
            .await
            .unwrap();
        engine.commit_version(false);
    }
    // manual saves ride along uncapped
    engine.commit_version(true);
    engine.commit_version(true);

    let entries = engine.history_entries();
    let automatic = entries.iter().filter(|e| !e.is_manual).count();
    let manual = entries.iter().filter(|e| e.is_manual).count();
    assert_eq!(automatic, AUTOMATIC_HISTORY_LIMIT);
    assert_eq!(manual, 2);
    assert_eq!(entries[0].timestamp, genesis, "genesis snapshot survives");
    assert!(entries.last().unwrap().snapshot.contains("rev-23"));
}

#[tokio::test]
async fn test_history_round_trip_through_persistence() -> anyhow::Result<()> {
    let engine = GraphEngine::new();
    engine.load(DOC, false).await?;
    engine.commit_version(true);

    // the persistence collaborator serializes and re-seeds
    let serialized = serde_json::to_string(&engine.history_entries())?;
    let other = GraphEngine::new();
    other.initialize_history(serde_json::from_str(&serialized)?);

    assert_eq!(other.history_len(), 1);
    assert!(other.restore_version(0).await);
    assert!(other.current_text().contains(r#"value="A""#));
    Ok(())
}

// ---------------------------------------------------------------------
// Session switching

#[tokio::test]
async fn test_switch_confirms_on_fresh_readiness() {
    init_tracing();
    let session = Arc::new(EditorSession::new(EngineId::Graph));

    let pending = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.switch_to(EngineId::Scene).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(session.active_engine_id(), EngineId::Scene);

    session.scene_engine().on_renderer_ready();
    pending.await.unwrap().unwrap();
    assert!(!session.is_switching());
}

#[tokio::test(start_paused = true)]
async fn test_switch_timeout_leaves_pointer_at_target() {
    let session = EditorSession::new(EngineId::Scene);

    let err = session.switch_to(EngineId::Graph).await.unwrap_err();
    assert_eq!(err, SwitchError::Timeout(EngineId::Graph));
    assert_eq!(session.active_engine_id(), EngineId::Graph);

    // the session is usable again after the failed switch
    session.graph_engine().on_renderer_ready().await;
    session.switch_to(EngineId::Graph).await.unwrap();
}

#[tokio::test]
async fn test_engines_are_isolated_across_switches() {
    let session = EditorSession::new(EngineId::Graph);

    session.graph_engine().load(DOC, false).await.unwrap();
    session.graph_engine().commit_version(true);
    session
        .scene_engine()
        .set_scene(
            SceneUpdate {
                elements: vec![json!({"type": "rectangle"})],
                ..Default::default()
            },
            SetSceneOptions::default(),
        )
        .await;
    session.scene_engine().commit_version(true);

    assert_eq!(session.graph_engine().history_len(), 1);
    assert_eq!(session.scene_engine().history_len(), 1);
    session.scene_engine().clear_history();
    assert_eq!(session.graph_engine().history_len(), 1, "histories never shared");
}
