//! # Editor Session
//!
//! One session owns both engines and the active-engine pointer.
//! Collaborators never hold an engine directly; they ask the session
//! which engine is live and go through that handle.
//!
//! ## Engine switch
//!
//! Switching is two-phase: the pointer flips to the target immediately
//! (UI collaborators can start rendering the target surface before its
//! widget finishes mounting), then the call awaits the target's fresh
//! readiness signal under a fixed timeout. The target's ready flag is
//! reset up front so a stale signal from a prior mount cannot satisfy
//! the wait. On timeout the pointer stays at the target: the switch
//! was requested but not confirmed, and no rollback is attempted.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::errors::SwitchError;
use crate::graph_engine::GraphEngine;
use crate::scene_engine::SceneEngine;

/// Bound on awaiting the target engine's readiness during a switch.
pub const SWITCH_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Which document engine is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineId {
    Graph,
    Scene,
}

/// The live engine, as handed out by [`EditorSession::active_engine`].
#[derive(Clone)]
pub enum EngineHandle {
    Graph(Arc<GraphEngine>),
    Scene(Arc<SceneEngine>),
}

impl EngineHandle {
    pub fn id(&self) -> EngineId {
        match self {
            EngineHandle::Graph(_) => EngineId::Graph,
            EngineHandle::Scene(_) => EngineId::Scene,
        }
    }
}

enum SwitchPhase {
    Idle,
    Switching { target: EngineId },
}

struct SessionState {
    active: EngineId,
    phase: SwitchPhase,
}

/// Owner of both engines and the switch state machine.
pub struct EditorSession {
    graph: Arc<GraphEngine>,
    scene: Arc<SceneEngine>,
    state: Mutex<SessionState>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EngineId::Graph)
    }
}

impl EditorSession {
    pub fn new(active: EngineId) -> Self {
        Self {
            graph: Arc::new(GraphEngine::new()),
            scene: Arc::new(SceneEngine::new()),
            state: Mutex::new(SessionState {
                active,
                phase: SwitchPhase::Idle,
            }),
        }
    }

    pub fn graph_engine(&self) -> Arc<GraphEngine> {
        Arc::clone(&self.graph)
    }

    pub fn scene_engine(&self) -> Arc<SceneEngine> {
        Arc::clone(&self.scene)
    }

    /// Which engine the pointer names right now. During a pending
    /// switch this is already the target.
    pub fn active_engine_id(&self) -> EngineId {
        self.state.lock().unwrap().active
    }

    pub fn is_switching(&self) -> bool {
        matches!(
            self.state.lock().unwrap().phase,
            SwitchPhase::Switching { .. }
        )
    }

    /// The single entry point collaborators use to reach an engine.
    /// Callers that must not operate mid-switch await [`switch_to`]
    /// first.
    ///
    /// [`switch_to`]: EditorSession::switch_to
    pub fn active_engine(&self) -> EngineHandle {
        match self.active_engine_id() {
            EngineId::Graph => EngineHandle::Graph(Arc::clone(&self.graph)),
            EngineId::Scene => EngineHandle::Scene(Arc::clone(&self.scene)),
        }
    }

    /// Switch the active engine to `target` and wait for its renderer
    /// to confirm readiness.
    ///
    /// A same-target request while idle is a no-op. A request while
    /// another switch is pending is rejected. On timeout the pointer
    /// is left at `target` and the error names the engine that never
    /// confirmed.
    pub async fn switch_to(&self, target: EngineId) -> Result<(), SwitchError> {
        {
            let mut state = self.state.lock().unwrap();
            if let SwitchPhase::Switching { target: pending } = state.phase {
                warn!(?pending, ?target, "switch requested while another is pending");
                return Err(SwitchError::AlreadySwitching);
            }
            if state.active == target {
                debug!(?target, "already active, switch is a no-op");
                return Ok(());
            }
            state.phase = SwitchPhase::Switching { target };
            state.active = target;
        }

        // A stale ready signal from a prior mount must not satisfy the
        // wait below.
        let mut ready = match target {
            EngineId::Graph => {
                self.graph.reset_ready();
                self.graph.ready_signal()
            }
            EngineId::Scene => {
                self.scene.reset_ready();
                self.scene.ready_signal()
            }
        };

        let confirmed = timeout(SWITCH_TIMEOUT, async {
            while !*ready.borrow_and_update() {
                if ready.changed().await.is_err() {
                    return false;
                }
            }
            true
        })
        .await;

        self.state.lock().unwrap().phase = SwitchPhase::Idle;

        match confirmed {
            Ok(true) => {
                debug!(?target, "engine switch confirmed");
                Ok(())
            }
            _ => {
                warn!(?target, "engine switch not confirmed in time");
                Err(SwitchError::Timeout(target))
            }
        }
    }
}
