//! # Easel Scene Model
//!
//! The scene-graph half of the dual-backend document engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ element: closed sum type over shape kinds   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ normalize: loose JSON → structurally valid  │
//! │  - alias table + defaults, never fails      │
//! │  - id uniqueness, dangling refs healed      │
//! │  - pre-existing identity metadata preserved │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ layout: container-bound text placement      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Normalization is total**: any JSON list in, valid elements out
//! 2. **Heal, don't reject**: broken references are cleared, not errors
//! 3. **Renderer authority on text metrics**: measured sizes win over
//!    caller-supplied ones

mod element;
mod layout;
mod normalize;

pub use element::{
    BoundElementRef, Element, ElementBase, ElementKind, FrameElement, FreedrawElement,
    ImageElement, LinearElement, PointBinding, ShapeElement, TextElement,
};
pub use layout::{position_bound_text, BOUND_TEXT_PADDING};
pub use normalize::{is_renderer_authored, normalize, refine, reposition_bound_text, TextMeasurer};
