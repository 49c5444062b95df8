//! # Scene Elements
//!
//! Closed sum type over the shape kinds the scene renderer understands.
//!
//! Every variant shares an [`ElementBase`] (geometry, styling, identity
//! metadata, relational references); type-specific fields live on the
//! variant payloads. The serialized form is internally tagged on
//! `"type"` so a scene document round-trips through the renderer's JSON
//! wire format unchanged.

use serde::{Deserialize, Serialize};

/// Fields shared by every element kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementBase {
    /// Unique within the containing document.
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rotation in radians.
    pub angle: f64,
    pub stroke_color: String,
    pub background_color: String,
    pub fill_style: String,
    pub stroke_width: f64,
    pub stroke_style: String,
    pub roughness: f64,
    /// 0..=100.
    pub opacity: f64,
    pub group_ids: Vec<String>,
    /// Frame containing this element, if any. Must reference a live
    /// frame element or be `None`.
    pub frame_id: Option<String>,
    /// Seed for hand-drawn rendering jitter.
    pub seed: u64,
    pub version: u64,
    pub version_nonce: u64,
    /// Last-updated wall clock, milliseconds.
    pub updated: i64,
    pub is_deleted: bool,
    pub locked: bool,
    #[serde(default)]
    pub link: Option<String>,
    /// Back-references to elements bound to this one (text labels,
    /// attached arrows).
    #[serde(default)]
    pub bound_elements: Option<Vec<BoundElementRef>>,
}

/// Back-reference entry in `bound_elements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundElementRef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Arrow endpoint binding to another element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointBinding {
    pub element_id: String,
    pub focus: f64,
    pub gap: f64,
}

/// Rectangle / ellipse / diamond payload. Nothing beyond the base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeElement {
    #[serde(flatten)]
    pub base: ElementBase,
}

/// Arrow and line payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearElement {
    #[serde(flatten)]
    pub base: ElementBase,
    /// Path points relative to `(x, y)`. Never empty.
    pub points: Vec<[f64; 2]>,
    #[serde(default)]
    pub start_binding: Option<PointBinding>,
    #[serde(default)]
    pub end_binding: Option<PointBinding>,
    #[serde(default)]
    pub start_arrowhead: Option<String>,
    #[serde(default)]
    pub end_arrowhead: Option<String>,
}

/// Text payload. May be bound to a container via `container_id`, in
/// which case its position is derived, never authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub text: String,
    /// The text as originally authored, before any wrapping applied by
    /// the renderer.
    pub original_text: String,
    pub font_size: f64,
    pub font_family: u32,
    /// left | center | right
    pub text_align: String,
    /// top | middle | bottom
    pub vertical_align: String,
    #[serde(default)]
    pub container_id: Option<String>,
    pub line_height: f64,
}

/// Frame payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameElement {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub name: Option<String>,
}

/// Image payload. `file_id` points into the document's asset map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageElement {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub file_id: Option<String>,
    /// pending | saved | error
    pub status: String,
    pub scale: [f64; 2],
}

/// Freeform-path payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreedrawElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub points: Vec<[f64; 2]>,
    pub pressures: Vec<f64>,
    pub simulate_pressure: bool,
}

/// A scene element. Tagged on `"type"` in the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Rectangle(ShapeElement),
    Ellipse(ShapeElement),
    Diamond(ShapeElement),
    Arrow(LinearElement),
    Line(LinearElement),
    Text(TextElement),
    Frame(FrameElement),
    Image(ImageElement),
    Freedraw(FreedrawElement),
}

/// The canonical element kinds, used by the normalizer's alias table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Rectangle,
    Ellipse,
    Diamond,
    Arrow,
    Line,
    Text,
    Frame,
    Image,
    Freedraw,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Rectangle => "rectangle",
            ElementKind::Ellipse => "ellipse",
            ElementKind::Diamond => "diamond",
            ElementKind::Arrow => "arrow",
            ElementKind::Line => "line",
            ElementKind::Text => "text",
            ElementKind::Frame => "frame",
            ElementKind::Image => "image",
            ElementKind::Freedraw => "freedraw",
        }
    }
}

impl Element {
    pub fn base(&self) -> &ElementBase {
        match self {
            Element::Rectangle(e) | Element::Ellipse(e) | Element::Diamond(e) => &e.base,
            Element::Arrow(e) | Element::Line(e) => &e.base,
            Element::Text(e) => &e.base,
            Element::Frame(e) => &e.base,
            Element::Image(e) => &e.base,
            Element::Freedraw(e) => &e.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ElementBase {
        match self {
            Element::Rectangle(e) | Element::Ellipse(e) | Element::Diamond(e) => &mut e.base,
            Element::Arrow(e) | Element::Line(e) => &mut e.base,
            Element::Text(e) => &mut e.base,
            Element::Frame(e) => &mut e.base,
            Element::Image(e) => &mut e.base,
            Element::Freedraw(e) => &mut e.base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Rectangle(_) => ElementKind::Rectangle,
            Element::Ellipse(_) => ElementKind::Ellipse,
            Element::Diamond(_) => ElementKind::Diamond,
            Element::Arrow(_) => ElementKind::Arrow,
            Element::Line(_) => ElementKind::Line,
            Element::Text(_) => ElementKind::Text,
            Element::Frame(_) => ElementKind::Frame,
            Element::Image(_) => ElementKind::Image,
            Element::Freedraw(_) => ElementKind::Freedraw,
        }
    }

    pub fn as_text(&self) -> Option<&TextElement> {
        match self {
            Element::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextElement> {
        match self {
            Element::Text(t) => Some(t),
            _ => None,
        }
    }
}
