//! # Element Normalizer
//!
//! Turns a loosely-typed list of visual elements into a fully-specified
//! one the scene renderer can always accept.
//!
//! ## Design Principles
//!
//! 1. **Total**: never fails; non-object entries are dropped, every
//!    other problem is healed with a documented default
//! 2. **Logged, not raised**: rewritten aliases and out-of-range fields
//!    produce a `warn!`, never an error
//! 3. **Identity-preserving**: an element the renderer already
//!    materialized keeps its version metadata so a pass-through is not
//!    mistaken for a fresh creation
//!
//! A second, renderer-assisted pass ([`refine`]) re-measures freshly
//! authored text and recomputes container-bound text positions; it only
//! runs when a live renderer provides a [`TextMeasurer`].

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::warn;

use easel_common::{
    coerce_bool, coerce_finite, coerce_opt_string, coerce_string, coerce_u64, fresh_id,
    fresh_nonce, fresh_seed, timestamp_ms,
};

use crate::element::{
    BoundElementRef, Element, ElementBase, ElementKind, FrameElement, FreedrawElement,
    ImageElement, LinearElement, PointBinding, ShapeElement, TextElement,
};
use crate::layout::position_bound_text;

const DEFAULT_STROKE_COLOR: &str = "#1e1e1e";
const DEFAULT_BACKGROUND_COLOR: &str = "transparent";
const DEFAULT_FILL_STYLE: &str = "solid";
const DEFAULT_STROKE_STYLE: &str = "solid";
const DEFAULT_STROKE_WIDTH: f64 = 2.0;
const DEFAULT_ROUGHNESS: f64 = 1.0;
const DEFAULT_OPACITY: f64 = 100.0;
const DEFAULT_SIZE: f64 = 100.0;
const DEFAULT_FONT_SIZE: f64 = 20.0;
const DEFAULT_FONT_FAMILY: u32 = 1;
const DEFAULT_LINE_HEIGHT: f64 = 1.25;
const DEFAULT_TEXT_ALIGN: &str = "left";
const DEFAULT_VERTICAL_ALIGN: &str = "top";

/// Measures text in renderer pixel space. Implemented by the attached
/// scene renderer; absent when running headless.
pub trait TextMeasurer: Send + Sync {
    /// Returns `(width, height)` of `text` at the given font settings.
    fn measure(&self, text: &str, font_size: f64, font_family: u32) -> (f64, f64);
}

/// Normalize a loose element list into structurally valid elements.
///
/// Pure and total: drops non-object entries, otherwise returns one
/// output element per input, each meeting the document invariants
/// (unique id, canonical kind, finite fields, no dangling references).
pub fn normalize(raw: &[Value]) -> Vec<Element> {
    let mut seen = HashSet::new();
    let mut elements: Vec<Element> = raw
        .iter()
        .filter_map(|value| normalize_one(value, &mut seen))
        .collect();

    heal_references(&mut elements);
    elements
}

/// Renderer-assisted second pass: measure freshly authored text, then
/// recompute the position of every container-bound text element.
/// Elements the renderer already authored keep their measured sizes.
pub fn refine(elements: &mut [Element], measurer: &dyn TextMeasurer) {
    for element in elements.iter_mut() {
        if let Element::Text(text) = element {
            if !is_renderer_authored(text) {
                let (width, height) = measurer.measure(&text.text, text.font_size, text.font_family);
                text.base.width = width;
                text.base.height = height;
            }
        }
    }

    reposition_bound_text(elements);
}

/// Recompute positions of container-bound text from live container
/// geometry. Dangling `container_id`s are cleared.
pub fn reposition_bound_text(elements: &mut [Element]) {
    let geometry: HashMap<String, ElementBase> = elements
        .iter()
        .filter(|e| !matches!(e, Element::Text(_)))
        .map(|e| (e.id().to_string(), e.base().clone()))
        .collect();

    for element in elements.iter_mut() {
        if let Element::Text(text) = element {
            let Some(container_id) = text.container_id.clone() else {
                continue;
            };
            match geometry.get(&container_id) {
                Some(container) => {
                    let (x, y) = position_bound_text(container, text);
                    text.base.x = x;
                    text.base.y = y;
                }
                None => {
                    warn!(%container_id, text_id = %text.base.id, "bound text container not found, clearing reference");
                    text.container_id = None;
                }
            }
        }
    }
}

/// Whether a text element carries a renderer-measured width. Measured
/// widths are fractional pixel values; authored ones are integral.
pub fn is_renderer_authored(text: &TextElement) -> bool {
    text.base.width.fract() != 0.0
}

fn normalize_one(value: &Value, seen: &mut HashSet<String>) -> Option<Element> {
    let obj = value.as_object()?;

    let kind = resolve_kind(obj.get("type"));
    let base = normalize_base(obj, kind, seen);

    let element = match kind {
        ElementKind::Rectangle => Element::Rectangle(ShapeElement { base }),
        ElementKind::Ellipse => Element::Ellipse(ShapeElement { base }),
        ElementKind::Diamond => Element::Diamond(ShapeElement { base }),
        ElementKind::Arrow => Element::Arrow(normalize_linear(obj, base, true)),
        ElementKind::Line => Element::Line(normalize_linear(obj, base, false)),
        ElementKind::Text => Element::Text(normalize_text(obj, base)),
        ElementKind::Frame => Element::Frame(FrameElement {
            name: coerce_opt_string(obj.get("name")),
            base,
        }),
        ElementKind::Image => Element::Image(normalize_image(obj, base)),
        ElementKind::Freedraw => Element::Freedraw(normalize_freedraw(obj, base)),
    };

    Some(element)
}

/// Resolve the element kind through the alias table. Unknown kinds
/// default to rectangle.
fn resolve_kind(raw: Option<&Value>) -> ElementKind {
    let name = match raw.and_then(Value::as_str) {
        Some(s) => s.trim().to_ascii_lowercase(),
        None => {
            warn!("element missing type, defaulting to rectangle");
            return ElementKind::Rectangle;
        }
    };

    let kind = match name.as_str() {
        "rectangle" => ElementKind::Rectangle,
        "ellipse" => ElementKind::Ellipse,
        "diamond" => ElementKind::Diamond,
        "arrow" => ElementKind::Arrow,
        "line" => ElementKind::Line,
        "text" => ElementKind::Text,
        "frame" => ElementKind::Frame,
        "image" => ElementKind::Image,
        "freedraw" => ElementKind::Freedraw,

        // aliases external generators commonly emit
        "circle" | "oval" => ElementKind::Ellipse,
        "square" | "box" | "rect" => ElementKind::Rectangle,
        "rhombus" => ElementKind::Diamond,
        "draw" | "pencil" => ElementKind::Freedraw,
        "label" => ElementKind::Text,

        other => {
            warn!(kind = other, "unknown element type, defaulting to rectangle");
            return ElementKind::Rectangle;
        }
    };

    if kind.as_str() != name {
        warn!(alias = %name, canonical = kind.as_str(), "rewrote element type alias");
    }
    kind
}

fn normalize_base(
    obj: &serde_json::Map<String, Value>,
    kind: ElementKind,
    seen: &mut HashSet<String>,
) -> ElementBase {
    let id = match coerce_opt_string(obj.get("id")).filter(|s| !s.is_empty()) {
        Some(id) if seen.contains(&id) => {
            warn!(id = %id, "duplicate element id, generating a fresh one");
            fresh_id()
        }
        Some(id) => id,
        None => fresh_id(),
    };
    seen.insert(id.clone());

    let font_size = coerce_finite(obj.get("fontSize"), DEFAULT_FONT_SIZE);
    let default_height = match kind {
        ElementKind::Text => font_size * DEFAULT_LINE_HEIGHT,
        _ => DEFAULT_SIZE,
    };

    let mut opacity = coerce_finite(obj.get("opacity"), DEFAULT_OPACITY);
    if !(0.0..=100.0).contains(&opacity) {
        warn!(id = %id, opacity, "opacity out of range, clamping");
        opacity = opacity.clamp(0.0, 100.0);
    }

    let pre_existing = is_pre_existing(obj, kind);
    let (version, version_nonce, updated) = if pre_existing {
        (
            coerce_u64(obj.get("version")).unwrap_or(1),
            coerce_u64(obj.get("versionNonce")).unwrap_or_else(fresh_nonce),
            obj.get("updated").and_then(Value::as_i64).unwrap_or_else(timestamp_ms),
        )
    } else {
        (1, fresh_nonce(), timestamp_ms())
    };

    ElementBase {
        id,
        x: coerce_finite(obj.get("x"), 0.0),
        y: coerce_finite(obj.get("y"), 0.0),
        width: coerce_finite(obj.get("width"), DEFAULT_SIZE).abs(),
        height: coerce_finite(obj.get("height"), default_height).abs(),
        angle: coerce_finite(obj.get("angle"), 0.0),
        stroke_color: coerce_string(obj.get("strokeColor"), DEFAULT_STROKE_COLOR),
        background_color: coerce_string(obj.get("backgroundColor"), DEFAULT_BACKGROUND_COLOR),
        fill_style: coerce_string(obj.get("fillStyle"), DEFAULT_FILL_STYLE),
        stroke_width: coerce_finite(obj.get("strokeWidth"), DEFAULT_STROKE_WIDTH),
        stroke_style: coerce_string(obj.get("strokeStyle"), DEFAULT_STROKE_STYLE),
        roughness: coerce_finite(obj.get("roughness"), DEFAULT_ROUGHNESS),
        opacity,
        group_ids: obj
            .get("groupIds")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default(),
        frame_id: coerce_opt_string(obj.get("frameId")),
        seed: coerce_u64(obj.get("seed")).unwrap_or_else(fresh_seed),
        version,
        version_nonce,
        updated,
        is_deleted: coerce_bool(obj.get("isDeleted"), false),
        locked: coerce_bool(obj.get("locked"), false),
        link: coerce_opt_string(obj.get("link")),
        bound_elements: normalize_bound_elements(obj.get("boundElements")),
    }
}

/// An element counts as pre-existing (renderer-authored) when it
/// carries a complete identity/version triple and, for text, a
/// non-integral measured width. Only then is it safe to keep its
/// metadata instead of synthesizing fresh values.
fn is_pre_existing(obj: &serde_json::Map<String, Value>, kind: ElementKind) -> bool {
    let triple_complete = coerce_u64(obj.get("version")).is_some()
        && coerce_u64(obj.get("versionNonce")).is_some()
        && obj.get("updated").and_then(Value::as_i64).is_some();

    if !triple_complete {
        return false;
    }

    match kind {
        ElementKind::Text => coerce_finite(obj.get("width"), 0.0).fract() != 0.0,
        _ => true,
    }
}

fn normalize_bound_elements(value: Option<&Value>) -> Option<Vec<BoundElementRef>> {
    let refs: Vec<BoundElementRef> = value?
        .as_array()?
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            Some(BoundElementRef {
                id: coerce_opt_string(obj.get("id")).filter(|s| !s.is_empty())?,
                kind: coerce_string(obj.get("type"), "arrow"),
            })
        })
        .collect();

    if refs.is_empty() {
        None
    } else {
        Some(refs)
    }
}

fn normalize_linear(
    obj: &serde_json::Map<String, Value>,
    base: ElementBase,
    is_arrow: bool,
) -> LinearElement {
    let points = parse_points(obj.get("points")).unwrap_or_else(|| {
        // straight two-point path spanning the element's extent
        vec![[0.0, 0.0], [base.width, base.height]]
    });

    LinearElement {
        start_binding: parse_binding(obj.get("startBinding")),
        end_binding: parse_binding(obj.get("endBinding")),
        start_arrowhead: coerce_opt_string(obj.get("startArrowhead")),
        end_arrowhead: coerce_opt_string(obj.get("endArrowhead"))
            .or_else(|| is_arrow.then(|| "arrow".to_string())),
        points,
        base,
    }
}

fn parse_points(value: Option<&Value>) -> Option<Vec<[f64; 2]>> {
    let points: Vec<[f64; 2]> = value?
        .as_array()?
        .iter()
        .filter_map(|p| {
            let pair = p.as_array()?;
            Some([
                coerce_finite(pair.first(), 0.0),
                coerce_finite(pair.get(1), 0.0),
            ])
        })
        .collect();

    if points.is_empty() {
        None
    } else {
        Some(points)
    }
}

fn parse_binding(value: Option<&Value>) -> Option<PointBinding> {
    let obj = value?.as_object()?;
    Some(PointBinding {
        element_id: coerce_opt_string(obj.get("elementId")).filter(|s| !s.is_empty())?,
        focus: coerce_finite(obj.get("focus"), 0.0),
        gap: coerce_finite(obj.get("gap"), 0.0),
    })
}

fn normalize_text(obj: &serde_json::Map<String, Value>, base: ElementBase) -> TextElement {
    let text = coerce_string(obj.get("text"), "");
    TextElement {
        original_text: coerce_string(obj.get("originalText"), &text),
        text,
        font_size: coerce_finite(obj.get("fontSize"), DEFAULT_FONT_SIZE),
        font_family: coerce_u64(obj.get("fontFamily")).unwrap_or(DEFAULT_FONT_FAMILY as u64) as u32,
        text_align: coerce_string(obj.get("textAlign"), DEFAULT_TEXT_ALIGN),
        vertical_align: coerce_string(obj.get("verticalAlign"), DEFAULT_VERTICAL_ALIGN),
        container_id: coerce_opt_string(obj.get("containerId")),
        line_height: coerce_finite(obj.get("lineHeight"), DEFAULT_LINE_HEIGHT),
        base,
    }
}

fn normalize_image(obj: &serde_json::Map<String, Value>, base: ElementBase) -> ImageElement {
    let scale = obj
        .get("scale")
        .and_then(Value::as_array)
        .map(|s| [coerce_finite(s.first(), 1.0), coerce_finite(s.get(1), 1.0)])
        .unwrap_or([1.0, 1.0]);

    ImageElement {
        file_id: coerce_opt_string(obj.get("fileId")),
        status: coerce_string(obj.get("status"), "pending"),
        scale,
        base,
    }
}

fn normalize_freedraw(obj: &serde_json::Map<String, Value>, base: ElementBase) -> FreedrawElement {
    FreedrawElement {
        points: parse_points(obj.get("points")).unwrap_or_else(|| vec![[0.0, 0.0]]),
        pressures: obj
            .get("pressures")
            .and_then(Value::as_array)
            .map(|ps| ps.iter().map(|p| coerce_finite(Some(p), 0.0)).collect())
            .unwrap_or_default(),
        simulate_pressure: coerce_bool(obj.get("simulatePressure"), true),
        base,
    }
}

/// Clear every relational field that references an id absent from the
/// document: `container_id`, `frame_id`, arrow bindings and
/// `bound_elements` back-references.
fn heal_references(elements: &mut [Element]) {
    let ids: HashSet<String> = elements.iter().map(|e| e.id().to_string()).collect();

    for element in elements.iter_mut() {
        let id = element.id().to_string();

        let base = element.base_mut();
        if let Some(frame_id) = &base.frame_id {
            if !ids.contains(frame_id) {
                warn!(id = %id, frame_id = %frame_id, "frame reference not found, clearing");
                base.frame_id = None;
            }
        }
        if let Some(bound) = &mut base.bound_elements {
            let before = bound.len();
            bound.retain(|b| ids.contains(&b.id));
            if bound.len() != before {
                warn!(id = %id, "dropped dangling bound-element references");
            }
            if bound.is_empty() {
                base.bound_elements = None;
            }
        }

        match element {
            Element::Text(text) => {
                if let Some(container_id) = &text.container_id {
                    if !ids.contains(container_id) {
                        warn!(id = %id, container_id = %container_id, "container reference not found, clearing");
                        text.container_id = None;
                    }
                }
            }
            Element::Arrow(linear) | Element::Line(linear) => {
                for binding in [&mut linear.start_binding, &mut linear.end_binding] {
                    if let Some(b) = binding {
                        if !ids.contains(&b.element_id) {
                            warn!(id = %id, element_id = %b.element_id, "binding reference not found, clearing");
                            *binding = None;
                        }
                    }
                }
            }
            _ => {}
        }
    }
}
