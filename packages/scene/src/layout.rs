//! # Bound-Text Placement
//!
//! A text element bound to a container (`container_id` set) never keeps
//! caller-supplied coordinates: its position is derived from the
//! container's geometry and the text's own alignment on every pass.

use crate::element::{ElementBase, TextElement};

/// Inset between a container's edge and its bound text, applied on all
/// four sides.
pub const BOUND_TEXT_PADDING: f64 = 5.0;

/// Compute the `(x, y)` of `text` inside `container`.
///
/// The container's interior is its rectangle inset by
/// [`BOUND_TEXT_PADDING`]; the text is placed within it by its
/// `text_align` / `vertical_align` using its measured width/height.
pub fn position_bound_text(container: &ElementBase, text: &TextElement) -> (f64, f64) {
    let ix = container.x + BOUND_TEXT_PADDING;
    let iy = container.y + BOUND_TEXT_PADDING;
    let iw = (container.width - 2.0 * BOUND_TEXT_PADDING).max(0.0);
    let ih = (container.height - 2.0 * BOUND_TEXT_PADDING).max(0.0);

    let x = match text.text_align.as_str() {
        "center" => ix + (iw - text.base.width) / 2.0,
        "right" => ix + iw - text.base.width,
        _ => ix,
    };

    let y = match text.vertical_align.as_str() {
        "middle" => iy + (ih - text.base.height) / 2.0,
        "bottom" => iy + ih - text.base.height,
        _ => iy,
    };

    (x, y)
}
