//! # Easel Graph Model
//!
//! The XML node-tree half of the dual-backend document engine.
//!
//! A graph document is a flat list of cells under an `<mxGraphModel>`
//! root. Cells address each other by id: structural nesting through a
//! `parent` attribute, edges through `source`/`target`. The model
//! supports validated loads (including bare-fragment wrapping),
//! id-addressed add/update/delete patching, and cascade deletion —
//! removing a cell removes its descendants and every edge touching the
//! removed set, because a dangling edge is an invalid document.

mod errors;
mod model;
mod patch;

pub use errors::GraphError;
pub use model::{Cell, GraphModel};
pub use patch::GraphPatch;
