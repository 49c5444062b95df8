//! # Graph Patches
//!
//! Id-addressed operations against the cell tree. Deletes cascade:
//! removing a node takes its descendants and every edge touching the
//! removed set with it, since a dangling edge is an invalid document.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::GraphError;
use crate::model::{parse_fragment, GraphModel};

/// One operation against the XML tree's node-by-id addressing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GraphPatch {
    /// Insert the cells of `fragment`; the first cell takes `id`.
    Add { id: String, fragment: String },

    /// Replace the cell `id` with the first cell of `fragment`.
    Update { id: String, fragment: String },

    /// Remove cell `id`, its descendants, and all edges referencing
    /// any removed cell.
    Delete { id: String },
}

impl GraphModel {
    /// Apply a list of patches in order. Fails on the first invalid
    /// operation, leaving earlier ones applied.
    pub fn apply_patches(&mut self, patches: &[GraphPatch]) -> Result<(), GraphError> {
        for patch in patches {
            self.apply_patch(patch)?;
        }
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: &GraphPatch) -> Result<(), GraphError> {
        match patch {
            GraphPatch::Add { id, fragment } => {
                if self.contains(id) {
                    return Err(GraphError::DuplicateId(id.clone()));
                }
                let mut cells = parse_fragment(fragment)?;
                cells[0].id = id.clone();
                for cell in &mut cells {
                    if cell.parent().is_none() {
                        cell.set_attr("parent", "1");
                    }
                }
                debug!(id = %id, count = cells.len(), "adding cells");
                self.cells.extend(cells);
                Ok(())
            }

            GraphPatch::Update { id, fragment } => {
                let pos = self
                    .cells
                    .iter()
                    .position(|c| &c.id == id)
                    .ok_or_else(|| GraphError::CellNotFound(id.clone()))?;
                let mut cells = parse_fragment(fragment)?;
                let mut replacement = cells.swap_remove(0);
                replacement.id = id.clone();
                if replacement.parent().is_none() {
                    if let Some(parent) = self.cells[pos].parent() {
                        let parent = parent.to_string();
                        replacement.set_attr("parent", &parent);
                    }
                }
                self.cells[pos] = replacement;
                Ok(())
            }

            GraphPatch::Delete { id } => {
                if !self.contains(id) {
                    return Err(GraphError::CellNotFound(id.clone()));
                }
                let removed = self.remove_cascade(id);
                debug!(id = %id, removed = removed.len(), "cascade delete");
                Ok(())
            }
        }
    }
}
