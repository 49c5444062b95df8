//! Error types for the graph document model.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("malformed XML: {0}")]
    Malformed(String),

    #[error("document has no mxGraphModel root")]
    MissingModel,

    #[error("cell not found: {0}")]
    CellNotFound(String),

    #[error("duplicate cell id: {0}")]
    DuplicateId(String),

    #[error("fragment contains no cells")]
    EmptyFragment,
}

impl From<quick_xml::Error> for GraphError {
    fn from(e: quick_xml::Error) -> Self {
        GraphError::Malformed(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for GraphError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        GraphError::Malformed(e.to_string())
    }
}
