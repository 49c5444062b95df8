//! # Graph Document Model
//!
//! Flat-cell representation of an `<mxGraphModel>` document.
//!
//! Cells keep their attributes and raw inner markup (geometry etc.) so
//! a parse → serialize round trip preserves everything the renderer
//! put there. Structure is attribute-encoded: `parent` for nesting,
//! `source`/`target` for edges.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use std::collections::HashSet;

use easel_common::fresh_id;

use crate::errors::GraphError;

/// One node of the XML tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Element tag, usually `mxCell`.
    pub tag: String,
    pub id: String,
    /// Remaining attributes in document order, `id` excluded.
    pub attributes: Vec<(String, String)>,
    /// Raw serialized children (e.g. `<mxGeometry .../>`).
    pub inner_xml: String,
}

impl Cell {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn parent(&self) -> Option<&str> {
        self.attr("parent")
    }

    pub fn source(&self) -> Option<&str> {
        self.attr("source")
    }

    pub fn target(&self) -> Option<&str> {
        self.attr("target")
    }

    pub fn is_edge(&self) -> bool {
        self.attr("edge") == Some("1") || self.source().is_some() || self.target().is_some()
    }
}

/// A parsed graph document: the `<mxGraphModel>` attributes plus its
/// cells in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphModel {
    pub model_attributes: Vec<(String, String)>,
    pub cells: Vec<Cell>,
}

impl GraphModel {
    /// The two synthetic layer cells every model carries.
    pub fn empty() -> Self {
        GraphModel {
            model_attributes: vec![],
            cells: vec![
                Cell {
                    tag: "mxCell".to_string(),
                    id: "0".to_string(),
                    attributes: vec![],
                    inner_xml: String::new(),
                },
                Cell {
                    tag: "mxCell".to_string(),
                    id: "1".to_string(),
                    attributes: vec![("parent".to_string(), "0".to_string())],
                    inner_xml: String::new(),
                },
            ],
        }
    }

    /// Parse a full `<mxGraphModel>` document.
    pub fn parse(text: &str) -> Result<Self, GraphError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut model_attributes = None;
        let mut cells = Vec::new();
        let mut in_root = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e)
                    if e.name().as_ref() == b"mxGraphModel" && model_attributes.is_none() =>
                {
                    model_attributes = Some(read_attributes(&e)?);
                }
                Event::Start(e) if e.name().as_ref() == b"root" => {
                    in_root = true;
                }
                Event::End(e) if e.name().as_ref() == b"root" => {
                    in_root = false;
                }
                Event::Start(e) if in_root => {
                    let name = e.name();
                    let tag = String::from_utf8_lossy(name.as_ref()).into_owned();
                    let attributes = read_attributes(&e)?;
                    let inner_xml = read_inner(&mut reader, name)?;
                    cells.push(build_cell(tag, attributes, inner_xml));
                }
                Event::Empty(e) if in_root => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let attributes = read_attributes(&e)?;
                    cells.push(build_cell(tag, attributes, String::new()));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let model_attributes = model_attributes.ok_or(GraphError::MissingModel)?;
        Ok(GraphModel {
            model_attributes,
            cells,
        })
    }

    /// Whether `text` looks like a bare cell fragment rather than a
    /// full document.
    pub fn is_fragment(text: &str) -> bool {
        let trimmed = text.trim_start();
        trimmed.starts_with("<mxCell")
            || trimmed.starts_with("<UserObject")
            || trimmed.starts_with("<object")
    }

    /// Parse either a full document or a bare cell fragment. Fragments
    /// are wrapped into a fresh model with the synthetic layer cells
    /// and default to parent `1`.
    pub fn from_text(text: &str) -> Result<Self, GraphError> {
        if !Self::is_fragment(text) {
            return Self::parse(text);
        }

        let mut model = Self::empty();
        let mut fragment = parse_fragment(text)?;
        for cell in &mut fragment {
            if cell.parent().is_none() {
                cell.set_attr("parent", "1");
            }
        }
        model.cells.extend(fragment);
        Ok(model)
    }

    /// A degenerate model holds nothing beyond the synthetic layer
    /// cells — an "empty diagram".
    pub fn is_degenerate(&self) -> bool {
        self.cells
            .iter()
            .all(|c| matches!(c.id.as_str(), "0" | "1"))
    }

    pub fn find(&self, id: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Remove a cell together with its structural descendants and
    /// every edge whose source or target lies in the removed set,
    /// iterated to a fixpoint. Returns the removed ids.
    pub fn remove_cascade(&mut self, id: &str) -> Vec<String> {
        let mut removed: HashSet<String> = HashSet::new();
        removed.insert(id.to_string());

        loop {
            let mut grew = false;
            for cell in &self.cells {
                if removed.contains(&cell.id) {
                    continue;
                }
                let orphaned = cell.parent().is_some_and(|p| removed.contains(p));
                let dangling_edge = cell.source().is_some_and(|s| removed.contains(s))
                    || cell.target().is_some_and(|t| removed.contains(t));
                if orphaned || dangling_edge {
                    removed.insert(cell.id.clone());
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }

        self.cells.retain(|c| !removed.contains(&c.id));
        removed.into_iter().collect()
    }

    /// Serialize back to XML text.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<mxGraphModel");
        for (k, v) in &self.model_attributes {
            push_attribute(&mut out, k, v);
        }
        out.push_str("><root>");
        for cell in &self.cells {
            push_cell(&mut out, cell);
        }
        out.push_str("</root></mxGraphModel>");
        out
    }
}

fn build_cell(tag: String, mut attributes: Vec<(String, String)>, inner_xml: String) -> Cell {
    let id = match attributes.iter().position(|(k, _)| k == "id") {
        Some(pos) => attributes.remove(pos).1,
        None => fresh_id(),
    };
    Cell {
        tag,
        id,
        attributes,
        inner_xml,
    }
}

fn read_attributes(e: &BytesStart) -> Result<Vec<(String, String)>, GraphError> {
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| GraphError::Malformed(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(attributes)
}

/// Re-serialize everything up to the matching end tag.
fn read_inner(reader: &mut Reader<&[u8]>, end: QName) -> Result<String, GraphError> {
    let mut out = String::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                push_start(&mut out, &e, false)?;
            }
            Event::Empty(e) => {
                push_start(&mut out, &e, true)?;
            }
            Event::End(e) if depth == 0 && e.name() == end => break,
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                out.push_str("</");
                out.push_str(&String::from_utf8_lossy(e.name().as_ref()));
                out.push('>');
            }
            Event::Text(t) => {
                // raw (still-escaped) content, append as-is
                out.push_str(&String::from_utf8_lossy(t.as_ref()));
            }
            Event::CData(c) => {
                out.push_str("<![CDATA[");
                out.push_str(&String::from_utf8_lossy(c.as_ref()));
                out.push_str("]]>");
            }
            Event::Eof => {
                return Err(GraphError::Malformed(
                    "unexpected end of input inside cell".to_string(),
                ))
            }
            _ => {}
        }
    }
    Ok(out)
}

fn push_start(out: &mut String, e: &BytesStart, empty: bool) -> Result<(), GraphError> {
    out.push('<');
    out.push_str(&String::from_utf8_lossy(e.name().as_ref()));
    for (k, v) in read_attributes(e)? {
        push_attribute(out, &k, &v);
    }
    out.push_str(if empty { "/>" } else { ">" });
    Ok(())
}

fn push_attribute(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

fn push_cell(out: &mut String, cell: &Cell) {
    out.push('<');
    out.push_str(&cell.tag);
    push_attribute(out, "id", &cell.id);
    for (k, v) in &cell.attributes {
        push_attribute(out, k, v);
    }
    if cell.inner_xml.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        out.push_str(&cell.inner_xml);
        out.push_str("</");
        out.push_str(&cell.tag);
        out.push('>');
    }
}

/// Parse bare cells by wrapping them in a throwaway model.
pub(crate) fn parse_fragment(text: &str) -> Result<Vec<Cell>, GraphError> {
    let wrapped = format!("<mxGraphModel><root>{}</root></mxGraphModel>", text);
    let model = GraphModel::parse(&wrapped)?;
    if model.cells.is_empty() {
        return Err(GraphError::EmptyFragment);
    }
    Ok(model.cells)
}
