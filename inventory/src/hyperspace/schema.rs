//! How entities and relationships are laid out as vertex and edge properties.
//!
//! Keys starting with `__` belong to the registry.  `name` is stored plainly so it can be
//! filtered like any other property; every other plain key is a user property.

use crate::hyperspace::substrate::{Edge, Vertex};
use crate::space::entity::Properties;
use crate::space::kind::SegmentType;
use crate::space::point::CanonicalPath;
use core::str::FromStr;

/// segment type code of a vertex
pub const TYPE: &str = "__type";
/// id of the last path segment of a vertex, or the id of an edge
pub const EID: &str = "__eid";
/// canonical path string of a vertex
pub const CP: &str = "__cp";
pub const NAME: &str = "name";

pub const UNIT: &str = "__unit";
pub const DATA_TYPE: &str = "__dataType";
pub const COLLECTION_INTERVAL: &str = "__collectionInterval";
pub const ROLE: &str = "__role";
pub const VALUE: &str = "__value";

/// the keys every entity vertex carries, which are never part of identity or user properties
pub const ADDRESSING: [&str; 3] = [TYPE, EID, CP];

pub fn vertex_type(vertex: &Vertex) -> Option<SegmentType> {
    vertex.str(TYPE).and_then(SegmentType::from_code)
}

pub fn vertex_path(vertex: &Vertex) -> Option<CanonicalPath> {
    vertex.str(CP).and_then(|cp| CanonicalPath::from_str(cp).ok())
}

pub fn vertex_id(vertex: &Vertex) -> Option<&str> {
    vertex.str(EID)
}

pub fn edge_id(edge: &Edge) -> Option<&str> {
    edge.str(EID)
}

/// the user properties of a vertex or edge
pub fn user_properties(properties: &Properties) -> Properties {
    properties
        .iter()
        .filter(|(key, _)| !key.starts_with("__") && key.as_str() != NAME)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// registry owned properties other than the addressing keys
pub fn structural_properties(properties: &Properties) -> Properties {
    properties
        .iter()
        .filter(|(key, _)| key.starts_with("__") && !ADDRESSING.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
