//! The property graph the registry is stored in.
//!
//! A [`GraphSubstrate`] hands out transactions; everything the registry reads or writes goes
//! through a [`GraphTx`] which is either committed or rolled back as a whole.

pub mod mem;

use crate::space::entity::Properties;
use crate::space::kind::Direction;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct VertexId(pub u64);

#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct EdgeId(pub u64);

impl Display for VertexId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl Display for EdgeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// a vertex or an edge; what a traversal is positioned on
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ElementId {
    Vertex(VertexId),
    Edge(EdgeId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub properties: Properties,
}

impl Vertex {
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub label: String,
    pub source: VertexId,
    pub target: VertexId,
    pub properties: Properties,
}

impl Edge {
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    /// the end of this edge that is not `from`
    pub fn other_end(&self, from: VertexId) -> VertexId {
        if self.source == from {
            self.target
        } else {
            self.source
        }
    }
}

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum GraphErr {
    #[error("vertex {0} not found")]
    VertexNotFound(VertexId),
    #[error("edge {0} not found")]
    EdgeNotFound(EdgeId),
    #[error("transaction conflict: the graph changed since this transaction began")]
    Conflict,
    #[error("transaction is already closed")]
    Closed,
    #[error("{0}")]
    Msg(String),
}

impl GraphErr {
    pub fn msg<M: ToString>(msg: M) -> Self {
        Self::Msg(msg.to_string())
    }
}

/// Read access to a consistent view of the graph.
pub trait GraphRead: Send + Sync {
    fn vertex(&self, id: VertexId) -> Result<Option<Vertex>, GraphErr>;

    fn edge(&self, id: EdgeId) -> Result<Option<Edge>, GraphErr>;

    fn vertex_ids(&self) -> Result<Vec<VertexId>, GraphErr>;

    fn edge_ids(&self) -> Result<Vec<EdgeId>, GraphErr>;

    /// vertices whose property `key` equals `value`; indexed keys avoid a scan
    fn vertices_by(&self, key: &str, value: &Value) -> Result<Vec<VertexId>, GraphErr>;

    fn edges_by(&self, key: &str, value: &Value) -> Result<Vec<EdgeId>, GraphErr>;

    /// edges incident to `vertex` in `direction`, optionally only those labeled `label`
    fn edges_of(
        &self,
        vertex: VertexId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Vec<EdgeId>, GraphErr>;
}

/// A unit of work against the graph.  Dropping a transaction without committing discards it.
#[async_trait]
pub trait GraphTx: GraphRead {
    fn as_read(&self) -> &dyn GraphRead;

    fn add_vertex(&mut self, properties: Properties) -> Result<VertexId, GraphErr>;

    fn set_vertex_property(&mut self, id: VertexId, key: &str, value: Value)
        -> Result<(), GraphErr>;

    fn remove_vertex_property(&mut self, id: VertexId, key: &str)
        -> Result<Option<Value>, GraphErr>;

    /// removes the vertex together with every edge incident to it
    fn remove_vertex(&mut self, id: VertexId) -> Result<(), GraphErr>;

    fn add_edge(
        &mut self,
        label: &str,
        source: VertexId,
        target: VertexId,
        properties: Properties,
    ) -> Result<EdgeId, GraphErr>;

    fn set_edge_property(&mut self, id: EdgeId, key: &str, value: Value) -> Result<(), GraphErr>;

    fn remove_edge_property(&mut self, id: EdgeId, key: &str) -> Result<Option<Value>, GraphErr>;

    fn remove_edge(&mut self, id: EdgeId) -> Result<(), GraphErr>;

    async fn commit(self: Box<Self>) -> Result<(), GraphErr>;

    async fn rollback(self: Box<Self>) -> Result<(), GraphErr>;
}

#[async_trait]
pub trait GraphSubstrate: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn GraphTx>, GraphErr>;
}
