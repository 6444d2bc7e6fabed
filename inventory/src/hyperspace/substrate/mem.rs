use crate::hyperspace::substrate::{
    Edge, EdgeId, GraphErr, GraphRead, GraphSubstrate, GraphTx, Vertex, VertexId,
};
use crate::space::entity::Properties;
use crate::space::kind::Direction;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

fn index_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
struct GraphState {
    version: u64,
    next_id: u64,
    vertices: BTreeMap<VertexId, Vertex>,
    edges: BTreeMap<EdgeId, Edge>,
    outgoing: BTreeMap<VertexId, BTreeSet<EdgeId>>,
    incoming: BTreeMap<VertexId, BTreeSet<EdgeId>>,
    indexed_vertex_keys: Arc<BTreeSet<String>>,
    indexed_edge_keys: Arc<BTreeSet<String>>,
    vertex_index: HashMap<(String, String), BTreeSet<VertexId>>,
    edge_index: HashMap<(String, String), BTreeSet<EdgeId>>,
}

impl GraphState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn index_vertex(&mut self, id: VertexId, key: &str, value: &Value) {
        if self.indexed_vertex_keys.contains(key) {
            self.vertex_index
                .entry((key.to_string(), index_value(value)))
                .or_default()
                .insert(id);
        }
    }

    fn unindex_vertex(&mut self, id: VertexId, key: &str, value: &Value) {
        let slot = (key.to_string(), index_value(value));
        if let Some(ids) = self.vertex_index.get_mut(&slot) {
            ids.remove(&id);
            if ids.is_empty() {
                self.vertex_index.remove(&slot);
            }
        }
    }

    fn index_edge(&mut self, id: EdgeId, key: &str, value: &Value) {
        if self.indexed_edge_keys.contains(key) {
            self.edge_index
                .entry((key.to_string(), index_value(value)))
                .or_default()
                .insert(id);
        }
    }

    fn unindex_edge(&mut self, id: EdgeId, key: &str, value: &Value) {
        let slot = (key.to_string(), index_value(value));
        if let Some(ids) = self.edge_index.get_mut(&slot) {
            ids.remove(&id);
            if ids.is_empty() {
                self.edge_index.remove(&slot);
            }
        }
    }

    fn vertex_mut(&mut self, id: VertexId) -> Result<&mut Vertex, GraphErr> {
        self.vertices
            .get_mut(&id)
            .ok_or(GraphErr::VertexNotFound(id))
    }

    fn edge_mut(&mut self, id: EdgeId) -> Result<&mut Edge, GraphErr> {
        self.edges.get_mut(&id).ok_or(GraphErr::EdgeNotFound(id))
    }

    fn add_vertex(&mut self, properties: Properties) -> VertexId {
        let id = VertexId(self.next_id());
        for (key, value) in properties.iter() {
            self.index_vertex(id, key, value);
        }
        self.vertices.insert(id, Vertex { id, properties });
        id
    }

    fn set_vertex_property(&mut self, id: VertexId, key: &str, value: Value) -> Result<(), GraphErr> {
        let old = self
            .vertex_mut(id)?
            .properties
            .insert(key.to_string(), value.clone());
        if let Some(old) = old {
            self.unindex_vertex(id, key, &old);
        }
        self.index_vertex(id, key, &value);
        Ok(())
    }

    fn remove_vertex_property(&mut self, id: VertexId, key: &str) -> Result<Option<Value>, GraphErr> {
        let old = self.vertex_mut(id)?.properties.remove(key);
        if let Some(old) = &old {
            self.unindex_vertex(id, key, old);
        }
        Ok(old)
    }

    fn remove_vertex(&mut self, id: VertexId) -> Result<(), GraphErr> {
        let vertex = self
            .vertices
            .remove(&id)
            .ok_or(GraphErr::VertexNotFound(id))?;
        for (key, value) in vertex.properties.iter() {
            self.unindex_vertex(id, key, value);
        }
        let mut incident: BTreeSet<EdgeId> = self.outgoing.remove(&id).unwrap_or_default();
        incident.extend(self.incoming.remove(&id).unwrap_or_default());
        for edge in incident {
            // a self loop shows up in both sets
            if self.edges.contains_key(&edge) {
                self.remove_edge(edge)?;
            }
        }
        Ok(())
    }

    fn add_edge(
        &mut self,
        label: &str,
        source: VertexId,
        target: VertexId,
        properties: Properties,
    ) -> Result<EdgeId, GraphErr> {
        for end in [source, target] {
            if !self.vertices.contains_key(&end) {
                return Err(GraphErr::VertexNotFound(end));
            }
        }
        let id = EdgeId(self.next_id());
        for (key, value) in properties.iter() {
            self.index_edge(id, key, value);
        }
        self.outgoing.entry(source).or_default().insert(id);
        self.incoming.entry(target).or_default().insert(id);
        self.edges.insert(
            id,
            Edge {
                id,
                label: label.to_string(),
                source,
                target,
                properties,
            },
        );
        Ok(id)
    }

    fn set_edge_property(&mut self, id: EdgeId, key: &str, value: Value) -> Result<(), GraphErr> {
        let old = self
            .edge_mut(id)?
            .properties
            .insert(key.to_string(), value.clone());
        if let Some(old) = old {
            self.unindex_edge(id, key, &old);
        }
        self.index_edge(id, key, &value);
        Ok(())
    }

    fn remove_edge_property(&mut self, id: EdgeId, key: &str) -> Result<Option<Value>, GraphErr> {
        let old = self.edge_mut(id)?.properties.remove(key);
        if let Some(old) = &old {
            self.unindex_edge(id, key, old);
        }
        Ok(old)
    }

    fn remove_edge(&mut self, id: EdgeId) -> Result<(), GraphErr> {
        let edge = self.edges.remove(&id).ok_or(GraphErr::EdgeNotFound(id))?;
        for (key, value) in edge.properties.iter() {
            self.unindex_edge(id, key, value);
        }
        if let Some(out) = self.outgoing.get_mut(&edge.source) {
            out.remove(&id);
        }
        if let Some(inc) = self.incoming.get_mut(&edge.target) {
            inc.remove(&id);
        }
        Ok(())
    }
}

impl GraphRead for GraphState {
    fn vertex(&self, id: VertexId) -> Result<Option<Vertex>, GraphErr> {
        Ok(self.vertices.get(&id).cloned())
    }

    fn edge(&self, id: EdgeId) -> Result<Option<Edge>, GraphErr> {
        Ok(self.edges.get(&id).cloned())
    }

    fn vertex_ids(&self) -> Result<Vec<VertexId>, GraphErr> {
        Ok(self.vertices.keys().cloned().collect())
    }

    fn edge_ids(&self) -> Result<Vec<EdgeId>, GraphErr> {
        Ok(self.edges.keys().cloned().collect())
    }

    fn vertices_by(&self, key: &str, value: &Value) -> Result<Vec<VertexId>, GraphErr> {
        if self.indexed_vertex_keys.contains(key) {
            let slot = (key.to_string(), index_value(value));
            return Ok(self
                .vertex_index
                .get(&slot)
                .map(|ids| ids.iter().cloned().collect())
                .unwrap_or_default());
        }
        trace!("unindexed vertex lookup on '{}'", key);
        Ok(self
            .vertices
            .values()
            .filter(|v| v.properties.get(key) == Some(value))
            .map(|v| v.id)
            .collect())
    }

    fn edges_by(&self, key: &str, value: &Value) -> Result<Vec<EdgeId>, GraphErr> {
        if self.indexed_edge_keys.contains(key) {
            let slot = (key.to_string(), index_value(value));
            return Ok(self
                .edge_index
                .get(&slot)
                .map(|ids| ids.iter().cloned().collect())
                .unwrap_or_default());
        }
        trace!("unindexed edge lookup on '{}'", key);
        Ok(self
            .edges
            .values()
            .filter(|e| e.properties.get(key) == Some(value))
            .map(|e| e.id)
            .collect())
    }

    fn edges_of(
        &self,
        vertex: VertexId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Vec<EdgeId>, GraphErr> {
        let empty = BTreeSet::new();
        let out = self.outgoing.get(&vertex).unwrap_or(&empty);
        let inc = self.incoming.get(&vertex).unwrap_or(&empty);
        let candidates: BTreeSet<EdgeId> = match direction {
            Direction::Outgoing => out.clone(),
            Direction::Incoming => inc.clone(),
            Direction::Both => out.union(inc).cloned().collect(),
        };
        Ok(candidates
            .into_iter()
            .filter(|id| match label {
                None => true,
                Some(label) => self
                    .edges
                    .get(id)
                    .map(|e| e.label == label)
                    .unwrap_or(false),
            })
            .collect())
    }
}

/// A graph held in process memory.
///
/// Every transaction works on its own snapshot; commit publishes the snapshot if nothing else
/// was committed since it was taken and fails with [`GraphErr::Conflict`] otherwise.
#[derive(Clone)]
pub struct MemorySubstrate {
    state: Arc<RwLock<GraphState>>,
}

impl MemorySubstrate {
    pub fn new() -> Self {
        Self::with_indexes(["__type", "__eid", "__cp"], ["__eid"])
    }

    pub fn with_indexes<V, E, S>(vertex_keys: V, edge_keys: E) -> Self
    where
        V: IntoIterator<Item = S>,
        E: IntoIterator<Item = S>,
        S: ToString,
    {
        let state = GraphState {
            indexed_vertex_keys: Arc::new(vertex_keys.into_iter().map(|k| k.to_string()).collect()),
            indexed_edge_keys: Arc::new(edge_keys.into_iter().map(|k| k.to_string()).collect()),
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn vertex_count(&self) -> usize {
        self.state.read().await.vertices.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.state.read().await.edges.len()
    }
}

impl Default for MemorySubstrate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphSubstrate for MemorySubstrate {
    async fn begin(&self) -> Result<Box<dyn GraphTx>, GraphErr> {
        let snapshot = self.state.read().await.clone();
        Ok(Box::new(MemoryTx {
            shared: self.state.clone(),
            base_version: snapshot.version,
            state: snapshot,
            dirty: false,
        }))
    }
}

pub struct MemoryTx {
    shared: Arc<RwLock<GraphState>>,
    base_version: u64,
    state: GraphState,
    dirty: bool,
}

impl GraphRead for MemoryTx {
    fn vertex(&self, id: VertexId) -> Result<Option<Vertex>, GraphErr> {
        self.state.vertex(id)
    }

    fn edge(&self, id: EdgeId) -> Result<Option<Edge>, GraphErr> {
        self.state.edge(id)
    }

    fn vertex_ids(&self) -> Result<Vec<VertexId>, GraphErr> {
        self.state.vertex_ids()
    }

    fn edge_ids(&self) -> Result<Vec<EdgeId>, GraphErr> {
        self.state.edge_ids()
    }

    fn vertices_by(&self, key: &str, value: &Value) -> Result<Vec<VertexId>, GraphErr> {
        self.state.vertices_by(key, value)
    }

    fn edges_by(&self, key: &str, value: &Value) -> Result<Vec<EdgeId>, GraphErr> {
        self.state.edges_by(key, value)
    }

    fn edges_of(
        &self,
        vertex: VertexId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Vec<EdgeId>, GraphErr> {
        self.state.edges_of(vertex, direction, label)
    }
}

#[async_trait]
impl GraphTx for MemoryTx {
    fn as_read(&self) -> &dyn GraphRead {
        self
    }

    fn add_vertex(&mut self, properties: Properties) -> Result<VertexId, GraphErr> {
        self.dirty = true;
        Ok(self.state.add_vertex(properties))
    }

    fn set_vertex_property(
        &mut self,
        id: VertexId,
        key: &str,
        value: Value,
    ) -> Result<(), GraphErr> {
        self.dirty = true;
        self.state.set_vertex_property(id, key, value)
    }

    fn remove_vertex_property(
        &mut self,
        id: VertexId,
        key: &str,
    ) -> Result<Option<Value>, GraphErr> {
        self.dirty = true;
        self.state.remove_vertex_property(id, key)
    }

    fn remove_vertex(&mut self, id: VertexId) -> Result<(), GraphErr> {
        self.dirty = true;
        self.state.remove_vertex(id)
    }

    fn add_edge(
        &mut self,
        label: &str,
        source: VertexId,
        target: VertexId,
        properties: Properties,
    ) -> Result<EdgeId, GraphErr> {
        self.dirty = true;
        self.state.add_edge(label, source, target, properties)
    }

    fn set_edge_property(&mut self, id: EdgeId, key: &str, value: Value) -> Result<(), GraphErr> {
        self.dirty = true;
        self.state.set_edge_property(id, key, value)
    }

    fn remove_edge_property(&mut self, id: EdgeId, key: &str) -> Result<Option<Value>, GraphErr> {
        self.dirty = true;
        self.state.remove_edge_property(id, key)
    }

    fn remove_edge(&mut self, id: EdgeId) -> Result<(), GraphErr> {
        self.dirty = true;
        self.state.remove_edge(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), GraphErr> {
        if !self.dirty {
            return Ok(());
        }
        let MemoryTx {
            shared,
            base_version,
            mut state,
            ..
        } = *self;
        let mut shared = shared.write().await;
        if shared.version != base_version {
            return Err(GraphErr::Conflict);
        }
        state.version = base_version + 1;
        debug!(version = state.version, "memory graph committed");
        *shared = state;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), GraphErr> {
        Ok(())
    }
}

#[cfg(test)]
pub mod test {
    use crate::hyperspace::substrate::mem::MemorySubstrate;
    use crate::hyperspace::substrate::{GraphErr, GraphRead, GraphSubstrate, GraphTx};
    use crate::space::entity::Properties;
    use crate::space::kind::Direction;
    use serde_json::{json, Value};

    fn props(pairs: &[(&str, Value)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    pub async fn test_vertices_edges_and_indexes() -> Result<(), GraphErr> {
        let substrate = MemorySubstrate::new();
        let mut tx = substrate.begin().await?;
        let a = tx.add_vertex(props(&[("__type", json!("t")), ("region", json!("eu"))]))?;
        let b = tx.add_vertex(props(&[("__type", json!("e"))]))?;
        let edge = tx.add_edge("contains", a, b, props(&[("__eid", json!("x1"))]))?;

        assert_eq!(tx.vertices_by("__type", &json!("t"))?, vec![a]);
        assert_eq!(tx.vertices_by("region", &json!("eu"))?, vec![a]);
        assert_eq!(tx.edges_by("__eid", &json!("x1"))?, vec![edge]);
        assert_eq!(tx.edges_of(a, Direction::Outgoing, Some("contains"))?, vec![edge]);
        assert!(tx.edges_of(a, Direction::Incoming, None)?.is_empty());
        assert_eq!(tx.edges_of(b, Direction::Both, None)?, vec![edge]);

        tx.set_vertex_property(a, "__type", json!("f"))?;
        assert!(tx.vertices_by("__type", &json!("t"))?.is_empty());
        assert_eq!(tx.vertices_by("__type", &json!("f"))?, vec![a]);

        tx.remove_vertex(a)?;
        assert!(tx.edge(edge)?.is_none());
        assert!(tx.edges_of(b, Direction::Both, None)?.is_empty());
        tx.commit().await?;

        assert_eq!(substrate.vertex_count().await, 1);
        assert_eq!(substrate.edge_count().await, 0);
        Ok(())
    }

    #[tokio::test]
    pub async fn test_rollback_discards() -> Result<(), GraphErr> {
        let substrate = MemorySubstrate::new();
        let mut tx = substrate.begin().await?;
        tx.add_vertex(Properties::new())?;
        tx.rollback().await?;
        assert_eq!(substrate.vertex_count().await, 0);

        let mut tx = substrate.begin().await?;
        tx.add_vertex(Properties::new())?;
        drop(tx);
        assert_eq!(substrate.vertex_count().await, 0);
        Ok(())
    }

    #[tokio::test]
    pub async fn test_conflicting_commits() -> Result<(), GraphErr> {
        let substrate = MemorySubstrate::new();
        let mut first = substrate.begin().await?;
        let mut second = substrate.begin().await?;
        first.add_vertex(Properties::new())?;
        second.add_vertex(Properties::new())?;
        first.commit().await?;
        assert_eq!(second.commit().await, Err(GraphErr::Conflict));

        // read only transactions never conflict
        let reader = substrate.begin().await?;
        let mut writer = substrate.begin().await?;
        writer.add_vertex(Properties::new())?;
        writer.commit().await?;
        reader.commit().await?;
        assert_eq!(substrate.vertex_count().await, 2);
        Ok(())
    }

    #[tokio::test]
    pub async fn test_edges_need_both_ends() -> Result<(), GraphErr> {
        let substrate = MemorySubstrate::new();
        let mut tx = substrate.begin().await?;
        let a = tx.add_vertex(Properties::new())?;
        let b = tx.add_vertex(Properties::new())?;
        tx.remove_vertex(b)?;
        assert_eq!(
            tx.add_edge("contains", a, b, Properties::new()),
            Err(GraphErr::VertexNotFound(b))
        );
        Ok(())
    }
}
