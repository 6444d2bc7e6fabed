use crate::hyperspace::schema;
use crate::hyperspace::substrate::{EdgeId, ElementId, GraphErr, GraphRead, VertexId};
use crate::space::filter::{Filter, RelationRef};
use crate::space::kind::{Direction, EntityRole, SegmentType, WellKnown};
use crate::space::point::CanonicalPath;
use crate::space::query::{FragmentRole, Query, QueryFragment};
use md5::{Digest, Md5};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// What a traversal is positioned on.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Reached {
    /// nothing has narrowed the traversal yet: every vertex
    Unbounded,
    Elements(BTreeSet<ElementId>),
}

impl Reached {
    pub fn empty() -> Self {
        Reached::Elements(BTreeSet::new())
    }

    pub fn vertices<I: IntoIterator<Item = VertexId>>(vertices: I) -> Self {
        Reached::Elements(vertices.into_iter().map(ElementId::Vertex).collect())
    }

    pub fn union(self, other: Reached) -> Reached {
        match (self, other) {
            (Reached::Elements(mut a), Reached::Elements(b)) => {
                a.extend(b);
                Reached::Elements(a)
            }
            _ => Reached::Unbounded,
        }
    }
}

fn value_matches(actual: &Value, wanted: &Value) -> bool {
    if actual == wanted {
        return true;
    }
    match (actual, wanted) {
        (Value::String(_), Value::String(_)) => false,
        (actual, Value::String(wanted)) => actual.to_string() == *wanted,
        (Value::String(actual), wanted) => *actual == wanted.to_string(),
        _ => false,
    }
}

fn property_matches(actual: Option<&Value>, values: &[Value]) -> bool {
    match actual {
        None => false,
        Some(actual) => values.is_empty() || values.iter().any(|v| value_matches(actual, v)),
    }
}

/// Applies [`Query`] trees to a [`GraphRead`].
///
/// Fragments in [`FragmentRole::Path`] jump: a path lookup replaces the current position and
/// type or id lookups on an unbounded position go straight to the index.  Fragments in
/// [`FragmentRole::Filter`] only ever narrow.  All other filters behave the same in both roles.
pub struct FilterApplicator<'g> {
    graph: &'g dyn GraphRead,
}

impl<'g> FilterApplicator<'g> {
    pub fn new(graph: &'g dyn GraphRead) -> Self {
        Self { graph }
    }

    /// runs the whole tree from `start`; sub trees run on copies of the position and are unioned
    pub fn apply_all(&self, query: &Query, start: Reached) -> Result<Reached, GraphErr> {
        let mut reached = start;
        for fragment in query.fragments() {
            reached = self.apply(fragment, reached)?;
        }
        match query.sub_trees() {
            [] => Ok(reached),
            [single] => self.apply_all(single, reached),
            branches => {
                let mut merged = Reached::empty();
                for branch in branches {
                    merged = merged.union(self.apply_all(branch, reached.clone())?);
                }
                Ok(merged)
            }
        }
    }

    /// the elements `query` leads to, starting from everything
    pub fn elements(&self, query: &Query) -> Result<BTreeSet<ElementId>, GraphErr> {
        let reached = self.apply_all(query, Reached::Unbounded)?;
        self.materialize(reached)
    }

    pub fn vertices(&self, query: &Query) -> Result<Vec<VertexId>, GraphErr> {
        Ok(self
            .elements(query)?
            .into_iter()
            .filter_map(|e| match e {
                ElementId::Vertex(v) => Some(v),
                ElementId::Edge(_) => None,
            })
            .collect())
    }

    pub fn edges(&self, query: &Query) -> Result<Vec<EdgeId>, GraphErr> {
        Ok(self
            .elements(query)?
            .into_iter()
            .filter_map(|e| match e {
                ElementId::Edge(e) => Some(e),
                ElementId::Vertex(_) => None,
            })
            .collect())
    }

    /// the vertex stored at `path`, if any
    pub fn resolve(&self, path: &CanonicalPath) -> Result<Option<VertexId>, GraphErr> {
        Ok(self
            .graph
            .vertices_by(schema::CP, &Value::String(path.to_string()))?
            .into_iter()
            .next())
    }

    pub fn apply(&self, fragment: &QueryFragment, reached: Reached) -> Result<Reached, GraphErr> {
        trace!("applying {}", fragment);
        self.apply_filter(fragment.role, &fragment.filter, reached)
    }

    fn apply_filter(
        &self,
        role: FragmentRole,
        filter: &Filter,
        reached: Reached,
    ) -> Result<Reached, GraphErr> {
        match (role, filter) {
            (FragmentRole::Path, Filter::WithCanonicalPaths(paths)) => self.lookup_paths(paths),
            (FragmentRole::Path, Filter::WithTypes(types)) if reached == Reached::Unbounded => {
                let mut found = BTreeSet::new();
                for segment_type in types {
                    found.extend(self.lookup_type(*segment_type)?);
                }
                Ok(Reached::Elements(found))
            }
            (FragmentRole::Path, Filter::WithIds(ids)) if reached == Reached::Unbounded => {
                let mut found = BTreeSet::new();
                for id in ids {
                    let id = Value::String(id.clone());
                    found.extend(self.graph.vertices_by(schema::EID, &id)?.into_iter().map(ElementId::Vertex));
                    found.extend(self.graph.edges_by(schema::EID, &id)?.into_iter().map(ElementId::Edge));
                }
                Ok(Reached::Elements(found))
            }
            (_, Filter::RelatedBy {
                relationship,
                role,
                other_end: None,
            }) => self.hop(relationship, *role, reached),
            (_, Filter::RelatedBy {
                relationship,
                role,
                other_end: Some(other_end),
            }) => self.related_with(relationship, *role, other_end, reached),
            (_, Filter::SwitchElementType { direction, from_edge }) => {
                self.switch(*direction, *from_edge, reached)
            }
            (_, Filter::Recurse(chain)) => self.recurse(role, chain, reached),
            (_, Filter::Identical) => self.identical(reached),
            (_, Filter::Noop) => Ok(reached),
            (_, filter) => self.narrow(filter, reached),
        }
    }

    fn lookup_paths(&self, paths: &[CanonicalPath]) -> Result<Reached, GraphErr> {
        let mut found = BTreeSet::new();
        for path in paths {
            match path.segment_type() {
                SegmentType::Relationship => {
                    let id = Value::String(path.id().to_string());
                    found.extend(self.graph.edges_by(schema::EID, &id)?.into_iter().map(ElementId::Edge));
                }
                _ => {
                    if let Some(vertex) = self.resolve(path)? {
                        found.insert(ElementId::Vertex(vertex));
                    }
                }
            }
        }
        Ok(Reached::Elements(found))
    }

    fn lookup_type(&self, segment_type: SegmentType) -> Result<Vec<ElementId>, GraphErr> {
        Ok(match segment_type {
            SegmentType::Relationship => self
                .graph
                .edge_ids()?
                .into_iter()
                .map(ElementId::Edge)
                .collect(),
            _ => self
                .graph
                .vertices_by(schema::TYPE, &Value::String(segment_type.code().to_string()))?
                .into_iter()
                .map(ElementId::Vertex)
                .collect(),
        })
    }

    fn materialize(&self, reached: Reached) -> Result<BTreeSet<ElementId>, GraphErr> {
        Ok(match reached {
            Reached::Unbounded => self
                .graph
                .vertex_ids()?
                .into_iter()
                .map(ElementId::Vertex)
                .collect(),
            Reached::Elements(elements) => elements,
        })
    }

    fn relation_matches(&self, relationship: &RelationRef, edge: EdgeId) -> Result<bool, GraphErr> {
        Ok(match relationship {
            RelationRef::Name(_) => true,
            RelationRef::Id(id) => self
                .graph
                .edge(edge)?
                .map(|e| schema::edge_id(&e) == Some(id.as_str()))
                .unwrap_or(false),
        })
    }

    fn label(relationship: &RelationRef) -> Option<&str> {
        match relationship {
            RelationRef::Name(name) => Some(name.as_str()),
            RelationRef::Id(_) => None,
        }
    }

    fn hop(
        &self,
        relationship: &RelationRef,
        role: EntityRole,
        reached: Reached,
    ) -> Result<Reached, GraphErr> {
        let mut found = BTreeSet::new();
        for element in self.materialize(reached)? {
            if let ElementId::Vertex(vertex) = element {
                for edge in self
                    .graph
                    .edges_of(vertex, role.direction(), Self::label(relationship))?
                {
                    if !self.relation_matches(relationship, edge)? {
                        continue;
                    }
                    if let Some(edge) = self.graph.edge(edge)? {
                        found.insert(ElementId::Vertex(edge.other_end(vertex)));
                    }
                }
            }
        }
        Ok(Reached::Elements(found))
    }

    fn related_with(
        &self,
        relationship: &RelationRef,
        role: EntityRole,
        other_end: &CanonicalPath,
        reached: Reached,
    ) -> Result<Reached, GraphErr> {
        let other = match self.resolve(other_end)? {
            Some(other) => other,
            None => return Ok(Reached::empty()),
        };
        let mut kept = BTreeSet::new();
        for element in self.materialize(reached)? {
            if let ElementId::Vertex(vertex) = element {
                for edge in self
                    .graph
                    .edges_of(vertex, role.direction(), Self::label(relationship))?
                {
                    if !self.relation_matches(relationship, edge)? {
                        continue;
                    }
                    if let Some(edge) = self.graph.edge(edge)? {
                        if edge.other_end(vertex) == other {
                            kept.insert(element);
                            break;
                        }
                    }
                }
            }
        }
        Ok(Reached::Elements(kept))
    }

    fn switch(
        &self,
        direction: Direction,
        from_edge: bool,
        reached: Reached,
    ) -> Result<Reached, GraphErr> {
        let mut found = BTreeSet::new();
        for element in self.materialize(reached)? {
            match (element, from_edge) {
                (ElementId::Vertex(vertex), false) => {
                    for edge in self.graph.edges_of(vertex, direction, None)? {
                        found.insert(ElementId::Edge(edge));
                    }
                }
                (ElementId::Edge(edge), true) => {
                    if let Some(edge) = self.graph.edge(edge)? {
                        match direction {
                            Direction::Outgoing => {
                                found.insert(ElementId::Vertex(edge.target));
                            }
                            Direction::Incoming => {
                                found.insert(ElementId::Vertex(edge.source));
                            }
                            Direction::Both => {
                                found.insert(ElementId::Vertex(edge.source));
                                found.insert(ElementId::Vertex(edge.target));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(Reached::Elements(found))
    }

    /// zero or more applications of `chain`
    fn recurse(
        &self,
        role: FragmentRole,
        chain: &[Filter],
        reached: Reached,
    ) -> Result<Reached, GraphErr> {
        if reached == Reached::Unbounded {
            return Ok(reached);
        }
        let mut all = self.materialize(reached)?;
        let mut frontier = all.clone();
        while !frontier.is_empty() {
            let mut next = Reached::Elements(frontier);
            for filter in chain {
                next = self.apply_filter(role, filter, next)?;
            }
            let next = self.materialize(next)?;
            frontier = next.difference(&all).cloned().collect();
            all.extend(frontier.iter().cloned());
        }
        Ok(Reached::Elements(all))
    }

    fn identical(&self, reached: Reached) -> Result<Reached, GraphErr> {
        let mut memo = BTreeMap::new();
        let mut wanted: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for element in self.materialize(reached)? {
            if let ElementId::Vertex(vertex) = element {
                if let Some(v) = self.graph.vertex(vertex)? {
                    if let Some(code) = v.str(schema::TYPE) {
                        let hash = self.identity_hash(vertex, &mut memo)?;
                        wanted.entry(code.to_string()).or_default().insert(hash);
                    }
                }
            }
        }
        let mut found = BTreeSet::new();
        for (code, hashes) in wanted {
            for candidate in self
                .graph
                .vertices_by(schema::TYPE, &Value::String(code))?
            {
                if hashes.contains(&self.identity_hash(candidate, &mut memo)?) {
                    found.insert(ElementId::Vertex(candidate));
                }
            }
        }
        Ok(Reached::Elements(found))
    }

    /// md5 over the type, id and structural properties of a vertex and the sorted identity
    /// hashes of everything it contains
    pub fn identity_hash(
        &self,
        vertex: VertexId,
        memo: &mut BTreeMap<VertexId, String>,
    ) -> Result<String, GraphErr> {
        if let Some(hash) = memo.get(&vertex) {
            return Ok(hash.clone());
        }
        let v = self
            .graph
            .vertex(vertex)?
            .ok_or(GraphErr::VertexNotFound(vertex))?;
        let mut hasher = Md5::new();
        hasher.update(v.str(schema::TYPE).unwrap_or_default().as_bytes());
        hasher.update(b"|");
        hasher.update(v.str(schema::EID).unwrap_or_default().as_bytes());
        for (key, value) in schema::structural_properties(&v.properties) {
            hasher.update(b"|");
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.to_string().as_bytes());
        }
        let mut children = vec![];
        for edge in self
            .graph
            .edges_of(vertex, Direction::Outgoing, Some(WellKnown::Contains.as_str()))?
        {
            if let Some(edge) = self.graph.edge(edge)? {
                children.push(self.identity_hash(edge.target, memo)?);
            }
        }
        children.sort();
        for child in children {
            hasher.update(b"|");
            hasher.update(child.as_bytes());
        }
        let hash = format!("{:x}", hasher.finalize());
        memo.insert(vertex, hash.clone());
        Ok(hash)
    }

    fn narrow(&self, filter: &Filter, reached: Reached) -> Result<Reached, GraphErr> {
        let mut kept = BTreeSet::new();
        for element in self.materialize(reached)? {
            if self.keep(filter, element)? {
                kept.insert(element);
            }
        }
        Ok(Reached::Elements(kept))
    }

    fn keep(&self, filter: &Filter, element: ElementId) -> Result<bool, GraphErr> {
        match element {
            ElementId::Vertex(id) => {
                let vertex = match self.graph.vertex(id)? {
                    Some(vertex) => vertex,
                    None => return Ok(false),
                };
                Ok(match filter {
                    Filter::WithIds(ids) => schema::vertex_id(&vertex)
                        .map(|eid| ids.iter().any(|id| id == eid))
                        .unwrap_or(false),
                    Filter::WithTypes(types) => schema::vertex_type(&vertex)
                        .map(|t| types.contains(&t))
                        .unwrap_or(false),
                    Filter::WithCanonicalPaths(paths) => vertex
                        .str(schema::CP)
                        .map(|cp| paths.iter().any(|p| p.to_string() == cp))
                        .unwrap_or(false),
                    Filter::WithProperty { name, values } => {
                        property_matches(vertex.property(name), values)
                    }
                    Filter::DefinedBy(path) => match self.resolve(path)? {
                        None => false,
                        Some(definer) => {
                            let mut defined = false;
                            for edge in self.graph.edges_of(
                                id,
                                Direction::Incoming,
                                Some(WellKnown::Defines.as_str()),
                            )? {
                                if let Some(edge) = self.graph.edge(edge)? {
                                    if edge.source == definer {
                                        defined = true;
                                        break;
                                    }
                                }
                            }
                            defined
                        }
                    },
                    // relationship filters let entities through
                    _ => true,
                })
            }
            ElementId::Edge(id) => {
                let edge = match self.graph.edge(id)? {
                    Some(edge) => edge,
                    None => return Ok(false),
                };
                Ok(match filter {
                    Filter::WithIds(ids) | Filter::RelationWithIds(ids) => schema::edge_id(&edge)
                        .map(|eid| ids.iter().any(|id| id == eid))
                        .unwrap_or(false),
                    Filter::WithTypes(types) => types.contains(&SegmentType::Relationship),
                    Filter::WithCanonicalPaths(paths) => schema::edge_id(&edge)
                        .map(|eid| {
                            paths.iter().any(|p| {
                                p.segment_type() == SegmentType::Relationship && p.id() == eid
                            })
                        })
                        .unwrap_or(false),
                    Filter::RelationWithNames(names) => names.iter().any(|n| *n == edge.label),
                    Filter::WithProperty { name, values }
                    | Filter::RelationWithProperties { name, values } => {
                        property_matches(edge.property(name), values)
                    }
                    Filter::RelationWithSourceTypes(types) => {
                        self.end_has_type(edge.source, types)?
                    }
                    Filter::RelationWithTargetTypes(types) => {
                        self.end_has_type(edge.target, types)?
                    }
                    Filter::DefinedBy(_) => false,
                    _ => true,
                })
            }
        }
    }

    fn end_has_type(&self, vertex: VertexId, types: &[SegmentType]) -> Result<bool, GraphErr> {
        Ok(self
            .graph
            .vertex(vertex)?
            .and_then(|v| schema::vertex_type(&v))
            .map(|t| types.contains(&t))
            .unwrap_or(false))
    }
}
