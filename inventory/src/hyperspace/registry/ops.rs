//! The mutations behind the entity and relationship services.
//!
//! Everything here works inside a transaction handed in by the caller and either completes or
//! returns an error before touching the graph in a way the caller could observe after a
//! rollback.  Validation always precedes mutation.

use crate::hyperspace::compiler::FilterApplicator;
use crate::hyperspace::err::InvErr;
use crate::hyperspace::registry::kinds::{relationship, EntityKind};
use crate::hyperspace::schema;
use crate::hyperspace::substrate::{EdgeId, GraphRead, GraphTx, VertexId};
use crate::space::entity::{is_reserved, Properties, Relationship};
use crate::space::kind::{Direction, SegmentType, WellKnown};
use crate::space::point::CanonicalPath;
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;
use uuid::Uuid;

/// property names a relationship may not carry besides the reserved ones
const RELATIONSHIP_STRUCTURAL: [&str; 2] = ["source", "target"];

pub fn locate(graph: &dyn GraphRead, path: &CanonicalPath) -> Result<Option<VertexId>, InvErr> {
    Ok(FilterApplicator::new(graph).resolve(path)?)
}

pub fn require(graph: &dyn GraphRead, path: &CanonicalPath) -> Result<VertexId, InvErr> {
    locate(graph, path)?.ok_or_else(|| InvErr::not_found(path))
}

pub fn path_of(graph: &dyn GraphRead, vertex: VertexId) -> Result<CanonicalPath, InvErr> {
    graph
        .vertex(vertex)?
        .as_ref()
        .and_then(schema::vertex_path)
        .ok_or_else(|| InvErr::illegal_argument(format!("vertex {} is not an entity", vertex)))
}

fn check_properties(properties: &Properties, structural: &[&str]) -> Result<(), InvErr> {
    match properties.keys().find(|key| is_reserved(key, structural)) {
        Some(key) => Err(InvErr::illegal_argument(format!(
            "'{}' is a reserved property name",
            key
        ))),
        None => Ok(()),
    }
}

fn check_structural(path: &CanonicalPath, structural: &Properties) -> Result<(), InvErr> {
    if let Some(interval) = structural.get(schema::COLLECTION_INTERVAL) {
        match interval.as_i64() {
            Some(seconds) if seconds > 0 => {}
            _ => {
                return Err(InvErr::illegal_argument(format!(
                    "collection interval of '{}' must be a positive number of seconds, got {}",
                    path, interval
                )))
            }
        }
    }
    Ok(())
}

fn check_same_tenant(a: &CanonicalPath, b: &CanonicalPath) -> Result<(), InvErr> {
    if a.tenant_id() != b.tenant_id() {
        return Err(InvErr::illegal_argument(format!(
            "'{}' and '{}' belong to different tenants",
            a, b
        )));
    }
    Ok(())
}

fn edge_properties(mut properties: Properties) -> Properties {
    properties.insert(
        schema::EID.to_string(),
        Value::from(Uuid::new_v4().to_string()),
    );
    properties
}

/// the first `name` edge from `source` to `target`
pub fn find_edge(
    graph: &dyn GraphRead,
    name: &str,
    source: VertexId,
    target: VertexId,
) -> Result<Option<EdgeId>, InvErr> {
    for id in graph.edges_of(source, Direction::Outgoing, Some(name))? {
        if let Some(edge) = graph.edge(id)? {
            if edge.target == target {
                return Ok(Some(id));
            }
        }
    }
    Ok(None)
}

/// `root` followed by everything it transitively contains, breadth first
pub fn contained_closure(graph: &dyn GraphRead, root: VertexId) -> Result<Vec<VertexId>, InvErr> {
    let mut seen = BTreeSet::from([root]);
    let mut queue = VecDeque::from([root]);
    let mut rtn = vec![];
    while let Some(vertex) = queue.pop_front() {
        rtn.push(vertex);
        for id in graph.edges_of(vertex, Direction::Outgoing, Some(WellKnown::Contains.as_str()))? {
            if let Some(edge) = graph.edge(id)? {
                if seen.insert(edge.target) {
                    queue.push_back(edge.target);
                }
            }
        }
    }
    Ok(rtn)
}

/// whether `ancestor` is reachable from `vertex` by walking `contains` edges backwards
fn is_contained_in(graph: &dyn GraphRead, vertex: VertexId, ancestor: VertexId) -> Result<bool, InvErr> {
    let mut seen = BTreeSet::new();
    let mut current = vec![vertex];
    while let Some(vertex) = current.pop() {
        if vertex == ancestor {
            return Ok(true);
        }
        if !seen.insert(vertex) {
            continue;
        }
        for id in graph.edges_of(vertex, Direction::Incoming, Some(WellKnown::Contains.as_str()))? {
            if let Some(edge) = graph.edge(id)? {
                current.push(edge.source);
            }
        }
    }
    Ok(false)
}

/// Creates an entity of kind `K` under `parent` (tenants have none) and returns its path.
pub fn create<K: EntityKind>(
    tx: &mut dyn GraphTx,
    parent: Option<&CanonicalPath>,
    blueprint: &K::Blueprint,
) -> Result<CanonicalPath, InvErr> {
    let id = K::id(blueprint);
    if id.is_empty() {
        return Err(InvErr::illegal_argument(format!(
            "a {} needs a non empty id",
            K::SEGMENT
        )));
    }
    let path = match parent {
        Some(parent) => parent.extend(K::SEGMENT, &id)?,
        None if K::SEGMENT.is_root() => CanonicalPath::extender().extend(K::SEGMENT, &id)?.get()?,
        None => {
            return Err(InvErr::illegal_argument(format!(
                "a {} cannot be created without a parent",
                K::SEGMENT
            )))
        }
    };

    check_properties(K::properties(blueprint), K::STRUCTURAL)?;
    let structural = K::structural(blueprint)?;
    check_structural(&path, &structural)?;

    if locate(tx.as_read(), &path)?.is_some() {
        return Err(InvErr::already_exists(&path));
    }

    let mut links = vec![];
    let parent_vertex = match parent {
        Some(parent) => {
            let parent_vertex = require(tx.as_read(), parent)?;
            let mut seen = BTreeSet::new();
            for link in K::links(blueprint, parent)? {
                check_same_tenant(&path, &link.other)?;
                let other = require(tx.as_read(), &link.other)?;
                if seen.insert((link.name.as_str(), other)) {
                    links.push((link, other));
                }
            }
            Some(parent_vertex)
        }
        None => None,
    };

    let mut properties = K::properties(blueprint).clone();
    properties.extend(structural);
    properties.insert(schema::TYPE.to_string(), Value::from(K::SEGMENT.code()));
    properties.insert(schema::EID.to_string(), Value::from(id));
    properties.insert(schema::CP.to_string(), Value::from(path.to_string()));
    if let Some(name) = K::name(blueprint) {
        properties.insert(schema::NAME.to_string(), Value::from(name));
    }

    let vertex = tx.add_vertex(properties)?;
    if let Some(parent_vertex) = parent_vertex {
        tx.add_edge(
            WellKnown::Contains.as_str(),
            parent_vertex,
            vertex,
            edge_properties(Properties::new()),
        )?;
    }
    for (link, other) in links {
        let (source, target) = match link.direction {
            Direction::Outgoing => (vertex, other),
            _ => (other, vertex),
        };
        tx.add_edge(
            link.name.as_str(),
            source,
            target,
            edge_properties(Properties::new()),
        )?;
    }
    debug!("created {}", path);
    Ok(path)
}

/// Applies `update` to the entity of kind `K` at `path`.
pub fn update<K: EntityKind>(
    tx: &mut dyn GraphTx,
    path: &CanonicalPath,
    update: &K::Update,
) -> Result<(), InvErr> {
    if path.segment_type() != K::SEGMENT {
        return Err(InvErr::not_found(path));
    }
    let vertex = require(tx.as_read(), path)?;
    let parts = K::update_parts(update)?;
    check_structural(path, &parts.structural)?;

    if let Some(properties) = &parts.properties {
        check_properties(properties, K::STRUCTURAL)?;
        let current = tx
            .vertex(vertex)?
            .map(|v| schema::user_properties(&v.properties))
            .unwrap_or_default();
        for key in current.keys().filter(|key| !properties.contains_key(*key)) {
            tx.remove_vertex_property(vertex, key)?;
        }
        for (key, value) in properties {
            tx.set_vertex_property(vertex, key, value.clone())?;
        }
    }
    if let Some(name) = parts.name {
        tx.set_vertex_property(vertex, schema::NAME, Value::from(name))?;
    }
    for (key, value) in parts.structural {
        tx.set_vertex_property(vertex, &key, value)?;
    }
    debug!("updated {}", path);
    Ok(())
}

/// Deletes the entity at `path` along with everything it transitively contains.
///
/// Fails without removing anything when an entity below `path` defines an entity that would
/// survive.  Returns the removed paths, `path` first.
pub fn delete(tx: &mut dyn GraphTx, path: &CanonicalPath) -> Result<Vec<CanonicalPath>, InvErr> {
    let root = require(tx.as_read(), path)?;
    let subtree = contained_closure(tx.as_read(), root)?;
    let members: BTreeSet<VertexId> = subtree.iter().copied().collect();

    for vertex in subtree.iter().copied().filter(|v| *v != root) {
        for id in tx.edges_of(vertex, Direction::Outgoing, Some(WellKnown::Defines.as_str()))? {
            if let Some(edge) = tx.edge(id)? {
                if !members.contains(&edge.target) {
                    let blocker = path_of(tx.as_read(), vertex)?;
                    let defined = path_of(tx.as_read(), edge.target)?;
                    return Err(InvErr::illegal_state(
                        &blocker,
                        format!(
                            "it defines '{}' which would outlive the deletion of '{}'",
                            defined, path
                        ),
                    ));
                }
            }
        }
    }

    let mut removed = vec![];
    for vertex in &subtree {
        removed.push(path_of(tx.as_read(), *vertex)?);
    }
    for vertex in subtree.into_iter().rev() {
        tx.remove_vertex(vertex)?;
    }
    debug!("deleted {} entities under {}", removed.len(), path);
    Ok(removed)
}

/// Adds a `name` relationship from `source` to `target`.
///
/// A second `contains` into an already contained target and a `contains` that would close a
/// cycle both fail with [`InvErr::IllegalArgument`].  Both are refusals of the requested link
/// rather than a store found in a bad state, so the argument error is used here even though
/// an inconsistent containment tree would otherwise read as [`InvErr::IllegalState`].
pub fn link(
    tx: &mut dyn GraphTx,
    name: &str,
    source: &CanonicalPath,
    target: &CanonicalPath,
    properties: Properties,
) -> Result<Relationship, InvErr> {
    if name.is_empty() {
        return Err(InvErr::illegal_argument("relationships need a name"));
    }
    check_properties(&properties, &RELATIONSHIP_STRUCTURAL)?;
    if source == target {
        return Err(InvErr::illegal_argument(format!(
            "'{}' cannot be related to itself",
            source
        )));
    }
    check_same_tenant(source, target)?;
    let source_vertex = require(tx.as_read(), source)?;
    let target_vertex = require(tx.as_read(), target)?;

    if find_edge(tx.as_read(), name, source_vertex, target_vertex)?.is_some() {
        return Err(InvErr::RelationAlreadyExists {
            name: name.to_string(),
            from: source.clone(),
            to: target.clone(),
        });
    }

    if name == WellKnown::Contains.as_str() {
        if let Some(id) = tx
            .edges_of(target_vertex, Direction::Incoming, Some(name))?
            .into_iter()
            .next()
        {
            let owner = match tx.edge(id)? {
                Some(edge) => path_of(tx.as_read(), edge.source)?.to_string(),
                None => "another entity".to_string(),
            };
            return Err(InvErr::illegal_argument(format!(
                "'{}' is already contained in '{}'",
                target, owner
            )));
        }
        if is_contained_in(tx.as_read(), source_vertex, target_vertex)? {
            return Err(InvErr::illegal_argument(format!(
                "'{}' contains '{}'; containing it back would form a cycle",
                target, source
            )));
        }
    }

    let id = tx.add_edge(name, source_vertex, target_vertex, edge_properties(properties))?;
    let edge = tx
        .edge(id)?
        .ok_or_else(|| InvErr::RelationIdNotFound(id.to_string()))?;
    debug!("linked {} -{}-> {}", source, name, target);
    relationship(tx.as_read(), &edge)
}

/// Removes the `name` relationship from `source` to `target`.
pub fn unlink(
    tx: &mut dyn GraphTx,
    name: &str,
    source: &CanonicalPath,
    target: &CanonicalPath,
) -> Result<(), InvErr> {
    let not_found = || InvErr::RelationNotFound {
        name: name.to_string(),
        from: source.to_string(),
        to: target.to_string(),
    };
    let source_vertex = locate(tx.as_read(), source)?.ok_or_else(not_found)?;
    let target_vertex = locate(tx.as_read(), target)?.ok_or_else(not_found)?;
    let edge = find_edge(tx.as_read(), name, source_vertex, target_vertex)?.ok_or_else(not_found)?;
    if name == WellKnown::Contains.as_str() {
        return Err(InvErr::illegal_argument(format!(
            "'{}' cannot be detached from '{}'; delete it instead",
            target, source
        )));
    }
    tx.remove_edge(edge)?;
    debug!("unlinked {} -{}-> {}", source, name, target);
    Ok(())
}

/// the edge holding the relationship with id `id`
pub fn find_relationship(graph: &dyn GraphRead, id: &str) -> Result<EdgeId, InvErr> {
    graph
        .edges_by(schema::EID, &Value::from(id))?
        .into_iter()
        .next()
        .ok_or_else(|| InvErr::RelationIdNotFound(id.to_string()))
}

/// replaces the user properties of a relationship
pub fn update_relationship(
    tx: &mut dyn GraphTx,
    id: &str,
    properties: &Properties,
) -> Result<Relationship, InvErr> {
    check_properties(properties, &RELATIONSHIP_STRUCTURAL)?;
    let edge_id = find_relationship(tx.as_read(), id)?;
    let current = tx
        .edge(edge_id)?
        .ok_or_else(|| InvErr::RelationIdNotFound(id.to_string()))?;
    for key in schema::user_properties(&current.properties)
        .keys()
        .filter(|key| !properties.contains_key(*key))
    {
        tx.remove_edge_property(edge_id, key)?;
    }
    for (key, value) in properties {
        tx.set_edge_property(edge_id, key, value.clone())?;
    }
    let edge = tx
        .edge(edge_id)?
        .ok_or_else(|| InvErr::RelationIdNotFound(id.to_string()))?;
    relationship(tx.as_read(), &edge)
}

pub fn delete_relationship(tx: &mut dyn GraphTx, id: &str) -> Result<(), InvErr> {
    let edge_id = find_relationship(tx.as_read(), id)?;
    let edge = tx
        .edge(edge_id)?
        .ok_or_else(|| InvErr::RelationIdNotFound(id.to_string()))?;
    if edge.label == WellKnown::Contains.as_str() {
        return Err(InvErr::illegal_argument(format!(
            "relationship '{}' is a containment; delete the contained entity instead",
            id
        )));
    }
    tx.remove_edge(edge_id)?;
    Ok(())
}

/// checks that entities of type `child` may live directly under `parent`
pub fn check_containment(parent: &CanonicalPath, child: SegmentType) -> Result<(), InvErr> {
    if parent.segment_type().can_contain(&child) {
        Ok(())
    } else {
        Err(InvErr::illegal_argument(format!(
            "a {} cannot contain a {}",
            parent.segment_type(),
            child
        )))
    }
}

#[cfg(test)]
pub mod test {
    use crate::hyperspace::err::InvErr;
    use crate::hyperspace::registry::kinds::{
        DataEntities, Environments, Materialize, MetricTypes, Metrics, OperationTypes,
        ResourceTypes, Resources, Tenants,
    };
    use crate::hyperspace::registry::ops;
    use crate::hyperspace::substrate::mem::MemorySubstrate;
    use crate::hyperspace::substrate::{ElementId, GraphSubstrate, GraphTx};
    use crate::space::entity::{
        DataEntityBlueprint, EnvironmentBlueprint, MetricBlueprint, MetricTypeBlueprint,
        OperationTypeBlueprint, Properties, ResourceBlueprint, ResourceTypeBlueprint,
        TenantBlueprint, Update,
    };
    use crate::space::kind::{DataRole, MetricDataType, MetricUnit};
    use crate::space::point::CanonicalPath;
    use core::str::FromStr;
    use serde_json::json;

    fn cp(text: &str) -> CanonicalPath {
        CanonicalPath::from_str(text).unwrap()
    }

    /// t1 with environment e1 holding host r1 (of rt1) and its metric m1 (of mt1)
    fn populate(tx: &mut dyn GraphTx) -> Result<(), InvErr> {
        let t1 = ops::create::<Tenants>(tx, None, &TenantBlueprint::new("t1"))?;
        let e1 = ops::create::<Environments>(tx, Some(&t1), &EnvironmentBlueprint::new("e1"))?;
        ops::create::<MetricTypes>(
            tx,
            Some(&t1),
            &MetricTypeBlueprint::new("mt1", MetricUnit::Milliseconds, MetricDataType::Gauge),
        )?;
        let mut rt1 = ResourceTypeBlueprint::new("rt1");
        rt1.metric_types.push("mt1".to_string());
        ops::create::<ResourceTypes>(tx, Some(&t1), &rt1)?;
        let r1 = ops::create::<Resources>(tx, Some(&e1), &ResourceBlueprint::new("r1", "/t;t1/rt;rt1"))?;
        ops::create::<Metrics>(tx, Some(&r1), &MetricBlueprint::new("m1", "/t;t1/mt;mt1"))?;
        Ok(())
    }

    fn entity<K: Materialize>(
        tx: &dyn GraphTx,
        path: &str,
    ) -> Result<Option<K::Entity>, InvErr> {
        match ops::locate(tx.as_read(), &cp(path))? {
            Some(vertex) => K::materialize(tx.as_read(), ElementId::Vertex(vertex)),
            None => Ok(None),
        }
    }

    #[tokio::test]
    pub async fn test_create() -> Result<(), InvErr> {
        let substrate = MemorySubstrate::new();
        let mut tx = substrate.begin().await?;
        populate(tx.as_mut())?;

        let resource = entity::<Resources>(tx.as_ref(), "/t;t1/e;e1/r;r1")?.unwrap();
        assert_eq!(resource.resource_type, Some(cp("/t;t1/rt;rt1")));

        let resource_type = entity::<ResourceTypes>(tx.as_ref(), "/t;t1/rt;rt1")?.unwrap();
        assert_eq!(resource_type.metric_types, vec![cp("/t;t1/mt;mt1")]);

        let metric = entity::<Metrics>(tx.as_ref(), "/t;t1/e;e1/r;r1/m;m1")?.unwrap();
        assert_eq!(metric.metric_type, Some(cp("/t;t1/mt;mt1")));

        let metric_type = entity::<MetricTypes>(tx.as_ref(), "/t;t1/mt;mt1")?.unwrap();
        assert_eq!(metric_type.unit, MetricUnit::Milliseconds);

        // the same entity cannot be created twice
        let err = ops::create::<Environments>(
            tx.as_mut(),
            Some(&cp("/t;t1")),
            &EnvironmentBlueprint::new("e1"),
        )
        .unwrap_err();
        assert!(matches!(err, InvErr::EntityAlreadyExists(_)));

        // the parent has to exist
        let err = ops::create::<Environments>(
            tx.as_mut(),
            Some(&cp("/t;nope")),
            &EnvironmentBlueprint::new("e1"),
        )
        .unwrap_err();
        assert!(err.is_not_found());

        // environments do not live under environments
        let err = ops::create::<Environments>(
            tx.as_mut(),
            Some(&cp("/t;t1/e;e1")),
            &EnvironmentBlueprint::new("e2"),
        )
        .unwrap_err();
        assert!(err.is_illegal_argument());

        let mut reserved = EnvironmentBlueprint::new("e3");
        reserved.properties.insert("__type".to_string(), json!("x"));
        let err = ops::create::<Environments>(tx.as_mut(), Some(&cp("/t;t1")), &reserved)
            .unwrap_err();
        assert!(err.is_illegal_argument());

        let mut interval = MetricBlueprint::new("m2", "/t;t1/mt;mt1");
        interval.collection_interval = Some(0);
        let err = ops::create::<Metrics>(tx.as_mut(), Some(&cp("/t;t1/e;e1/r;r1")), &interval)
            .unwrap_err();
        assert!(err.is_illegal_argument());
        Ok(())
    }

    #[tokio::test]
    pub async fn test_update() -> Result<(), InvErr> {
        let substrate = MemorySubstrate::new();
        let mut tx = substrate.begin().await?;
        populate(tx.as_mut())?;
        let e1 = cp("/t;t1/e;e1");

        ops::update::<Environments>(
            tx.as_mut(),
            &e1,
            &Update::new().with_name("Staging").with_property("zone", "a").with_property("tier", 2),
        )?;
        ops::update::<Environments>(
            tx.as_mut(),
            &e1,
            &Update::new().with_property("zone", "b"),
        )?;
        let environment = entity::<Environments>(tx.as_ref(), "/t;t1/e;e1")?.unwrap();
        assert_eq!(environment.name.as_deref(), Some("Staging"));
        let mut expected = Properties::new();
        expected.insert("zone".to_string(), json!("b"));
        assert_eq!(environment.properties, expected);

        let err = ops::update::<Environments>(
            tx.as_mut(),
            &e1,
            &Update::new().with_property("path", "/x"),
        )
        .unwrap_err();
        assert!(err.is_illegal_argument());

        let err = ops::update::<MetricTypes>(
            tx.as_mut(),
            &cp("/t;t1/mt;mt1"),
            &crate::space::entity::MetricTypeUpdate {
                update: Update::new().with_property("unit", "bytes"),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(err.is_illegal_argument());
        Ok(())
    }

    #[tokio::test]
    pub async fn test_delete_cascades() -> Result<(), InvErr> {
        let substrate = MemorySubstrate::new();
        let mut tx = substrate.begin().await?;
        populate(tx.as_mut())?;

        let removed = ops::delete(tx.as_mut(), &cp("/t;t1/e;e1"))?;
        assert_eq!(
            removed,
            vec![cp("/t;t1/e;e1"), cp("/t;t1/e;e1/r;r1"), cp("/t;t1/e;e1/r;r1/m;m1")]
        );
        assert!(ops::locate(tx.as_read(), &cp("/t;t1/e;e1/r;r1"))?.is_none());
        assert!(ops::locate(tx.as_read(), &cp("/t;t1/rt;rt1"))?.is_some());

        // a type may go while its instances stay
        populate_resource(tx.as_mut())?;
        ops::delete(tx.as_mut(), &cp("/t;t1/rt;rt1"))?;
        let resource = entity::<Resources>(tx.as_ref(), "/t;t1/e;e2/r;r2")?.unwrap();
        assert_eq!(resource.resource_type, None);
        Ok(())
    }

    fn populate_resource(tx: &mut dyn GraphTx) -> Result<(), InvErr> {
        let e2 = ops::create::<Environments>(tx, Some(&cp("/t;t1")), &EnvironmentBlueprint::new("e2"))?;
        ops::create::<Resources>(tx, Some(&e2), &ResourceBlueprint::new("r2", "/t;t1/rt;rt1"))?;
        Ok(())
    }

    #[tokio::test]
    pub async fn test_delete_blocked() -> Result<(), InvErr> {
        let substrate = MemorySubstrate::new();
        let mut tx = substrate.begin().await?;
        populate(tx.as_mut())?;
        let rt1 = cp("/t;t1/rt;rt1");
        let ot1 = ops::create::<OperationTypes>(tx.as_mut(), Some(&rt1), &OperationTypeBlueprint::new("ot1"))?;
        let rt2 = ops::create::<ResourceTypes>(
            tx.as_mut(),
            Some(&cp("/t;t1")),
            &ResourceTypeBlueprint::new("rt2"),
        )?;
        let data = ops::create::<DataEntities>(
            tx.as_mut(),
            Some(&rt2),
            &DataEntityBlueprint::new(DataRole::Configuration, json!({"port": 22})),
        )?;
        ops::link(tx.as_mut(), "defines", &ot1, &data, Properties::new())?;

        let err = ops::delete(tx.as_mut(), &rt1).unwrap_err();
        match err {
            InvErr::IllegalState { path, .. } => assert_eq!(path, ot1),
            other => panic!("unexpected {:?}", other),
        }
        assert!(ops::locate(tx.as_read(), &ot1)?.is_some());
        Ok(())
    }

    #[tokio::test]
    pub async fn test_link_checks() -> Result<(), InvErr> {
        let substrate = MemorySubstrate::new();
        let mut tx = substrate.begin().await?;
        populate(tx.as_mut())?;
        let t1 = cp("/t;t1");
        let e1 = cp("/t;t1/e;e1");
        let r1 = cp("/t;t1/e;e1/r;r1");

        let err = ops::link(tx.as_mut(), "contains", &t1, &e1, Properties::new()).unwrap_err();
        assert!(matches!(err, InvErr::RelationAlreadyExists { .. }));

        // cycle
        let err = ops::link(tx.as_mut(), "contains", &e1, &t1, Properties::new()).unwrap_err();
        assert!(err.is_illegal_argument());

        // r1 already has a container
        let err = ops::link(tx.as_mut(), "contains", &t1, &r1, Properties::new()).unwrap_err();
        assert!(err.is_illegal_argument());
        assert!(!matches!(err, InvErr::IllegalState { .. }));

        let err = ops::link(tx.as_mut(), "isParentOf", &r1, &r1, Properties::new()).unwrap_err();
        assert!(err.is_illegal_argument());

        let rel = ops::link(tx.as_mut(), "isParentOf", &e1, &r1, Properties::new())?;
        assert_eq!(rel.source, e1);
        let updated = ops::update_relationship(
            tx.as_mut(),
            &rel.id,
            &[("weight".to_string(), json!(3))].into_iter().collect(),
        )?;
        assert_eq!(updated.properties.get("weight"), Some(&json!(3)));

        ops::unlink(tx.as_mut(), "isParentOf", &e1, &r1)?;
        let err = ops::unlink(tx.as_mut(), "isParentOf", &e1, &r1).unwrap_err();
        assert!(matches!(err, InvErr::RelationNotFound { .. }));
        let err = ops::delete_relationship(tx.as_mut(), &rel.id).unwrap_err();
        assert!(matches!(err, InvErr::RelationIdNotFound(_)));
        let err = ops::unlink(tx.as_mut(), "contains", &t1, &e1).unwrap_err();
        assert!(err.is_illegal_argument());
        Ok(())
    }
}
