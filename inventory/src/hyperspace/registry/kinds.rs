use crate::hyperspace::err::InvErr;
use crate::hyperspace::schema;
use crate::hyperspace::substrate::{Edge, ElementId, GraphRead, Vertex};
use crate::space::entity::{
    DataEntity, DataEntityBlueprint, DataEntityUpdate, Element, Entity, Environment,
    EnvironmentBlueprint, Feed, FeedBlueprint, MetadataPack, MetadataPackBlueprint, Metric,
    MetricBlueprint, MetricType, MetricTypeBlueprint, MetricTypeUpdate, MetricUpdate,
    OperationType, OperationTypeBlueprint, Properties, Relationship, Resource,
    ResourceBlueprint, ResourceType, ResourceTypeBlueprint, Tenant, TenantBlueprint, Update,
};
use crate::space::kind::{DataRole, Direction, MetricDataType, MetricUnit, SegmentType, WellKnown};
use crate::space::point::CanonicalPath;
use core::str::FromStr;
use serde_json::Value;
use std::fmt::Debug;

/// Turns graph elements into typed values.
pub trait Materialize: Send + Sync + 'static {
    type Entity: Clone + Debug + Send + Sync;

    /// whether `element` is of this kind; cheaper than [`Materialize::materialize`]
    fn accepts(graph: &dyn GraphRead, element: ElementId) -> Result<bool, InvErr>;

    /// `None` when `element` is not of this kind
    fn materialize(graph: &dyn GraphRead, element: ElementId)
        -> Result<Option<Self::Entity>, InvErr>;
}

/// A relationship the registry creates along with a new entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub name: WellKnown,
    /// `Outgoing` when the new entity is the source
    pub direction: Direction,
    pub other: CanonicalPath,
}

impl Link {
    pub fn from_other(name: WellKnown, other: CanonicalPath) -> Self {
        Self {
            name,
            direction: Direction::Incoming,
            other,
        }
    }

    pub fn to_other(name: WellKnown, other: CanonicalPath) -> Self {
        Self {
            name,
            direction: Direction::Outgoing,
            other,
        }
    }
}

/// the parts of an update, in vertex terms
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateParts {
    pub name: Option<String>,
    pub properties: Option<Properties>,
    pub structural: Properties,
}

impl From<&Update> for UpdateParts {
    fn from(update: &Update) -> Self {
        Self {
            name: update.name.clone(),
            properties: update.properties.clone(),
            structural: Properties::new(),
        }
    }
}

/// The per-kind strategy the generic entity services are parameterized with.
pub trait EntityKind: Materialize {
    type Blueprint: Clone + Debug + Send + Sync;
    type Update: Clone + Debug + Default + Send + Sync;

    const SEGMENT: SegmentType;
    /// property names holding kind specific fields
    const STRUCTURAL: &'static [&'static str] = &[];

    fn id(blueprint: &Self::Blueprint) -> String;

    fn name(blueprint: &Self::Blueprint) -> Option<String>;

    fn properties(blueprint: &Self::Blueprint) -> &Properties;

    fn structural(_blueprint: &Self::Blueprint) -> Result<Properties, InvErr> {
        Ok(Properties::new())
    }

    /// relationships besides `contains` that come with a new entity under `parent`
    fn links(_blueprint: &Self::Blueprint, _parent: &CanonicalPath) -> Result<Vec<Link>, InvErr> {
        Ok(vec![])
    }

    fn update_parts(update: &Self::Update) -> Result<UpdateParts, InvErr>;

    fn from_record(record: &Record) -> Result<Self::Entity, InvErr>;
}

/// A vertex read back from the graph along with the means to look at its neighbours.
pub struct Record<'g> {
    pub graph: &'g dyn GraphRead,
    pub vertex: Vertex,
    pub path: CanonicalPath,
}

impl<'g> Record<'g> {
    pub fn new(graph: &'g dyn GraphRead, vertex: Vertex) -> Result<Self, InvErr> {
        let path = schema::vertex_path(&vertex).ok_or_else(|| {
            InvErr::illegal_argument(format!("vertex {} carries no canonical path", vertex.id))
        })?;
        Ok(Self {
            graph,
            vertex,
            path,
        })
    }

    pub fn name(&self) -> Option<String> {
        self.vertex.str(schema::NAME).map(|n| n.to_string())
    }

    pub fn properties(&self) -> Properties {
        schema::user_properties(&self.vertex.properties)
    }

    pub fn structural(&self, key: &str) -> Option<&Value> {
        self.vertex.property(key)
    }

    /// paths of the entities at the other end of `name` relationships in `direction`
    pub fn related(&self, name: WellKnown, direction: Direction) -> Result<Vec<CanonicalPath>, InvErr> {
        let mut rtn = vec![];
        for edge in self
            .graph
            .edges_of(self.vertex.id, direction, Some(name.as_str()))?
        {
            if let Some(edge) = self.graph.edge(edge)? {
                if let Some(other) = self.graph.vertex(edge.other_end(self.vertex.id))? {
                    if let Some(path) = schema::vertex_path(&other) {
                        rtn.push(path);
                    }
                }
            }
        }
        rtn.sort_by_key(|p| p.to_string());
        Ok(rtn)
    }

    /// the type entity that `defines` this one
    pub fn definer(&self) -> Result<Option<CanonicalPath>, InvErr> {
        Ok(self
            .related(WellKnown::Defines, Direction::Incoming)?
            .into_iter()
            .next())
    }
}

fn resolve_type(
    text: &str,
    parent: &CanonicalPath,
    expected: Option<SegmentType>,
) -> Result<CanonicalPath, InvErr> {
    let path = CanonicalPath::from_partially_untyped_string(text, Some(parent), expected)?;
    match expected {
        Some(expected) if path.segment_type() != expected => Err(InvErr::illegal_argument(
            format!("'{}' does not point to a {}", text, expected),
        )),
        _ => Ok(path),
    }
}

fn structural_value<T: FromStr>(record: &Record, key: &str) -> Option<T> {
    record
        .structural(key)
        .and_then(|v| v.as_str())
        .and_then(|s| T::from_str(s).ok())
}

/// implements [`Materialize`] for a kind by checking the vertex type and reading a [`Record`]
macro_rules! materialize_kind {
    ($kind:ident, $entity:ty) => {
        impl Materialize for $kind {
            type Entity = $entity;

            fn accepts(graph: &dyn GraphRead, element: ElementId) -> Result<bool, InvErr> {
                Ok(match element {
                    ElementId::Vertex(id) => graph
                        .vertex(id)?
                        .and_then(|v| schema::vertex_type(&v))
                        .map(|t| t == <$kind as EntityKind>::SEGMENT)
                        .unwrap_or(false),
                    ElementId::Edge(_) => false,
                })
            }

            fn materialize(
                graph: &dyn GraphRead,
                element: ElementId,
            ) -> Result<Option<Self::Entity>, InvErr> {
                if let ElementId::Vertex(id) = element {
                    if let Some(vertex) = graph.vertex(id)? {
                        if schema::vertex_type(&vertex) == Some(<$kind as EntityKind>::SEGMENT) {
                            let record = Record::new(graph, vertex)?;
                            return Ok(Some(<$kind as EntityKind>::from_record(&record)?));
                        }
                    }
                }
                Ok(None)
            }
        }
    };
}

/// kinds with no fields beyond name and properties
macro_rules! plain_kind {
    ($kind:ident, $entity:ident, $blueprint:ident, $segment:expr) => {
        pub struct $kind;

        materialize_kind!($kind, $entity);

        impl EntityKind for $kind {
            type Blueprint = $blueprint;
            type Update = Update;

            const SEGMENT: SegmentType = $segment;

            fn id(blueprint: &Self::Blueprint) -> String {
                blueprint.id.clone()
            }

            fn name(blueprint: &Self::Blueprint) -> Option<String> {
                blueprint.name.clone()
            }

            fn properties(blueprint: &Self::Blueprint) -> &Properties {
                &blueprint.properties
            }

            fn update_parts(update: &Self::Update) -> Result<UpdateParts, InvErr> {
                Ok(update.into())
            }

            fn from_record(record: &Record) -> Result<Self::Entity, InvErr> {
                Ok($entity {
                    path: record.path.clone(),
                    name: record.name(),
                    properties: record.properties(),
                })
            }
        }
    };
}

plain_kind!(Tenants, Tenant, TenantBlueprint, SegmentType::Tenant);
plain_kind!(
    Environments,
    Environment,
    EnvironmentBlueprint,
    SegmentType::Environment
);
plain_kind!(Feeds, Feed, FeedBlueprint, SegmentType::Feed);
plain_kind!(
    OperationTypes,
    OperationType,
    OperationTypeBlueprint,
    SegmentType::OperationType
);

pub struct ResourceTypes;

materialize_kind!(ResourceTypes, ResourceType);

impl EntityKind for ResourceTypes {
    type Blueprint = ResourceTypeBlueprint;
    type Update = Update;

    const SEGMENT: SegmentType = SegmentType::ResourceType;

    fn id(blueprint: &Self::Blueprint) -> String {
        blueprint.id.clone()
    }

    fn name(blueprint: &Self::Blueprint) -> Option<String> {
        blueprint.name.clone()
    }

    fn properties(blueprint: &Self::Blueprint) -> &Properties {
        &blueprint.properties
    }

    fn links(blueprint: &Self::Blueprint, parent: &CanonicalPath) -> Result<Vec<Link>, InvErr> {
        blueprint
            .metric_types
            .iter()
            .map(|mt| {
                Ok(Link::to_other(
                    WellKnown::Owns,
                    resolve_type(mt, parent, Some(SegmentType::MetricType))?,
                ))
            })
            .collect()
    }

    fn update_parts(update: &Self::Update) -> Result<UpdateParts, InvErr> {
        Ok(update.into())
    }

    fn from_record(record: &Record) -> Result<Self::Entity, InvErr> {
        Ok(ResourceType {
            path: record.path.clone(),
            name: record.name(),
            properties: record.properties(),
            metric_types: record.related(WellKnown::Owns, Direction::Outgoing)?,
        })
    }
}

pub struct MetricTypes;

materialize_kind!(MetricTypes, MetricType);

impl EntityKind for MetricTypes {
    type Blueprint = MetricTypeBlueprint;
    type Update = MetricTypeUpdate;

    const SEGMENT: SegmentType = SegmentType::MetricType;
    const STRUCTURAL: &'static [&'static str] = &["unit", "dataType", "collectionInterval"];

    fn id(blueprint: &Self::Blueprint) -> String {
        blueprint.id.clone()
    }

    fn name(blueprint: &Self::Blueprint) -> Option<String> {
        blueprint.name.clone()
    }

    fn properties(blueprint: &Self::Blueprint) -> &Properties {
        &blueprint.properties
    }

    fn structural(blueprint: &Self::Blueprint) -> Result<Properties, InvErr> {
        let mut rtn = Properties::new();
        rtn.insert(schema::UNIT.to_string(), Value::from(blueprint.unit.to_string()));
        rtn.insert(
            schema::DATA_TYPE.to_string(),
            Value::from(blueprint.data_type.to_string()),
        );
        if let Some(interval) = blueprint.collection_interval {
            rtn.insert(schema::COLLECTION_INTERVAL.to_string(), Value::from(interval));
        }
        Ok(rtn)
    }

    fn update_parts(update: &Self::Update) -> Result<UpdateParts, InvErr> {
        let mut parts: UpdateParts = (&update.update).into();
        if let Some(unit) = update.unit {
            parts
                .structural
                .insert(schema::UNIT.to_string(), Value::from(unit.to_string()));
        }
        if let Some(interval) = update.collection_interval {
            parts
                .structural
                .insert(schema::COLLECTION_INTERVAL.to_string(), Value::from(interval));
        }
        Ok(parts)
    }

    fn from_record(record: &Record) -> Result<Self::Entity, InvErr> {
        Ok(MetricType {
            path: record.path.clone(),
            name: record.name(),
            properties: record.properties(),
            unit: structural_value::<MetricUnit>(record, schema::UNIT).unwrap_or_default(),
            data_type: structural_value::<MetricDataType>(record, schema::DATA_TYPE)
                .unwrap_or_default(),
            collection_interval: record
                .structural(schema::COLLECTION_INTERVAL)
                .and_then(|v| v.as_i64()),
        })
    }
}

pub struct Resources;

materialize_kind!(Resources, Resource);

impl EntityKind for Resources {
    type Blueprint = ResourceBlueprint;
    type Update = Update;

    const SEGMENT: SegmentType = SegmentType::Resource;

    fn id(blueprint: &Self::Blueprint) -> String {
        blueprint.id.clone()
    }

    fn name(blueprint: &Self::Blueprint) -> Option<String> {
        blueprint.name.clone()
    }

    fn properties(blueprint: &Self::Blueprint) -> &Properties {
        &blueprint.properties
    }

    fn links(blueprint: &Self::Blueprint, parent: &CanonicalPath) -> Result<Vec<Link>, InvErr> {
        let resource_type = resolve_type(
            &blueprint.resource_type,
            parent,
            Some(SegmentType::ResourceType),
        )?;
        Ok(vec![Link::from_other(WellKnown::Defines, resource_type)])
    }

    fn update_parts(update: &Self::Update) -> Result<UpdateParts, InvErr> {
        Ok(update.into())
    }

    fn from_record(record: &Record) -> Result<Self::Entity, InvErr> {
        Ok(Resource {
            path: record.path.clone(),
            name: record.name(),
            properties: record.properties(),
            resource_type: record.definer()?,
        })
    }
}

pub struct Metrics;

materialize_kind!(Metrics, Metric);

impl EntityKind for Metrics {
    type Blueprint = MetricBlueprint;
    type Update = MetricUpdate;

    const SEGMENT: SegmentType = SegmentType::Metric;
    const STRUCTURAL: &'static [&'static str] = &["collectionInterval"];

    fn id(blueprint: &Self::Blueprint) -> String {
        blueprint.id.clone()
    }

    fn name(blueprint: &Self::Blueprint) -> Option<String> {
        blueprint.name.clone()
    }

    fn properties(blueprint: &Self::Blueprint) -> &Properties {
        &blueprint.properties
    }

    fn structural(blueprint: &Self::Blueprint) -> Result<Properties, InvErr> {
        let mut rtn = Properties::new();
        if let Some(interval) = blueprint.collection_interval {
            rtn.insert(schema::COLLECTION_INTERVAL.to_string(), Value::from(interval));
        }
        Ok(rtn)
    }

    fn links(blueprint: &Self::Blueprint, parent: &CanonicalPath) -> Result<Vec<Link>, InvErr> {
        let metric_type = resolve_type(
            &blueprint.metric_type,
            parent,
            Some(SegmentType::MetricType),
        )?;
        Ok(vec![Link::from_other(WellKnown::Defines, metric_type)])
    }

    fn update_parts(update: &Self::Update) -> Result<UpdateParts, InvErr> {
        let mut parts: UpdateParts = (&update.update).into();
        if let Some(interval) = update.collection_interval {
            parts
                .structural
                .insert(schema::COLLECTION_INTERVAL.to_string(), Value::from(interval));
        }
        Ok(parts)
    }

    fn from_record(record: &Record) -> Result<Self::Entity, InvErr> {
        Ok(Metric {
            path: record.path.clone(),
            name: record.name(),
            properties: record.properties(),
            metric_type: record.definer()?,
            collection_interval: record
                .structural(schema::COLLECTION_INTERVAL)
                .and_then(|v| v.as_i64()),
        })
    }
}

pub struct DataEntities;

materialize_kind!(DataEntities, DataEntity);

impl EntityKind for DataEntities {
    type Blueprint = DataEntityBlueprint;
    type Update = DataEntityUpdate;

    const SEGMENT: SegmentType = SegmentType::DataEntity;
    const STRUCTURAL: &'static [&'static str] = &["role", "value"];

    fn id(blueprint: &Self::Blueprint) -> String {
        blueprint.role.to_string()
    }

    fn name(blueprint: &Self::Blueprint) -> Option<String> {
        blueprint.name.clone()
    }

    fn properties(blueprint: &Self::Blueprint) -> &Properties {
        &blueprint.properties
    }

    fn structural(blueprint: &Self::Blueprint) -> Result<Properties, InvErr> {
        let mut rtn = Properties::new();
        rtn.insert(schema::ROLE.to_string(), Value::from(blueprint.role.as_str()));
        rtn.insert(schema::VALUE.to_string(), blueprint.value.clone());
        Ok(rtn)
    }

    fn update_parts(update: &Self::Update) -> Result<UpdateParts, InvErr> {
        let mut parts: UpdateParts = (&update.update).into();
        if let Some(value) = &update.value {
            parts
                .structural
                .insert(schema::VALUE.to_string(), value.clone());
        }
        Ok(parts)
    }

    fn from_record(record: &Record) -> Result<Self::Entity, InvErr> {
        let role = structural_value::<DataRole>(record, schema::ROLE)
            .or_else(|| DataRole::from_str(record.path.id()).ok())
            .ok_or_else(|| {
                InvErr::illegal_state(&record.path, "data entity has no recognizable role")
            })?;
        Ok(DataEntity {
            path: record.path.clone(),
            name: record.name(),
            properties: record.properties(),
            role,
            value: record.structural(schema::VALUE).cloned().unwrap_or(Value::Null),
        })
    }
}

pub struct MetadataPacks;

materialize_kind!(MetadataPacks, MetadataPack);

impl EntityKind for MetadataPacks {
    type Blueprint = MetadataPackBlueprint;
    type Update = Update;

    const SEGMENT: SegmentType = SegmentType::MetadataPack;

    fn id(blueprint: &Self::Blueprint) -> String {
        blueprint.id.clone()
    }

    fn name(blueprint: &Self::Blueprint) -> Option<String> {
        blueprint.name.clone()
    }

    fn properties(blueprint: &Self::Blueprint) -> &Properties {
        &blueprint.properties
    }

    fn links(blueprint: &Self::Blueprint, parent: &CanonicalPath) -> Result<Vec<Link>, InvErr> {
        let mut rtn = vec![];
        for member in &blueprint.members {
            let path = resolve_type(member, parent, None)?;
            match path.segment_type() {
                SegmentType::ResourceType | SegmentType::MetricType => {
                    rtn.push(Link::to_other(WellKnown::Incorporates, path))
                }
                other => {
                    return Err(InvErr::illegal_argument(format!(
                        "metadata packs incorporate resource and metric types, not {} '{}'",
                        other, path
                    )))
                }
            }
        }
        Ok(rtn)
    }

    fn update_parts(update: &Self::Update) -> Result<UpdateParts, InvErr> {
        Ok(update.into())
    }

    fn from_record(record: &Record) -> Result<Self::Entity, InvErr> {
        Ok(MetadataPack {
            path: record.path.clone(),
            name: record.name(),
            properties: record.properties(),
            members: record.related(WellKnown::Incorporates, Direction::Outgoing)?,
        })
    }
}

/// Relationships as a kind of their own; materializes edges.
pub struct Relationships;

pub fn relationship(graph: &dyn GraphRead, edge: &Edge) -> Result<Relationship, InvErr> {
    let end = |id| -> Result<CanonicalPath, InvErr> {
        graph
            .vertex(id)?
            .as_ref()
            .and_then(schema::vertex_path)
            .ok_or_else(|| InvErr::illegal_argument(format!("dangling end of edge {}", edge.id)))
    };
    Ok(Relationship {
        id: schema::edge_id(edge).unwrap_or_default().to_string(),
        name: edge.label.clone(),
        source: end(edge.source)?,
        target: end(edge.target)?,
        properties: schema::user_properties(&edge.properties),
    })
}

impl Materialize for Relationships {
    type Entity = Relationship;

    fn accepts(_graph: &dyn GraphRead, element: ElementId) -> Result<bool, InvErr> {
        Ok(matches!(element, ElementId::Edge(_)))
    }

    fn materialize(graph: &dyn GraphRead, element: ElementId) -> Result<Option<Relationship>, InvErr> {
        match element {
            ElementId::Edge(id) => match graph.edge(id)? {
                Some(edge) => Ok(Some(relationship(graph, &edge)?)),
                None => Ok(None),
            },
            ElementId::Vertex(_) => Ok(None),
        }
    }
}

/// Any element: entities of every kind and relationships.
pub struct AnyEntity;

impl Materialize for AnyEntity {
    type Entity = Element;

    fn accepts(graph: &dyn GraphRead, element: ElementId) -> Result<bool, InvErr> {
        Ok(match element {
            ElementId::Vertex(id) => graph.vertex(id)?.is_some(),
            ElementId::Edge(id) => graph.edge(id)?.is_some(),
        })
    }

    fn materialize(graph: &dyn GraphRead, element: ElementId) -> Result<Option<Element>, InvErr> {
        let vertex = match element {
            ElementId::Edge(_) => {
                return Ok(Relationships::materialize(graph, element)?.map(Element::Relationship))
            }
            ElementId::Vertex(id) => match graph.vertex(id)? {
                Some(vertex) => vertex,
                None => return Ok(None),
            },
        };
        let segment_type = match schema::vertex_type(&vertex) {
            Some(segment_type) => segment_type,
            None => return Ok(None),
        };
        let record = Record::new(graph, vertex)?;
        let entity = match segment_type {
            SegmentType::Tenant => Entity::Tenant(Tenants::from_record(&record)?),
            SegmentType::Environment => Entity::Environment(Environments::from_record(&record)?),
            SegmentType::Feed => Entity::Feed(Feeds::from_record(&record)?),
            SegmentType::ResourceType => Entity::ResourceType(ResourceTypes::from_record(&record)?),
            SegmentType::MetricType => Entity::MetricType(MetricTypes::from_record(&record)?),
            SegmentType::OperationType => {
                Entity::OperationType(OperationTypes::from_record(&record)?)
            }
            SegmentType::Resource => Entity::Resource(Resources::from_record(&record)?),
            SegmentType::Metric => Entity::Metric(Metrics::from_record(&record)?),
            SegmentType::DataEntity => Entity::DataEntity(DataEntities::from_record(&record)?),
            SegmentType::MetadataPack => Entity::MetadataPack(MetadataPacks::from_record(&record)?),
            SegmentType::Relationship => return Ok(None),
        };
        Ok(Some(Element::Entity(entity)))
    }
}
