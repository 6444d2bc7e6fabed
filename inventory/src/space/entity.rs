use crate::space::err::SpaceErr;
use crate::space::kind::{DataRole, MetricDataType, MetricUnit, SegmentType};
use crate::space::point::CanonicalPath;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// free-form, user supplied properties of an entity or relationship
pub type Properties = BTreeMap<String, Value>;

/// property names no entity may carry as a free-form property
pub const RESERVED_PROPERTIES: [&str; 3] = ["id", "name", "path"];

pub fn is_reserved(key: &str, structural: &[&str]) -> bool {
    key.starts_with("__") || RESERVED_PROPERTIES.contains(&key) || structural.contains(&key)
}

macro_rules! property_setter {
    ($builder:ident) => {
        impl $builder {
            pub fn property<K: ToString, V: Into<Value>>(&mut self, key: K, value: V) -> &mut Self {
                self.properties
                    .get_or_insert_with(Properties::new)
                    .insert(key.to_string(), value.into());
                self
            }
        }
    };
}

macro_rules! plain_entity {
    ($(#[$meta:meta])* $entity:ident, $blueprint:ident, $builder:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $entity {
            pub path: CanonicalPath,
            pub name: Option<String>,
            pub properties: Properties,
        }

        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
        #[builder(setter(into), build_fn(error = "SpaceErr"))]
        pub struct $blueprint {
            pub id: String,
            #[builder(setter(into, strip_option), default)]
            pub name: Option<String>,
            #[builder(default)]
            pub properties: Properties,
        }

        impl $blueprint {
            pub fn new<S: ToString>(id: S) -> Self {
                Self {
                    id: id.to_string(),
                    name: None,
                    properties: Properties::new(),
                }
            }

            pub fn builder() -> $builder {
                $builder::default()
            }
        }

        property_setter!($builder);
    };
}

plain_entity!(
    /// the root of all of a customer's inventory
    Tenant,
    TenantBlueprint,
    TenantBlueprintBuilder
);
plain_entity!(Environment, EnvironmentBlueprint, EnvironmentBlueprintBuilder);
plain_entity!(
    /// an agent that reports inventory; owns the types and resources it discovers
    Feed,
    FeedBlueprint,
    FeedBlueprintBuilder
);
plain_entity!(
    OperationType,
    OperationTypeBlueprint,
    OperationTypeBlueprintBuilder
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceType {
    pub path: CanonicalPath,
    pub name: Option<String>,
    pub properties: Properties,
    /// metric types this resource type `owns`
    pub metric_types: Vec<CanonicalPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into), build_fn(error = "SpaceErr"))]
pub struct ResourceTypeBlueprint {
    pub id: String,
    #[builder(setter(into, strip_option), default)]
    pub name: Option<String>,
    #[builder(default)]
    pub properties: Properties,
    /// paths (possibly relative to the parent, possibly untyped) of metric types to own
    #[builder(default)]
    pub metric_types: Vec<String>,
}

impl ResourceTypeBlueprint {
    pub fn new<S: ToString>(id: S) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            properties: Properties::new(),
            metric_types: vec![],
        }
    }

    pub fn builder() -> ResourceTypeBlueprintBuilder {
        ResourceTypeBlueprintBuilder::default()
    }
}

property_setter!(ResourceTypeBlueprintBuilder);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricType {
    pub path: CanonicalPath,
    pub name: Option<String>,
    pub properties: Properties,
    pub unit: MetricUnit,
    pub data_type: MetricDataType,
    pub collection_interval: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into), build_fn(error = "SpaceErr"))]
pub struct MetricTypeBlueprint {
    pub id: String,
    #[builder(setter(into, strip_option), default)]
    pub name: Option<String>,
    #[builder(default)]
    pub properties: Properties,
    #[builder(default)]
    pub unit: MetricUnit,
    #[builder(default)]
    pub data_type: MetricDataType,
    /// seconds between collections
    #[builder(setter(into, strip_option), default)]
    pub collection_interval: Option<i64>,
}

impl MetricTypeBlueprint {
    pub fn new<S: ToString>(id: S, unit: MetricUnit, data_type: MetricDataType) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            properties: Properties::new(),
            unit,
            data_type,
            collection_interval: None,
        }
    }

    pub fn builder() -> MetricTypeBlueprintBuilder {
        MetricTypeBlueprintBuilder::default()
    }
}

property_setter!(MetricTypeBlueprintBuilder);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub path: CanonicalPath,
    pub name: Option<String>,
    pub properties: Properties,
    /// the resource type that `defines` this resource
    pub resource_type: Option<CanonicalPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into), build_fn(error = "SpaceErr"))]
pub struct ResourceBlueprint {
    pub id: String,
    #[builder(setter(into, strip_option), default)]
    pub name: Option<String>,
    #[builder(default)]
    pub properties: Properties,
    /// path of the defining resource type, absolute or relative to the parent
    pub resource_type: String,
}

impl ResourceBlueprint {
    pub fn new<S: ToString, T: ToString>(id: S, resource_type: T) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            properties: Properties::new(),
            resource_type: resource_type.to_string(),
        }
    }

    pub fn builder() -> ResourceBlueprintBuilder {
        ResourceBlueprintBuilder::default()
    }
}

property_setter!(ResourceBlueprintBuilder);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub path: CanonicalPath,
    pub name: Option<String>,
    pub properties: Properties,
    pub metric_type: Option<CanonicalPath>,
    pub collection_interval: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into), build_fn(error = "SpaceErr"))]
pub struct MetricBlueprint {
    pub id: String,
    #[builder(setter(into, strip_option), default)]
    pub name: Option<String>,
    #[builder(default)]
    pub properties: Properties,
    pub metric_type: String,
    #[builder(setter(into, strip_option), default)]
    pub collection_interval: Option<i64>,
}

impl MetricBlueprint {
    pub fn new<S: ToString, T: ToString>(id: S, metric_type: T) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            properties: Properties::new(),
            metric_type: metric_type.to_string(),
            collection_interval: None,
        }
    }

    pub fn builder() -> MetricBlueprintBuilder {
        MetricBlueprintBuilder::default()
    }
}

property_setter!(MetricBlueprintBuilder);

/// A structured value attached to a resource, resource type or operation type.
/// Its id is always the name of its [`DataRole`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntity {
    pub path: CanonicalPath,
    pub name: Option<String>,
    pub properties: Properties,
    pub role: DataRole,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into), build_fn(error = "SpaceErr"))]
pub struct DataEntityBlueprint {
    pub role: DataRole,
    #[builder(default)]
    pub value: Value,
    #[builder(setter(into, strip_option), default)]
    pub name: Option<String>,
    #[builder(default)]
    pub properties: Properties,
}

impl DataEntityBlueprint {
    pub fn new<V: Into<Value>>(role: DataRole, value: V) -> Self {
        Self {
            role,
            value: value.into(),
            name: None,
            properties: Properties::new(),
        }
    }

    pub fn builder() -> DataEntityBlueprintBuilder {
        DataEntityBlueprintBuilder::default()
    }
}

property_setter!(DataEntityBlueprintBuilder);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataPack {
    pub path: CanonicalPath,
    pub name: Option<String>,
    pub properties: Properties,
    /// the resource types and metric types this pack `incorporates`
    pub members: Vec<CanonicalPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into), build_fn(error = "SpaceErr"))]
pub struct MetadataPackBlueprint {
    pub id: String,
    #[builder(setter(into, strip_option), default)]
    pub name: Option<String>,
    #[builder(default)]
    pub properties: Properties,
    #[builder(default)]
    pub members: Vec<String>,
}

impl MetadataPackBlueprint {
    pub fn new<S: ToString>(id: S, members: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            properties: Properties::new(),
            members,
        }
    }

    pub fn builder() -> MetadataPackBlueprintBuilder {
        MetadataPackBlueprintBuilder::default()
    }
}

property_setter!(MetadataPackBlueprintBuilder);

/// A named, directed edge between two entities with its own properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub name: String,
    pub source: CanonicalPath,
    pub target: CanonicalPath,
    pub properties: Properties,
}

impl Relationship {
    pub fn path(&self) -> CanonicalPath {
        CanonicalPath::relationship(&self.id)
    }
}

/// Any inventoried entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    Tenant(Tenant),
    Environment(Environment),
    Feed(Feed),
    ResourceType(ResourceType),
    MetricType(MetricType),
    OperationType(OperationType),
    Resource(Resource),
    Metric(Metric),
    DataEntity(DataEntity),
    MetadataPack(MetadataPack),
}

impl Entity {
    pub fn path(&self) -> &CanonicalPath {
        match self {
            Entity::Tenant(e) => &e.path,
            Entity::Environment(e) => &e.path,
            Entity::Feed(e) => &e.path,
            Entity::ResourceType(e) => &e.path,
            Entity::MetricType(e) => &e.path,
            Entity::OperationType(e) => &e.path,
            Entity::Resource(e) => &e.path,
            Entity::Metric(e) => &e.path,
            Entity::DataEntity(e) => &e.path,
            Entity::MetadataPack(e) => &e.path,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Entity::Tenant(e) => e.name.as_deref(),
            Entity::Environment(e) => e.name.as_deref(),
            Entity::Feed(e) => e.name.as_deref(),
            Entity::ResourceType(e) => e.name.as_deref(),
            Entity::MetricType(e) => e.name.as_deref(),
            Entity::OperationType(e) => e.name.as_deref(),
            Entity::Resource(e) => e.name.as_deref(),
            Entity::Metric(e) => e.name.as_deref(),
            Entity::DataEntity(e) => e.name.as_deref(),
            Entity::MetadataPack(e) => e.name.as_deref(),
        }
    }

    pub fn properties(&self) -> &Properties {
        match self {
            Entity::Tenant(e) => &e.properties,
            Entity::Environment(e) => &e.properties,
            Entity::Feed(e) => &e.properties,
            Entity::ResourceType(e) => &e.properties,
            Entity::MetricType(e) => &e.properties,
            Entity::OperationType(e) => &e.properties,
            Entity::Resource(e) => &e.properties,
            Entity::Metric(e) => &e.properties,
            Entity::DataEntity(e) => &e.properties,
            Entity::MetadataPack(e) => &e.properties,
        }
    }

    pub fn segment_type(&self) -> SegmentType {
        self.path().segment_type()
    }

    pub fn id(&self) -> &str {
        self.path().id()
    }
}

/// Anything a traversal may land on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    Entity(Entity),
    Relationship(Relationship),
}

impl Element {
    pub fn path(&self) -> CanonicalPath {
        match self {
            Element::Entity(entity) => entity.path().clone(),
            Element::Relationship(relationship) => relationship.path(),
        }
    }
}

/// Changes to the name and free-form properties of an entity.
///
/// `properties: Some(..)` replaces the free-form properties: keys missing from the map are
/// removed and present keys are upserted.  `None` leaves them alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub name: Option<String>,
    pub properties: Option<Properties>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name<S: ToString>(mut self, name: S) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_property<K: ToString, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.properties
            .get_or_insert_with(Properties::new)
            .insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTypeUpdate {
    pub update: Update,
    pub unit: Option<MetricUnit>,
    pub collection_interval: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricUpdate {
    pub update: Update,
    pub collection_interval: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataEntityUpdate {
    pub update: Update,
    pub value: Option<Value>,
}

#[cfg(test)]
pub mod test {
    use crate::space::entity::{
        is_reserved, MetricTypeBlueprint, ResourceBlueprint, TenantBlueprint,
    };
    use crate::space::err::SpaceErr;
    use crate::space::kind::MetricUnit;

    #[test]
    pub fn test_builders() -> Result<(), SpaceErr> {
        let tenant = TenantBlueprint::builder()
            .id("acme")
            .name("Acme Corp")
            .property("region", "eu")
            .build()?;
        assert_eq!(tenant.id, "acme");
        assert_eq!(tenant.name.as_deref(), Some("Acme Corp"));
        assert_eq!(tenant.properties.get("region").and_then(|v| v.as_str()), Some("eu"));

        let metric_type = MetricTypeBlueprint::builder()
            .id("latency")
            .unit(MetricUnit::Milliseconds)
            .collection_interval(60)
            .build()?;
        assert_eq!(metric_type.collection_interval, Some(60));

        // the defining resource type is mandatory
        let err = ResourceBlueprint::builder().id("host1").build().unwrap_err();
        assert!(matches!(err, SpaceErr::IllegalArgument(_)));
        Ok(())
    }

    #[test]
    pub fn test_reserved() {
        assert!(is_reserved("__type", &[]));
        assert!(is_reserved("name", &[]));
        assert!(is_reserved("unit", &["unit"]));
        assert!(!is_reserved("region", &["unit"]));
    }
}
