use crate::space::kind::{Direction, SegmentType, WellKnown};
use crate::space::parse::util::Tw;
use serde::{Deserialize, Serialize};

/// The parsed form of a traversal string such as
/// `tenants/t1/environments/e1/resources;recursive[propertyName=os]`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Traversal {
    pub absolute: bool,
    pub steps: Vec<Tw<Step>>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Step {
    Entity(EntityStep),
    Collection(CollectionStep),
    Relationships(RelationshipStep),
    Recursive(RecursiveStep),
    Identical,
}

/// `r;host1[...]` or a bare `host1` whose type is inferred from its position
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct EntityStep {
    pub segment_type: Option<SegmentType>,
    pub id: String,
    pub filters: Vec<Tw<FilterSpec>>,
}

/// `resources;recursive[...]/host1[...]`
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CollectionStep {
    pub segment_type: SegmentType,
    pub recursive: bool,
    pub filters: Vec<Tw<FilterSpec>>,
    pub id: Option<Tw<String>>,
    pub id_filters: Vec<Tw<FilterSpec>>,
}

/// `relationships;contains;out[...]/entities[...]`
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RelationshipStep {
    pub name: Option<String>,
    pub direction: Direction,
    pub filters: Vec<Tw<FilterSpec>>,
    pub selector: Option<Tw<Selector>>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Selector {
    Entities(Vec<Tw<FilterSpec>>),
    Relationships(Vec<Tw<FilterSpec>>),
}

impl Selector {
    pub fn filters(&self) -> &[Tw<FilterSpec>] {
        match self {
            Selector::Entities(filters) => filters,
            Selector::Relationships(filters) => filters,
        }
    }

    pub fn context(&self) -> FilterContext {
        match self {
            Selector::Entities(_) => FilterContext::Entity,
            Selector::Relationships(_) => FilterContext::Relationship,
        }
    }
}

/// `recursive;over=isParentOf;out[...]`
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RecursiveStep {
    pub over: String,
    pub direction: Direction,
    pub filters: Vec<Tw<FilterSpec>>,
}

impl RecursiveStep {
    pub fn contains() -> Self {
        Self {
            over: WellKnown::Contains.to_string(),
            direction: Direction::Outgoing,
            filters: vec![],
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
pub enum FilterKey {
    Type,
    Id,
    Cp,
    Name,
    PropertyName,
    PropertyValue,
    DefinedBy,
    RelatedBy,
    RelatedTo,
    RelatedWith,
    SourceType,
    TargetType,
}

pub const ENTITY_KEYS: &[&str] = &[
    "type",
    "id",
    "cp",
    "name",
    "propertyName",
    "propertyValue",
    "definedBy",
    "relatedBy",
    "relatedTo",
    "relatedWith",
];

pub const RELATIONSHIP_KEYS: &[&str] = &[
    "name",
    "type",
    "id",
    "propertyName",
    "propertyValue",
    "sourceType",
    "targetType",
];

/// whether a filter bracket applies to entities or to relationships
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum FilterContext {
    Entity,
    Relationship,
}

impl FilterContext {
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            FilterContext::Entity => ENTITY_KEYS,
            FilterContext::Relationship => RELATIONSHIP_KEYS,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub key: FilterKey,
    pub values: Vec<String>,
}

/// Receives the parts of a [`Traversal`] in order as [`walk`] visits them.
pub trait TraversalListener {
    type Err;

    fn enter_traversal(&mut self, _traversal: &Traversal) -> Result<(), Self::Err> {
        Ok(())
    }

    fn exit_traversal(&mut self, _traversal: &Traversal) -> Result<(), Self::Err> {
        Ok(())
    }

    fn enter_entity(&mut self, step: &Tw<Step>, entity: &EntityStep) -> Result<(), Self::Err>;

    fn enter_collection(
        &mut self,
        step: &Tw<Step>,
        collection: &CollectionStep,
    ) -> Result<(), Self::Err>;

    fn enter_collection_id(&mut self, id: &Tw<String>) -> Result<(), Self::Err>;

    fn enter_recursive(
        &mut self,
        step: &Tw<Step>,
        recursive: &RecursiveStep,
    ) -> Result<(), Self::Err>;

    fn exit_recursive(&mut self, recursive: &RecursiveStep) -> Result<(), Self::Err>;

    fn enter_relationships(
        &mut self,
        step: &Tw<Step>,
        relationships: &RelationshipStep,
    ) -> Result<(), Self::Err>;

    fn enter_selector(
        &mut self,
        relationships: &RelationshipStep,
        selector: &Tw<Selector>,
    ) -> Result<(), Self::Err>;

    fn enter_identical(&mut self, step: &Tw<Step>) -> Result<(), Self::Err>;

    fn filters(
        &mut self,
        context: FilterContext,
        filters: &[Tw<FilterSpec>],
    ) -> Result<(), Self::Err>;
}

/// Drives `listener` over `traversal` step by step.
pub fn walk<L: TraversalListener>(traversal: &Traversal, listener: &mut L) -> Result<(), L::Err> {
    listener.enter_traversal(traversal)?;
    for step in &traversal.steps {
        match &step.w {
            Step::Entity(entity) => {
                listener.enter_entity(step, entity)?;
                listener.filters(FilterContext::Entity, &entity.filters)?;
            }
            Step::Collection(collection) => {
                if collection.recursive {
                    let closure = RecursiveStep::contains();
                    listener.enter_recursive(step, &closure)?;
                    listener.exit_recursive(&closure)?;
                }
                listener.enter_collection(step, collection)?;
                listener.filters(FilterContext::Entity, &collection.filters)?;
                if let Some(id) = &collection.id {
                    listener.enter_collection_id(id)?;
                    listener.filters(FilterContext::Entity, &collection.id_filters)?;
                }
            }
            Step::Recursive(recursive) => {
                listener.enter_recursive(step, recursive)?;
                listener.exit_recursive(recursive)?;
                listener.filters(FilterContext::Entity, &recursive.filters)?;
            }
            Step::Relationships(relationships) => {
                listener.enter_relationships(step, relationships)?;
                listener.filters(FilterContext::Relationship, &relationships.filters)?;
                if let Some(selector) = &relationships.selector {
                    listener.enter_selector(relationships, selector)?;
                    listener.filters(selector.context(), selector.filters())?;
                }
            }
            Step::Identical => listener.enter_identical(step)?,
        }
    }
    listener.exit_traversal(traversal)
}
