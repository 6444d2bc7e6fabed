use crate::space::kind::{Direction, EntityRole, SegmentType, WellKnown};
use crate::space::point::CanonicalPath;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// identifies the relationships a [`Filter::RelatedBy`] follows
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RelationRef {
    Name(String),
    Id(String),
}

impl Display for RelationRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationRef::Name(name) => write!(f, "{}", name),
            RelationRef::Id(id) => write!(f, "id:{}", id),
        }
    }
}

/// A single step or condition of a [`crate::space::query::Query`].
///
/// Whether a filter *jumps* to new elements or *narrows* the current ones depends on the
/// role of the fragment it sits in (see [`crate::space::query::FragmentRole`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Without `other_end`: hop across matching relationships to the entities on the other side.
    /// With `other_end`: keep only entities that have such a relationship with that entity.
    RelatedBy {
        relationship: RelationRef,
        role: EntityRole,
        other_end: Option<CanonicalPath>,
    },
    WithIds(Vec<String>),
    WithTypes(Vec<SegmentType>),
    WithCanonicalPaths(Vec<CanonicalPath>),
    /// an empty `values` only requires the property to be present
    WithProperty { name: String, values: Vec<Value> },
    /// from entities to their relationships (`from_edge == false`) or back (`from_edge == true`)
    SwitchElementType { direction: Direction, from_edge: bool },
    RelationWithIds(Vec<String>),
    RelationWithNames(Vec<String>),
    RelationWithProperties { name: String, values: Vec<Value> },
    RelationWithSourceTypes(Vec<SegmentType>),
    RelationWithTargetTypes(Vec<SegmentType>),
    DefinedBy(CanonicalPath),
    /// entities with the same identity hash as the current ones
    Identical,
    /// zero or more applications of the chain
    Recurse(Vec<Filter>),
    Noop,
}

impl Filter {
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Filter::WithIds(ids.into_iter().map(|i| i.to_string()).collect())
    }

    pub fn with_id<S: ToString>(id: S) -> Self {
        Filter::WithIds(vec![id.to_string()])
    }

    pub fn with_types<I: IntoIterator<Item = SegmentType>>(types: I) -> Self {
        Filter::WithTypes(types.into_iter().collect())
    }

    pub fn with_type(segment_type: SegmentType) -> Self {
        Filter::WithTypes(vec![segment_type])
    }

    pub fn with_path(path: CanonicalPath) -> Self {
        Filter::WithCanonicalPaths(vec![path])
    }

    pub fn with_property<S: ToString>(name: S) -> Self {
        Filter::WithProperty {
            name: name.to_string(),
            values: vec![],
        }
    }

    pub fn with_property_values<S, I, V>(name: S, values: I) -> Self
    where
        S: ToString,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::WithProperty {
            name: name.to_string(),
            values: values.into_iter().map(|v| v.into()).collect(),
        }
    }

    /// hop from entities in `role` across relationships called `name`
    pub fn related_by<S: ToString>(name: S, role: EntityRole) -> Self {
        Filter::RelatedBy {
            relationship: RelationRef::Name(name.to_string()),
            role,
            other_end: None,
        }
    }

    /// keep entities that play `role` on a `name` relationship with `other_end`
    pub fn related_with<S: ToString>(name: S, role: EntityRole, other_end: CanonicalPath) -> Self {
        Filter::RelatedBy {
            relationship: RelationRef::Name(name.to_string()),
            role,
            other_end: Some(other_end),
        }
    }

    /// from parents to their direct children
    pub fn contains() -> Self {
        Self::related_by(WellKnown::Contains, EntityRole::Source)
    }

    /// from children to their parent
    pub fn contained_in() -> Self {
        Self::related_by(WellKnown::Contains, EntityRole::Target)
    }

    pub fn relationships(direction: Direction) -> Self {
        Filter::SwitchElementType {
            direction,
            from_edge: false,
        }
    }

    pub fn entities(direction: Direction) -> Self {
        Filter::SwitchElementType {
            direction,
            from_edge: true,
        }
    }

    pub fn relation_named<S: ToString>(name: S) -> Self {
        Filter::RelationWithNames(vec![name.to_string()])
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::RelatedBy {
                relationship,
                role,
                other_end: None,
            } => write!(f, "RelatedBy({}, {})", relationship, role),
            Filter::RelatedBy {
                relationship,
                role,
                other_end: Some(other_end),
            } => write!(f, "RelatedBy({}, {}, {})", relationship, role, other_end),
            Filter::WithIds(ids) => write!(f, "WithIds({})", ids.iter().join(", ")),
            Filter::WithTypes(types) => write!(f, "WithTypes({})", types.iter().join(", ")),
            Filter::WithCanonicalPaths(paths) => {
                write!(f, "WithCanonicalPaths({})", paths.iter().join(", "))
            }
            Filter::WithProperty { name, values } if values.is_empty() => {
                write!(f, "WithProperty({})", name)
            }
            Filter::WithProperty { name, values } => {
                write!(f, "WithProperty({} = {})", name, values.iter().join(" | "))
            }
            Filter::SwitchElementType {
                direction,
                from_edge: false,
            } => write!(f, "Relationships({})", direction),
            Filter::SwitchElementType {
                direction,
                from_edge: true,
            } => write!(f, "Entities({})", direction),
            Filter::RelationWithIds(ids) => write!(f, "RelationWithIds({})", ids.iter().join(", ")),
            Filter::RelationWithNames(names) => {
                write!(f, "RelationWithNames({})", names.iter().join(", "))
            }
            Filter::RelationWithProperties { name, values } => write!(
                f,
                "RelationWithProperties({} = {})",
                name,
                values.iter().join(" | ")
            ),
            Filter::RelationWithSourceTypes(types) => {
                write!(f, "RelationWithSourceTypes({})", types.iter().join(", "))
            }
            Filter::RelationWithTargetTypes(types) => {
                write!(f, "RelationWithTargetTypes({})", types.iter().join(", "))
            }
            Filter::DefinedBy(path) => write!(f, "DefinedBy({})", path),
            Filter::Identical => write!(f, "Identical"),
            Filter::Recurse(chain) => write!(f, "Recurse[{}]", chain.iter().join(", ")),
            Filter::Noop => write!(f, "Noop"),
        }
    }
}
