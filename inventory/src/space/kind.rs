use crate::space::err::SpaceErr;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::IntoEnumIterator;

/// The closed set of entity kinds that may appear as a segment of a [`crate::space::point::CanonicalPath`].
///
/// Each type has a short code used in path strings (`/t;acme/e;prod`), a camelCase name and a
/// plural used by the traversal grammar (`environments`, `dataEntities`).
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    Ord,
    PartialOrd,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum SegmentType {
    Tenant,
    Environment,
    Feed,
    ResourceType,
    MetricType,
    OperationType,
    Resource,
    Metric,
    DataEntity,
    MetadataPack,
    Relationship,
}

impl SegmentType {
    pub fn code(&self) -> &'static str {
        match self {
            SegmentType::Tenant => "t",
            SegmentType::Environment => "e",
            SegmentType::Feed => "f",
            SegmentType::ResourceType => "rt",
            SegmentType::MetricType => "mt",
            SegmentType::OperationType => "ot",
            SegmentType::Resource => "r",
            SegmentType::Metric => "m",
            SegmentType::DataEntity => "d",
            SegmentType::MetadataPack => "mp",
            SegmentType::Relationship => "rl",
        }
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn plural(&self) -> &'static str {
        match self {
            SegmentType::Tenant => "tenants",
            SegmentType::Environment => "environments",
            SegmentType::Feed => "feeds",
            SegmentType::ResourceType => "resourceTypes",
            SegmentType::MetricType => "metricTypes",
            SegmentType::OperationType => "operationTypes",
            SegmentType::Resource => "resources",
            SegmentType::Metric => "metrics",
            SegmentType::DataEntity => "dataEntities",
            SegmentType::MetadataPack => "metadataPacks",
            SegmentType::Relationship => "relationships",
        }
    }

    pub fn from_code(code: &str) -> Option<SegmentType> {
        SegmentType::iter().find(|t| t.code() == code)
    }

    pub fn from_plural(plural: &str) -> Option<SegmentType> {
        SegmentType::iter().find(|t| t.plural() == plural)
    }

    /// accepts either the short code or the camelCase name
    pub fn parse_any(text: &str) -> Result<SegmentType, SpaceErr> {
        Self::from_code(text)
            .or_else(|| SegmentType::from_str(text).ok())
            .ok_or_else(|| SpaceErr::illegal_argument(format!("unknown segment type '{}'", text)))
    }

    /// the types a segment of this type may directly contain
    pub fn children(&self) -> &'static [SegmentType] {
        match self {
            SegmentType::Tenant => &[
                SegmentType::Environment,
                SegmentType::Feed,
                SegmentType::ResourceType,
                SegmentType::MetricType,
                SegmentType::MetadataPack,
            ],
            SegmentType::Environment => &[SegmentType::Resource, SegmentType::Metric],
            SegmentType::Feed => &[
                SegmentType::ResourceType,
                SegmentType::MetricType,
                SegmentType::Resource,
                SegmentType::Metric,
            ],
            SegmentType::ResourceType => &[SegmentType::OperationType, SegmentType::DataEntity],
            SegmentType::OperationType => &[SegmentType::DataEntity],
            SegmentType::Resource => &[
                SegmentType::Resource,
                SegmentType::Metric,
                SegmentType::DataEntity,
            ],
            SegmentType::MetricType
            | SegmentType::Metric
            | SegmentType::DataEntity
            | SegmentType::MetadataPack
            | SegmentType::Relationship => &[],
        }
    }

    pub fn can_contain(&self, child: &SegmentType) -> bool {
        self.children().contains(child)
    }

    /// types that may start a canonical path
    pub fn is_root(&self) -> bool {
        matches!(self, SegmentType::Tenant | SegmentType::Relationship)
    }

    pub fn is_entity(&self) -> bool {
        *self != SegmentType::Relationship
    }
}

/// Edge direction as seen from the vertex currently being visited.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
    Serialize,
    Deserialize,
)]
pub enum Direction {
    #[strum(serialize = "in")]
    #[serde(rename = "in")]
    Incoming,
    #[strum(serialize = "out")]
    #[serde(rename = "out")]
    Outgoing,
    #[strum(serialize = "both")]
    #[serde(rename = "both")]
    Both,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Incoming => Direction::Outgoing,
            Direction::Outgoing => Direction::Incoming,
            Direction::Both => Direction::Both,
        }
    }
}

/// the role an entity plays on a relationship
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, strum_macros::Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum EntityRole {
    Source,
    Target,
    Any,
}

impl EntityRole {
    /// the direction to walk from an entity playing this role to reach the other end
    pub fn direction(&self) -> Direction {
        match self {
            EntityRole::Source => Direction::Outgoing,
            EntityRole::Target => Direction::Incoming,
            EntityRole::Any => Direction::Both,
        }
    }
}

/// relationship names the registry itself creates and interprets
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
    strum_macros::EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WellKnown {
    Contains,
    Defines,
    Owns,
    Incorporates,
}

impl WellKnown {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    Default,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum MetricUnit {
    #[default]
    None,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Percentage,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    Default,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum MetricDataType {
    #[default]
    Gauge,
    Availability,
    Counter,
    CounterRate,
    #[strum(serialize = "string")]
    #[serde(rename = "string")]
    Text,
}

/// The role a data entity plays for its parent; doubles as the data entity's id.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
    strum_macros::EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum DataRole {
    Configuration,
    ConnectionConfiguration,
    ReturnType,
    ParameterTypes,
}

impl DataRole {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
pub mod test {
    use crate::space::kind::{DataRole, Direction, SegmentType};
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    pub fn test_codes_round_trip() {
        for segment_type in SegmentType::iter() {
            assert_eq!(
                SegmentType::from_code(segment_type.code()),
                Some(segment_type)
            );
            assert_eq!(
                SegmentType::from_plural(segment_type.plural()),
                Some(segment_type)
            );
            assert_eq!(SegmentType::parse_any(segment_type.name()).ok(), Some(segment_type));
        }
    }

    #[test]
    pub fn test_names() {
        assert_eq!(SegmentType::ResourceType.to_string(), "resourceType");
        assert_eq!(SegmentType::DataEntity.plural(), "dataEntities");
        assert_eq!(
            SegmentType::from_str("metadataPack").unwrap(),
            SegmentType::MetadataPack
        );
        assert!(SegmentType::parse_any("bogus").is_err());
    }

    #[test]
    pub fn test_containment() {
        assert!(SegmentType::Tenant.can_contain(&SegmentType::Environment));
        assert!(SegmentType::Resource.can_contain(&SegmentType::Resource));
        assert!(!SegmentType::Environment.can_contain(&SegmentType::Feed));
        assert!(SegmentType::Relationship.children().is_empty());
        for segment_type in SegmentType::iter() {
            assert!(!segment_type.can_contain(&SegmentType::Tenant));
            assert!(!segment_type.can_contain(&SegmentType::Relationship));
        }
    }

    #[test]
    pub fn test_direction() {
        assert_eq!(Direction::from_str("out").unwrap(), Direction::Outgoing);
        assert_eq!(Direction::Incoming.to_string(), "in");
        assert_eq!(DataRole::ReturnType.as_str(), "returnType");
    }
}
