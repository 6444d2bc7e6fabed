use crate::space::err::ParseErrs;
use crate::space::kind::{Direction, SegmentType};
use crate::space::parse::model::{FilterKey, Selector, Step};
use crate::space::parse::path::{parse_raw_path, RawSegment};
use crate::space::parse::{parse_traversal, parse_traversal_at};

#[test]
pub fn test_collections() -> Result<(), ParseErrs> {
    let traversal = parse_traversal("tenants/t1/environments/e1/resources;recursive")?;
    assert!(!traversal.absolute);
    assert_eq!(traversal.steps.len(), 3);
    match &traversal.steps[0].w {
        Step::Collection(collection) => {
            assert_eq!(collection.segment_type, SegmentType::Tenant);
            assert!(!collection.recursive);
            assert_eq!(collection.id.as_ref().map(|id| id.w.as_str()), Some("t1"));
        }
        other => panic!("expected a collection, got {:?}", other),
    }
    match &traversal.steps[2].w {
        Step::Collection(collection) => {
            assert_eq!(collection.segment_type, SegmentType::Resource);
            assert!(collection.recursive);
            assert!(collection.id.is_none());
        }
        other => panic!("expected a collection, got {:?}", other),
    }
    Ok(())
}

#[test]
pub fn test_typo_after_collection() {
    let src = "tenants/t1/environments/e1/resources;typo";
    let errs = parse_traversal(src).unwrap_err();
    let report = errs.first().unwrap();
    assert_eq!(report.offset, 37);
    assert_eq!(report.token, "typo");
    assert!(report.expected.contains(&"recursive".to_string()));
}

#[test]
pub fn test_typed_and_bare_entities() -> Result<(), ParseErrs> {
    let traversal = parse_traversal("/t;t1/e;prod/host1")?;
    assert!(traversal.absolute);
    match &traversal.steps[1].w {
        Step::Entity(entity) => {
            assert_eq!(entity.segment_type, Some(SegmentType::Environment));
            assert_eq!(entity.id, "prod");
        }
        other => panic!("expected an entity, got {:?}", other),
    }
    match &traversal.steps[2].w {
        Step::Entity(entity) => {
            assert_eq!(entity.segment_type, None);
            assert_eq!(entity.id, "host1");
        }
        other => panic!("expected an entity, got {:?}", other),
    }
    Ok(())
}

#[test]
pub fn test_relationship_hop() -> Result<(), ParseErrs> {
    let traversal =
        parse_traversal("t;t1/relationships;contains;out[sourceType=t]/entities[type=e]")?;
    match &traversal.steps[1].w {
        Step::Relationships(rel) => {
            assert_eq!(rel.name.as_deref(), Some("contains"));
            assert_eq!(rel.direction, Direction::Outgoing);
            assert_eq!(rel.filters.len(), 1);
            assert_eq!(rel.filters[0].key, FilterKey::SourceType);
            let selector = rel.selector.as_ref().unwrap();
            match &selector.w {
                Selector::Entities(filters) => {
                    assert_eq!(filters[0].key, FilterKey::Type);
                    assert_eq!(filters[0].values, vec!["e".to_string()]);
                }
                other => panic!("expected entities, got {:?}", other),
            }
        }
        other => panic!("expected relationships, got {:?}", other),
    }

    let traversal = parse_traversal("t;t1/rl;in")?;
    match &traversal.steps[1].w {
        Step::Relationships(rel) => {
            assert_eq!(rel.name, None);
            assert_eq!(rel.direction, Direction::Incoming);
            assert!(rel.selector.is_none());
        }
        other => panic!("expected relationships, got {:?}", other),
    }
    Ok(())
}

#[test]
pub fn test_recursive_step() -> Result<(), ParseErrs> {
    let traversal = parse_traversal("t;t1/recursive;over=isParentOf;both[type=r]")?;
    match &traversal.steps[1].w {
        Step::Recursive(recursive) => {
            assert_eq!(recursive.over, "isParentOf");
            assert_eq!(recursive.direction, Direction::Both);
            assert_eq!(recursive.filters.len(), 1);
        }
        other => panic!("expected recursive, got {:?}", other),
    }

    let traversal = parse_traversal("t;t1/recursive")?;
    match &traversal.steps[1].w {
        Step::Recursive(recursive) => {
            assert_eq!(recursive.over, "contains");
            assert_eq!(recursive.direction, Direction::Outgoing);
        }
        other => panic!("expected recursive, got {:?}", other),
    }
    Ok(())
}

#[test]
pub fn test_quoted_values() -> Result<(), ParseErrs> {
    let traversal = parse_traversal(
        "tenants/t1/feeds[propertyName=\"os name\";propertyValue='linux, gnu',\"a\\\"b\"]",
    )?;
    match &traversal.steps[1].w {
        Step::Collection(collection) => {
            assert_eq!(collection.filters.len(), 2);
            assert_eq!(collection.filters[0].values, vec!["os name".to_string()]);
            assert_eq!(
                collection.filters[1].values,
                vec!["linux, gnu".to_string(), "a\"b".to_string()]
            );
        }
        other => panic!("expected a collection, got {:?}", other),
    }
    Ok(())
}

#[test]
pub fn test_unknown_filter_key() {
    let errs = parse_traversal("tenants[color=red]").unwrap_err();
    let report = errs.first().unwrap();
    assert_eq!(report.offset, 8);
    assert!(report.expected.contains(&"type".to_string()));
    assert!(!report.expected.contains(&"sourceType".to_string()));
}

#[test]
pub fn test_trailing_garbage() {
    let errs = parse_traversal("tenants/t1]x").unwrap_err();
    let report = errs.first().unwrap();
    assert_eq!(report.offset, 10);
    assert!(report.expected.contains(&"/".to_string()));
}

#[test]
pub fn test_offsets_are_relative_to_source() -> Result<(), ParseErrs> {
    let src = "query tenants/t1";
    let traversal = parse_traversal_at(src, 6)?;
    assert_eq!(traversal.steps[0].trace.offset(), 6);

    let errs = parse_traversal_at("query tenants[", 6).unwrap_err();
    assert_eq!(errs.first().unwrap().offset, 14);
    Ok(())
}

#[test]
pub fn test_raw_paths() -> Result<(), ParseErrs> {
    let raw = parse_raw_path("../r;host\\/1/cpu")?;
    assert!(!raw.absolute);
    assert_eq!(raw.segments.len(), 3);
    assert_eq!(raw.segments[0], RawSegment::Up);
    assert_eq!(
        raw.segments[1],
        RawSegment::Segment {
            segment_type: Some(SegmentType::Resource),
            id: "host/1".to_string()
        }
    );
    assert_eq!(
        raw.segments[2],
        RawSegment::Segment {
            segment_type: None,
            id: "cpu".to_string()
        }
    );
    Ok(())
}
