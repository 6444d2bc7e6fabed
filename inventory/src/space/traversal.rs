use crate::space::err::SpaceErr;
use crate::space::filter::{Filter, RelationRef};
use crate::space::kind::{Direction, EntityRole, SegmentType};
use crate::space::parse::model::{
    walk, CollectionStep, EntityStep, FilterContext, FilterKey, FilterSpec, RecursiveStep,
    RelationshipStep, Selector, Step, Traversal, TraversalListener,
};
use crate::space::parse::util::Tw;
use crate::space::parse::{parse_traversal, parse_traversal_at};
use crate::space::point::CanonicalPath;
use crate::space::query::{Query, QueryBuilder};
use serde_json::Value;

/// compiles traversal text into a [`Query`]; relative traversals start at `origin`
pub fn compile(text: &str, origin: Option<&CanonicalPath>) -> Result<Query, SpaceErr> {
    let traversal = parse_traversal(text)?;
    compile_traversal(&traversal, origin)
}

/// like [`compile`] for a traversal embedded at `offset` inside a larger string
pub fn compile_at(
    text: &str,
    offset: usize,
    origin: Option<&CanonicalPath>,
) -> Result<Query, SpaceErr> {
    let traversal = parse_traversal_at(text, offset)?;
    compile_traversal(&traversal, origin)
}

pub fn compile_traversal(
    traversal: &Traversal,
    origin: Option<&CanonicalPath>,
) -> Result<Query, SpaceErr> {
    let mut compiler = QueryCompiler::new(origin.cloned());
    walk(traversal, &mut compiler)?;
    Ok(compiler.main.build())
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Position {
    /// nothing selected yet; the next step jumps
    Start,
    Entities(Option<SegmentType>),
    Relationships(Direction),
}

/// Threads a [`QueryBuilder`] through a [`walk`].  Recursive steps collect their body in a
/// builder of their own which is folded into a single [`Filter::Recurse`] on exit.
pub struct QueryCompiler {
    origin: Option<CanonicalPath>,
    main: QueryBuilder,
    body: Option<QueryBuilder>,
    position: Position,
}

impl QueryCompiler {
    pub fn new(origin: Option<CanonicalPath>) -> Self {
        Self {
            origin,
            main: QueryBuilder::new(),
            body: None,
            position: Position::Start,
        }
    }

    fn builder(&mut self) -> &mut QueryBuilder {
        match &mut self.body {
            Some(body) => body,
            None => &mut self.main,
        }
    }

    fn expect_entities(&self, offset: usize, what: &str) -> Result<(), SpaceErr> {
        match self.position {
            Position::Relationships(_) => Err(SpaceErr::illegal_argument(format!(
                "{} at offset {} cannot follow a relationship hop; select 'entities' first",
                what, offset
            ))),
            _ => Ok(()),
        }
    }

    fn hop_to_children(&mut self) {
        if let Position::Entities(_) = self.position {
            self.builder().path(Filter::contains());
        }
    }

    fn resolve_path(&self, value: &str, trace: &Tw<FilterSpec>) -> Result<CanonicalPath, SpaceErr> {
        CanonicalPath::from_partially_untyped_string(value, self.origin.as_ref(), None).map_err(
            |err| {
                SpaceErr::illegal_argument(format!(
                    "'{}' at offset {} is not a usable path: {}",
                    value,
                    trace.trace.offset(),
                    err
                ))
            },
        )
    }

    fn segment_types(values: &[String], trace: &Tw<FilterSpec>) -> Result<Vec<SegmentType>, SpaceErr> {
        values
            .iter()
            .map(|v| {
                SegmentType::parse_any(v).map_err(|_| {
                    SpaceErr::illegal_argument(format!(
                        "unknown type '{}' at offset {}",
                        v,
                        trace.trace.offset()
                    ))
                })
            })
            .collect()
    }
}

fn property_values(values: &[String]) -> Vec<Value> {
    values.iter().map(|v| Value::String(v.clone())).collect()
}

fn unmatched(what: &str, specs: &[&Tw<FilterSpec>], fallback: usize) -> SpaceErr {
    let offset = specs.first().map(|s| s.trace.offset()).unwrap_or(fallback);
    SpaceErr::illegal_argument(format!("unmatched {} at offset {}", what, offset))
}

impl TraversalListener for QueryCompiler {
    type Err = SpaceErr;

    fn enter_traversal(&mut self, traversal: &Traversal) -> Result<(), Self::Err> {
        if !traversal.absolute {
            if let Some(origin) = self.origin.clone() {
                self.main.path(Filter::with_path(origin.clone()));
                self.position = Position::Entities(Some(origin.segment_type()));
            }
        }
        Ok(())
    }

    fn enter_entity(&mut self, step: &Tw<Step>, entity: &EntityStep) -> Result<(), Self::Err> {
        self.expect_entities(step.trace.offset(), "an entity")?;
        let segment_type = match (entity.segment_type, self.position) {
            (Some(segment_type), _) => Some(segment_type),
            (None, Position::Start) => Some(SegmentType::Tenant),
            (None, Position::Entities(Some(parent))) => match parent.children() {
                [only] => Some(*only),
                _ => None,
            },
            (None, _) => None,
        };
        self.hop_to_children();
        if let Some(segment_type) = segment_type {
            self.builder().path(Filter::with_type(segment_type));
        }
        self.builder().path(Filter::with_id(&entity.id));
        self.position = Position::Entities(segment_type);
        Ok(())
    }

    fn enter_collection(
        &mut self,
        step: &Tw<Step>,
        collection: &CollectionStep,
    ) -> Result<(), Self::Err> {
        self.expect_entities(step.trace.offset(), "a collection")?;
        if !collection.recursive {
            self.hop_to_children();
        }
        self.builder()
            .path(Filter::with_type(collection.segment_type));
        self.position = Position::Entities(Some(collection.segment_type));
        Ok(())
    }

    fn enter_collection_id(&mut self, id: &Tw<String>) -> Result<(), Self::Err> {
        self.builder().path(Filter::with_id(&id.w));
        Ok(())
    }

    fn enter_recursive(
        &mut self,
        step: &Tw<Step>,
        recursive: &RecursiveStep,
    ) -> Result<(), Self::Err> {
        self.expect_entities(step.trace.offset(), "a recursive step")?;
        let role = match recursive.direction {
            Direction::Outgoing => EntityRole::Source,
            Direction::Incoming => EntityRole::Target,
            Direction::Both => EntityRole::Any,
        };
        let mut body = QueryBuilder::new();
        body.path(Filter::RelatedBy {
            relationship: RelationRef::Name(recursive.over.clone()),
            role,
            other_end: None,
        });
        self.body = Some(body);
        Ok(())
    }

    fn exit_recursive(&mut self, _recursive: &RecursiveStep) -> Result<(), Self::Err> {
        if let Some(body) = self.body.take() {
            self.main.path(Filter::Recurse(body.build().filters()));
        }
        self.position = Position::Entities(None);
        Ok(())
    }

    fn enter_relationships(
        &mut self,
        step: &Tw<Step>,
        relationships: &RelationshipStep,
    ) -> Result<(), Self::Err> {
        self.expect_entities(step.trace.offset(), "a relationship hop")?;
        self.builder()
            .path(Filter::relationships(relationships.direction));
        if let Some(name) = &relationships.name {
            self.builder().path(Filter::relation_named(name));
        }
        self.position = Position::Relationships(relationships.direction);
        Ok(())
    }

    fn enter_selector(
        &mut self,
        relationships: &RelationshipStep,
        selector: &Tw<Selector>,
    ) -> Result<(), Self::Err> {
        if let Selector::Entities(_) = selector.w {
            self.builder()
                .path(Filter::entities(relationships.direction));
            self.position = Position::Entities(None);
        }
        Ok(())
    }

    fn enter_identical(&mut self, step: &Tw<Step>) -> Result<(), Self::Err> {
        self.expect_entities(step.trace.offset(), "'identical'")?;
        self.builder().path(Filter::Identical);
        Ok(())
    }

    fn filters(
        &mut self,
        context: FilterContext,
        specs: &[Tw<FilterSpec>],
    ) -> Result<(), Self::Err> {
        let mut filters = vec![];
        let mut property_names = vec![];
        let mut property_values_specs = vec![];
        let mut related_by = vec![];
        let mut related_ends = vec![];

        for spec in specs {
            match (context, spec.key) {
                (_, FilterKey::PropertyName) => property_names.push(spec),
                (_, FilterKey::PropertyValue) => property_values_specs.push(spec),
                (FilterContext::Entity, FilterKey::Type) => {
                    filters.push(Filter::WithTypes(Self::segment_types(&spec.values, spec)?))
                }
                (FilterContext::Entity, FilterKey::Id) => {
                    filters.push(Filter::with_ids(spec.values.iter()))
                }
                (FilterContext::Relationship, FilterKey::Id) => {
                    filters.push(Filter::RelationWithIds(spec.values.clone()))
                }
                (_, FilterKey::Cp) => {
                    let mut paths = vec![];
                    for value in &spec.values {
                        paths.push(self.resolve_path(value, spec)?);
                    }
                    filters.push(Filter::WithCanonicalPaths(paths));
                }
                (FilterContext::Entity, FilterKey::Name) => filters.push(Filter::WithProperty {
                    name: "name".to_string(),
                    values: property_values(&spec.values),
                }),
                // a relationship's type is its name
                (FilterContext::Relationship, FilterKey::Name | FilterKey::Type) => {
                    filters.push(Filter::RelationWithNames(spec.values.clone()))
                }
                (_, FilterKey::DefinedBy) => {
                    for value in &spec.values {
                        filters.push(Filter::DefinedBy(self.resolve_path(value, spec)?));
                    }
                }
                (_, FilterKey::RelatedBy) => {
                    for value in &spec.values {
                        related_by.push((value.clone(), spec));
                    }
                }
                (_, FilterKey::RelatedTo) => {
                    for value in &spec.values {
                        related_ends.push((EntityRole::Source, self.resolve_path(value, spec)?, spec));
                    }
                }
                (_, FilterKey::RelatedWith) => {
                    for value in &spec.values {
                        related_ends.push((EntityRole::Any, self.resolve_path(value, spec)?, spec));
                    }
                }
                (_, FilterKey::SourceType) => filters.push(Filter::RelationWithSourceTypes(
                    Self::segment_types(&spec.values, spec)?,
                )),
                (_, FilterKey::TargetType) => filters.push(Filter::RelationWithTargetTypes(
                    Self::segment_types(&spec.values, spec)?,
                )),
            }
        }

        let fallback = specs.first().map(|s| s.trace.offset()).unwrap_or(0);

        if property_values_specs.is_empty() {
            for spec in &property_names {
                for name in &spec.values {
                    filters.push(property_filter(context, name.clone(), vec![]));
                }
            }
        } else if property_names.len() == property_values_specs.len() {
            for (name, values) in property_names.iter().zip(property_values_specs.iter()) {
                match name.values.as_slice() {
                    [single] => filters.push(property_filter(
                        context,
                        single.clone(),
                        property_values(&values.values),
                    )),
                    _ => return Err(unmatched("propertyName", &[*name], fallback)),
                }
            }
        } else if property_names.len() > property_values_specs.len() {
            return Err(unmatched(
                "propertyName",
                &property_names[property_values_specs.len()..],
                fallback,
            ));
        } else {
            return Err(unmatched(
                "propertyValue",
                &property_values_specs[property_names.len()..],
                fallback,
            ));
        }

        if related_by.len() != related_ends.len() {
            let spec = if related_by.len() > related_ends.len() {
                related_by[related_ends.len()].1
            } else {
                related_ends[related_by.len()].2
            };
            return Err(unmatched("relatedBy/relatedTo/relatedWith", &[spec], fallback));
        }
        for ((name, _), (role, other_end, _)) in related_by.into_iter().zip(related_ends.into_iter()) {
            filters.push(Filter::RelatedBy {
                relationship: RelationRef::Name(name),
                role,
                other_end: Some(other_end),
            });
        }

        self.builder().filters(filters);
        Ok(())
    }
}

fn property_filter(context: FilterContext, name: String, values: Vec<Value>) -> Filter {
    match context {
        FilterContext::Entity => Filter::WithProperty { name, values },
        FilterContext::Relationship => Filter::RelationWithProperties { name, values },
    }
}

#[cfg(test)]
pub mod test {
    use crate::space::err::SpaceErr;
    use crate::space::filter::{Filter, RelationRef};
    use crate::space::kind::{Direction, EntityRole, SegmentType};
    use crate::space::point::CanonicalPath;
    use crate::space::query::FragmentRole;
    use crate::space::traversal::{compile, compile_at};
    use core::str::FromStr;
    use serde_json::Value;

    #[test]
    pub fn test_absolute_collections() -> Result<(), SpaceErr> {
        let query = compile("tenants/t1/environments/e1/resources;recursive", None)?;
        let filters = query.filters();
        assert_eq!(
            filters,
            vec![
                Filter::with_type(SegmentType::Tenant),
                Filter::with_id("t1"),
                Filter::contains(),
                Filter::with_type(SegmentType::Environment),
                Filter::with_id("e1"),
                Filter::Recurse(vec![Filter::contains()]),
                Filter::with_type(SegmentType::Resource),
            ]
        );
        assert!(query
            .fragments()
            .iter()
            .all(|f| f.role == FragmentRole::Path));
        Ok(())
    }

    #[test]
    pub fn test_relative_to_origin() -> Result<(), SpaceErr> {
        let origin = CanonicalPath::tenant("t1");
        let query = compile(
            "e;env1/r;host1/relationships;out[name=contains]/entities[type=m]",
            Some(&origin),
        )?;
        let fragments = query.fragments();
        assert_eq!(fragments[0].filter, Filter::with_path(origin));
        let filters = query.filters();
        assert_eq!(
            &filters[1..],
            &[
                Filter::contains(),
                Filter::with_type(SegmentType::Environment),
                Filter::with_id("env1"),
                Filter::contains(),
                Filter::with_type(SegmentType::Resource),
                Filter::with_id("host1"),
                Filter::relationships(Direction::Outgoing),
                Filter::RelationWithNames(vec!["contains".to_string()]),
                Filter::entities(Direction::Outgoing),
                Filter::with_type(SegmentType::Metric),
            ]
        );
        let last = fragments.last().unwrap();
        assert_eq!(last.role, FragmentRole::Filter);
        Ok(())
    }

    #[test]
    pub fn test_property_pairing() -> Result<(), SpaceErr> {
        let query = compile(
            "tenants/t1/feeds[propertyName=os;propertyValue=linux,bsd;propertyName=arch]",
            None,
        );
        assert!(query.is_err());

        let query = compile(
            "tenants/t1/feeds[propertyName=os;propertyValue=linux,bsd]",
            None,
        )?;
        assert_eq!(
            query.filters().last(),
            Some(&Filter::WithProperty {
                name: "os".to_string(),
                values: vec![Value::from("linux"), Value::from("bsd")],
            })
        );

        let query = compile("tenants/t1/feeds[propertyName=os,arch]", None)?;
        let filters = query.filters();
        assert_eq!(filters[filters.len() - 2], Filter::with_property("os"));
        assert_eq!(filters[filters.len() - 1], Filter::with_property("arch"));
        Ok(())
    }

    #[test]
    pub fn test_related_pairing() -> Result<(), SpaceErr> {
        let query = compile(
            "tenants/t1/resourceTypes[relatedBy=owns;relatedTo=\"/t;t1/mt;latency\"]",
            None,
        )?;
        assert_eq!(
            query.filters().last(),
            Some(&Filter::RelatedBy {
                relationship: RelationRef::Name("owns".to_string()),
                role: EntityRole::Source,
                other_end: Some(CanonicalPath::from_str("/t;t1/mt;latency")?),
            })
        );

        let err = compile("tenants/t1/resourceTypes[relatedBy=owns]", None).unwrap_err();
        assert!(matches!(err, SpaceErr::IllegalArgument(_)));
        Ok(())
    }

    #[test]
    pub fn test_recursive_over() -> Result<(), SpaceErr> {
        let query = compile("tenants/t1/recursive;over=isParentOf;in", None)?;
        assert_eq!(
            query.filters().last(),
            Some(&Filter::Recurse(vec![Filter::RelatedBy {
                relationship: RelationRef::Name("isParentOf".to_string()),
                role: EntityRole::Target,
                other_end: None,
            }]))
        );
        Ok(())
    }

    #[test]
    pub fn test_selectors() {
        assert!(compile("tenants/t1/relationships;out/entities/identical", None).is_ok());
        assert!(compile("tenants/t1/relationships/relationships[name=x]", None).is_ok());
        let err = compile("tenants/t1/relationships/relationships/e;x", None).unwrap_err();
        assert!(matches!(err, SpaceErr::IllegalArgument(_)));
    }

    #[test]
    pub fn test_typed_relationship_hop() -> Result<(), SpaceErr> {
        let query = compile("tenants/t1/relationships;out[type=owns]", None)?;
        assert_eq!(
            query.filters().last(),
            Some(&Filter::RelationWithNames(vec!["owns".to_string()]))
        );
        Ok(())
    }

    #[test]
    pub fn test_misplaced_steps_report_their_offset() {
        for (text, what) in [
            ("tenants/t1/relationships/relationships/relationships", "a relationship hop"),
            ("tenants/t1/relationships/relationships/recursive", "a recursive step"),
        ] {
            match compile(text, None) {
                Err(SpaceErr::IllegalArgument(msg)) => {
                    assert!(msg.starts_with(what), "{}", msg);
                    assert!(msg.contains("at offset 39"), "{}", msg);
                }
                other => panic!("expected an illegal argument, got {:?}", other),
            }
        }
    }

    #[test]
    pub fn test_compile_at_offset() {
        let src = "select tenants/t1/environments;typo";
        match compile_at(src, 7, None) {
            Err(SpaceErr::Parse(errs)) => {
                let report = errs.first().unwrap();
                assert_eq!(report.offset, 31);
                assert_eq!(report.token, "typo");
                assert_eq!(report.expected, vec!["recursive".to_string()]);
            }
            other => panic!("expected a parse error, got {:?}", other),
        }
    }
}
