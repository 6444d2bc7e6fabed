use inventory::hyperspace::err::InvErr;
use inventory::hyperspace::registry::kinds::{
    DataEntities, Environments, OperationTypes, Resources, ResourceTypes,
};
use inventory::hyperspace::registry::page::Pager;
use inventory::hyperspace::registry::service::Single;
use inventory::hyperspace::registry::Inventory;
use inventory::space::entity::{
    DataEntityBlueprint, EnvironmentBlueprint, OperationTypeBlueprint, Properties,
    ResourceBlueprint, ResourceTypeBlueprint, TenantBlueprint,
};
use inventory::space::err::SpaceErr;
use inventory::space::filter::Filter;
use inventory::space::kind::{DataRole, Direction, EntityRole, SegmentType};
use inventory::space::point::CanonicalPath;
use inventory::space::query::Query;
use inventory::InventoryConfig;
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;
use std::str::FromStr;

fn cp(text: &str) -> CanonicalPath {
    CanonicalPath::from_str(text).unwrap()
}

struct Fixture {
    inventory: Inventory,
    rt1: Single<ResourceTypes>,
    e1: Single<Environments>,
}

/// tenant t1 with resource type rt1 and environment e1 holding r1 of type rt1
async fn fixture() -> Result<Fixture, InvErr> {
    let inventory = Inventory::memory(InventoryConfig::default());
    let t1 = inventory.tenants().create(&TenantBlueprint::new("t1")).await?;
    let rt1 = t1
        .contained::<ResourceTypes>()?
        .create(&ResourceTypeBlueprint::new("rt1"))
        .await?;
    let e1 = t1
        .contained::<Environments>()?
        .create(&EnvironmentBlueprint::new("e1"))
        .await?;
    e1.contained::<Resources>()?
        .create(&ResourceBlueprint::new("r1", "../rt;rt1"))
        .await?;
    Ok(Fixture { inventory, rt1, e1 })
}

#[tokio::test]
async fn deleting_an_environment_cascades() -> Result<(), InvErr> {
    let Fixture { inventory, rt1, e1 } = fixture().await?;
    let removed = e1.delete().await?;
    assert_eq!(removed, vec![cp("/t;t1/e;e1"), cp("/t;t1/e;e1/r;r1")]);
    assert!(!inventory
        .entity::<Resources>(&cp("/t;t1/e;e1/r;r1"))?
        .exists()
        .await?);
    assert!(rt1.exists().await?);
    Ok(())
}

#[tokio::test]
async fn deleting_a_type_is_not_blocked_by_its_instances() -> Result<(), InvErr> {
    let Fixture { inventory, rt1, .. } = fixture().await?;
    rt1.delete().await?;
    let r1 = inventory
        .entity::<Resources>(&cp("/t;t1/e;e1/r;r1"))?
        .entity()
        .await?;
    assert_eq!(r1.resource_type, None);
    Ok(())
}

#[tokio::test]
async fn deleting_is_blocked_by_a_contained_definer() -> Result<(), InvErr> {
    let Fixture { inventory, rt1, .. } = fixture().await?;
    let ot1 = rt1
        .contained::<OperationTypes>()?
        .create(&OperationTypeBlueprint::new("ot1"))
        .await?;
    let rt2 = inventory
        .tenants()
        .get("t1")?
        .contained::<ResourceTypes>()?
        .create(&ResourceTypeBlueprint::new("rt2"))
        .await?;
    let data = rt2
        .contained::<DataEntities>()?
        .create(&DataEntityBlueprint::new(DataRole::Configuration, json!({"port": 22})))
        .await?;
    ot1.associate("defines", data.path()).await?;

    match rt1.delete().await.unwrap_err() {
        InvErr::IllegalState { path, reason } => {
            assert_eq!(&path, ot1.path());
            assert!(reason.contains("/t;t1/rt;rt2/d;configuration"));
        }
        other => panic!("expected an illegal state, got {:?}", other),
    }
    // nothing was removed
    assert!(rt1.exists().await?);
    assert!(ot1.exists().await?);

    ot1.disassociate("defines", data.path()).await?;
    rt1.delete().await?;
    assert!(!ot1.exists().await?);
    assert!(data.exists().await?);
    Ok(())
}

#[tokio::test]
async fn containment_cannot_form_a_cycle() -> Result<(), InvErr> {
    let Fixture { inventory, e1, .. } = fixture().await?;
    let r1 = cp("/t;t1/e;e1/r;r1");

    let err = e1
        .link_with("contains", &r1, Direction::Outgoing, Properties::new())
        .await
        .unwrap_err();
    assert!(matches!(err, InvErr::RelationAlreadyExists { .. }));

    let err = e1
        .link_with("contains", &r1, Direction::Incoming, Properties::new())
        .await
        .unwrap_err();
    assert!(err.is_illegal_argument());

    let t1 = inventory.tenants().get("t1")?;
    let err = e1
        .link_with("contains", t1.path(), Direction::Outgoing, Properties::new())
        .await
        .unwrap_err();
    assert!(err.is_illegal_argument());

    // every entity still has at most one parent
    let containments = inventory
        .relationships()
        .all(vec![Filter::relation_named("contains")])
        .all()
        .await?;
    let targets: BTreeSet<CanonicalPath> =
        containments.iter().map(|r| r.target.clone()).collect();
    assert_eq!(targets.len(), containments.len());
    assert!(!targets.contains(t1.path()));
    Ok(())
}

#[tokio::test]
async fn typos_are_reported_with_their_offset() -> Result<(), InvErr> {
    let Fixture { inventory, .. } = fixture().await?;
    let err = inventory
        .traverse("tenants/t1/environments/e1/resources;typo", None)
        .err()
        .unwrap();
    match err {
        InvErr::Space(SpaceErr::Parse(errs)) => {
            let report = errs.first().unwrap();
            assert_eq!(report.offset, 37);
            assert_eq!(report.token, "typo");
            assert!(report.expected.contains(&"recursive".to_string()));
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn related_by_hops_alike_in_both_roles() -> Result<(), InvErr> {
    let Fixture { inventory, rt1, .. } = fixture().await?;
    let by_path = Query::builder()
        .path(Filter::with_path(rt1.path().clone()))
        .path(Filter::related_by("defines", EntityRole::Source))
        .build();
    let by_filter = Query::builder()
        .path(Filter::with_path(rt1.path().clone()))
        .filter(Filter::related_by("defines", EntityRole::Source))
        .build();
    let a = inventory.query(by_path).paths().await?;
    let b = inventory.query(by_filter).paths().await?;
    assert_eq!(a, vec![cp("/t;t1/e;e1/r;r1")]);
    assert_eq!(a, b);
    Ok(())
}

#[tokio::test]
async fn disjoint_branches_union() -> Result<(), InvErr> {
    let Fixture { inventory, e1, .. } = fixture().await?;
    let resources = e1.contained::<Resources>()?;
    for (id, os) in [("r2", "linux"), ("r3", "bsd"), ("r4", "plan9")] {
        let mut blueprint = ResourceBlueprint::new(id, "/t;t1/rt;rt1");
        blueprint.properties.insert("os".to_string(), json!(os));
        resources.create(&blueprint).await?;
    }

    let branch = |os: &str| {
        Query::builder()
            .filter(Filter::with_property_values("os", [os]))
            .build()
    };
    let query = |branches: Vec<Query>| {
        Query::builder()
            .path(Filter::with_path(e1.path().clone()))
            .path(Filter::contains())
            .branch(branches)
            .build()
    };

    let both = inventory
        .query(query(vec![branch("linux"), branch("bsd")]))
        .paths()
        .await?;
    let mut separately = inventory.query(query(vec![branch("linux")])).paths().await?;
    separately.append(&mut inventory.query(query(vec![branch("bsd")])).paths().await?);
    separately.sort_by_key(|p| p.to_string());
    assert_eq!(both, separately);
    assert_eq!(both.len(), 2);
    Ok(())
}

#[tokio::test]
async fn pages_add_up_to_the_total() -> Result<(), InvErr> {
    let Fixture { inventory, e1, .. } = fixture().await?;
    let resources = e1.contained::<Resources>()?;
    for index in 2..=11 {
        resources
            .create(&ResourceBlueprint::new(format!("r{}", index), "/t;t1/rt;rt1"))
            .await?;
    }
    let all = inventory.traverse("resources", Some(e1.path()))?;
    for size in 1..=12 {
        let mut seen = vec![];
        let mut pager = Pager::new(0, size);
        loop {
            let page = all.entities(&pager).await?;
            assert_eq!(page.total_size, 11);
            seen.extend(page.items.iter().map(|e| e.path()));
            if page.is_last() {
                break;
            }
            pager = pager.next();
        }
        assert_eq!(seen.len(), 11);
        assert_eq!(seen.iter().collect::<BTreeSet<_>>().len(), 11);
    }
    Ok(())
}

#[tokio::test]
async fn traversals_reach_entities_and_relationships() -> Result<(), InvErr> {
    let Fixture { inventory, .. } = fixture().await?;
    let types = inventory
        .traverse("/t;t1/e;e1/r;r1/relationships;defines;in/entities", None)?
        .paths()
        .await?;
    assert_eq!(types, vec![cp("/t;t1/rt;rt1")]);

    let everything = inventory
        .traverse("tenants/t1/recursive", None)?
        .paths()
        .await?;
    assert_eq!(everything.len(), 4);
    assert!(everything
        .iter()
        .all(|p| p.segment_type() != SegmentType::Relationship));
    Ok(())
}

fn path_id() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_;/\\\\-]{1,8}"
}

fn canonical_path() -> impl Strategy<Value = CanonicalPath> {
    (
        path_id(),
        prop::collection::vec((any::<prop::sample::Index>(), path_id()), 0..5),
    )
        .prop_map(|(tenant, steps)| {
            let mut path = CanonicalPath::tenant(tenant);
            for (index, id) in steps {
                let children = path.segment_type().children();
                if children.is_empty() {
                    break;
                }
                let child = children[index.index(children.len())];
                match path.extend(child, id) {
                    Ok(extended) => path = extended,
                    Err(_) => break,
                }
            }
            path
        })
}

proptest! {
    #[test]
    fn paths_print_and_parse_to_themselves(path in canonical_path()) {
        let text = path.to_string();
        prop_assert_eq!(CanonicalPath::from_str(&text).unwrap(), path);
    }
}
