pub mod kinds;
pub mod ops;
pub mod page;
pub mod relationship;
pub mod service;

use crate::base::config::InventoryConfig;
use crate::hyperspace::err::InvErr;
use crate::hyperspace::registry::kinds::{AnyEntity, EntityKind, Materialize, Tenants};
use crate::hyperspace::registry::page::Pager;
use crate::hyperspace::registry::relationship::RelationshipService;
use crate::hyperspace::registry::service::{EntityService, Multiple, Single};
use crate::hyperspace::substrate::mem::MemorySubstrate;
use crate::hyperspace::substrate::{ElementId, GraphRead, GraphSubstrate, GraphTx};
use crate::space::entity::{Element, Properties, Relationship};
use crate::space::point::CanonicalPath;
use crate::space::query::Query;
use crate::space::traversal;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info, instrument, warn};

/// An inventory: the registry services over one graph substrate.
///
/// Every operation runs in its own transaction while holding the inventory's lock for reading;
/// a [`Bulk`] holds it for writing so that its creates become visible all at once.
#[derive(Clone)]
pub struct Inventory {
    substrate: Arc<dyn GraphSubstrate>,
    lock: Arc<RwLock<()>>,
    config: Arc<InventoryConfig>,
}

impl Inventory {
    pub fn new(substrate: Arc<dyn GraphSubstrate>, config: InventoryConfig) -> Self {
        Self {
            substrate,
            lock: Arc::new(RwLock::new(())),
            config: Arc::new(config),
        }
    }

    /// an inventory held in memory, indexed as `config` says
    pub fn memory(config: InventoryConfig) -> Self {
        info!("starting {} inventory", config.substrate);
        let substrate = MemorySubstrate::with_indexes(
            config.indexed_vertex_keys.clone(),
            config.indexed_edge_keys.clone(),
        );
        Self::new(Arc::new(substrate), config)
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// the first page at the configured page size
    pub fn default_pager(&self) -> Pager {
        Pager::new(0, self.config.page_size)
    }

    pub fn tenants(&self) -> EntityService<Tenants> {
        EntityService::new(self.clone(), None)
    }

    pub fn relationships(&self) -> RelationshipService {
        RelationshipService::new(self.clone())
    }

    /// addresses the entity of kind `K` at `path`
    pub fn entity<K: EntityKind>(&self, path: &CanonicalPath) -> Result<Single<K>, InvErr> {
        if path.segment_type() != K::SEGMENT {
            return Err(InvErr::illegal_argument(format!(
                "'{}' is not a {}",
                path,
                K::SEGMENT
            )));
        }
        Ok(Single::new(self.clone(), path.clone()))
    }

    /// the entity or relationship at `path`
    pub async fn get(&self, path: &CanonicalPath) -> Result<Element, InvErr> {
        let query = Query::path(path);
        let found = self.query(query).all().await?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| InvErr::not_found(path))
    }

    pub fn query(&self, query: Query) -> Multiple<AnyEntity> {
        Multiple::new(self.clone(), query)
    }

    /// Compiles `text` and addresses what it reaches.  Relative traversals start at `origin`.
    pub fn traverse(
        &self,
        text: &str,
        origin: Option<&CanonicalPath>,
    ) -> Result<Multiple<AnyEntity>, InvErr> {
        Ok(self.query(traversal::compile(text, origin)?))
    }

    /// Opens a bulk operation.  Waits until every running operation is done and blocks new
    /// ones until the bulk is committed or dropped.
    pub async fn bulk(&self) -> Result<Bulk, InvErr> {
        let guard = self.lock.clone().write_owned().await;
        let tx = self.substrate.begin().await?;
        debug!("bulk operation opened");
        Ok(Bulk {
            _guard: guard,
            tx: Some(tx),
            created: vec![],
        })
    }

    /// runs `f` against a consistent view of the graph
    pub async fn read<F, R>(&self, f: F) -> Result<R, InvErr>
    where
        F: FnOnce(&dyn GraphRead) -> Result<R, InvErr> + Send,
        R: Send,
    {
        let _guard = self.lock.read().await;
        let tx = self.substrate.begin().await?;
        let result = f(tx.as_read());
        tx.rollback().await?;
        result
    }

    /// Runs `f` in a transaction, committing when it succeeds and rolling back when it fails.
    pub async fn transact<F, R>(&self, what: &str, f: F) -> Result<R, InvErr>
    where
        F: FnOnce(&mut dyn GraphTx) -> Result<R, InvErr> + Send,
        R: Send,
    {
        let _guard = self.lock.read().await;
        let mut tx = self.substrate.begin().await?;
        let result = f(tx.as_mut());
        match result {
            Ok(rtn) => {
                tx.commit().await?;
                debug!("committed {}", what);
                Ok(rtn)
            }
            Err(err) => {
                warn!("rolling back {}: {}", what, err);
                if let Err(rollback) = tx.rollback().await {
                    warn!("rollback of {} failed: {}", what, rollback);
                }
                Err(err)
            }
        }
    }
}

/// Several creates and links that become visible together or not at all.
///
/// The first failing operation rolls everything back and closes the bulk.  Dropping a bulk
/// without committing discards its work.
pub struct Bulk {
    _guard: OwnedRwLockWriteGuard<()>,
    tx: Option<Box<dyn GraphTx>>,
    created: Vec<CanonicalPath>,
}

impl Bulk {
    async fn run<R, F>(&mut self, f: F) -> Result<R, InvErr>
    where
        F: FnOnce(&mut dyn GraphTx) -> Result<R, InvErr> + Send,
        R: Send,
    {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| InvErr::illegal_argument("bulk operation is no longer open"))?;
        let result = f(tx.as_mut());
        if let Err(err) = &result {
            warn!("rolling back bulk operation: {}", err);
            if let Some(tx) = self.tx.take() {
                if let Err(rollback) = tx.rollback().await {
                    warn!("rollback of bulk operation failed: {}", rollback);
                }
            }
        }
        result
    }

    #[instrument(skip_all, fields(kind = %K::SEGMENT, id = %K::id(blueprint)))]
    pub async fn create<K: EntityKind>(
        &mut self,
        parent: Option<&CanonicalPath>,
        blueprint: &K::Blueprint,
    ) -> Result<CanonicalPath, InvErr> {
        let path = self
            .run(|tx| ops::create::<K>(tx, parent, blueprint))
            .await?;
        self.created.push(path.clone());
        Ok(path)
    }

    #[instrument(skip(self, properties), fields(source = %source, target = %target))]
    pub async fn link_with(
        &mut self,
        name: &str,
        source: &CanonicalPath,
        target: &CanonicalPath,
        properties: Properties,
    ) -> Result<Relationship, InvErr> {
        self.run(|tx| ops::link(tx, name, source, target, properties))
            .await
    }

    /// the entity of kind `M` at `path` as this bulk sees it
    pub fn peek<M: Materialize>(&self, path: &CanonicalPath) -> Result<Option<M::Entity>, InvErr> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| InvErr::illegal_argument("bulk operation is no longer open"))?;
        match ops::locate(tx.as_read(), path)? {
            Some(vertex) => M::materialize(tx.as_read(), ElementId::Vertex(vertex)),
            None => Ok(None),
        }
    }

    /// commits and returns the paths of the created entities
    #[instrument(skip_all)]
    pub async fn commit(mut self) -> Result<Vec<CanonicalPath>, InvErr> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| InvErr::illegal_argument("bulk operation is no longer open"))?;
        tx.commit().await?;
        let created = std::mem::take(&mut self.created);
        info!("bulk operation committed {} entities", created.len());
        Ok(created)
    }
}

impl Drop for Bulk {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!(
                "bulk operation dropped without commit; discarding {} created entities",
                self.created.len()
            );
        }
    }
}

#[cfg(test)]
pub mod test {
    use crate::base::config::InventoryConfig;
    use crate::hyperspace::err::InvErr;
    use crate::hyperspace::registry::kinds::{Environments, Resources, ResourceTypes};
    use crate::hyperspace::registry::page::{Order, Pager};
    use crate::hyperspace::registry::Inventory;
    use crate::space::entity::{
        Element, Entity, EnvironmentBlueprint, Properties, ResourceBlueprint,
        ResourceTypeBlueprint, TenantBlueprint, Update,
    };
    use crate::space::filter::Filter;
    use crate::space::kind::Direction;
    use crate::space::point::CanonicalPath;
    use core::str::FromStr;
    use serde_json::json;

    fn cp(text: &str) -> CanonicalPath {
        CanonicalPath::from_str(text).unwrap()
    }

    async fn inventory() -> Result<Inventory, InvErr> {
        let inventory = Inventory::memory(InventoryConfig::default());
        let tenant = inventory.tenants().create(&TenantBlueprint::new("t1")).await?;
        tenant
            .contained::<ResourceTypes>()?
            .create(&ResourceTypeBlueprint::new("host"))
            .await?;
        let environment = tenant
            .contained::<Environments>()?
            .create(&EnvironmentBlueprint::new("prod"))
            .await?;
        let resources = environment.contained::<Resources>()?;
        for (id, os) in [("r3", "linux"), ("r1", "bsd"), ("r2", "linux")] {
            let mut blueprint = ResourceBlueprint::new(id, "/t;t1/rt;host");
            blueprint.properties.insert("os".to_string(), json!(os));
            resources.create(&blueprint).await?;
        }
        Ok(inventory)
    }

    #[tokio::test]
    pub async fn test_services() -> Result<(), InvErr> {
        let inventory = inventory().await?;
        let resources = inventory
            .entity::<Environments>(&cp("/t;t1/e;prod"))?
            .contained::<Resources>()?;

        let all = resources.get_all(vec![]).all().await?;
        let ids: Vec<&str> = all.iter().map(|r| r.path.id()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);

        let linux = resources
            .get_all(vec![Filter::with_property_values("os", ["linux"])])
            .paths()
            .await?;
        assert_eq!(linux, vec![cp("/t;t1/e;prod/r;r2"), cp("/t;t1/e;prod/r;r3")]);

        let r1 = resources.get("r1")?;
        assert!(r1.exists().await?);
        r1.update(&Update::new().with_name("first")).await?;
        assert_eq!(r1.entity().await?.name.as_deref(), Some("first"));
        assert!(!resources.get("r9")?.exists().await?);
        assert!(resources.get("r9")?.entity().await.unwrap_err().is_not_found());

        // an empty id never addresses anything
        assert!(inventory.tenants().get("").is_err());
        assert!(resources.get("").is_err());
        assert!(inventory.tenants().create(&TenantBlueprint::new("")).await.is_err());

        // environments cannot hold resource types
        assert!(inventory
            .entity::<Environments>(&cp("/t;t1/e;prod"))?
            .contained::<ResourceTypes>()
            .is_err());

        match inventory.get(&cp("/t;t1/rt;host")).await? {
            Element::Entity(Entity::ResourceType(rt)) => assert_eq!(rt.path, cp("/t;t1/rt;host")),
            other => panic!("unexpected {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    pub async fn test_paging() -> Result<(), InvErr> {
        let inventory = inventory().await?;
        let resources = inventory.traverse("tenants/t1/environments/prod/resources", None)?;

        let page = resources.entities(&Pager::new(0, 2)).await?;
        assert_eq!(page.total_size, 3);
        assert_eq!(page.items.len(), 2);
        assert!(!page.is_last());
        let page = resources.entities(&Pager::new(1, 2)).await?;
        assert_eq!(page.total_size, 3);
        assert_eq!(page.items.len(), 1);
        assert!(page.is_last());

        let ordered = resources
            .entities(&Pager::none().ordered_by(Order::asc("os")).ordered_by(Order::desc("id")))
            .await?;
        let paths: Vec<String> = ordered.items.iter().map(|e| e.path().to_string()).collect();
        assert_eq!(
            paths,
            vec!["/t;t1/e;prod/r;r1", "/t;t1/e;prod/r;r3", "/t;t1/e;prod/r;r2"]
        );
        Ok(())
    }

    #[tokio::test]
    pub async fn test_relationships() -> Result<(), InvErr> {
        let inventory = inventory().await?;
        let r1 = inventory.entity::<Resources>(&cp("/t;t1/e;prod/r;r1"))?;
        let r2 = cp("/t;t1/e;prod/r;r2");

        let rel = r1.associate("isParentOf", &r2).await?;
        assert!(matches!(
            r1.associate("isParentOf", &r2).await.unwrap_err(),
            InvErr::RelationAlreadyExists { .. }
        ));
        assert!(r1
            .link_with("isParentOf", &r2, Direction::Both, Properties::new())
            .await
            .unwrap_err()
            .is_illegal_argument());

        let outgoing = r1.relationships(Direction::Outgoing).all().await?;
        assert_eq!(outgoing, vec![rel.clone()]);
        let incoming = r1.relationships(Direction::Incoming).all().await?;
        assert_eq!(incoming.len(), 2);

        let service = inventory.relationships();
        assert_eq!(service.get(&rel.id).await?, rel);
        let named = service
            .all(vec![Filter::relation_named("isParentOf")])
            .all()
            .await?;
        assert_eq!(named, vec![rel.clone()]);

        let mut properties = Properties::new();
        properties.insert("since".to_string(), json!(2020));
        let updated = service.update(&rel.id, &properties).await?;
        assert_eq!(updated.properties, properties);

        r1.disassociate("isParentOf", &r2).await?;
        assert!(service.get(&rel.id).await.unwrap_err().is_not_found());
        assert!(matches!(
            r1.disassociate("isParentOf", &r2).await.unwrap_err(),
            InvErr::RelationNotFound { .. }
        ));
        Ok(())
    }

    #[tokio::test]
    pub async fn test_bulk() -> Result<(), InvErr> {
        let inventory = inventory().await?;
        let t1 = cp("/t;t1");

        let mut bulk = inventory.bulk().await?;
        let staging = bulk
            .create::<Environments>(Some(&t1), &EnvironmentBlueprint::new("staging"))
            .await?;
        bulk.create::<Resources>(
            Some(&staging),
            &ResourceBlueprint::new("s1", "/t;t1/rt;host"),
        )
        .await?;
        assert!(bulk.peek::<Resources>(&cp("/t;t1/e;staging/r;s1"))?.is_some());
        let created = bulk.commit().await?;
        assert_eq!(created, vec![staging.clone(), cp("/t;t1/e;staging/r;s1")]);
        assert!(inventory.entity::<Environments>(&staging)?.exists().await?);

        // a failure rolls back the whole bulk
        let mut bulk = inventory.bulk().await?;
        bulk.create::<Environments>(Some(&t1), &EnvironmentBlueprint::new("qa"))
            .await?;
        let err = bulk
            .create::<Environments>(Some(&t1), &EnvironmentBlueprint::new("prod"))
            .await
            .unwrap_err();
        assert!(matches!(err, InvErr::EntityAlreadyExists(_)));
        assert!(bulk.commit().await.unwrap_err().is_illegal_argument());
        assert!(!inventory
            .entity::<Environments>(&cp("/t;t1/e;qa"))?
            .exists()
            .await?);

        // dropping discards
        {
            let mut bulk = inventory.bulk().await?;
            bulk.create::<Environments>(Some(&t1), &EnvironmentBlueprint::new("dev"))
                .await?;
        }
        assert!(!inventory
            .entity::<Environments>(&cp("/t;t1/e;dev"))?
            .exists()
            .await?);
        Ok(())
    }
}
