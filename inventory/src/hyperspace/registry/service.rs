use crate::hyperspace::compiler::FilterApplicator;
use crate::hyperspace::err::InvErr;
use crate::hyperspace::registry::kinds::{AnyEntity, EntityKind, Materialize, Relationships};
use crate::hyperspace::registry::ops;
use crate::hyperspace::registry::page::{compare_rows, Order, Page, Pager};
use crate::hyperspace::registry::Inventory;
use crate::hyperspace::schema;
use crate::hyperspace::substrate::{ElementId, GraphRead};
use crate::space::entity::{Properties, Relationship};
use crate::space::filter::Filter;
use crate::space::kind::Direction;
use crate::space::point::CanonicalPath;
use crate::space::query::Query;
use crate::space::traversal;
use serde_json::Value;
use std::marker::PhantomData;
use tracing::instrument;

/// The entities of one kind directly under a parent (or all tenants).
pub struct EntityService<K: EntityKind> {
    inventory: Inventory,
    parent: Option<CanonicalPath>,
    phantom: PhantomData<K>,
}

impl<K: EntityKind> Clone for EntityService<K> {
    fn clone(&self) -> Self {
        Self {
            inventory: self.inventory.clone(),
            parent: self.parent.clone(),
            phantom: PhantomData,
        }
    }
}

impl<K: EntityKind> EntityService<K> {
    pub(crate) fn new(inventory: Inventory, parent: Option<CanonicalPath>) -> Self {
        Self {
            inventory,
            parent,
            phantom: PhantomData,
        }
    }

    pub fn parent(&self) -> Option<&CanonicalPath> {
        self.parent.as_ref()
    }

    /// the path an entity with `id` has under this service's parent
    fn path_of(&self, id: &str) -> Result<CanonicalPath, InvErr> {
        match &self.parent {
            Some(parent) => Ok(parent.extend(K::SEGMENT, id)?),
            None if K::SEGMENT.is_root() => Ok(CanonicalPath::extender().extend(K::SEGMENT, id)?.get()?),
            None => Err(InvErr::illegal_argument(format!(
                "{} '{}' needs a parent",
                K::SEGMENT,
                id
            ))),
        }
    }

    /// addresses the entity with `id`; whether it exists is only checked when it is used
    pub fn get(&self, id: &str) -> Result<Single<K>, InvErr> {
        Ok(Single::new(self.inventory.clone(), self.path_of(id)?))
    }

    pub fn get_all(&self, filters: Vec<Filter>) -> Multiple<K> {
        let mut builder = Query::builder();
        match &self.parent {
            Some(parent) => {
                builder
                    .path(Filter::with_path(parent.clone()))
                    .path(Filter::contains())
                    .path(Filter::with_type(K::SEGMENT));
            }
            None => {
                builder.path(Filter::with_type(K::SEGMENT));
            }
        }
        builder.filters(filters);
        Multiple::new(self.inventory.clone(), builder.build())
    }

    #[instrument(skip_all, fields(kind = %K::SEGMENT, id = %K::id(blueprint)))]
    pub async fn create(&self, blueprint: &K::Blueprint) -> Result<Single<K>, InvErr> {
        let parent = self.parent.as_ref();
        let path = self
            .inventory
            .transact("create", |tx| ops::create::<K>(tx, parent, blueprint))
            .await?;
        Ok(Single::new(self.inventory.clone(), path))
    }

    pub async fn update(&self, id: &str, update: &K::Update) -> Result<(), InvErr> {
        self.get(id)?.update(update).await
    }

    pub async fn delete(&self, id: &str) -> Result<Vec<CanonicalPath>, InvErr> {
        self.get(id)?.delete().await
    }
}

/// A handle on the entity at one path.
pub struct Single<K: EntityKind> {
    inventory: Inventory,
    path: CanonicalPath,
    phantom: PhantomData<K>,
}

impl<K: EntityKind> Clone for Single<K> {
    fn clone(&self) -> Self {
        Self::new(self.inventory.clone(), self.path.clone())
    }
}

impl<K: EntityKind> Single<K> {
    pub(crate) fn new(inventory: Inventory, path: CanonicalPath) -> Self {
        Self {
            inventory,
            path,
            phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &CanonicalPath {
        &self.path
    }

    pub async fn entity(&self) -> Result<K::Entity, InvErr> {
        let path = &self.path;
        self.inventory
            .read(|graph| {
                let vertex = ops::require(graph, path)?;
                K::materialize(graph, ElementId::Vertex(vertex))?
                    .ok_or_else(|| InvErr::not_found(path))
            })
            .await
    }

    pub async fn exists(&self) -> Result<bool, InvErr> {
        let path = &self.path;
        self.inventory
            .read(|graph| Ok(ops::locate(graph, path)?.is_some()))
            .await
    }

    #[instrument(skip_all, fields(path = %self.path))]
    pub async fn update(&self, update: &K::Update) -> Result<(), InvErr> {
        let path = &self.path;
        self.inventory
            .transact("update", |tx| ops::update::<K>(tx, path, update))
            .await
    }

    /// deletes the entity and everything it contains; returns the removed paths
    #[instrument(skip_all, fields(path = %self.path))]
    pub async fn delete(&self) -> Result<Vec<CanonicalPath>, InvErr> {
        let path = &self.path;
        self.inventory
            .transact("delete", |tx| ops::delete(tx, path))
            .await
    }

    /// the entities of kind `C` this entity contains
    pub fn contained<C: EntityKind>(&self) -> Result<EntityService<C>, InvErr> {
        ops::check_containment(&self.path, C::SEGMENT)?;
        Ok(EntityService::new(
            self.inventory.clone(),
            Some(self.path.clone()),
        ))
    }

    /// relationships of this entity in `direction`
    pub fn relationships(&self, direction: Direction) -> Multiple<Relationships> {
        let query = Query::builder()
            .path(Filter::with_path(self.path.clone()))
            .path(Filter::relationships(direction))
            .build();
        Multiple::new(self.inventory.clone(), query)
    }

    /// Relates this entity to `other`: as source for `Outgoing`, as target for `Incoming`.
    #[instrument(skip(self, other, properties), fields(path = %self.path, other = %other))]
    pub async fn link_with(
        &self,
        name: &str,
        other: &CanonicalPath,
        direction: Direction,
        properties: Properties,
    ) -> Result<Relationship, InvErr> {
        let (source, target) = match direction {
            Direction::Outgoing => (&self.path, other),
            Direction::Incoming => (other, &self.path),
            Direction::Both => {
                return Err(InvErr::illegal_argument(format!(
                    "relationship '{}' needs a direction, not both",
                    name
                )))
            }
        };
        self.inventory
            .transact("link", |tx| ops::link(tx, name, source, target, properties))
            .await
    }

    /// relates an existing entity to this one by an outgoing `name` relationship
    pub async fn associate(&self, name: &str, other: &CanonicalPath) -> Result<Relationship, InvErr> {
        self.link_with(name, other, Direction::Outgoing, Properties::new())
            .await
    }

    #[instrument(skip(self, other), fields(path = %self.path, other = %other))]
    pub async fn disassociate(&self, name: &str, other: &CanonicalPath) -> Result<(), InvErr> {
        let path = &self.path;
        self.inventory
            .transact("unlink", |tx| ops::unlink(tx, name, path, other))
            .await
    }

    /// what a traversal starting at this entity reaches
    pub fn query(&self, text: &str) -> Result<Multiple<AnyEntity>, InvErr> {
        let query = traversal::compile(text, Some(&self.path))?;
        Ok(Multiple::new(self.inventory.clone(), query))
    }
}

/// The result of a query, read lazily and a page at a time.
pub struct Multiple<M: Materialize> {
    inventory: Inventory,
    query: Query,
    phantom: PhantomData<M>,
}

impl<M: Materialize> Clone for Multiple<M> {
    fn clone(&self) -> Self {
        Self::new(self.inventory.clone(), self.query.clone())
    }
}

impl<M: Materialize> Multiple<M> {
    pub(crate) fn new(inventory: Inventory, query: Query) -> Self {
        Self {
            inventory,
            query,
            phantom: PhantomData,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// narrows this result further
    pub fn filtered(&self, filters: Vec<Filter>) -> Self {
        let query = self.query.extend().filters(filters).build();
        Self::new(self.inventory.clone(), query)
    }

    /// One page of the result.
    ///
    /// Every candidate is checked to compute the total; only the window of the page is turned
    /// into entities.  Without an explicit order the result is sorted by path.
    pub async fn entities(&self, pager: &Pager) -> Result<Page<M::Entity>, InvErr> {
        let pager = pager.clone().clamped(self.inventory.config().max_page_size);
        let query = &self.query;
        self.inventory
            .read(|graph| {
                let mut accepted = vec![];
                for element in FilterApplicator::new(graph).elements(query)? {
                    if M::accepts(graph, element)? {
                        accepted.push(element);
                    }
                }
                let total_size = accepted.len();

                let order = if pager.order.is_empty() {
                    vec![Order::asc("path")]
                } else {
                    pager.order.clone()
                };
                let mut rows = Vec::with_capacity(accepted.len());
                for element in accepted {
                    rows.push((sort_keys(graph, element, &order)?, element));
                }
                rows.sort_by(|(a, _), (b, _)| compare_rows(&order, a, b));

                let mut items = vec![];
                for (_, element) in &rows[pager.window(total_size)] {
                    if let Some(entity) = M::materialize(graph, *element)? {
                        items.push(entity);
                    }
                }
                Ok(Page {
                    items,
                    pager,
                    total_size,
                })
            })
            .await
    }

    pub async fn all(&self) -> Result<Vec<M::Entity>, InvErr> {
        Ok(self.entities(&Pager::none()).await?.items)
    }

    /// the first entity by path
    pub async fn first(&self) -> Result<Option<M::Entity>, InvErr> {
        Ok(self.entities(&Pager::new(0, 1)).await?.items.into_iter().next())
    }

    /// paths of everything the query reaches, sorted
    pub async fn paths(&self) -> Result<Vec<CanonicalPath>, InvErr> {
        let query = &self.query;
        self.inventory
            .read(|graph| {
                let mut rtn = vec![];
                for element in FilterApplicator::new(graph).elements(query)? {
                    if M::accepts(graph, element)? {
                        if let Some(path) = element_path(graph, element)? {
                            rtn.push(path);
                        }
                    }
                }
                rtn.sort_by_key(|p| p.to_string());
                Ok(rtn)
            })
            .await
    }
}

fn element_path(graph: &dyn GraphRead, element: ElementId) -> Result<Option<CanonicalPath>, InvErr> {
    Ok(match element {
        ElementId::Vertex(id) => graph.vertex(id)?.as_ref().and_then(schema::vertex_path),
        ElementId::Edge(id) => graph
            .edge(id)?
            .as_ref()
            .and_then(schema::edge_id)
            .map(CanonicalPath::relationship),
    })
}

fn sort_keys(
    graph: &dyn GraphRead,
    element: ElementId,
    order: &[Order],
) -> Result<Vec<Option<Value>>, InvErr> {
    let mut rtn = Vec::with_capacity(order.len());
    match element {
        ElementId::Vertex(id) => {
            let vertex = graph.vertex(id)?;
            for o in order {
                let key = match o.field.as_str() {
                    "id" => schema::EID,
                    "path" => schema::CP,
                    other => other,
                };
                rtn.push(vertex.as_ref().and_then(|v| v.property(key)).cloned());
            }
        }
        ElementId::Edge(id) => {
            let edge = graph.edge(id)?;
            for o in order {
                rtn.push(edge.as_ref().and_then(|e| match o.field.as_str() {
                    "id" | "path" => e.property(schema::EID).cloned(),
                    "name" => Some(Value::from(e.label.clone())),
                    other => e.property(other).cloned(),
                }));
            }
        }
    }
    Ok(rtn)
}
