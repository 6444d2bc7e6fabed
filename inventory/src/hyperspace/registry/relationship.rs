use crate::hyperspace::err::InvErr;
use crate::hyperspace::registry::kinds::{relationship, Relationships};
use crate::hyperspace::registry::ops;
use crate::hyperspace::registry::service::Multiple;
use crate::hyperspace::registry::Inventory;
use crate::space::entity::{Properties, Relationship};
use crate::space::filter::Filter;
use crate::space::kind::SegmentType;
use crate::space::point::CanonicalPath;
use crate::space::query::Query;
use tracing::instrument;

/// Relationships addressed by id rather than by their ends.
#[derive(Clone)]
pub struct RelationshipService {
    inventory: Inventory,
}

impl RelationshipService {
    pub(crate) fn new(inventory: Inventory) -> Self {
        Self { inventory }
    }

    pub async fn get(&self, id: &str) -> Result<Relationship, InvErr> {
        self.inventory
            .read(|graph| {
                let edge_id = ops::find_relationship(graph, id)?;
                let edge = graph
                    .edge(edge_id)?
                    .ok_or_else(|| InvErr::RelationIdNotFound(id.to_string()))?;
                relationship(graph, &edge)
            })
            .await
    }

    /// every relationship, narrowed by `filters`
    pub fn all(&self, filters: Vec<Filter>) -> Multiple<Relationships> {
        let query = Query::builder()
            .path(Filter::with_type(SegmentType::Relationship))
            .filters(filters)
            .build();
        Multiple::new(self.inventory.clone(), query)
    }

    #[instrument(skip(self, source, target, properties), fields(source = %source, target = %target))]
    pub async fn link_with(
        &self,
        name: &str,
        source: &CanonicalPath,
        target: &CanonicalPath,
        properties: Properties,
    ) -> Result<Relationship, InvErr> {
        self.inventory
            .transact("link", |tx| ops::link(tx, name, source, target, properties))
            .await
    }

    /// replaces the relationship's properties
    #[instrument(skip(self, properties))]
    pub async fn update(&self, id: &str, properties: &Properties) -> Result<Relationship, InvErr> {
        self.inventory
            .transact("update relationship", |tx| {
                ops::update_relationship(tx, id, properties)
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), InvErr> {
        self.inventory
            .transact("delete relationship", |tx| ops::delete_relationship(tx, id))
            .await
    }
}
