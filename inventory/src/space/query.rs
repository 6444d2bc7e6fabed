use crate::space::filter::Filter;
use crate::space::point::CanonicalPath;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// How a fragment's filter is applied.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, strum_macros::Display)]
pub enum FragmentRole {
    /// the filter defines *where* to go; lookup style filters may jump straight to their targets
    Path,
    /// the filter only narrows what has already been reached
    Filter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFragment {
    pub role: FragmentRole,
    pub filter: Filter,
}

impl QueryFragment {
    pub fn path(filter: Filter) -> Self {
        Self {
            role: FragmentRole::Path,
            filter,
        }
    }

    pub fn filter(filter: Filter) -> Self {
        Self {
            role: FragmentRole::Filter,
            filter,
        }
    }
}

impl Display for QueryFragment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.role {
            FragmentRole::Path => write!(f, "{}", self.filter),
            FragmentRole::Filter => write!(f, "?{}", self.filter),
        }
    }
}

/// An immutable tree of filter fragments.
///
/// The fragments of a node are applied in order; the results of a node's sub trees are applied to
/// its output independently and unioned.  Queries are built with a [`QueryBuilder`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    fragments: Vec<QueryFragment>,
    sub_trees: Vec<Query>,
}

impl Query {
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// jumps straight to the entity at `path`
    pub fn path(path: &CanonicalPath) -> Self {
        Self {
            fragments: vec![QueryFragment::path(Filter::with_path(path.clone()))],
            sub_trees: vec![],
        }
    }

    /// the same location as [`Query::path`], spelled out hop by hop from the root
    pub fn path_chain(path: &CanonicalPath) -> Self {
        let mut builder = QueryBuilder::new();
        for (index, segment) in path.segments().iter().enumerate() {
            if index > 0 {
                builder.path(Filter::contains());
            }
            builder
                .path(Filter::with_type(segment.segment_type()))
                .path(Filter::with_id(segment.id()));
        }
        builder.build()
    }

    pub fn fragments(&self) -> &[QueryFragment] {
        self.fragments.as_slice()
    }

    pub fn sub_trees(&self) -> &[Query] {
        self.sub_trees.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.sub_trees.iter().all(|s| s.is_empty())
    }

    /// a builder that continues from a copy of this query
    pub fn extend(&self) -> QueryBuilder {
        QueryBuilder { root: self.clone() }
    }

    /// every filter of the tree, depth first; used for diagnostics
    pub fn filters(&self) -> Vec<Filter> {
        let mut rtn: Vec<Filter> = self.fragments.iter().map(|f| f.filter.clone()).collect();
        for sub in &self.sub_trees {
            rtn.append(&mut sub.filters());
        }
        rtn
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fragments.iter().join(" / "))?;
        if !self.sub_trees.is_empty() {
            write!(f, " {{ {} }}", self.sub_trees.iter().join(" | "))?;
        }
        Ok(())
    }
}

/// Accumulates fragments and branches into a [`Query`].
///
/// Once the query has branched, `path` and `filter` append to the end of every branch.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    root: Query,
}

fn append_to_leaves(query: &mut Query, fragment: &QueryFragment) {
    if query.sub_trees.is_empty() {
        query.fragments.push(fragment.clone());
    } else {
        for sub in query.sub_trees.iter_mut() {
            append_to_leaves(sub, fragment);
        }
    }
}

fn branch_leaves(query: &mut Query, branches: &[Query]) {
    if query.sub_trees.is_empty() {
        query.sub_trees.extend(branches.iter().cloned());
    } else {
        for sub in query.sub_trees.iter_mut() {
            branch_leaves(sub, branches);
        }
    }
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&mut self, filter: Filter) -> &mut Self {
        append_to_leaves(&mut self.root, &QueryFragment::path(filter));
        self
    }

    pub fn filter(&mut self, filter: Filter) -> &mut Self {
        append_to_leaves(&mut self.root, &QueryFragment::filter(filter));
        self
    }

    pub fn paths<I: IntoIterator<Item = Filter>>(&mut self, filters: I) -> &mut Self {
        for filter in filters {
            self.path(filter);
        }
        self
    }

    pub fn filters<I: IntoIterator<Item = Filter>>(&mut self, filters: I) -> &mut Self {
        for filter in filters {
            self.filter(filter);
        }
        self
    }

    /// continues every current leaf with each of `branches`; their results are unioned
    pub fn branch<I: IntoIterator<Item = Query>>(&mut self, branches: I) -> &mut Self {
        let branches: Vec<Query> = branches.into_iter().collect();
        if !branches.is_empty() {
            branch_leaves(&mut self.root, &branches);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn build(&self) -> Query {
        self.root.clone()
    }
}

#[cfg(test)]
pub mod test {
    use crate::space::filter::Filter;
    use crate::space::kind::SegmentType;
    use crate::space::point::CanonicalPath;
    use crate::space::query::{FragmentRole, Query};

    #[test]
    pub fn test_builder_appends_to_every_branch() {
        let mut builder = Query::builder();
        builder.path(Filter::with_path(CanonicalPath::tenant("t1")));
        let environments = {
            let mut b = Query::builder();
            b.path(Filter::contains())
                .path(Filter::with_type(SegmentType::Environment));
            b.build()
        };
        let feeds = {
            let mut b = Query::builder();
            b.path(Filter::contains()).path(Filter::with_type(SegmentType::Feed));
            b.build()
        };
        builder
            .branch(vec![environments, feeds])
            .filter(Filter::with_property("owner"));
        let query = builder.build();

        assert_eq!(query.fragments().len(), 1);
        assert_eq!(query.sub_trees().len(), 2);
        for sub in query.sub_trees() {
            let last = sub.fragments().last().unwrap();
            assert_eq!(last.role, FragmentRole::Filter);
            assert_eq!(last.filter, Filter::with_property("owner"));
        }

        // the builder is not consumed and the built query never changes
        builder.filter(Filter::Identical);
        assert_ne!(builder.build(), query);
    }

    #[test]
    pub fn test_path_chain() {
        let path = CanonicalPath::tenant("t1")
            .extend(SegmentType::Environment, "e1")
            .unwrap();
        let query = Query::path_chain(&path);
        assert_eq!(
            query.filters(),
            vec![
                Filter::with_type(SegmentType::Tenant),
                Filter::with_id("t1"),
                Filter::contains(),
                Filter::with_type(SegmentType::Environment),
                Filter::with_id("e1"),
            ]
        );
        assert!(query
            .fragments()
            .iter()
            .all(|f| f.role == FragmentRole::Path));
    }
}
