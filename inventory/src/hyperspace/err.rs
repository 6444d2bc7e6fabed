use crate::hyperspace::substrate::GraphErr;
use crate::space::err::{ParseErrs, SpaceErr};
use crate::space::filter::Filter;
use crate::space::kind::SegmentType;
use crate::space::point::CanonicalPath;
use itertools::Itertools;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvErr {
    #[error("{} '{path}' not found{}", kind_name(.segment_type), describe_filters(.filters))]
    EntityNotFound {
        segment_type: Option<SegmentType>,
        path: String,
        filters: Vec<Filter>,
    },
    #[error("entity '{0}' already exists")]
    EntityAlreadyExists(CanonicalPath),
    #[error("relationship '{name}' from '{from}' to '{to}' not found")]
    RelationNotFound {
        name: String,
        from: String,
        to: String,
    },
    #[error("relationship '{0}' not found")]
    RelationIdNotFound(String),
    #[error("relationship '{name}' from '{from}' to '{to}' already exists")]
    RelationAlreadyExists {
        name: String,
        from: CanonicalPath,
        to: CanonicalPath,
    },
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
    #[error("illegal state of '{path}': {reason}")]
    IllegalState { path: CanonicalPath, reason: String },
    #[error(transparent)]
    Space(#[from] SpaceErr),
    #[error(transparent)]
    Graph(#[from] GraphErr),
}

fn kind_name(segment_type: &Option<SegmentType>) -> String {
    match segment_type {
        Some(segment_type) => segment_type.to_string(),
        None => "entity".to_string(),
    }
}

fn describe_filters(filters: &[Filter]) -> String {
    if filters.is_empty() {
        String::new()
    } else {
        format!(" (while resolving {})", filters.iter().join(" / "))
    }
}

impl From<ParseErrs> for InvErr {
    fn from(errs: ParseErrs) -> Self {
        Self::Space(SpaceErr::Parse(errs))
    }
}

impl InvErr {
    pub fn not_found(path: &CanonicalPath) -> Self {
        Self::EntityNotFound {
            segment_type: Some(path.segment_type()),
            path: path.to_string(),
            filters: vec![],
        }
    }

    pub fn not_found_by<S: ToString>(
        segment_type: Option<SegmentType>,
        path: S,
        filters: Vec<Filter>,
    ) -> Self {
        Self::EntityNotFound {
            segment_type,
            path: path.to_string(),
            filters,
        }
    }

    pub fn already_exists(path: &CanonicalPath) -> Self {
        Self::EntityAlreadyExists(path.clone())
    }

    pub fn illegal_argument<M: ToString>(msg: M) -> Self {
        Self::IllegalArgument(msg.to_string())
    }

    pub fn illegal_state<R: ToString>(path: &CanonicalPath, reason: R) -> Self {
        Self::IllegalState {
            path: path.clone(),
            reason: reason.to_string(),
        }
    }

    /// true for argument errors raised here as well as those raised by the pure model
    pub fn is_illegal_argument(&self) -> bool {
        matches!(
            self,
            InvErr::IllegalArgument(_) | InvErr::Space(SpaceErr::IllegalArgument(_))
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            InvErr::EntityNotFound { .. }
                | InvErr::RelationNotFound { .. }
                | InvErr::RelationIdNotFound(_)
        )
    }

    pub fn print(&self) {
        match self {
            InvErr::Space(err) => err.print(),
            other => eprintln!("{}", other),
        }
    }
}

#[cfg(test)]
pub mod test {
    use crate::hyperspace::err::InvErr;
    use crate::space::err::SpaceErr;
    use crate::space::filter::Filter;
    use crate::space::kind::SegmentType;
    use crate::space::point::CanonicalPath;

    #[test]
    pub fn test_messages() {
        let path = CanonicalPath::tenant("t1");
        assert_eq!(InvErr::not_found(&path).to_string(), "tenant '/t;t1' not found");

        let err = InvErr::not_found_by(
            Some(SegmentType::Environment),
            "prod",
            vec![Filter::with_path(path.clone()), Filter::contains()],
        );
        assert!(err.to_string().contains("while resolving"));
        assert!(err.is_not_found());

        assert!(InvErr::from(SpaceErr::illegal_argument("bad")).is_illegal_argument());
        assert!(!InvErr::already_exists(&path).is_illegal_argument());
    }
}
