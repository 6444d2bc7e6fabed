use crate::space::err::SpaceErr;
use crate::space::kind::SegmentType;
use crate::space::parse::path::{parse_raw_path, RawSegment};
use core::str::FromStr;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use strum::IntoEnumIterator;

/// escapes the characters that carry meaning inside a path string
pub fn escape_id(id: &str) -> String {
    let mut rtn = String::with_capacity(id.len());
    for c in id.chars() {
        if c == '\\' || c == '/' || c == ';' {
            rtn.push('\\');
        }
        rtn.push(c);
    }
    rtn
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PathSegment {
    segment_type: SegmentType,
    id: String,
}

impl PathSegment {
    pub fn new<S: ToString>(segment_type: SegmentType, id: S) -> Self {
        Self {
            segment_type,
            id: id.to_string(),
        }
    }

    pub fn segment_type(&self) -> SegmentType {
        self.segment_type
    }

    pub fn id(&self) -> &str {
        self.id.as_str()
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{};{}", self.segment_type.code(), escape_id(&self.id))
    }
}

fn check_transition(
    previous: Option<SegmentType>,
    segment_type: SegmentType,
    id: &str,
) -> Result<(), SpaceErr> {
    if id.is_empty() {
        return Err(SpaceErr::illegal_argument(format!(
            "{} segment must have a non-empty id",
            segment_type
        )));
    }
    match previous {
        None if !segment_type.is_root() => Err(SpaceErr::illegal_argument(format!(
            "a canonical path cannot start with a {} segment",
            segment_type
        ))),
        Some(previous) if !previous.can_contain(&segment_type) => {
            Err(SpaceErr::illegal_argument(format!(
                "{} cannot contain {} ('{}')",
                previous, segment_type, id
            )))
        }
        _ => Ok(()),
    }
}

/// The globally unique, hierarchical address of an inventoried entity: `/t;acme/e;prod/r;host1`.
///
/// A `CanonicalPath` always has at least one segment, its first segment is either a tenant or a
/// relationship and every later segment is a legal child of the one before it.  Paths are values:
/// [`CanonicalPath::extend`] and [`CanonicalPath::up`] return new paths.
#[derive(
    Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, SerializeDisplay, DeserializeFromStr,
)]
pub struct CanonicalPath {
    segments: Vec<PathSegment>,
}

impl CanonicalPath {
    pub fn extender() -> Extender {
        Extender::default()
    }

    /// A single segment tenant path.  The id is taken as is; paths built from untrusted ids go
    /// through [`CanonicalPath::extender`], which rejects an empty one.
    pub fn tenant<S: ToString>(id: S) -> Self {
        Self {
            segments: vec![PathSegment::new(SegmentType::Tenant, id)],
        }
    }

    pub fn relationship<S: ToString>(id: S) -> Self {
        Self {
            segments: vec![PathSegment::new(SegmentType::Relationship, id)],
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        self.segments.as_slice()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn last_segment(&self) -> &PathSegment {
        // construction guarantees at least one segment
        &self.segments[self.segments.len() - 1]
    }

    pub fn segment_type(&self) -> SegmentType {
        self.last_segment().segment_type()
    }

    pub fn id(&self) -> &str {
        self.last_segment().id()
    }

    pub fn root(&self) -> &PathSegment {
        &self.segments[0]
    }

    /// the tenant this path lives in (`None` for relationship paths)
    pub fn tenant_id(&self) -> Option<&str> {
        match self.root().segment_type() {
            SegmentType::Tenant => Some(self.root().id()),
            _ => None,
        }
    }

    pub fn up(&self) -> Option<CanonicalPath> {
        if self.segments.len() <= 1 {
            None
        } else {
            Some(Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    pub fn is_parent_of(&self, other: &CanonicalPath) -> bool {
        other.up().as_ref() == Some(self)
    }

    pub fn is_ancestor_of(&self, other: &CanonicalPath) -> bool {
        other.segments.len() > self.segments.len() && other.segments.starts_with(&self.segments)
    }

    pub fn extend<S: ToString>(
        &self,
        segment_type: SegmentType,
        id: S,
    ) -> Result<CanonicalPath, SpaceErr> {
        self.modified().extend(segment_type, id)?.get()
    }

    /// an [`Extender`] seeded with this path's segments
    pub fn modified(&self) -> Extender {
        Extender {
            segments: self.segments.clone(),
        }
    }

    pub fn to_relative_path(&self) -> RelativePath {
        RelativePath {
            ups: 0,
            segments: self.segments.clone(),
        }
    }

    /// The relative path that leads from `origin` to this path.
    ///
    /// Fails when the two paths do not share a root segment.
    pub fn relative_to(&self, origin: &CanonicalPath) -> Result<RelativePath, SpaceErr> {
        let common = self
            .segments
            .iter()
            .zip(origin.segments.iter())
            .take_while(|(a, b)| a == b)
            .count();
        if common == 0 {
            return Err(SpaceErr::illegal_argument(format!(
                "'{}' and '{}' do not share a root",
                self, origin
            )));
        }
        Ok(RelativePath {
            ups: origin.segments.len() - common,
            segments: self.segments[common..].to_vec(),
        })
    }

    /// Resolves a path string whose segments may omit their type prefix.
    ///
    /// Relative strings (`../r;host1`, `host1`) are resolved against `origin`.  The type of every
    /// untyped segment is inferred from the containment rules and, for the last segment,
    /// `expected`.  Inference must be unambiguous.
    pub fn from_partially_untyped_string(
        text: &str,
        origin: Option<&CanonicalPath>,
        expected: Option<SegmentType>,
    ) -> Result<CanonicalPath, SpaceErr> {
        let raw = parse_raw_path(text)?;
        let mut ups = 0usize;
        let mut segments = vec![];
        for segment in raw.segments {
            match segment {
                RawSegment::Up if segments.is_empty() && !raw.absolute => ups += 1,
                RawSegment::Up => {
                    return Err(SpaceErr::illegal_argument(format!(
                        "'..' may only lead a relative path: '{}'",
                        text
                    )))
                }
                RawSegment::Segment { segment_type, id } => segments.push((segment_type, id)),
            }
        }

        let base = if raw.absolute {
            None
        } else {
            let origin = origin.ok_or_else(|| {
                SpaceErr::illegal_argument(format!(
                    "relative path '{}' cannot be resolved without an origin",
                    text
                ))
            })?;
            Some(walk_up(origin, ups)?)
        };

        if segments.is_empty() {
            let path = base.ok_or_else(|| SpaceErr::illegal_argument("empty canonical path"))?;
            if let Some(expected) = expected {
                if path.segment_type() != expected {
                    return Err(SpaceErr::illegal_argument(format!(
                        "'{}' resolves to '{}' which is not a {}",
                        text, path, expected
                    )));
                }
            }
            return Ok(path);
        }

        let types = infer_types(
            base.as_ref().map(|b| b.segment_type()),
            &segments,
            expected,
        )?;

        let mut extender = match base {
            None => CanonicalPath::extender(),
            Some(base) => base.modified(),
        };
        for (segment_type, (_, id)) in types.into_iter().zip(segments.into_iter()) {
            extender = extender.extend(segment_type, id)?;
        }
        extender.get()
    }
}

fn walk_up(origin: &CanonicalPath, ups: usize) -> Result<CanonicalPath, SpaceErr> {
    if ups >= origin.len() {
        return Err(SpaceErr::illegal_argument(format!(
            "cannot go {} level(s) up from '{}'",
            ups, origin
        )));
    }
    Ok(CanonicalPath {
        segments: origin.segments[..origin.len() - ups].to_vec(),
    })
}

/// Infers the type of every segment by intersecting the types reachable from the start
/// (walking forward) with the types that can still reach an acceptable final type (walking
/// backward).  Every position must end up with exactly one candidate, except that a position
/// left with only an environment and a feed to choose from resolves to the environment.  An
/// untyped segment never denotes a feed unless nothing else fits; write `f;` to name one.
fn infer_types(
    start: Option<SegmentType>,
    segments: &[(Option<SegmentType>, String)],
    expected: Option<SegmentType>,
) -> Result<Vec<SegmentType>, SpaceErr> {
    let n = segments.len();
    let admits = |i: usize, t: &SegmentType| segments[i].0.map(|s| s == *t).unwrap_or(true);

    let mut forward: Vec<BTreeSet<SegmentType>> = Vec::with_capacity(n);
    for i in 0..n {
        let set = SegmentType::iter()
            .filter(|t| admits(i, t))
            .filter(|t| match i {
                0 => match start {
                    None => t.is_root(),
                    Some(start) => start.can_contain(t),
                },
                _ => forward[i - 1].iter().any(|p| p.can_contain(t)),
            })
            .collect();
        forward.push(set);
    }

    let mut backward: Vec<BTreeSet<SegmentType>> = vec![BTreeSet::new(); n];
    for i in (0..n).rev() {
        let set = SegmentType::iter()
            .filter(|t| admits(i, t))
            .filter(|t| {
                if i == n - 1 {
                    expected.map(|e| e == *t).unwrap_or(true)
                } else {
                    backward[i + 1].iter().any(|c| t.can_contain(c))
                }
            })
            .collect();
        backward[i] = set;
    }

    let mut rtn: Vec<SegmentType> = Vec::with_capacity(n);
    for i in 0..n {
        let candidates: Vec<SegmentType> = forward[i]
            .intersection(&backward[i])
            .filter(|t| rtn.last().map(|p| p.can_contain(t)).unwrap_or(true))
            .cloned()
            .collect();
        match candidates.as_slice() {
            [single] => rtn.push(*single),
            // an untyped parent of resources or metrics is taken to be an environment
            [SegmentType::Environment, SegmentType::Feed] => rtn.push(SegmentType::Environment),
            [] => {
                return Err(SpaceErr::illegal_argument(format!(
                    "no segment type fits segment '{}'",
                    segments[i].1
                )))
            }
            many => {
                return Err(SpaceErr::illegal_argument(format!(
                    "segment '{}' is ambiguous; it could be any of: {}",
                    segments[i].1,
                    many.iter().map(|t| t.to_string()).join(", ")
                )))
            }
        }
    }
    Ok(rtn)
}

impl Display for CanonicalPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for CanonicalPath {
    type Err = SpaceErr;

    /// parses a fully typed, absolute path string
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = parse_raw_path(s)?;
        if !raw.absolute {
            return Err(SpaceErr::illegal_argument(format!(
                "canonical path '{}' must start with '/'",
                s
            )));
        }
        let mut extender = CanonicalPath::extender();
        for segment in raw.segments {
            match segment {
                RawSegment::Segment {
                    segment_type: Some(segment_type),
                    id,
                } => extender = extender.extend(segment_type, id)?,
                RawSegment::Segment {
                    segment_type: None,
                    id,
                } => {
                    return Err(SpaceErr::illegal_argument(format!(
                        "segment '{}' of canonical path '{}' has no type",
                        id, s
                    )))
                }
                RawSegment::Up => {
                    return Err(SpaceErr::illegal_argument(format!(
                        "canonical path '{}' cannot contain '..'",
                        s
                    )))
                }
            }
        }
        extender.get()
    }
}

impl TryFrom<&str> for CanonicalPath {
    type Error = SpaceErr;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        CanonicalPath::from_str(value)
    }
}

/// Builds a [`CanonicalPath`] one segment at a time, rejecting illegal type transitions.
#[derive(Debug, Clone, Default)]
pub struct Extender {
    segments: Vec<PathSegment>,
}

impl Extender {
    pub fn extend<S: ToString>(mut self, segment_type: SegmentType, id: S) -> Result<Self, SpaceErr> {
        let id = id.to_string();
        check_transition(
            self.segments.last().map(|s| s.segment_type()),
            segment_type,
            &id,
        )?;
        self.segments.push(PathSegment::new(segment_type, id));
        Ok(self)
    }

    pub fn get(self) -> Result<CanonicalPath, SpaceErr> {
        if self.segments.is_empty() {
            Err(SpaceErr::illegal_argument("empty canonical path"))
        } else {
            Ok(CanonicalPath {
                segments: self.segments,
            })
        }
    }
}

/// A path expressed relative to some origin: `../../rt;URL` or `.` for the origin itself.
#[derive(
    Debug, Clone, Eq, PartialEq, Hash, Default, SerializeDisplay, DeserializeFromStr,
)]
pub struct RelativePath {
    ups: usize,
    segments: Vec<PathSegment>,
}

impl RelativePath {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn extender() -> RelativeExtender {
        RelativeExtender::default()
    }

    pub fn ups(&self) -> usize {
        self.ups
    }

    pub fn segments(&self) -> &[PathSegment] {
        self.segments.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.ups == 0 && self.segments.is_empty()
    }

    /// Resolves this path against `origin`.  Fails if it walks above the root segment or if a
    /// segment is not a legal child of its new parent.
    pub fn apply_to(&self, origin: &CanonicalPath) -> Result<CanonicalPath, SpaceErr> {
        let mut extender = walk_up(origin, self.ups)?.modified();
        for segment in &self.segments {
            extender = extender.extend(segment.segment_type(), segment.id())?;
        }
        extender.get()
    }
}

impl Display for RelativePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, ".");
        }
        let mut parts = std::iter::repeat("..".to_string())
            .take(self.ups)
            .chain(self.segments.iter().map(|s| s.to_string()));
        write!(f, "{}", parts.join("/"))
    }
}

impl FromStr for RelativePath {
    type Err = SpaceErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = parse_raw_path(s)?;
        if raw.absolute {
            return Err(SpaceErr::illegal_argument(format!(
                "relative path '{}' cannot start with '/'",
                s
            )));
        }
        let mut extender = RelativePath::extender();
        for segment in raw.segments {
            extender = match segment {
                RawSegment::Up => extender.up()?,
                RawSegment::Segment {
                    segment_type: Some(segment_type),
                    id,
                } => extender.extend(segment_type, id)?,
                RawSegment::Segment {
                    segment_type: None,
                    id,
                } => {
                    return Err(SpaceErr::illegal_argument(format!(
                        "segment '{}' of relative path '{}' has no type",
                        id, s
                    )))
                }
            };
        }
        Ok(extender.get())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelativeExtender {
    ups: usize,
    segments: Vec<PathSegment>,
}

impl RelativeExtender {
    pub fn up(mut self) -> Result<Self, SpaceErr> {
        if !self.segments.is_empty() {
            return Err(SpaceErr::illegal_argument(
                "'..' may only lead a relative path",
            ));
        }
        self.ups += 1;
        Ok(self)
    }

    pub fn extend<S: ToString>(mut self, segment_type: SegmentType, id: S) -> Result<Self, SpaceErr> {
        let id = id.to_string();
        if id.is_empty() {
            return Err(SpaceErr::illegal_argument(format!(
                "{} segment must have a non-empty id",
                segment_type
            )));
        }
        if let Some(previous) = self.segments.last() {
            check_transition(Some(previous.segment_type()), segment_type, &id)?;
        }
        self.segments.push(PathSegment::new(segment_type, id));
        Ok(self)
    }

    pub fn get(self) -> RelativePath {
        RelativePath {
            ups: self.ups,
            segments: self.segments,
        }
    }
}
