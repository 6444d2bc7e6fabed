use crate::space::err::ParseErrs;
use crate::space::kind::SegmentType;
use crate::space::parse::util::{escaped, expected, keywords, new_span, result, Res, Span};
use lazy_static::lazy_static;
use nom::character::complete::char;
use nom::combinator::{eof, opt};
use nom::sequence::terminated;
use nom_supreme::tag::complete::tag;
use strum::IntoEnumIterator;

/// A path segment as written: either `..` or an id with an optional type prefix.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RawSegment {
    Up,
    Segment {
        segment_type: Option<SegmentType>,
        id: String,
    },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawPath {
    pub absolute: bool,
    pub segments: Vec<RawSegment>,
}

lazy_static! {
    static ref TYPE_WORDS: Vec<&'static str> = SegmentType::iter()
        .flat_map(|t| [t.code(), t.name()])
        .collect();
}

fn type_words() -> &'static [&'static str] {
    TYPE_WORDS.as_slice()
}

pub fn segment_type(input: Span) -> Res<SegmentType> {
    let (next, word) = keywords(type_words())(input)?;
    match SegmentType::parse_any(word) {
        Ok(segment_type) => Ok((next, segment_type)),
        Err(_) => Err(nom::Err::Error(expected(input, "segment type"))),
    }
}

pub fn segment_id(input: Span) -> Res<String> {
    escaped("/;", "id")(input)
}

fn up(input: Span) -> Res<RawSegment> {
    let (next, _) = tag("..")(input)?;
    match next.fragment().chars().next() {
        None | Some('/') => Ok((next, RawSegment::Up)),
        Some(_) => Err(nom::Err::Error(expected(next, "/"))),
    }
}

fn segment(input: Span) -> Res<RawSegment> {
    if let Ok(up) = up(input) {
        return Ok(up);
    }
    let (next, segment_type) = opt(terminated(segment_type, char(';')))(input)?;
    let (next, id) = segment_id(next)?;
    Ok((next, RawSegment::Segment { segment_type, id }))
}

pub fn raw_path(input: Span) -> Res<RawPath> {
    if *input.fragment() == "." {
        return Ok((
            new_span(""),
            RawPath {
                absolute: false,
                segments: vec![],
            },
        ));
    }
    let (mut next, absolute) = opt(char('/'))(input)?;
    let mut segments = vec![];
    if !next.fragment().is_empty() {
        loop {
            let (after, seg) = segment(next)?;
            segments.push(seg);
            next = after;
            if next.fragment().is_empty() {
                break;
            }
            let (after, _) = char('/')(next)?;
            next = after;
        }
    }
    let (next, _) = eof(next)?;
    Ok((
        next,
        RawPath {
            absolute: absolute.is_some(),
            segments,
        },
    ))
}

pub fn parse_raw_path(src: &str) -> Result<RawPath, ParseErrs> {
    result(src, raw_path(new_span(src)))
}
