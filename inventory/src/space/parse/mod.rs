pub mod model;
pub mod path;
#[cfg(test)]
pub mod test;
pub mod util;

use crate::space::err::ParseErrs;
use crate::space::kind::{Direction, SegmentType};
use crate::space::parse::model::{
    CollectionStep, EntityStep, FilterContext, FilterKey, FilterSpec, RecursiveStep,
    RelationshipStep, Selector, Step, Traversal,
};
use crate::space::parse::path::segment_type;
use crate::space::parse::util::{
    escaped, expected, keyword, keywords, new_span, result, span_at, tw, word, NomErr, Res,
    Span, Tw,
};
use core::str::FromStr;
use lazy_static::lazy_static;
use nom::branch::alt;
use nom::character::complete::char;
use nom::combinator::{cut, map, opt};
use nom::multi::{many0, separated_list1};
use nom::sequence::{preceded, separated_pair, terminated};
use nom::{InputTake, Slice};
use nom_supreme::error::{BaseErrorKind, Expectation, GenericErrorTree};
use strum::IntoEnumIterator;

lazy_static! {
    static ref PLURALS: Vec<&'static str> = SegmentType::iter()
        .filter(|t| t.is_entity())
        .map(|t| t.plural())
        .collect();
}

pub const DIRECTIONS: &[&str] = &["in", "out", "both"];
const RELATIONSHIPS: &[&str] = &["relationships", "rl"];
const SELECTORS: &[&str] = &["entities", "relationships"];

/// words that always start a step and so can never be read as a bare id
fn is_step_keyword(word: &str) -> bool {
    RELATIONSHIPS.contains(&word)
        || word == "recursive"
        || word == "identical"
        || PLURALS.contains(&word)
}

pub fn direction(input: Span) -> Res<Direction> {
    let (next, word) = keywords(DIRECTIONS)(input)?;
    match Direction::from_str(word) {
        Ok(direction) => Ok((next, direction)),
        Err(_) => Err(nom::Err::Error(expected(input, "direction"))),
    }
}

pub fn quoted_with<'a>(quote: char) -> impl Fn(Span<'a>) -> Res<'a, String> {
    move |input: Span<'a>| {
        let text: &str = input.fragment();
        if !text.starts_with(quote) {
            return Err(nom::Err::Error(expected(input, "quote")));
        }
        let mut out = String::new();
        let mut chars = text.char_indices().skip(1);
        while let Some((i, c)) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                }
            } else if c == quote {
                let (rest, _) = input.take_split(i + c.len_utf8());
                return Ok((rest, out));
            } else {
                out.push(c);
            }
        }
        Err(nom::Err::Failure(expected(
            input.slice(text.len()..),
            "closing quote",
        )))
    }
}

pub fn value(input: Span) -> Res<String> {
    alt((quoted_with('"'), quoted_with('\''), escaped(";],", "value")))(input)
}

fn filter_key<'a>(context: FilterContext) -> impl Fn(Span<'a>) -> Res<'a, FilterKey> {
    move |input: Span<'a>| {
        let (next, key) = keywords(context.keys())(input)?;
        match FilterKey::from_str(key) {
            Ok(key) => Ok((next, key)),
            Err(_) => Err(nom::Err::Error(expected(input, "filter key"))),
        }
    }
}

pub fn filter_spec<'a>(context: FilterContext) -> impl Fn(Span<'a>) -> Res<'a, Tw<FilterSpec>> {
    move |input: Span<'a>| {
        let mut spec = tw(map(
            separated_pair(
                filter_key(context),
                cut(char('=')),
                cut(separated_list1(char(','), value)),
            ),
            |(key, values)| FilterSpec { key, values },
        ));
        spec(input)
    }
}

/// `[key=value,value;key=value]`, any number of times
pub fn filters<'a>(context: FilterContext) -> impl Fn(Span<'a>) -> Res<'a, Vec<Tw<FilterSpec>>> {
    move |input: Span<'a>| {
        let (next, groups) = many0(preceded(
            char('['),
            cut(terminated(
                separated_list1(char(';'), filter_spec(context)),
                char(']'),
            )),
        ))(input)?;
        Ok((next, groups.into_iter().flatten().collect()))
    }
}

pub fn id(input: Span) -> Res<String> {
    escaped("/;[]", "id")(input)
}

fn typed_entity(input: Span) -> Res<Step> {
    let (next, segment_type) = terminated(segment_type, char(';'))(input)?;
    let (next, id) = cut(id)(next)?;
    let (next, filters) = filters(FilterContext::Entity)(next)?;
    Ok((
        next,
        Step::Entity(EntityStep {
            segment_type: Some(segment_type),
            id,
            filters,
        }),
    ))
}

fn bare_id(input: Span) -> Res<Step> {
    let (next, id) = id(input)?;
    let (next, filters) = filters(FilterContext::Entity)(next)?;
    Ok((
        next,
        Step::Entity(EntityStep {
            segment_type: None,
            id,
            filters,
        }),
    ))
}

/// `/id[...]` following a collection, unless what follows the slash starts a step of its own
fn collection_id(input: Span) -> Res<(Tw<String>, Vec<Tw<FilterSpec>>)> {
    let (next, _) = char('/')(input)?;
    if let Some((after, found)) = word(next) {
        let typed = after.fragment().starts_with(';') && segment_type(next).is_ok();
        if typed || is_step_keyword(found.fragment()) {
            return Err(nom::Err::Error(expected(next, "id")));
        }
    }
    let (next, id) = tw(id)(next)?;
    let (next, filters) = filters(FilterContext::Entity)(next)?;
    Ok((next, (id, filters)))
}

fn collection(input: Span) -> Res<Step> {
    let (next, plural) = keywords(PLURALS.as_slice())(input)?;
    let segment_type = match SegmentType::from_plural(plural) {
        Some(segment_type) => segment_type,
        None => return Err(nom::Err::Error(expected(input, "collection"))),
    };
    let (next, recursive) = opt(preceded(char(';'), cut(keyword("recursive"))))(next)?;
    let (next, filters) = filters(FilterContext::Entity)(next)?;
    let (next, id) = opt(collection_id)(next)?;
    let (id, id_filters) = match id {
        Some((id, filters)) => (Some(id), filters),
        None => (None, vec![]),
    };
    Ok((
        next,
        Step::Collection(CollectionStep {
            segment_type,
            recursive: recursive.is_some(),
            filters,
            id,
            id_filters,
        }),
    ))
}

fn relation_name(input: Span) -> Res<String> {
    escaped("/;[]", "relationship name")(input)
}

fn selector(input: Span) -> Res<Selector> {
    let (next, which) = keywords(SELECTORS)(input)?;
    match which {
        "entities" => map(filters(FilterContext::Entity), Selector::Entities)(next),
        _ => map(filters(FilterContext::Relationship), Selector::Relationships)(next),
    }
}

enum Clause {
    Name(String),
    Direction(Direction),
}

fn relationships(input: Span) -> Res<Step> {
    let (mut next, _) = keywords(RELATIONSHIPS)(input)?;
    let mut name = None;
    let mut direction_found = None;
    if let Ok((after, _)) = char::<Span, NomErr>(';')(next) {
        let (after, clause) = cut(alt((
            map(direction, Clause::Direction),
            map(relation_name, Clause::Name),
        )))(after)?;
        next = after;
        match clause {
            Clause::Direction(direction) => direction_found = Some(direction),
            Clause::Name(found) => {
                name = Some(found);
                let (after, direction) = opt(preceded(char(';'), cut(direction)))(next)?;
                next = after;
                direction_found = direction;
            }
        }
    }
    let (next, filters) = filters(FilterContext::Relationship)(next)?;
    let (next, selector) = opt(preceded(char('/'), cut(tw(selector))))(next)?;
    Ok((
        next,
        Step::Relationships(RelationshipStep {
            name,
            direction: direction_found.unwrap_or(Direction::Outgoing),
            filters,
            selector,
        }),
    ))
}

fn over(input: Span) -> Res<String> {
    preceded(
        terminated(keyword("over"), cut(char('='))),
        cut(relation_name),
    )(input)
}

fn recursive(input: Span) -> Res<Step> {
    let (mut next, _) = keyword("recursive")(input)?;
    let mut step = RecursiveStep::contains();
    if let Ok((after, _)) = char::<Span, NomErr>(';')(next) {
        let (after, clause) = cut(alt((
            map(over, Clause::Name),
            map(direction, Clause::Direction),
        )))(after)?;
        next = after;
        match clause {
            Clause::Direction(direction) => step.direction = direction,
            Clause::Name(over) => {
                step.over = over;
                let (after, direction) = opt(preceded(char(';'), cut(direction)))(next)?;
                next = after;
                if let Some(direction) = direction {
                    step.direction = direction;
                }
            }
        }
    }
    let (next, filters) = filters(FilterContext::Entity)(next)?;
    step.filters = filters;
    Ok((next, Step::Recursive(step)))
}

fn identical(input: Span) -> Res<Step> {
    map(keyword("identical"), |_| Step::Identical)(input)
}

pub fn step(input: Span) -> Res<Step> {
    alt((
        relationships,
        recursive,
        identical,
        collection,
        typed_entity,
        bare_id,
    ))(input)
}

fn end_of_traversal(input: Span) -> Res<()> {
    if input.fragment().is_empty() {
        Ok((input, ()))
    } else {
        Err(nom::Err::Error(GenericErrorTree::Alt(vec![
            expected(input, "/"),
            GenericErrorTree::Base {
                location: input,
                kind: BaseErrorKind::Expected(Expectation::Eof),
            },
        ])))
    }
}

pub fn traversal(input: Span) -> Res<Traversal> {
    let (next, absolute) = opt(char('/'))(input)?;
    let (next, first) = cut(tw(step))(next)?;
    let (next, mut rest) = many0(preceded(char('/'), cut(tw(step))))(next)?;
    let (next, _) = end_of_traversal(next)?;
    let mut steps = vec![first];
    steps.append(&mut rest);
    Ok((
        next,
        Traversal {
            absolute: absolute.is_some(),
            steps,
        },
    ))
}

pub fn parse_traversal(src: &str) -> Result<Traversal, ParseErrs> {
    result(src, traversal(new_span(src)))
}

/// parses the traversal that starts at `offset` inside `src`; reported offsets stay relative to `src`
pub fn parse_traversal_at(src: &str, offset: usize) -> Result<Traversal, ParseErrs> {
    result(src, traversal(span_at(src, offset)))
}
