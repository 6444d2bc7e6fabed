use crate::space::err::{ParseErrs, Report};
use nom::{InputTake, Slice};
use nom_locate::LocatedSpan;
use nom_supreme::error::{BaseErrorKind, ErrorTree, Expectation, GenericErrorTree, StackContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::{Deref, Range};

pub type Span<'a> = LocatedSpan<&'a str>;
pub type NomErr<'a> = ErrorTree<Span<'a>>;
pub type Res<'a, O> = nom::IResult<Span<'a>, O, NomErr<'a>>;

/// characters that terminate a word in path strings and the traversal grammar
pub const DELIMITERS: &str = "/;[]=,\\\"";

pub fn new_span(s: &str) -> Span {
    LocatedSpan::new(s)
}

/// a span over `src` that starts at `offset`, so every reported offset stays relative to `src`
pub fn span_at(src: &str, offset: usize) -> Span {
    let span = new_span(src);
    if offset >= src.len() {
        span.slice(src.len()..)
    } else if src.is_char_boundary(offset) {
        span.slice(offset..)
    } else {
        span
    }
}

pub fn expected<'a>(input: Span<'a>, what: &'static str) -> NomErr<'a> {
    GenericErrorTree::Base {
        location: input,
        kind: BaseErrorKind::Expected(Expectation::Tag(what)),
    }
}

pub fn expected_any<'a>(input: Span<'a>, alternatives: &[&'static str]) -> NomErr<'a> {
    match alternatives {
        [single] => expected(input, single),
        _ => GenericErrorTree::Alt(alternatives.iter().map(|a| expected(input, a)).collect()),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

/// the next identifier-like word without consuming it
pub fn word(input: Span) -> Option<(Span, Span)> {
    let len = input
        .fragment()
        .char_indices()
        .find(|(_, c)| !is_word_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(input.fragment().len());
    if len == 0 {
        None
    } else {
        Some(input.take_split(len))
    }
}

/// matches `kw` only as a whole word
pub fn keyword<'a>(kw: &'static str) -> impl Fn(Span<'a>) -> Res<'a, Span<'a>> {
    move |input: Span<'a>| match word(input) {
        Some((rest, found)) if *found.fragment() == kw => Ok((rest, found)),
        _ => Err(nom::Err::Error(expected(input, kw))),
    }
}

/// matches any of `keywords` as a whole word and reports all of them when nothing matches
pub fn keywords<'a>(
    keywords: &'static [&'static str],
) -> impl Fn(Span<'a>) -> Res<'a, &'static str> {
    move |input: Span<'a>| {
        if let Some((rest, found)) = word(input) {
            if let Some(kw) = keywords.iter().find(|kw| **kw == *found.fragment()) {
                return Ok((rest, *kw));
            }
        }
        Err(nom::Err::Error(expected_any(input, keywords)))
    }
}

/// One or more characters up to the first unescaped character in `stops`.
///
/// A backslash escapes the character that follows it.
pub fn escaped<'a>(
    stops: &'static str,
    what: &'static str,
) -> impl Fn(Span<'a>) -> Res<'a, String> {
    move |input: Span<'a>| {
        let text: &str = input.fragment();
        let mut out = String::new();
        let mut end = text.len();
        let mut chars = text.char_indices();
        while let Some((i, c)) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => {
                        return Err(nom::Err::Failure(expected(
                            input.slice(text.len()..),
                            "escaped character",
                        )))
                    }
                }
            } else if stops.contains(c) {
                end = i;
                break;
            } else {
                out.push(c);
            }
        }
        if end == 0 {
            return Err(nom::Err::Error(expected(input, what)));
        }
        let (rest, _) = input.take_split(end);
        Ok((rest, out))
    }
}

/// a double quoted string where a backslash escapes the following character
pub fn quoted(input: Span) -> Res<String> {
    let text: &str = input.fragment();
    if !text.starts_with('"') {
        return Err(nom::Err::Error(expected(input, "\"")));
    }
    let mut out = String::new();
    let mut chars = text.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            '"' => {
                let (rest, _) = input.take_split(i + 1);
                return Ok((rest, out));
            }
            c => out.push(c),
        }
    }
    Err(nom::Err::Failure(expected(input.slice(text.len()..), "\"")))
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct Trace {
    pub range: Range<usize>,
}

impl Trace {
    pub fn new(range: Range<usize>) -> Self {
        Self { range }
    }

    pub fn offset(&self) -> usize {
        self.range.start
    }

    pub fn between(from: &Span, to: &Span) -> Self {
        Self::new(from.location_offset()..to.location_offset())
    }
}

/// Wraps a parsed value with the [`Trace`] of the text it came from.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Tw<W> {
    pub trace: Trace,
    pub w: W,
}

impl<W> Tw<W> {
    pub fn new(w: W, trace: Trace) -> Self {
        Self { w, trace }
    }

    pub fn unwrap(self) -> W {
        self.w
    }
}

impl<W> Deref for Tw<W> {
    type Target = W;

    fn deref(&self) -> &Self::Target {
        &self.w
    }
}

/// wraps the output of `f` with the range of input it consumed
pub fn tw<'a, F, O>(mut f: F) -> impl FnMut(Span<'a>) -> Res<'a, Tw<O>>
where
    F: FnMut(Span<'a>) -> Res<'a, O>,
{
    move |input: Span<'a>| {
        let (next, w) = f(input)?;
        Ok((next, Tw::new(w, Trace::between(&input, &next))))
    }
}

struct Failure {
    offset: usize,
    expected: Option<String>,
    context: Option<&'static str>,
}

fn describe(kind: &BaseErrorKind<&'static str, Box<dyn std::error::Error + Send + Sync + 'static>>) -> Option<String> {
    match kind {
        BaseErrorKind::Expected(Expectation::Tag(tag)) => Some(tag.to_string()),
        BaseErrorKind::Expected(Expectation::Char(c)) => Some(c.to_string()),
        BaseErrorKind::Expected(Expectation::Eof) => Some("end of input".to_string()),
        BaseErrorKind::Expected(other) => Some(other.to_string()),
        BaseErrorKind::Kind(_) => None,
        BaseErrorKind::External(err) => Some(err.to_string()),
    }
}

fn collect(tree: &NomErr, context: Option<&'static str>, out: &mut Vec<Failure>) {
    match tree {
        GenericErrorTree::Base { location, kind } => out.push(Failure {
            offset: location.location_offset(),
            expected: describe(kind),
            context,
        }),
        GenericErrorTree::Stack { base, contexts } => {
            let context = contexts
                .iter()
                .find_map(|(_, ctx)| match ctx {
                    StackContext::Context(ctx) => Some(*ctx),
                    StackContext::Kind(_) => None,
                })
                .or(context);
            collect(base, context, out)
        }
        GenericErrorTree::Alt(alts) => {
            for alt in alts {
                collect(alt, context, out);
            }
        }
    }
}

/// the word (or single character) found at `offset` in `src`
pub fn token_at(src: &str, offset: usize) -> String {
    if offset >= src.len() || !src.is_char_boundary(offset) {
        return "end of input".to_string();
    }
    let rest = &src[offset..];
    let len = rest
        .char_indices()
        .find(|(_, c)| DELIMITERS.contains(*c) || c.is_whitespace())
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    if len == 0 {
        rest.chars().next().map(|c| c.to_string()).unwrap_or_default()
    } else {
        rest[..len].to_string()
    }
}

/// Converts a nom error tree into a [`ParseErrs`] reporting the furthest failure offset,
/// the token found there and every alternative the parser would have accepted.
pub fn to_parse_errs(src: &str, tree: &NomErr) -> ParseErrs {
    let mut failures = vec![];
    collect(tree, None, &mut failures);
    let offset = failures.iter().map(|f| f.offset).max().unwrap_or(0);
    let furthest = failures.iter().filter(|f| f.offset == offset);
    let expected: BTreeSet<String> = furthest.clone().filter_map(|f| f.expected.clone()).collect();
    let message = furthest
        .filter_map(|f| f.context)
        .next()
        .map(|ctx| format!("could not parse {}", ctx))
        .unwrap_or_else(|| "unexpected input".to_string());
    let report = Report::new(message, offset, token_at(src, offset)).expecting(expected);
    ParseErrs::from_report(report, src)
}

pub fn result<'a, O>(src: &str, res: Res<'a, O>) -> Result<O, ParseErrs> {
    match res {
        Ok((_, o)) => Ok(o),
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => Err(to_parse_errs(src, &err)),
        Err(nom::Err::Incomplete(_)) => Err(ParseErrs::from_report(
            Report::new("incomplete input", src.len(), "end of input"),
            src,
        )),
    }
}
