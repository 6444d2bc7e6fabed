use ariadne::{Label, ReportKind, Source};
use derive_builder::UninitializedFieldError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum SpaceErr {
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
    #[error(transparent)]
    Parse(#[from] ParseErrs),
}

impl SpaceErr {
    pub fn illegal_argument<M>(msg: M) -> Self
    where
        M: ToString,
    {
        Self::IllegalArgument(msg.to_string())
    }

    pub fn print(&self) {
        match self {
            SpaceErr::IllegalArgument(_) => eprintln!("{}", self),
            SpaceErr::Parse(errs) => errs.print(),
        }
    }
}

impl From<UninitializedFieldError> for SpaceErr {
    fn from(err: UninitializedFieldError) -> Self {
        Self::IllegalArgument(format!(
            "blueprint field '{}' must be set",
            err.field_name()
        ))
    }
}

impl From<String> for SpaceErr {
    fn from(msg: String) -> Self {
        Self::IllegalArgument(msg)
    }
}

impl From<&str> for SpaceErr {
    fn from(msg: &str) -> Self {
        Self::IllegalArgument(msg.to_string())
    }
}

/// a single located complaint about an input string
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Report {
    pub message: String,
    /// offset (in bytes) into [`ParseErrs::src`]
    pub offset: usize,
    pub token: String,
    /// alternatives the parser would have accepted at `offset`
    pub expected: Vec<String>,
}

impl Report {
    pub fn new<M: ToString, T: ToString>(message: M, offset: usize, token: T) -> Self {
        Self {
            message: message.to_string(),
            offset,
            token: token.to_string(),
            expected: vec![],
        }
    }

    pub fn expecting<I, S>(mut self, expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.expected = expected.into_iter().map(|e| e.to_string()).collect();
        self
    }

    fn range(&self) -> Range<usize> {
        self.offset..(self.offset + self.token.len().max(1))
    }

    fn label(&self) -> String {
        if self.expected.is_empty() {
            format!("found '{}'", self.token)
        } else {
            format!(
                "found '{}' but expected {}",
                self.token,
                self.expected.iter().join(" | ")
            )
        }
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {} ({})", self.message, self.offset, self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
pub struct ParseErrs {
    pub report: Vec<Report>,
    pub src: String,
}

impl ParseErrs {
    pub fn from_report<S: ToString>(report: Report, src: S) -> Self {
        Self {
            report: vec![report],
            src: src.to_string(),
        }
    }

    pub fn first(&self) -> Option<&Report> {
        self.report.first()
    }

    pub fn fold<E: Into<ParseErrs>>(errs: Vec<E>) -> ParseErrs {
        let mut rtn = ParseErrs::default();
        for err in errs {
            let mut err = err.into();
            if rtn.src.is_empty() {
                rtn.src = err.src.clone();
            }
            rtn.report.append(&mut err.report);
        }
        rtn
    }

    pub fn print(&self) {
        for report in &self.report {
            let rendered = ariadne::Report::<Range<usize>>::build(ReportKind::Error, (), report.offset)
                .with_message(&report.message)
                .with_label(Label::new(report.range()).with_message(report.label()))
                .finish();
            if rendered.eprint(Source::from(self.src.as_str())).is_err() {
                eprintln!("{}", report);
            }
        }
    }
}

impl Display for ParseErrs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.report.as_slice() {
            [] => write!(f, "could not parse '{}'", self.src),
            [report] => write!(f, "could not parse '{}': {}", self.src, report),
            reports => write!(
                f,
                "could not parse '{}': {}",
                self.src,
                reports.iter().map(|r| r.to_string()).join("; ")
            ),
        }
    }
}

impl std::error::Error for ParseErrs {}
