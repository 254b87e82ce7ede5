use std::{
    fmt::{self, Debug, Display},
    ops::Range,
};

use ariadne::{CharSet, Label, Report, ReportKind};
use thiserror::Error;

use crate::{
    checkpoint::ItemId,
    position::Position,
    scan::{ScanError, ScanErrorKind},
    source::SourceError,
};

/// The non-error half of a parse result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Match,
    /// Nothing was consumed.
    NoMatch,
}

impl Outcome {
    pub fn is_match(self) -> bool {
        self == Outcome::Match
    }
}

impl From<bool> for Outcome {
    fn from(matched: bool) -> Self {
        if matched {
            Outcome::Match
        } else {
            Outcome::NoMatch
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Match => write!(f, "match"),
            Outcome::NoMatch => write!(f, "no match"),
        }
    }
}

/// Result of every rule, combinator and leaf match.
pub type ParseResult = Result<Outcome, ParseError>;

/// Grammar constructs that come in pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Construct {
    SingleQuote,
    DoubleQuote,
    Set,
    Group,
    Braces,
    Comment,
}

impl Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Construct::SingleQuote => "single quoted string",
            Construct::DoubleQuote => "double quoted string",
            Construct::Set => "set",
            Construct::Group => "parenthesis",
            Construct::Braces => "braces",
            Construct::Comment => "comment",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("{message} in rule '{rule}' at ({position})")]
    MalformedGrammar {
        rule: String,
        message: String,
        position: Position,
    },
    #[error("Unbalanced {construct} in rule '{rule}' at ({position}) -> {body}")]
    UnbalancedConstruct {
        rule: String,
        construct: Construct,
        position: Position,
        /// The rule as far as it could be rendered.
        body: String,
    },
    #[error("ran out of data at ({0})")]
    OutOfData(Position),
    #[error("the input was reset at ({0})")]
    StreamReset(Position),
    #[error(transparent)]
    Scan(ScanError),
    #[error("cannot push back {count} tokens when only {available} are retained")]
    InvalidRewind { count: usize, available: usize },
    #[error("tokens {start}..{end} are not retained")]
    OutOfHistory { start: usize, end: usize },
    #[error("no rule, function or built-in named '{0}'")]
    UnknownRule(String),
    #[error("no identifier for compressed token '{0}'")]
    MissingIdentifier(String),
    #[error("no checkpoint has been pushed")]
    NoCheckpoint,
    #[error("rolling back accepted item {0} was refused")]
    Rejected(ItemId),
    /// Raised by native callbacks through [`Engine::fail`](crate::Engine::fail).
    #[error("{message} in rule '{rule}' at ({position})")]
    Rule {
        rule: String,
        message: String,
        position: Position,
    },
    #[error("corrupt program for rule '{rule}': {message}")]
    CorruptProgram { rule: String, message: String },
}

impl ParseError {
    /// Where in the input (or grammar text) the error happened, if known.
    pub fn position(&self) -> Option<Position> {
        match self {
            ParseError::MalformedGrammar { position, .. }
            | ParseError::UnbalancedConstruct { position, .. }
            | ParseError::Rule { position, .. }
            | ParseError::OutOfData(position)
            | ParseError::StreamReset(position) => Some(*position),
            ParseError::Scan(err) => Some(err.position),
            _ => None,
        }
    }
}

impl From<ScanError> for ParseError {
    fn from(err: ScanError) -> Self {
        match err.kind {
            ScanErrorKind::Source(SourceError::OutOfData) => ParseError::OutOfData(err.position),
            ScanErrorKind::Source(SourceError::StreamReset) => {
                ParseError::StreamReset(err.position)
            }
            _ => ParseError::Scan(err),
        }
    }
}

/// One rule of a batch that failed to register.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleError {
    /// 1-based index of the rule in its batch.
    pub number: usize,
    /// Character range of the rule in the grammar text.
    pub span: Range<usize>,
    pub error: ParseError,
}

/// Everything that went wrong registering a batch of rules.
///
/// The rules that compiled are registered regardless.
#[derive(Error)]
#[error("{} of the rules in {source_name} could not be registered", .errors.len())]
pub struct GrammarError {
    source_name: String,
    text: String,
    errors: Vec<RuleError>,
    installed: usize,
    report: Report<(String, Range<usize>)>,
}

impl GrammarError {
    pub(crate) fn new(
        source_name: String,
        text: String,
        errors: Vec<RuleError>,
        installed: usize,
    ) -> Self {
        let start = errors.first().map_or(0, |err| err.span.start);
        let mut report = Report::build(ReportKind::Error, source_name.clone(), start)
            .with_config(ariadne::Config::default().with_char_set(CharSet::Ascii))
            .with_message(format!(
                "{} malformed rule(s) in {}",
                errors.len(),
                source_name
            ));
        for err in errors.iter() {
            report = report.with_label(
                Label::new((source_name.clone(), err.span.clone()))
                    .with_message(format!("rule #{}: {}", err.number, err.error)),
            );
        }
        if installed > 0 {
            report = report.with_note(format!(
                "the other {} rule(s) in this batch were registered",
                installed
            ));
        }

        Self {
            source_name,
            text,
            errors,
            installed,
            report: report.finish(),
        }
    }

    pub fn errors(&self) -> &[RuleError] {
        &self.errors
    }

    /// How many rules of the batch were registered anyway.
    pub fn installed(&self) -> usize {
        self.installed
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn report(&self) -> &Report<(String, Range<usize>)> {
        &self.report
    }

    /// Print the report against the grammar text it came from.
    pub fn eprint(&self) -> std::io::Result<()> {
        self.report.eprint(ariadne::sources(std::iter::once((
            self.source_name.clone(),
            self.text.as_str(),
        ))))
    }
}

impl Debug for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GrammarError").field(&self.errors).finish()
    }
}

#[test]
fn unbalanced_message_names_rule_and_place() {
    let err = ParseError::UnbalancedConstruct {
        rule: "a".to_owned(),
        construct: Construct::DoubleQuote,
        position: Position::at(3, 7, 40),
        body: "\"x".to_owned(),
    };
    assert_eq!(
        err.to_string(),
        "Unbalanced double quoted string in rule 'a' at (Line:3,Col:7) -> \"x"
    );
}

#[test]
fn running_dry_is_not_a_scan_error() {
    let pos = Position::at(1, 4, 3);
    let err = ParseError::from(ScanError::new(SourceError::OutOfData.into(), pos));
    assert_eq!(err, ParseError::OutOfData(pos));

    let err = ParseError::from(ScanError::new(ScanErrorKind::UnexpectedEndOfSet, pos));
    assert!(matches!(err, ParseError::Scan(_)));
}
