//! Lowering the query CST to pattern steps
//!
//! Every pattern becomes a sequence of [`ChildStep`]s over an arena of
//! [`Step`]s. Node kinds and fields are resolved against the language here,
//! so matching only compares ids.

use indexmap::IndexSet;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use text_size::TextSize;

use super::parser;
use super::syntax_kind::{SyntaxKind, SyntaxNode, SyntaxToken};
use super::{QueryError, QueryErrorKind};
use crate::language::{FieldId, Language, Symbol};

pub(crate) type StepId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Quantifier {
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Quantifier {
    pub(crate) fn min(self) -> usize {
        match self {
            Self::One | Self::OneOrMore => 1,
            Self::ZeroOrOne | Self::ZeroOrMore => 0,
        }
    }

    pub(crate) fn max(self) -> usize {
        match self {
            Self::One | Self::ZeroOrOne => 1,
            Self::ZeroOrMore | Self::OneOrMore => usize::MAX,
        }
    }
}

/// What a step accepts as a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeTest {
    /// `_`
    Any,
    /// `(_)`
    AnyNamed,
    /// `(kind)` or `"literal"`
    Symbol(Symbol),
    /// `(ERROR)`
    Error,
    /// `(MISSING)`
    Missing,
}

#[derive(Debug, Clone)]
pub(crate) enum StepKind {
    Node {
        test: NodeTest,
        children: Vec<ChildStep>,
        /// The last child must be the last named child
        anchored_end: bool,
        negated_fields: Vec<FieldId>,
    },
    Alternation(Vec<StepId>),
}

#[derive(Debug, Clone)]
pub(crate) struct Step {
    pub(crate) kind: StepKind,
    pub(crate) quantifier: Quantifier,
    pub(crate) captures: Vec<u32>,
}

/// A step in a sibling sequence
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChildStep {
    pub(crate) step: StepId,
    pub(crate) field: Option<FieldId>,
    /// Must follow the previous sibling with only anonymous nodes between
    pub(crate) anchored: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PredicateArg {
    Capture(u32),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) enum Predicate {
    Eq {
        capture: u32,
        value: PredicateArg,
        negated: bool,
    },
    /// Unanchored regex search over the capture text
    Match {
        capture: u32,
        regex: Regex,
        negated: bool,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    /// Top-level sibling sequence; the first item always matches the start node
    pub(crate) items: Vec<ChildStep>,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) start_byte: TextSize,
}

pub(crate) struct Compiled {
    pub(crate) steps: Vec<Step>,
    pub(crate) patterns: Vec<Pattern>,
    pub(crate) capture_names: IndexSet<SmolStr>,
}

pub(crate) fn compile(language: &Language, source: &str) -> Result<Compiled, QueryError> {
    let parse = parser::parse(source);
    if let Some(error) = parse.errors.first() {
        return Err(QueryError::new(
            QueryErrorKind::Syntax,
            error.range.start(),
            error.message.clone(),
        ));
    }

    let mut compiler = Compiler {
        language,
        steps: Vec::new(),
        capture_names: IndexSet::new(),
        kinds: FxHashMap::default(),
    };
    let mut patterns = Vec::new();
    for node in parse.syntax().children() {
        match node.kind() {
            SyntaxKind::PATTERN => patterns.push(compiler.top_level(&node)?),
            SyntaxKind::PREDICATE => {
                return Err(QueryError::new(
                    QueryErrorKind::Predicate,
                    node.text_range().start(),
                    "predicates must appear inside a pattern",
                ));
            }
            _ => {}
        }
    }

    tracing::debug!(
        patterns = patterns.len(),
        steps = compiler.steps.len(),
        captures = compiler.capture_names.len(),
        "compiled query"
    );
    Ok(Compiled {
        steps: compiler.steps,
        patterns,
        capture_names: compiler.capture_names,
    })
}

struct Compiler<'a> {
    language: &'a Language,
    steps: Vec<Step>,
    capture_names: IndexSet<SmolStr>,
    kinds: FxHashMap<(SmolStr, bool), Option<Symbol>>,
}

/// Children of a node pattern or group, before predicates are resolved
struct Children {
    items: Vec<ChildStep>,
    anchored_end: bool,
    negated_fields: Vec<FieldId>,
}

impl Compiler<'_> {
    fn top_level(&mut self, pattern: &SyntaxNode) -> Result<Pattern, QueryError> {
        let start_byte = pattern.text_range().start();
        let mut predicates = Vec::new();
        let mut used = FxHashSet::default();

        let mut items = match inner(pattern) {
            Some(group) if group.kind() == SyntaxKind::GROUP => {
                if quantifier_token(pattern).is_some() || capture_tokens(pattern).next().is_some() {
                    return Err(QueryError::new(
                        QueryErrorKind::Syntax,
                        start_byte,
                        "groups cannot be quantified or captured",
                    ));
                }
                let children = self.children(&group, &mut predicates, &mut used)?;
                if let Some(&field) = children.negated_fields.first() {
                    let name = self.language.field_name(field).unwrap_or_default().to_string();
                    return Err(QueryError::new(
                        QueryErrorKind::Field,
                        start_byte,
                        format!("negated field `{name}` needs an enclosing node"),
                    ));
                }
                if children.items.is_empty() {
                    return Err(QueryError::new(QueryErrorKind::Syntax, start_byte, "empty group"));
                }
                children.items
            }
            _ => {
                let step = self.pattern(pattern, &mut predicates, &mut used)?;
                vec![ChildStep {
                    step,
                    field: None,
                    anchored: false,
                }]
            }
        };

        // A match starts at the node it is reported for
        if let Some(first) = items.first_mut() {
            let step = &mut self.steps[first.step];
            step.quantifier = match step.quantifier {
                Quantifier::ZeroOrOne => Quantifier::One,
                Quantifier::ZeroOrMore => Quantifier::OneOrMore,
                other => other,
            };
            first.anchored = false;
        }

        let predicates = predicates
            .iter()
            .map(|node| self.predicate(node, &used))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Pattern {
            items,
            predicates,
            start_byte,
        })
    }

    /// Compile a PATTERN node into a step
    fn pattern(
        &mut self,
        pattern: &SyntaxNode,
        predicates: &mut Vec<SyntaxNode>,
        used: &mut FxHashSet<u32>,
    ) -> Result<StepId, QueryError> {
        let Some(inner) = inner(pattern) else {
            return Err(QueryError::new(
                QueryErrorKind::Syntax,
                pattern.text_range().start(),
                "expected a pattern",
            ));
        };

        let kind = match inner.kind() {
            SyntaxKind::NODE_PATTERN => {
                let name = first_token(&inner, SyntaxKind::IDENT);
                let test = match &name {
                    Some(token) => self.node_test(token)?,
                    None => NodeTest::AnyNamed,
                };
                let children = self.children(&inner, predicates, used)?;
                StepKind::Node {
                    test,
                    children: children.items,
                    anchored_end: children.anchored_end,
                    negated_fields: children.negated_fields,
                }
            }
            SyntaxKind::ANONYMOUS_PATTERN => {
                let test = match first_token(&inner, SyntaxKind::STRING) {
                    Some(token) => self.literal_test(&token)?,
                    None => NodeTest::Any,
                };
                leaf_step(test)
            }
            SyntaxKind::WILDCARD_PATTERN => leaf_step(NodeTest::Any),
            SyntaxKind::ALTERNATION => {
                let branches = inner
                    .children()
                    .filter(|child| child.kind() == SyntaxKind::PATTERN)
                    .map(|branch| self.pattern(&branch, predicates, used))
                    .collect::<Result<Vec<_>, _>>()?;
                if branches.is_empty() {
                    return Err(QueryError::new(
                        QueryErrorKind::Syntax,
                        inner.text_range().start(),
                        "empty alternation",
                    ));
                }
                StepKind::Alternation(branches)
            }
            _ => {
                return Err(QueryError::new(
                    QueryErrorKind::Syntax,
                    inner.text_range().start(),
                    "grouped sequences are only supported at the top level",
                ));
            }
        };

        let quantifier = match quantifier_token(pattern).map(|token| token.kind()) {
            Some(SyntaxKind::QUESTION) => Quantifier::ZeroOrOne,
            Some(SyntaxKind::STAR) => Quantifier::ZeroOrMore,
            Some(SyntaxKind::PLUS) => Quantifier::OneOrMore,
            _ => Quantifier::One,
        };
        let captures = capture_tokens(pattern)
            .map(|token| {
                let (index, _) = self.capture_names.insert_full(SmolStr::new(&token.text()[1..]));
                let index = index as u32;
                used.insert(index);
                index
            })
            .collect();

        self.steps.push(Step {
            kind,
            quantifier,
            captures,
        });
        Ok(self.steps.len() - 1)
    }

    fn children(
        &mut self,
        container: &SyntaxNode,
        predicates: &mut Vec<SyntaxNode>,
        used: &mut FxHashSet<u32>,
    ) -> Result<Children, QueryError> {
        let mut items = Vec::new();
        let mut negated_fields = Vec::new();
        let mut anchored = false;

        for child in container.children() {
            match child.kind() {
                SyntaxKind::ANCHOR => anchored = true,
                SyntaxKind::NEGATED_FIELD => {
                    if let Some(name) = first_token(&child, SyntaxKind::IDENT) {
                        negated_fields.push(self.field(&name)?);
                    }
                }
                SyntaxKind::FIELD => {
                    let field = match first_token(&child, SyntaxKind::IDENT) {
                        Some(name) => Some(self.field(&name)?),
                        None => None,
                    };
                    let Some(pattern) = child.children().find(|node| node.kind() == SyntaxKind::PATTERN) else {
                        continue;
                    };
                    let step = self.pattern(&pattern, predicates, used)?;
                    items.push(ChildStep {
                        step,
                        field,
                        anchored,
                    });
                    anchored = false;
                }
                SyntaxKind::PATTERN => {
                    let step = self.pattern(&child, predicates, used)?;
                    items.push(ChildStep {
                        step,
                        field: None,
                        anchored,
                    });
                    anchored = false;
                }
                SyntaxKind::PREDICATE => predicates.push(child),
                _ => {}
            }
        }

        Ok(Children {
            items,
            anchored_end: anchored,
            negated_fields,
        })
    }

    // =========================================================================
    // Name resolution
    // =========================================================================

    fn node_test(&mut self, name: &SyntaxToken) -> Result<NodeTest, QueryError> {
        match name.text() {
            "_" => return Ok(NodeTest::AnyNamed),
            "ERROR" => return Ok(NodeTest::Error),
            "MISSING" => return Ok(NodeTest::Missing),
            _ => {}
        }
        match self.symbol(name.text(), true) {
            Some(symbol) => Ok(NodeTest::Symbol(symbol)),
            None => Err(QueryError::new(
                QueryErrorKind::NodeType,
                name.text_range().start(),
                format!("unknown node type `{}`", name.text()),
            )),
        }
    }

    fn literal_test(&mut self, literal: &SyntaxToken) -> Result<NodeTest, QueryError> {
        let text = unescape(literal.text());
        match self.symbol(&text, false) {
            Some(symbol) => Ok(NodeTest::Symbol(symbol)),
            None => Err(QueryError::new(
                QueryErrorKind::NodeType,
                literal.text_range().start(),
                format!("unknown token `{text}`"),
            )),
        }
    }

    /// A visible symbol by name, memoized
    fn symbol(&mut self, name: &str, named: bool) -> Option<Symbol> {
        let language = self.language;
        *self
            .kinds
            .entry((SmolStr::new(name), named))
            .or_insert_with(|| {
                language
                    .symbol_for_name(name, named)
                    .filter(|&symbol| language.is_visible(symbol))
            })
    }

    fn field(&self, name: &SyntaxToken) -> Result<FieldId, QueryError> {
        self.language.field_id(name.text()).ok_or_else(|| {
            QueryError::new(
                QueryErrorKind::Field,
                name.text_range().start(),
                format!("unknown field `{}`", name.text()),
            )
        })
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    fn predicate(&self, node: &SyntaxNode, used: &FxHashSet<u32>) -> Result<Predicate, QueryError> {
        let offset = node.text_range().start();
        let name = first_token(node, SyntaxKind::PREDICATE_NAME)
            .map(|token| token.text().to_string())
            .unwrap_or_default();
        let args = node
            .children_with_tokens()
            .filter_map(|element| element.into_token())
            .filter(|token| {
                matches!(
                    token.kind(),
                    SyntaxKind::CAPTURE | SyntaxKind::STRING | SyntaxKind::IDENT
                )
            })
            .map(|token| self.predicate_arg(&token, used))
            .collect::<Result<Vec<_>, _>>()?;

        let invalid = |message: String| QueryError::new(QueryErrorKind::Predicate, offset, message);
        let [first, second] = args.as_slice() else {
            return Err(invalid(format!(
                "`{name}` takes 2 arguments, found {}",
                args.len()
            )));
        };
        let PredicateArg::Capture(capture) = *first else {
            return Err(invalid(format!("first argument of `{name}` must be a capture")));
        };

        match name.as_str() {
            "#eq?" | "#not-eq?" => Ok(Predicate::Eq {
                capture,
                value: second.clone(),
                negated: name == "#not-eq?",
            }),
            "#match?" | "#not-match?" => match second {
                PredicateArg::Text(pattern) => match Regex::new(pattern) {
                    Ok(regex) => Ok(Predicate::Match {
                        capture,
                        regex,
                        negated: name == "#not-match?",
                    }),
                    Err(err) => Err(invalid(format!("invalid regex in `{name}`: {err}"))),
                },
                PredicateArg::Capture(_) => {
                    Err(invalid(format!("second argument of `{name}` must be a string")))
                }
            },
            _ => Err(invalid(format!("unknown predicate `{name}`"))),
        }
    }

    fn predicate_arg(&self, token: &SyntaxToken, used: &FxHashSet<u32>) -> Result<PredicateArg, QueryError> {
        match token.kind() {
            SyntaxKind::CAPTURE => {
                let name = &token.text()[1..];
                match self.capture_names.get_index_of(name) {
                    Some(index) if used.contains(&(index as u32)) => Ok(PredicateArg::Capture(index as u32)),
                    _ => Err(QueryError::new(
                        QueryErrorKind::Capture,
                        token.text_range().start(),
                        format!("unknown capture `@{name}`"),
                    )),
                }
            }
            SyntaxKind::STRING => Ok(PredicateArg::Text(unescape(token.text()))),
            _ => Ok(PredicateArg::Text(token.text().to_string())),
        }
    }
}

fn leaf_step(test: NodeTest) -> StepKind {
    StepKind::Node {
        test,
        children: Vec::new(),
        anchored_end: false,
        negated_fields: Vec::new(),
    }
}

/// The pattern body inside a PATTERN node
fn inner(pattern: &SyntaxNode) -> Option<SyntaxNode> {
    pattern.children().find(|child| {
        matches!(
            child.kind(),
            SyntaxKind::NODE_PATTERN
                | SyntaxKind::ANONYMOUS_PATTERN
                | SyntaxKind::WILDCARD_PATTERN
                | SyntaxKind::ALTERNATION
                | SyntaxKind::GROUP
        )
    })
}

fn first_token(node: &SyntaxNode, kind: SyntaxKind) -> Option<SyntaxToken> {
    node.children_with_tokens()
        .filter_map(|element| element.into_token())
        .find(|token| token.kind() == kind)
}

fn quantifier_token(pattern: &SyntaxNode) -> Option<SyntaxToken> {
    pattern
        .children_with_tokens()
        .filter_map(|element| element.into_token())
        .find(|token| token.kind().is_quantifier())
}

fn capture_tokens(pattern: &SyntaxNode) -> impl Iterator<Item = SyntaxToken> {
    pattern
        .children_with_tokens()
        .filter_map(|element| element.into_token())
        .filter(|token| token.kind() == SyntaxKind::CAPTURE)
}

/// Contents of a string literal with escapes resolved
fn unescape(literal: &str) -> String {
    let body = literal
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(literal);
    let mut text = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            text.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => text.push('\n'),
            Some('t') => text.push('\t'),
            Some('r') => text.push('\r'),
            Some('0') => text.push('\0'),
            Some(other) => text.push(other),
            None => text.push('\\'),
        }
    }
    text
}
