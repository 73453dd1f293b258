//! Incremental LR parser
//!
//! ```text
//! text ──▶ Lexer (on demand, per-state lex mode)
//!             │ tokens
//!             ▼
//! old tree ─▶ Session (stack machine over the grammar tables)
//!             │   no action ──▶ RecoveryStrategy (PanicMode by default)
//!             ▼
//!           root ──▶ repetition balancing ──▶ Tree
//! ```
//!
//! A parse always produces a tree. Unrecognized input becomes ERROR
//! leaves, unexpected tokens are wrapped in ERROR nodes and absent ones are
//! inserted as zero-width MISSING leaves.
//!
//! ## Incremental reparsing
//!
//! Pass the old tree, after [`Tree::edit`], to [`Parser::parse`]. Subtrees
//! the edit did not touch are taken over whole when the parser reaches their
//! start in the same state, so the work done is proportional to the size of
//! the edit rather than the size of the file. [`ParseStats`] reports how much
//! was lexed, built and reused.

mod balance;
mod options;
mod recovery;
mod reuse;
mod session;
mod stack;

use rayon::prelude::*;

use crate::language::Language;
use crate::lexer::{Lexer, TextInput};
use crate::tree::Tree;

pub use options::ParseOptions;
pub use recovery::{PanicMode, Recovery, RecoveryContext, RecoveryStrategy};

use reuse::ReuseCursor;
use session::Session;

/// Work done by the last parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub tokens_lexed: usize,
    pub bytes_lexed: usize,
    pub subtrees_reused: usize,
    pub nodes_created: usize,
}

/// A reusable parser for one language
pub struct Parser {
    language: Language,
    lexer: Lexer,
    options: ParseOptions,
    recovery: Box<dyn RecoveryStrategy>,
    stats: ParseStats,
}

impl Parser {
    pub fn new(language: Language) -> Self {
        Self {
            lexer: Lexer::new(language.clone()),
            language,
            options: ParseOptions::default(),
            recovery: Box::new(PanicMode),
            stats: ParseStats::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_recovery(mut self, strategy: impl RecoveryStrategy + 'static) -> Self {
        self.recovery = Box::new(strategy);
        self
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: ParseOptions) {
        self.options = options;
    }

    /// Statistics of the most recent parse
    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    /// Parse `text`, reusing what it can of `old`.
    ///
    /// `old` must be the previous tree for this text with every change
    /// since applied through [`Tree::edit`].
    pub fn parse(&mut self, text: &str, old: Option<&Tree>) -> Tree {
        let mut input = text;
        self.parse_with(&mut input, old)
    }

    /// Parse from any [`TextInput`], such as a [`ChunkedInput`](crate::lexer::ChunkedInput)
    pub fn parse_with(&mut self, input: &mut dyn TextInput, old: Option<&Tree>) -> Tree {
        let reuse = match old {
            Some(tree) if tree.language().ptr_eq(&self.language) => Some(ReuseCursor::new(tree)),
            Some(tree) => {
                tracing::warn!(
                    old = tree.language().name(),
                    new = self.language.name(),
                    "old tree was built for another language; parsing from scratch"
                );
                None
            }
            None => None,
        };

        let session = Session::new(
            self.language.clone(),
            &mut self.lexer,
            input,
            self.recovery.as_ref(),
            &self.options,
            reuse,
        );
        let (root, status, stats) = session.run();
        self.stats = stats;

        tracing::debug!(
            language = self.language.name(),
            ?status,
            len = u32::from(root.size()),
            tokens_lexed = stats.tokens_lexed,
            bytes_lexed = stats.bytes_lexed,
            subtrees_reused = stats.subtrees_reused,
            nodes_created = stats.nodes_created,
            "parse finished"
        );
        Tree::new(root, self.language.clone(), status)
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("language", &self.language.name())
            .field("options", &self.options)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Parse independent sources in parallel, one session per source
pub fn parse_batch<S>(language: &Language, sources: &[S]) -> Vec<Tree>
where
    S: AsRef<str> + Sync,
{
    sources
        .par_iter()
        .map_init(
            || Parser::new(language.clone()),
            |parser, source| parser.parse(source.as_ref(), None),
        )
        .collect()
}
