//! One parse, from the first token to the root
//!
//! ```text
//!            ┌──────────── reuse cursor (old tree) ───────────┐
//!            ▼                                                 │
//! lookahead ─┬─ reused subtree ──▶ goto ──▶ push               │
//!            └─ token ──▶ action(state, symbol)                │
//!                          ├─ Shift   ──▶ push leaf            │
//!                          ├─ Reduce  ──▶ pop, build, goto ────┘
//!                          ├─ Accept  ──▶ root ──▶ balance
//!                          └─ (none)  ──▶ extra? push : recover
//! ```

use std::time::Instant;

use rustc_hash::FxHashSet;
use text_size::TextSize;

use super::ParseStats;
use super::balance::balance;
use super::options::ParseOptions;
use super::recovery::{Recovery, RecoveryContext, RecoveryStrategy};
use super::reuse::ReuseCursor;
use super::stack::ParseStack;
use crate::language::{ERROR_LEX_MODE, Language, LexModeId, ParseAction, ProductionId, StateId, Symbol};
use crate::lexer::{ExternalScanner, Lexer, TextInput, Token};
use crate::tree::{NO_PRODUCTION, ParseStatus, Subtree};

/// Recoveries allowed at one position before skipping is forced
const MAX_RECOVERIES_AT_POSITION: u32 = 3;

enum Lookahead {
    Token(Token),
    /// A subtree of the old tree starting at the current position
    Reused(Subtree),
    /// A token inserted by recovery
    Missing(Symbol),
}

impl Lookahead {
    fn symbol(&self) -> Symbol {
        match self {
            Lookahead::Token(token) => token.symbol,
            Lookahead::Reused(subtree) => subtree.symbol(),
            Lookahead::Missing(symbol) => *symbol,
        }
    }

    fn is_lexical_error(&self) -> bool {
        matches!(self, Lookahead::Token(token) if token.is_error)
    }
}

/// Outcome of looking for a reusable subtree
enum Reuse {
    Subtree(Subtree),
    /// The candidate was built after a reduction the parser has not done
    /// yet; reduce (with the given lookahead extent) and look again
    Reduce(ProductionId, TextSize),
    None,
}

pub(crate) struct Session<'a> {
    language: Language,
    lexer: &'a mut Lexer,
    input: &'a mut dyn TextInput,
    scanner: Option<Box<dyn ExternalScanner>>,
    recovery: &'a dyn RecoveryStrategy,
    options: &'a ParseOptions,
    reuse: Option<ReuseCursor<'a>>,
    stack: ParseStack,
    stats: ParseStats,
    /// Ids of the nodes built by this session
    fresh: FxHashSet<usize>,
    started: Instant,
    steps: u32,
    pending: Option<Lookahead>,
    /// The lookahead waiting behind an inserted MISSING token
    deferred: Option<Lookahead>,
    recoveries: Option<(TextSize, u32)>,
    /// ERROR node of the most recent skip, for merging consecutive skips
    last_skip: Option<Subtree>,
    wrapped_at_end: bool,
}

impl<'a> Session<'a> {
    pub(crate) fn new(
        language: Language,
        lexer: &'a mut Lexer,
        input: &'a mut dyn TextInput,
        recovery: &'a dyn RecoveryStrategy,
        options: &'a ParseOptions,
        reuse: Option<ReuseCursor<'a>>,
    ) -> Self {
        let scanner = language.new_scanner();
        Self {
            language,
            lexer,
            input,
            scanner,
            recovery,
            options,
            reuse,
            stack: ParseStack::new(),
            stats: ParseStats::default(),
            fresh: FxHashSet::default(),
            started: Instant::now(),
            steps: 0,
            pending: None,
            deferred: None,
            recoveries: None,
            last_skip: None,
            wrapped_at_end: false,
        }
    }

    pub(crate) fn run(mut self) -> (Subtree, ParseStatus, ParseStats) {
        loop {
            if self.should_stop() {
                let root = self.cancelled_root();
                return (root, ParseStatus::Cancelled, self.stats);
            }
            let lookahead = match self.pending.take().or_else(|| self.deferred.take()) {
                Some(lookahead) => lookahead,
                None => match self.next_lookahead() {
                    Some(lookahead) => lookahead,
                    None => continue,
                },
            };
            if let Some(root) = self.step(lookahead) {
                let root = balance(&self.language, root, &self.fresh);
                return (root, ParseStatus::Complete, self.stats);
            }
        }
    }

    fn should_stop(&mut self) -> bool {
        let step = self.steps;
        self.steps = self.steps.wrapping_add(1);
        if !self.options.can_stop() || step % self.options.cancellation_check_interval.max(1) != 0 {
            return false;
        }
        let cancelled = self
            .options
            .cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled());
        let timed_out = self
            .options
            .timeout
            .is_some_and(|timeout| self.started.elapsed() >= timeout);
        if cancelled || timed_out {
            tracing::debug!(
                position = u32::from(self.stack.position()),
                cancelled,
                timed_out,
                "parse stopped early"
            );
        }
        cancelled || timed_out
    }

    // =========================================================================
    // Lookahead
    // =========================================================================

    fn lex(&mut self, position: TextSize, mode: LexModeId) -> Token {
        let external_state = self.stack.external_state().cloned();
        let token = self.lexer.lex(
            &mut *self.input,
            position.into(),
            mode,
            self.scanner.as_mut(),
            external_state.as_deref(),
        );
        self.stats.tokens_lexed += 1;
        self.stats.bytes_lexed += usize::from(token.size);
        token
    }

    /// `None` when a reduction was performed instead
    fn next_lookahead(&mut self) -> Option<Lookahead> {
        let position = self.stack.position();
        let state = self.stack.top_state();
        match self.reuse_at(position, state) {
            Reuse::Subtree(subtree) => {
                tracing::debug!(
                    position = u32::from(position),
                    symbol = self.language.symbol_name(subtree.symbol()),
                    size = u32::from(subtree.size()),
                    "reusing subtree"
                );
                self.stats.subtrees_reused += 1;
                return Some(Lookahead::Reused(subtree));
            }
            Reuse::Reduce(id, extent) => {
                self.reduce(id, extent);
                return None;
            }
            Reuse::None => {}
        }
        let mode = self.language.lex_mode_id(state);
        Some(Lookahead::Token(self.lex(position, mode)))
    }

    fn reuse_at(&mut self, position: TextSize, state: StateId) -> Reuse {
        let Some(cursor) = self.reuse.as_mut() else {
            return Reuse::None;
        };
        let lex_mode = self.language.lex_mode_id(state);
        loop {
            let Some((subtree, start)) = cursor.current() else {
                return Reuse::None;
            };
            if start < position {
                if start + subtree.size() <= position {
                    cursor.advance();
                } else {
                    cursor.descend();
                }
                continue;
            }
            if start > position {
                return Reuse::None;
            }

            let data = subtree.data();
            let external_matches = cursor.external_state().map(|state| &state[..])
                == self.stack.external_state().map(|state| &state[..]);
            // Anything next to an error may have been shaped by recovery
            // around tokens outside its lookahead window
            let near_error = cursor.borders_error() || self.stack.follows_error();
            let reusable = !data.flags.has_changes
                && !data.flags.has_error
                && data.size > TextSize::new(0)
                && self.language.can_relex_as(data.first_leaf.symbol, data.first_leaf.lex_mode, lex_mode)
                && external_matches
                && !near_error;

            if !reusable {
                tracing::trace!(
                    position = u32::from(position),
                    symbol = self.language.symbol_name(data.symbol),
                    changed = data.flags.has_changes,
                    near_error,
                    "cannot reuse subtree"
                );
                if subtree.children().is_empty() {
                    let empty = data.size == TextSize::new(0);
                    cursor.advance();
                    if empty {
                        continue;
                    }
                    return Reuse::None;
                }
                cursor.descend();
                continue;
            }

            if subtree.children().is_empty()
                || (data.parse_state == state && self.language.goto(state, data.symbol).is_some())
            {
                let reused = subtree.clone();
                cursor.advance();
                return Reuse::Subtree(reused);
            }

            if let Some(ParseAction::Reduce(id)) = self.language.action(state, data.first_leaf.symbol) {
                return Reuse::Reduce(id, start + leading_leaf_extent(subtree));
            }
            cursor.descend();
        }
    }

    /// End of the text a lookahead depended on
    fn lookahead_end(&self, lookahead: &Lookahead) -> TextSize {
        match lookahead {
            Lookahead::Token(token) => token.end() + TextSize::new(token.lookahead_bytes),
            Lookahead::Reused(subtree) => self.stack.position() + leading_leaf_extent(subtree),
            Lookahead::Missing(_) => self.stack.position(),
        }
    }

    /// The first non-extra token after `lookahead`, lexed in the error mode
    fn following(&mut self, lookahead: &Lookahead) -> Symbol {
        let mut position = match lookahead {
            Lookahead::Token(token) => token.end(),
            Lookahead::Reused(subtree) => self.stack.position() + subtree.size(),
            Lookahead::Missing(_) => self.stack.position(),
        };
        loop {
            let token = self.lex(position, ERROR_LEX_MODE);
            if token.is_error {
                return Symbol::ERROR;
            }
            if token.symbol == Symbol::END
                || token.size == TextSize::new(0)
                || !self.language.is_extra(token.symbol)
            {
                return token.symbol;
            }
            position = token.end();
        }
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Process one lookahead; returns the root once the parse is over
    fn step(&mut self, lookahead: Lookahead) -> Option<Subtree> {
        let state = self.stack.top_state();
        if let Lookahead::Reused(subtree) = &lookahead {
            if !subtree.children().is_empty() {
                let next = self.language.goto(state, subtree.symbol()).unwrap_or(state);
                self.stack.push(next, subtree.clone());
                return None;
            }
        }

        let symbol = lookahead.symbol();
        let action = if lookahead.is_lexical_error() {
            None
        } else {
            self.language.action(state, symbol)
        };
        match action {
            Some(ParseAction::Shift(next)) => {
                self.shift(next, lookahead);
                None
            }
            Some(ParseAction::Reduce(id)) => {
                let end = self.lookahead_end(&lookahead);
                self.reduce(id, end);
                self.pending = Some(lookahead);
                None
            }
            Some(ParseAction::Accept) => Some(self.accept()),
            None => match lookahead {
                Lookahead::Token(token) if !token.is_error && self.language.is_extra(token.symbol) => {
                    let leaf = self.leaf(&token, state);
                    self.stack.push_extra(leaf);
                    None
                }
                Lookahead::Reused(subtree) if subtree.is_extra() => {
                    self.stack.push_extra(subtree);
                    None
                }
                Lookahead::Missing(symbol) => {
                    tracing::warn!(
                        symbol = self.language.symbol_name(symbol),
                        state,
                        "inserted token has no action; dropping it"
                    );
                    None
                }
                lookahead => self.recover(lookahead),
            },
        }
    }

    fn leaf(&self, token: &Token, state: StateId) -> Subtree {
        Subtree::leaf(
            &self.language,
            token.symbol,
            token.size,
            token.lookahead_bytes,
            state,
            token.lex_mode,
            token.external_state.clone(),
        )
    }

    fn shift(&mut self, next: StateId, lookahead: Lookahead) {
        let state = self.stack.top_state();
        let leaf = match lookahead {
            Lookahead::Token(token) => self.leaf(&token, state),
            Lookahead::Reused(subtree) => subtree.with_parse_state(state),
            Lookahead::Missing(symbol) => {
                Subtree::missing(symbol, state, self.language.lex_mode_id(state))
            }
        };
        tracing::trace!(
            symbol = self.language.symbol_name(leaf.symbol()),
            from = state,
            to = next,
            "shift"
        );
        self.stack.push(next, leaf);
    }

    fn reduce(&mut self, id: ProductionId, lookahead_end: TextSize) {
        let language = self.language.clone();
        let production = language.production(id);
        let trailing = self.stack.pop_extras();
        let children = self.stack.pop_structural(production.child_count as usize);
        let state = self.stack.top_state();

        let node = Subtree::node(&language, production.lhs, children, id, state);
        let node_end = self.stack.position() + node.size();
        let dependency = lookahead_end.checked_sub(node_end).unwrap_or_default();
        let node = node.with_min_lookahead(dependency.into());
        self.fresh.insert(node.id());
        self.stats.nodes_created += 1;

        let next = match language.goto(state, production.lhs) {
            Some(next) => next,
            None => {
                tracing::warn!(
                    state,
                    symbol = language.symbol_name(production.lhs),
                    "missing goto after reduce"
                );
                state
            }
        };
        tracing::trace!(
            symbol = language.symbol_name(production.lhs),
            production = id,
            to = next,
            "reduce"
        );
        self.stack.push(next, node);
        for extra in trailing {
            self.stack.push_extra(extra);
        }
    }

    /// Fold the extras around the start-symbol node into it
    fn accept(&mut self) -> Subtree {
        let language = self.language.clone();
        let mut leading = Vec::new();
        let mut trailing = Vec::new();
        let mut start_node: Option<Subtree> = None;
        for subtree in self.stack.take_all() {
            if start_node.is_none() && !subtree.is_extra() {
                start_node = Some(subtree);
            } else if start_node.is_none() {
                leading.push(subtree);
            } else {
                trailing.push(subtree);
            }
        }

        let Some(node) = start_node else {
            return self.fresh_node(language.table().start_symbol(), leading, NO_PRODUCTION, 0);
        };
        if leading.is_empty() && trailing.is_empty() {
            return node;
        }
        let mut children = leading;
        children.extend(node.children().iter().cloned());
        children.extend(trailing);
        self.fresh_node(node.symbol(), children, node.data().production_id, node.parse_state())
    }

    fn fresh_node(
        &mut self,
        symbol: Symbol,
        children: Vec<Subtree>,
        production_id: ProductionId,
        state: StateId,
    ) -> Subtree {
        let node = Subtree::node(&self.language, symbol, children, production_id, state);
        self.fresh.insert(node.id());
        self.stats.nodes_created += 1;
        node
    }

    fn fresh_error(&mut self, children: Vec<Subtree>, state: StateId) -> Subtree {
        let node = Subtree::error_node(&self.language, children, state);
        self.fresh.insert(node.id());
        self.stats.nodes_created += 1;
        node
    }

    // =========================================================================
    // Error recovery
    // =========================================================================

    fn recover(&mut self, lookahead: Lookahead) -> Option<Subtree> {
        let position = self.stack.position();
        let symbol = lookahead.symbol();
        let attempts = match self.recoveries {
            Some((at, count)) if at == position => count + 1,
            _ => 1,
        };
        self.recoveries = Some((position, attempts));

        let recovery = if attempts > MAX_RECOVERIES_AT_POSITION {
            tracing::debug!(
                position = u32::from(position),
                attempts,
                "no progress at this position; skipping"
            );
            Recovery::SkipToken
        } else {
            let following = self.following(&lookahead);
            let context = RecoveryContext {
                language: &self.language,
                states: self.stack.structural_states(),
                lookahead: symbol,
                following,
                is_lexical_error: lookahead.is_lexical_error(),
                position,
                max_pop_depth: self.options.max_pop_depth,
            };
            let proposed = self.recovery.recover(&context);
            validate(&context, proposed)
        };

        tracing::debug!(
            position = u32::from(position),
            symbol = self.language.symbol_name(symbol),
            ?recovery,
            "recovering from syntax error"
        );
        match recovery {
            Recovery::SkipToken => self.skip(lookahead),
            Recovery::InsertMissing(missing) => {
                self.deferred = Some(lookahead);
                self.pending = Some(Lookahead::Missing(missing));
                None
            }
            Recovery::PopStack(depth) => {
                let popped = self.stack.pop_structural(depth);
                let state = self.stack.top_state();
                let error = self.fresh_error(popped, state);
                self.last_skip = Some(error.clone());
                self.stack.push_extra(error);
                self.pending = Some(lookahead);
                None
            }
        }
    }

    fn skip(&mut self, lookahead: Lookahead) -> Option<Subtree> {
        let state = self.stack.top_state();
        let leaf = match lookahead {
            Lookahead::Token(token) if token.is_error => {
                let leaf = Subtree::error_leaf(token.size, token.lookahead_bytes, state, token.lex_mode);
                self.stack.push_extra(leaf);
                self.last_skip = None;
                return None;
            }
            Lookahead::Token(token) if token.symbol == Symbol::END => return self.skip_at_end(),
            Lookahead::Token(token) => self.leaf(&token, state),
            Lookahead::Reused(subtree) => subtree,
            Lookahead::Missing(_) => return None,
        };

        let mut children = Vec::new();
        if let Some(previous) = self.last_skip.take() {
            let entries = self.stack.entries();
            let index = entries.iter().rposition(|entry| entry.subtree.ptr_eq(&previous));
            if let Some(index) = index {
                let only_extras_above = entries[index + 1..]
                    .iter()
                    .all(|entry| entry.subtree.is_extra() && !entry.subtree.is_error());
                if only_extras_above {
                    let mut between = Vec::new();
                    while self.stack.len() > index + 1 {
                        if let Some(entry) = self.stack.pop() {
                            between.push(entry.subtree);
                        }
                    }
                    between.reverse();
                    self.stack.pop();
                    children.extend(previous.children().iter().cloned());
                    children.extend(between);
                }
            }
        }
        children.push(leaf);

        let state = self.stack.top_state();
        let error = self.fresh_error(children, state);
        self.last_skip = Some(error.clone());
        self.stack.push_extra(error);
        None
    }

    /// Nothing left to skip: wrap the stack in an ERROR and try once more
    /// from the initial state, then give up with an ERROR root
    fn skip_at_end(&mut self) -> Option<Subtree> {
        self.last_skip = None;
        let children = self.stack.take_all();
        if !self.wrapped_at_end && children.iter().any(|child| !child.is_extra()) {
            self.wrapped_at_end = true;
            let error = self.fresh_error(children, 0);
            self.stack.push(0, error);
            return None;
        }
        let mut root = Subtree::error_node(&self.language, children, 0);
        root.update(|data| data.flags.extra = false);
        self.fresh.insert(root.id());
        self.stats.nodes_created += 1;
        Some(root)
    }

    /// The stack so far under the start symbol, followed by an ERROR leaf
    /// over the unparsed remainder
    fn cancelled_root(&mut self) -> Subtree {
        let position = self.stack.position();
        let mut end = usize::from(position);
        loop {
            let len = self.input.chunk_at(end).len();
            if len == 0 {
                break;
            }
            end += len;
        }
        let remainder = TextSize::new(end as u32) - position;
        let state = self.stack.top_state();

        let mut children = self.stack.take_all();
        children.push(Subtree::error_leaf(remainder, 0, state, ERROR_LEX_MODE));
        Subtree::node(
            &self.language,
            self.language.table().start_symbol(),
            children,
            NO_PRODUCTION,
            0,
        )
    }
}

/// Fall back to skipping when a strategy proposes something impossible
fn validate(context: &RecoveryContext<'_>, recovery: Recovery) -> Recovery {
    let language = context.language();
    let valid = match recovery {
        Recovery::SkipToken => true,
        Recovery::InsertMissing(symbol) => {
            symbol != Symbol::END
                && !symbol.is_error()
                && language.is_terminal(symbol)
                && context.accepts(0, &[symbol])
        }
        Recovery::PopStack(depth) => depth >= 1 && depth <= context.depth(),
    };
    if valid {
        recovery
    } else {
        tracing::warn!(?recovery, "recovery strategy proposed an invalid action; skipping instead");
        Recovery::SkipToken
    }
}

/// Size plus lookahead of the first leaf of `subtree`
fn leading_leaf_extent(subtree: &Subtree) -> TextSize {
    let mut leaf = subtree;
    while let Some(first) = leaf.children().first() {
        leaf = first;
    }
    leaf.size() + TextSize::new(leaf.lookahead_bytes())
}
