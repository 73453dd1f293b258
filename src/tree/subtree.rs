//! Immutable, position-independent tree nodes
//!
//! A [`Subtree`] knows its size but not its position: children are stored
//! with offsets relative to their parent, so an untouched subtree can be
//! shared between the trees before and after an edit even though its
//! absolute position moved.

use std::sync::Arc;

use text_size::TextSize;

use crate::language::{Language, LexModeId, ProductionId, StateId, Symbol};

/// Production id of nodes that were not built by a reduction (ERROR nodes,
/// cancelled roots)
pub(crate) const NO_PRODUCTION: ProductionId = ProductionId::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    Leading,
    Trailing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SubtreeFlags {
    /// Appears between structural children (whitespace, comments, skipped input)
    pub(crate) extra: bool,
    /// Zero-width token inserted by error recovery
    pub(crate) missing: bool,
    /// The node itself is an ERROR
    pub(crate) error: bool,
    pub(crate) has_error: bool,
    /// Touched by an edit since it was parsed
    pub(crate) has_changes: bool,
    pub(crate) has_external_tokens: bool,
}

/// Symbol and lex mode of the first leaf, for reuse checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FirstLeaf {
    pub(crate) symbol: Symbol,
    pub(crate) lex_mode: LexModeId,
}

#[derive(Debug, Clone)]
pub(crate) struct SubtreeData {
    pub(crate) symbol: Symbol,
    pub(crate) size: TextSize,
    /// Bytes past the end that influenced how this subtree was built
    pub(crate) lookahead_bytes: u32,
    pub(crate) parse_state: StateId,
    pub(crate) production_id: ProductionId,
    pub(crate) flags: SubtreeFlags,
    pub(crate) children: Box<[Subtree]>,
    /// Start of each child relative to this subtree
    pub(crate) offsets: Box<[TextSize]>,
    /// Nodes in this subtree, itself included
    pub(crate) descendant_count: u32,
    /// Visible nodes strictly below this one
    pub(crate) visible_descendant_count: u32,
    pub(crate) visible_child_count: u32,
    pub(crate) named_child_count: u32,
    pub(crate) first_leaf: FirstLeaf,
    /// Scanner state after the last external token in this subtree
    pub(crate) external_state: Option<Arc<[u8]>>,
}

impl Drop for SubtreeData {
    fn drop(&mut self) {
        if self.children.is_empty() {
            return;
        }
        let mut pending = std::mem::take(&mut self.children).into_vec();
        while let Some(Subtree(child)) = pending.pop() {
            if let Some(mut data) = Arc::into_inner(child) {
                pending.extend(std::mem::take(&mut data.children).into_vec());
            }
        }
    }
}

/// A shared, immutable syntax tree node
#[derive(Clone)]
pub struct Subtree(Arc<SubtreeData>);

impl Subtree {
    pub(crate) fn from_data(data: SubtreeData) -> Self {
        Self(Arc::new(data))
    }

    #[inline]
    pub(crate) fn data(&self) -> &SubtreeData {
        &self.0
    }

    /// A token leaf
    pub(crate) fn leaf(
        language: &Language,
        symbol: Symbol,
        size: TextSize,
        lookahead_bytes: u32,
        parse_state: StateId,
        lex_mode: LexModeId,
        external_state: Option<Arc<[u8]>>,
    ) -> Self {
        let flags = SubtreeFlags {
            extra: language.is_extra(symbol),
            has_external_tokens: external_state.is_some(),
            ..SubtreeFlags::default()
        };
        Self::from_data(SubtreeData {
            symbol,
            size,
            lookahead_bytes,
            parse_state,
            production_id: NO_PRODUCTION,
            flags,
            children: Box::default(),
            offsets: Box::default(),
            descendant_count: 1,
            visible_descendant_count: 0,
            visible_child_count: 0,
            named_child_count: 0,
            first_leaf: FirstLeaf { symbol, lex_mode },
            external_state,
        })
    }

    /// Unrecognized input, kept as an extra ERROR leaf
    pub(crate) fn error_leaf(
        size: TextSize,
        lookahead_bytes: u32,
        parse_state: StateId,
        lex_mode: LexModeId,
    ) -> Self {
        Self::from_data(SubtreeData {
            symbol: Symbol::ERROR,
            size,
            lookahead_bytes,
            parse_state,
            production_id: NO_PRODUCTION,
            flags: SubtreeFlags {
                extra: true,
                error: true,
                has_error: true,
                ..SubtreeFlags::default()
            },
            children: Box::default(),
            offsets: Box::default(),
            descendant_count: 1,
            visible_descendant_count: 0,
            visible_child_count: 0,
            named_child_count: 0,
            first_leaf: FirstLeaf {
                symbol: Symbol::ERROR,
                lex_mode,
            },
            external_state: None,
        })
    }

    /// Zero-width token the source lacks
    pub(crate) fn missing(symbol: Symbol, parse_state: StateId, lex_mode: LexModeId) -> Self {
        Self::from_data(SubtreeData {
            symbol,
            size: TextSize::new(0),
            lookahead_bytes: 0,
            parse_state,
            production_id: NO_PRODUCTION,
            flags: SubtreeFlags {
                missing: true,
                has_error: true,
                ..SubtreeFlags::default()
            },
            children: Box::default(),
            offsets: Box::default(),
            descendant_count: 1,
            visible_descendant_count: 0,
            visible_child_count: 0,
            named_child_count: 0,
            first_leaf: FirstLeaf { symbol, lex_mode },
            external_state: None,
        })
    }

    /// An interior node; sizes, counts and flags are derived from `children`
    pub(crate) fn node(
        language: &Language,
        symbol: Symbol,
        children: Vec<Subtree>,
        production_id: ProductionId,
        parse_state: StateId,
    ) -> Self {
        let mut offsets = Vec::with_capacity(children.len());
        let mut size = TextSize::new(0);
        let mut lookahead_end = 0u32;
        let mut descendant_count = 1u32;
        let mut visible_descendant_count = 0u32;
        let mut visible_child_count = 0u32;
        let mut named_child_count = 0u32;
        let mut flags = SubtreeFlags {
            error: symbol.is_error(),
            has_error: symbol.is_error(),
            ..SubtreeFlags::default()
        };
        let mut external_state = None;

        for child in &children {
            let data = child.data();
            offsets.push(size);
            size += data.size;
            lookahead_end = lookahead_end.max(u32::from(size) + data.lookahead_bytes);
            descendant_count += data.descendant_count;
            visible_descendant_count += data.visible_descendant_count;
            if language.is_visible(data.symbol) {
                visible_descendant_count += 1;
                visible_child_count += 1;
                if language.is_named(data.symbol) {
                    named_child_count += 1;
                }
            } else {
                visible_child_count += data.visible_child_count;
                named_child_count += data.named_child_count;
            }
            flags.has_error |= data.flags.has_error;
            flags.has_changes |= data.flags.has_changes;
            if data.flags.has_external_tokens {
                flags.has_external_tokens = true;
                external_state = data.external_state.clone();
            }
        }

        let first_leaf = children
            .first()
            .map(|child| child.data().first_leaf)
            .unwrap_or(FirstLeaf {
                symbol,
                lex_mode: language.lex_mode_id(parse_state),
            });

        Self::from_data(SubtreeData {
            symbol,
            size,
            lookahead_bytes: lookahead_end.saturating_sub(u32::from(size)),
            parse_state,
            production_id,
            flags,
            children: children.into_boxed_slice(),
            offsets: offsets.into_boxed_slice(),
            descendant_count,
            visible_descendant_count,
            visible_child_count,
            named_child_count,
            first_leaf,
            external_state,
        })
    }

    /// An ERROR node grouping skipped or discarded input
    pub(crate) fn error_node(language: &Language, children: Vec<Subtree>, parse_state: StateId) -> Self {
        let mut node = Self::node(language, Symbol::ERROR, children, NO_PRODUCTION, parse_state);
        node.update(|data| data.flags.extra = true);
        node
    }

    /// Apply `f` to a uniquely owned copy of this subtree's data
    pub(crate) fn update(&mut self, f: impl FnOnce(&mut SubtreeData)) {
        f(Arc::make_mut(&mut self.0));
    }

    /// Extend the lookahead window to at least `bytes` past the end
    pub(crate) fn with_min_lookahead(mut self, bytes: u32) -> Self {
        if bytes > self.0.lookahead_bytes {
            self.update(|data| data.lookahead_bytes = bytes);
        }
        self
    }

    /// The same leaf recorded as shifted in `state`
    pub(crate) fn with_parse_state(mut self, state: StateId) -> Self {
        if self.0.parse_state != state {
            self.update(|data| data.parse_state = state);
        }
        self
    }

    /// Whether an ERROR or MISSING node sits on the given edge, looking
    /// through extras that hold no error
    pub(crate) fn error_on_edge(&self, edge: Edge) -> bool {
        let mut node = self;
        loop {
            if node.is_error() || node.is_missing() {
                return true;
            }
            if !node.has_error() {
                return false;
            }
            let facing = |child: &&Subtree| !child.is_extra() || child.has_error();
            let next = match edge {
                Edge::Leading => node.children().iter().find(facing),
                Edge::Trailing => node.children().iter().rev().find(facing),
            };
            match next {
                Some(child) => node = child,
                None => return false,
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn symbol(&self) -> Symbol {
        self.0.symbol
    }

    #[inline]
    pub fn size(&self) -> TextSize {
        self.0.size
    }

    #[inline]
    pub fn children(&self) -> &[Subtree] {
        &self.0.children
    }

    #[inline]
    pub(crate) fn offsets(&self) -> &[TextSize] {
        &self.0.offsets
    }

    #[inline]
    pub fn is_extra(&self) -> bool {
        self.0.flags.extra
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        self.0.flags.missing
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.0.flags.error
    }

    #[inline]
    pub fn has_error(&self) -> bool {
        self.0.flags.has_error
    }

    #[inline]
    pub fn has_changes(&self) -> bool {
        self.0.flags.has_changes
    }

    #[inline]
    pub fn lookahead_bytes(&self) -> u32 {
        self.0.lookahead_bytes
    }

    #[inline]
    pub fn parse_state(&self) -> StateId {
        self.0.parse_state
    }

    /// Nodes in this subtree, itself and hidden nodes included
    #[inline]
    pub fn descendant_count(&self) -> usize {
        self.0.descendant_count as usize
    }

    /// Identity of the shared node
    #[inline]
    pub fn ptr_eq(&self, other: &Subtree) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[inline]
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl std::fmt::Debug for Subtree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subtree")
            .field("symbol", &self.0.symbol)
            .field("size", &self.0.size)
            .field("children", &self.0.children.len())
            .field("has_changes", &self.0.flags.has_changes)
            .finish()
    }
}
