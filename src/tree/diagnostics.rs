//! Rendering in-tree errors as diagnostics

use text_size::{TextRange, TextSize};

use super::{Subtree, Tree};
use crate::diagnostics::{ErrorCode, SyntaxError};
use crate::language::Symbol;

impl Tree {
    /// One diagnostic per ERROR node, error leaf and MISSING node, in
    /// source order. A cancelled tree also reports its unparsed remainder.
    pub fn diagnostics(&self) -> Vec<SyntaxError> {
        let mut errors = Vec::new();
        let remainder = if self.is_cancelled() {
            self.root.children().last().filter(|child| child.is_error())
        } else {
            None
        };

        let mut stack = vec![(&self.root, TextSize::new(0))];
        while let Some((subtree, start)) = stack.pop() {
            let range = TextRange::at(start, subtree.size());
            if remainder.is_some_and(|remainder| remainder.ptr_eq(subtree)) {
                errors.push(
                    SyntaxError::from_code(ErrorCode::E0301, range)
                        .with_hint("parse again without a cancellation token or timeout"),
                );
                continue;
            }
            if !subtree.has_error() {
                continue;
            }
            if subtree.is_error() {
                errors.push(self.error_diagnostic(subtree, range));
                continue;
            }
            if subtree.is_missing() {
                let name = self.language.symbol_name(subtree.symbol());
                errors.push(SyntaxError::at(ErrorCode::E0202, start, format!("missing `{name}`")));
                continue;
            }
            for (child, &offset) in subtree.children().iter().zip(subtree.offsets()).rev() {
                stack.push((child, start + offset));
            }
        }
        errors
    }

    fn error_diagnostic(&self, subtree: &Subtree, range: TextRange) -> SyntaxError {
        let lexical = match subtree.children() {
            [] => true,
            [only] => only.is_error() && only.children().is_empty(),
            _ => false,
        };
        if lexical {
            return SyntaxError::from_code(ErrorCode::E0101, range);
        }

        let first = subtree.data().first_leaf.symbol;
        let message = if first == Symbol::ERROR {
            "unexpected input".to_string()
        } else {
            let name = self.language.symbol_name(first);
            if self.language.is_named(first) {
                format!("unexpected {name}")
            } else {
                format!("unexpected `{name}`")
            }
        };
        SyntaxError::new(ErrorCode::E0201, range, message)
    }
}
