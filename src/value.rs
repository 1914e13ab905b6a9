// Copyright 2024 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! The token contract the (external, out-of-scope) lexer is expected to
//! satisfy, per SPEC_FULL.md §6.
//!
//! Unlike the teacher's own `Token` constructor — which SPEC_FULL.md §9
//! flags as almost certainly buggy, since it zeroes `type`/`value` rather
//! than assigning its parameters — every field below is assigned from the
//! matching constructor argument.

use crate::symbol::TerminalId;
use std::fmt;

/// File offset, line number and column span of a token, used for
/// diagnostics and for the `ERROR` pseudo-token's inherited position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub file_offset: usize,
    pub line_number: usize,
    pub line_offset_start: usize,
    pub line_offset_end: usize,
}

impl Position {
    pub fn new(
        file_offset: usize,
        line_number: usize,
        line_offset_start: usize,
        line_offset_end: usize,
    ) -> Self {
        Self {
            file_offset,
            line_number,
            line_offset_start,
            line_offset_end,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}",
            self.line_number, self.line_offset_start, self.line_offset_end
        )
    }
}

/// One token, as produced by the external lexer and consumed one at a time
/// by the GLR runtime. `V` is the caller's synthesized-value type; terminal
/// tokens carry a "leaf" value of that same type (e.g. a literal wrapped in
/// the caller's AST-node enum) so that a `Shift` can push it onto a spine
/// alongside reduced values.
#[derive(Debug, Clone)]
pub struct Token<V> {
    pub terminal: TerminalId,
    pub value: V,
    pub position: Position,
}

impl<V> Token<V> {
    pub fn new(terminal: TerminalId, value: V, position: Position) -> Self {
        Self {
            terminal,
            value,
            position,
        }
    }
}

/// The literal shape an external lexer hands the runtime: a terminal
/// *name*, not yet resolved to this grammar's interned `TerminalId`
/// (SPEC_FULL.md §6 "Token contract"). `runtime::parse` resolves each one
/// against the grammar's symbol table, surfacing a `BadToken` diagnostic
/// (SPEC_FULL.md §7) for a name the grammar never declared or discovered
/// rather than panicking on an out-of-range id.
#[derive(Debug, Clone)]
pub struct RawToken<V> {
    pub terminal_name: String,
    pub value: V,
    pub position: Position,
}

impl<V> RawToken<V> {
    pub fn new(terminal_name: impl Into<String>, value: V, position: Position) -> Self {
        Self {
            terminal_name: terminal_name.into(),
            value,
            position,
        }
    }
}
