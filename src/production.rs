// Copyright 2024 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Productions and the reducer capability each one carries.

use crate::symbol::{NonTerminalId, PrecedenceLevel, Symbol, SymbolTable};
use crate::value::Position;

/// `(environment, values, positions) -> value`, per the reducer-as-capability
/// design in SPEC_FULL.md §9: the environment is an opaque handle owned by
/// the caller, and the values/positions are exactly the popped rhs entries
/// in left-to-right order.
pub type Reducer<V, E> = Box<dyn Fn(&mut E, Vec<V>, Vec<Position>) -> V>;

/// One grammar rule: `lhs -> rhs`, with an optional precedence override and
/// the reducer that synthesizes a value when the rule fires.
pub struct Production<V, E> {
    id: u32,
    lhs: NonTerminalId,
    rhs: Vec<Symbol>,
    precedence: Option<PrecedenceLevel>,
    reducer: Reducer<V, E>,
}

impl<V, E> Production<V, E> {
    pub fn new(
        id: u32,
        lhs: NonTerminalId,
        rhs: Vec<Symbol>,
        explicit_precedence: Option<PrecedenceLevel>,
        reducer: Reducer<V, E>,
    ) -> Self {
        Self {
            id,
            lhs,
            rhs,
            precedence: explicit_precedence,
            reducer,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn lhs(&self) -> NonTerminalId {
        self.lhs
    }

    pub fn rhs(&self) -> &[Symbol] {
        &self.rhs
    }

    pub fn len(&self) -> usize {
        self.rhs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }

    /// The precedence used for conflict resolution: the explicit override if
    /// one was given at `production()` time, otherwise the precedence of the
    /// last terminal in the rhs (or absent, if the rhs has no terminal).
    ///
    /// The same computation as `Rule::resolved_precedence`, kept in sync by
    /// hand since `Production<V, E>` and `Rule` intentionally don't share a
    /// common supertrait (see `grammar.rs`'s module doc comment for why).
    pub fn resolved_precedence(&self, symbols: &SymbolTable) -> Option<PrecedenceLevel> {
        if let Some(p) = self.precedence {
            return Some(p);
        }
        for symbol in self.rhs.iter().rev() {
            if let Symbol::Terminal(t) = symbol {
                let p = symbols.precedence_of(*t);
                if p.is_set() {
                    return Some(p);
                }
                return None;
            }
        }
        None
    }

    pub fn reduce(&self, env: &mut E, values: Vec<V>, positions: Vec<Position>) -> V {
        (self.reducer)(env, values, positions)
    }

    pub fn describe(&self, symbols: &SymbolTable) -> String {
        let mut s = format!("{}:", symbols.non_terminal_name(self.lhs));
        if self.rhs.is_empty() {
            s.push_str(" <empty>");
        } else {
            for symbol in &self.rhs {
                s.push(' ');
                match symbol {
                    Symbol::Terminal(t) => s.push_str(symbols.terminal_name(*t)),
                    Symbol::NonTerminal(n) => s.push_str(symbols.non_terminal_name(*n)),
                }
            }
        }
        s
    }
}
