// Copyright 2024 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Terminal and nonterminal identity, precedence and associativity.
//!
//! Symbols are interned: a name maps to a dense, small integer id the first
//! time it is seen, and every later reference to the same name resolves to
//! the same id. Terminals and nonterminals are interned into separate id
//! spaces so that `TerminalId(3)` and `NonTerminalId(3)` never collide.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A terminal's identity. Dense, assigned in declaration/discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TerminalId(pub u32);

/// A nonterminal's identity. Dense, assigned in declaration/discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NonTerminalId(pub u32);

/// Either half of a production's right hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    Terminal(TerminalId),
    NonTerminal(NonTerminalId),
}

impl Symbol {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal(_))
    }

    pub fn is_non_terminal(&self) -> bool {
        matches!(self, Symbol::NonTerminal(_))
    }
}

/// Tie-breaker policy within a precedence level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Associativity {
    #[default]
    NonAssoc,
    Left,
    Right,
}

impl fmt::Display for Associativity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Associativity::NonAssoc => write!(f, "NonAssoc"),
            Associativity::Left => write!(f, "Left"),
            Associativity::Right => write!(f, "Right"),
        }
    }
}

/// `(level, assoc)`. Higher `level` binds tighter. Level `0` means
/// "never explicitly assigned a precedence" and is treated as absent by the
/// conflict resolver (see `table.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrecedenceLevel {
    level: u32,
    assoc: Associativity,
}

impl PrecedenceLevel {
    pub fn new(level: u32, assoc: Associativity) -> Self {
        Self { level, assoc }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn associativity(&self) -> Associativity {
        self.assoc
    }

    pub fn is_set(&self) -> bool {
        self.level != 0
    }
}

#[derive(Debug, Clone)]
struct TerminalData {
    name: String,
    precedence: PrecedenceLevel,
}

#[derive(Debug, Clone)]
struct NonTerminalData {
    name: String,
}

/// Terminal/nonterminal interning table plus precedence bookkeeping.
///
/// Precedence levels are a monotone counter: each `left`/`right`/`nonassoc`
/// call allocates one level strictly greater than every earlier call, so
/// later declarations always outrank earlier ones (per the source's
/// declaration-order precedence discipline, carried over verbatim rather
/// than "fixed" to a more conventional low-to-high numbering).
#[derive(Debug, Default)]
pub struct SymbolTable {
    terminals_by_name: BTreeMap<String, TerminalId>,
    terminals: Vec<TerminalData>,
    non_terminals_by_name: BTreeMap<String, NonTerminalId>,
    non_terminals: Vec<NonTerminalData>,
    next_precedence: u32,
    eos: TerminalId,
    error: TerminalId,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            terminals_by_name: BTreeMap::new(),
            terminals: Vec::new(),
            non_terminals_by_name: BTreeMap::new(),
            non_terminals: Vec::new(),
            next_precedence: 1,
            eos: TerminalId(0),
            error: TerminalId(0),
        };
        table.eos = table.intern_terminal("EOS");
        table.error = table.intern_terminal("ERROR");
        table
    }

    pub fn eos(&self) -> TerminalId {
        self.eos
    }

    pub fn error_terminal(&self) -> TerminalId {
        self.error
    }

    /// Returns the existing id for `name`, interning it as a terminal if it
    /// has not been seen before (discovery, as opposed to explicit
    /// declaration via `declare_terminal`).
    pub fn intern_terminal(&mut self, name: &str) -> TerminalId {
        if let Some(id) = self.terminals_by_name.get(name) {
            return *id;
        }
        let id = TerminalId(self.terminals.len() as u32);
        self.terminals.push(TerminalData {
            name: name.to_string(),
            precedence: PrecedenceLevel::default(),
        });
        self.terminals_by_name.insert(name.to_string(), id);
        id
    }

    pub fn intern_non_terminal(&mut self, name: &str) -> NonTerminalId {
        if let Some(id) = self.non_terminals_by_name.get(name) {
            return *id;
        }
        let id = NonTerminalId(self.non_terminals.len() as u32);
        self.non_terminals.push(NonTerminalData {
            name: name.to_string(),
        });
        self.non_terminals_by_name.insert(name.to_string(), id);
        id
    }

    pub fn terminal_id(&self, name: &str) -> Option<TerminalId> {
        self.terminals_by_name.get(name).copied()
    }

    pub fn non_terminal_id(&self, name: &str) -> Option<NonTerminalId> {
        self.non_terminals_by_name.get(name).copied()
    }

    pub fn terminal_name(&self, id: TerminalId) -> &str {
        &self.terminals[id.0 as usize].name
    }

    pub fn non_terminal_name(&self, id: NonTerminalId) -> &str {
        &self.non_terminals[id.0 as usize].name
    }

    pub fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    pub fn non_terminal_count(&self) -> usize {
        self.non_terminals.len()
    }

    pub fn terminal_ids(&self) -> impl Iterator<Item = TerminalId> {
        (0..self.terminals.len() as u32).map(TerminalId)
    }

    pub fn non_terminal_ids(&self) -> impl Iterator<Item = NonTerminalId> {
        (0..self.non_terminals.len() as u32).map(NonTerminalId)
    }

    pub fn precedence_of(&self, id: TerminalId) -> PrecedenceLevel {
        self.terminals[id.0 as usize].precedence
    }

    pub fn set_precedence(&mut self, id: TerminalId, precedence: PrecedenceLevel) {
        self.terminals[id.0 as usize].precedence = precedence;
    }

    /// Allocates the next precedence level and assigns it, with `assoc`, to
    /// every named terminal (interning names not yet seen). Used by
    /// `GrammarBuilder::left/right/nonassoc`.
    pub fn declare_precedence(&mut self, assoc: Associativity, names: &[&str]) {
        let level = self.next_precedence;
        self.next_precedence += 1;
        for name in names {
            let id = self.intern_terminal(name);
            self.set_precedence(id, PrecedenceLevel::new(level, assoc));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut table = SymbolTable::new();
        let a = table.intern_terminal("NUM");
        let b = table.intern_terminal("NUM");
        assert_eq!(a, b);
    }

    #[test]
    fn later_precedence_declarations_outrank_earlier_ones() {
        let mut table = SymbolTable::new();
        table.declare_precedence(Associativity::Left, &["PLS"]);
        table.declare_precedence(Associativity::Right, &["MUL"]);
        let pls = table.terminal_id("PLS").unwrap();
        let mul = table.terminal_id("MUL").unwrap();
        assert!(table.precedence_of(mul).level() > table.precedence_of(pls).level());
    }

    #[test]
    fn eos_and_error_are_reserved_and_distinct() {
        let table = SymbolTable::new();
        assert_ne!(table.eos(), table.error_terminal());
        assert_eq!(table.terminal_name(table.eos()), "EOS");
        assert_eq!(table.terminal_name(table.error_terminal()), "ERROR");
    }
}
