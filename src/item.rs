// Copyright 2024 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! LR(0)/LALR(1) items and item sets: `(production_id, dot_position)` plus a
//! lookahead set, and the closure/goto operations over them (SPEC_FULL.md
//! §3, §4.C).
//!
//! Grounded on `alap_gen_ng::production::{GrammarItemKey, GrammarItemSet}`,
//! adapted from that module's `Rc`-shared `Production` handles to plain
//! `production_id: u32` indices into a flat `&[Rule]` slice — our `Rule` is
//! small and `Copy`-ish, so there is no sharing to economize on the way the
//! teacher's heavier `ProductionTail` (predicate/action strings) needs.

use crate::analysis::CfgAnalysis;
use crate::grammar::Rule;
use crate::symbol::{NonTerminalId, Symbol, TerminalId};
use std::collections::{BTreeMap, BTreeSet};

/// `(production_id, dot_position)`. `dot_position` ranges over
/// `[0, rhs.len()]` inclusive; `rhs.len()` marks a reducible item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    pub production_id: u32,
    pub dot: usize,
}

impl ItemKey {
    pub fn start(production_id: u32) -> Self {
        Self { production_id, dot: 0 }
    }

    pub fn shifted(&self) -> Self {
        Self {
            production_id: self.production_id,
            dot: self.dot + 1,
        }
    }

    pub fn next_symbol<'a>(&self, rules: &'a [Rule]) -> Option<&'a Symbol> {
        rules[self.production_id as usize].rhs.get(self.dot)
    }

    pub fn next_symbol_is(&self, rules: &[Rule], symbol: &Symbol) -> bool {
        self.next_symbol(rules) == Some(symbol)
    }

    pub fn is_closable(&self, rules: &[Rule]) -> bool {
        matches!(self.next_symbol(rules), Some(Symbol::NonTerminal(_)))
    }

    pub fn is_reducible(&self, rules: &[Rule]) -> bool {
        self.dot >= rules[self.production_id as usize].rhs.len()
    }

    /// A kernel item is either the augmented start item or one with a
    /// non-zero dot (SPEC_FULL.md §3 `State`): items created purely by
    /// closure never define a state's identity.
    pub fn is_kernel_item(&self, rules: &[Rule], augmented_production_id: u32) -> bool {
        self.dot > 0 || self.production_id == augmented_production_id
    }

    pub fn rhs_tail<'a>(&self, rules: &'a [Rule]) -> &'a [Symbol] {
        &rules[self.production_id as usize].rhs[self.dot + 1..]
    }

    pub fn describe(&self, rules: &[Rule], symbols: &crate::symbol::SymbolTable) -> String {
        let rule = &rules[self.production_id as usize];
        let mut s = format!("{}:", symbols.non_terminal_name(rule.lhs));
        if rule.rhs.is_empty() {
            s.push_str(" . <empty>");
        } else {
            for (index, symbol) in rule.rhs.iter().enumerate() {
                if index == self.dot {
                    s.push_str(" .");
                }
                s.push(' ');
                match symbol {
                    Symbol::Terminal(t) => s.push_str(symbols.terminal_name(*t)),
                    Symbol::NonTerminal(n) => s.push_str(symbols.non_terminal_name(*n)),
                }
            }
            if self.dot >= rule.rhs.len() {
                s.push_str(" .");
            }
        }
        s
    }
}

/// A set of items, each carrying its own lookahead set. Kept sorted by
/// `ItemKey` (via `BTreeMap`) so two item sets built from the same inputs in
/// any order compare equal and iterate in the same order (SPEC_FULL.md §4.C
/// determinism requirement).
#[derive(Debug, Clone, Default)]
pub struct ItemSet(BTreeMap<ItemKey, BTreeSet<TerminalId>>);

impl ItemSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemKey, &BTreeSet<TerminalId>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn lookahead(&self, key: &ItemKey) -> Option<&BTreeSet<TerminalId>> {
        self.0.get(key)
    }

    /// Inserts `lookahead` into the set for `key`, creating the entry if
    /// absent. Returns whether the lookahead set grew (used to drive
    /// fixed-point loops in `lalr.rs`).
    pub fn merge_lookahead(&mut self, key: ItemKey, lookahead: &BTreeSet<TerminalId>) -> bool {
        let entry = self.0.entry(key).or_default();
        let before = entry.len();
        entry.extend(lookahead.iter().copied());
        entry.len() != before
    }

    pub fn kernel_keys(&self, rules: &[Rule], augmented_production_id: u32) -> BTreeSet<ItemKey> {
        self.0
            .keys()
            .filter(|k| k.is_kernel_item(rules, augmented_production_id))
            .copied()
            .collect()
    }

    pub fn reducible_keys(&self, rules: &[Rule]) -> BTreeSet<ItemKey> {
        self.0.keys().filter(|k| k.is_reducible(rules)).copied().collect()
    }

    /// All symbols that appear immediately after the dot in some item —
    /// the set of `X` for which `goto(self, X)` is nonempty.
    pub fn shiftable_symbols(&self, rules: &[Rule]) -> BTreeSet<Symbol> {
        self.0.keys().filter_map(|k| k.next_symbol(rules).copied()).collect()
    }

    /// The kernel of `goto(self, symbol)`: every item whose dot sits just
    /// before `symbol`, shifted one place, carrying its item's lookahead
    /// set forward unchanged (closure refines it further in the new state).
    pub fn goto_kernel(&self, rules: &[Rule], symbol: &Symbol) -> ItemSet {
        let mut out = BTreeMap::new();
        for (key, lookahead) in self.0.iter() {
            if key.next_symbol_is(rules, symbol) {
                out.insert(key.shifted(), lookahead.clone());
            }
        }
        ItemSet(out)
    }
}

/// Computes `closure(I)`: repeatedly, for each item `A → α • B β` with
/// lookahead set `L`, and each production `B → γ`, adds `B → • γ` with
/// lookahead `FIRST(β) ∪ (L if β is nullable)` (SPEC_FULL.md §4.C, §4.D).
/// In LR(0) mode (`analysis` is `None`) every item's lookahead set is the
/// full terminal set, which degrades the table builder's per-terminal
/// lookahead filtering into "reduce on every terminal" as required by
/// SPEC_FULL.md §4.D's "skip this stage" clause.
pub fn closure(mut items: ItemSet, rules: &[Rule], analysis: Option<&CfgAnalysis>, all_terminals: &BTreeSet<TerminalId>) -> ItemSet {
    loop {
        let mut additions: Vec<(ItemKey, BTreeSet<TerminalId>)> = Vec::new();
        for (key, lookahead) in items.0.iter() {
            let b = match key.next_symbol(rules) {
                Some(Symbol::NonTerminal(n)) => *n,
                _ => continue,
            };
            let tail = key.rhs_tail(rules);
            let new_lookahead = match analysis {
                Some(analysis) => {
                    let tail_first = analysis.first_of_sequence(tail);
                    let mut set = tail_first.terminals;
                    if tail_first.nullable {
                        set.extend(lookahead.iter().copied());
                    }
                    set
                }
                None => all_terminals.clone(),
            };
            for (id, rule) in rules.iter().enumerate() {
                if rule.lhs == b {
                    additions.push((ItemKey::start(id as u32), new_lookahead.clone()));
                }
            }
        }
        let mut changed = false;
        for (key, lookahead) in additions {
            changed |= items.merge_lookahead(key, &lookahead);
        }
        if !changed {
            return items;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Symbol, SymbolTable};

    fn rule(id: u32, lhs: NonTerminalId, rhs: Vec<Symbol>) -> Rule {
        Rule {
            id,
            lhs,
            rhs,
            precedence: None,
        }
    }

    #[test]
    fn closure_adds_productions_of_nonterminal_after_dot() {
        let mut symbols = SymbolTable::new();
        let num = symbols.intern_terminal("NUM");
        let s = symbols.intern_non_terminal("s");
        let e = symbols.intern_non_terminal("e");
        let eos = symbols.eos();
        let rules = vec![
            rule(0, s, vec![Symbol::NonTerminal(e), Symbol::Terminal(eos)]),
            rule(1, e, vec![Symbol::Terminal(num)]),
        ];
        let analysis = CfgAnalysis::compute(&symbols, &rules, s, eos);

        let mut seed = ItemSet::new();
        seed.merge_lookahead(ItemKey::start(0), &BTreeSet::new());
        let all: BTreeSet<TerminalId> = symbols.terminal_ids().collect();
        let closed = closure(seed, &rules, Some(&analysis), &all);

        assert!(closed.lookahead(&ItemKey::start(1)).is_some());
        let la = closed.lookahead(&ItemKey::start(1)).unwrap();
        assert!(la.contains(&eos));
    }

    #[test]
    fn goto_kernel_shifts_matching_items_only() {
        let mut symbols = SymbolTable::new();
        let num = symbols.intern_terminal("NUM");
        let e = symbols.intern_non_terminal("e");
        let rules = vec![rule(0, e, vec![Symbol::Terminal(num)])];
        let mut items = ItemSet::new();
        items.merge_lookahead(ItemKey::start(0), &BTreeSet::new());
        let kernel = items.goto_kernel(&rules, &Symbol::Terminal(num));
        assert!(kernel.lookahead(&ItemKey { production_id: 0, dot: 1 }).is_some());
    }
}
