// Copyright 2024 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! `ActionTable`/`GotoTable` construction and conflict resolution
//! (SPEC_FULL.md §4.E).
//!
//! Grounded on `src/state.rs`/`alap_gen_ng::state::ParserState`'s
//! `resolve_shift_reduce_conflicts`/`resolve_reduce_reduce_conflicts` for
//! the overall shape (compare a proposed shift against every proposed
//! reduce on the same terminal; precedence/associativity decides the
//! winner). Unlike the teacher, which defaults an unresolved conflict to
//! "favour shift" and only *also* records it, this builder retains every
//! competing action in the cell when resolution fails — SPEC_FULL.md §4.F
//! requires the full conflict list to survive into the GLR runtime so it
//! can fork over every alternative, not just the teacher's single
//! preferred action.

use crate::grammar::Rule;
use crate::lalr::CanonicalCollection;
use crate::symbol::{Associativity, NonTerminalId, Symbol, SymbolTable, TerminalId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One action a state may take on a terminal. A cell holding more than one
/// is a retained conflict (SPEC_FULL.md §3 `ActionTable`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Shift(u32),
    Reduce(u32),
    Accept,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTable(BTreeMap<(u32, TerminalId), Vec<Action>>);

impl ActionTable {
    pub fn get(&self, state: u32, terminal: TerminalId) -> &[Action] {
        self.0.get(&(state, terminal)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_conflict(&self, state: u32, terminal: TerminalId) -> bool {
        self.get(state, terminal).len() > 1
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GotoTable(BTreeMap<(u32, NonTerminalId), u32>);

impl GotoTable {
    pub fn get(&self, state: u32, non_terminal: NonTerminalId) -> Option<u32> {
        self.0.get(&(state, non_terminal)).copied()
    }
}

/// A single participant in an unresolved conflict, as reported to the
/// caller (SPEC_FULL.md §7 "structured list").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    Shift(u32),
    Reduce(u32),
}

#[derive(Debug, Clone)]
pub struct ConflictEntry {
    pub state: u32,
    pub terminal: TerminalId,
    pub actions: Vec<ConflictAction>,
}

#[derive(Debug, Default, Clone)]
pub struct ConflictReport {
    pub shift_reduce: Vec<ConflictEntry>,
    pub reduce_reduce: Vec<ConflictEntry>,
}

/// Builds `ActionTable`/`GotoTable` from the canonical collection and
/// resolves conflicts via precedence/associativity when `precedence_enabled`
/// (SPEC_FULL.md §4.E). Returns the tables plus a report of every conflict
/// that could not be resolved (and therefore survives, in full, in the
/// returned `ActionTable` for the GLR runtime to fork over).
pub fn build(
    collection: &CanonicalCollection,
    rules: &[Rule],
    symbols: &SymbolTable,
    augmented_lhs: NonTerminalId,
    precedence_enabled: bool,
) -> (ActionTable, GotoTable, ConflictReport) {
    let mut actions = ActionTable::default();
    let mut gotos = GotoTable::default();
    let eos = symbols.eos();

    for (&(state, symbol), &target) in collection.edges.iter() {
        match symbol {
            Symbol::Terminal(t) => actions.0.entry((state, t)).or_default().push(Action::Shift(target)),
            Symbol::NonTerminal(n) => {
                gotos.0.insert((state, n), target);
            }
        }
    }

    for lr_state in &collection.states {
        for (key, lookahead) in lr_state.items.iter() {
            let rule = &rules[key.production_id as usize];
            // The item just before the augmented rule's trailing EOS (`S' -> start . EOS`)
            // triggers Accept directly on shifting EOS, rather than shifting into a
            // completed state that would need a further (nonexistent) lookahead token
            // to fire a reduce on (SPEC_FULL.md §4.E "if A = S' propose Accept on EOS").
            if rule.lhs == augmented_lhs && key.dot == rule.rhs.len() - 1 {
                actions.0.insert((lr_state.id, eos), vec![Action::Accept]);
                continue;
            }
            if !key.is_reducible(rules) || rule.lhs == augmented_lhs {
                continue;
            }
            for &a in lookahead.iter() {
                actions.0.entry((lr_state.id, a)).or_default().push(Action::Reduce(key.production_id));
            }
        }
    }

    let mut conflicts = ConflictReport::default();
    let cells: Vec<(u32, TerminalId)> = actions.0.keys().copied().collect();
    for (state, terminal) in cells {
        resolve_cell(&mut actions, &mut conflicts, rules, symbols, state, terminal, precedence_enabled);
    }

    (actions, gotos, conflicts)
}

fn resolve_cell(
    actions: &mut ActionTable,
    conflicts: &mut ConflictReport,
    rules: &[Rule],
    symbols: &SymbolTable,
    state: u32,
    terminal: TerminalId,
    precedence_enabled: bool,
) {
    let raw = actions.0.get(&(state, terminal)).cloned().unwrap_or_default();
    let mut distinct: Vec<Action> = Vec::new();
    for action in raw {
        if !distinct.contains(&action) {
            distinct.push(action);
        }
    }
    if distinct.len() <= 1 {
        actions.0.insert((state, terminal), distinct);
        return;
    }

    let shift = distinct.iter().find_map(|a| match a {
        Action::Shift(s) => Some(*s),
        _ => None,
    });
    let reduces: Vec<u32> = distinct
        .iter()
        .filter_map(|a| match a {
            Action::Reduce(p) => Some(*p),
            _ => None,
        })
        .collect();
    let has_accept = distinct.iter().any(|a| matches!(a, Action::Accept));

    // Single shift vs single reduce: the only case SPEC_FULL.md §4.E's
    // precedence/associativity discipline resolves outright.
    if precedence_enabled && !has_accept && shift.is_some() && reduces.len() == 1 {
        let shift_state = shift.unwrap();
        let reduce_production = reduces[0];
        let shift_precedence = symbols.precedence_of(terminal);
        let reduce_precedence = rules[reduce_production as usize].resolved_precedence(symbols);
        if let (true, Some(reduce_precedence)) = (shift_precedence.is_set(), reduce_precedence) {
            let resolved = if shift_precedence.level() > reduce_precedence.level() {
                Some(vec![Action::Shift(shift_state)])
            } else if shift_precedence.level() < reduce_precedence.level() {
                Some(vec![Action::Reduce(reduce_production)])
            } else {
                match shift_precedence.associativity() {
                    Associativity::Left => Some(vec![Action::Reduce(reduce_production)]),
                    Associativity::Right => Some(vec![Action::Shift(shift_state)]),
                    Associativity::NonAssoc => Some(Vec::new()),
                }
            };
            if let Some(resolved) = resolved {
                if resolved.is_empty() {
                    actions.0.remove(&(state, terminal));
                } else {
                    actions.0.insert((state, terminal), resolved);
                }
                return;
            }
        }
    }

    // Unresolved: record the conflict and retain every participant so GLR
    // can fork over all of them (SPEC_FULL.md §4.F, §9 Open Question).
    let entry = ConflictEntry {
        state,
        terminal,
        actions: distinct
            .iter()
            .filter_map(|a| match a {
                Action::Shift(s) => Some(ConflictAction::Shift(*s)),
                Action::Reduce(p) => Some(ConflictAction::Reduce(*p)),
                Action::Accept => None,
            })
            .collect(),
    };
    if shift.is_some() && !reduces.is_empty() {
        conflicts.shift_reduce.push(entry);
    } else if reduces.len() > 1 {
        conflicts.reduce_reduce.push(entry);
    }
    actions.0.insert((state, terminal), distinct);
}

/// A human-readable dump of every state's items, actions, gotos, and
/// conflicts, in the style of `alap_gen_ng::Grammar::write_description`
/// (SPEC_FULL.md §4.E "optionally emits a human-readable explanation").
pub fn explain(collection: &CanonicalCollection, rules: &[Rule], symbols: &SymbolTable) -> String {
    let mut out = String::new();
    out.push_str("Productions:\n");
    for (id, rule) in rules.iter().enumerate() {
        out.push_str(&format!("  {id}: {}\n", rule.describe_for_explain(symbols)));
    }
    for lr_state in &collection.states {
        out.push_str(&format!("\nState {}:\n", lr_state.id));
        for (key, lookahead) in lr_state.items.iter() {
            let la: Vec<&str> = lookahead.iter().map(|t| symbols.terminal_name(*t)).collect();
            out.push_str(&format!("  {}    {{{}}}\n", key.describe(rules, symbols), la.join(", ")));
        }
        for (&(s, symbol), &target) in collection.edges.iter() {
            if s != lr_state.id {
                continue;
            }
            match symbol {
                Symbol::Terminal(t) => out.push_str(&format!("  shift {} -> {target}\n", symbols.terminal_name(t))),
                Symbol::NonTerminal(n) => out.push_str(&format!("  goto {} -> {target}\n", symbols.non_terminal_name(n))),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::CfgAnalysis;
    use crate::symbol::{PrecedenceLevel, SymbolTable};

    fn rule(id: u32, lhs: NonTerminalId, rhs: Vec<Symbol>, precedence: Option<PrecedenceLevel>) -> Rule {
        Rule { id, lhs, rhs, precedence }
    }

    #[test]
    fn precedence_resolves_shift_reduce_in_favour_of_higher_level() {
        let mut symbols = SymbolTable::new();
        symbols.declare_precedence(Associativity::Left, &["PLS"]);
        symbols.declare_precedence(Associativity::Right, &["MUL"]);
        let pls = symbols.terminal_id("PLS").unwrap();
        let mul = symbols.terminal_id("MUL").unwrap();
        let num = symbols.intern_terminal("NUM");
        let e = symbols.intern_non_terminal("e");
        let start = symbols.intern_non_terminal("s'");
        let eos = symbols.eos();

        let rules = vec![
            rule(0, start, vec![Symbol::NonTerminal(e), Symbol::Terminal(eos)], None),
            rule(1, e, vec![Symbol::NonTerminal(e), Symbol::Terminal(pls), Symbol::NonTerminal(e)], None),
            rule(2, e, vec![Symbol::NonTerminal(e), Symbol::Terminal(mul), Symbol::NonTerminal(e)], None),
            rule(3, e, vec![Symbol::Terminal(num)], None),
        ];
        let analysis = CfgAnalysis::compute(&symbols, &rules, start, eos);
        let collection = crate::lalr::build(&rules, &symbols, Some(&analysis), 0, eos);
        let (actions, _gotos, conflicts) = build(&collection, &rules, &symbols, start, true);

        // find state reached after `e MUL e . ` with PLS lookahead: MUL outranks PLS so
        // that state's action on PLS must be Reduce, not Shift, and no conflict should
        // survive for it.
        let mul_reduce_state = collection
            .states
            .iter()
            .find(|s| {
                s.items.iter().any(|(k, _)| {
                    k.production_id == 2 && k.dot == 3
                })
            })
            .unwrap();
        let cell = actions.get(mul_reduce_state.id, pls);
        assert_eq!(cell, &[Action::Reduce(2)]);
        assert!(conflicts.shift_reduce.is_empty());
    }

    #[test]
    fn ambiguous_grammar_without_precedence_retains_all_actions() {
        let mut symbols = SymbolTable::new();
        let pls = symbols.intern_terminal("PLS");
        let num = symbols.intern_terminal("NUM");
        let e = symbols.intern_non_terminal("e");
        let start = symbols.intern_non_terminal("s'");
        let eos = symbols.eos();

        let rules = vec![
            rule(0, start, vec![Symbol::NonTerminal(e), Symbol::Terminal(eos)], None),
            rule(1, e, vec![Symbol::NonTerminal(e), Symbol::Terminal(pls), Symbol::NonTerminal(e)], None),
            rule(2, e, vec![Symbol::Terminal(num)], None),
        ];
        let analysis = CfgAnalysis::compute(&symbols, &rules, start, eos);
        let collection = crate::lalr::build(&rules, &symbols, Some(&analysis), 0, eos);
        let (actions, _gotos, conflicts) = build(&collection, &rules, &symbols, start, true);

        let ambiguous_state = collection
            .states
            .iter()
            .find(|s| s.items.iter().any(|(k, _)| k.production_id == 1 && k.dot == 3))
            .unwrap();
        let cell = actions.get(ambiguous_state.id, pls);
        assert_eq!(cell.len(), 2);
        assert_eq!(conflicts.shift_reduce.len(), 1);
    }

    /// LALR(1) narrows LR(0)'s universal "reduce on every terminal" down to
    /// FOLLOW-derived lookaheads; it must never propose a reduce on a
    /// `(state, terminal)` pair that LR(0) itself left empty (SPEC_FULL.md
    /// §8 invariant 2). Both builds share the same kernel partition (the
    /// canonical-collection merge keys on kernels, not lookaheads), so state
    /// ids line up between the two passes.
    #[test]
    fn lalr1_reduces_are_a_subset_of_lr0_reduces() {
        let mut symbols = SymbolTable::new();
        let pls = symbols.intern_terminal("PLS");
        let num = symbols.intern_terminal("NUM");
        let e = symbols.intern_non_terminal("e");
        let start = symbols.intern_non_terminal("s'");
        let eos = symbols.eos();

        let rules = vec![
            rule(0, start, vec![Symbol::NonTerminal(e), Symbol::Terminal(eos)], None),
            rule(1, e, vec![Symbol::NonTerminal(e), Symbol::Terminal(pls), Symbol::NonTerminal(e)], None),
            rule(2, e, vec![Symbol::Terminal(num)], None),
        ];
        let analysis = CfgAnalysis::compute(&symbols, &rules, start, eos);
        let lalr_collection = crate::lalr::build(&rules, &symbols, Some(&analysis), 0, eos);
        let lr0_collection = crate::lalr::build(&rules, &symbols, None, 0, eos);
        assert_eq!(lalr_collection.states.len(), lr0_collection.states.len());

        let (lalr_actions, _, _) = build(&lalr_collection, &rules, &symbols, start, false);
        let (lr0_actions, _, _) = build(&lr0_collection, &rules, &symbols, start, false);

        for state in 0..lalr_collection.states.len() as u32 {
            for &terminal in &[pls, num, eos] {
                let lalr_reduces: Vec<_> = lalr_actions.get(state, terminal).iter().filter(|a| matches!(a, Action::Reduce(_))).collect();
                let lr0_reduces: Vec<_> = lr0_actions.get(state, terminal).iter().filter(|a| matches!(a, Action::Reduce(_))).collect();
                for r in lalr_reduces {
                    assert!(lr0_reduces.contains(&r), "LALR(1) proposed {r:?} on (state {state}, terminal {terminal:?}) absent from LR(0)");
                }
            }
        }
    }
}
