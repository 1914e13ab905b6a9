// Copyright 2024 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Canonical LR(0)/LALR(1) collection construction (SPEC_FULL.md §4.C, §4.D).
//!
//! Grounded on `alap_gen_ng::grammar::Grammar::try_from`'s state-discovery
//! loop and `alap_gen_ng::state::ParserState`'s `needs_reprocessing`/
//! `merge_lookahead_sets` pair: a new goto target is compared against every
//! existing state's *kernel* (lookahead-blind); an equal kernel merges
//! lookahead sets into the existing state and marks it for reprocessing
//! instead of allocating a new one. The fixed point is reached once no state
//! is newly created or marked for reprocessing — the equivalent-state-merge
//! formulation SPEC_FULL.md §4.D.1 selects over textbook two-pass DeRemer–
//! Pennello.

use crate::analysis::CfgAnalysis;
use crate::grammar::Rule;
use crate::item::{closure, ItemKey, ItemSet};
use crate::symbol::{Symbol, SymbolTable, TerminalId};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// One canonical LR(0) item set, tagged with a dense state id.
#[derive(Debug, Clone)]
pub struct LrState {
    pub id: u32,
    kernel: BTreeSet<ItemKey>,
    pub items: ItemSet,
    needs_reprocessing: bool,
    ever_processed: bool,
}

impl LrState {
    pub fn kernel(&self) -> &BTreeSet<ItemKey> {
        &self.kernel
    }
}

/// The canonical collection plus the shift/goto edges discovered while
/// building it. Edges are keyed by `(state_id, Symbol)` regardless of
/// whether `Symbol` is a terminal (a shift) or nonterminal (a goto) —
/// `table.rs` splits them back out when it builds `ActionTable`/`GotoTable`.
pub struct CanonicalCollection {
    pub states: Vec<LrState>,
    pub edges: BTreeMap<(u32, Symbol), u32>,
}

impl CanonicalCollection {
    pub fn state(&self, id: u32) -> &LrState {
        &self.states[id as usize]
    }
}

/// Builds the canonical collection starting from
/// `closure({augmented_production → • start EOS}, lookahead = {EOS})`.
///
/// `analysis` is `None` for LR(0) tables (SPEC_FULL.md §4.D "if the user
/// selects LR(0) tables, skip this stage"): every item's lookahead becomes
/// the full terminal set, so every reducible item fires on every terminal.
pub fn build(
    rules: &[Rule],
    symbols: &SymbolTable,
    analysis: Option<&CfgAnalysis>,
    augmented_production_id: u32,
    eos: TerminalId,
) -> CanonicalCollection {
    let all_terminals: BTreeSet<TerminalId> = symbols.terminal_ids().collect();

    let mut seed = ItemSet::new();
    let mut start_lookahead = BTreeSet::new();
    start_lookahead.insert(eos);
    seed.merge_lookahead(ItemKey::start(augmented_production_id), &start_lookahead);
    let start_items = closure(seed, rules, analysis, &all_terminals);
    let start_kernel = start_items.kernel_keys(rules, augmented_production_id);

    let mut collection = CanonicalCollection {
        states: vec![LrState {
            id: 0,
            kernel: start_kernel,
            items: start_items,
            needs_reprocessing: false,
            ever_processed: false,
        }],
        edges: BTreeMap::new(),
    };

    loop {
        let index = collection
            .states
            .iter()
            .position(|s| !s.ever_processed || s.needs_reprocessing);
        let index = match index {
            Some(i) => i,
            None => break,
        };

        let first_time = !collection.states[index].needs_reprocessing;
        collection.states[index].needs_reprocessing = false;
        collection.states[index].ever_processed = true;
        let state_id = collection.states[index].id;
        let items_snapshot = collection.states[index].items.clone();
        debug!("processing state {state_id} (first_time={first_time})");

        for symbol in items_snapshot.shiftable_symbols(rules) {
            let kernel_x = items_snapshot.goto_kernel(rules, &symbol);
            let item_set_x = closure(kernel_x, rules, analysis, &all_terminals);
            let kernel_keys_x = item_set_x.kernel_keys(rules, augmented_production_id);

            let existing = collection.states.iter().position(|s| s.kernel == kernel_keys_x);
            let goto_id = match existing {
                Some(idx) => {
                    let mut changed = false;
                    for (key, lookahead) in item_set_x.iter() {
                        changed |= collection.states[idx].items.merge_lookahead(*key, lookahead);
                    }
                    if changed {
                        collection.states[idx].needs_reprocessing = true;
                        debug!("state {} gained lookaheads, marked for reprocessing", collection.states[idx].id);
                    }
                    collection.states[idx].id
                }
                None => {
                    let new_id = collection.states.len() as u32;
                    debug!("discovered new state {new_id} via goto on {symbol:?}");
                    collection.states.push(LrState {
                        id: new_id,
                        kernel: kernel_keys_x,
                        items: item_set_x,
                        needs_reprocessing: false,
                        ever_processed: false,
                    });
                    new_id
                }
            };

            if first_time {
                collection.edges.insert((state_id, symbol), goto_id);
            }
        }
    }

    collection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;

    fn rule(id: u32, lhs: crate::symbol::NonTerminalId, rhs: Vec<Symbol>) -> Rule {
        Rule {
            id,
            lhs,
            rhs,
            precedence: None,
        }
    }

    #[test]
    fn single_rule_grammar_has_three_states() {
        // s' -> e EOS ; e -> NUM
        let mut symbols = SymbolTable::new();
        let num = symbols.intern_terminal("NUM");
        let e = symbols.intern_non_terminal("e");
        let start = symbols.intern_non_terminal("s'");
        let eos = symbols.eos();
        let rules = vec![
            rule(0, start, vec![Symbol::NonTerminal(e), Symbol::Terminal(eos)]),
            rule(1, e, vec![Symbol::Terminal(num)]),
        ];
        let analysis = CfgAnalysis::compute(&symbols, &rules, start, eos);
        let collection = build(&rules, &symbols, Some(&analysis), 0, eos);
        // state 0 (start), state after shifting NUM, state after reducing to e,
        // state after shifting EOS (accept).
        assert_eq!(collection.states.len(), 4);
    }

    #[test]
    fn lr0_mode_gives_every_reducible_item_the_full_terminal_set() {
        let mut symbols = SymbolTable::new();
        let num = symbols.intern_terminal("NUM");
        let e = symbols.intern_non_terminal("e");
        let start = symbols.intern_non_terminal("s'");
        let eos = symbols.eos();
        let rules = vec![
            rule(0, start, vec![Symbol::NonTerminal(e), Symbol::Terminal(eos)]),
            rule(1, e, vec![Symbol::Terminal(num)]),
        ];
        let collection = build(&rules, &symbols, None, 0, eos);
        let reduce_state = collection
            .states
            .iter()
            .find(|s| s.items.lookahead(&ItemKey { production_id: 1, dot: 1 }).is_some())
            .unwrap();
        let lookahead = reduce_state.items.lookahead(&ItemKey { production_id: 1, dot: 1 }).unwrap();
        assert_eq!(lookahead.len(), symbols.terminal_count());
    }

    /// Rebuilding the canonical collection from the same rules twice must
    /// produce the same state count and the same kernel-to-id assignment
    /// (SPEC_FULL.md §8 invariant 1); `finalize()` is otherwise free to be
    /// called more than once against the same `GrammarBuilder` output (e.g.
    /// once to fingerprint, once to write a cache) and must not drift.
    #[test]
    fn rebuilding_the_same_grammar_twice_is_deterministic() {
        let mut symbols = SymbolTable::new();
        let pls = symbols.intern_terminal("PLS");
        let num = symbols.intern_terminal("NUM");
        let e = symbols.intern_non_terminal("e");
        let start = symbols.intern_non_terminal("s'");
        let eos = symbols.eos();
        let rules = vec![
            rule(0, start, vec![Symbol::NonTerminal(e), Symbol::Terminal(eos)]),
            rule(1, e, vec![Symbol::NonTerminal(e), Symbol::Terminal(pls), Symbol::NonTerminal(e)]),
            rule(2, e, vec![Symbol::Terminal(num)]),
        ];
        let analysis = CfgAnalysis::compute(&symbols, &rules, start, eos);
        let first = build(&rules, &symbols, Some(&analysis), 0, eos);
        let second = build(&rules, &symbols, Some(&analysis), 0, eos);

        assert_eq!(first.states.len(), second.states.len());
        for (a, b) in first.states.iter().zip(second.states.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.kernel, b.kernel);
        }
        assert_eq!(first.edges, second.edges);
    }
}
