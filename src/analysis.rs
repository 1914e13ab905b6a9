// Copyright 2024 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! FIRST/FOLLOW/nullable fixed-point computation, plus reachability and
//! productivity bookkeeping (SPEC_FULL.md §4.B, §3.1).
//!
//! This is the one module with no direct single-file teacher analog: the
//! teacher computes an equivalent "FIRST of the rhs tail, given a
//! look-ahead symbol" inline inside `alap_gen_ng::grammar::Grammar::closure`
//! (`TokenSet::first_all_caps`) rather than as a standalone FIRST/FOLLOW
//! table. This module makes that computation explicit and reusable so it
//! can also answer the component-B questions (reachability, productivity)
//! the teacher answers by a different route (its "is unused"/"is
//! undefined" flags on `Symbol`/`NonTerminal`).

use crate::grammar::Rule;
use crate::symbol::{NonTerminalId, Symbol, SymbolTable, TerminalId};
use std::collections::{BTreeMap, BTreeSet};

/// `FIRST(alpha)` for some sentential form `alpha`: a set of terminals plus
/// a flag recording whether `alpha` can derive the empty string.
#[derive(Debug, Clone, Default)]
pub struct FirstSet {
    pub terminals: BTreeSet<TerminalId>,
    pub nullable: bool,
}

impl FirstSet {
    fn union_terminals_from(&mut self, other: &BTreeSet<TerminalId>) -> bool {
        let before = self.terminals.len();
        self.terminals.extend(other.iter().copied());
        self.terminals.len() != before
    }
}

/// Per-nonterminal `nullable`/FIRST/FOLLOW sets for a fixed set of rules,
/// computed once and queried many times during table construction.
pub struct CfgAnalysis {
    nullable: BTreeSet<NonTerminalId>,
    first: BTreeMap<NonTerminalId, BTreeSet<TerminalId>>,
    follow: BTreeMap<NonTerminalId, BTreeSet<TerminalId>>,
}

impl CfgAnalysis {
    /// `start` and `eos` seed `FOLLOW(start) ⊇ {eos}` per SPEC_FULL.md §4.B;
    /// callers pass the grammar's *augmented* start production's lhs deriving
    /// `start EOS` so that this holds without a special case here.
    pub fn compute(symbols: &SymbolTable, rules: &[Rule], start: NonTerminalId, eos: TerminalId) -> Self {
        let mut analysis = Self {
            nullable: BTreeSet::new(),
            first: BTreeMap::new(),
            follow: BTreeMap::new(),
        };
        for id in symbols.non_terminal_ids() {
            analysis.first.insert(id, BTreeSet::new());
            analysis.follow.insert(id, BTreeSet::new());
        }
        analysis.follow.entry(start).or_default().insert(eos);
        analysis.fixed_point_nullable_and_first(rules);
        analysis.fixed_point_follow(rules);
        analysis
    }

    fn fixed_point_nullable_and_first(&mut self, rules: &[Rule]) {
        let mut changed = true;
        while changed {
            changed = false;
            for rule in rules {
                if rule.rhs.is_empty() {
                    changed |= self.nullable.insert(rule.lhs);
                    continue;
                }
                let mut rhs_nullable = true;
                let mut additions: BTreeSet<TerminalId> = BTreeSet::new();
                for symbol in &rule.rhs {
                    match symbol {
                        Symbol::Terminal(t) => {
                            additions.insert(*t);
                            rhs_nullable = false;
                            break;
                        }
                        Symbol::NonTerminal(n) => {
                            additions.extend(self.first.get(n).cloned().unwrap_or_default());
                            if !self.nullable.contains(n) {
                                rhs_nullable = false;
                                break;
                            }
                        }
                    }
                }
                let entry = self.first.entry(rule.lhs).or_default();
                let before = entry.len();
                entry.extend(additions);
                changed |= entry.len() != before;
                if rhs_nullable {
                    changed |= self.nullable.insert(rule.lhs);
                }
            }
        }
    }

    fn fixed_point_follow(&mut self, rules: &[Rule]) {
        let mut changed = true;
        while changed {
            changed = false;
            for rule in rules {
                for (index, symbol) in rule.rhs.iter().enumerate() {
                    let n = match symbol {
                        Symbol::NonTerminal(n) => *n,
                        Symbol::Terminal(_) => continue,
                    };
                    let tail = &rule.rhs[index + 1..];
                    let tail_first = self.first_of_sequence(tail);
                    let entry = self.follow.entry(n).or_default();
                    let before = entry.len();
                    entry.extend(tail_first.terminals.iter().copied());
                    let mut grew = entry.len() != before;
                    if tail_first.nullable {
                        let lhs_follow = self.follow.get(&rule.lhs).cloned().unwrap_or_default();
                        let entry = self.follow.entry(n).or_default();
                        let before = entry.len();
                        entry.extend(lhs_follow);
                        grew |= entry.len() != before;
                    }
                    changed |= grew;
                }
            }
        }
    }

    /// `FIRST(alpha)` for an arbitrary sentential form, per the recurrence in
    /// SPEC_FULL.md §4.B.
    pub fn first_of_sequence(&self, alpha: &[Symbol]) -> FirstSet {
        let mut result = FirstSet {
            terminals: BTreeSet::new(),
            nullable: true,
        };
        for symbol in alpha {
            match symbol {
                Symbol::Terminal(t) => {
                    result.terminals.insert(*t);
                    result.nullable = false;
                    break;
                }
                Symbol::NonTerminal(n) => {
                    let first_n = self.first.get(n).cloned().unwrap_or_default();
                    result.union_terminals_from(&first_n);
                    if !self.nullable.contains(n) {
                        result.nullable = false;
                        break;
                    }
                }
            }
        }
        result
    }

    pub fn is_nullable(&self, n: NonTerminalId) -> bool {
        self.nullable.contains(&n)
    }

    pub fn first(&self, n: NonTerminalId) -> &BTreeSet<TerminalId> {
        static EMPTY: BTreeSet<TerminalId> = BTreeSet::new();
        self.first.get(&n).unwrap_or(&EMPTY)
    }

    pub fn follow(&self, n: NonTerminalId) -> &BTreeSet<TerminalId> {
        static EMPTY: BTreeSet<TerminalId> = BTreeSet::new();
        self.follow.get(&n).unwrap_or(&EMPTY)
    }
}

/// Nonterminals reachable from `start` by walking productions (SPEC_FULL.md
/// §3.1). Not fatal when incomplete — only used to emit warnings.
pub fn reachable_non_terminals(rules: &[Rule], start: NonTerminalId) -> BTreeSet<NonTerminalId> {
    let mut reachable = BTreeSet::new();
    let mut worklist = vec![start];
    reachable.insert(start);
    while let Some(n) = worklist.pop() {
        for rule in rules.iter().filter(|r| r.lhs == n) {
            for symbol in &rule.rhs {
                if let Symbol::NonTerminal(m) = symbol {
                    if reachable.insert(*m) {
                        worklist.push(*m);
                    }
                }
            }
        }
    }
    reachable
}

/// Nonterminals that derive some finite terminal string (SPEC_FULL.md §3.1).
/// A nonterminal is productive if it has a production whose rhs consists
/// entirely of terminals and already-known-productive nonterminals.
pub fn productive_non_terminals(rules: &[Rule]) -> BTreeSet<NonTerminalId> {
    let mut productive = BTreeSet::new();
    let mut changed = true;
    while changed {
        changed = false;
        for rule in rules {
            if productive.contains(&rule.lhs) {
                continue;
            }
            let ok = rule.rhs.iter().all(|s| match s {
                Symbol::Terminal(_) => true,
                Symbol::NonTerminal(n) => productive.contains(n),
            });
            if ok {
                productive.insert(rule.lhs);
                changed = true;
            }
        }
    }
    productive
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;

    fn rule(id: u32, lhs: NonTerminalId, rhs: Vec<Symbol>) -> Rule {
        Rule {
            id,
            lhs,
            rhs,
            precedence: None,
        }
    }

    #[test]
    fn nullable_and_first_for_simple_list_grammar() {
        // list -> ; list -> NUM list
        let mut symbols = SymbolTable::new();
        let num = symbols.intern_terminal("NUM");
        let list = symbols.intern_non_terminal("list");
        let rules = vec![
            rule(0, list, vec![]),
            rule(1, list, vec![Symbol::Terminal(num), Symbol::NonTerminal(list)]),
        ];
        let analysis = CfgAnalysis::compute(&symbols, &rules, list, symbols.eos());
        assert!(analysis.is_nullable(list));
        assert!(analysis.first(list).contains(&num));
    }

    #[test]
    fn follow_of_start_contains_eos() {
        let mut symbols = SymbolTable::new();
        let num = symbols.intern_terminal("NUM");
        let e = symbols.intern_non_terminal("e");
        let rules = vec![rule(0, e, vec![Symbol::Terminal(num)])];
        let analysis = CfgAnalysis::compute(&symbols, &rules, e, symbols.eos());
        assert!(analysis.follow(e).contains(&symbols.eos()));
    }

    #[test]
    fn reachability_excludes_unused_nonterminals() {
        let mut symbols = SymbolTable::new();
        let num = symbols.intern_terminal("NUM");
        let e = symbols.intern_non_terminal("e");
        let dead = symbols.intern_non_terminal("dead");
        let rules = vec![
            rule(0, e, vec![Symbol::Terminal(num)]),
            rule(1, dead, vec![Symbol::NonTerminal(dead)]),
        ];
        let reachable = reachable_non_terminals(&rules, e);
        assert!(reachable.contains(&e));
        assert!(!reachable.contains(&dead));
    }

    #[test]
    fn productivity_rejects_purely_self_recursive_nonterminals() {
        let mut symbols = SymbolTable::new();
        let dead = symbols.intern_non_terminal("dead");
        let rules = vec![rule(0, dead, vec![Symbol::NonTerminal(dead)])];
        let productive = productive_non_terminals(&rules);
        assert!(!productive.contains(&dead));
    }
}
