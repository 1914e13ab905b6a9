// Copyright 2024 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Grammar definition surface: `GrammarBuilder`, the `rhs_string`
//! mini-parser, EBNF desugaring at definition time, and `finalize()`
//! orchestration (SPEC_FULL.md §4.A, §6).
//!
//! `Rule` deliberately duplicates the handful of `Production<V, E>` fields
//! that table construction (components B-E) needs, rather than making
//! `table.rs`/`lalr.rs`/`item.rs`/`analysis.rs` generic over `V, E`: those
//! modules build the same tables regardless of what a reducer synthesizes,
//! and keeping them non-generic is both simpler and avoids monomorphizing
//! the LALR(1) machinery once per caller value type. Only `runtime.rs`
//! (which actually calls reducers) touches `Production<V, E>` directly.
//! Grounded on `src/grammar.rs` (`ParserSpecification`) and
//! `alap_gen_ng::grammar::Specification`/`Grammar::try_from`.

use crate::analysis::CfgAnalysis;
use crate::ebnf::{synthesized_name, EbnfClause, EbnfOp};
use crate::error::{FinalizeError, FinalizeWarning};
use crate::item::ItemKey;
use crate::lalr;
use crate::production::{Production, Reducer};
use crate::symbol::{Associativity, NonTerminalId, PrecedenceLevel, Symbol, SymbolTable, TerminalId};
use crate::table::{ActionTable, ConflictReport, GotoTable};
use log::warn;
use std::collections::BTreeSet;

/// A grammar rule's table-construction-relevant shape: `id`, `lhs`, `rhs`,
/// and an optional explicit precedence override. Dense, contiguous ids,
/// `0` reserved for the augmented start production (SPEC_FULL.md §3).
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: u32,
    pub lhs: NonTerminalId,
    pub rhs: Vec<Symbol>,
    pub precedence: Option<PrecedenceLevel>,
}

impl Rule {
    /// Explicit override, else the precedence of the last terminal in
    /// `rhs`, else absent (SPEC_FULL.md §3 `Production`).
    pub fn resolved_precedence(&self, symbols: &SymbolTable) -> Option<PrecedenceLevel> {
        if let Some(p) = self.precedence {
            return Some(p);
        }
        for symbol in self.rhs.iter().rev() {
            if let Symbol::Terminal(t) = symbol {
                let p = symbols.precedence_of(*t);
                return if p.is_set() { Some(p) } else { None };
            }
        }
        None
    }

    /// One-line rendering used by `table::explain`'s production dump.
    pub fn describe_for_explain(&self, symbols: &SymbolTable) -> String {
        let mut s = format!("{} ->", symbols.non_terminal_name(self.lhs));
        if self.rhs.is_empty() {
            s.push_str(" <empty>");
        }
        for symbol in &self.rhs {
            s.push(' ');
            match symbol {
                Symbol::Terminal(t) => s.push_str(symbols.terminal_name(*t)),
                Symbol::NonTerminal(n) => s.push_str(symbols.non_terminal_name(*n)),
            }
        }
        s
    }
}

/// One token of an `rhs_string` pattern after EBNF suffix stripping.
enum RhsToken {
    Plain(String),
    Suffixed(String, EbnfOp),
}

fn tokenize_rhs(pattern: &str) -> Vec<RhsToken> {
    let mut tokens = Vec::new();
    for word in pattern.split_whitespace() {
        let mut chars = word.chars();
        if let Some(last) = word.chars().last() {
            if let Some(op) = EbnfOp::from_suffix(last) {
                chars.next_back();
                tokens.push(RhsToken::Suffixed(chars.as_str().to_string(), op));
                continue;
            }
        }
        tokens.push(RhsToken::Plain(word.to_string()));
    }
    tokens
}

fn is_terminal_name(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

/// Observes one synthesized EBNF production as it is inserted and supplies
/// the reducer that fires when it reduces, so the caller can shape an
/// aggregate value the way an ordinary hand-written production would
/// (SPEC_FULL.md §4.A, §9 "EBNF operator callback": "the callback must
/// observe both the base and recursive clauses so the caller can build
/// aggregate values"). Called once per synthesized clause, in insertion
/// order (base before recursive); when no observer is supplied,
/// `synthesize_ebnf` falls back to a trivial pass-through reducer that
/// never panics but also never aggregates (see its doc comment).
pub type EbnfObserver<'a, V, E> = dyn FnMut(&str, EbnfOp, EbnfClause, &[Symbol]) -> Reducer<V, E> + 'a;

/// Builder for a grammar's productions, terminals, and precedence
/// declarations. `V` is the value type synthesized by reducers; `E` is the
/// caller's opaque environment type threaded through every reduction.
pub struct GrammarBuilder<V, E> {
    symbols: SymbolTable,
    rules: Vec<Rule>,
    reducers: Vec<Reducer<V, E>>,
    start: Option<NonTerminalId>,
    defined_non_terminals: BTreeSet<NonTerminalId>,
    used_non_terminals: BTreeSet<NonTerminalId>,
    array_args: bool,
    synthesized: std::collections::BTreeMap<(String, EbnfOp), NonTerminalId>,
}

/// `explain`/`lookahead`/`precedence`/`use` knobs for `finalize()`
/// (SPEC_FULL.md §6 "Finalize options"), mirroring `ProductionTail`'s
/// optional-field builder pattern rather than a config file.
#[derive(Debug, Clone)]
pub struct FinalizeOptions {
    pub lookahead: Lookahead,
    pub precedence: bool,
    pub explain: Explain,
    pub cache_path: Option<std::path::PathBuf>,
}

impl Default for FinalizeOptions {
    fn default() -> Self {
        Self {
            lookahead: Lookahead::Lalr1,
            precedence: true,
            explain: Explain::Off,
            cache_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookahead {
    Lalr1,
    Lr0,
}

#[derive(Debug, Clone, Default)]
pub enum Explain {
    #[default]
    Off,
    Stdout,
    File(std::path::PathBuf),
}

/// Everything `finalize()` produces: the frozen symbol/production tables
/// plus the LALR(1)/LR(0) action and goto tables. `runtime.rs` is the only
/// consumer that also needs the reducers, so they travel alongside rather
/// than being folded into `ActionTable`/`GotoTable` themselves.
pub struct Grammar<V, E> {
    pub(crate) symbols: SymbolTable,
    pub(crate) rules: Vec<Rule>,
    pub(crate) productions: Vec<Production<V, E>>,
    pub(crate) start: NonTerminalId,
    pub(crate) augmented_production_id: u32,
    pub(crate) actions: ActionTable,
    pub(crate) gotos: GotoTable,
    pub(crate) conflicts: ConflictReport,
    pub(crate) fingerprint: u64,
    pub(crate) array_args: bool,
}

impl<V: Default, E> Default for GrammarBuilder<V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Default, E> GrammarBuilder<V, E> {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            rules: Vec::new(),
            reducers: Vec::new(),
            start: None,
            defined_non_terminals: BTreeSet::new(),
            used_non_terminals: BTreeSet::new(),
            array_args: false,
            synthesized: std::collections::BTreeMap::new(),
        }
    }

    /// Declares a terminal explicitly, optionally assigning it a precedence
    /// level and associativity in the same call (a convenience over calling
    /// `left`/`right`/`nonassoc` separately for a single-terminal level).
    pub fn terminal(&mut self, name: &str, precedence: Option<(Associativity, u32)>) -> TerminalId {
        let id = self.symbols.intern_terminal(name);
        if let Some((assoc, level)) = precedence {
            self.symbols.set_precedence(id, PrecedenceLevel::new(level, assoc));
        }
        id
    }

    pub fn left(&mut self, terms: &[&str]) {
        self.symbols.declare_precedence(Associativity::Left, terms);
    }

    pub fn right(&mut self, terms: &[&str]) {
        self.symbols.declare_precedence(Associativity::Right, terms);
    }

    pub fn nonassoc(&mut self, terms: &[&str]) {
        self.symbols.declare_precedence(Associativity::NonAssoc, terms);
    }

    pub fn start(&mut self, name: &str) {
        self.start = Some(self.symbols.intern_non_terminal(name));
    }

    /// Selects array-argument mode (SPEC_FULL.md §6). In the source this
    /// toggles whether a reducer sees its rhs values as named positional
    /// slots or as one ordinary array; `Reducer<V, E>`'s signature already
    /// always hands every reducer a `Vec<V>`, so this crate has only one
    /// calling convention and this flag has no effect on it. It is kept as
    /// a recorded, queryable setting (`Grammar::array_args`) purely so a
    /// grammar built to mirror a source-language spec round-trips the
    /// option rather than silently dropping it.
    pub fn array_args(&mut self) {
        self.array_args = true;
    }

    fn resolve_symbol(&mut self, name: &str, out: &mut Vec<Symbol>) {
        let symbol = if is_terminal_name(name) {
            Symbol::Terminal(self.symbols.intern_terminal(name))
        } else {
            let id = self.symbols.intern_non_terminal(name);
            self.used_non_terminals.insert(id);
            Symbol::NonTerminal(id)
        };
        out.push(symbol);
    }

    /// Parses an `rhs_string` (whitespace-separated symbols, each uppercase
    /// ⇒ terminal, lowercase ⇒ nonterminal, optionally suffixed with `*`,
    /// `+`, `?`), desugaring EBNF suffixes into synthesized nonterminals and
    /// their own productions (SPEC_FULL.md §4.A). `observer` is called once
    /// per synthesized production as it is inserted.
    fn parse_rhs(&mut self, pattern: &str, mut observer: Option<&mut EbnfObserver<V, E>>) -> Vec<Symbol> {
        let mut rhs = Vec::new();
        for token in tokenize_rhs(pattern) {
            match token {
                RhsToken::Plain(name) => self.resolve_symbol(&name, &mut rhs),
                RhsToken::Suffixed(base, op) => {
                    let base_symbol = if is_terminal_name(&base) {
                        Symbol::Terminal(self.symbols.intern_terminal(&base))
                    } else {
                        let id = self.symbols.intern_non_terminal(&base);
                        self.used_non_terminals.insert(id);
                        Symbol::NonTerminal(id)
                    };
                    let synthesized = self.synthesize_ebnf(&base, op, base_symbol, &mut observer);
                    self.used_non_terminals.insert(synthesized);
                    rhs.push(Symbol::NonTerminal(synthesized));
                }
            }
        }
        rhs
    }

    /// Inserts the one or two productions a given EBNF operator needs for
    /// `base_name`, in base-then-recursive order, asking `observer` (if
    /// present) for each clause's reducer as it goes; falls back to
    /// `default_ebnf_reducer` when no observer is supplied.
    fn synthesize_ebnf(
        &mut self,
        base_name: &str,
        op: EbnfOp,
        base_symbol: Symbol,
        observer: &mut Option<&mut EbnfObserver<V, E>>,
    ) -> NonTerminalId {
        let key = (base_name.to_string(), op);
        if let Some(id) = self.synthesized.get(&key) {
            return *id;
        }
        let name = synthesized_name(base_name, op);
        let id = self.symbols.intern_non_terminal(&name);
        self.synthesized.insert(key, id);
        self.defined_non_terminals.insert(id);

        let emit_clause = |this: &mut Self, which: EbnfClause, rhs: Vec<Symbol>, observer: &mut Option<&mut EbnfObserver<V, E>>| {
            let reducer = match observer {
                Some(observer) => observer(&name, op, which, &rhs),
                None => default_ebnf_reducer(),
            };
            this.insert_rule(id, rhs, None, reducer);
        };

        match op {
            EbnfOp::Star => {
                emit_clause(self, EbnfClause::Base, vec![], observer);
                emit_clause(self, EbnfClause::Recursive, vec![base_symbol, Symbol::NonTerminal(id)], observer);
            }
            EbnfOp::Plus => {
                emit_clause(self, EbnfClause::Base, vec![base_symbol], observer);
                emit_clause(self, EbnfClause::Recursive, vec![base_symbol, Symbol::NonTerminal(id)], observer);
            }
            EbnfOp::Opt => {
                emit_clause(self, EbnfClause::Base, vec![], observer);
                emit_clause(self, EbnfClause::Recursive, vec![base_symbol], observer);
            }
        }
        id
    }

    fn insert_rule(&mut self, lhs: NonTerminalId, rhs: Vec<Symbol>, precedence: Option<PrecedenceLevel>, reducer: Reducer<V, E>) -> u32 {
        let id = self.rules.len() as u32 + 1; // id 0 is reserved for the augmented start rule
        self.rules.push(Rule { id, lhs, rhs, precedence });
        self.reducers.push(reducer);
        id
    }

    /// Defines one production `lhs -> rhs_pattern`, with an optional
    /// explicit precedence override and the reducer fired when it reduces.
    /// EBNF suffixes in `rhs_pattern` are desugared as a side effect, using
    /// `default_ebnf_reducer` for each synthesized clause; pass an observer
    /// via `production_with_observer` to supply real aggregation reducers
    /// for those clauses instead.
    pub fn production(
        &mut self,
        lhs: &str,
        rhs_pattern: &str,
        precedence: Option<(Associativity, u32)>,
        reducer: Reducer<V, E>,
    ) -> u32 {
        self.production_with_observer(lhs, rhs_pattern, precedence, reducer, None)
    }

    pub fn production_with_observer(
        &mut self,
        lhs: &str,
        rhs_pattern: &str,
        precedence: Option<(Associativity, u32)>,
        reducer: Reducer<V, E>,
        observer: Option<&mut EbnfObserver<V, E>>,
    ) -> u32 {
        let lhs_id = self.symbols.intern_non_terminal(lhs);
        self.defined_non_terminals.insert(lhs_id);
        let rhs = self.parse_rhs(rhs_pattern, observer);
        let explicit = precedence.map(|(assoc, level)| PrecedenceLevel::new(level, assoc));
        self.insert_rule(lhs_id, rhs, explicit, reducer)
    }

    /// Freezes the grammar: validates that every referenced nonterminal is
    /// defined, computes CFG analysis, builds the canonical collection, and
    /// resolves conflicts into an `ActionTable`/`GotoTable` pair
    /// (SPEC_FULL.md §4, control flow A → B → C → D → E).
    pub fn finalize(mut self, options: FinalizeOptions) -> Result<Grammar<V, E>, FinalizeError> {
        let start = self.start.ok_or(FinalizeError::NoStartSymbol)?;

        let mut undefined = Vec::new();
        for &used in self.used_non_terminals.iter() {
            if !self.defined_non_terminals.contains(&used) {
                undefined.push(self.symbols.non_terminal_name(used).to_string());
            }
        }
        if !undefined.is_empty() {
            return Err(FinalizeError::UndefinedNonTerminal(undefined));
        }

        let eos = self.symbols.eos();
        let augmented_lhs = self.symbols.intern_non_terminal("__start");
        let augmented_rule = Rule {
            id: 0,
            lhs: augmented_lhs,
            rhs: vec![Symbol::NonTerminal(start), Symbol::Terminal(eos)],
            precedence: None,
        };
        let mut rules = vec![augmented_rule];
        rules.extend(self.rules.drain(..));
        let mut productions = Vec::with_capacity(self.reducers.len() + 1);
        productions.push(Production::new(0, augmented_lhs, rules[0].rhs.clone(), None, no_reducer()));
        for (rule, reducer) in rules.iter().skip(1).zip(self.reducers.drain(..)) {
            productions.push(Production::new(rule.id, rule.lhs, rule.rhs.clone(), rule.precedence, reducer));
        }

        let all_non_terminals: BTreeSet<NonTerminalId> = self.symbols.non_terminal_ids().collect();
        let reachable = crate::analysis::reachable_non_terminals(&rules, augmented_lhs);
        let productive = crate::analysis::productive_non_terminals(&rules);
        for &n in all_non_terminals.iter() {
            if n == augmented_lhs {
                continue;
            }
            if !reachable.contains(&n) {
                warn!("nonterminal \"{}\" is unreachable from the start symbol", self.symbols.non_terminal_name(n));
            } else if !productive.contains(&n) {
                warn!("nonterminal \"{}\" is unproductive", self.symbols.non_terminal_name(n));
            }
        }
        for t in self.symbols.terminal_ids() {
            let used = rules.iter().any(|r| r.rhs.contains(&Symbol::Terminal(t)));
            let name = self.symbols.terminal_name(t);
            if !used && name != "EOS" && name != "ERROR" {
                warn!("terminal \"{}\" is unused", name);
            }
        }

        let fingerprint = crate::serialize::fingerprint(&self.symbols, &rules, &options);

        let cached = options
            .cache_path
            .as_deref()
            .and_then(|path| crate::serialize::load(path, fingerprint).ok().flatten());

        let (actions, gotos, conflicts) = if let Some((actions, gotos)) = cached {
            // SPEC_FULL.md §4.H: fingerprints match, skip stages C-E entirely.
            (actions, gotos, ConflictReport::default())
        } else {
            let analysis = CfgAnalysis::compute(&self.symbols, &rules, augmented_lhs, eos);
            let analysis_ref = match options.lookahead {
                Lookahead::Lalr1 => Some(&analysis),
                Lookahead::Lr0 => None,
            };
            let collection = lalr::build(&rules, &self.symbols, analysis_ref, 0, eos);
            let (actions, gotos, conflicts) = crate::table::build(&collection, &rules, &self.symbols, augmented_lhs, options.precedence);

            if let Explain::Stdout = options.explain {
                println!("{}", crate::table::explain(&collection, &rules, &self.symbols));
            } else if let Explain::File(path) = &options.explain {
                let text = crate::table::explain(&collection, &rules, &self.symbols);
                let _ = std::fs::write(path, text);
            }

            if let Some(path) = options.cache_path.as_deref() {
                if let Err(e) = crate::serialize::write(path, fingerprint, &self.symbols, &rules, &actions, &gotos) {
                    warn!("failed to write table cache {}: {e}", path.display());
                }
            }

            (actions, gotos, conflicts)
        };

        Ok(Grammar {
            symbols: self.symbols,
            rules,
            productions,
            start,
            augmented_production_id: 0,
            actions,
            gotos,
            conflicts,
            fingerprint,
            array_args: self.array_args,
        })
    }
}

fn no_reducer<V, E>() -> Reducer<V, E> {
    Box::new(|_, mut values, _| {
        values.pop().expect("synthesized productions are never reduced without at least one value in array_args-free grammars")
    })
}

/// The reducer `synthesize_ebnf` falls back to when `production`/
/// `production_with_observer` is called with no observer: the last rhs
/// value if there is one (`V::default()` for the zero-value `ε` clauses),
/// matching `Production::reduce`'s default-pass-through shape elsewhere in
/// this module. This does **not** aggregate a list on its own — a
/// recursive clause's tail value simply wins over its head, discarding it —
/// since `V` is an opaque caller value type this crate cannot generically
/// cons onto. Real list construction needs an observer supplying real
/// reducers (SPEC_FULL.md §9 "the callback must observe both the base and
/// recursive clauses so the caller can build aggregate values"); see
/// `lib.rs`'s `ebnf_plus_builds_a_vector_in_input_order` test.
fn default_ebnf_reducer<V: Default, E>() -> Reducer<V, E> {
    Box::new(|_, mut values, _| values.pop().unwrap_or_default())
}

impl<V, E> Grammar<V, E> {
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn conflicts(&self) -> &ConflictReport {
        &self.conflicts
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Whether `GrammarBuilder::array_args` was called before `finalize`
    /// (SPEC_FULL.md §6). See that method's doc comment for why this has
    /// no effect on how `runtime::parse` calls reducers.
    pub fn array_args(&self) -> bool {
        self.array_args
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    pub fn gotos(&self) -> &GotoTable {
        &self.gotos
    }

    pub fn productions(&self) -> &[Production<V, E>] {
        &self.productions
    }

    pub fn augmented_production_id(&self) -> u32 {
        self.augmented_production_id
    }

    pub(crate) fn start_item(&self) -> ItemKey {
        ItemKey::start(self.augmented_production_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_sum_grammar_finalizes_without_conflicts() {
        let mut builder: GrammarBuilder<i64, ()> = GrammarBuilder::new();
        builder.left(&["PLS"]);
        builder.production("e", "NUM", None, Box::new(|_, mut v, _| v.pop().unwrap()));
        builder.production(
            "e",
            "e PLS e",
            None,
            Box::new(|_, mut v, _| {
                let b = v.pop().unwrap();
                v.pop();
                let a = v.pop().unwrap();
                a + b
            }),
        );
        builder.start("e");
        let grammar = builder.finalize(FinalizeOptions::default()).unwrap();
        assert!(grammar.conflicts().shift_reduce.is_empty());
        assert!(grammar.conflicts().reduce_reduce.is_empty());
    }

    #[test]
    fn undefined_non_terminal_reference_is_a_finalize_error() {
        let mut builder: GrammarBuilder<i64, ()> = GrammarBuilder::new();
        builder.production("e", "stmt", None, Box::new(|_, mut v, _| v.pop().unwrap()));
        builder.start("e");
        let result = builder.finalize(FinalizeOptions::default());
        assert!(matches!(result, Err(FinalizeError::UndefinedNonTerminal(_))));
    }

    #[test]
    fn ebnf_plus_desugars_into_base_and_recursive_productions() {
        let mut builder: GrammarBuilder<Vec<i64>, ()> = GrammarBuilder::new();
        let mut seen = Vec::new();
        {
            let mut observer: Box<EbnfObserver<Vec<i64>, ()>> = Box::new(|name, op, which, rhs| {
                seen.push((name.to_string(), op, which, rhs.len()));
                match which {
                    EbnfClause::Base => Box::new(|_: &mut (), mut v: Vec<Vec<i64>>, _| v.pop().unwrap()),
                    EbnfClause::Recursive => Box::new(|_: &mut (), mut v: Vec<Vec<i64>>, _| {
                        let tail = v.pop().unwrap();
                        let head = v.pop().unwrap();
                        head.into_iter().chain(tail).collect()
                    }),
                }
            });
            builder.production_with_observer(
                "list",
                "NUM+",
                None,
                Box::new(|_, mut v, _| v.pop().unwrap()),
                Some(&mut *observer),
            );
        }
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "NUM__plus");
    }
}
