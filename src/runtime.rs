// Copyright 2024 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! The GLR frontier: spine forking, merging, and the main per-token loop
//! (SPEC_FULL.md §4.F, §4.F.1, §5).
//!
//! Grounded on `alap_gen_ng::state::ParserState`/`production::Production`'s
//! `Rc`-shared, prefix-sharing graph nodes for the spine representation
//! (SPEC_FULL.md §5 names these explicitly), generalized from the teacher's
//! single deterministic stack to a frontier of stacks that forks on
//! conflict cells and merges back together when two spines reach the same
//! `(state, value)` pair.

use crate::error::{BadTokenInfo, Diagnostic, ErrorSink};
use crate::grammar::Grammar;
use crate::recovery;
use crate::symbol::TerminalId;
use crate::value::{Position, RawToken};
use std::io::Write;
use std::rc::Rc;

/// `accept: first | all` (SPEC_FULL.md §6 "Parse options").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accept {
    #[default]
    First,
    All,
}

/// Knobs accepted by `parse` (SPEC_FULL.md §6 "Parse options"). `env` is
/// passed as its own argument rather than folded in here, since it is the
/// one option whose type varies per grammar (`E`) while the rest are fixed.
pub struct ParseOptions<'a> {
    pub accept: Accept,
    pub verbose: Option<&'a mut dyn Write>,
    pub parse_tree: Option<&'a mut dyn Write>,
    /// How many frames of a spine's value history to compare head-first
    /// before falling back to full-chain comparison when merging
    /// (SPEC_FULL.md §4.F.1). Only consulted in `Accept::First` mode.
    pub merge_probe_depth: usize,
    /// Aborts with `InternalParserError` if the number of live spines
    /// processing a single token exceeds this (SPEC_FULL.md §4.F
    /// "a spine limit may be imposed by configuration").
    pub spine_limit: usize,
}

impl Default for ParseOptions<'_> {
    fn default() -> Self {
        Self {
            accept: Accept::default(),
            verbose: None,
            parse_tree: None,
            merge_probe_depth: 4,
            spine_limit: 10_000,
        }
    }
}

/// One node of the DOT-renderable derivation forest, tracked in parallel
/// with each spine's value stack so `parse_tree` has something to emit
/// without re-deriving structure from the flat value stack after the fact.
pub(crate) struct DotNode {
    pub(crate) id: u64,
    pub(crate) label: String,
    pub(crate) children: Vec<Rc<DotNode>>,
}

/// One frame of a spine: the state reached, the value/position carried
/// there (absent only at the frontier's root), the tree node for that
/// frame, and the predecessor frame. Spines sharing a prefix share the
/// `Rc<Node<V>>` chain rather than copying it (SPEC_FULL.md §5).
pub(crate) struct Node<V> {
    pub(crate) state: u32,
    pub(crate) value: Option<V>,
    pub(crate) position: Position,
    pub(crate) dot: Option<Rc<DotNode>>,
    pub(crate) prev: Option<Rc<Node<V>>>,
}

#[derive(Clone)]
pub(crate) struct Spine<V> {
    pub(crate) head: Rc<Node<V>>,
}

impl<V: Clone> Spine<V> {
    pub(crate) fn from_head(head: Rc<Node<V>>) -> Self {
        Spine { head }
    }

    fn root() -> Self {
        Spine {
            head: Rc::new(Node {
                state: 0,
                value: None,
                position: Position::default(),
                dot: None,
                prev: None,
            }),
        }
    }

    pub(crate) fn state(&self) -> u32 {
        self.head.state
    }

    fn shift(&self, state: u32, value: V, position: Position, dot: Rc<DotNode>) -> Self {
        Spine {
            head: Rc::new(Node {
                state,
                value: Some(value),
                position,
                dot: Some(dot),
                prev: Some(Rc::clone(&self.head)),
            }),
        }
    }

    /// Pops `n` frames, returning the frame below them and the popped
    /// values/positions/tree-nodes in left-to-right (original rhs) order.
    pub(crate) fn pop(&self, n: usize) -> (Rc<Node<V>>, Vec<V>, Vec<Position>, Vec<Rc<DotNode>>) {
        let mut values = Vec::with_capacity(n);
        let mut positions = Vec::with_capacity(n);
        let mut dots = Vec::with_capacity(n);
        let mut cur = Rc::clone(&self.head);
        for _ in 0..n {
            values.push(cur.value.clone().expect("pop beyond the frontier root"));
            positions.push(cur.position);
            dots.push(Rc::clone(cur.dot.as_ref().expect("pop beyond the frontier root")));
            let prev = Rc::clone(cur.prev.as_ref().expect("pop beyond the frontier root"));
            cur = prev;
        }
        values.reverse();
        positions.reverse();
        dots.reverse();
        (cur, values, positions, dots)
    }

    pub(crate) fn push(base: Rc<Node<V>>, state: u32, value: V, position: Position, dot: Rc<DotNode>) -> Self {
        Spine {
            head: Rc::new(Node {
                state,
                value: Some(value),
                position,
                dot: Some(dot),
                prev: Some(base),
            }),
        }
    }

    /// Pushes the `ERROR` pseudo-token's frame onto `base` (SPEC_FULL.md
    /// §4.G step 2). Used only by `recovery::recover`.
    pub(crate) fn push_error(base: Rc<Node<V>>, state: u32, error_value: V, position: Position, ids: &mut IdGen) -> Self {
        let dot = Rc::new(DotNode {
            id: ids.next(),
            label: "ERROR".to_string(),
            children: Vec::new(),
        });
        Self::push(base, state, error_value, position, dot)
    }
}

/// What a successful `parse` call returns (SPEC_FULL.md §6 "Parse
/// result"): one value under `accept: first`, every accepted derivation's
/// value under `accept: all`.
#[derive(Debug)]
pub enum ParseOutcome<V> {
    One(V),
    Many(Vec<V>),
}

pub(crate) struct IdGen(u64);

impl IdGen {
    pub(crate) fn new() -> Self {
        Self(0)
    }

    pub(crate) fn next(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }
}

/// Drives one parse of `tokens` against `grammar`, per the GLR main loop
/// in SPEC_FULL.md §4.F. `tokens` must eventually yield an `EOS` token; a
/// lexer that never does leaves the frontier stuck waiting for input that
/// never arrives, surfaced here as `NotInLanguage` once the iterator is
/// exhausted.
pub fn parse<V, E, D>(
    grammar: &Grammar<V, E>,
    tokens: impl IntoIterator<Item = RawToken<V>>,
    env: &mut E,
    mut options: ParseOptions,
) -> Result<ParseOutcome<V>, Diagnostic<V, D>>
where
    V: Clone + PartialEq + Default,
    E: ErrorSink<D>,
{
    let mut tokens = tokens.into_iter();
    let mut ids = IdGen::new();
    let mut frontier = vec![Spine::root()];

    let mut pending = match next_resolved(&mut tokens, grammar) {
        Some(Ok(t)) => Some(t),
        Some(Err(e)) => return Err(Diagnostic::BadToken(e)),
        None => return Err(Diagnostic::NotInLanguage { position: None }),
    };

    loop {
        let token = match pending.take() {
            Some(t) => t,
            None => return Err(Diagnostic::NotInLanguage { position: None }),
        };

        match step(grammar, &frontier, &token, env, &mut ids, &mut options)? {
            StepOutcome::Continue(next_frontier) => {
                frontier = if options.accept == Accept::First {
                    merge_spines(next_frontier, options.merge_probe_depth)
                } else {
                    next_frontier
                };
                pending = match next_resolved(&mut tokens, grammar) {
                    Some(Ok(t)) => Some(t),
                    Some(Err(e)) => return Err(Diagnostic::BadToken(e)),
                    None => return Err(Diagnostic::NotInLanguage { position: None }),
                };
            }
            StepOutcome::Accepted(values) => {
                if let Some(writer) = options.parse_tree.as_deref_mut() {
                    let roots: Vec<Rc<DotNode>> = values.iter().filter_map(|(_, d)| d.clone()).collect();
                    let _ = emit_dot(writer, &roots);
                }
                let values: Vec<V> = values.into_iter().map(|(v, _)| v).collect();
                return Ok(match options.accept {
                    Accept::First => ParseOutcome::One(values.into_iter().next().expect("accept fired with no value")),
                    Accept::All => ParseOutcome::Many(values),
                });
            }
            StepOutcome::Extinct => {
                let resolved_token = token;
                match recovery::recover(grammar, &frontier, resolved_token, &mut tokens, env) {
                    Ok(cont) => {
                        frontier = cont.frontier;
                        pending = Some(cont.next_token);
                    }
                    Err(diagnostic) => return Err(diagnostic),
                }
            }
        }
    }
}

enum StepOutcome<V> {
    Continue(Vec<Spine<V>>),
    Accepted(Vec<(V, Option<Rc<DotNode>>)>),
    Extinct,
}

/// Applies one token to every live spine, forking over conflict cells and
/// re-processing the same token after every reduce (SPEC_FULL.md §4.F
/// steps 1-4).
fn step<V, E, D>(
    grammar: &Grammar<V, E>,
    frontier: &[Spine<V>],
    token: &crate::value::Token<V>,
    env: &mut E,
    ids: &mut IdGen,
    options: &mut ParseOptions,
) -> Result<StepOutcome<V>, Diagnostic<V, D>>
where
    V: Clone + PartialEq,
    E: ErrorSink<D>,
{
    let mut active: Vec<Spine<V>> = frontier.to_vec();
    let mut next_frontier: Vec<Spine<V>> = Vec::new();
    let mut accepted: Vec<(V, Option<Rc<DotNode>>)> = Vec::new();
    let mut iterations = 0usize;

    while let Some(spine) = active.pop() {
        iterations += 1;
        if iterations > options.spine_limit {
            return Err(Diagnostic::InternalParserError(format!(
                "spine limit ({}) exceeded while processing one token",
                options.spine_limit
            )));
        }

        let cell = grammar.actions().get(spine.state(), token.terminal);
        if cell.is_empty() {
            continue;
        }

        for action in cell {
            match *action {
                crate::table::Action::Shift(target) => {
                    if let Some(w) = options.verbose.as_deref_mut() {
                        let _ = writeln!(w, "shift {} -> {target}", grammar.symbols().terminal_name(token.terminal));
                    }
                    let dot = Rc::new(DotNode {
                        id: ids.next(),
                        label: grammar.symbols().terminal_name(token.terminal).to_string(),
                        children: Vec::new(),
                    });
                    next_frontier.push(spine.shift(target, token.value.clone(), token.position, dot));
                }
                crate::table::Action::Reduce(production_id) => {
                    let production = &grammar.productions()[production_id as usize];
                    let n = production.len();
                    let (base, values, positions, dots) = spine.pop(n);
                    let reduced_position = positions.first().copied().unwrap_or(token.position);
                    let is_error_production = production
                        .rhs()
                        .iter()
                        .any(|s| matches!(s, crate::symbol::Symbol::Terminal(t) if *t == grammar.symbols().error_terminal()));

                    let value = production.reduce(env, values, positions);

                    if is_error_production {
                        if let Some(domain_error) = env.take_pending_error() {
                            return Err(Diagnostic::HandledError {
                                error: domain_error,
                                position: reduced_position,
                                partial_value: Some(value),
                            });
                        }
                    }

                    let goto_state = grammar.gotos().get(base.state, production.lhs()).ok_or_else(|| {
                        Diagnostic::InternalParserError(format!(
                            "no goto from state {} on nonterminal {}",
                            base.state,
                            grammar.symbols().non_terminal_name(production.lhs())
                        ))
                    })?;
                    if let Some(w) = options.verbose.as_deref_mut() {
                        let _ = writeln!(w, "reduce {} -> {goto_state}", production.describe(grammar.symbols()));
                    }
                    let dot_node = Rc::new(DotNode {
                        id: ids.next(),
                        label: grammar.symbols().non_terminal_name(production.lhs()).to_string(),
                        children: dots,
                    });
                    active.push(Spine::push(base, goto_state, value, reduced_position, dot_node));
                }
                crate::table::Action::Accept => {
                    if let Some(w) = options.verbose.as_deref_mut() {
                        let _ = writeln!(w, "accept");
                    }
                    let value = spine.head.value.clone().expect("accept state always carries the start symbol's value");
                    accepted.push((value, spine.head.dot.clone()));
                    if options.accept == Accept::First {
                        return Ok(StepOutcome::Accepted(accepted));
                    }
                }
            }
        }
    }

    if !accepted.is_empty() {
        return Ok(StepOutcome::Accepted(accepted));
    }
    if next_frontier.is_empty() {
        return Ok(StepOutcome::Extinct);
    }
    Ok(StepOutcome::Continue(next_frontier))
}

/// Drops spines that reach the same `(state, value)` as one already kept,
/// bounding fork growth (SPEC_FULL.md §4.F). Only called in `Accept::First`
/// mode: `Accept::All` must keep every derivation distinct even when two
/// spines currently coincide, since they may still be two different shapes
/// that simply evaluate to the same value so far (SPEC_FULL.md §8 S3).
fn merge_spines<V: Clone + PartialEq>(spines: Vec<Spine<V>>, probe_depth: usize) -> Vec<Spine<V>> {
    let mut kept: Vec<Spine<V>> = Vec::new();
    'outer: for spine in spines {
        for existing in &kept {
            if existing.head.state == spine.head.state && probed_equal(&existing.head, &spine.head, probe_depth) {
                continue 'outer;
            }
        }
        kept.push(spine);
    }
    kept
}

fn probed_equal<V: Clone + PartialEq>(a: &Rc<Node<V>>, b: &Rc<Node<V>>, depth: usize) -> bool {
    let mut x = Rc::clone(a);
    let mut y = Rc::clone(b);
    for _ in 0..depth {
        if Rc::ptr_eq(&x, &y) {
            return true;
        }
        match (&x.value, &y.value) {
            (Some(vx), Some(vy)) if vx == vy => {}
            (None, None) => return true,
            _ => return false,
        }
        let (px, py) = match (&x.prev, &y.prev) {
            (Some(px), Some(py)) => (Rc::clone(px), Rc::clone(py)),
            (None, None) => return true,
            _ => return false,
        };
        x = px;
        y = py;
    }
    // Beyond the probe depth the two chains are assumed equal: a bounded
    // approximation traded for not walking arbitrarily long shared history
    // on every merge check (SPEC_FULL.md §4.F.1).
    true
}

fn emit_dot(writer: &mut dyn Write, roots: &[Rc<DotNode>]) -> std::io::Result<()> {
    writeln!(writer, "digraph parse_tree {{")?;
    for root in roots {
        emit_dot_node(writer, root)?;
    }
    writeln!(writer, "}}")
}

fn emit_dot_node(writer: &mut dyn Write, node: &Rc<DotNode>) -> std::io::Result<()> {
    writeln!(writer, "  n{} [label=\"{}\"];", node.id, node.label)?;
    for child in &node.children {
        writeln!(writer, "  n{} -> n{};", node.id, child.id)?;
        emit_dot_node(writer, child)?;
    }
    Ok(())
}

/// Resolves one `RawToken` against `grammar`'s symbol table, surfacing a
/// `BadToken` for a name the grammar never declared or discovered rather
/// than indexing out of range (SPEC_FULL.md §7, §8 S6).
pub(crate) fn next_resolved<V, E>(
    tokens: &mut impl Iterator<Item = RawToken<V>>,
    grammar: &Grammar<V, E>,
) -> Option<Result<crate::value::Token<V>, BadTokenInfo>> {
    let raw = tokens.next()?;
    match grammar.symbols().terminal_id(&raw.terminal_name) {
        Some(id) => Some(Ok(crate::value::Token::new(id, raw.value, raw.position))),
        None => Some(Err(BadTokenInfo {
            terminal_name: raw.terminal_name,
            position: raw.position,
        })),
    }
}
