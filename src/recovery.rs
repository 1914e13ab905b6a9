// Copyright 2024 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Panic-mode error recovery (SPEC_FULL.md §4.G).
//!
//! No teacher analog: `alap_gen`/`alap_gen_ng`/`lap_gen` generate strict
//! LALR(1) parsers with no `ERROR` pseudo-terminal or recovery discipline
//! of their own. This module follows SPEC_FULL.md §4.G's algorithm
//! directly, reusing `runtime::Spine`'s `Rc`-shared frames so a recovered
//! spine still shares history with whatever of the frontier survives it.

use crate::error::{Diagnostic, ErrorSink};
use crate::grammar::Grammar;
use crate::runtime::{next_resolved, IdGen, Spine};
use crate::table::Action;
use crate::value::{RawToken, Token};
use std::rc::Rc;

/// Where `parse`'s main loop resumes after a successful recovery: the
/// (possibly singleton) frontier left standing, and the token to feed it
/// next (either the original offending token, re-examined against the new
/// state, or the first later token found acceptable).
pub(crate) struct Continuation<V> {
    pub(crate) frontier: Vec<Spine<V>>,
    pub(crate) next_token: Token<V>,
}

/// Runs SPEC_FULL.md §4.G's panic-mode recovery against the **last live
/// spine before extinction** — here, simply the first spine of `frontier`,
/// since the runtime only calls this once every spine in `frontier` has
/// already failed the offending token and the frontier has not yet been
/// overwritten (that spine is still "the last live one" in the sense the
/// spec means: the most recent frontier that had a live spine at all).
pub(crate) fn recover<V, E, D, I>(
    grammar: &Grammar<V, E>,
    frontier: &[Spine<V>],
    offending: Token<V>,
    tokens: &mut I,
    env: &mut E,
) -> Result<Continuation<V>, Diagnostic<V, D>>
where
    V: Clone + PartialEq + Default,
    E: ErrorSink<D>,
    I: Iterator<Item = RawToken<V>>,
{
    let spine = frontier
        .first()
        .cloned()
        .ok_or(Diagnostic::NotInLanguage { position: Some(offending.position) })?;
    let error_terminal = grammar.symbols().error_terminal();
    let mut ids = IdGen::new();

    // 1. Pop stack entries until a state has `action[s*, ERROR] = Shift(s')`.
    let mut cur = Rc::clone(&spine.head);
    let (error_target, base) = loop {
        let cell = grammar.actions().get(cur.state, error_terminal);
        if let Some(target) = cell.iter().find_map(|a| match a {
            Action::Shift(s) => Some(*s),
            _ => None,
        }) {
            break (target, Rc::clone(&cur));
        }
        match cur.prev.clone() {
            Some(prev) => cur = prev,
            None => return Err(Diagnostic::NotInLanguage { position: Some(offending.position) }),
        }
    };

    // 2. Push the ERROR pseudo-token, inheriting the offending token's position.
    let error_spine = Spine::push_error(base, error_target, V::default(), offending.position, &mut ids);

    // 3. If a reduce covering the error slot is immediately available, fire
    // it; its reducer is the user's error handler.
    let cell = grammar.actions().get(error_spine.state(), offending.terminal);
    if let Some(production_id) = cell.iter().find_map(|a| match a {
        Action::Reduce(p) => Some(*p),
        _ => None,
    }) {
        let production = &grammar.productions()[production_id as usize];
        let n = production.len();
        let (base_after_pop, values, positions, dots) = error_spine.pop(n);
        let reduced_position = positions.first().copied().unwrap_or(offending.position);
        let value = production.reduce(env, values, positions);

        if let Some(domain_error) = env.take_pending_error() {
            return Err(Diagnostic::HandledError {
                error: domain_error,
                position: reduced_position,
                partial_value: Some(value),
            });
        }

        let goto_state = grammar.gotos().get(base_after_pop.state, production.lhs()).ok_or_else(|| {
            Diagnostic::InternalParserError(format!(
                "no goto from state {} on nonterminal {} during error recovery",
                base_after_pop.state,
                grammar.symbols().non_terminal_name(production.lhs())
            ))
        })?;
        let dot = Rc::new(crate::runtime::DotNode {
            id: ids.next(),
            label: grammar.symbols().non_terminal_name(production.lhs()).to_string(),
            children: dots,
        });
        let repaired = Spine::push(base_after_pop, goto_state, value, reduced_position, dot);
        return Ok(Continuation {
            frontier: vec![repaired],
            next_token: offending,
        });
    }

    // 4. Otherwise, discard input tokens until one is acceptable in the
    // current state, or EOS is reached.
    let eos = grammar.symbols().eos();
    let mut candidate = offending;
    loop {
        if !grammar.actions().get(error_spine.state(), candidate.terminal).is_empty() {
            return Ok(Continuation {
                frontier: vec![error_spine],
                next_token: candidate,
            });
        }
        if candidate.terminal == eos {
            return Err(Diagnostic::NotInLanguage { position: Some(candidate.position) });
        }
        match next_resolved(tokens, grammar) {
            Some(Ok(next)) => candidate = next,
            Some(Err(bad)) => return Err(Diagnostic::BadToken(bad)),
            None => return Err(Diagnostic::NotInLanguage { position: Some(candidate.position) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{FinalizeOptions, GrammarBuilder};
    use crate::runtime::{self, Accept, ParseOptions};
    use crate::value::Position;

    struct Env {
        pending: Option<&'static str>,
    }

    impl ErrorSink<&'static str> for Env {
        fn take_pending_error(&mut self) -> Option<&'static str> {
            self.pending.take()
        }
    }

    fn pos(offset: usize) -> Position {
        Position::new(offset, 1, offset, offset + 1)
    }

    fn num(n: i64, offset: usize) -> RawToken<i64> {
        RawToken::new("NUM", n, pos(offset))
    }

    fn term(name: &str, offset: usize) -> RawToken<i64> {
        RawToken::new(name, 0, pos(offset))
    }

    /// `e -> e PLS ERROR` on `1 + + 2`: the second `+` cannot shift after
    /// the first, so recovery pushes `ERROR` and the error production's
    /// handler raises `"AfterPls"` (SPEC_FULL.md §8 S5).
    #[test]
    fn error_production_surfaces_a_handled_error_at_the_recovery_position() {
        let mut builder: GrammarBuilder<i64, Env> = GrammarBuilder::new();
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
        builder.production(
            "e",
            "e PLS ERROR",
            None,
            Box::new(|env: &mut Env, mut v, _| {
                v.pop();
                let a = v.pop().unwrap();
                env.pending = Some("AfterPls");
                a
            }),
        );
        builder.start("e");
        let grammar = builder.finalize(FinalizeOptions::default()).unwrap();

        let mut env = Env { pending: None };
        let tokens = vec![num(1, 0), term("PLS", 2), term("PLS", 4), num(2, 6)];
        let result = runtime::parse::<_, _, &'static str>(&grammar, tokens, &mut env, ParseOptions {
            accept: Accept::First,
            ..ParseOptions::default()
        });
        match result {
            Err(Diagnostic::HandledError { error, position, .. }) => {
                assert_eq!(error, "AfterPls");
                assert_eq!(position.file_offset, 4);
            }
            other => panic!("expected HandledError, got {other:?}"),
        }
    }
}
