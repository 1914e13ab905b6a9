// Copyright 2024 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! EBNF desugaring: `X*`, `X+`, `X?` occurring inside an rhs pattern are
//! rewritten, at definition time, into a fresh nonterminal and one or two
//! ordinary productions (SPEC_FULL.md §4.A).
//!
//! The teacher's own grammar DSL (`alapgen.rs`) has no equivalent of this —
//! its `.y`-style input is parsed once by a generated parser and never
//! rewritten — so this module has no direct teacher analog; it follows the
//! shape SPEC_FULL.md §4.A.1 specifies directly.

use std::fmt;

/// Which EBNF operator produced a synthesized nonterminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EbnfOp {
    Star,
    Plus,
    Opt,
}

impl fmt::Display for EbnfOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EbnfOp::Star => write!(f, "*"),
            EbnfOp::Plus => write!(f, "+"),
            EbnfOp::Opt => write!(f, "?"),
        }
    }
}

impl EbnfOp {
    pub fn from_suffix(c: char) -> Option<Self> {
        match c {
            '*' => Some(EbnfOp::Star),
            '+' => Some(EbnfOp::Plus),
            '?' => Some(EbnfOp::Opt),
            _ => None,
        }
    }

    /// The stable suffix used to name the synthesized nonterminal for a
    /// given base symbol (SPEC_FULL.md §4.A.1: a suffix, not a prefix, to
    /// stay clear of the teacher's `aa`/`AA`-reserved name family, and
    /// stable across repeated `finalize()` calls so the serialization
    /// fingerprint is reproducible).
    pub fn suffix(&self) -> &'static str {
        match self {
            EbnfOp::Star => "__star",
            EbnfOp::Plus => "__plus",
            EbnfOp::Opt => "__opt",
        }
    }
}

/// Which of the two productions under a synthesized EBNF nonterminal is
/// being observed: the base clause (`X` alone, or `ε`) or the recursive
/// clause (`X xs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EbnfClause {
    /// `xs -> ε` (for `*`/`?`) or `xp -> X` (for `+`).
    Base,
    /// `xs -> X xs` / `xp -> X xp`.
    Recursive,
}

/// Deterministically derives the synthesized nonterminal's name for base
/// symbol `name` under operator `op`.
pub fn synthesized_name(base_name: &str, op: EbnfOp) -> String {
    format!("{base_name}{}", op.suffix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_naming_is_stable_and_distinct_per_operator() {
        assert_eq!(synthesized_name("item", EbnfOp::Star), "item__star");
        assert_eq!(synthesized_name("item", EbnfOp::Plus), "item__plus");
        assert_eq!(synthesized_name("item", EbnfOp::Opt), "item__opt");
    }

    #[test]
    fn from_suffix_rejects_unknown_operators() {
        assert_eq!(EbnfOp::from_suffix('*'), Some(EbnfOp::Star));
        assert_eq!(EbnfOp::from_suffix('!'), None);
    }
}
