// Copyright 2024 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Build-time and parse-time diagnostics (SPEC_FULL.md §7, §7.1).
//!
//! Grounded on `lalr1::Error<T>` for the overall "typed enum plus hand-
//! rolled `Display`" shape and on `alap_gen_ng::grammar::Error` for the
//! build-time variant names; the teacher never needed `HandledError`'s
//! caller-domain-error payload since its generated parsers report errors
//! by side effect (`ReportError::report_error`) rather than by value.

use crate::value::Position;
use std::fmt;

/// A `finalize()` call that cannot produce a grammar at all (SPEC_FULL.md
/// §7.1, after `alap_gen_ng::grammar::Error`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeError {
    NoStartSymbol,
    UndefinedNonTerminal(Vec<String>),
    TooManyErrors(usize),
}

impl fmt::Display for FinalizeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FinalizeError::NoStartSymbol => write!(f, "no start symbol declared"),
            FinalizeError::UndefinedNonTerminal(names) => {
                write!(f, "undefined nonterminal(s): {}", names.join(", "))
            }
            FinalizeError::TooManyErrors(count) => write!(f, "too many finalize errors ({count})"),
        }
    }
}

impl std::error::Error for FinalizeError {}

/// A non-fatal observation made during `finalize()`, reported via
/// `log::warn!` rather than failing the build (SPEC_FULL.md §7.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeWarning {
    UnusedTerminal(String),
    UnreachableNonTerminal(String),
    UnproductiveNonTerminal(String),
}

impl fmt::Display for FinalizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FinalizeWarning::UnusedTerminal(name) => write!(f, "terminal \"{name}\" is unused"),
            FinalizeWarning::UnreachableNonTerminal(name) => {
                write!(f, "nonterminal \"{name}\" is unreachable from the start symbol")
            }
            FinalizeWarning::UnproductiveNonTerminal(name) => write!(f, "nonterminal \"{name}\" is unproductive"),
        }
    }
}

/// The offending token's type name and position (SPEC_FULL.md §7
/// `BadToken`).
#[derive(Debug, Clone)]
pub struct BadTokenInfo {
    pub terminal_name: String,
    pub position: Position,
}

/// A parse-call failure (SPEC_FULL.md §7). `V` is the caller's synthesized
/// value type (carried by `HandledError`'s partial value); `D` is the
/// caller's own domain-error type, signalled through
/// `ErrorSink::take_pending_error` from inside an `ERROR`-containing
/// production's reducer (see `runtime.rs`).
#[derive(Debug)]
pub enum Diagnostic<V, D> {
    BadToken(BadTokenInfo),
    NotInLanguage { position: Option<Position> },
    HandledError {
        error: D,
        position: Position,
        partial_value: Option<V>,
    },
    InternalParserError(String),
}

impl<V, D: fmt::Display> fmt::Display for Diagnostic<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Diagnostic::BadToken(info) => {
                write!(f, "bad token \"{}\" at {}", info.terminal_name, info.position)
            }
            Diagnostic::NotInLanguage { position } => match position {
                Some(p) => write!(f, "not in language, recovery failed at {p}"),
                None => write!(f, "not in language"),
            },
            Diagnostic::HandledError { error, position, .. } => {
                write!(f, "handled error at {position}: {error}")
            }
            Diagnostic::InternalParserError(message) => write!(f, "internal parser error: {message}"),
        }
    }
}

impl<V: fmt::Debug, D: fmt::Debug + fmt::Display> std::error::Error for Diagnostic<V, D> {}

/// How a reducer inside an `ERROR`-containing production hands a domain
/// error back to the runtime (SPEC_FULL.md §4.G, §7 "its handler signalled
/// a domain error"). The reducer signature (`production.rs`'s `Reducer<V,
/// E>`) has no room for a `Result` return without forcing every ordinary
/// production through the same plumbing, so the environment carries the
/// error instead — the same shape as the teacher's `Calc { errors: u32 }`
/// bitfield in its worked example, generalized from a bitfield to an
/// arbitrary caller domain-error type `D`.
pub trait ErrorSink<D> {
    /// Called once, immediately after an `ERROR`-containing production's
    /// reducer runs. `Some(e)` surfaces as `Diagnostic::HandledError`;
    /// `None` means the handler repaired the parse silently.
    fn take_pending_error(&mut self) -> Option<D>;
}
