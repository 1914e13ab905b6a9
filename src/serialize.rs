// Copyright 2024 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Fingerprinting and the `use: path` table cache (SPEC_FULL.md §4.H,
//! §4.H.1).
//!
//! No teacher analog: `alap_gen`/`alap_gen_ng`/`lap_gen` never persist a
//! table, they emit Rust source for the caller to compile in. This module
//! follows SPEC_FULL.md §4.H.1's concrete encoding directly: a dependency-
//! free 64-bit FNV-1a fingerprint (a cache-validity check, not a security
//! property) and a `bincode`-encoded, version-tagged record.

use crate::grammar::{FinalizeOptions, Lookahead, Rule};
use crate::symbol::SymbolTable;
use crate::table::{ActionTable, GotoTable};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const FORMAT_VERSION: u8 = 1;

struct Fnv1a(u64);

impl Fnv1a {
    fn new() -> Self {
        Self(FNV_OFFSET_BASIS)
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= byte as u64;
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    fn write_str(&mut self, s: &str) {
        self.write(s.as_bytes());
        self.write(&[0]); // separator, so "ab","c" != "a","bc"
    }

    fn write_u32(&mut self, n: u32) {
        self.write(&n.to_le_bytes());
    }

    fn finish(self) -> u64 {
        self.0
    }
}

/// A stable hash over ordered productions, symbol names, precedence
/// declarations, the start symbol, and the table-shape-affecting
/// `FinalizeOptions` fields (SPEC_FULL.md §4.H.1). `rules` must already
/// include the augmented start production at id `0`; whitespace in the
/// original `rhs_string` text never reaches this function, since `rules`
/// holds parsed `Symbol` sequences, not the raw pattern strings (I5 in
/// SPEC_FULL.md §8).
pub fn fingerprint(symbols: &SymbolTable, rules: &[Rule], options: &FinalizeOptions) -> u64 {
    let mut hasher = Fnv1a::new();
    for rule in rules {
        hasher.write_u32(rule.id);
        hasher.write_str(symbols.non_terminal_name(rule.lhs));
        for symbol in &rule.rhs {
            match symbol {
                crate::symbol::Symbol::Terminal(t) => hasher.write_str(symbols.terminal_name(*t)),
                crate::symbol::Symbol::NonTerminal(n) => hasher.write_str(symbols.non_terminal_name(*n)),
            }
        }
        match rule.precedence {
            Some(p) => {
                hasher.write_u32(p.level());
                hasher.write_str(&p.associativity().to_string());
            }
            None => hasher.write_str("<none>"),
        }
    }
    for t in symbols.terminal_ids() {
        let p = symbols.precedence_of(t);
        hasher.write_str(symbols.terminal_name(t));
        hasher.write_u32(p.level());
        hasher.write_str(&p.associativity().to_string());
    }
    hasher.write_str(match options.lookahead {
        Lookahead::Lalr1 => "LALR1",
        Lookahead::Lr0 => "LR0",
    });
    hasher.write_str(if options.precedence { "precedence:on" } else { "precedence:off" });
    hasher.finish()
}

#[derive(Serialize, Deserialize)]
struct PersistedProduction {
    id: u32,
    lhs_name: String,
    rhs_len: usize,
}

#[derive(Serialize, Deserialize)]
struct PersistedTables {
    format_version: u8,
    fingerprint: u64,
    productions: Vec<PersistedProduction>,
    actions: ActionTable,
    gotos: GotoTable,
}

/// Persists `{fingerprint, actions, gotos, production metadata}` to `path`
/// in versioned binary form (SPEC_FULL.md §4.H `write`).
pub fn write(path: &Path, fingerprint: u64, symbols: &SymbolTable, rules: &[Rule], actions: &ActionTable, gotos: &GotoTable) -> io::Result<()> {
    let productions = rules
        .iter()
        .map(|r| PersistedProduction {
            id: r.id,
            lhs_name: symbols.non_terminal_name(r.lhs).to_string(),
            rhs_len: r.rhs.len(),
        })
        .collect();
    let record = PersistedTables {
        format_version: FORMAT_VERSION,
        fingerprint,
        productions,
        actions: actions.clone(),
        gotos: gotos.clone(),
    };
    let bytes = bincode::serialize(&record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, bytes)
}

/// Loads `path` and returns the persisted `(actions, gotos)` pair iff the
/// file exists, its format version matches, and its fingerprint equals
/// `current_fingerprint` (SPEC_FULL.md §4.H `load`: "if file exists and
/// fingerprints match, skip stages C-E and install the persisted tables;
/// otherwise regenerate and overwrite" — the "otherwise" half is the
/// caller's responsibility, since only it knows how to regenerate).
/// Backward compatibility across format versions is not promised (§6):
/// a version mismatch is treated the same as a cold cache, never
/// best-effort parsed.
pub fn load(path: &Path, current_fingerprint: u64) -> io::Result<Option<(ActionTable, GotoTable)>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    let record: PersistedTables = match bincode::deserialize(&bytes) {
        Ok(r) => r,
        Err(_) => return Ok(None),
    };
    if record.format_version != FORMAT_VERSION || record.fingerprint != current_fingerprint {
        return Ok(None);
    }
    Ok(Some((record.actions, record.gotos)))
}
