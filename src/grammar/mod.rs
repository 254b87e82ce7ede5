//! # Compiled rules
//!
//! Rule text goes through three steps. [`register`] splits a batch of grammar text into
//! `name ::= body` pairs and rewrites every identifier and literal into its compressed
//! token. [`compile`] runs the meta-grammar over the compressed body and writes
//! bytecode. [`execute`] walks that bytecode against an engine's input.
//!
//! ## Bytecode
//!
//! **Bytecode** is one or more *rules*, possibly interspersed with *string*s.
//! The top-level rule is at index 0.
//!
//! **Rules** are a single byte *opcode*, followed by 0 or more *arguments*.
//!
//! **Arguments** are all typed. Each argument type is the same length.
//!
//! - `u`: A 2-byte unsigned integer
//! - `byte`: A 1-byte unsigned int
//! - `sym`: A 4-byte identifier symbol
//! - `str`: A string. `u` for the absolute position in the bytecode of the string, and `u` for its len.
//! - `rule`: A `u` for the absolute position in the bytecode of *another* rule.
//!
//! **Strings** are just bags of bytes. The length is stored with the ptr, and there is no terminating \0
//! or similar.
//!
//! Numbers are always written and read big-endian.
//!
//! ## Writing Bytecode
//!
//! Because we know exactly how long each rule is when written to bytecode,
//! we can write new rules onto the end of the bytecode.
//! When writing a rule that calls other rules or needs a string, we reserve enough space for the
//! current rule, then push the subrule to the end of the bytecode. Strings are pooled and
//! appended once everything else is written.

mod compile;
mod compression;
mod execute;
mod register;

pub(crate) use compile::compile;
pub(crate) use execute::Executor;
pub(crate) use register::{render, split_rules, PendingRule};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::intern::Symbol;

type U = u16;
type RULEPTR = U;
type SYM = Symbol;
type BYTE = u8;

const U_SIZE: usize = std::mem::size_of::<U>();
const RULEPTR_SIZE: usize = std::mem::size_of::<RULEPTR>();
const SYM_SIZE: usize = std::mem::size_of::<SYM>();
const BYTE_SIZE: usize = std::mem::size_of::<BYTE>();

/// One `u` for the pointer, one `u` for the len.
const STR_SIZE: usize = 2 * U_SIZE;

/// Size of the opcode
const OPCODE_SIZE: usize = std::mem::size_of::<Opcode>();

/// Written as the max of a repetition with no upper bound.
const UNBOUNDED_COUNT: U = U::MAX;

/// Opcode bytes.
///
/// Opcodes start at 1 so 0 bytes can be detected as an error, *hopefully*
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
enum Opcode {
    // === Leaves ===
    /// Match the text of this interned literal, honoring case sensitivity.
    ///
    /// `sym`
    Literal = 1,
    /// Match one character inside (or, if the byte is nonzero, outside) these ranges.
    /// The string is pairs of big-endian `u32` code points, low then high.
    ///
    /// `byte str`
    Range,
    /// Run another rule, native function or built-in by name.
    ///
    /// `sym`
    Call,
    /// Match nothing, successfully.
    ///
    /// `<no args>`
    Empty,

    // === Seqs ===
    /// Match all subrules one-by-one.
    ///
    /// One `byte` to show how many rules to store, then that many ruleptrs.
    /// `byte rule...`
    Sequence,
    /// Try each subrule in order; the first one that matches wins.
    ///
    /// `byte rule...`
    Choice,

    // === Counting ===
    /// Match between the second and third argument of the first.
    /// A max of `u::MAX` has no upper bound.
    ///
    /// `rule u u`
    Repeat,
    /// Match the first rule, unless the second matches exactly the same span.
    ///
    /// `rule rule`
    Except,

    // === Engine state ===
    /// Push a checkpoint at the current position and match 0 chars.
    ///
    /// `<no args>`
    Push,
    /// Push an accepted checkpoint and match 0 chars.
    ///
    /// `<no args>`
    Accept,
    /// Literals after this match case exactly.
    ///
    /// `<no args>`
    CaseSensitive,
    /// Literals after this ignore case.
    ///
    /// `<no args>`
    CaseInsensitive,
}

/// A rule compiled from grammar text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRule {
    pub(crate) name: String,
    /// The body as compressed text.
    pub(crate) text: String,
    pub(crate) bytecode: Vec<u8>,
}

impl CompiledRule {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The body with identifiers and literals in compressed form.
    pub fn compressed_text(&self) -> &str {
        &self.text
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }
}
