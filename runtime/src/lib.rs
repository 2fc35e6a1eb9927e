//! Provides the bytecode and the thread-simulation engine for matching
//! patterns against sequences of arbitrary items.
//!
//! # Example
//!
//! ```
//! use seqex_runtime::*;
//!
//! // `^A/B$` where `A` and `B` accept the characters 'a' and 'b'.
//! let program = Program::default().with_instructions(vec![
//!     Instruction::BeginInput,
//!     Instruction::Filter(InstFilter::new(Predicate::new("A", |c: &char, _| *c == 'a'))),
//!     Instruction::Filter(InstFilter::new(Predicate::new("B", |c: &char, _| *c == 'b'))),
//!     Instruction::EndInput,
//!     Instruction::Match,
//! ]);
//!
//! assert!(run(&program, Some(&['a', 'b'][..])).is_some());
//! assert!(run(&program, Some(&['a'][..])).is_none());
//! ```

use std::collections::BTreeSet;
use std::fmt::{Debug, Display};

pub mod capture;
pub mod engine;
pub mod matcher;
pub mod predicate;
mod sparse_set;
pub mod thread;

pub use capture::{CaptureGroup, CaptureGroups, CaptureKey};
pub use engine::{run, Engine, EngineError, MatchResult, Mode};
pub use matcher::Matcher;
pub use predicate::{GuardError, Predicate, Value, Variables};
pub use thread::{ExecutionContext, ItemPointer, ProgramCounter, Thread, ThreadId, ThreadState};

/// An ordered, immutable sequence of instructions. A program is compiled
/// once and may be shared read-only by any number of concurrent runs.
pub struct Program<T> {
    name: Option<String>,
    source: Option<String>,
    program: Vec<Instruction<T>>,
}

impl<T> Program<T> {
    #[must_use]
    pub fn new(program: Vec<Instruction<T>>) -> Self {
        Self {
            name: None,
            source: None,
            program,
        }
    }

    pub fn with_instructions(self, program: Vec<Instruction<T>>) -> Self {
        Self { program, ..self }
    }

    /// Associates a diagnostic name with the program.
    pub fn with_name<S: Into<String>>(self, name: S) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Associates the pattern text the program was compiled from.
    pub fn with_source<S: Into<String>>(self, source: S) -> Self {
        Self {
            source: Some(source.into()),
            ..self
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.program.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the instruction at a given address.
    ///
    /// # Example
    ///
    /// ```
    /// use seqex_runtime::{Instruction, InvalidAddress, Program};
    ///
    /// let program: Program<char> = Program::new(vec![Instruction::Match]);
    ///
    /// assert!(program.get(0).is_ok());
    /// assert_eq!(Err(InvalidAddress::new(1, 1)), program.get(1).map(|_| ()));
    /// ```
    pub fn get(&self, idx: usize) -> Result<&Instruction<T>, InvalidAddress> {
        self.program
            .get(idx)
            .ok_or_else(|| InvalidAddress::new(idx, self.len()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction<T>> {
        self.program.iter()
    }

    /// Returns every capture key opened by a `Save` in the program.
    pub fn capture_keys(&self) -> BTreeSet<&CaptureKey> {
        self.program
            .iter()
            .filter_map(|inst| match inst {
                Instruction::Save(InstSave { key }) => Some(key),
                _ => None,
            })
            .collect()
    }
}

impl<T> Default for Program<T> {
    fn default() -> Self {
        Self::new(vec![])
    }
}

impl<T> Display for Program<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}:", self.name().unwrap_or("<anonymous>"))?;
        for (id, inst) in self.program.iter().enumerate() {
            writeln!(f, "  {}: {}", id, inst)?
        }

        Ok(())
    }
}

impl<T> Debug for Program<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl<T> AsRef<[Instruction<T>]> for Program<T> {
    fn as_ref(&self) -> &[Instruction<T>] {
        &self.program
    }
}

/// Signals a lookup of an address outside of `[0, len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidAddress {
    address: usize,
    len: usize,
}

impl InvalidAddress {
    pub fn new(address: usize, len: usize) -> Self {
        Self { address, len }
    }

    pub fn address(&self) -> usize {
        self.address
    }
}

impl Display for InvalidAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "address {} is outside of a program of length {}",
            self.address, self.len
        )
    }
}

impl std::error::Error for InvalidAddress {}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstIndex(u32);

impl InstIndex {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for InstIndex {
    fn from(ptr: u32) -> Self {
        Self(ptr)
    }
}

impl std::ops::Add<u32> for InstIndex {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        InstIndex::from(self.0 + rhs)
    }
}

/// A jump destination, either a fixed address or an offset from the
/// instruction performing the jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Absolute(InstIndex),
    Relative(i32),
}

impl Target {
    pub fn absolute(idx: u32) -> Self {
        Self::Absolute(InstIndex::from(idx))
    }

    pub fn relative(offset: i32) -> Self {
        Self::Relative(offset)
    }

    /// Resolves the target against the address it is jumped from. Returns
    /// `None` if a relative offset leaves the addressable range.
    pub fn resolve(self, from: InstIndex) -> Option<InstIndex> {
        match self {
            Target::Absolute(idx) => Some(idx),
            Target::Relative(offset) => {
                let resolved = i64::from(from.as_u32()) + i64::from(offset);
                u32::try_from(resolved).ok().map(InstIndex::from)
            }
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Absolute(idx) => write!(f, "({:04})", idx.as_u32()),
            Target::Relative(offset) => write!(f, "({:+})", offset),
        }
    }
}

pub enum Instruction<T> {
    BeginInput,
    EndInput,
    Filter(InstFilter<T>),
    Jump(InstJump),
    Split(InstSplit),
    Save(InstSave),
    Stop(InstStop),
    Match,
}

impl<T> Instruction<T> {
    /// Executes the instruction against a single thread. Each instruction
    /// either advances, forks and advances, kills or accepts the thread.
    pub fn execute(&self, ctx: &mut ExecutionContext<'_, '_, '_, T>) {
        match self {
            Instruction::BeginInput if ctx.at_start() => ctx.advance(),
            Instruction::EndInput if ctx.at_end() => ctx.advance(),
            Instruction::BeginInput | Instruction::EndInput => ctx.kill(),
            Instruction::Filter(i) => i.execute(ctx),
            Instruction::Jump(InstJump { next }) => ctx.jump(*next),
            Instruction::Split(InstSplit {
                primary,
                alternative,
            }) => {
                // the sibling lands behind every queued thread while this
                // thread continues immediately, so the primary branch is
                // always exhausted first.
                ctx.fork(*alternative);
                ctx.jump(*primary);
            }
            Instruction::Save(InstSave { key }) => {
                ctx.save(key);
                ctx.advance();
            }
            Instruction::Stop(InstStop { key }) => {
                ctx.stop(key);
                ctx.advance();
            }
            Instruction::Match => ctx.accept(),
        }
    }
}

impl<T> Display for Instruction<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::BeginInput => write!(f, "BeginInput"),
            Instruction::EndInput => write!(f, "EndInput"),
            Instruction::Filter(i) => Display::fmt(i, f),
            Instruction::Jump(i) => Display::fmt(i, f),
            Instruction::Split(i) => Display::fmt(i, f),
            Instruction::Save(i) => Display::fmt(i, f),
            Instruction::Stop(i) => Display::fmt(i, f),
            Instruction::Match => write!(f, "Match"),
        }
    }
}

impl<T> Debug for Instruction<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Consumes one item if it satisfies the predicate.
pub struct InstFilter<T> {
    predicate: Predicate<T>,
}

impl<T> InstFilter<T> {
    #[must_use]
    pub fn new(predicate: Predicate<T>) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> &Predicate<T> {
        &self.predicate
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_, '_, '_, T>) {
        if !ctx.can_read() {
            return ctx.kill();
        }

        let item = ctx.read();
        // a guard failing to evaluate only takes down the evaluating thread.
        match self.predicate.test(item, ctx.variables_mut()) {
            Ok(true) => {
                ctx.consume();
                ctx.advance();
            }
            Ok(false) | Err(_) => ctx.kill(),
        }
    }
}

impl<T> Display for InstFilter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Filter: {}", self.predicate.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstJump {
    next: Target,
}

impl InstJump {
    pub fn new(next: Target) -> Self {
        Self { next }
    }
}

impl Display for InstJump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Jump: {}", self.next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstSplit {
    primary: Target,
    alternative: Target,
}

impl InstSplit {
    #[must_use]
    pub fn new(primary: Target, alternative: Target) -> Self {
        Self {
            primary,
            alternative,
        }
    }
}

impl Display for InstSplit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Split: {}, {}", self.primary, self.alternative)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstSave {
    key: CaptureKey,
}

impl InstSave {
    #[must_use]
    pub fn new<K: Into<CaptureKey>>(key: K) -> Self {
        Self { key: key.into() }
    }
}

impl Display for InstSave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Save[{}]", self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstStop {
    key: CaptureKey,
}

impl InstStop {
    #[must_use]
    pub fn new<K: Into<CaptureKey>>(key: K) -> Self {
        Self { key: key.into() }
    }
}

impl Display for InstStop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stop[{}]", self.key)
    }
}
