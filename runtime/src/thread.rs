//! Simulation threads. A thread is one candidate match: a program counter,
//! a position in the input, and the captures and variables recorded along
//! its path. It is not an operating system thread.

use std::fmt::Display;

use crate::capture::{CaptureGroups, CaptureKey};
use crate::engine::{MatchResult, Mode, Scheduler};
use crate::predicate::Variables;
use crate::sparse_set::SparseSet;
use crate::{InstIndex, Instruction, InvalidAddress, Program, Target};

/// A thread's position in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPointer {
    /// The input is empty or absent.
    NoInput,
    /// The index of the next item to be read.
    At(usize),
    /// The pointer of a dead thread.
    Invalid,
}

impl ItemPointer {
    /// Returns the number of items consumed so far, or `None` for an invalid
    /// pointer.
    pub fn offset(self) -> Option<usize> {
        match self {
            ItemPointer::NoInput => Some(0),
            ItemPointer::At(idx) => Some(idx),
            ItemPointer::Invalid => None,
        }
    }
}

/// A cursor into a program.
pub struct ProgramCounter<'p, T> {
    program: &'p Program<T>,
    index: InstIndex,
}

impl<'p, T> ProgramCounter<'p, T> {
    pub fn new(program: &'p Program<T>, index: InstIndex) -> Self {
        Self { program, index }
    }

    pub fn index(&self) -> InstIndex {
        self.index
    }

    pub fn program(&self) -> &'p Program<T> {
        self.program
    }

    /// Returns true if the counter addresses an instruction of its program.
    pub fn is_valid(&self) -> bool {
        self.index.as_usize() < self.program.len()
    }

    pub fn instruction(&self) -> Result<&'p Instruction<T>, InvalidAddress> {
        self.program.get(self.index.as_usize())
    }

    /// Returns the counter of the following instruction. The result may be
    /// invalid.
    pub fn next(&self) -> Self {
        Self::new(self.program, self.index + 1)
    }

    /// Resolves a jump target from this counter, returning `None` if the
    /// destination is not a valid address.
    pub fn resolve(&self, target: Target) -> Option<Self> {
        target
            .resolve(self.index)
            .map(|index| Self::new(self.program, index))
            .filter(ProgramCounter::is_valid)
    }
}

impl<'p, T> Clone for ProgramCounter<'p, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'p, T> Copy for ProgramCounter<'p, T> {}

impl<'p, T> std::fmt::Debug for ProgramCounter<'p, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProgramCounter({:04})", self.index.as_u32())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Viable,
    Dead,
    Match,
}

impl Display for ThreadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadState::Viable => write!(f, "viable"),
            ThreadState::Dead => write!(f, "dead"),
            ThreadState::Match => write!(f, "match"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(u64);

impl From<u64> for ThreadId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct Thread<'p, 'i, T> {
    id: ThreadId,
    pc: ProgramCounter<'p, T>,
    input: &'i [T],
    ptr: ItemPointer,
    captures: CaptureGroups,
    variables: Variables,
    /// instructions visited since the last consumed item.
    trail: SparseSet,
    state: ThreadState,
}

impl<'p, 'i, T> Thread<'p, 'i, T> {
    /// Creates a thread at the first instruction and the start of the input.
    pub(crate) fn seed(
        id: ThreadId,
        program: &'p Program<T>,
        input: Option<&'i [T]>,
        variables: Variables,
    ) -> Self {
        let (input, ptr) = match input {
            Some(items) if !items.is_empty() => (items, ItemPointer::At(0)),
            _ => (Default::default(), ItemPointer::NoInput),
        };

        Self {
            id,
            pc: ProgramCounter::new(program, InstIndex::from(0)),
            input,
            ptr,
            captures: CaptureGroups::new(),
            variables,
            trail: SparseSet::new(program.len()),
            state: ThreadState::Viable,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn is_viable(&self) -> bool {
        self.state == ThreadState::Viable
    }

    pub fn is_match(&self) -> bool {
        self.state == ThreadState::Match
    }

    pub fn pc(&self) -> ProgramCounter<'p, T> {
        self.pc
    }

    pub fn item_pointer(&self) -> ItemPointer {
        self.ptr
    }

    pub fn captures(&self) -> &CaptureGroups {
        &self.captures
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Returns true if an item is available at the item pointer.
    pub fn can_read(&self) -> bool {
        matches!(self.ptr, ItemPointer::At(idx) if idx < self.input.len())
    }

    pub fn at_start(&self) -> bool {
        matches!(self.ptr, ItemPointer::NoInput | ItemPointer::At(0))
    }

    pub fn at_end(&self) -> bool {
        match self.ptr {
            ItemPointer::NoInput => true,
            ItemPointer::At(idx) => idx == self.input.len(),
            ItemPointer::Invalid => false,
        }
    }

    /// Executes the instruction at the program counter exactly once.
    ///
    /// # Panics
    ///
    /// Panics if the thread is no longer viable.
    pub(crate) fn step(&mut self, scheduler: &mut Scheduler<'p, 'i, T>) {
        assert!(
            self.is_viable(),
            "thread {} stepped while {}",
            self.id,
            self.state
        );

        let instruction = match self.pc.instruction() {
            Ok(instruction) => instruction,
            Err(_) => return self.kill(),
        };

        let index = self.pc.index();
        let offset = self.offset();
        // revisiting an instruction without consuming input is an empty loop,
        // and a state another thread already explored with the same
        // variables can't produce an earlier match.
        if !self.trail.insert(index.as_usize())
            || !scheduler.explore(index, offset, &self.variables)
        {
            return self.kill();
        }

        instruction.execute(&mut ExecutionContext::new(self, scheduler));
    }

    /// Steps the thread until it dies or matches, returning the number of
    /// steps taken.
    pub(crate) fn run(&mut self, scheduler: &mut Scheduler<'p, 'i, T>) -> usize {
        let mut steps = 0;
        while self.is_viable() {
            self.step(scheduler);
            steps += 1;
        }

        steps
    }

    pub(crate) fn into_match(self) -> MatchResult<'i, T> {
        assert!(
            self.is_match(),
            "thread {} is {}, not a match",
            self.id,
            self.state
        );
        let end = self.offset();

        MatchResult::new(self.id, self.input, end, self.captures, self.variables)
    }

    fn offset(&self) -> usize {
        match self.ptr.offset() {
            Some(offset) => offset,
            None => panic!("thread {} has no valid item pointer", self.id),
        }
    }

    fn fork(&self, id: ThreadId, pc: ProgramCounter<'p, T>) -> Self {
        Self {
            id,
            pc,
            input: self.input,
            ptr: self.ptr,
            captures: self.captures.clone(),
            variables: self.variables.clone(),
            trail: self.trail.clone(),
            state: self.state,
        }
    }

    fn kill(&mut self) {
        self.state = ThreadState::Dead;
        self.ptr = ItemPointer::Invalid;
        self.captures.clear();
    }
}

impl<'p, 'i, T> std::fmt::Debug for Thread<'p, 'i, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("pc", &self.pc)
            .field("ptr", &self.ptr)
            .field("captures", &self.captures)
            .field("variables", &self.variables)
            .field("trail", &self.trail)
            .field("state", &self.state)
            .finish()
    }
}

/// The operations an instruction may perform on the single thread executing
/// it.
pub struct ExecutionContext<'a, 'p, 'i, T> {
    thread: &'a mut Thread<'p, 'i, T>,
    scheduler: &'a mut Scheduler<'p, 'i, T>,
}

impl<'a, 'p, 'i, T> ExecutionContext<'a, 'p, 'i, T> {
    pub(crate) fn new(
        thread: &'a mut Thread<'p, 'i, T>,
        scheduler: &'a mut Scheduler<'p, 'i, T>,
    ) -> Self {
        Self { thread, scheduler }
    }

    pub fn at_start(&self) -> bool {
        self.thread.at_start()
    }

    pub fn at_end(&self) -> bool {
        self.thread.at_end()
    }

    pub fn can_read(&self) -> bool {
        self.thread.can_read()
    }

    /// Returns the item at the item pointer.
    ///
    /// # Panics
    ///
    /// Panics unless `can_read` holds.
    pub fn read(&self) -> &'i T {
        let input = self.thread.input;
        match self.thread.ptr {
            ItemPointer::At(idx) if idx < input.len() => &input[idx],
            ptr => panic!("thread {} read at {:?}", self.thread.id, ptr),
        }
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.thread.variables
    }

    /// Moves the item pointer past the current item.
    pub fn consume(&mut self) {
        assert!(
            self.can_read(),
            "thread {} consumed past the end of input",
            self.thread.id
        );

        let offset = self.thread.offset();
        self.thread.ptr = ItemPointer::At(offset + 1);
        self.thread.trail.clear();
    }

    /// Moves the program counter to the following instruction.
    pub fn advance(&mut self) {
        self.thread.pc = self.thread.pc.next();
    }

    /// Moves the program counter to `target`, killing the thread if the
    /// target is not a valid address.
    pub fn jump(&mut self, target: Target) {
        match self.thread.pc.resolve(target) {
            Some(pc) => self.thread.pc = pc,
            None => self.kill(),
        }
    }

    /// Queues a sibling thread starting at `target` behind all currently
    /// queued threads. No sibling is created for an invalid target.
    pub fn fork(&mut self, target: Target) {
        if let Some(pc) = self.thread.pc.resolve(target) {
            let id = self.scheduler.next_id();
            let sibling = self.thread.fork(id, pc);
            self.scheduler.schedule(sibling);
        }
    }

    /// Opens the capture group for `key` at the item pointer.
    pub fn save(&mut self, key: &CaptureKey) {
        let offset = self.thread.offset();
        self.thread.captures.open(key, offset);
    }

    /// Closes the capture group for `key` at the item pointer.
    pub fn stop(&mut self, key: &CaptureKey) {
        let offset = self.thread.offset();
        self.thread.captures.close(key, offset);
    }

    pub fn kill(&mut self) {
        self.thread.kill()
    }

    /// Marks the thread as a match. Under `Mode::Full` a thread that hasn't
    /// consumed the whole input is killed instead.
    pub fn accept(&mut self) {
        if self.scheduler.mode() == Mode::Full && !self.at_end() {
            self.kill()
        } else {
            self.thread.state = ThreadState::Match
        }
    }
}
