//! The scheduler that drains simulation threads in first-in, first-out order
//! and returns the first thread to reach a `Match`.

use std::collections::{HashMap, VecDeque};
use std::fmt::Display;

use crate::capture::{CaptureGroup, CaptureGroups, CaptureKey};
use crate::predicate::{Value, Variables};
use crate::thread::{Thread, ThreadId};
use crate::{InstIndex, Program};

/// Determines how much of the input a match must consume.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Any prefix of the input may satisfy the pattern.
    #[default]
    Prefix,
    /// The matching thread must have consumed the entire input.
    Full,
}

/// Represents all error types that may occur while running a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// More instructions were executed than the configured limit allows.
    StepLimitExceeded { limit: usize },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::StepLimitExceeded { limit } => {
                write!(f, "step limit of {} exceeded", limit)
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// Run configuration. An engine holds no per-run state and may be reused and
/// copied freely.
///
/// # Example
///
/// ```
/// use seqex_runtime::*;
///
/// // `A` where `A` accepts the character 'a'.
/// let program = Program::default().with_instructions(vec![
///     Instruction::Filter(InstFilter::new(Predicate::new("A", |c: &char, _| *c == 'a'))),
///     Instruction::Match,
/// ]);
/// let input = ['a', 'a'];
///
/// let prefix = Engine::new().run(&program, Some(&input[..]));
/// assert_eq!(Ok(Some(1)), prefix.map(|res| res.map(|m| m.end())));
///
/// let full = Engine::new().with_mode(Mode::Full).run(&program, Some(&input[..]));
/// assert!(matches!(full, Ok(None)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Engine {
    mode: Mode,
    step_limit: Option<usize>,
    deduplicate: bool,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            mode: Mode::Prefix,
            step_limit: None,
            deduplicate: true,
        }
    }

    pub fn with_mode(self, mode: Mode) -> Self {
        Self { mode, ..self }
    }

    /// Bounds the number of instructions a run may execute. The budget is
    /// checked each time a thread is dequeued.
    pub fn with_step_limit(self, limit: usize) -> Self {
        Self {
            step_limit: Some(limit),
            ..self
        }
    }

    /// Toggles the pruning of threads that reach an instruction and input
    /// position an earlier thread of the same run already explored with
    /// equal variables. Threads carrying different variables are never
    /// pruned, so pruning doesn't change the result of a run.
    pub fn with_state_deduplication(self, deduplicate: bool) -> Self {
        Self {
            deduplicate,
            ..self
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Executes a program against an input, returning the first thread to
    /// reach a match.
    pub fn run<'p, 'i, T>(
        &self,
        program: &'p Program<T>,
        input: Option<&'i [T]>,
    ) -> Result<Option<MatchResult<'i, T>>, EngineError> {
        self.run_with_variables(program, input, Variables::new())
    }

    /// Executes a program with the initial thread's variables seeded.
    pub fn run_with_variables<'p, 'i, T>(
        &self,
        program: &'p Program<T>,
        input: Option<&'i [T]>,
        variables: Variables,
    ) -> Result<Option<MatchResult<'i, T>>, EngineError> {
        let mut scheduler = Scheduler::new(self.mode, self.deduplicate);
        let seed_id = scheduler.next_id();
        scheduler.schedule(Thread::seed(seed_id, program, input, variables));

        let mut steps = 0;
        while let Some(mut thread) = scheduler.dequeue() {
            if let Some(limit) = self.step_limit.filter(|&limit| steps > limit) {
                return Err(EngineError::StepLimitExceeded { limit });
            }

            steps += thread.run(&mut scheduler);
            if thread.is_match() {
                // the first match wins, any queued threads are dropped.
                return Ok(Some(thread.into_match()));
            }
        }

        Ok(None)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Executes a given program against an input with the default engine. If a
/// match is found, the matching thread's captures and variables are
/// returned.
pub fn run<'p, 'i, T>(program: &'p Program<T>, input: Option<&'i [T]>) -> Option<MatchResult<'i, T>> {
    // the default engine has no step limit and therefore can't fail.
    Engine::default().run(program, input).ok().flatten()
}

/// The per-run queue of threads along with the thread id counter and the
/// record of explored states, keyed by instruction and input offset.
pub(crate) struct Scheduler<'p, 'i, T> {
    queue: VecDeque<Thread<'p, 'i, T>>,
    next_id: u64,
    mode: Mode,
    explored: Option<HashMap<(InstIndex, usize), Vec<Variables>>>,
}

impl<'p, 'i, T> Scheduler<'p, 'i, T> {
    pub(crate) fn new(mode: Mode, deduplicate: bool) -> Self {
        Self {
            queue: VecDeque::new(),
            next_id: 0,
            mode,
            explored: deduplicate.then(HashMap::new),
        }
    }

    pub(crate) fn next_id(&mut self) -> ThreadId {
        let id = ThreadId::from(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn mode(&self) -> Mode {
        self.mode
    }

    /// Queues a thread behind all currently queued threads.
    pub(crate) fn schedule(&mut self, thread: Thread<'p, 'i, T>) {
        self.queue.push_back(thread)
    }

    pub(crate) fn dequeue(&mut self) -> Option<Thread<'p, 'i, T>> {
        self.queue.pop_front()
    }

    /// Records a visit to an instruction at an input offset, returning
    /// `false` if the state had been explored before with the same
    /// variables.
    pub(crate) fn explore(
        &mut self,
        inst: InstIndex,
        offset: usize,
        variables: &Variables,
    ) -> bool {
        let visitors = match &mut self.explored {
            Some(explored) => explored.entry((inst, offset)).or_default(),
            None => return true,
        };

        if visitors.contains(variables) {
            false
        } else {
            visitors.push(variables.clone());
            true
        }
    }
}

/// The terminal state of the thread that matched.
#[derive(Debug)]
pub struct MatchResult<'i, T> {
    thread: ThreadId,
    input: &'i [T],
    end: usize,
    captures: CaptureGroups,
    variables: Variables,
}

impl<'i, T> MatchResult<'i, T> {
    pub(crate) fn new(
        thread: ThreadId,
        input: &'i [T],
        end: usize,
        captures: CaptureGroups,
        variables: Variables,
    ) -> Self {
        Self {
            thread,
            input,
            end,
            captures,
            variables,
        }
    }

    /// The id of the matching thread within its run.
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// The number of items consumed by the match.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Returns true if the match consumed the entire input.
    pub fn is_full(&self) -> bool {
        self.end == self.input.len()
    }

    /// Returns the items captured under `key`.
    pub fn group<K: Into<CaptureKey>>(&self, key: K) -> Option<&'i [T]> {
        let input = self.input;
        self.capture(key).map(|group| group.items(input))
    }

    pub fn capture<K: Into<CaptureKey>>(&self, key: K) -> Option<&CaptureGroup> {
        self.captures.get(&key.into())
    }

    pub fn captures(&self) -> &CaptureGroups {
        &self.captures
    }

    pub fn get(&self, variable: &str) -> Option<&Value> {
        self.variables.get(variable)
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn into_variables(self) -> Variables {
        self.variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InstFilter, InstSplit, Instruction, Predicate, Target};

    fn is(c: char) -> Instruction<char> {
        Instruction::Filter(InstFilter::new(Predicate::new(c.to_string(), move |v: &char, _| {
            *v == c
        })))
    }

    fn split(x: u32, y: u32) -> Instruction<char> {
        Instruction::Split(InstSplit::new(Target::absolute(x), Target::absolute(y)))
    }

    fn chars(input: &str) -> Vec<char> {
        input.chars().collect()
    }

    /// `(a?)*$`, an empty loop that must terminate.
    fn empty_loop() -> Program<char> {
        Program::default().with_instructions(vec![
            split(1, 4),
            split(2, 3),
            is('a'),
            Instruction::Jump(crate::InstJump::new(Target::absolute(0))),
            Instruction::EndInput,
            Instruction::Match,
        ])
    }

    #[test]
    fn should_be_deterministic_and_leave_program_intact() {
        let prog = empty_loop();
        let dump = prog.to_string();
        let input = chars("aa");

        let first = run(&prog, Some(&input[..])).map(|m| (m.thread(), m.end()));
        let second = run(&prog, Some(&input[..])).map(|m| (m.thread(), m.end()));

        assert_eq!(first, second);
        assert_eq!(dump, prog.to_string());
    }

    #[test]
    fn should_terminate_empty_loops_with_and_without_deduplication() {
        let prog = empty_loop();

        let tests = vec![
            (Some(2), "aa", true),
            (Some(2), "aa", false),
            (None, "aab", true),
            (None, "aab", false),
        ];

        for (case_id, (expected_end, input, deduplicate)) in tests.into_iter().enumerate() {
            let input = chars(input);
            let res = Engine::new()
                .with_state_deduplication(deduplicate)
                .run(&prog, Some(&input[..]));
            assert_eq!(
                (case_id, Ok(expected_end)),
                (case_id, res.map(|m| m.map(|m| m.end())))
            );
        }
    }

    #[test]
    fn should_return_first_match_in_queue_order() {
        // a*, the primary thread exhausts the input and dies on the final
        // filter, its first queued sibling matches without consuming.
        let prog = Program::default().with_instructions(vec![
            split(1, 3),
            is('a'),
            Instruction::Jump(crate::InstJump::new(Target::absolute(0))),
            Instruction::Match,
        ]);
        let input = chars("aaa");

        let tests = vec![(0, Mode::Prefix), (3, Mode::Full)];

        for (case_id, (expected_end, mode)) in tests.into_iter().enumerate() {
            let res = Engine::new().with_mode(mode).run(&prog, Some(&input[..]));
            assert_eq!(
                (case_id, Ok(Some(expected_end))),
                (case_id, res.map(|m| m.map(|m| m.end())))
            );
        }
    }

    #[test]
    fn should_fail_when_step_limit_is_exceeded() {
        let prog = empty_loop();
        let input = chars("aaaaaaaa");

        let limited = Engine::new().with_step_limit(4).run(&prog, Some(&input[..]));
        assert_eq!(
            Some(EngineError::StepLimitExceeded { limit: 4 }),
            limited.err()
        );

        let generous = Engine::new().with_step_limit(1_000).run(&prog, Some(&input[..]));
        assert!(matches!(generous, Ok(Some(_))));
    }

    #[test]
    fn should_isolate_variables_between_forks() {
        // the primary branch overwrites a variable after the fork and fails.
        let set = |value: i64, accept: bool| {
            Predicate::new(format!("x = {}", value), move |_: &char, vars: &mut Variables| {
                vars.insert("x", value);
                accept
            })
        };
        let prog = Program::default().with_instructions(vec![
            Instruction::Filter(InstFilter::new(set(1, true))),
            split(2, 3),
            Instruction::Filter(InstFilter::new(set(2, false))),
            Instruction::Match,
        ]);
        let input = chars("ab");

        let res = run(&prog, Some(&input[..])).expect("pattern should match");
        assert_eq!(1, res.end());
        assert_eq!(Some(&Value::Int(1)), res.get("x"));
    }

    #[test]
    fn should_not_prune_threads_reaching_a_state_with_different_variables() {
        let set = |value: i64| {
            Predicate::new(format!("x = {}", value), move |c: &char, vars: &mut Variables| {
                vars.insert("x", value);
                *c == 'a'
            })
        };
        let requires_two = Predicate::new("x == 2", |c: &char, vars: &mut Variables| {
            *c == 'b' && vars.get("x") == Some(&Value::Int(2))
        });
        // ^(A(x = 1)|A(x = 2))/B(x == 2)$, both branches reach the filter
        // on `B` at the same offset. Only the second carries x = 2.
        let prog = Program::default().with_instructions(vec![
            split(1, 3),
            Instruction::Filter(InstFilter::new(set(1))),
            Instruction::Jump(crate::InstJump::new(Target::absolute(4))),
            Instruction::Filter(InstFilter::new(set(2))),
            Instruction::Filter(InstFilter::new(requires_two)),
            Instruction::EndInput,
            Instruction::Match,
        ]);
        let input = chars("ab");

        for (case_id, deduplicate) in [true, false].into_iter().enumerate() {
            let res = Engine::new()
                .with_state_deduplication(deduplicate)
                .run(&prog, Some(&input[..]))
                .map(|m| m.map(|m| (m.end(), m.get("x").cloned())));
            assert_eq!(
                (case_id, Ok(Some((2, Some(Value::Int(2)))))),
                (case_id, res)
            );
        }
    }

    #[test]
    fn should_seed_initial_variables() {
        let limit = Predicate::new("under_limit", |c: &char, vars: &mut Variables| {
            let limit = vars.get("limit").and_then(Value::as_int).unwrap_or(0);
            (*c as i64 - 'a' as i64) < limit
        });
        let prog = Program::default().with_instructions(vec![
            Instruction::Filter(InstFilter::new(limit)),
            Instruction::Match,
        ]);
        let input = chars("c");

        let tests = vec![(false, 2), (true, 3)];

        for (case_id, (expected_res, limit)) in tests.into_iter().enumerate() {
            let res = Engine::new().run_with_variables(
                &prog,
                Some(&input[..]),
                Variables::new().with("limit", limit as i64),
            );
            assert_eq!(
                (case_id, expected_res),
                (case_id, matches!(res, Ok(Some(_))))
            );
        }
    }

    #[test]
    fn should_kill_only_the_thread_whose_guard_fails() {
        let fails = Predicate::fallible("fails", |_: &char, _| {
            Err(crate::GuardError::new("unsupported"))
        });
        let prog = Program::default().with_instructions(vec![
            split(1, 2),
            Instruction::Filter(InstFilter::new(fails)),
            is('a'),
            Instruction::Match,
        ]);
        let input = chars("a");

        assert!(run(&prog, Some(&input[..])).is_some());
    }

    #[test]
    fn should_match_zero_width_patterns_without_input() {
        // ^$
        let prog: Program<char> = Program::default().with_instructions(vec![
            Instruction::BeginInput,
            Instruction::EndInput,
            Instruction::Match,
        ]);
        let empty: Vec<char> = vec![];

        assert!(run(&prog, None).is_some());
        assert!(run(&prog, Some(&empty[..])).is_some());
        assert!(run(&prog, Some(&['a'][..])).is_none());
    }

    #[test]
    fn should_share_programs_across_os_threads() {
        let prog = empty_loop();
        let inputs = vec![chars("aa"), chars("ab"), chars("b")];

        let results: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = inputs
                .iter()
                .map(|input| {
                    let prog = &prog;
                    s.spawn(move || {
                        Engine::new()
                            .with_mode(Mode::Full)
                            .run(prog, Some(&input[..]))
                            .map(|m| m.is_some())
                            .unwrap_or(false)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(false))
                .collect()
        });

        assert_eq!(vec![true, false, false], results);
    }
}
