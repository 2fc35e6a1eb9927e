//! A stateful handle binding a program to one input, mirroring the familiar
//! `matches`/`looking_at`/`group` workflow of text regular expressions.

use crate::capture::CaptureKey;
use crate::engine::{Engine, EngineError, MatchResult, Mode};
use crate::predicate::{Value, Variables};
use crate::Program;

/// Binds a program to an input. Group accessors observe the most recent
/// successful attempt and are cleared by a failed one.
///
/// # Example
///
/// ```
/// use seqex_runtime::*;
///
/// // `(?<run>A*)` where `A` accepts the character 'a'.
/// let program = Program::default().with_instructions(vec![
///     Instruction::Save(InstSave::new("run")),
///     Instruction::Split(InstSplit::new(Target::relative(1), Target::relative(3))),
///     Instruction::Filter(InstFilter::new(Predicate::new("A", |c: &char, _| *c == 'a'))),
///     Instruction::Jump(InstJump::new(Target::relative(-2))),
///     Instruction::Stop(InstStop::new("run")),
///     Instruction::Match,
/// ]);
/// let input = ['a', 'a'];
/// let mut matcher = Matcher::new(&program, Some(&input[..]));
///
/// assert!(matcher.matches());
/// assert_eq!(Some(&input[..]), matcher.group("run"));
/// assert_eq!(1, matcher.group_count());
/// ```
pub struct Matcher<'p, 'i, T> {
    program: &'p Program<T>,
    input: Option<&'i [T]>,
    engine: Engine,
    variables: Variables,
    last: Option<MatchResult<'i, T>>,
}

impl<'p, 'i, T> Matcher<'p, 'i, T> {
    #[must_use]
    pub fn new(program: &'p Program<T>, input: Option<&'i [T]>) -> Self {
        Self {
            program,
            input,
            engine: Engine::default(),
            variables: Variables::new(),
            last: None,
        }
    }

    /// Configures the engine used for each attempt. The engine's mode is
    /// overridden by the attempt.
    pub fn with_engine(self, engine: Engine) -> Self {
        Self { engine, ..self }
    }

    /// Seeds the variables visible to predicates on every attempt.
    pub fn with_variables(self, variables: Variables) -> Self {
        Self { variables, ..self }
    }

    pub fn program(&self) -> &'p Program<T> {
        self.program
    }

    /// Returns true if the entire input satisfies the program. A step limit
    /// violation is reported as no match.
    pub fn matches(&mut self) -> bool {
        self.try_matches().unwrap_or(false)
    }

    pub fn try_matches(&mut self) -> Result<bool, EngineError> {
        self.attempt(Mode::Full)
    }

    /// Returns true if some prefix of the input, possibly empty, satisfies
    /// the program.
    pub fn looking_at(&mut self) -> bool {
        self.try_looking_at().unwrap_or(false)
    }

    pub fn try_looking_at(&mut self) -> Result<bool, EngineError> {
        self.attempt(Mode::Prefix)
    }

    fn attempt(&mut self, mode: Mode) -> Result<bool, EngineError> {
        self.last = None;
        let engine = self.engine.with_mode(mode);
        self.last = engine.run_with_variables(self.program, self.input, self.variables.clone())?;

        Ok(self.last.is_some())
    }

    /// The number of distinct capture keys the program can record.
    pub fn group_count(&self) -> usize {
        self.program.capture_keys().len()
    }

    /// Returns the items captured under `key` by the last successful attempt.
    pub fn group<K: Into<CaptureKey>>(&self, key: K) -> Option<&'i [T]> {
        self.last.as_ref().and_then(|m| m.group(key))
    }

    /// Returns a variable of the last successful attempt.
    pub fn get(&self, variable: &str) -> Option<&Value> {
        self.last.as_ref().and_then(|m| m.get(variable))
    }

    pub fn last_match(&self) -> Option<&MatchResult<'i, T>> {
        self.last.as_ref()
    }
}
