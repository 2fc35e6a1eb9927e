//! Provides for the compilation of a textual pattern into a program that
//! matches sequences of arbitrary items.
//!
//! # Example
//!
//! ```rust
//! use seqex_compiler::{compile, Registry};
//!
//! // Type names and guards used in a pattern are resolved against an
//! // explicit registry of predicates over the item type.
//! let registry = Registry::new()
//!     .with_type("Num", |token: &&str| token.parse::<i64>().is_ok())
//!     .with_type("Word", |token: &&str| token.chars().all(char::is_alphabetic))
//!     .with_guard("large", |token: &&str, _: &mut seqex_runtime::Variables| {
//!         token.parse::<i64>().map_or(false, |n| n > 100)
//!     });
//!
//! // A word followed by numbers, the last of which must be large and is
//! // captured as `price`.
//! let pattern = compile("^Word/Num*/(?<price>Num(large))$", &registry)
//!     .expect("pattern should compile");
//!
//! let input = ["apples", "3", "250"];
//! let mut matcher = pattern.matcher(Some(&input[..]));
//!
//! assert!(matcher.matches());
//! assert_eq!(Some(&["250"][..]), matcher.group("price"));
//! ```

use std::fmt::Display;

use seqex_runtime::{Matcher, Program};

mod parser;
mod registry;
pub mod tokenizer;

pub use parser::{parse, ParseErr, ParseErrKind};
pub use registry::{GuardCompiler, Registry, TypeResolver};

/// A compiled pattern, named after and carrying the text it was compiled
/// from.
pub struct Pattern<T> {
    program: Program<T>,
}

impl<T> Pattern<T> {
    pub fn new(program: Program<T>) -> Self {
        Self { program }
    }

    /// Binds the pattern to an input.
    pub fn matcher<'i>(&self, input: Option<&'i [T]>) -> Matcher<'_, 'i, T> {
        Matcher::new(&self.program, input)
    }

    pub fn program(&self) -> &Program<T> {
        &self.program
    }

    pub fn source(&self) -> Option<&str> {
        self.program.source()
    }

    pub fn into_program(self) -> Program<T> {
        self.program
    }
}

impl<T> Display for Pattern<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.program, f)
    }
}

impl<T> std::fmt::Debug for Pattern<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.program, f)
    }
}

/// Compiles a pattern, resolving its type names and guards through `env`.
///
/// # Example
///
/// ```
/// use seqex_compiler::{compile, ParseErrKind, Registry};
///
/// let registry = Registry::new().with_type("A", |c: &char| *c == 'a');
///
/// let err = compile("^A/B", &registry).unwrap_err();
/// assert_eq!(&ParseErrKind::UnresolvedType("B".to_string()), err.kind());
/// assert_eq!(3, err.offset());
/// ```
pub fn compile<T, E>(source: &str, env: &E) -> Result<Pattern<T>, ParseErr>
where
    T: 'static,
    E: TypeResolver<T> + GuardCompiler<T>,
{
    let postfix = tokenizer::tokenize(source).map(tokenizer::to_postfix)?;
    let instructions = parse(postfix, env)?;

    let program = Program::new(instructions)
        .with_name(source)
        .with_source(source);

    Ok(Pattern::new(program))
}
