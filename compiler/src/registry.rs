//! The capabilities the compiler needs from its environment: resolving type
//! names and compiling guard text into predicates.

use std::collections::HashMap;

use seqex_runtime::{Predicate, Variables};

/// Resolves a possibly dotted type name to an is-instance-of predicate.
pub trait TypeResolver<T> {
    fn resolve_type(&self, name: &str) -> Option<Predicate<T>>;
}

/// Compiles the verbatim text of a guard into a predicate. The type name is
/// `None` for guards attached to the `_` wildcard.
pub trait GuardCompiler<T> {
    fn compile_guard(&self, type_name: Option<&str>, source: &str) -> Result<Predicate<T>, String>;
}

/// An explicit table of named type predicates and guards. Guards are looked
/// up by their exact source text, ignoring surrounding whitespace.
///
/// # Example
///
/// ```
/// use seqex_compiler::{GuardCompiler, Registry, TypeResolver};
/// use seqex_runtime::Variables;
///
/// let registry = Registry::new()
///     .with_type("Digit", |c: &char| c.is_ascii_digit())
///     .with_guard("odd", |c: &char, _: &mut Variables| c.to_digit(10).map_or(false, |d| d % 2 == 1));
///
/// let mut vars = Variables::new();
/// let digit = registry.resolve_type("Digit").expect("type is registered");
/// assert_eq!(Ok(true), digit.test(&'7', &mut vars));
///
/// let odd = registry.compile_guard(Some("Digit"), " odd ").expect("guard is registered");
/// assert_eq!(Ok(false), odd.test(&'4', &mut vars));
///
/// assert!(registry.resolve_type("Letter").is_none());
/// assert!(registry.compile_guard(None, "even").is_err());
/// ```
pub struct Registry<T> {
    types: HashMap<String, Predicate<T>>,
    guards: HashMap<String, Predicate<T>>,
}

impl<T: 'static> Registry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
            guards: HashMap::new(),
        }
    }

    pub fn with_type<S, F>(mut self, name: S, f: F) -> Self
    where
        S: Into<String>,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        let predicate = Predicate::new(name.clone(), move |item, _| f(item));
        self.register_type(name, predicate);
        self
    }

    pub fn with_guard<S, F>(mut self, source: S, f: F) -> Self
    where
        S: Into<String>,
        F: Fn(&T, &mut Variables) -> bool + Send + Sync + 'static,
    {
        let source = source.into();
        let predicate = Predicate::new(source.trim(), f);
        self.register_guard(source, predicate);
        self
    }

    /// Registers a type predicate, replacing any previous registration.
    pub fn register_type<S: Into<String>>(&mut self, name: S, predicate: Predicate<T>) {
        self.types.insert(name.into(), predicate);
    }

    /// Registers a guard predicate, replacing any previous registration.
    pub fn register_guard<S: Into<String>>(&mut self, source: S, predicate: Predicate<T>) {
        self.guards.insert(source.into().trim().to_string(), predicate);
    }
}

impl<T: 'static> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypeResolver<T> for Registry<T> {
    fn resolve_type(&self, name: &str) -> Option<Predicate<T>> {
        self.types.get(name).cloned()
    }
}

impl<T> GuardCompiler<T> for Registry<T> {
    fn compile_guard(&self, _: Option<&str>, source: &str) -> Result<Predicate<T>, String> {
        self.guards
            .get(source.trim())
            .cloned()
            .ok_or_else(|| format!("no guard registered for `{}`", source.trim()))
    }
}
