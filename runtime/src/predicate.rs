//! Per-item predicates and the variables they may read and write.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::sync::Arc;

/// A value bound to a variable name during a match.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Index(usize),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{:?}", v),
            Value::Index(v) => write!(f, "#{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Index(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

/// The variable map carried by each thread. Variables are copied when a
/// thread forks, so a write is only visible along the path that made it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables(HashMap<String, Value>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.0.get_mut(name)
    }

    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, name: K, value: V) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Raised by a fallible predicate that could not be evaluated against an
/// item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardError {
    message: String,
}

impl GuardError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for GuardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "guard evaluation failed: {}", self.message)
    }
}

impl std::error::Error for GuardError {}

type PredicateFn<T> = dyn Fn(&T, &mut Variables) -> Result<bool, GuardError> + Send + Sync;

/// A labelled, shareable test applied to a single item.
///
/// # Example
///
/// ```
/// use seqex_runtime::{Predicate, Variables};
///
/// let even = Predicate::new("Even", |i: &i64, _| i % 2 == 0);
/// let counted = even.and(Predicate::new("count", |_: &i64, vars: &mut Variables| {
///     let seen = vars.get("seen").and_then(|v| v.as_int()).unwrap_or(0);
///     vars.insert("seen", seen + 1);
///     true
/// }));
///
/// let mut vars = Variables::new();
/// assert_eq!(Ok(false), counted.test(&3, &mut vars));
/// assert_eq!(Ok(true), counted.test(&4, &mut vars));
/// assert_eq!(Some(1), vars.get("seen").and_then(|v| v.as_int()));
/// ```
pub struct Predicate<T> {
    label: String,
    test: Arc<PredicateFn<T>>,
}

impl<T: 'static> Predicate<T> {
    pub fn new<S, F>(label: S, f: F) -> Self
    where
        S: Into<String>,
        F: Fn(&T, &mut Variables) -> bool + Send + Sync + 'static,
    {
        Self::fallible(label, move |item, vars| Ok(f(item, vars)))
    }

    /// Constructs a predicate whose evaluation may fail. A failure is
    /// treated as a rejection of the item.
    pub fn fallible<S, F>(label: S, f: F) -> Self
    where
        S: Into<String>,
        F: Fn(&T, &mut Variables) -> Result<bool, GuardError> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            test: Arc::new(f),
        }
    }

    /// Accepts every item.
    pub fn any() -> Self {
        Self::new("_", |_, _| true)
    }

    /// Short-circuiting conjunction of two predicates.
    pub fn and(self, other: Self) -> Self {
        let label = format!("{}({})", self.label, other.label);
        let (lhs, rhs) = (self.test, other.test);

        Self {
            label,
            test: Arc::new(
                move |item: &T, vars: &mut Variables| -> Result<bool, GuardError> {
                    Ok(lhs(item, vars)? && rhs(item, vars)?)
                },
            ),
        }
    }
}

impl<T> Predicate<T> {
    pub fn test(&self, item: &T, vars: &mut Variables) -> Result<bool, GuardError> {
        (self.test)(item, vars)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            test: Arc::clone(&self.test),
        }
    }
}

impl<T> Debug for Predicate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Predicate").field(&self.label).finish()
    }
}
