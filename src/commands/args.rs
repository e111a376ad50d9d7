//! Typed command argument contracts.
//!
//! Factories never index raw argument strings themselves. Each command family
//! defines a struct implementing [`CommandArgs`], so a bad number is reported
//! once, with the command name and the parameter that failed, before anything
//! is built.

use std::fmt;
use std::time::Duration;

use crate::error::ScriptError;

/// Trait for typed command arguments.
///
/// # Contract
///
/// - `parse()` receives arguments already checked against the command's
///   [`Arity`], so indexing up to `arity.min` is safe.
/// - Every failure is a [`ScriptError::Argument`] naming `command`.
pub trait CommandArgs: Sized {
    fn parse(command: &str, args: &[String]) -> Result<Self, ScriptError>;
}

/// Accepted argument count of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    /// `None` means unbounded
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub const fn any() -> Self {
        Self { min: 0, max: None }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    pub fn check(&self, command: &str, count: usize) -> Result<(), ScriptError> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(ScriptError::argument(
                command,
                self.to_string(),
                format!("got {}", count),
            ))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (0, Some(0)) => write!(f, "no arguments"),
            (1, Some(1)) => write!(f, "1 argument"),
            (min, Some(max)) if min == max => write!(f, "{} arguments", min),
            (min, Some(max)) => write!(f, "{} to {} arguments", min, max),
            (0, None) => write!(f, "any number of arguments"),
            (min, None) => write!(f, "at least {} arguments", min),
        }
    }
}

/// A finite decimal number.
pub(crate) fn number(command: &str, param: &str, raw: &str) -> Result<f64, ScriptError> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ScriptError::argument(
            command,
            format!("a number for '{}'", param),
            format!("got '{}'", raw),
        )),
    }
}

/// A whole number.
pub(crate) fn integer(command: &str, param: &str, raw: &str) -> Result<i64, ScriptError> {
    raw.parse::<i64>().map_err(|_| {
        ScriptError::argument(
            command,
            format!("an integer for '{}'", param),
            format!("got '{}'", raw),
        )
    })
}

/// A motor power in `[-1, 1]`.
pub(crate) fn power(command: &str, param: &str, raw: &str) -> Result<f64, ScriptError> {
    let value = number(command, param, raw)?;
    if !(-1.0..=1.0).contains(&value) {
        return Err(ScriptError::argument(
            command,
            format!("'{}' between -1 and 1", param),
            format!("got {}", value),
        ));
    }
    Ok(value)
}

/// A non-negative whole number of milliseconds.
pub(crate) fn millis(command: &str, param: &str, raw: &str) -> Result<Duration, ScriptError> {
    raw.parse::<u64>().map(Duration::from_millis).map_err(|_| {
        ScriptError::argument(
            command,
            format!("a non-negative integer of milliseconds for '{}'", param),
            format!("got '{}'", raw),
        )
    })
}

/// A non-negative number of seconds.
pub(crate) fn seconds(command: &str, param: &str, raw: &str) -> Result<Duration, ScriptError> {
    let value = number(command, param, raw)?;
    Duration::try_from_secs_f64(value).map_err(|_| {
        ScriptError::argument(
            command,
            format!("a non-negative number of seconds for '{}'", param),
            format!("got {}", value),
        )
    })
}
