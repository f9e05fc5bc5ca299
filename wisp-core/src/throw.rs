//! Non-local exits (§4.4, §7).
//!
//! Every fallible internal operation returns `Result<Value, Signal>` (§9
//! Design Note 1): no function communicates failure through a sentinel
//! return value plus a side channel. [`Interpreter::pending`] still mirrors
//! the in-flight signal as observable state, because `catch` and backtrace
//! formatting both need to inspect "is a non-local exit currently
//! unwinding" without having the `Result` in hand — see `eval.rs`.

use crate::value::Value;
use std::fmt;

/// The built-in error taxonomy (§7). `UserError` is what `(error ...)` and
/// friends construct; the other variants are raised internally by the core
/// and by extension type hooks (`bad-arg`, `setting-constant`, ...).
#[derive(Debug, Clone)]
pub enum LispError {
    /// Attempt to apply a value with no `HAS_APPLY` capability.
    InvalidFunction { callee: Value },
    /// An argument failed a type or range check. `index` is 1-based,
    /// matching `original_source`'s `signal_arg_error` (§8 scenario 4).
    BadArg { index: usize, value: Value },
    /// Required argument not supplied to a fixed-arity subr.
    MissingArg { index: usize },
    /// Mutation attempted on a frozen object (e.g. an immutable vector).
    SettingConstant { value: Value },
    FileError { message: String },
    /// General `(error "message" irritant...)` condition.
    Error {
        message: String,
        irritants: Vec<Value>,
    },
    /// Asynchronous interrupt delivered between evaluation steps.
    Interrupt,
    /// User-defined condition raised via a symbol tag and arbitrary data.
    UserError { symbol: Value, data: Vec<Value> },
}

impl fmt::Display for LispError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LispError::InvalidFunction { callee } => {
                write!(f, "invalid function: {callee}")
            }
            LispError::BadArg { index, value } => {
                write!(f, "bad argument #{index}: {value}")
            }
            LispError::MissingArg { index } => {
                write!(f, "missing argument #{index}")
            }
            LispError::SettingConstant { value } => {
                write!(f, "attempt to set constant: {value}")
            }
            LispError::FileError { message } => write!(f, "file error: {message}"),
            LispError::Error { message, irritants } => {
                write!(f, "{message}")?;
                for irritant in irritants {
                    write!(f, " {irritant}")?;
                }
                Ok(())
            }
            LispError::Interrupt => write!(f, "interrupt"),
            LispError::UserError { symbol, data } => {
                write!(f, "{symbol}")?;
                for datum in data {
                    write!(f, " {datum}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for LispError {}

/// Everything that can be in flight on the pending-exception slot: either
/// a built-in condition, or an arbitrary `(tag . value)` pair raised by
/// `throw` and awaiting a matching `catch` (§4.4).
#[derive(Debug, Clone)]
pub enum Signal {
    Error(LispError),
    Throw { tag: Value, value: Value },
}

impl Signal {
    pub fn error(err: LispError) -> Self {
        Signal::Error(err)
    }

    pub fn depth_exceeded() -> Self {
        Signal::Error(LispError::Error {
            message: "max-lisp-depth exceeded, possible infinite recursion?".to_string(),
            irritants: Vec::new(),
        })
    }

    pub fn bad_arg(index: usize, value: Value) -> Self {
        Signal::Error(LispError::BadArg { index, value })
    }

    /// Does this signal match a `catch` boundary tagged with `tag`?
    /// Built-in errors only match the distinguished `error` tag, passed in
    /// by the caller (catch/throw's tag equality is by `eq`, resolved at
    /// the symbol level in `eval.rs`).
    pub fn throw_tag(&self) -> Option<Value> {
        match self {
            Signal::Throw { tag, .. } => Some(*tag),
            Signal::Error(_) => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Error(err) => write!(f, "{err}"),
            Signal::Throw { tag, value } => write!(f, "throw to {tag}: {value}"),
        }
    }
}

impl std::error::Error for Signal {}
