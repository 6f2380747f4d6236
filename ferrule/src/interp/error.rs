//! Runtime errors for the execution core

use thiserror::Error;

use super::coerce::CastError;
use super::function::Arity;
use super::value::Value;

/// Runtime error raised by dispatch, scoping or a script `throw`
#[derive(Debug, Clone, Error)]
#[error("Runtime error: {message}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Kinds of runtime errors
#[derive(Debug, Clone)]
pub enum ErrorKind {
    /// Undefined variable
    UndefinedVariable,
    /// Undefined function
    UndefinedFunction,
    /// Record has no such method
    UndefinedMethod,
    /// No class registered under the name
    UndefinedClass,
    /// Called a value that is not a function
    NotCallable,
    /// A forced cast failed while binding an argument
    TypeCoercion { param: usize, cast: CastError },
    /// Argument count mismatch
    ArityMismatch,
    /// Prototype string rejected at registration
    InvalidPrototype,
    /// User-defined body called with no evaluator installed
    MissingEvaluator,
    /// Call depth limit reached
    StackOverflow,
    /// Script exception carrying its payload
    Thrown(Value),
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        // Payloads are not compared: a Thrown is a Thrown
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl RuntimeError {
    pub fn undefined_variable(name: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::UndefinedVariable,
            message: format!("undefined variable: {name}"),
        }
    }

    pub fn undefined_function(name: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::UndefinedFunction,
            message: format!("undefined function: {name}"),
        }
    }

    pub fn undefined_method(receiver: &str, name: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::UndefinedMethod,
            message: format!("undefined method: {receiver}.{name}"),
        }
    }

    pub fn undefined_class(name: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::UndefinedClass,
            message: format!("undefined class: {name}"),
        }
    }

    pub fn not_callable(type_name: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::NotCallable,
            message: format!("value of type {type_name} is not callable"),
        }
    }

    pub fn coercion(function: &str, param: usize, cast: CastError) -> Self {
        RuntimeError {
            kind: ErrorKind::TypeCoercion { param, cast },
            message: format!("{function}: parameter {param}: {cast}"),
        }
    }

    /// Write to a linked variable whose declared type rejected the value
    pub fn assignment(name: &str, cast: CastError) -> Self {
        RuntimeError {
            kind: ErrorKind::TypeCoercion { param: 0, cast },
            message: format!("cannot assign to {name}: {cast}"),
        }
    }

    pub fn arity_mismatch(name: &str, expected: Arity, got: usize) -> Self {
        RuntimeError {
            kind: ErrorKind::ArityMismatch,
            message: format!("function {name} expects {expected} argument(s), got {got}"),
        }
    }

    pub fn invalid_prototype(prototype: &str, reason: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::InvalidPrototype,
            message: format!("invalid prototype {prototype:?}: {reason}"),
        }
    }

    pub fn missing_evaluator(name: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::MissingEvaluator,
            message: format!("no evaluator installed to run user-defined function {name}"),
        }
    }

    pub fn stack_overflow(limit: usize) -> Self {
        RuntimeError {
            kind: ErrorKind::StackOverflow,
            message: format!("stack overflow: call depth exceeded {limit}"),
        }
    }

    pub fn thrown(payload: Value) -> Self {
        RuntimeError {
            message: format!("uncaught exception: {payload}"),
            kind: ErrorKind::Thrown(payload),
        }
    }

    /// Append a "did you mean" hint to the message
    pub fn with_hint(mut self, hint: &str) -> Self {
        if !hint.is_empty() {
            self.message.push_str(hint);
        }
        self
    }

    pub fn is_thrown(&self) -> bool {
        matches!(self.kind, ErrorKind::Thrown(_))
    }

    /// Exception payload, if this is a script exception
    pub fn payload(&self) -> Option<&Value> {
        match &self.kind {
            ErrorKind::Thrown(payload) => Some(payload),
            _ => None,
        }
    }

    /// Turn any error into a script exception.
    ///
    /// Non-thrown errors become a `Thrown` whose payload is the message.
    pub fn into_thrown(self) -> Self {
        match self.kind {
            ErrorKind::Thrown(_) => self,
            _ => RuntimeError::thrown(Value::string(self.message)),
        }
    }

    /// Payload of a script exception, or the message as a string value
    pub fn into_payload(self) -> Value {
        match self.kind {
            ErrorKind::Thrown(payload) => payload,
            _ => Value::string(self.message),
        }
    }
}

/// Result type for interpreter operations
pub type InterpResult<T> = Result<T, RuntimeError>;
