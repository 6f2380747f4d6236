//! Execution core: values, containers, scopes and dispatch

pub mod coerce;
pub mod compare;
pub mod container;
pub mod error;
pub mod function;
pub mod guard;
pub mod higher_order;
pub mod record;
pub mod resource;
pub mod runtime;
pub mod safe_mode;
pub mod scope;
pub mod value;

pub use coerce::{coerce, CastError};
pub use compare::{compare, equal, order};
pub use container::OrderedMap;
pub use error::{ErrorKind, InterpResult, RuntimeError};
pub use function::{Arity, Function, FunctionBody, NativeFn, Origin, ParamSpec, Prototype, Signature};
pub use guard::ScopedRuntime;
pub use record::{Class, Record};
pub use resource::Resource;
pub use runtime::{Evaluator, ExceptionState, Outcome, Runtime, MAX_REPORTS, RECEIVER_NAME, VARARGS_NAME};
pub use safe_mode::{SafeMode, SafeModeError};
pub use scope::{Binding, ScopeStack};
pub use value::{Tag, Value};
