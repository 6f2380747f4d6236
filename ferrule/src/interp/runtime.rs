//! The runtime: scope stack, registration tables and the call protocol

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::{debug, error, trace, warn};

use super::container::OrderedMap;
use super::error::{InterpResult, RuntimeError};
use super::function::{Function, FunctionBody, Implementation, NativeFn, Origin, Signature};
use super::guard::ScopedRuntime;
use super::record::Class;
use super::safe_mode::{SafeMode, SafeModeError};
use super::scope::{Binding, ScopeStack};
use super::value::{Tag, Value};
use crate::config::RuntimeConfig;
use crate::util::{find_similar_name, format_suggestion_hint};

/// Stack growth parameters for deep re-entrant dispatch
const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

/// Pending reports kept before the oldest are dropped
pub const MAX_REPORTS: usize = 256;

/// Name under which a method body sees its receiver
pub const RECEIVER_NAME: &str = "self";

/// Name under which a user-defined body sees arguments past its parameters
pub const VARARGS_NAME: &str = "varargs";

/// Runs user-defined function bodies.
///
/// Arguments are already bound by name in a fresh scope when `eval_body` is
/// called; the evaluator reads them with `Runtime::lookup`.
pub trait Evaluator {
    fn eval_body(&self, runtime: &mut Runtime, signature: &Signature, body: &FunctionBody) -> InterpResult<Value>;
}

/// Exception state machine: `Normal -> Raised -> {Caught, Unhandled}`
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ExceptionState {
    #[default]
    Normal,
    Raised(Value),
    Caught(Value),
    Unhandled(Value),
}

/// Result of a `try_catch` block
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(Value),
    Caught(Value),
}

/// Global names registered by one extension module
#[derive(Debug, Clone, Default, PartialEq)]
struct ModuleRecord {
    globals: Vec<String>,
    classes: Vec<String>,
}

pub struct Runtime {
    scopes: ScopeStack,
    classes: FxHashMap<Rc<str>, Rc<Class>>,
    modules: OrderedMap<ModuleRecord>,
    /// Names registered by the module whose init routine is running
    loading: Option<ModuleRecord>,
    evaluator: Option<Rc<dyn Evaluator>>,
    safe_mode: SafeMode,
    call_depth: usize,
    max_call_depth: usize,
    reports: Vec<String>,
    exception: ExceptionState,
}

impl Runtime {
    /// Create a runtime with the default configuration
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::default())
    }

    pub fn with_config(config: &RuntimeConfig) -> Self {
        Runtime {
            scopes: ScopeStack::with_order(config.initial_order),
            classes: FxHashMap::default(),
            modules: OrderedMap::new(),
            loading: None,
            evaluator: None,
            safe_mode: config.safe_mode.map_or_else(SafeMode::new, SafeMode::enabled),
            call_depth: 0,
            max_call_depth: config.max_call_depth,
            reports: Vec::new(),
            exception: ExceptionState::Normal,
        }
    }

    /// Install the evaluator that runs user-defined bodies
    pub fn set_evaluator(&mut self, evaluator: impl Evaluator + 'static) {
        self.evaluator = Some(Rc::new(evaluator));
    }

    pub fn has_evaluator(&self) -> bool {
        self.evaluator.is_some()
    }

    // ------------------------------------------------------------------
    // Scopes and variables
    // ------------------------------------------------------------------

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    pub(crate) fn scopes_mut(&mut self) -> &mut ScopeStack {
        &mut self.scopes
    }

    pub fn depth(&self) -> usize {
        self.scopes.depth()
    }

    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    pub(crate) fn restore_call_depth(&mut self, depth: usize) {
        self.call_depth = depth;
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    /// Push a scope; returns the new scope index
    pub fn enter_scope(&mut self) -> usize {
        self.scopes.push_scope()
    }

    /// Pop the innermost scope. Returns `false` at the global scope, which
    /// is never popped.
    pub fn leave_scope(&mut self) -> bool {
        if self.scopes.depth() <= 1 {
            return false;
        }
        self.scopes.pop_scope();
        true
    }

    /// Push a scope that is popped when the guard drops
    pub fn scoped(&mut self) -> ScopedRuntime<'_> {
        ScopedRuntime::new(self)
    }

    /// Define a variable in the innermost scope
    pub fn define(&mut self, name: &str, value: Value) {
        self.scopes.define(name, value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.scopes.get(name)
    }

    pub fn get_variable(&self, name: &str) -> InterpResult<Value> {
        self.lookup(name).ok_or_else(|| {
            let names = self.scopes.visible_names();
            let hint = format_suggestion_hint(find_similar_name(name, &names, 2));
            RuntimeError::undefined_variable(name).with_hint(&hint)
        })
    }

    /// Assign to the nearest binding, or define one in the innermost scope
    pub fn assign(&mut self, name: &str, value: Value) -> InterpResult<()> {
        self.scopes
            .assign(name, value)
            .map_err(|cast| RuntimeError::assignment(name, cast))
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a native function in the global scope.
    ///
    /// Registering a name again adds an overload that takes precedence.
    pub fn register_function(
        &mut self,
        name: &str,
        function: NativeFn,
        arg_count: usize,
        prototype: &str,
        return_type: char,
    ) -> InterpResult<Rc<Signature>> {
        let signature = Signature::native(name, function, arg_count, prototype, return_type)?;
        Ok(self.register_signature(signature))
    }

    /// Register a function whose body runs through the installed evaluator
    pub fn register_user_function(
        &mut self,
        name: &str,
        params: &[&str],
        prototype: &str,
        return_type: char,
        body: FunctionBody,
    ) -> InterpResult<Rc<Signature>> {
        let signature = Signature::user(name, params, prototype, return_type, body)?;
        Ok(self.register_signature(signature))
    }

    pub fn register_signature(&mut self, signature: Signature) -> Rc<Signature> {
        let signature = Rc::new(signature);
        debug!(
            name = signature.name(),
            prototype = %signature.prototype(),
            origin = ?signature.origin(),
            "registering function"
        );
        self.record_global(signature.name());
        self.scopes.define_global_function(Rc::clone(&signature));
        signature
    }

    /// Remove every overload registered under `name`
    pub fn unregister_function(&mut self, name: &str) -> bool {
        if !matches!(self.scopes.global().get_keyed(name), Some(Binding::Function(_))) {
            return false;
        }
        debug!(name, "unregistering function");
        self.scopes.unbind_global(name).is_some()
    }

    /// Share a typed cell with the host as a global variable
    pub fn register_variable(&mut self, name: &str, tag: Tag, cell: Rc<RefCell<Value>>) {
        debug!(name, %tag, "linking variable");
        self.record_global(name);
        self.scopes.link(name, tag, cell);
    }

    pub fn unregister_variable(&mut self, name: &str) -> bool {
        if !matches!(self.scopes.global().get_keyed(name), Some(Binding::Linked { .. })) {
            return false;
        }
        debug!(name, "unlinking variable");
        self.scopes.unbind_global(name).is_some()
    }

    pub fn register_class(&mut self, class: Class) -> Rc<Class> {
        let class = Rc::new(class);
        debug!(name = class.name(), parent = ?class.parent().map(|p| p.name()), "registering class");
        if let Some(loading) = &mut self.loading {
            loading.classes.push(class.name().to_string());
        }
        self.classes.insert(Rc::from(class.name()), Rc::clone(&class));
        class
    }

    pub fn unregister_class(&mut self, name: &str) -> bool {
        debug!(name, "unregistering class");
        self.classes.remove(name).is_some()
    }

    pub fn class(&self, name: &str) -> Option<&Rc<Class>> {
        self.classes.get(name)
    }

    /// Every global function signature, in registration order
    pub fn functions(&self) -> Vec<Rc<Signature>> {
        self.scopes
            .global()
            .values()
            .filter_map(|binding| match binding {
                Binding::Function(function) => Some(function),
                _ => None,
            })
            .flat_map(|function| function.overloads().iter().cloned())
            .collect()
    }

    fn record_global(&mut self, name: &str) {
        if let Some(loading) = &mut self.loading {
            if !loading.globals.iter().any(|n| n == name) {
                loading.globals.push(name.to_string());
            }
        }
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Call one signature: validate the count, apply forced casts, run the
    /// body in a fresh scope and pop it on every exit path
    pub fn call_signature(&mut self, signature: &Signature, args: Vec<Value>) -> InterpResult<Value> {
        self.dispatch(signature, args, None)
    }

    /// Call an overload set, picking the newest signature that accepts the
    /// argument count
    pub fn call(&mut self, function: &Function, args: Vec<Value>) -> InterpResult<Value> {
        let signature = function
            .resolve(args.len())
            .cloned()
            .ok_or_else(|| RuntimeError::undefined_function(function.name()))?;
        self.call_signature(&signature, args)
    }

    /// Call a function value, or a string naming a function
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> InterpResult<Value> {
        match callee {
            Value::Function(function) => {
                let function = Rc::clone(function);
                self.call(&function, args)
            }
            Value::Str(_) => {
                let name = callee.as_str().unwrap_or_default().into_owned();
                self.call_by_name(&name, args)
            }
            other => Err(RuntimeError::not_callable(other.type_name())),
        }
    }

    pub fn call_by_name(&mut self, name: &str, args: Vec<Value>) -> InterpResult<Value> {
        let function = self
            .scopes
            .lookup_function(name)
            .ok_or_else(|| self.undefined_function(name))?;
        self.call(&function, args)
    }

    /// Call a method on a record.
    ///
    /// Natives get the receiver as argument 0; user-defined bodies see it
    /// bound as `self`. The receiver is updated in place with whatever the
    /// method left there.
    pub fn call_method(&mut self, receiver: &mut Value, name: &str, args: Vec<Value>) -> InterpResult<Value> {
        let function = match receiver.as_record() {
            Some(record) => record
                .method(name)
                .cloned()
                .ok_or_else(|| RuntimeError::undefined_method(record.class().unwrap_or("record"), name))?,
            None => return Err(RuntimeError::undefined_method(receiver.type_name(), name)),
        };
        let argc = args.len();
        let signature = function
            .overloads()
            .iter()
            .rev()
            .find(|sig| sig.arity().accepts(argc + receiver_slots(sig)))
            .or_else(|| function.newest())
            .cloned()
            .ok_or_else(|| RuntimeError::undefined_method(function.name(), name))?;
        self.dispatch(&signature, args, Some(receiver))
    }

    /// Build a record from a registered class and run its constructor
    pub fn instantiate(&mut self, class: &str, args: Vec<Value>) -> InterpResult<Value> {
        let class = self
            .classes
            .get(class)
            .cloned()
            .ok_or_else(|| RuntimeError::undefined_class(class))?;
        let mut instance = Value::record(class.template());
        if let Some(constructor) = class.find_constructor().cloned() {
            self.dispatch(&constructor, args, Some(&mut instance))?;
        }
        Ok(instance)
    }

    fn undefined_function(&self, name: &str) -> RuntimeError {
        let names = self.scopes.visible_names();
        let hint = format_suggestion_hint(find_similar_name(name, &names, 2));
        RuntimeError::undefined_function(name).with_hint(&hint)
    }

    fn dispatch(
        &mut self,
        signature: &Signature,
        args: Vec<Value>,
        receiver: Option<&mut Value>,
    ) -> InterpResult<Value> {
        if self.call_depth >= self.max_call_depth {
            return Err(RuntimeError::stack_overflow(self.max_call_depth));
        }
        trace!(
            function = signature.name(),
            argc = args.len(),
            depth = self.call_depth,
            "dispatch"
        );
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            let mut frame = self.scoped();
            frame.call_depth += 1;
            frame.invoke(signature, args, receiver)
        })
    }

    /// Body of a call, run inside the frame scope
    fn invoke(
        &mut self,
        signature: &Signature,
        args: Vec<Value>,
        receiver: Option<&mut Value>,
    ) -> InterpResult<Value> {
        match signature.implementation() {
            Implementation::Native(function) => match receiver {
                Some(receiver) => {
                    let mut full = Vec::with_capacity(args.len() + 1);
                    full.push(receiver.clone());
                    full.extend(args);
                    let mut args = signature.bind(full)?;
                    // Records only coerce to themselves, so the bound slot
                    // can take the receiver itself and avoid a copy on write
                    args[0] = std::mem::take(receiver);
                    let result = function(self, &mut args);
                    *receiver = std::mem::take(&mut args[0]);
                    result
                }
                None => {
                    let mut args = signature.bind(args)?;
                    function(self, &mut args)
                }
            },
            Implementation::User { params, body } => {
                let evaluator = self
                    .evaluator
                    .clone()
                    .ok_or_else(|| RuntimeError::missing_evaluator(signature.name()))?;
                let args = signature.bind(args)?;
                self.bind_params(params, args);
                let Some(receiver) = receiver else {
                    return evaluator.eval_body(self, signature, body);
                };
                // The body may leave inner scopes behind when it throws, so
                // the receiver is read back from the frame scope itself
                let frame = self.scopes.depth() - 1;
                self.define(RECEIVER_NAME, std::mem::take(receiver));
                let result = evaluator.eval_body(self, signature, body);
                if let Some(updated) = self.frame_binding(frame, RECEIVER_NAME) {
                    *receiver = updated;
                }
                result
            }
        }
    }

    fn bind_params(&mut self, params: &[Rc<str>], args: Vec<Value>) {
        let mut args = args.into_iter();
        for name in params {
            let value = args.next().unwrap_or_default();
            self.scopes.define(name, value);
        }
        let surplus: OrderedMap<Value> = args.collect();
        if !surplus.is_empty() {
            self.scopes.define(VARARGS_NAME, Value::array(surplus));
        }
    }

    fn frame_binding(&self, frame: usize, name: &str) -> Option<Value> {
        self.scopes
            .scope_at(frame)
            .and_then(|scope| scope.get_keyed(name))
            .map(Binding::value)
    }

    // ------------------------------------------------------------------
    // Exceptions
    // ------------------------------------------------------------------

    /// Raise a script exception; return the result as `Err` to unwind
    pub fn throw(&mut self, payload: Value) -> RuntimeError {
        debug!(payload = %payload, depth = self.scopes.depth(), "exception raised");
        self.exception = ExceptionState::Raised(payload.clone());
        RuntimeError::thrown(payload)
    }

    pub fn exception_state(&self) -> &ExceptionState {
        &self.exception
    }

    /// Handler boundary.
    ///
    /// A script exception from `body` is caught here: the scope and call
    /// depth recorded on entry are restored and the payload returned. Other
    /// errors pass through after the same restoration.
    pub fn try_catch(&mut self, body: impl FnOnce(&mut Runtime) -> InterpResult<Value>) -> InterpResult<Outcome> {
        let scope_depth = self.scopes.depth();
        let call_depth = self.call_depth;
        let result = body(self);
        self.scopes.truncate(scope_depth);
        self.call_depth = call_depth;
        match result {
            Ok(value) => Ok(Outcome::Completed(value)),
            Err(err) if err.is_thrown() => {
                let payload = err.into_payload();
                debug!(payload = %payload, "exception caught");
                self.exception = ExceptionState::Caught(payload.clone());
                Ok(Outcome::Caught(payload))
            }
            Err(err) => Err(err),
        }
    }

    /// Top-level entry point for a script run.
    ///
    /// The exception state starts each run at `Normal`. An escaping
    /// exception is reported and the stack is reset to the global scope;
    /// the runtime stays usable.
    pub fn run(&mut self, body: impl FnOnce(&mut Runtime) -> InterpResult<Value>) -> InterpResult<Value> {
        self.exception = ExceptionState::Normal;
        let result = body(self);
        if let Err(err) = &result {
            self.scopes.truncate(1);
            self.call_depth = 0;
            match err.payload() {
                Some(payload) => {
                    error!(payload = %payload, "unhandled exception");
                    self.push_report(format!("Unhandled exception: {payload}"));
                    self.exception = ExceptionState::Unhandled(payload.clone());
                }
                None => {
                    error!(error = %err, "script failed");
                    self.push_report(err.message.clone());
                }
            }
        }
        result
    }

    /// Report a recoverable problem and keep going with `void`
    pub fn nonfatal(&mut self, message: impl Into<String>) -> Value {
        self.nonfatal_or(message, Value::void())
    }

    /// Report a recoverable problem and keep going with `default`
    pub fn nonfatal_or(&mut self, message: impl Into<String>, default: Value) -> Value {
        let message = message.into();
        warn!(%message, "nonfatal");
        self.push_report(message);
        default
    }

    /// Keeps the newest `MAX_REPORTS` messages
    fn push_report(&mut self, message: String) {
        if self.reports.len() >= MAX_REPORTS {
            self.reports.remove(0);
        }
        self.reports.push(message);
    }

    /// Messages from nonfatal reports and unhandled exceptions, oldest first.
    ///
    /// Hosts drain these with `take_reports`; only the newest
    /// `MAX_REPORTS` are retained in between.
    pub fn reports(&self) -> &[String] {
        &self.reports
    }

    pub fn take_reports(&mut self) -> Vec<String> {
        std::mem::take(&mut self.reports)
    }

    // ------------------------------------------------------------------
    // Safe mode
    // ------------------------------------------------------------------

    pub fn safe_mode_get(&self) -> bool {
        self.safe_mode.get()
    }

    /// Set once at startup; a second call is rejected
    pub fn safe_mode_set(&mut self, enabled: bool) -> Result<(), SafeModeError> {
        self.safe_mode.set(enabled)?;
        debug!(enabled, "safe mode set");
        Ok(())
    }

    /// Gate for privileged operations: in safe mode, report and refuse
    pub fn allow_privileged(&mut self, operation: &str) -> bool {
        if self.safe_mode.get() {
            self.nonfatal(format!("{operation} is disabled in safe mode"));
            return false;
        }
        true
    }

    // ------------------------------------------------------------------
    // Extension modules
    // ------------------------------------------------------------------

    /// Run a module's init routine, remembering every global it registers.
    ///
    /// Returns `Ok(false)` when refused (safe mode, already loaded). If init
    /// fails, whatever it registered so far is removed again.
    #[tracing::instrument(level = "debug", skip(self, init))]
    pub fn load_module(
        &mut self,
        name: &str,
        init: impl FnOnce(&mut Runtime) -> InterpResult<()>,
    ) -> InterpResult<bool> {
        if !self.allow_privileged("module loading") {
            return Ok(false);
        }
        if self.modules.contains_key(name) {
            self.nonfatal(format!("module {name} is already loaded"));
            return Ok(false);
        }
        let outer = self.loading.replace(ModuleRecord::default());
        let result = init(self);
        let record = std::mem::replace(&mut self.loading, outer).unwrap_or_default();
        match result {
            Ok(()) => {
                debug!(globals = record.globals.len(), classes = record.classes.len(), "module loaded");
                self.modules.set_keyed(name, record);
                Ok(true)
            }
            Err(err) => {
                self.remove_module_names(&record);
                Err(err)
            }
        }
    }

    /// Remove exactly the names a module registered
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn unload_module(&mut self, name: &str) -> bool {
        if !self.allow_privileged("module unloading") {
            return false;
        }
        let Some(record) = self.modules.delete_keyed(name) else {
            self.nonfatal(format!("module {name} is not loaded"));
            return false;
        };
        self.modules.compact();
        self.remove_module_names(&record);
        true
    }

    pub fn loaded_modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys()
    }

    fn remove_module_names(&mut self, record: &ModuleRecord) {
        for name in &record.globals {
            self.scopes.unbind_global(name);
        }
        for name in &record.classes {
            self.classes.remove(name.as_str());
        }
    }
}

/// Natives take the receiver as an explicit first argument
fn receiver_slots(signature: &Signature) -> usize {
    match signature.origin() {
        Origin::Native => 1,
        Origin::UserDefined => 0,
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("depth", &self.scopes.depth())
            .field("call_depth", &self.call_depth)
            .field("classes", &self.classes.len())
            .field("modules", &self.modules.live_len())
            .field("safe_mode", &self.safe_mode.get())
            .field("has_evaluator", &self.evaluator.is_some())
            .finish_non_exhaustive()
    }
}
