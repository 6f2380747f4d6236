//! Function signatures, type prototypes and overload sets

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use super::coerce::coerce;
use super::error::{InterpResult, RuntimeError};
use super::runtime::Runtime;
use super::value::{Tag, Value};

/// Native implementation: receives the runtime (for re-entrant calls) and
/// the bound argument slice.
pub type NativeFn = fn(&mut Runtime, &mut [Value]) -> InterpResult<Value>;

/// Opaque handle to a user-defined function body, owned by the evaluator
pub type FunctionBody = Rc<dyn Any>;

/// Where a signature's implementation lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Native,
    UserDefined,
}

/// One prototype position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSpec {
    /// `?`: any value, passed through
    Any,
    /// `*`: this and all following arguments, passed through
    Rest,
    /// lowercase letter: expected type, recorded but not enforced
    Hint(Tag),
    /// uppercase letter: coerced before the call
    Forced(Tag),
}

impl ParamSpec {
    fn code(self) -> char {
        match self {
            ParamSpec::Any => '?',
            ParamSpec::Rest => '*',
            ParamSpec::Hint(tag) => tag.code(),
            ParamSpec::Forced(tag) => tag.code().to_ascii_uppercase(),
        }
    }

    /// Declared type of this position, if any
    pub fn expected(self) -> Option<Tag> {
        match self {
            ParamSpec::Hint(tag) | ParamSpec::Forced(tag) => Some(tag),
            ParamSpec::Any | ParamSpec::Rest => None,
        }
    }
}

/// Parsed type prototype, e.g. `"IIs*"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prototype {
    params: Vec<ParamSpec>,
}

impl Prototype {
    pub fn parse(source: &str) -> InterpResult<Self> {
        let mut params = Vec::with_capacity(source.len());
        let mut chars = source.chars().peekable();
        while let Some(c) = chars.next() {
            let spec = match c {
                '?' => ParamSpec::Any,
                '*' if chars.peek().is_none() => ParamSpec::Rest,
                '*' => {
                    return Err(RuntimeError::invalid_prototype(source, "`*` must be the last position"));
                }
                c => match Tag::from_code(c) {
                    Some(tag) if c.is_ascii_uppercase() => ParamSpec::Forced(tag),
                    Some(tag) => ParamSpec::Hint(tag),
                    None => {
                        return Err(RuntimeError::invalid_prototype(
                            source,
                            &format!("unknown type code `{c}`"),
                        ));
                    }
                },
            };
            params.push(spec);
        }
        Ok(Prototype { params })
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Position of the variadic marker, if present
    pub fn rest_position(&self) -> Option<usize> {
        self.params.iter().position(|p| *p == ParamSpec::Rest)
    }

    /// Spec for an argument position; positions beyond the prototype (or
    /// after `*`) accept anything
    pub fn spec_at(&self, position: usize) -> ParamSpec {
        match self.rest_position() {
            Some(rest) if position >= rest => ParamSpec::Rest,
            _ => self.params.get(position).copied().unwrap_or(ParamSpec::Any),
        }
    }
}

impl fmt::Display for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.params.iter().try_for_each(|p| write!(f, "{}", p.code()))
    }
}

/// Accepted argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, argc: usize) -> bool {
        match self {
            Arity::Exactly(n) => argc == n,
            Arity::AtLeast(n) => argc >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

#[derive(Clone)]
pub enum Implementation {
    Native(NativeFn),
    User {
        params: Vec<Rc<str>>,
        body: FunctionBody,
    },
}

/// The type/arity contract of one callable
#[derive(Clone)]
pub struct Signature {
    name: Rc<str>,
    arg_count: usize,
    prototype: Prototype,
    return_type: char,
    implementation: Implementation,
}

impl Signature {
    pub fn native(
        name: &str,
        function: NativeFn,
        arg_count: usize,
        prototype: &str,
        return_type: char,
    ) -> InterpResult<Self> {
        Ok(Signature {
            name: Rc::from(name),
            arg_count,
            prototype: Prototype::parse(prototype)?,
            return_type,
            implementation: Implementation::Native(function),
        })
    }

    /// User-defined signature; the declared argument count is the number of
    /// parameter names
    pub fn user(
        name: &str,
        params: &[&str],
        prototype: &str,
        return_type: char,
        body: FunctionBody,
    ) -> InterpResult<Self> {
        Ok(Signature {
            name: Rc::from(name),
            arg_count: params.len(),
            prototype: Prototype::parse(prototype)?,
            return_type,
            implementation: Implementation::User {
                params: params.iter().map(|p| Rc::from(*p)).collect(),
                body,
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> Origin {
        match self.implementation {
            Implementation::Native(_) => Origin::Native,
            Implementation::User { .. } => Origin::UserDefined,
        }
    }

    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    pub fn prototype(&self) -> &Prototype {
        &self.prototype
    }

    /// Declared return type character (introspection only)
    pub fn return_type(&self) -> char {
        self.return_type
    }

    pub fn implementation(&self) -> &Implementation {
        &self.implementation
    }

    /// Accepted argument counts.
    ///
    /// A `*` at position `k` relaxes the count to "at least `k`". Without
    /// one, a leading `?` still accepts surplus arguments past the declared
    /// count, so natives can rely on every declared position being present.
    pub fn arity(&self) -> Arity {
        match self.prototype.rest_position() {
            Some(rest) => Arity::AtLeast(rest),
            None if self.prototype.params().first() == Some(&ParamSpec::Any) => Arity::AtLeast(self.arg_count),
            None => Arity::Exactly(self.arg_count),
        }
    }

    /// Validate the argument count and apply forced casts
    pub fn bind(&self, mut args: Vec<Value>) -> InterpResult<Vec<Value>> {
        let arity = self.arity();
        if !arity.accepts(args.len()) {
            return Err(RuntimeError::arity_mismatch(&self.name, arity, args.len()));
        }
        for (position, arg) in args.iter_mut().enumerate() {
            if let ParamSpec::Forced(tag) = self.prototype.spec_at(position) {
                if arg.tag() != tag {
                    *arg = coerce(arg, tag).map_err(|err| RuntimeError::coercion(&self.name, position, err))?;
                }
            }
        }
        Ok(args)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("name", &self.name)
            .field("origin", &self.origin())
            .field("arg_count", &self.arg_count)
            .field("prototype", &self.prototype.to_string())
            .field("return_type", &self.return_type)
            .finish()
    }
}

/// `name(prototype) -> r`
impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) -> {}", self.name, self.prototype, self.return_type)
    }
}

/// Overload set: every signature registered under one name, oldest first
#[derive(Debug, Clone)]
pub struct Function {
    name: Rc<str>,
    overloads: Vec<Rc<Signature>>,
}

impl Function {
    pub fn new(signature: Signature) -> Self {
        Function::from_rc(Rc::new(signature))
    }

    pub fn from_rc(signature: Rc<Signature>) -> Self {
        Function {
            name: Rc::clone(&signature.name),
            overloads: vec![signature],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.overloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overloads.is_empty()
    }

    pub fn overloads(&self) -> &[Rc<Signature>] {
        &self.overloads
    }

    /// Register another signature; it takes precedence over older ones
    pub fn push(&mut self, signature: Rc<Signature>) {
        self.overloads.push(signature);
    }

    /// Most recently registered signature
    pub fn newest(&self) -> Option<&Rc<Signature>> {
        self.overloads.last()
    }

    /// Newest signature whose arity accepts `argc`, else the newest overall
    /// (so the arity error names the current definition)
    pub fn resolve(&self, argc: usize) -> Option<&Rc<Signature>> {
        self.overloads
            .iter()
            .rev()
            .find(|sig| sig.arity().accepts(argc))
            .or_else(|| self.newest())
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.overloads.len() == other.overloads.len()
            && self
                .overloads
                .iter()
                .zip(&other.overloads)
                .all(|(a, b)| Rc::ptr_eq(a, b))
    }
}
