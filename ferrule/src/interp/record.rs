//! Record values and class templates

use std::rc::Rc;

use super::container::OrderedMap;
use super::function::{Function, Signature};
use super::value::Value;

/// Keyed, ordered fields plus an optional class name and method table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    class: Option<Rc<str>>,
    fields: OrderedMap<Value>,
    /// Shared between instances of a class until one of them adds a method
    methods: Rc<OrderedMap<Function>>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn with_class(class: &str) -> Self {
        Record {
            class: Some(Rc::from(class)),
            ..Record::default()
        }
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn fields(&self) -> &OrderedMap<Value> {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut OrderedMap<Value> {
        &mut self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get_keyed(name)
    }

    /// Upsert a field, returning the previous value
    pub fn set_field(&mut self, name: &str, value: Value) -> Option<Value> {
        self.fields.set_keyed(name, value)
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.delete_keyed(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys()
    }

    pub fn methods(&self) -> &OrderedMap<Function> {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&Function> {
        self.methods.get_keyed(name)
    }

    /// Attach a method; an existing method of the same name gains an overload
    pub fn add_method(&mut self, signature: Rc<Signature>) {
        let methods = Rc::make_mut(&mut self.methods);
        match methods.get_keyed_mut(signature.name()) {
            Some(function) => function.push(signature),
            None => {
                let name = signature.name().to_string();
                methods.set_keyed(&name, Function::from_rc(signature));
            }
        }
    }

    /// Right-biased merge: fields and methods of `other` override ours.
    ///
    /// The result keeps our class name unless we have none.
    pub fn merge(&self, other: &Record) -> Record {
        let methods = if other.methods.is_empty() {
            Rc::clone(&self.methods)
        } else if self.methods.is_empty() {
            Rc::clone(&other.methods)
        } else {
            Rc::new(OrderedMap::merge([&*self.methods, &*other.methods]))
        };
        Record {
            class: self.class.clone().or_else(|| other.class.clone()),
            fields: OrderedMap::merge([&self.fields, &other.fields]),
            methods,
        }
    }

    /// Fields are copied deeply; the method table is immutable and shared
    pub fn deep_copy(&self) -> Record {
        Record {
            class: self.class.clone(),
            fields: self.fields.map_values(Value::deep_copy),
            methods: Rc::clone(&self.methods),
        }
    }
}

/// A named record template with optional inheritance
#[derive(Debug, Clone)]
pub struct Class {
    name: Rc<str>,
    parent: Option<Rc<Class>>,
    fields: OrderedMap<Value>,
    methods: Vec<Rc<Signature>>,
    constructor: Option<Rc<Signature>>,
}

impl Class {
    pub fn new(name: &str) -> Self {
        Class {
            name: Rc::from(name),
            parent: None,
            fields: OrderedMap::new(),
            methods: Vec::new(),
            constructor: None,
        }
    }

    pub fn extends(mut self, parent: Rc<Class>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Default field value for new instances
    pub fn field(mut self, name: &str, default: Value) -> Self {
        self.fields.set_keyed(name, default);
        self
    }

    pub fn method(mut self, signature: Signature) -> Self {
        self.methods.push(Rc::new(signature));
        self
    }

    /// Runs on `instantiate` with the new record as receiver
    pub fn constructor(mut self, signature: Signature) -> Self {
        self.constructor = Some(Rc::new(signature));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<Class>> {
        self.parent.as_ref()
    }

    /// Own constructor, else the nearest ancestor's
    pub fn find_constructor(&self) -> Option<&Rc<Signature>> {
        self.constructor
            .as_ref()
            .or_else(|| self.parent.as_deref().and_then(Class::find_constructor))
    }

    /// Fresh instance layout: the parent's template with ours merged over it
    pub fn template(&self) -> Record {
        let mut own = Record::with_class(&self.name);
        own.fields = self.fields.map_values(Value::deep_copy);
        for signature in &self.methods {
            own.add_method(Rc::clone(signature));
        }
        match &self.parent {
            Some(parent) => {
                let mut record = parent.template().merge(&own);
                record.class = Some(Rc::clone(&self.name));
                record
            }
            None => own,
        }
    }

    /// Whether `name` is this class or one of its ancestors
    pub fn is_a(&self, name: &str) -> bool {
        &*self.name == name || self.parent.as_deref().is_some_and(|p| p.is_a(name))
    }
}
