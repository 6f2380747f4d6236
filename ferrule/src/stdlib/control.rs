//! Control-flow and introspection natives

use super::{builtin, Builtin};
use crate::interp::{compare, InterpResult, Runtime, Value};

pub(super) const BUILTINS: &[Builtin] = &[
    builtin("throw", throw, 1, "?", 'v'),
    builtin("call", call, 1, "?*", '?'),
    builtin("equal", equal, 2, "??", 'b'),
    builtin("order", order, 2, "??", 'b'),
    builtin("typeof", type_of, 1, "?", 's'),
    builtin("is_a", is_a, 2, "rS", 'b'),
    builtin("safe_mode", safe_mode, 0, "", 'b'),
];

/// Raise the argument as an exception payload
fn throw(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let payload = std::mem::take(&mut args[0]);
    Err(rt.throw(payload))
}

/// `call(f, args...)`: dynamic call through a function value or name
fn call(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let callee = std::mem::take(&mut args[0]);
    let rest = args[1..].iter_mut().map(std::mem::take).collect();
    rt.call_value(&callee, rest)
}

fn equal(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    Ok(compare::equal(&args[0], &args[1]))
}

fn order(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    Ok(compare::order(&args[0], &args[1]))
}

fn type_of(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    Ok(Value::string(args[0].type_name()))
}

/// is_a(record, class): the record's class is `class` or derives from it
fn is_a(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let target = args[1].as_str().unwrap_or_default();
    let Some(class) = args[0].as_record().and_then(|record| record.class()) else {
        return Ok(Value::bool(false));
    };
    let derives = match rt.class(class) {
        Some(registered) => registered.is_a(&target),
        None => class == &*target,
    };
    Ok(Value::bool(derives))
}

fn safe_mode(rt: &mut Runtime, _: &mut [Value]) -> InterpResult<Value> {
    Ok(Value::bool(rt.safe_mode_get()))
}

#[cfg(test)]
mod tests {
    use crate::interp::{Class, ErrorKind, ExceptionState, Outcome, Record, Runtime, Value};
    use crate::stdlib::install;
    use pretty_assertions::assert_eq;

    fn rt() -> Runtime {
        let mut rt = Runtime::new();
        install(&mut rt).unwrap();
        rt
    }

    #[test]
    fn test_throw_is_caught_with_payload() {
        let mut rt = rt();
        let outcome = rt
            .try_catch(|rt| rt.call_by_name("throw", vec![Value::string("boom")]))
            .unwrap();
        assert_eq!(outcome, Outcome::Caught(Value::string("boom")));
        assert_eq!(rt.depth(), 1);
        assert_eq!(rt.call_depth(), 0);
        assert!(matches!(rt.exception_state(), ExceptionState::Caught(_)));
    }

    #[test]
    fn test_call_forwards_rest_arguments() {
        let mut rt = rt();
        let result = rt
            .call_by_name("call", vec![Value::string("equal"), Value::int(1), Value::string("1")])
            .unwrap();
        assert_eq!(result, Value::bool(true));
    }

    #[test]
    fn test_call_requires_callee() {
        let mut rt = rt();
        let err = rt.call_by_name("call", vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArityMismatch);
    }

    #[test]
    fn test_call_non_callable() {
        let mut rt = rt();
        let err = rt.call_by_name("call", vec![Value::int(3)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotCallable);
    }

    #[test]
    fn test_order_and_typeof() {
        let mut rt = rt();
        let ordered = rt.call_by_name("order", vec![Value::int(2), Value::string("10")]).unwrap();
        assert_eq!(ordered, Value::bool(true));
        let name = rt.call_by_name("typeof", vec![Value::float(1.5)]).unwrap();
        assert_eq!(name, Value::string("float"));
    }

    #[test]
    fn test_safe_mode_reports_flag() {
        let mut rt = rt();
        rt.safe_mode_set(true).unwrap();
        assert_eq!(rt.call_by_name("safe_mode", vec![]).unwrap(), Value::bool(true));
    }

    #[test]
    fn test_is_a_follows_class_chain() {
        let mut rt = rt();
        let shape = rt.register_class(Class::new("Shape"));
        rt.register_class(Class::new("Square").extends(shape));
        let square = rt.instantiate("Square", vec![]).unwrap();

        let is_a = |rt: &mut Runtime, value: &Value, class: &str| {
            rt.call_by_name("is_a", vec![value.clone(), Value::string(class)]).unwrap()
        };
        assert_eq!(is_a(&mut rt, &square, "Square"), Value::bool(true));
        assert_eq!(is_a(&mut rt, &square, "Shape"), Value::bool(true));
        assert_eq!(is_a(&mut rt, &square, "Circle"), Value::bool(false));

        // unregistered class names only match themselves
        let loose = Value::record(Record::with_class("Loose"));
        assert_eq!(is_a(&mut rt, &loose, "Loose"), Value::bool(true));
        assert_eq!(is_a(&mut rt, &loose, "Shape"), Value::bool(false));
        assert_eq!(is_a(&mut rt, &Value::int(1), "Shape"), Value::bool(false));
    }
}
