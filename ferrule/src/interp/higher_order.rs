//! Higher-order helpers built on dispatch
//!
//! Each visits live elements in container order, one call per element, and
//! builds a fresh container. Keys of keyed elements carry over.

use super::coerce::coerce;
use super::container::OrderedMap;
use super::error::{InterpResult, RuntimeError};
use super::runtime::Runtime;
use super::value::{Tag, Value};

/// `f(element)` for every element
pub fn map(rt: &mut Runtime, f: &Value, items: &OrderedMap<Value>) -> InterpResult<OrderedMap<Value>> {
    let mut mapped = OrderedMap::new();
    for (_, key, value) in items.iter() {
        let result = rt.call_value(f, vec![value.clone()])?;
        mapped.insert_entry(key, result);
    }
    Ok(mapped)
}

/// Elements for which the predicate holds
pub fn filter(rt: &mut Runtime, predicate: &Value, items: &OrderedMap<Value>) -> InterpResult<OrderedMap<Value>> {
    let mut kept = OrderedMap::new();
    for (_, key, value) in items.iter() {
        if test(rt, predicate, value)? {
            kept.insert_entry(key, value.clone());
        }
    }
    Ok(kept)
}

/// Left fold: `f(f(f(init, e0), e1), e2)`
pub fn fold(rt: &mut Runtime, f: &Value, init: Value, items: &OrderedMap<Value>) -> InterpResult<Value> {
    items
        .values()
        .try_fold(init, |acc, value| rt.call_value(f, vec![acc, value.clone()]))
}

/// Right fold, visiting elements last to first; `f` still takes the
/// accumulator first
pub fn foldr(rt: &mut Runtime, f: &Value, init: Value, items: &OrderedMap<Value>) -> InterpResult<Value> {
    items
        .values()
        .rev()
        .try_fold(init, |acc, value| rt.call_value(f, vec![acc, value.clone()]))
}

/// Leading elements up to, not including, the first one failing the predicate
pub fn take_while(rt: &mut Runtime, predicate: &Value, items: &OrderedMap<Value>) -> InterpResult<OrderedMap<Value>> {
    let mut taken = OrderedMap::new();
    for (_, key, value) in items.iter() {
        if !test(rt, predicate, value)? {
            break;
        }
        taken.insert_entry(key, value.clone());
    }
    Ok(taken)
}

/// Everything from the first element failing the predicate onward
pub fn drop_while(rt: &mut Runtime, predicate: &Value, items: &OrderedMap<Value>) -> InterpResult<OrderedMap<Value>> {
    let mut rest = OrderedMap::new();
    let mut dropping = true;
    for (_, key, value) in items.iter() {
        if dropping && test(rt, predicate, value)? {
            continue;
        }
        dropping = false;
        rest.insert_entry(key, value.clone());
    }
    Ok(rest)
}

/// Call a predicate and force its result to `bool`
fn test(rt: &mut Runtime, predicate: &Value, value: &Value) -> InterpResult<bool> {
    let result = rt.call_value(predicate, vec![value.clone()])?;
    coerce(&result, Tag::Bool)
        .map(|b| b.is_truthy())
        .map_err(|cast| RuntimeError::coercion("predicate result", 0, cast))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn double(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
        Ok(Value::int(args[0].as_int().unwrap_or(0) * 2))
    }

    fn is_small(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
        Ok(Value::int(i64::from(args[0].as_int().unwrap_or(0) < 3)))
    }

    fn concat(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
        let mut acc = args[0].as_bytes().unwrap_or_default().to_vec();
        acc.extend_from_slice(args[1].as_bytes().unwrap_or_default());
        Ok(Value::string(acc))
    }

    fn to_array(_: &mut Runtime, _: &mut [Value]) -> InterpResult<Value> {
        Ok(Value::empty_array())
    }

    fn rt() -> Runtime {
        let mut rt = Runtime::new();
        rt.register_function("double", double, 1, "I", 'i').unwrap();
        rt.register_function("is_small", is_small, 1, "I", 'i').unwrap();
        rt.register_function("concat", concat, 2, "SS", 's').unwrap();
        rt.register_function("to_array", to_array, 1, "?", 'a').unwrap();
        rt
    }

    fn ints(values: &[i64]) -> OrderedMap<Value> {
        values.iter().copied().map(Value::int).collect()
    }

    fn f(name: &str) -> Value {
        Value::string(name)
    }

    #[test]
    fn test_map_preserves_keys() {
        let mut rt = rt();
        let mut items = ints(&[1]);
        items.set_keyed("k", Value::int(5));
        let mapped = map(&mut rt, &f("double"), &items).unwrap();
        assert_eq!(mapped.get(0), Some(&Value::int(2)));
        assert_eq!(mapped.get_keyed("k"), Some(&Value::int(10)));
    }

    #[test]
    fn test_map_skips_tombstones() {
        let mut rt = rt();
        let mut items = ints(&[1, 2, 3]);
        items.delete_index(1);
        let mapped = map(&mut rt, &f("double"), &items).unwrap();
        assert_eq!(mapped, ints(&[2, 6]));
    }

    #[test]
    fn test_filter_coerces_predicate_result() {
        let mut rt = rt();
        let kept = filter(&mut rt, &f("is_small"), &ints(&[1, 5, 2, 7])).unwrap();
        assert_eq!(kept, ints(&[1, 2]));
    }

    #[test]
    fn test_predicate_result_must_coerce_to_bool() {
        let mut rt = rt();
        let err = filter(&mut rt, &f("to_array"), &ints(&[1])).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeCoercion { .. }));
    }

    #[test]
    fn test_folds_take_accumulator_first() {
        let mut rt = rt();
        let items: OrderedMap<Value> = ["a", "b", "c"].into_iter().map(Value::from).collect();
        let left = fold(&mut rt, &f("concat"), Value::string(">"), &items).unwrap();
        let right = foldr(&mut rt, &f("concat"), Value::string(">"), &items).unwrap();
        assert_eq!(left, Value::string(">abc"));
        assert_eq!(right, Value::string(">cba"));
    }

    #[test]
    fn test_fold_empty_returns_init() {
        let mut rt = rt();
        let result = fold(&mut rt, &f("concat"), Value::int(0), &OrderedMap::new()).unwrap();
        assert_eq!(result, Value::int(0));
    }

    #[test]
    fn test_take_while_excludes_first_false() {
        let mut rt = rt();
        let taken = take_while(&mut rt, &f("is_small"), &ints(&[1, 2, 5, 1])).unwrap();
        assert_eq!(taken, ints(&[1, 2]));
    }

    #[test]
    fn test_drop_while_includes_first_false() {
        let mut rt = rt();
        let rest = drop_while(&mut rt, &f("is_small"), &ints(&[1, 2, 5, 1])).unwrap();
        assert_eq!(rest, ints(&[5, 1]));
    }

    #[test]
    fn test_error_stops_iteration_and_unwinds() {
        let mut rt = rt();
        let err = map(&mut rt, &f("missing"), &ints(&[1, 2])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedFunction);
        assert_eq!(rt.depth(), 1);
    }
}
