//! Polymorphic ordering and equality
//!
//! When tags differ, the right operand is force-cast to the left operand's
//! tag before comparing. Pairs without a cast are unordered.

use std::cmp::Ordering;
use std::rc::Rc;

use super::coerce::coerce;
use super::container::OrderedMap;
use super::value::Value;

/// Compare two values after coercing `b` to `a`'s tag.
///
/// `None` means unordered: no cast exists, the cast failed, or a float
/// comparison involved NaN.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if a.tag() == b.tag() {
        compare_same(a, b)
    } else {
        let b = coerce(b, a.tag()).ok()?;
        compare_same(a, &b)
    }
}

/// `order(a, b)`: true iff `a` sorts at or before `b`
pub fn order(a: &Value, b: &Value) -> Value {
    Value::Bool(matches!(compare(a, b), Some(Ordering::Less | Ordering::Equal)))
}

/// `equal(a, b)`: true iff the values are equal after coercion
pub fn equal(a: &Value, b: &Value) -> Value {
    Value::Bool(equal_values(a, b))
}

pub fn equal_values(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

fn compare_same(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Void, Value::Void) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Str(x), Value::Str(y)) => Some(x.as_slice().cmp(y.as_slice())),
        (Value::Array(x), Value::Array(y)) => compare_maps(x, y),
        (Value::Record(x), Value::Record(y)) => match x.class().cmp(&y.class()) {
            Ordering::Equal => compare_maps(x.fields(), y.fields()),
            unequal => Some(unequal),
        },
        (Value::Function(x), Value::Function(y)) => {
            if Rc::ptr_eq(x, y) || x == y {
                return Some(Ordering::Equal);
            }
            let by_shape = x.name().cmp(y.name()).then(x.len().cmp(&y.len()));
            Some(by_shape.then_with(|| Rc::as_ptr(x).cmp(&Rc::as_ptr(y))))
        }
        (Value::Resource(x), Value::Resource(y)) => Some(x.id().cmp(&y.id())),
        _ => None,
    }
}

/// Slot count first, then slot by slot: missing key before present key,
/// keys byte-wise, then values. Tombstones compare as `void`.
fn compare_maps(a: &OrderedMap<Value>, b: &OrderedMap<Value>) -> Option<Ordering> {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => {}
        unequal => return Some(unequal),
    }
    let void = Value::Void;
    for (left, right) in a.slots().zip(b.slots()) {
        let (left_key, left_value) = left.unwrap_or((None, &void));
        let (right_key, right_value) = right.unwrap_or((None, &void));
        match left_key.cmp(&right_key) {
            Ordering::Equal => {}
            unequal => return Some(unequal),
        }
        match compare(left_value, right_value)? {
            Ordering::Equal => {}
            unequal => return Some(unequal),
        }
    }
    Some(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::record::Record;

    fn array(values: &[Value]) -> Value {
        Value::array(values.iter().cloned().collect())
    }

    #[test]
    fn test_order_same_tag() {
        assert_eq!(order(&Value::int(1), &Value::int(2)), Value::bool(true));
        assert_eq!(order(&Value::int(2), &Value::int(2)), Value::bool(true));
        assert_eq!(order(&Value::int(3), &Value::int(2)), Value::bool(false));
    }

    #[test]
    fn test_string_order_is_bytewise() {
        assert_eq!(order(&Value::string("B"), &Value::string("a")), Value::bool(true));
        assert_eq!(order(&Value::string("ab"), &Value::string("a")), Value::bool(false));
    }

    #[test]
    fn test_mixed_tags_coerce_right_operand() {
        assert_eq!(equal(&Value::int(42), &Value::string("42")), Value::bool(true));
        assert_eq!(equal(&Value::string("42"), &Value::int(42)), Value::bool(true));
        assert_eq!(equal(&Value::int(1), &Value::bool(true)), Value::bool(true));
        assert_eq!(order(&Value::float(1.5), &Value::int(2)), Value::bool(true));
    }

    #[test]
    fn test_coercion_direction_matters() {
        // "2.5" -> int 2 on the int side, but 2 -> "2" on the string side
        assert_eq!(equal(&Value::int(2), &Value::string("2.5")), Value::bool(true));
        assert_eq!(equal(&Value::string("2.5"), &Value::int(2)), Value::bool(false));
    }

    #[test]
    fn test_uncoercible_is_unordered() {
        assert_eq!(compare(&Value::int(1), &Value::string("abc")), None);
        assert_eq!(compare(&Value::int(1), &Value::empty_array()), None);
        assert_eq!(order(&Value::empty_array(), &Value::int(1)), Value::bool(false));
        assert_eq!(equal(&Value::empty_array(), &Value::int(1)), Value::bool(false));
    }

    #[test]
    fn test_nan_is_unordered() {
        let nan = Value::float(f64::NAN);
        assert_eq!(equal(&nan, &nan), Value::bool(false));
        assert_eq!(order(&nan, &Value::float(0.0)), Value::bool(false));
    }

    #[test]
    fn test_arrays_order_by_length_then_elements() {
        let short = array(&[Value::int(9)]);
        let long = array(&[Value::int(1), Value::int(2)]);
        assert_eq!(compare(&short, &long), Some(Ordering::Less));

        let a = array(&[Value::int(1), Value::int(2)]);
        let b = array(&[Value::int(1), Value::int(3)]);
        assert_eq!(compare(&a, &b), Some(Ordering::Less));
        assert_eq!(equal(&a, &a.deep_copy()), Value::bool(true));
    }

    #[test]
    fn test_array_elements_compare_with_coercion() {
        let ints = array(&[Value::int(1)]);
        let strings = array(&[Value::string("1")]);
        assert_eq!(equal(&ints, &strings), Value::bool(true));
    }

    #[test]
    fn test_keys_participate_in_array_order() {
        let mut keyed = OrderedMap::new();
        keyed.set_keyed("a", Value::int(1));
        let positional = array(&[Value::int(1)]);
        assert_eq!(compare(&positional, &Value::array(keyed)), Some(Ordering::Less));
    }

    #[test]
    fn test_records_compare_class_then_fields() {
        let mut a = Record::with_class("A");
        a.set_field("x", Value::int(5));
        let mut b = Record::with_class("B");
        b.set_field("x", Value::int(1));
        assert_eq!(compare(&Value::record(a.clone()), &Value::record(b)), Some(Ordering::Less));

        let mut a2 = a.clone();
        a2.set_field("x", Value::int(6));
        assert_eq!(compare(&Value::record(a), &Value::record(a2)), Some(Ordering::Less));
    }
}
