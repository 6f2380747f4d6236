//! Forced-cast rules between value tags
//!
//! One table, indexed by `(source tag, target tag)`, decides every coercion
//! the core performs: forced prototype parameters, mixed-type comparison,
//! linked-variable assignment and predicate results.

use thiserror::Error;

use super::value::{Tag, Value};

/// A forced cast that has no rule or whose rule rejected the value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot coerce {from} to {to}")]
pub struct CastError {
    pub from: Tag,
    pub to: Tag,
}

type Cast = fn(&Value) -> Option<Value>;

const N: usize = Tag::COUNT;

/// Coercion matrix: `MATRIX[from][to]`.
///
/// `None` marks an unsupported pair. The diagonal is identity for every tag.
static MATRIX: [[Option<Cast>; N]; N] = [
    // from void
    [Some(identity), Some(void_to_bool), Some(void_to_int), Some(void_to_float), Some(void_to_str), None, None, None, None],
    // from bool
    [None, Some(identity), Some(bool_to_int), Some(bool_to_float), Some(bool_to_str), None, None, None, None],
    // from int
    [None, Some(int_to_bool), Some(identity), Some(int_to_float), Some(int_to_str), None, None, None, None],
    // from float
    [None, Some(float_to_bool), Some(float_to_int), Some(identity), Some(float_to_str), None, None, None, None],
    // from string
    [None, Some(str_to_bool), Some(str_to_int), Some(str_to_float), Some(identity), None, None, None, None],
    // from array
    [None, None, None, None, None, Some(identity), None, None, None],
    // from record
    [None, None, None, None, None, None, Some(identity), None, None],
    // from function
    [None, None, None, None, None, None, None, Some(identity), None],
    // from resource
    [None, None, None, None, None, None, None, None, Some(identity)],
];

/// Coerce a value to the target tag
pub fn coerce(value: &Value, to: Tag) -> Result<Value, CastError> {
    let from = value.tag();
    MATRIX[from.index()][to.index()]
        .and_then(|cast| cast(value))
        .ok_or(CastError { from, to })
}

fn identity(value: &Value) -> Option<Value> {
    Some(value.clone())
}

fn void_to_bool(_: &Value) -> Option<Value> {
    Some(Value::Bool(false))
}

fn void_to_int(_: &Value) -> Option<Value> {
    Some(Value::Int(0))
}

fn void_to_float(_: &Value) -> Option<Value> {
    Some(Value::Float(0.0))
}

fn void_to_str(_: &Value) -> Option<Value> {
    Some(Value::string(""))
}

fn bool_to_int(value: &Value) -> Option<Value> {
    value.as_bool().map(|b| Value::Int(i64::from(b)))
}

fn bool_to_float(value: &Value) -> Option<Value> {
    value.as_bool().map(|b| Value::Float(if b { 1.0 } else { 0.0 }))
}

fn bool_to_str(value: &Value) -> Option<Value> {
    value.as_bool().map(|b| Value::string(b.to_string()))
}

fn int_to_bool(value: &Value) -> Option<Value> {
    value.as_int().map(|n| Value::Bool(n != 0))
}

fn int_to_float(value: &Value) -> Option<Value> {
    value.as_int().map(|n| Value::Float(n as f64))
}

fn int_to_str(value: &Value) -> Option<Value> {
    value.as_int().map(|n| Value::string(n.to_string()))
}

fn float_to_bool(value: &Value) -> Option<Value> {
    value.as_float().map(|x| Value::Bool(x != 0.0))
}

/// Truncates toward zero; NaN and infinities have no integer value
fn float_to_int(value: &Value) -> Option<Value> {
    let x = value.as_float()?;
    x.is_finite().then(|| Value::Int(x.trunc() as i64))
}

fn float_to_str(value: &Value) -> Option<Value> {
    value.as_float().map(|x| Value::string(format!("{x:?}")))
}

fn str_to_bool(value: &Value) -> Option<Value> {
    let bytes = value.as_bytes()?;
    Some(Value::Bool(!matches!(bytes, b"" | b"0" | b"false")))
}

fn str_to_int(value: &Value) -> Option<Value> {
    parse_leading_int(value.as_bytes()?).map(Value::Int)
}

fn str_to_float(value: &Value) -> Option<Value> {
    parse_leading_float(value.as_bytes()?).map(Value::Float)
}

/// Parse `[ws][+-]digits` from the start of `bytes`, ignoring the rest.
///
/// At least one digit is required; overflow is a failure.
pub fn parse_leading_int(bytes: &[u8]) -> Option<i64> {
    let text = trim_leading_ws(bytes);
    let (negative, digits) = match text.first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let len = digits.iter().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    let mut n: i64 = 0;
    for &digit in &digits[..len] {
        let d = i64::from(digit - b'0');
        n = n.checked_mul(10)?;
        n = if negative { n.checked_sub(d)? } else { n.checked_add(d)? };
    }
    Some(n)
}

/// Parse the longest float prefix `[ws][+-]digits[.digits][(e|E)[+-]digits]`
pub fn parse_leading_float(bytes: &[u8]) -> Option<f64> {
    let text = trim_leading_ws(bytes);
    let mut end = 0;
    if matches!(text.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_digits = count_digits(&text[end..]);
    end += int_digits;
    let mut frac_digits = 0;
    if text.get(end) == Some(&b'.') {
        frac_digits = count_digits(&text[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }
    if matches!(text.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(text.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(text.get(exp_end..).unwrap_or_default());
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }
    std::str::from_utf8(&text[..end]).ok()?.parse().ok()
}

fn trim_leading_ws(bytes: &[u8]) -> &[u8] {
    let skip = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    &bytes[skip..]
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::container::OrderedMap;

    fn has_rule(from: Tag, to: Tag) -> bool {
        MATRIX[from.index()][to.index()].is_some()
    }

    #[test]
    fn test_identity_for_every_tag() {
        for tag in Tag::ALL {
            assert!(has_rule(tag, tag), "missing identity for {tag}");
        }
        let array = Value::array(OrderedMap::new());
        assert_eq!(coerce(&array, Tag::Array), Ok(array.clone()));
    }

    #[test]
    fn test_string_to_int_parses_leading_digits() {
        assert_eq!(coerce(&Value::string("42abc"), Tag::Int), Ok(Value::int(42)));
        assert_eq!(coerce(&Value::string("  -7"), Tag::Int), Ok(Value::int(-7)));
        assert_eq!(coerce(&Value::string("+3"), Tag::Int), Ok(Value::int(3)));
    }

    #[test]
    fn test_string_to_int_rejects_non_numeric() {
        let err = coerce(&Value::string("abc"), Tag::Int).unwrap_err();
        assert_eq!(err, CastError { from: Tag::Str, to: Tag::Int });
        assert!(coerce(&Value::string(""), Tag::Int).is_err());
        assert!(coerce(&Value::string("-"), Tag::Int).is_err());
    }

    #[test]
    fn test_string_to_int_overflow_fails() {
        assert!(coerce(&Value::string("99999999999999999999"), Tag::Int).is_err());
        assert_eq!(
            coerce(&Value::string("-9223372036854775808"), Tag::Int),
            Ok(Value::int(i64::MIN))
        );
    }

    #[test]
    fn test_string_to_float() {
        assert_eq!(coerce(&Value::string("2.5kg"), Tag::Float), Ok(Value::float(2.5)));
        assert_eq!(coerce(&Value::string("1e3"), Tag::Float), Ok(Value::float(1000.0)));
        assert_eq!(coerce(&Value::string(".5"), Tag::Float), Ok(Value::float(0.5)));
        assert_eq!(coerce(&Value::string("7."), Tag::Float), Ok(Value::float(7.0)));
        assert_eq!(coerce(&Value::string("4e"), Tag::Float), Ok(Value::float(4.0)));
        assert!(coerce(&Value::string("."), Tag::Float).is_err());
    }

    #[test]
    fn test_bool_and_int() {
        assert_eq!(coerce(&Value::bool(true), Tag::Int), Ok(Value::int(1)));
        assert_eq!(coerce(&Value::bool(false), Tag::Int), Ok(Value::int(0)));
        assert_eq!(coerce(&Value::int(5), Tag::Bool), Ok(Value::bool(true)));
        assert_eq!(coerce(&Value::int(0), Tag::Bool), Ok(Value::bool(false)));
    }

    #[test]
    fn test_int_to_float_and_back() {
        assert_eq!(coerce(&Value::int(3), Tag::Float), Ok(Value::float(3.0)));
        assert_eq!(coerce(&Value::float(-3.9), Tag::Int), Ok(Value::int(-3)));
        assert!(coerce(&Value::float(f64::NAN), Tag::Int).is_err());
        assert!(coerce(&Value::float(f64::INFINITY), Tag::Int).is_err());
    }

    #[test]
    fn test_scalars_to_string() {
        assert_eq!(coerce(&Value::int(-12), Tag::Str), Ok(Value::string("-12")));
        assert_eq!(coerce(&Value::float(0.5), Tag::Str), Ok(Value::string("0.5")));
        assert_eq!(coerce(&Value::bool(true), Tag::Str), Ok(Value::string("true")));
        assert_eq!(coerce(&Value::void(), Tag::Str), Ok(Value::string("")));
    }

    #[test]
    fn test_string_to_bool() {
        assert_eq!(coerce(&Value::string("yes"), Tag::Bool), Ok(Value::bool(true)));
        assert_eq!(coerce(&Value::string("0"), Tag::Bool), Ok(Value::bool(false)));
        assert_eq!(coerce(&Value::string("false"), Tag::Bool), Ok(Value::bool(false)));
    }

    #[test]
    fn test_array_only_coerces_to_array() {
        let array = Value::empty_array();
        for tag in Tag::ALL {
            assert_eq!(coerce(&array, tag).is_ok(), tag == Tag::Array, "array -> {tag}");
        }
    }

    #[test]
    fn test_nothing_but_void_coerces_to_void() {
        for tag in Tag::ALL {
            assert_eq!(has_rule(tag, Tag::Void), tag == Tag::Void);
        }
    }

    #[test]
    fn test_cast_error_display() {
        let err = CastError { from: Tag::Array, to: Tag::Int };
        assert_eq!(err.to_string(), "cannot coerce array to int");
    }
}
