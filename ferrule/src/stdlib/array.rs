//! Array and record natives

use super::{builtin, Builtin};
use crate::interp::{coerce, CastError, InterpResult, OrderedMap, Record, Runtime, RuntimeError, Tag, Value};

pub(super) const BUILTINS: &[Builtin] = &[
    builtin("mkkeyarray", mkkeyarray, 0, "*", 'a'),
    builtin("array_keys", array_keys, 1, "A", 'a'),
    builtin("array_values", array_values, 1, "A", 'a'),
    builtin("array_size", array_size, 1, "A", 'i'),
    builtin("array_get", array_get, 2, "A?", '?'),
    builtin("array_push", array_push, 2, "A?", 'a'),
    builtin("array_del", array_del, 2, "A?", 'a'),
    builtin("array_compact", array_compact, 1, "A", 'a'),
    builtin("array_reverse", array_reverse, 1, "A", 'a'),
    builtin("array_merge", array_merge, 1, "A*", 'a'),
    builtin("array_search", array_search, 2, "A?", '?'),
    builtin("struct_fields", struct_fields, 1, "R", 'a'),
    builtin("record_merge", record_merge, 2, "RR", 'r'),
];

/// Forced `A`/`R` positions guarantee the tag; this only guards direct calls
fn array_arg<'a>(function: &str, args: &'a [Value], index: usize) -> InterpResult<&'a OrderedMap<Value>> {
    args[index]
        .as_array()
        .ok_or_else(|| wrong_tag(function, &args[index], index, Tag::Array))
}

fn record_arg<'a>(function: &str, args: &'a [Value], index: usize) -> InterpResult<&'a Record> {
    args[index]
        .as_record()
        .ok_or_else(|| wrong_tag(function, &args[index], index, Tag::Record))
}

fn wrong_tag(function: &str, value: &Value, index: usize, to: Tag) -> RuntimeError {
    RuntimeError::coercion(function, index, CastError { from: value.tag(), to })
}

/// A slot address: integers are positions, anything else is a key
enum Address {
    Index(usize),
    Key(String),
    Invalid,
}

fn address(value: &Value) -> Address {
    match value {
        Value::Int(n) => usize::try_from(*n).map_or(Address::Invalid, Address::Index),
        Value::Str(_) => Address::Key(value.as_str().unwrap_or_default().into_owned()),
        _ => Address::Invalid,
    }
}

/// `mkkeyarray(k1, v1, k2, v2, ...)`: keys are coerced to strings
fn mkkeyarray(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    if args.len() % 2 != 0 {
        rt.nonfatal("mkkeyarray: odd number of arguments, last key ignored");
    }
    let mut items = OrderedMap::new();
    for (pair_index, pair) in args.chunks_exact(2).enumerate() {
        let key = coerce(&pair[0], Tag::Str)
            .map_err(|cast| RuntimeError::coercion("mkkeyarray", 2 * pair_index, cast))?;
        let key = key.as_str().unwrap_or_default().into_owned();
        items.set_keyed(&key, pair[1].clone());
    }
    Ok(Value::array(items))
}

/// Keys of keyed slots, positions of unkeyed ones
fn array_keys(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let items = array_arg("array_keys", args, 0)?;
    let keys = items
        .iter()
        .map(|(index, key, _)| match key {
            Some(key) => Value::string(key),
            None => Value::int(index as i64),
        })
        .collect();
    Ok(Value::array(keys))
}

fn array_values(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let items = array_arg("array_values", args, 0)?;
    Ok(Value::array(items.values().cloned().collect()))
}

fn array_size(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let items = array_arg("array_size", args, 0)?;
    Ok(Value::int(items.live_len() as i64))
}

/// Missing slots and tombstones read as `void`
fn array_get(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let items = array_arg("array_get", args, 0)?;
    Ok(match address(&args[1]) {
        Address::Index(index) => items.value_at(index),
        Address::Key(key) => items.get_keyed(&key).cloned().unwrap_or_default(),
        Address::Invalid => Value::void(),
    })
}

fn array_push(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let value = std::mem::take(&mut args[1]);
    let mut array = std::mem::take(&mut args[0]);
    if let Some(items) = array.as_array_mut() {
        items.append(value);
    }
    Ok(array)
}

/// Tombstone a slot by position or key; other positions do not move
fn array_del(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let address = address(&args[1]);
    let mut array = std::mem::take(&mut args[0]);
    let Some(items) = array.as_array_mut() else {
        return Ok(array);
    };
    let removed = match address {
        Address::Index(index) => items.delete_index(index),
        Address::Key(key) => items.delete_keyed(&key),
        Address::Invalid => None,
    };
    if removed.is_none() {
        rt.nonfatal("array_del: no such element");
    }
    Ok(array)
}

fn array_compact(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let mut array = std::mem::take(&mut args[0]);
    if let Some(items) = array.as_array_mut() {
        items.compact();
    }
    Ok(array)
}

fn array_reverse(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let items = array_arg("array_reverse", args, 0)?;
    Ok(Value::array(items.reverse()))
}

/// Right-biased merge of every argument; non-array extras are appended
fn array_merge(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let mut merged = OrderedMap::new();
    for arg in args.iter() {
        match arg.as_array() {
            Some(items) => merged.extend_from(items),
            None => {
                merged.append(arg.clone());
            }
        }
    }
    Ok(Value::array(merged))
}

/// Position of the first element equal to the needle, else `void`
fn array_search(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let items = array_arg("array_search", args, 0)?;
    Ok(items
        .search(&args[1])
        .map_or_else(Value::void, |index| Value::int(index as i64)))
}

fn struct_fields(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let record = record_arg("struct_fields", args, 0)?;
    Ok(Value::array(record.field_names().map(Value::string).collect()))
}

fn record_merge(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let left = record_arg("record_merge", args, 0)?;
    let right = record_arg("record_merge", args, 1)?;
    Ok(Value::record(left.merge(right)))
}
