//! Higher-order natives: the callable comes first, the array last

use super::{builtin, Builtin};
use crate::interp::higher_order;
use crate::interp::{InterpResult, OrderedMap, Runtime, Value};

pub(super) const BUILTINS: &[Builtin] = &[
    builtin("map", map, 2, "?A", 'a'),
    builtin("filter", filter, 2, "?A", 'a'),
    builtin("fold", fold, 3, "??A", '?'),
    builtin("foldr", foldr, 3, "??A", '?'),
    builtin("take_while", take_while, 2, "?A", 'a'),
    builtin("drop_while", drop_while, 2, "?A", 'a'),
];

type Transform = fn(&mut Runtime, &Value, &OrderedMap<Value>) -> InterpResult<OrderedMap<Value>>;
type Fold = fn(&mut Runtime, &Value, Value, &OrderedMap<Value>) -> InterpResult<Value>;

fn transform(rt: &mut Runtime, args: &mut [Value], apply: Transform) -> InterpResult<Value> {
    let items = args[1].as_array().cloned().unwrap_or_default();
    apply(rt, &args[0], &items).map(Value::array)
}

fn reduce(rt: &mut Runtime, args: &mut [Value], apply: Fold) -> InterpResult<Value> {
    let items = args[2].as_array().cloned().unwrap_or_default();
    let init = std::mem::take(&mut args[1]);
    apply(rt, &args[0], init, &items)
}

fn map(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    transform(rt, args, higher_order::map)
}

fn filter(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    transform(rt, args, higher_order::filter)
}

fn take_while(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    transform(rt, args, higher_order::take_while)
}

fn drop_while(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    transform(rt, args, higher_order::drop_while)
}

fn fold(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    reduce(rt, args, higher_order::fold)
}

fn foldr(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    reduce(rt, args, higher_order::foldr)
}
