//! Natives that write the process environment.
//!
//! Environment writes race with reads on other threads, so this binary
//! holds a single test and every write happens on its thread.

use ferrule::config::RuntimeConfig;
use ferrule::interp::{Runtime, Value};
use ferrule::stdlib::runtime_with_stdlib;
use pretty_assertions::assert_eq;

fn call(rt: &mut Runtime, name: &str, args: Vec<Value>) -> Value {
    rt.call_by_name(name, args).unwrap()
}

fn set(rt: &mut Runtime, name: &str, value: impl Into<Vec<u8>>) -> Value {
    call(rt, "setenv", vec![Value::string(name), Value::string(value)])
}

fn get(rt: &mut Runtime, name: &str) -> Value {
    call(rt, "getenv", vec![Value::string(name)])
}

#[test]
fn test_environment_writes() {
    let mut rt = runtime_with_stdlib(&RuntimeConfig::default()).unwrap();

    // set then read back
    assert_eq!(set(&mut rt, "FERRULE_ENV_SET", "on"), Value::bool(true));
    assert_eq!(get(&mut rt, "FERRULE_ENV_SET"), Value::string("on"));
    assert_eq!(std::env::var("FERRULE_ENV_SET").as_deref(), Ok("on"));

    // forced string cast on the value
    let result = call(&mut rt, "setenv", vec![Value::string("FERRULE_ENV_INT"), Value::int(42)]);
    assert_eq!(result, Value::bool(true));
    assert_eq!(get(&mut rt, "FERRULE_ENV_INT"), Value::string("42"));

    // unset
    let removed = call(&mut rt, "unsetenv", vec![Value::string("FERRULE_ENV_SET")]);
    assert_eq!(removed, Value::bool(true));
    assert_eq!(get(&mut rt, "FERRULE_ENV_SET"), Value::void());
    assert!(std::env::var_os("FERRULE_ENV_SET").is_none());

    // bytes that are not UTF-8 reach the environment unchanged
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;

        let raw = vec![b'a', 0xff, 0xfe, b'z'];
        assert_eq!(set(&mut rt, "FERRULE_ENV_RAW", raw.clone()), Value::bool(true));
        let stored = std::env::var_os("FERRULE_ENV_RAW").unwrap();
        assert_eq!(stored.as_bytes(), raw.as_slice());
        assert_eq!(get(&mut rt, "FERRULE_ENV_RAW").as_bytes(), Some(raw.as_slice()));
    }

    assert!(rt.reports().is_empty());
}
