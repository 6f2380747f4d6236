//! Process environment natives
//!
//! Everything that changes the host process goes through the safe-mode gate.
//!
//! `setenv` and `unsetenv` write the process environment. The host must not
//! read or write the environment from any other thread while a runtime with
//! safe mode off runs scripts; that includes other runtimes on other
//! threads. Hosts that cannot promise this should enable safe mode.

use std::env;
use std::ffi::OsString;
use std::process::Command;

use super::{builtin, Builtin};
use crate::interp::{InterpResult, Runtime, Value};

pub(super) const BUILTINS: &[Builtin] = &[
    builtin("getenv", getenv, 1, "S", 's'),
    builtin("setenv", setenv, 2, "SS", 'b'),
    builtin("unsetenv", unsetenv, 1, "S", 'b'),
    builtin("system", system, 1, "S", 'i'),
];

fn bytes(value: &Value) -> &[u8] {
    value.as_bytes().unwrap_or_default()
}

/// Raw string bytes as an OS string; lossy where the platform is not
/// byte-oriented
#[cfg(unix)]
fn os_text(bytes: &[u8]) -> OsString {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::OsStr::from_bytes(bytes).to_os_string()
}

#[cfg(not(unix))]
fn os_text(bytes: &[u8]) -> OsString {
    OsString::from(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(unix)]
fn os_value(text: OsString) -> Value {
    use std::os::unix::ffi::OsStringExt;
    Value::string(text.into_vec())
}

#[cfg(not(unix))]
fn os_value(text: OsString) -> Value {
    Value::string(text.to_string_lossy().into_owned())
}

/// `set_var` panics on these, so they are reported instead
fn invalid_key(key: &[u8]) -> bool {
    key.is_empty() || key.contains(&b'=') || key.contains(&0)
}

/// getenv(name) -> string, or void when unset
fn getenv(_: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    let name = bytes(&args[0]);
    if invalid_key(name) {
        return Ok(Value::void());
    }
    Ok(env::var_os(os_text(name)).map_or_else(Value::void, os_value))
}

/// setenv(name, value) -> bool
fn setenv(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    if !rt.allow_privileged("setenv") {
        return Ok(Value::bool(false));
    }
    let (name, value) = (bytes(&args[0]), bytes(&args[1]));
    if invalid_key(name) || value.contains(&0) {
        let name = String::from_utf8_lossy(name);
        return Ok(rt.nonfatal_or(format!("setenv: invalid variable {name:?}"), Value::bool(false)));
    }
    let (name, value) = (os_text(name), os_text(value));
    tracing::debug!(name = %name.to_string_lossy(), "setenv");
    // SAFETY: no other thread touches the environment while privileged
    // natives run; hosts uphold this per the module docs.
    unsafe { env::set_var(&name, &value) };
    Ok(Value::bool(true))
}

/// unsetenv(name) -> bool
fn unsetenv(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    if !rt.allow_privileged("unsetenv") {
        return Ok(Value::bool(false));
    }
    let name = bytes(&args[0]);
    if invalid_key(name) {
        let name = String::from_utf8_lossy(name);
        return Ok(rt.nonfatal_or(format!("unsetenv: invalid variable {name:?}"), Value::bool(false)));
    }
    let name = os_text(name);
    tracing::debug!(name = %name.to_string_lossy(), "unsetenv");
    // SAFETY: see `setenv`.
    unsafe { env::remove_var(&name) };
    Ok(Value::bool(true))
}

/// system(command) -> exit code, -1 when the shell could not run or the
/// command was killed by a signal
fn system(rt: &mut Runtime, args: &mut [Value]) -> InterpResult<Value> {
    if !rt.allow_privileged("system") {
        return Ok(Value::void());
    }
    let command = String::from_utf8_lossy(bytes(&args[0])).into_owned();

    #[cfg(windows)]
    let status = Command::new("cmd").args(["/C", &command]).status();
    #[cfg(not(windows))]
    let status = Command::new("sh").args(["-c", &command]).status();

    match status {
        Ok(status) => Ok(Value::int(status.code().map_or(-1, i64::from))),
        Err(err) => Ok(rt.nonfatal_or(format!("system: {err}"), Value::int(-1))),
    }
}
