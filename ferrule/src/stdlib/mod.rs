//! Standard-library natives registered on a runtime
//!
//! These are consumers of the core: every call reaches them through
//! signature binding, so forced prototype positions arrive already coerced.

mod array;
mod control;
mod env;
mod functional;

use crate::interp::{InterpResult, NativeFn, Runtime};

/// One native registration
pub(crate) struct Builtin {
    pub name: &'static str,
    pub function: NativeFn,
    pub arg_count: usize,
    pub prototype: &'static str,
    pub returns: char,
}

const fn builtin(
    name: &'static str,
    function: NativeFn,
    arg_count: usize,
    prototype: &'static str,
    returns: char,
) -> Builtin {
    Builtin {
        name,
        function,
        arg_count,
        prototype,
        returns,
    }
}

/// Register every stdlib native on `rt`.
///
/// `setenv` and `unsetenv` write the process environment: while a runtime
/// with safe mode off runs scripts, no other thread may read or write it.
pub fn install(rt: &mut Runtime) -> InterpResult<()> {
    let tables = [array::BUILTINS, control::BUILTINS, env::BUILTINS, functional::BUILTINS];
    for entry in tables.into_iter().flatten() {
        rt.register_function(entry.name, entry.function, entry.arg_count, entry.prototype, entry.returns)?;
    }
    tracing::debug!(count = tables.iter().map(|t| t.len()).sum::<usize>(), "stdlib installed");
    Ok(())
}

/// Runtime with the stdlib installed
pub fn runtime_with_stdlib(config: &crate::config::RuntimeConfig) -> InterpResult<Runtime> {
    let mut rt = Runtime::with_config(config);
    install(&mut rt)?;
    Ok(rt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Prototype;

    #[test]
    fn test_every_prototype_parses() {
        let tables = [array::BUILTINS, control::BUILTINS, env::BUILTINS, functional::BUILTINS];
        for entry in tables.into_iter().flatten() {
            assert!(Prototype::parse(entry.prototype).is_ok(), "{}", entry.name);
        }
    }

    #[test]
    fn test_install_registers_names() {
        let mut rt = Runtime::new();
        install(&mut rt).unwrap();
        for name in ["mkkeyarray", "array_keys", "setenv", "throw", "map", "foldr"] {
            assert!(rt.scopes().lookup_function(name).is_some(), "missing {name}");
        }
    }
}
