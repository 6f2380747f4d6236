//! RAII scope guard over the runtime
//!
//! The guard holds `&mut Runtime` and derefs to it, so everything that runs
//! inside the scope goes through the guard. Dropping it, including during a
//! panic unwind, restores the scope depth and call depth it recorded.

use std::ops::{Deref, DerefMut};

use super::runtime::Runtime;

pub struct ScopedRuntime<'rt> {
    runtime: &'rt mut Runtime,
    scope_depth: usize,
    call_depth: usize,
}

impl<'rt> ScopedRuntime<'rt> {
    pub(crate) fn new(runtime: &'rt mut Runtime) -> Self {
        let scope_depth = runtime.depth();
        let call_depth = runtime.call_depth();
        runtime.scopes_mut().push_scope();
        ScopedRuntime {
            runtime,
            scope_depth,
            call_depth,
        }
    }
}

impl Drop for ScopedRuntime<'_> {
    fn drop(&mut self) {
        // Frames left behind by an inner unwind go too
        self.runtime.scopes_mut().truncate(self.scope_depth);
        self.runtime.restore_call_depth(self.call_depth);
    }
}

impl Deref for ScopedRuntime<'_> {
    type Target = Runtime;

    fn deref(&self) -> &Self::Target {
        self.runtime
    }
}

impl DerefMut for ScopedRuntime<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.runtime
    }
}
