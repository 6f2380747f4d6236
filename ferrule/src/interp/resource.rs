//! Opaque host handles with destructor callbacks

use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Callback receiving the handle when the last reference is dropped
pub type Destructor = Box<dyn FnOnce(Box<dyn Any>)>;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// A host-owned object wrapped as a script value.
///
/// Copies of a resource value share the handle; the destructor runs once,
/// when the last `Rc<Resource>` goes away.
pub struct Resource {
    id: u64,
    kind: String,
    handle: RefCell<Option<Box<dyn Any>>>,
    destructor: Option<Destructor>,
}

impl Resource {
    pub fn new(
        kind: impl Into<String>,
        handle: impl Any,
        destructor: impl FnOnce(Box<dyn Any>) + 'static,
    ) -> Self {
        Resource {
            id: NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed),
            kind: kind.into(),
            handle: RefCell::new(Some(Box::new(handle))),
            destructor: Some(Box::new(destructor)),
        }
    }

    /// Wrap a handle whose cleanup is its own `Drop`
    pub fn without_destructor(kind: impl Into<String>, handle: impl Any) -> Self {
        Resource {
            id: NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed),
            kind: kind.into(),
            handle: RefCell::new(Some(Box::new(handle))),
            destructor: None,
        }
    }

    /// Creation-ordered identity, also used for ordering
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Borrow the handle as `H`, if it is one
    pub fn handle<H: Any>(&self) -> Option<Ref<'_, H>> {
        Ref::filter_map(self.handle.borrow(), |handle| {
            handle.as_deref().and_then(|h| h.downcast_ref::<H>())
        })
        .ok()
    }

    /// Mutate the handle in place
    pub fn with_handle_mut<H: Any, R>(&self, f: impl FnOnce(&mut H) -> R) -> Option<R> {
        let mut handle = self.handle.borrow_mut();
        let h = handle.as_deref_mut()?.downcast_mut::<H>()?;
        Some(f(h))
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        if let (Some(handle), Some(destructor)) = (self.handle.get_mut().take(), self.destructor.take()) {
            tracing::trace!(id = self.id, kind = %self.kind, "running resource destructor");
            destructor(handle);
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
