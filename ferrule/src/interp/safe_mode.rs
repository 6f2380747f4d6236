//! Safe-mode gate for privileged operations

use std::cell::OnceCell;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SafeModeError {
    #[error("safe mode was already set to {current}")]
    AlreadySet { current: bool },
}

/// Boolean restriction flag, settable once.
///
/// Until it is set, safe mode reads as off.
#[derive(Debug, Default)]
pub struct SafeMode {
    flag: OnceCell<bool>,
}

impl SafeMode {
    pub fn new() -> Self {
        SafeMode::default()
    }

    pub fn enabled(enabled: bool) -> Self {
        SafeMode {
            flag: OnceCell::from(enabled),
        }
    }

    pub fn get(&self) -> bool {
        self.flag.get().copied().unwrap_or(false)
    }

    pub fn set(&self, enabled: bool) -> Result<(), SafeModeError> {
        self.flag
            .set(enabled)
            .map_err(|_| SafeModeError::AlreadySet { current: self.get() })
    }

    pub fn is_set(&self) -> bool {
        self.flag.get().is_some()
    }
}
