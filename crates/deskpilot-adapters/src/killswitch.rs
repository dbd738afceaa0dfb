//! Process-wide panic flag.
//!
//! Set by `/panic`, cleared by `/enable`, read at the start of every action.
//! A command already past its check is not interrupted; the flag stops the
//! next action.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::error::{AdapterError, Result};

#[derive(Debug, Default)]
pub struct PanicSwitch {
    engaged: AtomicBool,
}

impl PanicSwitch {
    /// Create a switch, optionally already engaged.
    pub fn new(engaged: bool) -> Self {
        Self {
            engaged: AtomicBool::new(engaged),
        }
    }

    /// Disable all actions.
    pub fn engage(&self) {
        self.engaged.store(true, Ordering::SeqCst);
        warn!("panic switch engaged, actions disabled");
    }

    /// Re-enable actions.
    pub fn release(&self) {
        self.engaged.store(false, Ordering::SeqCst);
        warn!("panic switch released, actions enabled");
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }

    /// Fail with [`AdapterError::Disabled`] while engaged.
    pub fn ensure_released(&self) -> Result<()> {
        if self.is_engaged() {
            Err(AdapterError::Disabled)
        } else {
            Ok(())
        }
    }
}
