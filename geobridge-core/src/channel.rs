//! Error-channel discipline.
//!
//! The engine reports failures through a process-wide last-error slot
//! instead of return values. [`Boundary`] wraps every call so the slot is
//! read, and cleared, right after the call returns:
//!
//! ```text
//!  host ──call──▸ engine
//!    ◂──────────── (returns)
//!  err_code() != 0 ? ──yes──▸ err_msg(), err_clear() ──▸ Err(Boundary)
//!        │no
//!        ▼
//!      Ok(value)
//! ```

use std::sync::Arc;

use crate::engine::EngineApi;
use crate::error::{BridgeError, Result};
use crate::handle::NativeHandle;

/// Shared, checked access to an engine.
#[derive(Clone)]
pub struct Boundary {
    engine: Arc<dyn EngineApi>,
}

impl Boundary {
    pub fn new(engine: Arc<dyn EngineApi>) -> Self {
        Self { engine }
    }

    /// Unchecked access, for calls that never touch the channel (`log`) or
    /// for callers that check themselves.
    pub fn engine(&self) -> &dyn EngineApi {
        self.engine.as_ref()
    }

    pub fn shared(&self) -> Arc<dyn EngineApi> {
        Arc::clone(&self.engine)
    }

    /// Run one boundary call and check the channel afterwards.
    #[inline]
    pub fn call<T>(&self, f: impl FnOnce(&dyn EngineApi) -> T) -> Result<T> {
        let value = f(self.engine.as_ref());
        self.check()?;
        Ok(value)
    }

    /// Like [`call`](Self::call), for calls returning a handle. A null handle
    /// with a clean channel still fails.
    pub fn call_handle(
        &self,
        what: &'static str,
        f: impl FnOnce(&dyn EngineApi) -> Option<NativeHandle>,
    ) -> Result<NativeHandle> {
        self.call(f)?.ok_or(BridgeError::NullHandle(what))
    }

    /// Read and clear the error channel.
    pub fn check(&self) -> Result<()> {
        check_engine(self.engine.as_ref())
    }
}

/// Channel check for code that only holds a `&dyn EngineApi` (callback
/// trampolines).
pub fn check_engine(engine: &dyn EngineApi) -> Result<()> {
    let code = engine.err_code();
    if code == 0 {
        return Ok(());
    }
    let message = engine.err_msg();
    engine.err_clear();
    log::debug!("engine error {code}: {message}");
    Err(BridgeError::Boundary { code, message })
}

impl std::fmt::Debug for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Boundary").finish_non_exhaustive()
    }
}
