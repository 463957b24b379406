//! Session: owns the one-time engine setup/teardown and creates runs.
//!
//! A `Session` is a cheap, cloneable context handle. Runs keep a clone, so the
//! engine stays set up while any run is alive. Teardown happens exactly once:
//! on [`Session::shutdown`], or when the last clone (and every run created
//! from it) is dropped.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{info, warn};

use crate::engine::CoreEngine;
use crate::error::{Result, RunlinkError};
use crate::options::{merge, RunOption};
use crate::run::{PartialRun, Run};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    TornDown,
}

struct SessionInner {
    engine: Arc<dyn CoreEngine>,
    state: RwLock<SessionState>,
}

impl SessionInner {
    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if *state == SessionState::Ready {
            self.engine.teardown();
            *state = SessionState::TornDown;
            info!("Core engine torn down on session drop");
        }
    }
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session over `engine`. No engine call is made until the
    /// first run is created (or [`Session::ensure_setup`] is called).
    pub fn new(engine: Arc<dyn CoreEngine>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                engine,
                state: RwLock::new(SessionState::Uninitialized),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.read()
    }

    /// Set the engine up if that has not happened yet. Concurrent callers
    /// block until the single setup call returns.
    pub fn ensure_setup(&self) -> Result<()> {
        let mut state = self.inner.write();
        match *state {
            SessionState::Uninitialized => {
                self.inner.engine.setup();
                *state = SessionState::Ready;
                info!("Core engine set up");
                Ok(())
            }
            SessionState::Ready => Ok(()),
            SessionState::TornDown => Err(RunlinkError::EngineNotReady),
        }
    }

    /// Tear the engine down if it was set up. Later calls are no-ops, and the
    /// session can no longer create or drive runs. Waits for run operations
    /// already in flight to return.
    pub fn shutdown(&self) {
        let mut state = self.inner.write();
        match *state {
            SessionState::Ready => {
                self.inner.engine.teardown();
                info!("Core engine torn down");
            }
            SessionState::Uninitialized => {
                warn!("Session shut down before the engine was ever set up");
            }
            SessionState::TornDown => return,
        }
        *state = SessionState::TornDown;
    }

    /// Create a run using the atomic logging discipline.
    pub fn init_run<I>(&self, options: I) -> Result<Run>
    where
        I: IntoIterator<Item = RunOption>,
    {
        Run::create(self, merge(options))
    }

    /// Create a run using the partial-commit logging discipline.
    pub fn init_partial_run<I>(&self, options: I) -> Result<PartialRun>
    where
        I: IntoIterator<Item = RunOption>,
    {
        PartialRun::create(self, merge(options))
    }

    pub(crate) fn engine(&self) -> &dyn CoreEngine {
        self.inner.engine.as_ref()
    }

    /// Shared access to a set-up engine. Teardown waits until the guard is
    /// dropped, so hold it across every engine call of one operation, and
    /// take it at most once per thread.
    pub(crate) fn ready(&self) -> Result<RwLockReadGuard<'_, SessionState>> {
        let state = self.inner.read();
        match *state {
            SessionState::Ready => Ok(state),
            _ => Err(RunlinkError::EngineNotReady),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{EngineCall, RecordingEngine};
    use std::thread;

    #[test]
    fn test_setup_happens_once() {
        let engine = Arc::new(RecordingEngine::new());
        let session = Session::new(engine.clone());
        assert_eq!(session.state(), SessionState::Uninitialized);
        session.ensure_setup().unwrap();
        session.ensure_setup().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(engine.count(|c| *c == EngineCall::Setup), 1);
    }

    #[test]
    fn test_concurrent_setup_happens_once() {
        let engine = Arc::new(RecordingEngine::new());
        let session = Session::new(engine.clone());
        let workers: Vec<_> = (0..16)
            .map(|_| {
                let session = session.clone();
                thread::spawn(move || session.ensure_setup())
            })
            .collect();
        for w in workers {
            w.join().unwrap().unwrap();
        }
        assert_eq!(engine.count(|c| *c == EngineCall::Setup), 1);
    }

    #[test]
    fn test_shutdown_without_setup_skips_teardown() {
        let engine = Arc::new(RecordingEngine::new());
        let session = Session::new(engine.clone());
        session.shutdown();
        assert_eq!(session.state(), SessionState::TornDown);
        assert!(engine.calls().is_empty());
        assert!(matches!(session.ensure_setup(), Err(RunlinkError::EngineNotReady)));
    }

    #[test]
    fn test_teardown_at_most_once() {
        let engine = Arc::new(RecordingEngine::new());
        let session = Session::new(engine.clone());
        session.ensure_setup().unwrap();
        session.shutdown();
        session.shutdown();
        drop(session);
        assert_eq!(engine.calls(), vec![EngineCall::Setup, EngineCall::Teardown]);
        assert!(engine.violations().is_empty());
    }

    #[test]
    fn test_drop_tears_down() {
        let engine = Arc::new(RecordingEngine::new());
        {
            let session = Session::new(engine.clone());
            let _clone = session.clone();
            session.ensure_setup().unwrap();
        }
        assert_eq!(engine.count(|c| *c == EngineCall::Teardown), 1);
    }
}
