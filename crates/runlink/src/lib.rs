//! runlink: experiment-tracking client binding.
//!
//! Re-exports [`runlink_core`] and adds a process-wide default [`Session`]
//! for callers that do not want to thread one through their code:
//!
//! ```no_run
//! use std::sync::Arc;
//! use runlink::{KeyValueMap, RecordingEngine};
//!
//! runlink::install(Arc::new(RecordingEngine::new())).unwrap();
//! let mut run = runlink::init_run([runlink::with_run_name("demo")]).unwrap();
//! run.log(&KeyValueMap::from_pairs([("loss", 0.5)]).unwrap()).unwrap();
//! run.finish().unwrap();
//! runlink::shutdown();
//! ```
//!
//! The default session is a static and is never dropped, so the engine is
//! only torn down by [`shutdown`].

use std::sync::{Arc, OnceLock};

use tracing::info;

pub use runlink_core::*;

static DEFAULT_SESSION: OnceLock<Session> = OnceLock::new();

/// Install `engine` as the backing of the default session. Fails with
/// `AlreadyInstalled` once a default session exists.
pub fn install(engine: Arc<dyn CoreEngine>) -> Result<&'static Session> {
    DEFAULT_SESSION
        .set(Session::new(engine))
        .map_err(|_| RunlinkError::AlreadyInstalled)?;
    info!("Default session installed");
    DEFAULT_SESSION.get().ok_or(RunlinkError::EngineNotReady)
}

/// The default session. Without an installed engine it is created over the
/// native engine when built with the `native` feature, and is otherwise
/// `EngineNotReady`.
pub fn default_session() -> Result<&'static Session> {
    if let Some(session) = DEFAULT_SESSION.get() {
        return Ok(session);
    }
    fallback_session()
}

#[cfg(feature = "native")]
fn fallback_session() -> Result<&'static Session> {
    Ok(DEFAULT_SESSION.get_or_init(|| {
        info!("Default session created over the native engine");
        Session::new(Arc::new(NativeEngine::new()))
    }))
}

#[cfg(not(feature = "native"))]
fn fallback_session() -> Result<&'static Session> {
    Err(RunlinkError::EngineNotReady)
}

/// Create an atomic-discipline run on the default session.
pub fn init_run<I>(options: I) -> Result<Run>
where
    I: IntoIterator<Item = RunOption>,
{
    default_session()?.init_run(options)
}

/// Create a partial-commit run on the default session.
pub fn init_partial_run<I>(options: I) -> Result<PartialRun>
where
    I: IntoIterator<Item = RunOption>,
{
    default_session()?.init_partial_run(options)
}

/// Tear down the default session's engine, if it was ever set up.
pub fn shutdown() {
    if let Some(session) = DEFAULT_SESSION.get() {
        session.shutdown();
    }
}
