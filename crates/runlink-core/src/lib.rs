//! runlink-core: session, run and value-marshalling protocol for the
//! experiment-tracking core engine.
//!
//! The engine does all recording and transport. This crate only moves caller
//! data across its integer-handle boundary: a [`Session`] sets the engine up
//! once, a [`Run`] (or [`PartialRun`]) wraps one run handle, and every
//! [`KeyValueMap`] logged is split into per-type batches and handed over as a
//! short-lived, always-freed data handle.

pub mod codec;
mod data;
pub mod engine;
pub mod error;
pub mod models;
#[cfg(feature = "native")]
pub mod native;
pub mod options;
pub mod recording;
pub mod run;
pub mod session;
pub mod settings;

pub use engine::{CoreEngine, RawHandle, BINDING_TAG, NO_DATA};
pub use error::{EngineFault, Result, RunlinkError};
pub use models::{KeyValueMap, Value};
#[cfg(feature = "native")]
pub use native::NativeEngine;
pub use options::{
    merge, with_config, with_project, with_run_id, with_run_name, with_settings, ResolvedOptions,
    RunOption,
};
pub use recording::{DataRecord, EngineCall, RecordingEngine};
pub use run::{PartialRun, Run, RunState};
pub use session::{Session, SessionState};
pub use settings::{Settings, SettingsOptions};
