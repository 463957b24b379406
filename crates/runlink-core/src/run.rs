//! Runs: the unit of logging and completion.
//!
//! A run moves `Created → Logging → Finished` and never back. Two logging
//! disciplines exist as two types:
//!
//! - [`Run`]: atomic. Each `log` builds one data handle and commits it with a
//!   single `log_data` call.
//! - [`PartialRun`]: partial-commit. `stage` sends the integer and double
//!   groups with `commit = false`; `commit` closes the record.
//!
//! Both take `&mut self` for every call, so logging on one run is serialized.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::codec;
use crate::data::DataHandle;
use crate::engine::{RawHandle, BINDING_TAG};
use crate::error::{Result, RunlinkError};
use crate::models::KeyValueMap;
use crate::options::ResolvedOptions;
use crate::session::Session;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Logging,
    Finished,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Created => write!(f, "CREATED"),
            RunState::Logging => write!(f, "LOGGING"),
            RunState::Finished => write!(f, "FINISHED"),
        }
    }
}

/// State shared by both run types.
#[derive(Debug)]
struct RunCore {
    session: Session,
    handle: RawHandle,
    state: RunState,
    settings: Option<Arc<Settings>>,
    name: Option<String>,
    run_id: Option<String>,
    project: Option<String>,
}

impl RunCore {
    fn create(session: &Session, options: ResolvedOptions) -> Result<Self> {
        session.ensure_setup()?;
        let _ready = session.ready()?;
        let engine = session.engine();

        let handle = {
            let config = DataHandle::create(engine, options.config.as_deref())?;
            engine.init_run(
                config.raw(),
                options.name.as_deref().unwrap_or_default(),
                options.run_id.as_deref().unwrap_or_default(),
                options.project.as_deref().unwrap_or_default(),
                BINDING_TAG,
            )?
        };
        if handle <= 0 {
            return Err(RunlinkError::EngineInit { code: handle });
        }

        info!(
            run = handle,
            name = options.name.as_deref().unwrap_or("-"),
            project = options.project.as_deref().unwrap_or("-"),
            offline = options.settings.as_ref().is_some_and(|s| s.offline()),
            "Run initialized"
        );

        Ok(Self {
            session: session.clone(),
            handle,
            state: RunState::Created,
            settings: options.settings,
            name: options.name,
            run_id: options.run_id,
            project: options.project,
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.state == RunState::Finished {
            return Err(RunlinkError::UseAfterFinish {
                handle: self.handle,
            });
        }
        Ok(())
    }

    // The engine calls below expect the caller to hold `session.ready()`.

    fn finish_engine(&self) -> Result<()> {
        self.session.engine().finish(self.handle)?;
        info!(run = self.handle, "Run finished");
        Ok(())
    }
}

impl Drop for RunCore {
    fn drop(&mut self) {
        if self.state == RunState::Finished {
            return;
        }
        let Ok(_ready) = self.session.ready() else {
            return;
        };
        warn!(run = self.handle, "Run dropped without finish(); finishing it");
        if let Err(e) = self.session.engine().finish(self.handle) {
            warn!(run = self.handle, "Failed to finish dropped run: {}", e);
        }
    }
}

macro_rules! run_accessors {
    () => {
        /// The engine's handle for this run.
        pub fn handle(&self) -> RawHandle {
            self.core.handle
        }

        pub fn state(&self) -> RunState {
            self.core.state
        }

        pub fn settings(&self) -> Option<&Settings> {
            self.core.settings.as_deref()
        }

        pub fn name(&self) -> Option<&str> {
            self.core.name.as_deref()
        }

        pub fn run_id(&self) -> Option<&str> {
            self.core.run_id.as_deref()
        }

        pub fn project(&self) -> Option<&str> {
            self.core.project.as_deref()
        }

        pub fn session(&self) -> &Session {
            &self.core.session
        }
    };
}

/// A run using the atomic logging discipline.
#[derive(Debug)]
pub struct Run {
    core: RunCore,
}

impl Run {
    /// Set the session up if needed and create the run in the engine.
    pub fn create(session: &Session, options: ResolvedOptions) -> Result<Self> {
        Ok(Self {
            core: RunCore::create(session, options)?,
        })
    }

    run_accessors!();

    /// Log `data` as one committed record.
    pub fn log(&mut self, data: &KeyValueMap) -> Result<()> {
        self.core.check_open()?;
        let _ready = self.core.session.ready()?;
        self.core.state = RunState::Logging;

        let engine = self.core.session.engine();
        let handle = DataHandle::create(engine, Some(data))?;
        engine.log_data(self.core.handle, handle.raw())?;
        debug!(run = self.core.handle, entries = data.len(), "Logged record");
        Ok(())
    }

    /// Finish the run. A second call fails with `UseAfterFinish`.
    pub fn finish(&mut self) -> Result<()> {
        self.core.check_open()?;
        let _ready = self.core.session.ready()?;
        self.core.finish_engine()?;
        self.core.state = RunState::Finished;
        Ok(())
    }
}

/// A run using the partial-commit logging discipline. Only integer and
/// double values can be sent this way.
#[derive(Debug)]
pub struct PartialRun {
    core: RunCore,
    pending: bool,
}

impl PartialRun {
    pub fn create(session: &Session, options: ResolvedOptions) -> Result<Self> {
        Ok(Self {
            core: RunCore::create(session, options)?,
            pending: false,
        })
    }

    run_accessors!();

    /// Whether data has been staged since the last commit.
    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Send `data` without committing. Text values are rejected before any
    /// engine call.
    pub fn stage(&mut self, data: &KeyValueMap) -> Result<()> {
        self.core.check_open()?;
        let session = self.core.session.clone();
        let _ready = session.ready()?;
        self.send(data)
    }

    /// Close the current record.
    pub fn commit(&mut self) -> Result<()> {
        self.core.check_open()?;
        let session = self.core.session.clone();
        let _ready = session.ready()?;
        self.close()
    }

    /// Stage `data` and commit it as one record. An empty map still closes
    /// a record, as an atomic log of an empty map does.
    pub fn log(&mut self, data: &KeyValueMap) -> Result<()> {
        self.core.check_open()?;
        let session = self.core.session.clone();
        let _ready = session.ready()?;
        self.send(data)?;
        self.close()
    }

    /// Commit anything pending, then finish the run.
    pub fn finish(&mut self) -> Result<()> {
        self.core.check_open()?;
        let session = self.core.session.clone();
        let _ready = session.ready()?;
        if self.pending {
            self.close()?;
        }
        self.core.finish_engine()?;
        self.core.state = RunState::Finished;
        Ok(())
    }

    fn send(&mut self, data: &KeyValueMap) -> Result<()> {
        let batches = codec::partition(data);
        if let Some(texts) = batches.texts() {
            return Err(RunlinkError::InvalidValueType {
                key: texts.keys[0].to_string(),
                found: "text",
            });
        }
        self.core.state = RunState::Logging;

        let engine = self.core.session.engine();
        if let Some(b) = batches.ints() {
            engine.log_ints(self.core.handle, false, &b.keys, &b.values)?;
            self.pending = true;
        }
        if let Some(b) = batches.doubles() {
            engine.log_doubles(self.core.handle, false, &b.keys, &b.values)?;
            self.pending = true;
        }
        debug!(run = self.core.handle, entries = data.len(), "Staged partial record");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.core.state = RunState::Logging;
        self.core.session.engine().log_commit(self.core.handle)?;
        self.pending = false;
        Ok(())
    }
}
