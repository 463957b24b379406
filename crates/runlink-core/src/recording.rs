//! In-memory core engine.
//!
//! `RecordingEngine` hands out handles, journals every call it receives and
//! keeps the records each run logged. It checks the handle protocol as it
//! goes: freeing an unknown handle, using a freed one, or logging against a
//! finished run is noted in [`RecordingEngine::violations`] instead of
//! panicking, so callers can assert on it. Used by the test suites and by the
//! `runlink replay` command.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::engine::{CoreEngine, EngineResult, RawHandle, NO_DATA};
use crate::error::EngineFault;

/// One call received by the engine, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EngineCall {
    Setup,
    Teardown,
    InitRun {
        run: RawHandle,
        config: RawHandle,
        name: String,
        run_id: String,
        project: String,
        binding_tag: String,
    },
    CreateData {
        data: RawHandle,
    },
    AddInts {
        data: RawHandle,
        keys: Vec<String>,
        values: Vec<i64>,
    },
    AddDoubles {
        data: RawHandle,
        keys: Vec<String>,
        values: Vec<f64>,
    },
    AddStrings {
        data: RawHandle,
        keys: Vec<String>,
        values: Vec<String>,
    },
    FreeData {
        data: RawHandle,
    },
    LogData {
        run: RawHandle,
        data: RawHandle,
    },
    LogInts {
        run: RawHandle,
        commit: bool,
        keys: Vec<String>,
        values: Vec<i64>,
    },
    LogDoubles {
        run: RawHandle,
        commit: bool,
        keys: Vec<String>,
        values: Vec<f64>,
    },
    LogCommit {
        run: RawHandle,
    },
    Finish {
        run: RawHandle,
    },
}

impl EngineCall {
    pub fn op(&self) -> &'static str {
        match self {
            EngineCall::Setup => "setup",
            EngineCall::Teardown => "teardown",
            EngineCall::InitRun { .. } => "init_run",
            EngineCall::CreateData { .. } => "create_data",
            EngineCall::AddInts { .. } => "add_ints",
            EngineCall::AddDoubles { .. } => "add_doubles",
            EngineCall::AddStrings { .. } => "add_strings",
            EngineCall::FreeData { .. } => "free_data",
            EngineCall::LogData { .. } => "log_data",
            EngineCall::LogInts { .. } => "log_ints",
            EngineCall::LogDoubles { .. } => "log_doubles",
            EngineCall::LogCommit { .. } => "log_commit",
            EngineCall::Finish { .. } => "finish",
        }
    }
}

/// Entries gathered under one data handle, or one committed run record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataRecord {
    pub ints: Vec<(String, i64)>,
    pub doubles: Vec<(String, f64)>,
    pub strings: Vec<(String, String)>,
}

impl DataRecord {
    pub fn len(&self) -> usize {
        self.ints.len() + self.doubles.len() + self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn numeric_len(&self) -> usize {
        self.ints.len() + self.doubles.len()
    }
}

#[derive(Debug, Default)]
struct RunEntry {
    finished: bool,
    config: Option<DataRecord>,
    history: Vec<DataRecord>,
    staged: DataRecord,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<EngineCall>,
    next_run: RawHandle,
    next_data: RawHandle,
    set_up: bool,
    torn_down: bool,
    data: HashMap<RawHandle, DataRecord>,
    freed: HashSet<RawHandle>,
    runs: HashMap<RawHandle, RunEntry>,
    fail_next: HashSet<&'static str>,
    invalid_next_init: bool,
    lose_next: HashSet<&'static str>,
    violations: Vec<String>,
}

impl State {
    fn take_failure(&mut self, op: &'static str) -> EngineResult<()> {
        if self.fail_next.remove(op) {
            Err(EngineFault::new(op, "injected failure"))
        } else {
            Ok(())
        }
    }

    /// Handle returned by an add call: normally the one it was given.
    fn added(&mut self, op: &'static str, data: RawHandle) -> RawHandle {
        if self.lose_next.remove(op) {
            NO_DATA
        } else {
            data
        }
    }

    fn check_data(&mut self, op: &str, data: RawHandle) -> bool {
        if self.data.contains_key(&data) {
            return true;
        }
        let why = if self.freed.contains(&data) { "freed" } else { "unknown" };
        self.violations.push(format!("{op}: {why} data handle {data}"));
        false
    }

    fn check_run(&mut self, op: &str, run: RawHandle) -> bool {
        match self.runs.get(&run) {
            Some(entry) if !entry.finished => true,
            Some(_) => {
                self.violations.push(format!("{op}: run {run} already finished"));
                false
            }
            None => {
                self.violations.push(format!("{op}: unknown run handle {run}"));
                false
            }
        }
    }
}

fn pairs<T: Clone>(keys: &[&str], values: &[T]) -> Vec<(String, T)> {
    keys.iter()
        .zip(values)
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn owned(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

#[derive(Debug, Default)]
pub struct RecordingEngine {
    state: Mutex<State>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call of `op` (e.g. `"log_data"`) fail with an [`EngineFault`].
    /// The call is still journaled.
    pub fn fail_next(&self, op: &'static str) {
        self.lock().fail_next.insert(op);
    }

    /// Make the next `init_run` return an invalid (negative) run handle.
    pub fn invalid_next_init(&self) {
        self.lock().invalid_next_init = true;
    }

    /// Make the next call of the add operation `op` (e.g. `"add_ints"`)
    /// return the "no data" handle instead of the handle it was given.
    pub fn lose_next_data(&self, op: &'static str) {
        self.lock().lose_next.insert(op);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Number of data handles created and not yet freed.
    pub fn live_data(&self) -> usize {
        self.lock().data.len()
    }

    pub fn violations(&self) -> Vec<String> {
        self.lock().violations.clone()
    }

    /// Config the run was created with, if any.
    pub fn config(&self, run: RawHandle) -> Option<DataRecord> {
        self.lock().runs.get(&run).and_then(|r| r.config.clone())
    }

    /// Committed records of `run`, oldest first.
    pub fn history(&self, run: RawHandle) -> Vec<DataRecord> {
        self.lock()
            .runs
            .get(&run)
            .map(|r| r.history.clone())
            .unwrap_or_default()
    }

    pub fn is_finished(&self, run: RawHandle) -> bool {
        self.lock().runs.get(&run).is_some_and(|r| r.finished)
    }
}

impl CoreEngine for RecordingEngine {
    fn setup(&self) {
        let mut st = self.lock();
        st.calls.push(EngineCall::Setup);
        if st.set_up {
            st.violations.push("setup: called twice".to_string());
        }
        st.set_up = true;
    }

    fn teardown(&self) {
        let mut st = self.lock();
        st.calls.push(EngineCall::Teardown);
        if !st.set_up {
            st.violations.push("teardown: engine was never set up".to_string());
        }
        if st.torn_down {
            st.violations.push("teardown: called twice".to_string());
        }
        st.torn_down = true;
    }

    fn init_run(
        &self,
        config: RawHandle,
        name: &str,
        run_id: &str,
        project: &str,
        binding_tag: &str,
    ) -> EngineResult<RawHandle> {
        let mut st = self.lock();
        let run = if std::mem::take(&mut st.invalid_next_init) {
            -1
        } else {
            st.next_run += 1;
            st.next_run
        };
        st.calls.push(EngineCall::InitRun {
            run,
            config,
            name: name.to_string(),
            run_id: run_id.to_string(),
            project: project.to_string(),
            binding_tag: binding_tag.to_string(),
        });
        st.take_failure("init_run")?;
        if !st.set_up || st.torn_down {
            st.violations.push("init_run: engine not set up".to_string());
        }
        if run <= 0 {
            return Ok(run);
        }
        let config = if config == 0 {
            None
        } else if st.check_data("init_run", config) {
            st.data.get(&config).cloned()
        } else {
            None
        };
        st.runs.insert(
            run,
            RunEntry {
                config,
                ..Default::default()
            },
        );
        Ok(run)
    }

    fn create_data(&self) -> EngineResult<RawHandle> {
        let mut st = self.lock();
        st.next_data += 1;
        let data = st.next_data;
        st.calls.push(EngineCall::CreateData { data });
        st.take_failure("create_data")?;
        st.data.insert(data, DataRecord::default());
        Ok(data)
    }

    fn add_ints(&self, data: RawHandle, keys: &[&str], values: &[i64]) -> EngineResult<RawHandle> {
        let mut st = self.lock();
        st.calls.push(EngineCall::AddInts {
            data,
            keys: owned(keys),
            values: values.to_vec(),
        });
        st.take_failure("add_ints")?;
        if st.check_data("add_ints", data) {
            if let Some(rec) = st.data.get_mut(&data) {
                rec.ints.extend(pairs(keys, values));
            }
        }
        Ok(st.added("add_ints", data))
    }

    fn add_doubles(
        &self,
        data: RawHandle,
        keys: &[&str],
        values: &[f64],
    ) -> EngineResult<RawHandle> {
        let mut st = self.lock();
        st.calls.push(EngineCall::AddDoubles {
            data,
            keys: owned(keys),
            values: values.to_vec(),
        });
        st.take_failure("add_doubles")?;
        if st.check_data("add_doubles", data) {
            if let Some(rec) = st.data.get_mut(&data) {
                rec.doubles.extend(pairs(keys, values));
            }
        }
        Ok(st.added("add_doubles", data))
    }

    fn add_strings(
        &self,
        data: RawHandle,
        keys: &[&str],
        values: &[&str],
    ) -> EngineResult<RawHandle> {
        let mut st = self.lock();
        st.calls.push(EngineCall::AddStrings {
            data,
            keys: owned(keys),
            values: owned(values),
        });
        st.take_failure("add_strings")?;
        if st.check_data("add_strings", data) {
            if let Some(rec) = st.data.get_mut(&data) {
                rec.strings.extend(
                    keys.iter()
                        .zip(values)
                        .map(|(k, v)| (k.to_string(), v.to_string())),
                );
            }
        }
        Ok(st.added("add_strings", data))
    }

    fn free_data(&self, data: RawHandle) {
        let mut st = self.lock();
        st.calls.push(EngineCall::FreeData { data });
        if st.check_data("free_data", data) {
            st.data.remove(&data);
            st.freed.insert(data);
        }
    }

    fn log_data(&self, run: RawHandle, data: RawHandle) -> EngineResult<()> {
        let mut st = self.lock();
        st.calls.push(EngineCall::LogData { run, data });
        st.take_failure("log_data")?;
        if st.check_data("log_data", data) && st.check_run("log_data", run) {
            let record = st.data.get(&data).cloned().unwrap_or_default();
            if let Some(entry) = st.runs.get_mut(&run) {
                entry.history.push(record);
            }
        }
        Ok(())
    }

    fn log_ints(
        &self,
        run: RawHandle,
        commit: bool,
        keys: &[&str],
        values: &[i64],
    ) -> EngineResult<()> {
        let mut st = self.lock();
        st.calls.push(EngineCall::LogInts {
            run,
            commit,
            keys: owned(keys),
            values: values.to_vec(),
        });
        st.take_failure("log_ints")?;
        if st.check_run("log_ints", run) {
            if let Some(entry) = st.runs.get_mut(&run) {
                entry.staged.ints.extend(pairs(keys, values));
                if commit {
                    let record = std::mem::take(&mut entry.staged);
                    entry.history.push(record);
                }
            }
        }
        Ok(())
    }

    fn log_doubles(
        &self,
        run: RawHandle,
        commit: bool,
        keys: &[&str],
        values: &[f64],
    ) -> EngineResult<()> {
        let mut st = self.lock();
        st.calls.push(EngineCall::LogDoubles {
            run,
            commit,
            keys: owned(keys),
            values: values.to_vec(),
        });
        st.take_failure("log_doubles")?;
        if st.check_run("log_doubles", run) {
            if let Some(entry) = st.runs.get_mut(&run) {
                entry.staged.doubles.extend(pairs(keys, values));
                if commit {
                    let record = std::mem::take(&mut entry.staged);
                    entry.history.push(record);
                }
            }
        }
        Ok(())
    }

    fn log_commit(&self, run: RawHandle) -> EngineResult<()> {
        let mut st = self.lock();
        st.calls.push(EngineCall::LogCommit { run });
        st.take_failure("log_commit")?;
        if st.check_run("log_commit", run) {
            if let Some(entry) = st.runs.get_mut(&run) {
                let record = std::mem::take(&mut entry.staged);
                entry.history.push(record);
            }
        }
        Ok(())
    }

    fn finish(&self, run: RawHandle) -> EngineResult<()> {
        let mut st = self.lock();
        st.calls.push(EngineCall::Finish { run });
        st.take_failure("finish")?;
        if st.check_run("finish", run) {
            if let Some(entry) = st.runs.get_mut(&run) {
                // Uncommitted partial data is committed on finish.
                if !entry.staged.is_empty() {
                    let staged = std::mem::take(&mut entry.staged);
                    entry.history.push(staged);
                }
                entry.finished = true;
            }
        }
        Ok(())
    }
}
