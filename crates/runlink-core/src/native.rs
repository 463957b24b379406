//! C ABI adapter for the engine shipped as `libwandb_core`.
//!
//! Keys and text are copied into `CString`s for the duration of each call;
//! integers are narrowed to `c_int`. Nothing here outlives the call.

use std::ffi::{c_char, c_double, c_int, CString};

use crate::engine::{CoreEngine, EngineResult, RawHandle};
use crate::error::EngineFault;

#[link(name = "wandb_core")]
extern "C" {
    fn wandbcoreSetup();
    fn wandbcoreTeardown();
    fn wandbcoreInit(
        config: c_int,
        name: *const c_char,
        run_id: *const c_char,
        project: *const c_char,
        library: *const c_char,
    ) -> c_int;
    fn wandbcoreDataCreate() -> c_int;
    fn wandbcoreDataAddInts(
        data: c_int,
        count: c_int,
        keys: *const *const c_char,
        values: *const c_int,
    ) -> c_int;
    fn wandbcoreDataAddDoubles(
        data: c_int,
        count: c_int,
        keys: *const *const c_char,
        values: *const c_double,
    ) -> c_int;
    fn wandbcoreDataAddStrings(
        data: c_int,
        count: c_int,
        keys: *const *const c_char,
        values: *const *const c_char,
    ) -> c_int;
    fn wandbcoreDataFree(data: c_int);
    fn wandbcoreLogData(run: c_int, data: c_int);
    fn wandbcoreLogInts(
        run: c_int,
        commit: c_char,
        count: c_int,
        keys: *const *const c_char,
        values: *const c_int,
    );
    fn wandbcoreLogDoubles(
        run: c_int,
        commit: c_char,
        count: c_int,
        keys: *const *const c_char,
        values: *const c_double,
    );
    fn wandbcoreLogCommit(run: c_int);
    fn wandbcoreFinish(run: c_int);
}

/// Owned C strings plus the pointer array the engine reads.
struct CStrings {
    _owned: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl CStrings {
    fn new(op: &'static str, items: &[&str]) -> EngineResult<Self> {
        let owned = items
            .iter()
            .map(|s| CString::new(*s).map_err(|_| EngineFault::new(op, format!("{s:?} contains NUL"))))
            .collect::<EngineResult<Vec<_>>>()?;
        let ptrs = owned.iter().map(|s| s.as_ptr()).collect();
        Ok(Self { _owned: owned, ptrs })
    }

    fn as_ptr(&self) -> *const *const c_char {
        self.ptrs.as_ptr()
    }
}

fn c_str(op: &'static str, s: &str) -> EngineResult<CString> {
    CString::new(s).map_err(|_| EngineFault::new(op, format!("{s:?} contains NUL")))
}

fn c_count(op: &'static str, n: usize) -> EngineResult<c_int> {
    c_int::try_from(n).map_err(|_| EngineFault::new(op, format!("batch of {n} entries too large")))
}

fn c_ints(op: &'static str, values: &[i64]) -> EngineResult<Vec<c_int>> {
    values
        .iter()
        .map(|v| c_int::try_from(*v).map_err(|_| EngineFault::new(op, format!("integer {v} out of range"))))
        .collect()
}

/// Engine reached through the `wandbcore*` C symbols.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl CoreEngine for NativeEngine {
    fn setup(&self) {
        // SAFETY: takes no arguments; the session calls it at most once.
        unsafe { wandbcoreSetup() }
    }

    fn teardown(&self) {
        // SAFETY: takes no arguments; only called after `setup`.
        unsafe { wandbcoreTeardown() }
    }

    fn init_run(
        &self,
        config: RawHandle,
        name: &str,
        run_id: &str,
        project: &str,
        binding_tag: &str,
    ) -> EngineResult<RawHandle> {
        let name = c_str("init_run", name)?;
        let run_id = c_str("init_run", run_id)?;
        let project = c_str("init_run", project)?;
        let tag = c_str("init_run", binding_tag)?;
        // SAFETY: all pointers are valid NUL-terminated strings for the call.
        Ok(unsafe {
            wandbcoreInit(
                config,
                name.as_ptr(),
                run_id.as_ptr(),
                project.as_ptr(),
                tag.as_ptr(),
            )
        })
    }

    fn create_data(&self) -> EngineResult<RawHandle> {
        // SAFETY: takes no arguments.
        Ok(unsafe { wandbcoreDataCreate() })
    }

    fn add_ints(&self, data: RawHandle, keys: &[&str], values: &[i64]) -> EngineResult<RawHandle> {
        let count = c_count("add_ints", keys.len())?;
        let keys = CStrings::new("add_ints", keys)?;
        let values = c_ints("add_ints", values)?;
        // SAFETY: `keys` and `values` both hold `count` elements.
        Ok(unsafe { wandbcoreDataAddInts(data, count, keys.as_ptr(), values.as_ptr()) })
    }

    fn add_doubles(
        &self,
        data: RawHandle,
        keys: &[&str],
        values: &[f64],
    ) -> EngineResult<RawHandle> {
        let count = c_count("add_doubles", keys.len())?;
        let keys = CStrings::new("add_doubles", keys)?;
        // SAFETY: `keys` and `values` both hold `count` elements.
        Ok(unsafe { wandbcoreDataAddDoubles(data, count, keys.as_ptr(), values.as_ptr()) })
    }

    fn add_strings(
        &self,
        data: RawHandle,
        keys: &[&str],
        values: &[&str],
    ) -> EngineResult<RawHandle> {
        let count = c_count("add_strings", keys.len())?;
        let keys = CStrings::new("add_strings", keys)?;
        let values = CStrings::new("add_strings", values)?;
        // SAFETY: `keys` and `values` both hold `count` elements.
        Ok(unsafe { wandbcoreDataAddStrings(data, count, keys.as_ptr(), values.as_ptr()) })
    }

    fn free_data(&self, data: RawHandle) {
        // SAFETY: plain integer argument; the engine owns the handle table.
        unsafe { wandbcoreDataFree(data) }
    }

    fn log_data(&self, run: RawHandle, data: RawHandle) -> EngineResult<()> {
        // SAFETY: plain integer arguments.
        unsafe { wandbcoreLogData(run, data) };
        Ok(())
    }

    fn log_ints(
        &self,
        run: RawHandle,
        commit: bool,
        keys: &[&str],
        values: &[i64],
    ) -> EngineResult<()> {
        let count = c_count("log_ints", keys.len())?;
        let keys = CStrings::new("log_ints", keys)?;
        let values = c_ints("log_ints", values)?;
        // SAFETY: `keys` and `values` both hold `count` elements.
        unsafe { wandbcoreLogInts(run, commit as c_char, count, keys.as_ptr(), values.as_ptr()) };
        Ok(())
    }

    fn log_doubles(
        &self,
        run: RawHandle,
        commit: bool,
        keys: &[&str],
        values: &[f64],
    ) -> EngineResult<()> {
        let count = c_count("log_doubles", keys.len())?;
        let keys = CStrings::new("log_doubles", keys)?;
        // SAFETY: `keys` and `values` both hold `count` elements.
        unsafe { wandbcoreLogDoubles(run, commit as c_char, count, keys.as_ptr(), values.as_ptr()) };
        Ok(())
    }

    fn log_commit(&self, run: RawHandle) -> EngineResult<()> {
        // SAFETY: plain integer argument.
        unsafe { wandbcoreLogCommit(run) };
        Ok(())
    }

    fn finish(&self, run: RawHandle) -> EngineResult<()> {
        // SAFETY: plain integer argument.
        unsafe { wandbcoreFinish(run) };
        Ok(())
    }
}
