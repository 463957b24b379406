//! The core engine boundary.
//!
//! The engine owns all storage and transport. This crate talks to it only
//! through integer handles: one per run, and short-lived ones for batches of
//! pending data. [`CoreEngine`] is that narrow surface; implementations are
//! [`crate::recording::RecordingEngine`] (in memory) and, with the `native`
//! feature, [`crate::native::NativeEngine`] (C ABI).

use crate::error::EngineFault;

/// Raw engine handle. Meaningless outside the engine.
pub type RawHandle = i32;

/// Data handle sentinel meaning "no data".
pub const NO_DATA: RawHandle = 0;

/// Identifies this binding generation to the engine.
pub const BINDING_TAG: &str = concat!("rust/", env!("CARGO_PKG_VERSION"));

pub type EngineResult<T> = std::result::Result<T, EngineFault>;

/// Operations consumed from the core engine.
///
/// `keys` and `values` slices passed to the batch operations always have the
/// same length and are never empty.
pub trait CoreEngine: Send + Sync {
    /// Process-wide one-time setup.
    fn setup(&self);

    /// Process-wide teardown. Only called after [`CoreEngine::setup`].
    fn teardown(&self);

    /// Create a run. Empty strings mean "unset". A non-positive return is
    /// an invalid handle.
    fn init_run(
        &self,
        config: RawHandle,
        name: &str,
        run_id: &str,
        project: &str,
        binding_tag: &str,
    ) -> EngineResult<RawHandle>;

    fn create_data(&self) -> EngineResult<RawHandle>;

    fn add_ints(&self, data: RawHandle, keys: &[&str], values: &[i64]) -> EngineResult<RawHandle>;

    fn add_doubles(&self, data: RawHandle, keys: &[&str], values: &[f64])
        -> EngineResult<RawHandle>;

    fn add_strings(&self, data: RawHandle, keys: &[&str], values: &[&str])
        -> EngineResult<RawHandle>;

    fn free_data(&self, data: RawHandle);

    /// Atomic discipline: log one complete record.
    fn log_data(&self, run: RawHandle, data: RawHandle) -> EngineResult<()>;

    /// Partial-commit discipline.
    fn log_ints(&self, run: RawHandle, commit: bool, keys: &[&str], values: &[i64])
        -> EngineResult<()>;

    fn log_doubles(&self, run: RawHandle, commit: bool, keys: &[&str], values: &[f64])
        -> EngineResult<()>;

    fn log_commit(&self, run: RawHandle) -> EngineResult<()>;

    fn finish(&self, run: RawHandle) -> EngineResult<()>;
}
