//! Scoped engine data handles.
//!
//! A [`DataHandle`] is built from a [`KeyValueMap`] right before the one engine
//! call that consumes it and is freed when it goes out of scope, on every exit
//! path. The raw handle never leaves this scope.

use tracing::debug;

use crate::codec;
use crate::engine::{CoreEngine, RawHandle, NO_DATA};
use crate::error::{EngineFault, Result};
use crate::models::KeyValueMap;

pub(crate) struct DataHandle<'e> {
    engine: &'e dyn CoreEngine,
    raw: RawHandle,
}

impl<'e> DataHandle<'e> {
    /// The "no data" handle. Issues no engine calls, now or on drop.
    pub(crate) fn none(engine: &'e dyn CoreEngine) -> Self {
        Self { engine, raw: NO_DATA }
    }

    /// Create a handle holding every entry of `map`, or the "no data" handle
    /// if there is no map.
    pub(crate) fn create(engine: &'e dyn CoreEngine, map: Option<&KeyValueMap>) -> Result<Self> {
        let Some(map) = map else {
            return Ok(Self::none(engine));
        };

        let raw = engine.create_data()?;
        if raw <= NO_DATA {
            return Err(EngineFault::new("create_data", format!("invalid data handle {raw}")).into());
        }
        // From here on the guard owns the handle; any early return frees it.
        let mut handle = Self { engine, raw };

        let batches = codec::partition(map);
        if let Some(b) = batches.ints() {
            let next = engine.add_ints(handle.raw, &b.keys, &b.values)?;
            handle.advance("add_ints", next)?;
        }
        if let Some(b) = batches.doubles() {
            let next = engine.add_doubles(handle.raw, &b.keys, &b.values)?;
            handle.advance("add_doubles", next)?;
        }
        if let Some(b) = batches.texts() {
            let next = engine.add_strings(handle.raw, &b.keys, &b.values)?;
            handle.advance("add_strings", next)?;
        }

        debug!(
            data = handle.raw,
            ints = batches.ints.len(),
            doubles = batches.doubles.len(),
            texts = batches.texts.len(),
            "data handle built"
        );
        Ok(handle)
    }

    /// Take the handle an add call returned. An invalid one is rejected and
    /// the handle held so far stays owned, so it is still freed on drop.
    fn advance(&mut self, op: &'static str, next: RawHandle) -> Result<()> {
        if next <= NO_DATA {
            return Err(EngineFault::new(op, format!("invalid data handle {next}")).into());
        }
        self.raw = next;
        Ok(())
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }
}

impl std::fmt::Debug for DataHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DataHandle").field(&self.raw).finish()
    }
}

impl Drop for DataHandle<'_> {
    fn drop(&mut self) {
        if self.raw != NO_DATA {
            self.engine.free_data(self.raw);
        }
    }
}
