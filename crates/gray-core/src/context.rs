//! Explicit run context.
//!
//! Everything a run needs is passed in one value instead of being looked up
//! through global singletons: the geometry, the material table, the output
//! sink, the reducer and the bound scoring volume.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gray_geometry::{GeometryError, GeometryModel, VolumeId};
use gray_materials::MaterialDatabase;

use crate::accumulable::Reducer;
use crate::sink::{OutputSink, SharedSink};

/// Shared, read-mostly state of a run. Cheap to clone.
#[derive(Clone)]
pub struct RunContext {
    geometry: Arc<GeometryModel>,
    materials: Arc<dyn MaterialDatabase>,
    sink: SharedSink,
    reducer: Arc<Reducer>,
    scoring_volume: Option<VolumeId>,
}

impl RunContext {
    pub fn new(
        geometry: Arc<GeometryModel>,
        materials: Arc<dyn MaterialDatabase>,
        sink: SharedSink,
    ) -> Self {
        Self {
            geometry,
            materials,
            sink,
            reducer: Arc::new(Reducer::new()),
            scoring_volume: None,
        }
    }

    /// Resolve the scoring volume by name and remember it.
    pub fn bind_scoring_volume(&mut self, name: &str) -> Result<VolumeId, GeometryError> {
        let id = self.geometry.find_volume(name)?;
        log::info!("Scoring volume bound to '{}'", name);
        self.scoring_volume = Some(id);
        Ok(id)
    }

    pub fn with_scoring_volume(mut self, name: &str) -> Result<Self, GeometryError> {
        self.bind_scoring_volume(name)?;
        Ok(self)
    }

    pub fn scoring_volume(&self) -> Option<VolumeId> {
        self.scoring_volume
    }

    pub fn geometry(&self) -> &GeometryModel {
        &self.geometry
    }

    pub fn materials(&self) -> &dyn MaterialDatabase {
        self.materials.as_ref()
    }

    pub fn reducer(&self) -> &Arc<Reducer> {
        &self.reducer
    }

    pub fn sink(&self) -> &SharedSink {
        &self.sink
    }

    /// Lock the shared sink. A worker that panicked mid-record leaves at
    /// worst one incomplete row, so a poisoned lock is still usable.
    pub fn lock_sink(&self) -> MutexGuard<'_, dyn OutputSink + 'static> {
        lock_shared(&self.sink)
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("volumes", &self.geometry.len())
            .field("materials", &self.materials.source_name())
            .field("scoring_volume", &self.scoring_volume)
            .finish_non_exhaustive()
    }
}

pub(crate) fn lock_shared(sink: &Mutex<dyn OutputSink>) -> MutexGuard<'_, dyn OutputSink + 'static> {
    sink.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use gray_geometry::presets::{self, DETECTOR};
    use gray_materials::NistDatabase;

    fn context() -> RunContext {
        RunContext::new(
            Arc::new(presets::germanium_detector().unwrap()),
            Arc::new(NistDatabase::new()),
            Arc::new(Mutex::new(MemorySink::new())),
        )
    }

    #[test]
    fn test_bind_scoring_volume() {
        let mut ctx = context();
        assert!(ctx.scoring_volume().is_none());
        let id = ctx.bind_scoring_volume(DETECTOR).unwrap();
        assert_eq!(ctx.scoring_volume(), Some(id));
        assert_eq!(ctx.geometry().volume(id).material(), "G4_Ge");
    }

    #[test]
    fn test_bind_unknown_volume() {
        let mut ctx = context();
        assert!(matches!(
            ctx.bind_scoring_volume("Crystal"),
            Err(GeometryError::NotFound(_))
        ));
        assert!(ctx.scoring_volume().is_none());
    }

    #[test]
    fn test_clones_share_reducer() {
        let ctx = context();
        let other = ctx.clone();
        ctx.reducer().hand_off(0, [1.0].into_iter().collect());
        assert_eq!(other.reducer().contributors(), 1);
    }
}
