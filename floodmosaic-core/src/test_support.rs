//! In-memory collaborators used by unit and behaviour tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::{
    ClipBoundary, FloodObservation, MosaicProduct, MosaicSink, ObservationDescriptor,
    ObservationSource, OutputSpec, PipelineError,
};

/// Error raised by the in-memory doubles.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MemoryError {
    /// Nothing is registered under the location.
    #[error("no observation registered at {0}")]
    Missing(String),
    /// The sink was told to fail.
    #[error("sink rejected the write")]
    Rejected,
}

/// Serves observations registered by location.
#[derive(Debug, Default)]
pub struct MemorySource {
    observations: HashMap<String, FloodObservation>,
    boundaries: HashMap<String, ClipBoundary>,
}

impl MemorySource {
    /// Register an observation at `location`.
    #[must_use]
    pub fn with_observation(mut self, location: &str, observation: FloodObservation) -> Self {
        self.observations.insert(location.to_owned(), observation);
        self
    }

    /// Register a clip boundary at `location`.
    #[must_use]
    pub fn with_boundary(mut self, location: &str, boundary: ClipBoundary) -> Self {
        self.boundaries.insert(location.to_owned(), boundary);
        self
    }
}

impl ObservationSource for MemorySource {
    fn load(&self, descriptor: &ObservationDescriptor) -> Result<FloodObservation, PipelineError> {
        self.observations
            .get(&descriptor.location)
            .cloned()
            .ok_or_else(|| {
                PipelineError::load(
                    descriptor.location.clone(),
                    MemoryError::Missing(descriptor.location.clone()),
                )
            })
    }

    fn load_boundary(
        &self,
        descriptor: &ObservationDescriptor,
    ) -> Result<ClipBoundary, PipelineError> {
        self.boundaries
            .get(&descriptor.location)
            .cloned()
            .ok_or_else(|| {
                PipelineError::load(
                    descriptor.location.clone(),
                    MemoryError::Missing(descriptor.location.clone()),
                )
            })
    }
}

/// Records published products, or rejects every write.
#[derive(Debug, Default)]
pub struct MemorySink {
    published: Mutex<Vec<(String, MosaicProduct)>>,
    reject: bool,
}

impl MemorySink {
    /// Sink that fails every publish.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            published: Mutex::default(),
            reject: true,
        }
    }

    /// Products published so far, with their locations.
    #[must_use]
    pub fn published(&self) -> Vec<(String, MosaicProduct)> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MosaicSink for MemorySink {
    fn publish(&self, product: &MosaicProduct, output: &OutputSpec) -> Result<(), PipelineError> {
        if self.reject {
            return Err(PipelineError::publish(output.location.clone(), MemoryError::Rejected));
        }
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((output.location.clone(), product.clone()));
        Ok(())
    }
}
