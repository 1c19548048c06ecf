//! Explicit per-invocation configuration and the tile plan derived from it.
//!
//! Nothing here is global: two mosaics running in one process each carry
//! their own [`MosaicConfig`] and therefore their own memory budget.
//!
//! The budget sizes the reduction windows and the worker count. Loaded
//! inputs and the merged output stay resident, so unless a pixel ceiling is
//! set explicitly the merge grid may hold no more cells than the budget can
//! store as `f32`.

use std::num::NonZeroUsize;

use log::debug;

use crate::{Crs, FimType, MosaicError, Resolution};

/// Window edge used by the upstream inundator when tiling catchments.
pub const DEFAULT_WINDOW_SIZE: usize = 1024;
/// Default geocomputing cache budget in megabytes.
pub const DEFAULT_CACHE_MB: u32 = 512;
/// Smallest accepted cache budget in megabytes.
pub const MIN_CACHE_MB: u32 = 64;
/// Largest accepted cache budget in megabytes.
pub const MAX_CACHE_MB: u32 = 4096;

/// Bytes held per cell while a window is reduced.
const BYTES_PER_CELL: u64 = 4;

/// Memory budget for window processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheBudget {
    megabytes: u32,
}

impl CacheBudget {
    /// Validate a budget in megabytes.
    ///
    /// # Errors
    /// Returns [`MosaicError::InvalidConfig`] outside
    /// `MIN_CACHE_MB..=MAX_CACHE_MB`.
    pub fn megabytes(megabytes: u32) -> Result<Self, MosaicError> {
        if (MIN_CACHE_MB..=MAX_CACHE_MB).contains(&megabytes) {
            Ok(Self { megabytes })
        } else {
            Err(MosaicError::config(format!(
                "cache size {megabytes} MB is outside {MIN_CACHE_MB}..={MAX_CACHE_MB} MB"
            )))
        }
    }

    /// Budget in bytes.
    #[must_use]
    pub fn bytes(self) -> u64 {
        u64::from(self.megabytes) * 1024 * 1024
    }

    /// Budget in megabytes.
    #[must_use]
    pub const fn as_megabytes(self) -> u32 {
        self.megabytes
    }

    /// Number of `f32` cells the budget can hold at once.
    #[must_use]
    pub fn resident_cells(self) -> u64 {
        self.bytes().checked_div(BYTES_PER_CELL).unwrap_or(0)
    }
}

impl Default for CacheBudget {
    fn default() -> Self {
        Self {
            megabytes: DEFAULT_CACHE_MB,
        }
    }
}

/// Settings for one mosaic invocation.
///
/// # Examples
///
/// ```
/// use floodmosaic_core::{FimType, MosaicConfig, Resolution};
///
/// let config = MosaicConfig::new(FimType::Extent)
///     .with_target_resolution(Resolution::square(3.0).expect("positive"))
///     .with_window_size(256);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicConfig {
    /// Requested output value type.
    pub fim_type: FimType,
    /// Projection every input must already use.
    pub canonical_crs: Crs,
    /// Output resolution; falls back to the shared input resolution.
    pub target_resolution: Option<Resolution>,
    /// Memory budget bounding window size and worker count.
    pub cache_budget: CacheBudget,
    /// Preferred window edge in cells.
    pub window_size: usize,
    /// Explicit upper bound on merge grid cells.
    pub max_pixels: Option<u64>,
    /// Distance under which two points are treated as one location.
    pub point_tolerance: f64,
    /// Buffer radius for point sampling; defaults to one pixel diagonal.
    pub sample_radius: Option<f64>,
}

impl MosaicConfig {
    /// Defaults for the given value type.
    #[must_use]
    pub fn new(fim_type: FimType) -> Self {
        Self {
            fim_type,
            canonical_crs: Crs::default(),
            target_resolution: None,
            cache_budget: CacheBudget::default(),
            window_size: DEFAULT_WINDOW_SIZE,
            max_pixels: None,
            point_tolerance: 0.0,
            sample_radius: None,
        }
    }

    /// Set the canonical projection.
    #[must_use]
    pub const fn with_crs(mut self, crs: Crs) -> Self {
        self.canonical_crs = crs;
        self
    }

    /// Set the output resolution.
    #[must_use]
    pub const fn with_target_resolution(mut self, resolution: Resolution) -> Self {
        self.target_resolution = Some(resolution);
        self
    }

    /// Set the memory budget.
    #[must_use]
    pub const fn with_cache_budget(mut self, budget: CacheBudget) -> Self {
        self.cache_budget = budget;
        self
    }

    /// Set the preferred window edge.
    #[must_use]
    pub const fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Set the merge grid pixel ceiling.
    #[must_use]
    pub const fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = Some(max_pixels);
        self
    }

    /// Set the point deduplication tolerance.
    #[must_use]
    pub const fn with_point_tolerance(mut self, tolerance: f64) -> Self {
        self.point_tolerance = tolerance;
        self
    }

    /// Set the point sampling radius.
    #[must_use]
    pub const fn with_sample_radius(mut self, radius: f64) -> Self {
        self.sample_radius = Some(radius);
        self
    }

    /// Largest merge grid accepted: the explicit ceiling, or the cells that
    /// fit the cache budget.
    #[must_use]
    pub fn pixel_ceiling(&self) -> u64 {
        self.max_pixels.unwrap_or_else(|| self.cache_budget.resident_cells())
    }

    /// Check value ranges that the type system cannot.
    ///
    /// # Errors
    /// Returns [`MosaicError::InvalidConfig`] for a zero window, a zero pixel
    /// ceiling, a negative tolerance or a non-positive sample radius.
    pub fn validate(&self) -> Result<(), MosaicError> {
        if self.window_size == 0 {
            return Err(MosaicError::config("window size must be at least one cell"));
        }
        if self.max_pixels == Some(0) {
            return Err(MosaicError::config("maximum pixel count must be positive"));
        }
        if !(self.point_tolerance.is_finite() && self.point_tolerance >= 0.0) {
            return Err(MosaicError::config(format!(
                "point tolerance must be a non-negative number, got {}",
                self.point_tolerance
            )));
        }
        if let Some(radius) = self.sample_radius
            && !(radius.is_finite() && radius > 0.0)
        {
            return Err(MosaicError::config(format!(
                "sample radius must be positive, got {radius}"
            )));
        }
        Ok(())
    }
}

/// Window edge and worker count fitted to a memory budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePlan {
    /// Window edge in cells.
    pub window_size: usize,
    /// Number of windows processed concurrently.
    pub workers: usize,
}

impl TilePlan {
    /// Fit windows for `sources` inputs into `budget`.
    ///
    /// Each in-flight window holds one buffer per source plus the
    /// accumulator. The edge shrinks until one window fits; the worker count
    /// is however many such windows fit, capped by available parallelism.
    #[must_use]
    pub fn from_budget(budget: CacheBudget, window_size: usize, sources: usize) -> Self {
        let cores = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self::fit(budget.bytes(), window_size, sources, cores)
    }

    pub(crate) fn fit(budget_bytes: u64, window_size: usize, sources: usize, cores: usize) -> Self {
        let buffers = u64::try_from(sources).unwrap_or(u64::MAX).saturating_add(1);
        let bytes_per_cell = BYTES_PER_CELL.saturating_mul(buffers);
        let max_cells = budget_bytes.checked_div(bytes_per_cell).unwrap_or(0);
        let max_edge = usize::try_from(max_cells.isqrt()).unwrap_or(usize::MAX);
        let edge = window_size.min(max_edge).max(1);

        let edge_u64 = u64::try_from(edge).unwrap_or(u64::MAX);
        let window_bytes = edge_u64
            .saturating_mul(edge_u64)
            .saturating_mul(bytes_per_cell);
        let fitting = budget_bytes.checked_div(window_bytes).unwrap_or(1);
        let workers = usize::try_from(fitting).unwrap_or(usize::MAX).clamp(1, cores.max(1));

        debug!("tile plan: {edge}x{edge} windows, {workers} workers for {sources} sources");
        Self {
            window_size: edge,
            workers,
        }
    }
}
