//! Nodata-aware maximum merge, window by window.
//!
//! The merge grid is processed in horizontal bands of windows. Windows within
//! a band run concurrently on a thread pool owned by the reduction, so peak
//! working memory is one band of window buffers regardless of raster size.

use log::{debug, info};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::align::WindowSource;
use crate::{Clipper, FimType, GridGeometry, MosaicError, TilePlan, Window, is_valid};

/// Merge one incoming value into an accumulator cell.
///
/// Invalid values never replace valid ones; two valid values keep the larger.
#[must_use]
pub fn merge_cell(current: f32, incoming: f32, nodata: f32) -> f32 {
    match (is_valid(current, nodata), is_valid(incoming, nodata)) {
        (_, false) => current,
        (false, true) => incoming,
        (true, true) => current.max(incoming),
    }
}

/// Merge `incoming` into `accumulator` cell by cell.
pub fn merge_into(accumulator: &mut [f32], incoming: &[f32], nodata: f32) {
    for (current, value) in accumulator.iter_mut().zip(incoming) {
        *current = merge_cell(*current, *value, nodata);
    }
}

/// Pixelwise maximum over the valid values of several sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NanAwareReducer {
    fim_type: FimType,
    plan: TilePlan,
}

impl NanAwareReducer {
    /// Reducer producing `fim_type` values under `plan`.
    #[must_use]
    pub const fn new(fim_type: FimType, plan: TilePlan) -> Self {
        Self { fim_type, plan }
    }

    /// Tile plan in use.
    #[must_use]
    pub const fn plan(&self) -> TilePlan {
        self.plan
    }

    /// Reduce every source over `grid`, masking cells outside the clip.
    ///
    /// Windows of one band are read and merged in parallel. The first error
    /// stops the band and no buffer is returned.
    ///
    /// # Errors
    /// - [`MosaicError::WorkerPool`] when the thread pool cannot start.
    /// - Any error raised by a source while reading a window.
    pub fn reduce(
        &self,
        grid: &GridGeometry,
        sources: &[&dyn WindowSource],
        clipper: &Clipper<'_>,
    ) -> Result<Vec<f32>, MosaicError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.plan.workers)
            .build()
            .map_err(|err| MosaicError::WorkerPool {
                reason: err.to_string(),
            })?;
        let nodata = self.fim_type.nodata();
        let edge = self.plan.window_size;
        let mut output = vec![nodata; grid.pixel_count()];
        let bands = grid.band_count(edge);
        info!(
            "reducing {} sources over {} bands of {edge}x{edge} windows with {} workers",
            sources.len(),
            bands,
            self.plan.workers
        );

        for band in 0..bands {
            let windows = grid.band_windows(edge, band);
            let merged = pool.install(|| {
                windows
                    .par_iter()
                    .map(|window| {
                        self.reduce_window(grid, sources, clipper, *window)
                            .map(|values| (*window, values))
                    })
                    .collect::<Result<Vec<_>, MosaicError>>()
            })?;
            for (window, values) in merged {
                write_window(grid, &mut output, window, &values);
            }
            debug!("band {}/{bands} reduced", band + 1);
        }
        Ok(output)
    }

    fn reduce_window(
        &self,
        grid: &GridGeometry,
        sources: &[&dyn WindowSource],
        clipper: &Clipper<'_>,
        window: Window,
    ) -> Result<Vec<f32>, MosaicError> {
        let nodata = self.fim_type.nodata();
        let mut accumulator = vec![nodata; window.len()];
        for source in sources {
            let values = source.read_window(grid, window)?;
            merge_into(&mut accumulator, &values, nodata);
        }
        clipper.mask_window(grid, window, &mut accumulator, nodata);
        Ok(accumulator)
    }
}

fn write_window(grid: &GridGeometry, output: &mut [f32], window: Window, values: &[f32]) {
    for (offset, row_values) in values.chunks(window.width.max(1)).enumerate() {
        let start = grid.index(window.col_off, window.row_off + offset);
        if let Some(target) = output.get_mut(start..start + row_values.len()) {
            target.copy_from_slice(row_values);
        }
    }
}
