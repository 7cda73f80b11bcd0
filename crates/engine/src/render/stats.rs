use std::collections::VecDeque;
use std::time::Duration;

/// Rasterizing frames kept for [`RasterTimings::summary`].
const RASTER_HISTORY_FRAMES: usize = 120;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub visible_chunks: usize,
    pub rasterized_chunks: usize,
    pub layers_composited: usize,
    pub entities_drawn: usize,
    pub fog_cells: usize,
}

/// Chunk rasterization cost over the recent frames that rebuilt any chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RasterSummary {
    pub frames: usize,
    pub chunks: usize,
    pub last_ms: f32,
    pub max_ms: f32,
    pub ms_per_frame: f32,
    pub ms_per_chunk: f32,
}

#[derive(Debug, Clone, Copy)]
struct RasterSample {
    elapsed: Duration,
    chunks: usize,
}

/// Time spent rebuilding chunk rasters, one sample per frame that rebuilt
/// at least one chunk. Frames served entirely from cached rasters are not
/// samples.
#[derive(Debug, Default)]
pub struct RasterTimings {
    history: VecDeque<RasterSample>,
    total_elapsed: Duration,
    total_chunks: usize,
}

impl RasterTimings {
    pub(crate) fn record(&mut self, elapsed: Duration, chunks: usize) {
        if chunks == 0 {
            return;
        }
        if self.history.len() == RASTER_HISTORY_FRAMES {
            if let Some(dropped) = self.history.pop_front() {
                self.total_elapsed = self.total_elapsed.saturating_sub(dropped.elapsed);
                self.total_chunks -= dropped.chunks;
            }
        }
        self.total_elapsed += elapsed;
        self.total_chunks += chunks;
        self.history.push_back(RasterSample { elapsed, chunks });
    }

    pub fn frames_recorded(&self) -> usize {
        self.history.len()
    }

    pub fn summary(&self) -> RasterSummary {
        let Some(last) = self.history.back() else {
            return RasterSummary::default();
        };
        let total_ms = as_ms(self.total_elapsed);
        let max_ms = self
            .history
            .iter()
            .map(|sample| sample.elapsed)
            .max()
            .map(as_ms)
            .unwrap_or_default();
        RasterSummary {
            frames: self.history.len(),
            chunks: self.total_chunks,
            last_ms: as_ms(last.elapsed),
            max_ms,
            ms_per_frame: total_ms / self.history.len() as f32,
            ms_per_chunk: total_ms / self.total_chunks as f32,
        }
    }
}

fn as_ms(duration: Duration) -> f32 {
    duration.as_secs_f32() * 1000.0
}
