//! Frame pipeline: source → grade → relay → render
//!
//! [`FramePipeline`] owns the state shared between the producer and the render
//! consumer: the active LUT, the latest-frame relay, the admission limiter and
//! the metrics. Producers call [`ingest`](FramePipeline::ingest); the render side
//! is built with [`consumer`](FramePipeline::consumer).
//!
//! ## Example
//!
//! ```rust,ignore
//! use framegrade::{FramePipeline, PipelineConfig, MemorySurface, Extent};
//!
//! let pipeline = FramePipeline::new(PipelineConfig::default(), None)?;
//! pipeline.ingest(frame)?;
//! let mut consumer = pipeline.consumer(Arc::new(MemorySurface::new(Extent::new(1920, 1080))));
//! consumer.tick();
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::admission::AdmissionLimiter;
use crate::capability::ColorSpace;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::frame::Frame;
use crate::grade::apply_lut;
use crate::lut::{LookupTable, LutStore};
use crate::metrics::{PipelineMetrics, Timer};
use crate::relay::FrameRelay;
use crate::render::RenderConsumer;
use crate::surface::Surface;

/// Edge of the identity cube used when no asset is configured
const IDENTITY_CUBE_SIZE: usize = 2;

pub struct FramePipeline {
    config: PipelineConfig,
    luts: LutStore,
    relay: Arc<FrameRelay>,
    limiter: AdmissionLimiter,
    metrics: Arc<PipelineMetrics>,
}

impl FramePipeline {
    /// Build a pipeline, loading the LUT selected for `color_space`.
    pub fn new(config: PipelineConfig, color_space: Option<ColorSpace>) -> Result<Arc<Self>> {
        config.validate()?;

        let table = match config.lut_for(color_space) {
            Some(path) => {
                let table = LookupTable::load(path)?;
                info!("   ✓ LUT {} from {}", table.summary(), path.display());
                table
            }
            None => {
                info!("   ✓ No LUT configured, grading with identity table");
                LookupTable::identity(IDENTITY_CUBE_SIZE)
            }
        };

        Self::with_table(config, table)
    }

    /// Build a pipeline around an already parsed table.
    pub fn with_table(config: PipelineConfig, table: LookupTable) -> Result<Arc<Self>> {
        config.validate()?;
        let limiter = AdmissionLimiter::new(config.admission_capacity)?;

        Ok(Arc::new(Self {
            config,
            luts: LutStore::new(table),
            relay: Arc::new(FrameRelay::new()),
            limiter,
            metrics: PipelineMetrics::new(),
        }))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn luts(&self) -> &LutStore {
        &self.luts
    }

    pub fn relay(&self) -> &Arc<FrameRelay> {
        &self.relay
    }

    pub fn limiter(&self) -> &AdmissionLimiter {
        &self.limiter
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Grade `frame` with the current table and make it the latest frame.
    ///
    /// Returns `true` if an undelivered frame was dropped.
    pub fn ingest(&self, frame: Frame) -> bool {
        let timer = Timer::new();
        let table = self.luts.current();
        let graded = apply_lut(&frame, &table);
        let sequence = graded.sequence();

        let overwrote = self.relay.publish(Arc::new(graded));
        self.metrics.record_ingest(overwrote, timer.elapsed_us());
        debug!("Ingested frame #{} ({}us)", sequence, timer.elapsed_us());
        overwrote
    }

    /// Replace the LUT from `.cube` text. The old table stays on failure.
    pub fn reload_lut_from_bytes(&self, bytes: &[u8]) -> Result<()> {
        let result = self.luts.reload_from_bytes(bytes);
        self.metrics.record_lut_reload(result.is_ok());
        result
    }

    /// Replace the LUT from a `.cube` file. The old table stays on failure.
    pub fn reload_lut_from_path(&self, path: &Path) -> Result<()> {
        let result = self.luts.reload_from_path(path);
        self.metrics.record_lut_reload(result.is_ok());
        result
    }

    /// Switch to the asset configured for `color_space`.
    pub fn select_color_space(&self, color_space: ColorSpace) -> Result<()> {
        match self.config.lut_for(Some(color_space)) {
            Some(path) => self.reload_lut_from_path(path),
            None => {
                self.luts.replace(LookupTable::identity(IDENTITY_CUBE_SIZE));
                self.metrics.record_lut_reload(true);
                Ok(())
            }
        }
    }

    /// Render consumer drawing onto `surface`.
    pub fn consumer<S: Surface>(&self, surface: Arc<S>) -> RenderConsumer<S> {
        RenderConsumer::new(
            Arc::clone(&self.relay),
            self.limiter.clone(),
            surface,
            Arc::clone(&self.metrics),
        )
    }
}
