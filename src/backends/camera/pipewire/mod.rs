// SPDX-License-Identifier: GPL-3.0-only

//! PipeWire camera source
//!
//! Captures through `pipewiresrc` and converts whatever the camera produces
//! to I420 inside GStreamer, so the rest of the pipeline only sees one
//! layout.

mod enumeration;
mod pipeline;

pub use enumeration::enumerate_cameras;
pub use pipeline::{CapturePipeline, build_pipeline_string};

use super::FrameSource;
use super::buffer_pool::FramePool;
use super::delivery::FrameDelivery;
use super::types::*;
use crate::errors::{PipelineError, PipelineResult};
use std::sync::Arc;
use tracing::info;

/// Frame source backed by a PipeWire camera
pub struct PipeWireSource {
    device: CameraDevice,
    counters: Arc<SourceCounters>,
    pipeline: Option<CapturePipeline>,
    delivery: Option<FrameDelivery>,
}

impl PipeWireSource {
    pub fn new(device: CameraDevice) -> Self {
        Self {
            device,
            counters: Arc::new(SourceCounters::default()),
            pipeline: None,
            delivery: None,
        }
    }

    /// Source for the camera at `index` in enumeration order
    pub fn from_index(index: usize) -> PipelineResult<Self> {
        let cameras = enumerate_cameras()?;
        let count = cameras.len();
        cameras
            .into_iter()
            .nth(index)
            .map(Self::new)
            .ok_or_else(|| {
                PipelineError::DeviceUnavailable(format!(
                    "No camera at index {} ({} found)",
                    index, count
                ))
            })
    }

    pub fn device(&self) -> &CameraDevice {
        &self.device
    }
}

impl FrameSource for PipeWireSource {
    fn name(&self) -> &str {
        &self.device.name
    }

    fn start(&mut self, config: &SourceConfig, callback: FrameCallback) -> PipelineResult<()> {
        self.stop();

        let mut delivery = FrameDelivery::start("capture-worker", Arc::clone(&self.counters), callback)
            .map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))?;
        let pool = FramePool::new(config.frame_slots);

        match CapturePipeline::start(&self.device, config, pool, delivery.handle()) {
            Ok(pipeline) => {
                info!(device = %self.device.name, "PipeWire source started");
                self.pipeline = Some(pipeline);
                self.delivery = Some(delivery);
                Ok(())
            }
            Err(e) => {
                delivery.stop();
                Err(e)
            }
        }
    }

    fn stop(&mut self) {
        // Producer first so nothing is offered to a stopped worker
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.stop();
        }
        if let Some(mut delivery) = self.delivery.take() {
            delivery.stop();
        }
    }

    fn is_running(&self) -> bool {
        self.pipeline.is_some() && self.delivery.as_ref().is_some_and(|d| d.is_running())
    }

    fn stats(&self) -> SourceStats {
        self.counters.snapshot()
    }
}

impl Drop for PipeWireSource {
    fn drop(&mut self) {
        self.stop();
    }
}
