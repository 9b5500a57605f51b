// SPDX-License-Identifier: GPL-3.0-only

//! PipeWire GStreamer pipeline for camera capture

use super::super::buffer_pool::FramePool;
use super::super::delivery::DeliveryHandle;
use super::super::types::*;
use crate::constants::{pipeline, timing};
use crate::errors::{PipelineError, PipelineResult};
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Build the `pipewiresrc` target property for a device path
///
/// Empty means the default camera.
fn target_property(device_path: &str) -> String {
    if device_path.is_empty() {
        String::new()
    } else if let Some(serial) = device_path.strip_prefix("pipewire-serial-") {
        format!("target-object={} ", serial)
    } else if device_path.starts_with("/dev/video") {
        format!("path=v4l2:{} ", device_path)
    } else {
        format!("path={} ", device_path)
    }
}

/// Full launch string: any camera format, converted and scaled to I420
pub fn build_pipeline_string(device_path: &str, config: &SourceConfig) -> String {
    format!(
        "pipewiresrc {}do-timestamp=true ! videoconvert ! videoscale ! \
         video/x-raw,format={},width=(int){},height=(int){} ! \
         appsink name=sink",
        target_property(device_path),
        config.output_format.to_gst_format_string(),
        config.width,
        config.height,
    )
}

/// Copy one plane row by row, dropping the stride padding
fn copy_plane(src: &[u8], offset: usize, stride: usize, row_len: usize, rows: usize, dst: &mut [u8]) -> bool {
    for row in 0..rows {
        let start = offset + row * stride;
        let Some(line) = src.get(start..start + row_len) else {
            return false;
        };
        dst[row * row_len..(row + 1) * row_len].copy_from_slice(line);
    }
    true
}

/// Running PipeWire capture pipeline
pub struct CapturePipeline {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
}

impl CapturePipeline {
    /// Launch the pipeline and wait for it to reach PLAYING
    ///
    /// Frames are copied into `pool` and offered to `delivery`. Anything that
    /// keeps the pipeline from playing is reported as `DeviceUnavailable`.
    pub fn start(
        device: &CameraDevice,
        config: &SourceConfig,
        pool: FramePool,
        delivery: DeliveryHandle,
    ) -> PipelineResult<Self> {
        gstreamer::init().map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))?;
        gstreamer::ElementFactory::find("pipewiresrc").ok_or_else(|| {
            PipelineError::DeviceUnavailable("pipewiresrc not available".to_string())
        })?;

        let launch = build_pipeline_string(&device.path, config);
        info!(device = %device.name, pipeline = %launch, "Creating PipeWire pipeline");

        let pipeline = gstreamer::parse::launch(&launch)
            .map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| PipelineError::DeviceUnavailable("Not a pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| PipelineError::DeviceUnavailable("Failed to get appsink".to_string()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| PipelineError::DeviceUnavailable("Failed to cast appsink".to_string()))?;

        appsink.set_property("emit-signals", true);
        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", pipeline::MAX_BUFFERS);
        appsink.set_property("drop", true);
        appsink.set_property("enable-last-sample", false);

        let rotation = device.rotation;
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let frame_start = Instant::now();
                    let sequence = delivery.next_sequence();

                    let sample = appsink.pull_sample().map_err(|e| {
                        if sequence % timing::FRAME_LOG_INTERVAL == 0 {
                            error!(frame = sequence, error = ?e, "Failed to pull sample");
                        }
                        gstreamer::FlowError::Eos
                    })?;
                    let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                    if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
                        delivery.record_dropped();
                        return Ok(gstreamer::FlowSuccess::Ok);
                    }
                    let caps = sample.caps().ok_or(gstreamer::FlowError::Error)?;
                    let info = VideoInfo::from_caps(caps).map_err(|_| gstreamer::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gstreamer::FlowError::Error)?;

                    let (width, height) = (info.width(), info.height());
                    let chroma_w = width.div_ceil(2) as usize;
                    let chroma_h = height.div_ceil(2) as usize;
                    let strides = info.stride();
                    let offsets = info.offset();
                    let src = map.as_slice();

                    // Copies run before the frame exists; a failed copy drops the capture
                    let mut copied = true;
                    let frame = CapturedFrame::filled_with(
                        &pool,
                        width,
                        height,
                        rotation,
                        sequence,
                        |y, u, v| {
                            copied = copy_plane(src, offsets[0], strides[0] as usize, width as usize, height as usize, y)
                                && copy_plane(src, offsets[1], strides[1] as usize, chroma_w, chroma_h, u)
                                && copy_plane(src, offsets[2], strides[2] as usize, chroma_w, chroma_h, v);
                        },
                    );

                    match frame {
                        Some(frame) if copied => {
                            if sequence % timing::FRAME_LOG_INTERVAL == 0 {
                                debug!(
                                    frame = sequence,
                                    width,
                                    height,
                                    copy_us = frame_start.elapsed().as_micros(),
                                    "Frame captured"
                                );
                            }
                            delivery.offer(frame);
                        }
                        Some(_) => {
                            warn!(frame = sequence, "Plane layout outside mapped buffer, dropping");
                            delivery.record_dropped();
                        }
                        None => {
                            debug!(frame = sequence, "No free frame slot, dropping capture");
                            delivery.record_dropped();
                        }
                    }

                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        let running = Self { pipeline, appsink };

        running
            .pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| PipelineError::DeviceUnavailable(format!("Failed to start pipeline: {}", e)))?;

        let (result, state, pending) = running.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::START_TIMEOUT_SECS,
        ));
        debug!(result = ?result, state = ?state, pending = ?pending, "Pipeline state");
        if state != gstreamer::State::Playing {
            // Dropping `running` sets the pipeline back to NULL
            return Err(PipelineError::DeviceUnavailable(format!(
                "Pipeline did not reach PLAYING (state {:?})",
                state
            )));
        }

        info!("PipeWire camera capture started");
        Ok(running)
    }

    /// Stop the pipeline and release the camera
    pub fn stop(self) {
        info!("Stopping PipeWire pipeline");
        // Drop does the work
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to set pipeline to NULL");
            return;
        }
        let (result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::STOP_TIMEOUT_SECS,
        ));
        debug!(result = ?result, state = ?state, "PipeWire pipeline stopped");
    }
}
