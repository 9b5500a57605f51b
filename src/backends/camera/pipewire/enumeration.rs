// SPDX-License-Identifier: GPL-3.0-only

//! PipeWire camera enumeration through the GStreamer device monitor

use super::super::types::{CameraDevice, SensorRotation};
use crate::errors::{PipelineError, PipelineResult};
use gstreamer::prelude::*;
use tracing::{debug, info};

/// Read a device property as text whatever its GLib type
fn property_string(props: &gstreamer::StructureRef, name: &str) -> Option<String> {
    let value = props.value(name).ok()?;
    value
        .get::<String>()
        .ok()
        .or_else(|| value.serialize().ok().map(|s| s.to_string()))
}

/// Enumerate cameras exposed by PipeWire
///
/// Cameras are listed in the order the monitor reports them. The device
/// path is `pipewire-serial-<serial>` when PipeWire provides a serial,
/// otherwise the node's `object.path`.
pub fn enumerate_cameras() -> PipelineResult<Vec<CameraDevice>> {
    gstreamer::init().map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))?;

    let monitor = gstreamer::DeviceMonitor::new();
    monitor.add_filter(Some("Video/Source"), None);
    monitor
        .start()
        .map_err(|e| PipelineError::DeviceUnavailable(format!("Device monitor failed: {}", e)))?;

    let cameras: Vec<CameraDevice> = monitor
        .devices()
        .iter()
        .filter_map(|device| {
            let props = device.properties()?;
            // Only PipeWire nodes; other providers (v4l2) duplicate the same cameras
            let api = property_string(&props, "device.api");
            if api.as_deref().is_some_and(|a| a != "pipewire") {
                return None;
            }

            let path = property_string(&props, "object.serial")
                .map(|serial| format!("pipewire-serial-{}", serial))
                .or_else(|| property_string(&props, "object.path"))
                .unwrap_or_default();
            let rotation = property_string(&props, "api.libcamera.rotation")
                .map(|r| SensorRotation::from_degrees(&r))
                .unwrap_or_default();

            let camera = CameraDevice {
                name: device.display_name().to_string(),
                path,
                rotation,
            };
            debug!(name = %camera.name, path = %camera.path, rotation = %camera.rotation, "Found camera");
            Some(camera)
        })
        .collect();

    monitor.stop();
    info!(count = cameras.len(), "PipeWire cameras enumerated");
    Ok(cameras)
}
