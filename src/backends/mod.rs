// SPDX-License-Identifier: GPL-3.0-only

//! Frame source backends
//!
//! - [`camera`]: the frame source abstraction, frame and pool types, the
//!   keep-latest delivery path, format conversion and (with the `pipewire`
//!   feature) the PipeWire camera source
//! - [`virtual_camera`]: a synthetic test pattern source

pub mod camera;
pub mod virtual_camera;
