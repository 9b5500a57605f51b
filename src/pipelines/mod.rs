// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! - [`preview`]: the live capture → process → draw pipeline

pub mod preview;
