// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion utilities
//!
//! Sources deliver 4:2:0 frames as three planes in I420 order (Y, U, V).
//! The engine expects one contiguous canonical buffer with the chroma planes
//! swapped (Y, V, U), the YV12 layout. This module builds that buffer and
//! provides the CPU conversions the software engine uses for display.

use super::types::{PixelFormat, SensorRotation, YuvPlanes};
use crate::errors::{PipelineError, PipelineResult};

/// Luma and per-plane chroma sizes for a tightly packed 4:2:0 frame
///
/// Chroma is subsampled 2x2; odd dimensions round up.
pub fn yuv420_plane_sizes(width: u32, height: u32) -> (usize, usize) {
    let luma = width as usize * height as usize;
    let chroma = width.div_ceil(2) as usize * height.div_ceil(2) as usize;
    (luma, chroma)
}

/// Total bytes of a canonical 4:2:0 buffer
pub fn canonical_len(width: u32, height: u32) -> usize {
    let (luma, chroma) = yuv420_plane_sizes(width, height);
    luma + 2 * chroma
}

/// Contiguous Y, V, U buffer handed to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    luma_len: usize,
    v_len: usize,
}

impl CanonicalBuffer {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Layout of the buffer as the engine sees it
    pub fn format(&self) -> PixelFormat {
        PixelFormat::YV12
    }

    /// Whole buffer, no padding between planes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn luma(&self) -> &[u8] {
        &self.data[..self.luma_len]
    }

    pub fn chroma_v(&self) -> &[u8] {
        &self.data[self.luma_len..self.luma_len + self.v_len]
    }

    pub fn chroma_u(&self) -> &[u8] {
        &self.data[self.luma_len + self.v_len..]
    }

    /// Give up the buffer, keeping the allocation
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// Check plane sizes against the canonical layout for `width`x`height`
fn validate(planes: &YuvPlanes<'_>, width: u32, height: u32) -> PipelineResult<()> {
    let (luma, _) = yuv420_plane_sizes(width, height);
    let expected = canonical_len(width, height);
    let actual = planes.total_len();
    if width == 0 || height == 0 || planes.y.len() != luma || actual != expected {
        return Err(PipelineError::MalformedPlanes {
            width,
            height,
            expected,
            actual,
        });
    }
    Ok(())
}

fn pack_into(out: &mut Vec<u8>, planes: &YuvPlanes<'_>) {
    out.clear();
    out.reserve(planes.total_len());
    out.extend_from_slice(planes.y);
    out.extend_from_slice(planes.v);
    out.extend_from_slice(planes.u);
}

/// Reassemble I420 planes into a canonical Y, V, U buffer
///
/// Fails with [`PipelineError::MalformedPlanes`] when the luma plane is not
/// exactly `width * height` bytes or the planes do not add up to the
/// canonical total.
pub fn convert(planes: YuvPlanes<'_>, width: u32, height: u32) -> PipelineResult<CanonicalBuffer> {
    FormatConverter::new().convert(planes, width, height)
}

/// Converter that reuses one allocation across frames
#[derive(Debug, Default)]
pub struct FormatConverter {
    spare: Option<Vec<u8>>,
}

impl FormatConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn convert(
        &mut self,
        planes: YuvPlanes<'_>,
        width: u32,
        height: u32,
    ) -> PipelineResult<CanonicalBuffer> {
        validate(&planes, width, height)?;

        let mut data = self.spare.take().unwrap_or_default();
        pack_into(&mut data, &planes);

        Ok(CanonicalBuffer {
            data,
            width,
            height,
            luma_len: planes.y.len(),
            v_len: planes.v.len(),
        })
    }

    /// Return a buffer once the engine is done with it
    pub fn recycle(&mut self, buffer: CanonicalBuffer) {
        self.spare = Some(buffer.into_vec());
    }
}

/// Convert a canonical Y, V, U buffer to RGBA (BT.601, full range)
///
/// Returns `None` if `data` is not the canonical size for the dimensions.
pub fn canonical_to_rgba(data: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    if width == 0 || height == 0 || data.len() != canonical_len(width, height) {
        return None;
    }
    let (luma_len, chroma_len) = yuv420_plane_sizes(width, height);
    let (y_plane, chroma) = data.split_at(luma_len);
    let (v_plane, u_plane) = chroma.split_at(chroma_len);

    let w = width as usize;
    let h = height as usize;
    let cw = width.div_ceil(2) as usize;
    let mut rgba = Vec::with_capacity(w * h * 4);

    for row in 0..h {
        let chroma_row = (row / 2) * cw;
        for col in 0..w {
            let y = y_plane[row * w + col] as f32;
            let u = u_plane[chroma_row + col / 2] as f32 - 128.0;
            let v = v_plane[chroma_row + col / 2] as f32 - 128.0;

            rgba.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgba.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
            rgba.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
            rgba.push(255);
        }
    }

    Some(rgba)
}

/// Luma (BT.601 weights) of an RGBA image
pub fn rgba_to_luma(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .map(|px| {
            let l = 77 * px[0] as u32 + 150 * px[1] as u32 + 29 * px[2] as u32;
            (l >> 8) as u8
        })
        .collect()
}

/// Rotate an RGBA image clockwise by the sensor rotation
///
/// Returns the rotated pixels and the new width and height.
pub fn rotate_rgba(
    rgba: &[u8],
    width: u32,
    height: u32,
    rotation: SensorRotation,
) -> (Vec<u8>, u32, u32) {
    let w = width as usize;
    let h = height as usize;
    if rotation == SensorRotation::None || rgba.len() != w * h * 4 {
        return (rgba.to_vec(), width, height);
    }

    let (out_w, out_h) = if rotation.swaps_dimensions() {
        (h, w)
    } else {
        (w, h)
    };
    let mut out = vec![0u8; rgba.len()];

    for y in 0..h {
        for x in 0..w {
            let (nx, ny) = match rotation {
                SensorRotation::Rotate90 => (h - 1 - y, x),
                SensorRotation::Rotate180 => (w - 1 - x, h - 1 - y),
                SensorRotation::Rotate270 => (y, w - 1 - x),
                SensorRotation::None => (x, y),
            };
            let src = (y * w + x) * 4;
            let dst = (ny * out_w + nx) * 4;
            out[dst..dst + 4].copy_from_slice(&rgba[src..src + 4]);
        }
    }

    (out, out_w as u32, out_h as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_sizes_round_up() {
        assert_eq!(yuv420_plane_sizes(4, 2), (8, 2));
        assert_eq!(yuv420_plane_sizes(5, 3), (15, 6));
        assert_eq!(canonical_len(640, 480), 640 * 480 * 3 / 2);
    }

    #[test]
    fn test_convert_orders_v_before_u() {
        let y = [1u8; 8];
        let u = [2u8, 3];
        let v = [4u8, 5];
        let out = convert(YuvPlanes { y: &y, u: &u, v: &v }, 4, 2).unwrap();

        assert_eq!(out.len(), y.len() + u.len() + v.len());
        assert_eq!(&out.as_bytes()[..8], &y);
        assert_eq!(&out.as_bytes()[8..10], &v);
        assert_eq!(&out.as_bytes()[10..12], &u);
        assert_eq!(out.chroma_v(), &v);
        assert_eq!(out.chroma_u(), &u);
        assert_eq!(out.format(), PixelFormat::YV12);
        assert!(out.format().is_planar());
    }

    #[test]
    fn test_convert_rejects_wrong_sizes() {
        let y = [0u8; 8];
        let u = [0u8; 2];
        let short_v = [0u8; 1];
        let err = convert(YuvPlanes { y: &y, u: &u, v: &short_v }, 4, 2).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MalformedPlanes {
                width: 4,
                height: 2,
                expected: 12,
                actual: 11
            }
        );

        // Total matches but luma does not
        let y_long = [0u8; 9];
        let u_short = [0u8; 1];
        assert!(convert(YuvPlanes { y: &y_long, u: &u_short, v: &u }, 4, 2).is_err());
        assert!(convert(YuvPlanes { y: &[], u: &[], v: &[] }, 0, 0).is_err());
    }

    #[test]
    fn test_converter_reuses_allocation() {
        let mut converter = FormatConverter::new();
        let y = vec![9u8; 64 * 64];
        let c = vec![128u8; 32 * 32];
        let planes = YuvPlanes { y: &y, u: &c, v: &c };

        let first = converter.convert(planes, 64, 64).unwrap();
        let ptr = first.as_bytes().as_ptr();
        converter.recycle(first);
        let second = converter.convert(planes, 64, 64).unwrap();
        assert_eq!(second.as_bytes().as_ptr(), ptr);
    }

    #[test]
    fn test_grey_converts_to_grey() {
        // Neutral chroma gives R = G = B = Y
        let data = [100, 100, 100, 100, 128, 128];
        let rgba = canonical_to_rgba(&data, 2, 2).unwrap();
        assert_eq!(&rgba[..4], &[100, 100, 100, 255]);
        assert!(canonical_to_rgba(&data[..5], 2, 2).is_none());
    }

    #[test]
    fn test_canonical_chroma_order() {
        // High V (red difference) must land in red, so the V plane comes first
        let data = [128, 128, 128, 128, 255, 128];
        let rgba = canonical_to_rgba(&data, 2, 2).unwrap();
        assert!(rgba[0] > rgba[2]);
    }

    #[test]
    fn test_rgba_to_luma() {
        let rgba = [255, 255, 255, 255, 0, 0, 0, 255];
        assert_eq!(rgba_to_luma(&rgba), vec![255, 0]);
    }

    #[test]
    fn test_rotate_rgba() {
        // 2x1 image: A B
        let a = [1, 1, 1, 1];
        let b = [2, 2, 2, 2];
        let img = [a, b].concat();

        let (out, w, h) = rotate_rgba(&img, 2, 1, SensorRotation::Rotate90);
        assert_eq!((w, h), (1, 2));
        assert_eq!(out, [a, b].concat());

        let (out, w, h) = rotate_rgba(&img, 2, 1, SensorRotation::Rotate180);
        assert_eq!((w, h), (2, 1));
        assert_eq!(out, [b, a].concat());

        let (out, _, _) = rotate_rgba(&img, 2, 1, SensorRotation::Rotate270);
        assert_eq!(out, [b, a].concat());
    }
}
