// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic I420 test pattern
//!
//! Top half: horizontal luma gradient. Bottom half: vertical bars.
//! A bright box moves across the frame so motion and edges are visible.

/// Side of the moving box relative to the frame height
const BOX_FRACTION: u32 = 5;

/// Box position in pixels for a given frame
fn box_origin(width: u32, height: u32, sequence: u64) -> (u32, u32) {
    let size = (height / BOX_FRACTION).max(1);
    let travel_x = width.saturating_sub(size).max(1) as u64;
    let travel_y = height.saturating_sub(size).max(1) as u64;
    // Bounce horizontally, drift vertically at a third of the speed
    let step = sequence * 4;
    let phase = step % (2 * travel_x);
    let x = if phase < travel_x { phase } else { 2 * travel_x - phase };
    let y = (step / 3) % travel_y;
    (x as u32, y as u32)
}

/// Fill the three planes of a `width`x`height` I420 frame
pub fn fill_i420(y: &mut [u8], u: &mut [u8], v: &mut [u8], width: u32, height: u32, sequence: u64) {
    let w = width as usize;
    let h = height as usize;
    let size = (height / BOX_FRACTION).max(1) as usize;
    let (bx, by) = box_origin(width, height, sequence);
    let (bx, by) = (bx as usize, by as usize);

    for row in 0..h {
        for col in 0..w {
            let in_box = (bx..bx + size).contains(&col) && (by..by + size).contains(&row);
            let luma = if in_box {
                235
            } else if row < h / 2 {
                16 + (col * 219 / w.max(1)) as u8
            } else if (col * 8 / w.max(1)) % 2 == 0 {
                180
            } else {
                40
            };
            y[row * w + col] = luma;
        }
    }

    let cw = width.div_ceil(2) as usize;
    let ch = height.div_ceil(2) as usize;
    for row in 0..ch {
        for col in 0..cw {
            let idx = row * cw + col;
            u[idx] = 128u8.wrapping_add((col * 64 / cw.max(1)) as u8).wrapping_sub(32);
            v[idx] = 128u8.wrapping_add((row * 64 / ch.max(1)) as u8).wrapping_sub(32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_has_gradient_and_box() {
        let (w, h) = (40u32, 20u32);
        let mut y = vec![0u8; 800];
        let mut u = vec![0u8; 200];
        let mut v = vec![0u8; 200];
        fill_i420(&mut y, &mut u, &mut v, w, h, 0);

        // Box at the origin on frame 0
        assert_eq!(y[0], 235);
        // Gradient increases left to right outside the box
        let row = 5 * w as usize;
        assert!(y[row + 30] > y[row + 10]);
        // Bars alternate in the bottom half
        let bottom = 15 * w as usize;
        assert_ne!(y[bottom + 2], y[bottom + 7]);
    }

    #[test]
    fn test_box_moves() {
        assert_ne!(box_origin(640, 480, 0), box_origin(640, 480, 10));
        // Tiny frames do not divide by zero
        let _ = box_origin(1, 1, 99);
    }
}
