//! Color transform stage
//!
//! Applies a [`LookupTable`] to every pixel of a frame with trilinear
//! interpolation. The output depends only on the input frame and the table
//! passed in; callers take a snapshot from [`LutStore`](crate::lut::LutStore)
//! so a concurrent reload can never change the table mid-frame.

use rayon::prelude::*;

use crate::frame::{Frame, PixelFormat};
use crate::lut::LookupTable;

/// Grade a frame, producing a new frame with the same layout and metadata.
pub fn apply_lut(frame: &Frame, table: &LookupTable) -> Frame {
    let mut data = frame.data().to_vec();
    apply_lut_in_place(&mut data, frame.row_bytes(), frame.format(), table);
    frame.with_data(data)
}

/// Grade a raw interleaved buffer in place.
///
/// `row_bytes` must be a multiple of the pixel size. Alpha (when the format has
/// one) is left untouched.
pub fn apply_lut_in_place(data: &mut [u8], row_bytes: usize, format: PixelFormat, table: &LookupTable) {
    let bpp = format.bytes_per_pixel();
    let [ro, go, bo] = format.rgb_offsets();
    if row_bytes == 0 {
        return;
    }

    // Process rows in parallel
    data.par_chunks_mut(row_bytes).for_each(|row| {
        for px in row.chunks_exact_mut(bpp) {
            let r = px[ro] as f32 / 255.0;
            let g = px[go] as f32 / 255.0;
            let b = px[bo] as f32 / 255.0;
            let out = table.sample(r, g, b);
            px[ro] = to_u8(out[0]);
            px[go] = to_u8(out[1]);
            px[bo] = to_u8(out[2]);
        }
    });
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v * 255.0 + 0.5).clamp(0.0, 255.0) as u8
}
