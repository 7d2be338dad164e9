use serde::{Deserialize, Serialize};

/// Width of a thermal frame delivered as text.
pub const FRAME_WIDTH: usize = 32;
/// Height of a thermal frame delivered as text.
pub const FRAME_HEIGHT: usize = 24;
/// Pixels in a 32x24 frame.
pub const FRAME_PIXELS: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// Flat, row-major grid of temperatures in degrees Celsius.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThermalFrame {
    values: Vec<f32>,
}

impl ThermalFrame {
    pub fn new(values: Vec<f32>) -> Self {
        ThermalFrame { values }
    }

    /// Decode `count` little-endian f32 values starting at `offset`.
    ///
    /// Caller guarantees `buf` holds at least `offset + count * 4` bytes.
    pub fn from_le_bytes(buf: &[u8], offset: usize, count: usize) -> Self {
        let end = offset + count * 4;
        let values = buf[offset..end]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        ThermalFrame { values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Min and max, ignoring NaN pixels. `None` when every pixel is NaN or the frame is empty.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut iter = self.values.iter().copied().filter(|v| !v.is_nan());
        let first = iter.next()?;
        Some(iter.fold((first, first), |(mn, mx), v| (mn.min(v), mx.max(v))))
    }
}
