//! Screen geometry and absolute coordinate normalization
//!
//! Mouse positions are stored device-independent: both axes are rescaled to
//! 0..=65535, the range `SendInput` expects with `MOUSEEVENTF_ABSOLUTE`.

use crate::error::Result;

pub const ABSOLUTE_MAX: i32 = 65535;

/// Current display resolution, DPI adjusted
pub trait ScreenGeometry {
    fn resolution(&self) -> Result<(u32, u32)>;
}

/// Fixed resolution, for tests and headless use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedScreen(pub u32, pub u32);

impl ScreenGeometry for FixedScreen {
    fn resolution(&self) -> Result<(u32, u32)> {
        Ok((self.0, self.1))
    }
}

fn scale(pos: i32, extent: u32) -> i32 {
    if extent == 0 {
        return 0;
    }
    let v = (pos as i64 * 65536) / extent as i64;
    v.clamp(0, ABSOLUTE_MAX as i64) as i32
}

/// Map screen pixels to the absolute range. Call exactly once per position.
pub fn normalize(x: i32, y: i32, resolution: (u32, u32)) -> (i32, i32) {
    (scale(x, resolution.0), scale(y, resolution.1))
}

pub fn in_range(v: i64) -> bool {
    (0..=ABSOLUTE_MAX as i64).contains(&v)
}
