use crate::shared::constants::DEFAULT_STANCE_SCALE;

/// Maps a face count to a stance height.
///
/// Pure and memoryless: the height depends only on the latest count, with no
/// smoothing or hysteresis between iterations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StanceMapping {
    scale: f64,
}

impl StanceMapping {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn height_for(&self, count: usize) -> f64 {
        count as f64 * self.scale
    }
}

impl Default for StanceMapping {
    fn default() -> Self {
        Self::new(DEFAULT_STANCE_SCALE)
    }
}
