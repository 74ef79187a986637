/// A box in frame coordinates flagged as containing a face.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub score: f32,
}

/// Ordered regions returned by one detector pass.
///
/// The control loop only consumes [`DetectionResult::count`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    regions: Vec<Region>,
}

impl DetectionResult {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
}

impl From<Vec<Region>> for DetectionResult {
    fn from(regions: Vec<Region>) -> Self {
        Self::new(regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: i32) -> Region {
        Region {
            x,
            y: 0,
            width: 10,
            height: 10,
            score: 0.9,
        }
    }

    #[test]
    fn test_empty_result_has_zero_count() {
        let result = DetectionResult::empty();
        assert_eq!(result.count(), 0);
        assert!(result.is_empty());
    }

    #[test]
    fn test_count_matches_regions_in_order() {
        let result = DetectionResult::from(vec![region(5), region(1), region(3)]);
        assert_eq!(result.count(), 3);
        let xs: Vec<i32> = result.regions().iter().map(|r| r.x).collect();
        assert_eq!(xs, vec![5, 1, 3]);
    }
}
